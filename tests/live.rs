//! Integration tests against a live browser page.
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test live -- --ignored

use std::sync::Arc;
use std::time::Duration;

use eoka::Browser;
use eoka_po::transport::{self, PageContext};
use eoka_po::{DomTree, Emitter, Generator, HtmlDocument, LiveDocument, TagClassifier};

const PAGE: &str = r#"
<h1>Sign in</h1>
<input id="email" type="email">
<input name="password" type="password">
<button data-test-id="sign-in">Sign in</button>
<button>Save</button>
<button>Save</button>
<a href="/signup" aria-label="Create account">Sign up</a>
"#;

/// Check if Chrome is available
fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

fn data_url(html: &str) -> String {
    format!("data:text/html,{}", html.replace('#', "%23"))
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_live_extraction_matches_snapshot() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page(&data_url(PAGE))
        .await
        .expect("Failed to create page");

    let live = LiveDocument::new(&page);
    let snapshot = HtmlDocument::parse(PAGE).expect("Failed to parse");

    let from_page = live.extract().await.expect("Failed to extract");
    let from_html = snapshot.extract().await.expect("Failed to extract");
    assert_eq!(from_page, from_html);

    assert_eq!(live.count_by_id("email").await.unwrap(), 1);
    assert_eq!(live.text_matches("button", "Save").await.unwrap(), vec![1, 2]);

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_live_svg_candidates_index_like_snapshot() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let html = r#"<svg><clipPath data-cy="clip"></clipPath></svg><button>Go</button>"#;
    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page(&data_url(html))
        .await
        .expect("Failed to create page");

    let live = LiveDocument::new(&page);
    let from_page = live.extract().await.expect("Failed to extract");
    let from_html = HtmlDocument::parse(html).unwrap().extract().await.unwrap();
    assert_eq!(from_page, from_html);
    assert_eq!(from_page[0].tag, "clippath");
    assert_eq!(from_page[0].ordinal, 0);

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_live_generate() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page(&data_url(PAGE))
        .await
        .expect("Failed to create page");

    let generator = Generator::new(Arc::new(TagClassifier), Emitter::new("SignInPage"));
    let ctx = PageContext::new(LiveDocument::new(&page), generator);
    let code = transport::generate_once(&ctx, Duration::from_secs(30))
        .await
        .expect("Failed to generate");

    assert!(code.contains("class SignInPage {"), "{}", code);
    assert!(code.contains("get emailInputField() { return $('#email'); }"), "{}", code);
    assert!(code.contains("get saveButton1() { return $('button=Save'); }"), "{}", code);
    assert!(code.contains("get saveButton2() { return $('button=Save'); }"), "{}", code);
    assert!(code.contains("get createAccountLink() { return $('a=Create account'); }"), "{}", code);

    drop(ctx);
    browser.close().await.expect("Failed to close browser");
}
