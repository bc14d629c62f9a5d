use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use eoka::{Browser, Page};

use crate::config::{Config, OutputFormat};
use crate::dom::{HtmlDocument, LiveDocument};
use crate::emit::Emitter;
use crate::generate::Generator;
use crate::transport::{self, PageContext};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NavigateRequest {
    #[schemars(description = "URL to navigate to")]
    pub url: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GenerateRequest {
    #[schemars(description = "Name of the generated class (default from config, else MyPage)")]
    pub class_name: Option<String>,
    #[schemars(description = "Output format: page_object (class source) or json (entries)")]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateFromHtmlRequest {
    #[schemars(description = "HTML document to generate a page object for")]
    pub html: String,
    #[schemars(description = "Name of the generated class (default from config, else MyPage)")]
    pub class_name: Option<String>,
    #[schemars(description = "Output format: page_object (class source) or json (entries)")]
    pub format: Option<OutputFormat>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn err(e: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(e.to_string(), None::<Value>)
}

fn text_ok(s: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(s.into())]))
}

/// Browser and the page all tools operate on.
struct BrowserSession {
    browser: Browser,
    page: Page,
}

#[derive(Clone)]
pub struct PageObjectServer {
    session: Arc<Mutex<Option<BrowserSession>>>,
    config: Arc<Config>,
    tool_router: ToolRouter<Self>,
}

impl PageObjectServer {
    async fn ensure_session(&self) -> Result<(), ErrorData> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            info!("Launching browser");
            let browser = Browser::launch_with_config(self.config.browser.stealth())
                .await
                .map_err(err)?;
            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    browser.close().await.map_err(err)?;
                    return Err(err(e));
                }
            };
            *guard = Some(BrowserSession { browser, page });
        }
        Ok(())
    }

    fn generator(&self, class_name: Option<String>) -> Result<Generator, ErrorData> {
        let class_name = class_name.unwrap_or_else(|| self.config.output.class_name.clone());
        let mut config = (*self.config).clone();
        config.output.class_name = class_name.clone();
        config
            .validate()
            .map_err(|e| ErrorData::invalid_params(e.to_string(), None::<Value>))?;
        Ok(Generator::new(config.classifier.build(), Emitter::new(class_name)))
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.transport.timeout_ms)
    }
}

impl Default for PageObjectServer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[tool_router]
impl PageObjectServer {
    pub fn new(config: Config) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Navigate to a URL. Launches browser on first call.")]
    async fn navigate(
        &self,
        req: Parameters<NavigateRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.ensure_session().await?;
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return Err(err("browser session unavailable"));
        };
        session.page.goto(&req.0.url).await.map_err(err)?;
        let url = session.page.url().await.map_err(err)?;
        let title = session.page.title().await.map_err(err)?;
        text_ok(format!("Navigated to: {}\nTitle: {}", url, title))
    }

    #[tool(
        description = "Generate a page object for the current page. Picks a stable selector and a unique property name for every input, button, link, heading and test-id element."
    )]
    async fn generate_page_object(
        &self,
        req: Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = req.0;
        let generator = self.generator(req.class_name)?;
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return Err(ErrorData::internal_error(
                "No page open. Use navigate first.",
                None::<Value>,
            ));
        };

        let ctx = PageContext::new(LiveDocument::new(&session.page), generator)
            .with_format(req.format.unwrap_or(self.config.output.format));
        let code = transport::generate_once(&ctx, self.timeout())
            .await
            .map_err(err)?;
        text_ok(code)
    }

    #[tool(
        description = "Generate a page object from an HTML string without opening a browser."
    )]
    async fn generate_from_html(
        &self,
        req: Parameters<GenerateFromHtmlRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = req.0;
        let generator = self.generator(req.class_name)?;
        let doc = HtmlDocument::parse(&req.html).map_err(err)?;
        let ctx = PageContext::new(doc, generator)
            .with_format(req.format.unwrap_or(self.config.output.format));
        let code = transport::generate_once(&ctx, self.timeout())
            .await
            .map_err(err)?;
        text_ok(code)
    }

    #[tool(description = "Close the browser.")]
    async fn close(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            session.browser.close().await.map_err(err)?;
        }
        text_ok("Browser closed.")
    }
}

#[tool_handler]
impl ServerHandler for PageObjectServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "eoka-po".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Page object generator. Use 'navigate' to open a URL (launches browser automatically), \
                 then 'generate_page_object' to get a WebdriverIO page object class for it. \
                 'generate_from_html' works on an HTML string without a browser."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server over stdio.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = PageObjectServer::new(config);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
