use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eoka::{Browser, Page};
use eoka_po::transport::{self, native, PageContext};
use eoka_po::{
    ClassifierKind, Config, DomTree, Emitter, Generator, HtmlDocument, LiveDocument, OutputFormat,
};

#[derive(Parser)]
#[command(name = "eoka-po")]
#[command(about = "Generate page objects with robust selectors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one page object
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        /// Name of the generated class (overrides config)
        #[arg(long)]
        class_name: Option<String>,

        /// Element classifier (overrides config)
        #[arg(long, value_enum)]
        classifier: Option<ClassifierKind>,

        /// Output format (overrides config)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Write the result to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Serve generate requests as a native messaging host on stdin/stdout
    Host {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run the MCP server on stdin/stdout
    Mcp {
        /// Config file with browser and output defaults
        config: Option<PathBuf>,
    },

    /// Validate a config without running
    Check {
        /// Config file to validate
        config: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Config file
    config: Option<PathBuf>,

    /// Page to open in the browser (overrides config)
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// HTML file to read, or - for stdin (overrides config)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,
}

impl SourceArgs {
    fn into_config(self) -> eoka_po::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(url) = self.url {
            config.target.url = Some(url);
            config.target.file = None;
        }
        if let Some(file) = self.file {
            config.target.file = Some(file);
            config.target.url = None;
        }
        if self.headless {
            config.browser.headless = true;
        }
        Ok(config)
    }
}

/// The document a command runs against.
enum Document {
    Snapshot(HtmlDocument),
    Live { browser: Browser, page: Page },
}

impl Document {
    async fn open(config: &Config) -> eoka_po::Result<Self> {
        config.require_target()?;
        if let Some(url) = &config.target.url {
            info!("Opening {}", url);
            let browser = Browser::launch_with_config(config.browser.stealth()).await?;
            let page = match browser.new_page(url).await {
                Ok(page) => page,
                Err(e) => {
                    browser.close().await?;
                    return Err(e.into());
                }
            };
            return Ok(Document::Live { browser, page });
        }
        let file = config.target.file.as_ref().ok_or_else(|| {
            eoka_po::Error::Config("no document: set target.url or target.file".into())
        })?;
        if file.as_os_str() == "-" {
            info!("Reading document from stdin");
            let mut source = String::new();
            tokio::io::stdin().read_to_string(&mut source).await?;
            return Ok(Document::Snapshot(HtmlDocument::parse(&source)?));
        }
        info!("Reading {}", file.display());
        Ok(Document::Snapshot(HtmlDocument::load(file)?))
    }

    fn tree(&self) -> Box<dyn DomTree + '_> {
        match self {
            Document::Snapshot(doc) => Box::new(doc),
            Document::Live { page, .. } => Box::new(LiveDocument::new(page)),
        }
    }

    async fn close(self) -> eoka_po::Result<()> {
        if let Document::Live { browser, .. } = self {
            browser.close().await?;
        }
        Ok(())
    }
}

fn generator(config: &Config) -> Generator {
    Generator::new(
        config.classifier.build(),
        Emitter::new(config.output.class_name.clone()),
    )
}

async fn generate(config: &Config) -> eoka_po::Result<String> {
    let document = Document::open(config).await?;
    let ctx =
        PageContext::new(document.tree(), generator(config)).with_format(config.output.format);
    let timeout = Duration::from_millis(config.transport.timeout_ms);
    let outcome = transport::generate_once(&ctx, timeout).await;
    drop(ctx);
    document.close().await?;
    outcome
}

async fn host(config: &Config) -> eoka_po::Result<()> {
    if config.target.file.as_deref() == Some(std::path::Path::new("-")) {
        return Err(eoka_po::Error::Config(
            "host: stdin carries native messages, the document cannot be read from it".into(),
        ));
    }
    let document = Document::open(config).await?;
    let ctx =
        PageContext::new(document.tree(), generator(config)).with_format(config.output.format);
    let outcome = native::serve(tokio::io::stdin(), tokio::io::stdout(), &ctx).await;
    drop(ctx);
    document.close().await?;
    outcome
}

fn print_summary(config: &Config) {
    println!("Config valid: {}", config.name.as_deref().unwrap_or("(unnamed)"));
    match (&config.target.url, &config.target.file) {
        (Some(url), _) => println!("  Target: {}", url),
        (None, Some(file)) => println!("  Target: {}", file.display()),
        (None, None) => println!("  Target: (none, pass --url or --file)"),
    }
    println!("  Classifier: {}", config.classifier);
    println!("  Class name: {}", config.output.class_name);
    println!("  Format: {:?}", config.output.format);
    println!("  Timeout: {}ms", config.transport.timeout_ms);
    if config.browser.headless {
        println!("  Headless: yes");
    }
}

#[tokio::main]
async fn main() -> eoka_po::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity. Logs go to stderr: stdout carries
    // the generated code and native messaging frames.
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    match cli.command {
        Command::Generate {
            source,
            class_name,
            classifier,
            format,
            output,
        } => {
            let mut config = source.into_config()?;
            if let Some(class_name) = class_name {
                config.output.class_name = class_name;
            }
            if let Some(classifier) = classifier {
                config.classifier = classifier;
            }
            if let Some(format) = format {
                config.output.format = format;
            }

            let outcome = generate(&config).await;
            match (&outcome, output) {
                (Ok(code), Some(path)) => {
                    std::fs::write(&path, code)?;
                    info!("Wrote {}", path.display());
                }
                (Ok(code), None) => {
                    print!("{}", code);
                    if !code.ends_with('\n') {
                        println!();
                    }
                }
                (Err(_), _) => {
                    println!("{}", transport::render_outcome(&outcome));
                    std::process::exit(1);
                }
            }
        }
        Command::Host { source } => {
            let config = source.into_config()?;
            host(&config).await?;
        }
        Command::Mcp { config } => {
            let config = match config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            if let Err(e) = eoka_po::mcp::run_server(config).await {
                eprintln!("MCP server error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Check { config } => {
            let config = Config::load(&config)?;
            print_summary(&config);
        }
    }

    Ok(())
}
