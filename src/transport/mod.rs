//! Request/response plumbing between a triggering surface and the context
//! that holds the document.
//!
//! The wire shapes are fixed: a request is `{"action": "generate"}`, a
//! response is `{"pageObjectCode": "..."}` or `{"error": "..."}`. The
//! handler side is a [`RequestHandler`]; [`channel`] connects it to an
//! in-process [`TransportClient`] and [`native`] connects it to a browser
//! extension over stdio.

pub mod native;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::OutputFormat;
use crate::dom::DomTree;
use crate::generate::Generator;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Generate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    PageObject {
        #[serde(rename = "pageObjectCode")]
        page_object_code: String,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    /// The generated code, or the error it carries.
    pub fn into_result(self) -> Result<String> {
        match self {
            Response::PageObject { page_object_code } => Ok(page_object_code),
            Response::Error { error } => Err(Error::Generation(error)),
        }
    }
}

/// Handles requests inside the context that holds the document.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// A document plus everything needed to answer `generate` for it.
pub struct PageContext<D> {
    tree: D,
    generator: Generator,
    format: OutputFormat,
}

impl<D: DomTree> PageContext<D> {
    pub fn new(tree: D, generator: Generator) -> Self {
        Self {
            tree,
            generator,
            format: OutputFormat::PageObject,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn tree(&self) -> &D {
        &self.tree
    }

    async fn generate(&self) -> Result<String> {
        let page_object = self.generator.generate(&self.tree).await?;
        match self.format {
            OutputFormat::PageObject => Ok(page_object.render()),
            OutputFormat::Json => page_object.to_json(),
        }
    }
}

#[async_trait]
impl<D: DomTree> RequestHandler for PageContext<D> {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Generate => match self.generate().await {
                Ok(code) => Response::PageObject {
                    page_object_code: code,
                },
                Err(e) => {
                    warn!("Generation failed: {}", e);
                    Response::error(e.to_string())
                }
            },
        }
    }
}

// =============================================================================
// In-process channel
// =============================================================================

type Envelope = (Request, oneshot::Sender<Response>);

/// Create a connected client/server pair.
pub fn channel(timeout: Duration) -> (TransportClient, TransportServer) {
    let (tx, rx) = mpsc::channel(1);
    let client = TransportClient {
        tx,
        in_flight: Arc::new(Mutex::new(())),
        timeout,
    };
    (client, TransportServer { rx })
}

/// Sending side. Clones share one in-flight slot, so a second trigger while
/// a request is pending fails with [`Error::Busy`] instead of queueing.
#[derive(Clone)]
pub struct TransportClient {
    tx: mpsc::Sender<Envelope>,
    in_flight: Arc<Mutex<()>>,
    timeout: Duration,
}

impl TransportClient {
    /// Send one request and wait for its response.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let _slot = self.in_flight.try_lock().map_err(|_| Error::Busy)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| Error::Transport("execution context is not listening".into()))?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Transport(
                "execution context dropped the request".into(),
            )),
            Err(_) => Err(Error::Timeout(format!(
                "no response after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Ask for a page object.
    pub async fn send_generate(&self) -> Result<String> {
        self.send(Request::Generate).await?.into_result()
    }
}

/// Receiving side, drained by [`TransportServer::serve`].
pub struct TransportServer {
    rx: mpsc::Receiver<Envelope>,
}

impl TransportServer {
    /// Answer requests one at a time until every client is dropped.
    pub async fn serve<H: RequestHandler + ?Sized>(mut self, handler: &H) {
        while let Some((request, reply)) = self.rx.recv().await {
            debug!("Handling {:?}", request);
            let response = handler.handle(request).await;
            if reply.send(response).is_err() {
                debug!("Client went away before the response was ready");
            }
        }
        info!("All transport clients closed");
    }
}

/// Send a single generate request to `handler` over a fresh channel and wait
/// at most `timeout` for the answer.
pub async fn generate_once<H: RequestHandler + ?Sized>(
    handler: &H,
    timeout: Duration,
) -> Result<String> {
    let (client, server) = channel(timeout);
    let request = async move { client.send_generate().await };
    tokio::select! {
        biased;
        outcome = request => outcome,
        () = server.serve(handler) => Err(Error::Transport("execution context stopped".into())),
    }
}

/// Text shown to the user for a finished request: the page object, or the
/// error in its place.
pub fn render_outcome(outcome: &Result<String>) -> String {
    match outcome {
        Ok(code) => code.clone(),
        Err(e) => format!("Error: {}", e),
    }
}
