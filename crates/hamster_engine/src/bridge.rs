use std::time::Duration;

use hamster_core::{ActionStatus, FileEntry, ProtocolError, Request, Response};
use hamster_logging::hamster_warn;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::content::Envelope;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("page surface is not listening")]
    Closed,
    #[error("no reply to {action} within {after:?}")]
    Timeout { action: &'static str, after: Duration },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Popup-side handle for talking to the page surface.
#[derive(Clone)]
pub struct Bridge {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl Bridge {
    pub(crate) fn new(tx: mpsc::Sender<Envelope>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    pub async fn request(&self, request: Request) -> Result<Response, BridgeError> {
        let action = request.action();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Closed)?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_canceled)) => Err(BridgeError::Closed),
            Err(_elapsed) => {
                hamster_warn!("Timed out waiting for {action}");
                Err(BridgeError::Timeout {
                    action,
                    after: self.timeout,
                })
            }
        }
    }

    pub async fn find_files(&self, filter: &str) -> Result<Vec<FileEntry>, BridgeError> {
        let request = Request::FindDownloadableFiles {
            filter: filter.to_string(),
        };
        let action = request.action();
        match self.request(request).await? {
            Response::Files { files } => Ok(files),
            _ => Err(ProtocolError::UnexpectedResponse { action }.into()),
        }
    }

    pub async fn filter_files(&self, filter: &str) -> Result<usize, BridgeError> {
        let request = Request::FilterFiles {
            filter: filter.to_string(),
        };
        let action = request.action();
        match self.request(request).await? {
            Response::VisibleCount { visible_count } => Ok(visible_count),
            _ => Err(ProtocolError::UnexpectedResponse { action }.into()),
        }
    }

    /// Sends one of the click-phase requests and returns its acknowledgement.
    pub async fn dispatch(&self, request: Request) -> Result<ActionStatus, BridgeError> {
        let action = request.action();
        match self.request(request).await? {
            Response::Status { status } => Ok(status),
            _ => Err(ProtocolError::UnexpectedResponse { action }.into()),
        }
    }
}
