//! Native messaging host framing.
//!
//! Each message is a 4-byte length in native byte order followed by that
//! many bytes of UTF-8 JSON. A zero length or a clean EOF ends the session;
//! a stream that stops partway through a frame is an error.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{Request, RequestHandler, Response};
use crate::{Error, Result};

/// Largest message accepted from the browser.
pub const MAX_INBOUND: usize = 64 * 1024 * 1024;

/// Largest message the browser accepts from a host.
pub const MAX_OUTBOUND: usize = 1024 * 1024;

/// One inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Message(Vec<u8>),
    /// Frame longer than [`MAX_INBOUND`]; its body was discarded.
    Oversized(usize),
}

/// Read one frame. `Ok(None)` means the peer closed the stream.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>> {
    let mut length_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < length_bytes.len() {
        let n = reader.read(&mut length_bytes[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => return Ok(None),
        4 => {}
        n => {
            return Err(Error::Transport(format!(
                "stream ended inside a frame header ({} of 4 bytes)",
                n
            )))
        }
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_INBOUND {
        let mut body = (&mut *reader).take(length as u64);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        if (skipped as usize) < length {
            return Err(Error::Transport(format!(
                "stream ended inside an oversized frame ({} of {} bytes)",
                skipped, length
            )));
        }
        return Ok(Some(Frame::Oversized(length)));
    }

    let mut message = vec![0u8; length];
    reader.read_exact(&mut message).await?;
    Ok(Some(Frame::Message(message)))
}

/// Write one frame and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &[u8]) -> Result<()> {
    let length = message.len() as u32;
    writer.write_all(&length.to_ne_bytes()).await?;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode a response, replacing it with an error when it would exceed
/// [`MAX_OUTBOUND`].
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(response)?;
    if bytes.len() <= MAX_OUTBOUND {
        return Ok(bytes);
    }
    warn!("Response of {} bytes exceeds the outbound limit", bytes.len());
    let error = Response::error(format!(
        "response too large: {} bytes (limit {})",
        bytes.len(),
        MAX_OUTBOUND
    ));
    Ok(serde_json::to_vec(&error)?)
}

fn decode_request(frame: Frame) -> std::result::Result<Request, String> {
    match frame {
        Frame::Oversized(length) => Err(format!(
            "message too large: {} bytes (limit {})",
            length, MAX_INBOUND
        )),
        Frame::Message(bytes) => {
            serde_json::from_slice(&bytes).map_err(|e| format!("invalid request: {}", e))
        }
    }
}

/// Answer framed requests from `reader` on `writer` until the peer closes
/// the stream. Malformed requests get an error response and the session
/// continues.
pub async fn serve<R, W, H>(mut reader: R, mut writer: W, handler: &H) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: RequestHandler + ?Sized,
{
    info!("Native messaging host ready");
    let mut handled = 0usize;
    while let Some(frame) = read_message(&mut reader).await? {
        let response = match decode_request(frame) {
            Ok(request) => {
                debug!("Handling {:?}", request);
                handler.handle(request).await
            }
            Err(message) => {
                warn!("{}", message);
                Response::error(message)
            }
        };
        write_message(&mut writer, &encode_response(&response)?).await?;
        handled += 1;
    }
    info!("Native messaging session closed after {} messages", handled);
    Ok(())
}
