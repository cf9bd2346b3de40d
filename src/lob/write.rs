//! Streaming LOB write engine (§4.5): frames an arbitrary byte stream
//! into `LobDataBlock` messages per database-family quirk and drives the
//! bidirectional `WriteLob` RPC without holding the whole object in
//! memory.

use async_stream::stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::Streaming;
use tracing::warn;

use crate::channel::ChannelHandle;
use crate::config::LOB_BLOCK_SIZE;
use crate::error::{LobClosePhase, OjpError};
use crate::lob::family::{self, LobKind};
use crate::pb;
use crate::session::{SessionCell, SessionRef};

const PIPE_CAPACITY: usize = 8 * LOB_BLOCK_SIZE;

/// A LOB identifier plus the session it was produced under — the
/// domain shape of a wire `LobReference`.
#[derive(Clone, Debug)]
pub struct LobReference {
    pub identifier: String,
    pub session: SessionRef,
}

impl From<pb::LobReference> for LobReference {
    fn from(r: pb::LobReference) -> Self {
        Self {
            identifier: r.identifier,
            session: r.session.into(),
        }
    }
}

/// The producer-facing half of a streaming LOB write: an async byte
/// sink. Bytes written to it are framed and forwarded to the background
/// driver task as they arrive.
pub struct LobSink {
    pipe: DuplexStream,
    first_reference: Option<oneshot::Receiver<Result<LobReference, OjpError>>>,
    final_reference: oneshot::Receiver<Result<LobReference, OjpError>>,
    driver: JoinHandle<()>,
    session_cell: SessionCell,
}

impl LobSink {
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), OjpError> {
        self.pipe
            .write_all(bytes)
            .await
            .map_err(|e| OjpError::ProtocolViolation(e.to_string()))
    }

    /// Resolves once the first response block has round-tripped —
    /// available well before the whole LOB has been written.
    pub async fn first_reference(&mut self) -> Result<LobReference, OjpError> {
        let rx = self
            .first_reference
            .take()
            .expect("first_reference polled more than once");
        rx.await
            .map_err(|_| OjpError::ProtocolViolation("write driver dropped".into()))?
    }

    /// Closes the pipe, waits for the final response, and validates it
    /// before returning it. Surfaces which phase of the close sequence
    /// failed via [`OjpError::LobCloseFailed`].
    pub async fn shutdown(self) -> Result<LobReference, OjpError> {
        let LobSink {
            mut pipe,
            final_reference,
            driver,
            session_cell,
            ..
        } = self;

        pipe.shutdown()
            .await
            .map_err(|e| OjpError::LobCloseFailed {
                phase: LobClosePhase::Send,
                source: Box::new(OjpError::ProtocolViolation(e.to_string())),
            })?;

        let reference = final_reference
            .await
            .map_err(|_| OjpError::LobCloseFailed {
                phase: LobClosePhase::Send,
                source: Box::new(OjpError::ProtocolViolation("write driver dropped".into())),
            })?
            .map_err(|e| OjpError::LobCloseFailed {
                phase: LobClosePhase::Send,
                source: Box::new(e),
            })?;

        if reference.identifier.is_empty() {
            return Err(OjpError::LobCloseFailed {
                phase: LobClosePhase::Validate,
                source: Box::new(OjpError::LobReferenceMissing),
            });
        }

        // The final LobReference carries the current session value, same
        // as any other response (§3): the caller's next call must see it.
        if !reference.session.identifier.is_empty() {
            session_cell.adopt(reference.session.clone());
        }

        drop(driver);
        Ok(reference)
    }
}

/// Starts a streaming LOB write: spawns the background task that reads
/// from the pipe, frames blocks per the session's database family, and
/// drives `WriteLob`. Returns the caller-facing [`LobSink`] immediately.
pub fn start_write(
    mut handle: ChannelHandle,
    session_cell: SessionCell,
    lob_kind: LobKind,
    declared_length: Option<i64>,
    metadata: Vec<u8>,
) -> LobSink {
    let session = session_cell.get();
    let (here, there) = tokio::io::duplex(PIPE_CAPACITY);
    let (first_tx, first_rx) = oneshot::channel();
    let (final_tx, final_rx) = oneshot::channel();

    let driver = tokio::spawn(async move {
        let family = session.family;
        let mut reader = there;

        let outbound = stream! {
            yield family::start_frame(family, metadata).into_block(lob_kind, &session);

            let mut sent: i64 = 0;
            let mut buf = vec![0u8; LOB_BLOCK_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut chunk = buf[..n].to_vec();
                        if let Some(limit) = declared_length {
                            let remaining = (limit - sent).max(0) as usize;
                            if chunk.len() > remaining {
                                chunk.truncate(remaining);
                            }
                        }
                        for frame in family::data_frames(family, &chunk, sent) {
                            sent += frame.payload.len() as i64;
                            yield frame.into_block(lob_kind, &session);
                        }
                        if let Some(limit) = declared_length {
                            if sent >= limit {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "lob write pipe read failed");
                        break;
                    }
                }
            }
        };

        let result = handle.streaming.write_lob(outbound).await;

        match result {
            Ok(resp) => {
                let mut inbound: Streaming<pb::LobReference> = resp.into_inner();
                let mut first_sent = false;
                let mut last: Option<pb::LobReference> = None;
                loop {
                    match inbound.message().await {
                        Ok(Some(reference)) => {
                            if !first_sent {
                                let _ = first_tx.send(Ok(LobReference::from(reference.clone())));
                                first_sent = true;
                            }
                            last = Some(reference);
                        }
                        Ok(None) => break,
                        Err(status) => {
                            let mapped = crate::error::map_status(status);
                            if !first_sent {
                                let _ = first_tx.send(Err(mapped.clone()));
                            }
                            let _ = final_tx.send(Err(mapped));
                            return;
                        }
                    }
                }
                match last {
                    Some(reference) => {
                        if !first_sent {
                            let _ = first_tx.send(Ok(LobReference::from(reference.clone())));
                        }
                        let _ = final_tx.send(Ok(LobReference::from(reference)));
                    }
                    None => {
                        if !first_sent {
                            let _ = first_tx.send(Err(OjpError::LobReferenceMissing));
                        }
                        let _ = final_tx.send(Err(OjpError::LobReferenceMissing));
                    }
                }
            }
            Err(status) => {
                let mapped = crate::error::map_status(status);
                let _ = first_tx.send(Err(mapped.clone()));
                let _ = final_tx.send(Err(mapped));
            }
        }
    });

    LobSink {
        pipe: here,
        first_reference: Some(first_rx),
        final_reference: final_rx,
        driver,
        session_cell,
    }
}
