//! Streaming LOB read engine (§4.5): exposes the server-streaming
//! `ReadLob` RPC as a plain [`tokio::io::AsyncRead`] by wrapping a lazy
//! byte stream in [`tokio_util::io::StreamReader`].

use std::io;

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use tokio_util::io::StreamReader;

use crate::channel::ChannelHandle;
use crate::config::LOB_BLOCK_SIZE;
use crate::error::map_status;
use crate::pb;

/// Re-fetch granularity: the server is asked for this many bytes per
/// `ReadLob` call, re-issuing once the previous window is exhausted.
const WINDOW: i64 = 2 * LOB_BLOCK_SIZE as i64;

fn to_io_error(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Opens a streaming LOB read starting at `start_position` (1-based,
/// inclusive, per §4.5.2). `requested_length` caps the total bytes
/// fetched; `None` reads until the server signals the LOB is exhausted.
pub fn open_read(
    mut handle: ChannelHandle,
    lob_reference: pb::LobReference,
    start_position: i64,
    requested_length: Option<i64>,
) -> StreamReader<impl Stream<Item = io::Result<Bytes>>, Bytes> {
    let body = try_stream! {
        let mut cursor: i64 = start_position - 1;

        loop {
            if let Some(limit) = requested_length {
                if cursor >= limit {
                    break;
                }
            }

            let window_len = match requested_length {
                Some(limit) => (limit - cursor).min(WINDOW),
                None => WINDOW,
            };

            let request = pb::ReadLobRequest {
                lob_reference: Some(lob_reference.clone()),
                position: cursor + 1,
                length: window_len,
            };

            let mut inbound = handle
                .streaming
                .read_lob(tonic::Request::new(request))
                .await
                .map_err(|s| to_io_error(map_status(s)))?
                .into_inner();

            let mut blocks_in_window = 0usize;

            loop {
                let next = inbound
                    .message()
                    .await
                    .map_err(|s| to_io_error(map_status(s)))?;

                let Some(block) = next else { break };

                // A first block reporting position -1 with an empty
                // payload signals an immediately-empty LOB.
                if block.position == -1 && block.payload.is_empty() {
                    return;
                }

                blocks_in_window += 1;
                cursor = block.position + block.payload.len() as i64 - 1;
                if !block.payload.is_empty() {
                    yield Bytes::from(block.payload);
                }
            }

            // An empty fetch (no blocks at all, not even a start frame)
            // is the only reliable end-of-object signal; exactly filling
            // a window is not proof the LOB ended and another fetch is
            // still required.
            if blocks_in_window == 0 {
                break;
            }
        }
    };

    StreamReader::new(body)
}
