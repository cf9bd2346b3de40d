//! Shared fake `OjpProxy` server for integration tests.
//!
//! Spins up a real `tonic` server bound to an ephemeral localhost port,
//! so the dispatcher/router/LOB-engine tests exercise the actual wire
//! protocol rather than a mocked transport.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, Streaming};

use ojp_client::pb::ojp_proxy_server::{OjpProxy, OjpProxyServer};
use ojp_client::pb::{
    CallResourceRequest, CallResourceResponse, ConnectionDetails, LobDataBlock, LobReference,
    OpResult, ReadLobRequest, ResultSetFetchRequest, SessionInfo, SessionRef,
    SessionTerminationStatus, StatementRequest,
};

pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

/// Shared, inspectable state behind a [`FakeProxy`].
#[derive(Default)]
pub struct FakeState {
    pub lobs: Mutex<HashMap<String, Vec<u8>>>,
    /// When set, the *next* `execute_query` call fails with `Unavailable`
    /// and this flag clears itself — used to simulate one endpoint going
    /// dark mid-session.
    pub fail_next_query: AtomicBool,
    pub query_calls: Mutex<Vec<String>>,
}

/// A minimal `OjpProxy` implementation for tests. Every session-bearing
/// response is tagged with `label` so tests can tell which endpoint
/// actually answered a call.
pub struct FakeProxy {
    pub label: String,
    pub state: Arc<FakeState>,
}

fn session_for(label: &str) -> SessionRef {
    SessionRef {
        session_identifier: format!("sess-{label}"),
        connection_hash: String::new(),
        database_family: 0,
        server_state: Vec::new(),
    }
}

#[tonic::async_trait]
impl OjpProxy for FakeProxy {
    async fn connect(
        &self,
        _request: Request<ConnectionDetails>,
    ) -> Result<Response<SessionInfo>, Status> {
        Ok(Response::new(SessionInfo {
            session: Some(session_for(&self.label)),
        }))
    }

    async fn execute_update(
        &self,
        request: Request<StatementRequest>,
    ) -> Result<Response<OpResult>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(OpResult {
            session,
            kind: 1,
            payload: Vec::new(),
        }))
    }

    async fn execute_query(
        &self,
        _request: Request<StatementRequest>,
    ) -> Result<Response<OpResult>, Status> {
        self.state
            .query_calls
            .lock()
            .push(self.label.clone());

        if self.state.fail_next_query.swap(false, Ordering::SeqCst) {
            return Err(Status::unavailable("endpoint going dark"));
        }

        Ok(Response::new(OpResult {
            session: Some(session_for(&self.label)),
            kind: 2,
            payload: Vec::new(),
        }))
    }

    async fn fetch_next_rows(
        &self,
        request: Request<ResultSetFetchRequest>,
    ) -> Result<Response<OpResult>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(OpResult {
            session,
            kind: 2,
            payload: Vec::new(),
        }))
    }

    async fn start_transaction(
        &self,
        request: Request<SessionInfo>,
    ) -> Result<Response<OpResult>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(OpResult {
            session,
            kind: 3,
            payload: Vec::new(),
        }))
    }

    async fn commit_transaction(
        &self,
        request: Request<SessionInfo>,
    ) -> Result<Response<OpResult>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(OpResult {
            session,
            kind: 3,
            payload: Vec::new(),
        }))
    }

    async fn rollback_transaction(
        &self,
        request: Request<SessionInfo>,
    ) -> Result<Response<OpResult>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(OpResult {
            session,
            kind: 3,
            payload: Vec::new(),
        }))
    }

    async fn terminate_session(
        &self,
        _request: Request<SessionInfo>,
    ) -> Result<Response<SessionTerminationStatus>, Status> {
        Ok(Response::new(SessionTerminationStatus {
            terminated: true,
            detail: String::new(),
        }))
    }

    async fn call_resource(
        &self,
        request: Request<CallResourceRequest>,
    ) -> Result<Response<CallResourceResponse>, Status> {
        let session = request.into_inner().session;
        Ok(Response::new(CallResourceResponse {
            session,
            shape: 0,
            value: Vec::new(),
        }))
    }

    type WriteLobStream = ResponseStream<LobReference>;

    async fn write_lob(
        &self,
        request: Request<Streaming<LobDataBlock>>,
    ) -> Result<Response<Self::WriteLobStream>, Status> {
        let mut inbound = request.into_inner();
        let state = self.state.clone();
        let label = self.label.clone();

        let stream = async_stream::try_stream! {
            let mut buf = Vec::new();
            let mut identifier = String::new();
            while let Some(block) = inbound.message().await? {
                if !block.payload.is_empty() {
                    buf.extend_from_slice(&block.payload);
                }
                identifier = format!("lob-{label}");
                yield LobReference {
                    identifier: identifier.clone(),
                    session: block.session,
                };
            }
            state.lobs.lock().insert(identifier, buf);
        };

        Ok(Response::new(Box::pin(stream)))
    }

    type ReadLobStream = ResponseStream<LobDataBlock>;

    async fn read_lob(
        &self,
        request: Request<ReadLobRequest>,
    ) -> Result<Response<Self::ReadLobStream>, Status> {
        let req = request.into_inner();
        let identifier = req
            .lob_reference
            .map(|r| r.identifier)
            .unwrap_or_default();
        let data = self
            .state
            .lobs
            .lock()
            .get(&identifier)
            .cloned()
            .unwrap_or_default();

        let start = req.position;
        let window = req.length;

        let stream = async_stream::stream! {
            if data.is_empty() {
                yield Ok(LobDataBlock {
                    lob_kind: 0,
                    session: None,
                    position: -1,
                    payload: Vec::new(),
                    metadata: Vec::new(),
                });
                return;
            }

            let start_idx = (start - 1).max(0) as usize;
            if start_idx >= data.len() {
                return;
            }

            let end_idx = ((start - 1 + window).max(0) as usize).min(data.len());
            let mut pos = start;
            let mut idx = start_idx;
            while idx < end_idx {
                let chunk_end = (idx + 1024).min(end_idx);
                let payload = data[idx..chunk_end].to_vec();
                let len = payload.len() as i64;
                yield Ok(LobDataBlock {
                    lob_kind: 0,
                    session: None,
                    position: pos,
                    payload,
                    metadata: Vec::new(),
                });
                pos += len;
                idx = chunk_end;
            }
        };

        Ok(Response::new(Box::pin(stream)))
    }
}

/// Binds a [`FakeProxy`] to an ephemeral localhost port and spawns it on
/// the current runtime. Returns the port and a handle the caller can
/// abort to simulate the endpoint disappearing entirely.
pub async fn spawn_fake_proxy(label: &str, state: Arc<FakeState>) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let proxy = FakeProxy {
        label: label.to_string(),
        state,
    };

    let handle = tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(OjpProxyServer::new(proxy))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });

    (addr.port(), handle)
}
