//! The unary call retry/failover template (§4.4).
//!
//! ```text
//! attempts = 0
//! loop:
//!   ep = router.selectForSession(session.id)
//!   if ep is none: ... fail or retry ...
//!   ch = cache.get(ep)
//!   try: response = ch.call(request); ... return response
//!   catch transport status s: ... mark unhealthy, retry ...
//! ```

use std::future::Future;
use std::sync::Arc;

use prost::Message;
use tokio::time::sleep;
use tracing::warn;

use crate::channel::{ChannelCache, ChannelHandle};
use crate::config::RouterConfig;
use crate::endpoint::EndpointRegistry;
use crate::error::OjpError;
use crate::pb;
use crate::resource::{CallResourceRequest, CallResourceResponse};
use crate::router::Router;
use crate::session::{SessionCell, SessionRef};

/// Drives every unary operation (`connect`, `executeUpdate`,
/// `executeQuery`, `fetchNextRows`, the transaction verbs,
/// `terminateSession`, `callResource`) through the shared retry
/// template.
pub struct Dispatcher {
    registry: Arc<EndpointRegistry>,
    channels: Arc<ChannelCache>,
    router: Arc<Router>,
    config: RouterConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        channels: Arc<ChannelCache>,
        router: Arc<Router>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            channels,
            router,
            config,
        }
    }

    /// Enforces the outbound-size guard (§4.5.3): the message is
    /// serialized once and its encoded length compared to the
    /// configured maximum, using `prost::Message::encoded_len` rather
    /// than a second full serialization pass.
    pub fn check_outbound_size<M: Message>(&self, message: &M) -> Result<(), OjpError> {
        let size = message.encoded_len();
        if size > self.config.max_outbound_message_bytes {
            return Err(OjpError::MessageTooLarge {
                size,
                limit: self.config.max_outbound_message_bytes,
            });
        }
        Ok(())
    }

    /// The generic retry driver. `call` is handed a fresh
    /// [`ChannelHandle`] and the caller's current session identifier for
    /// each attempt and returns the raw tonic result; on success the
    /// driver extracts the replacement session via `extract_session` and
    /// applies the pinning/adoption rules before returning the response.
    pub async fn dispatch<F, Fut, R>(
        &self,
        session: &SessionCell,
        mut call: F,
    ) -> Result<R, OjpError>
    where
        F: FnMut(ChannelHandle) -> Fut,
        Fut: Future<Output = Result<(SessionRef, R), tonic::Status>>,
    {
        let mut attempts: u32 = 0;

        loop {
            let current = session.get();
            let endpoint = self.router.select_for_session(&current.identifier).await;

            let Some(endpoint) = endpoint else {
                if self.attempts_exhausted(attempts) {
                    return Err(OjpError::NoHealthyEndpoints);
                }
                attempts += 1;
                sleep(self.config.retry_delay).await;
                continue;
            };

            let handle = match self.channels.get_or_create(&endpoint).await {
                Ok(h) => h,
                Err(e) => {
                    self.registry.mark_unhealthy(&endpoint);
                    self.channels.evict(&endpoint);
                    if self.attempts_exhausted(attempts) {
                        return Err(e);
                    }
                    attempts += 1;
                    sleep(self.config.retry_delay).await;
                    continue;
                }
            };

            match call(handle).await {
                Ok((next_session, result)) => {
                    self.registry.mark_healthy(&endpoint);
                    if !next_session.identifier.is_empty() {
                        self.router.pin_session(&next_session.identifier, endpoint);
                    }
                    session.adopt(next_session);
                    return Ok(result);
                }
                Err(status) => {
                    let mapped = crate::error::map_status(status);
                    if !mapped.is_retryable() || self.attempts_exhausted(attempts) {
                        return Err(mapped);
                    }
                    warn!(endpoint = %endpoint, error = %mapped, "dispatch failed, marking endpoint unhealthy");
                    self.registry.mark_unhealthy(&endpoint);
                    self.channels.evict(&endpoint);
                    attempts += 1;
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    fn attempts_exhausted(&self, attempts: u32) -> bool {
        match self.config.max_attempts {
            None => false,
            Some(max) => attempts >= max,
        }
    }

    /// `connect` — opens a new session.
    pub async fn connect(
        &self,
        session: &SessionCell,
        details: pb::ConnectionDetails,
    ) -> Result<(), OjpError> {
        self.check_outbound_size(&details)?;
        self.dispatch(session, move |mut handle| {
            let details = details.clone();
            async move {
                let resp = handle
                    .blocking
                    .connect(tonic::Request::new(details))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.into();
                Ok((next.clone(), ()))
            }
        })
        .await
    }

    /// `executeUpdate`.
    pub async fn execute_update(
        &self,
        session: &SessionCell,
        request: pb::StatementRequest,
    ) -> Result<pb::OpResult, OjpError> {
        self.check_outbound_size(&request)?;
        self.dispatch(session, move |mut handle| {
            let request = request.clone();
            async move {
                let resp = handle
                    .blocking
                    .execute_update(tonic::Request::new(request))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.clone().into();
                Ok((next, resp))
            }
        })
        .await
    }

    /// `executeQuery`.
    pub async fn execute_query(
        &self,
        session: &SessionCell,
        request: pb::StatementRequest,
    ) -> Result<pb::OpResult, OjpError> {
        self.check_outbound_size(&request)?;
        self.dispatch(session, move |mut handle| {
            let request = request.clone();
            async move {
                let resp = handle
                    .blocking
                    .execute_query(tonic::Request::new(request))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.clone().into();
                Ok((next, resp))
            }
        })
        .await
    }

    /// `fetchNextRows` — result-set pagination with a caller-supplied
    /// page size, defaulting to the configured `fetch_page_size`.
    pub async fn fetch_next_rows(
        &self,
        session: &SessionCell,
        result_set_identifier: String,
        page_size: Option<u32>,
    ) -> Result<pb::OpResult, OjpError> {
        let page_size = page_size.unwrap_or(self.config.fetch_page_size);
        self.check_outbound_size(&pb::ResultSetFetchRequest {
            session: Some((&session.get()).into()),
            result_set_identifier: result_set_identifier.clone(),
            page_size,
        })?;
        self.dispatch(session, move |mut handle| {
            let result_set_identifier = result_set_identifier.clone();
            let session_ref = session.get();
            async move {
                let req = pb::ResultSetFetchRequest {
                    session: Some((&session_ref).into()),
                    result_set_identifier,
                    page_size,
                };
                let resp = handle
                    .blocking
                    .fetch_next_rows(tonic::Request::new(req))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.clone().into();
                Ok((next, resp))
            }
        })
        .await
    }

    /// `startTransaction` / `commitTransaction` / `rollbackTransaction`
    /// share a shape: they carry only the session and return an
    /// `OpResult`.
    pub async fn start_transaction(&self, session: &SessionCell) -> Result<pb::OpResult, OjpError> {
        self.transaction_call(session, |c, req| c.start_transaction(req))
            .await
    }

    pub async fn commit_transaction(&self, session: &SessionCell) -> Result<pb::OpResult, OjpError> {
        self.transaction_call(session, |c, req| c.commit_transaction(req))
            .await
    }

    pub async fn rollback_transaction(
        &self,
        session: &SessionCell,
    ) -> Result<pb::OpResult, OjpError> {
        self.transaction_call(session, |c, req| c.rollback_transaction(req))
            .await
    }

    async fn transaction_call<F, Fut>(
        &self,
        session: &SessionCell,
        call: F,
    ) -> Result<pb::OpResult, OjpError>
    where
        F: Fn(&mut pb::ojp_proxy_client::OjpProxyClient<tonic::transport::Channel>, tonic::Request<pb::SessionInfo>) -> Fut
            + Clone,
        Fut: Future<Output = Result<tonic::Response<pb::OpResult>, tonic::Status>>,
    {
        self.check_outbound_size(&pb::SessionInfo {
            session: Some((&session.get()).into()),
        })?;
        self.dispatch(session, move |mut handle| {
            let call = call.clone();
            let session_ref = session.get();
            async move {
                let req = pb::SessionInfo {
                    session: Some((&session_ref).into()),
                };
                let resp = call(&mut handle.blocking, tonic::Request::new(req))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.clone().into();
                Ok((next, resp))
            }
        })
        .await
    }

    /// `terminateSession`.
    pub async fn terminate_session(
        &self,
        session: &SessionCell,
    ) -> Result<pb::SessionTerminationStatus, OjpError> {
        let identifier = session.get().identifier;
        self.check_outbound_size(&pb::SessionInfo {
            session: Some((&session.get()).into()),
        })?;
        let result = self
            .dispatch(session, move |mut handle| {
                let session_ref = session.get();
                async move {
                    let req = pb::SessionInfo {
                        session: Some((&session_ref).into()),
                    };
                    let resp = handle
                        .blocking
                        .terminate_session(tonic::Request::new(req))
                        .await?
                        .into_inner();
                    // Termination clears the session; the caller's next
                    // dispatch (if any) will look like a brand new session.
                    Ok((SessionRef::empty(), resp))
                }
            })
            .await;

        if result.is_ok() && !identifier.is_empty() {
            self.router.unpin_session(&identifier);
        }
        result
    }

    /// `callResource` (§4.6).
    pub async fn call_resource(
        &self,
        session: &SessionCell,
        request: CallResourceRequest,
    ) -> Result<CallResourceResponse, OjpError> {
        self.check_outbound_size(&request.clone().into_wire(&session.get()))?;
        self.dispatch(session, move |mut handle| {
            let request = request.clone();
            let session_ref = session.get();
            async move {
                let wire = request.into_wire(&session_ref);
                let resp = handle
                    .blocking
                    .call_resource(tonic::Request::new(wire))
                    .await?
                    .into_inner();
                let next: SessionRef = resp.session.clone().into();
                Ok((next, CallResourceResponse::from(resp)))
            }
        })
        .await
    }
}
