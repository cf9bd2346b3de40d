//! Top-level client facade (§2, §9): parses a composite locator, wires
//! up the registry/channel cache/router/dispatcher, and exposes the
//! session-scoped operations plus the LOB streaming engine.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio_util::io::StreamReader;

use crate::channel::{ChannelCache, ChannelHandle};
use crate::config::RouterConfig;
use crate::dispatcher::Dispatcher;
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::error::OjpError;
use crate::lob::{self, LobKind, LobSink};
use crate::locator;
use crate::pb;
use crate::resource::{CallResourceRequest, CallResourceResponse};
use crate::router::Router;
use crate::session::{SessionCell, SessionPinning};

/// A router/dispatcher pair bound to one parsed locator, plus the
/// downstream database locator the remote proxy should ultimately open.
pub struct Client {
    dispatcher: Dispatcher,
    router: Arc<Router>,
    channels: Arc<ChannelCache>,
    downstream_url: String,
    pool_profile: String,
}

impl Client {
    /// Parses a composite locator
    /// (`jdbc:ojp[host:port,...]_<downstream-locator>`) and builds the
    /// router/dispatcher stack around it.
    pub fn connect(locator: &str, config: RouterConfig) -> Result<Self, OjpError> {
        let endpoints = locator::parse_endpoints(locator)?;
        let downstream_url = locator::extract_downstream_url(locator)?;
        let pool_profile = locator::extract_pool_profile(locator)?;

        let registry = Arc::new(EndpointRegistry::new(endpoints));
        let channels = Arc::new(ChannelCache::new(config.retry_delay));
        let pins = Arc::new(SessionPinning::new());
        let router = Arc::new(Router::new(registry.clone(), channels.clone(), pins));
        let dispatcher = Dispatcher::new(registry, channels.clone(), router.clone(), config);

        Ok(Self {
            dispatcher,
            router,
            channels,
            downstream_url,
            pool_profile,
        })
    }

    pub fn downstream_url(&self) -> &str {
        &self.downstream_url
    }

    pub fn pool_profile(&self) -> &str {
        &self.pool_profile
    }

    /// Opens a brand new session against the downstream database
    /// described by this locator.
    pub async fn open_session(
        &self,
        details: pb::ConnectionDetails,
    ) -> Result<SessionCell, OjpError> {
        let session = SessionCell::default();
        self.dispatcher.connect(&session, details).await?;
        Ok(session)
    }

    pub async fn execute_update(
        &self,
        session: &SessionCell,
        request: pb::StatementRequest,
    ) -> Result<pb::OpResult, OjpError> {
        self.dispatcher.execute_update(session, request).await
    }

    pub async fn execute_query(
        &self,
        session: &SessionCell,
        request: pb::StatementRequest,
    ) -> Result<pb::OpResult, OjpError> {
        self.dispatcher.execute_query(session, request).await
    }

    pub async fn fetch_next_rows(
        &self,
        session: &SessionCell,
        result_set_identifier: String,
        page_size: Option<u32>,
    ) -> Result<pb::OpResult, OjpError> {
        self.dispatcher
            .fetch_next_rows(session, result_set_identifier, page_size)
            .await
    }

    pub async fn start_transaction(&self, session: &SessionCell) -> Result<pb::OpResult, OjpError> {
        self.dispatcher.start_transaction(session).await
    }

    pub async fn commit_transaction(
        &self,
        session: &SessionCell,
    ) -> Result<pb::OpResult, OjpError> {
        self.dispatcher.commit_transaction(session).await
    }

    pub async fn rollback_transaction(
        &self,
        session: &SessionCell,
    ) -> Result<pb::OpResult, OjpError> {
        self.dispatcher.rollback_transaction(session).await
    }

    pub async fn terminate_session(
        &self,
        session: &SessionCell,
    ) -> Result<pb::SessionTerminationStatus, OjpError> {
        self.dispatcher.terminate_session(session).await
    }

    pub async fn call_resource(
        &self,
        session: &SessionCell,
        request: CallResourceRequest,
    ) -> Result<CallResourceResponse, OjpError> {
        self.dispatcher.call_resource(session, request).await
    }

    /// Opens a streaming LOB write against the session's currently
    /// pinned endpoint, routing a fresh one first if the session isn't
    /// pinned yet. `metadata` is carried verbatim on the start frame
    /// (§4.5.1 rule 1).
    pub async fn write_lob(
        &self,
        session: &SessionCell,
        lob_kind: LobKind,
        declared_length: Option<i64>,
        metadata: Vec<u8>,
    ) -> Result<LobSink, OjpError> {
        let current = session.get();
        let handle = self.channel_for_session(&current.identifier).await?;
        Ok(lob::start_write(
            handle,
            session.clone(),
            lob_kind,
            declared_length,
            metadata,
        ))
    }

    /// Opens a streaming LOB read over `reference`, starting at
    /// `start_position` (1-based, inclusive, per §4.5.2), and returning a
    /// plain `AsyncRead`.
    pub async fn read_lob(
        &self,
        session: &SessionCell,
        reference: pb::LobReference,
        start_position: i64,
        requested_length: Option<i64>,
    ) -> Result<StreamReader<impl Stream<Item = std::io::Result<Bytes>>, Bytes>, OjpError> {
        let current = session.get();
        let handle = self.channel_for_session(&current.identifier).await?;
        Ok(lob::open_read(handle, reference, start_position, requested_length))
    }

    async fn channel_for_session(&self, session_id: &str) -> Result<ChannelHandle, OjpError> {
        let endpoint = self
            .router
            .select_for_session(session_id)
            .await
            .ok_or(OjpError::NoHealthyEndpoints)?;
        self.channel_for(&endpoint).await
    }

    async fn channel_for(&self, endpoint: &Endpoint) -> Result<ChannelHandle, OjpError> {
        self.channels.get_or_create(endpoint).await
    }
}
