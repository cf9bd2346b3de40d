//! # ojp-client
//!
//! Client-side session router and large-object (LOB) streaming engine
//! for the OJP database-proxy wire protocol.
//!
//! A composite locator names one or more proxy server endpoints and a
//! downstream database locator; [`Client::connect`] parses it, opens a
//! session-sticky round-robin router over the endpoints, and drives
//! every unary call through the same retry/failover template used for
//! the streaming LOB read/write engine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ojp_client::{Client, RouterConfig};
//! use ojp_client::pb::ConnectionDetails;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(
//!         "jdbc:ojp[localhost:1059,localhost:1060]_h2:mem:test",
//!         RouterConfig::default(),
//!     )?;
//!
//!     let session = client
//!         .open_session(ConnectionDetails {
//!             url: client.downstream_url().to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let result = client
//!         .execute_query(&session, Default::default())
//!         .await?;
//!     println!("{:?}", result.kind);
//!
//!     client.terminate_session(&session).await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod lob;
pub mod locator;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod resource;
pub mod router;
pub mod session;
pub mod wire;

/// Generated wire types (`ojp.proto`) — `SessionRef`, `StatementRequest`,
/// `OpResult`, `LobDataBlock`, and the rest of the messages and RPC
/// client defined in `proto/ojp.proto`.
pub mod pb {
    tonic::include_proto!("ojp");
}

pub use client::Client;
pub use config::RouterConfig;
pub use endpoint::{Endpoint, EndpointRegistry, EndpointSet};
pub use error::{LobClosePhase, LocatorError, OjpError};
pub use lob::{LobKind, LobReference, LobSink};
pub use resource::{CallKind, CallResourceRequest, CallResourceResponse, ResourceKind, ReturnShape};
pub use session::{DatabaseFamily, SessionCell, SessionRef};
