//! Streaming LOB read/write engine (§4.5).
//!
//! Both directions are framed in block-sized chunks carrying the
//! session on every frame, with a database-family quirk in how those
//! blocks are sized (see [`family`]).

pub mod family;
pub mod read;
pub mod write;

pub use family::LobKind;
pub use read::open_read;
pub use write::{start_write, LobReference, LobSink};
