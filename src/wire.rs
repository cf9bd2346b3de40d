//! Conversions between the domain types in [`crate::session`] /
//! [`crate::resource`] and the `prost`-generated wire types in
//! [`crate::pb`].

use crate::pb;
use crate::session::{DatabaseFamily, SessionRef};

impl From<&SessionRef> for pb::SessionRef {
    fn from(s: &SessionRef) -> Self {
        pb::SessionRef {
            session_identifier: s.identifier.clone(),
            connection_hash: s.connection_hash.clone(),
            database_family: match s.family {
                DatabaseFamily::Generic => 0,
                DatabaseFamily::H2 => 1,
            },
            server_state: s.server_state.clone(),
        }
    }
}

impl From<Option<pb::SessionRef>> for SessionRef {
    fn from(s: Option<pb::SessionRef>) -> Self {
        match s {
            None => SessionRef::empty(),
            Some(s) => SessionRef {
                identifier: s.session_identifier,
                connection_hash: s.connection_hash,
                family: if s.database_family == 1 {
                    DatabaseFamily::H2
                } else {
                    DatabaseFamily::Generic
                },
                server_state: s.server_state,
            },
        }
    }
}
