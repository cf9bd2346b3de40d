//! Database-family-specific LOB block framing (§4.5).
//!
//! Generic databases want each write block capped at [`LOB_BLOCK_SIZE`]
//! bytes, addressed by how many bytes have already been sent. The H2
//! family's client driver only accepts a single bulk transfer per LOB,
//! so its framing emits the entire payload as one block regardless of
//! size.

use crate::config::LOB_BLOCK_SIZE;
use crate::pb;
use crate::session::{DatabaseFamily, SessionRef};

/// Which character/binary interpretation a LOB carries, mirrored from
/// the wire `LobKind` enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LobKind {
    Binary,
    Character,
    NationalCharacter,
}

impl LobKind {
    fn to_wire(self) -> i32 {
        match self {
            LobKind::Binary => 0,
            LobKind::Character => 1,
            LobKind::NationalCharacter => 2,
        }
    }
}

/// One outbound block, not yet carrying the session or LOB kind tag.
pub struct Frame {
    pub position: i64,
    pub payload: Vec<u8>,
    pub metadata: Vec<u8>,
}

impl Frame {
    pub fn into_block(self, lob_kind: LobKind, session: &SessionRef) -> pb::LobDataBlock {
        pb::LobDataBlock {
            lob_kind: lob_kind.to_wire(),
            session: Some(session.into()),
            position: self.position,
            payload: self.payload,
            metadata: self.metadata,
        }
    }
}

/// The always-first, empty-payload frame that establishes the LOB
/// before any data block. Its metadata carries whatever declared-length
/// / encoding hints the caller supplied.
pub fn start_frame(_family: DatabaseFamily, metadata: Vec<u8>) -> Frame {
    Frame {
        position: 1,
        payload: Vec::new(),
        metadata,
    }
}

/// Frames a chunk of LOB bytes into one or more data frames, given how
/// many bytes of this LOB have already been sent.
pub fn data_frames(family: DatabaseFamily, bytes: &[u8], sent_so_far: i64) -> Vec<Frame> {
    if bytes.is_empty() {
        return Vec::new();
    }
    match family {
        DatabaseFamily::H2 => vec![Frame {
            position: sent_so_far + 1,
            payload: bytes.to_vec(),
            metadata: Vec::new(),
        }],
        DatabaseFamily::Generic => bytes
            .chunks(LOB_BLOCK_SIZE)
            .enumerate()
            .map(|(i, chunk)| Frame {
                position: sent_so_far + (i * LOB_BLOCK_SIZE) as i64 + 1,
                payload: chunk.to_vec(),
                metadata: Vec::new(),
            })
            .collect(),
    }
}
