//! Generic invoke-remote-operation framing for opaque server-side
//! resources (§4.6).

use crate::pb;
use crate::session::SessionRef;

/// The kind of server-side resource a [`CallResourceRequest`] targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Connection,
    Statement,
    ResultSet,
    Lob,
    Savepoint,
    Transaction,
}

impl ResourceKind {
    fn to_wire(self) -> i32 {
        match self {
            ResourceKind::Connection => 0,
            ResourceKind::Statement => 1,
            ResourceKind::ResultSet => 2,
            ResourceKind::Lob => 3,
            ResourceKind::Savepoint => 4,
            ResourceKind::Transaction => 5,
        }
    }
}

/// The kind of operation a [`TargetCall`] invokes on the resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Get,
    Set,
    Call,
    Update,
    Length,
    Free,
}

impl CallKind {
    fn to_wire(self) -> i32 {
        match self {
            CallKind::Get => 0,
            CallKind::Set => 1,
            CallKind::Call => 2,
            CallKind::Update => 3,
            CallKind::Length => 4,
            CallKind::Free => 5,
        }
    }
}

/// The member to invoke on the resource plus its serialized parameters.
#[derive(Clone, Debug)]
pub struct TargetCall {
    pub call_kind: CallKind,
    pub member_name: String,
    pub serialized_params: Vec<Vec<u8>>,
}

/// A request to invoke an arbitrary remote operation on a named
/// server-side resource.
#[derive(Clone, Debug)]
pub struct CallResourceRequest {
    pub resource_kind: ResourceKind,
    pub resource_identifier: String,
    pub target_call: TargetCall,
}

/// The shape the caller expects the response value to take. `Void`
/// suppresses deserialization entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    String,
    Int,
    Bool,
    Bytes,
}

impl ReturnShape {
    fn from_wire(value: i32) -> Self {
        match value {
            1 => ReturnShape::String,
            2 => ReturnShape::Int,
            3 => ReturnShape::Bool,
            4 => ReturnShape::Bytes,
            _ => ReturnShape::Void,
        }
    }
}

/// The response to a [`CallResourceRequest`]: a replacement session plus
/// the raw value, tagged with the shape the caller should interpret it
/// as.
#[derive(Clone, Debug)]
pub struct CallResourceResponse {
    pub session: SessionRef,
    pub shape: ReturnShape,
    pub value: Vec<u8>,
}

impl CallResourceRequest {
    pub(crate) fn into_wire(self, session: &SessionRef) -> pb::CallResourceRequest {
        pb::CallResourceRequest {
            session: Some(session.into()),
            resource_kind: self.resource_kind.to_wire(),
            resource_identifier: self.resource_identifier,
            target_call: Some(pb::TargetCall {
                call_kind: self.target_call.call_kind.to_wire(),
                member_name: self.target_call.member_name,
                serialized_params: self.target_call.serialized_params,
            }),
        }
    }
}

impl From<pb::CallResourceResponse> for CallResourceResponse {
    fn from(resp: pb::CallResourceResponse) -> Self {
        CallResourceResponse {
            session: resp.session.into(),
            shape: ReturnShape::from_wire(resp.shape),
            value: resp.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_shape_unknown_wire_values_fall_back_to_void() {
        assert_eq!(ReturnShape::from_wire(99), ReturnShape::Void);
        assert_eq!(ReturnShape::from_wire(0), ReturnShape::Void);
        assert_eq!(ReturnShape::from_wire(4), ReturnShape::Bytes);
    }

    #[test]
    fn resource_request_converts_into_wire_shape() {
        let req = CallResourceRequest {
            resource_kind: ResourceKind::Lob,
            resource_identifier: "lob-1".into(),
            target_call: TargetCall {
                call_kind: CallKind::Free,
                member_name: "free".into(),
                serialized_params: vec![],
            },
        };
        let wire = req.into_wire(&SessionRef::empty());
        assert_eq!(wire.resource_kind, 3);
        assert_eq!(wire.target_call.unwrap().call_kind, 5);
    }
}
