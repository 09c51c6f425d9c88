//! Lifecycle events broadcast by the registry.

use crate::registry::types::RequestId;

/// A state transition of a tracked request.
///
/// Token-refresh flows subscribe and react to [`RegistryEvent::Held`] instead
/// of polling `has_unauthorized_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Handed to the transport. `attempt` is 1 for the first dispatch.
    Dispatched {
        id: RequestId,
        identifier: String,
        attempt: u32,
    },
    Resolved {
        id: RequestId,
    },
    /// `status` is `None` when the transport produced no response.
    Rejected {
        id: RequestId,
        status: Option<u16>,
    },
    /// Answered 401 and kept for resubmission.
    Held {
        id: RequestId,
    },
    /// Evicted by a newer single-flight request.
    Superseded {
        id: RequestId,
        identifier: String,
    },
    /// Dropped from the unauthorized hold without resubmission.
    Released {
        id: RequestId,
    },
}

impl RegistryEvent {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Dispatched { id, .. }
            | Self::Resolved { id }
            | Self::Rejected { id, .. }
            | Self::Held { id }
            | Self::Superseded { id, .. }
            | Self::Released { id } => *id,
        }
    }
}
