//! Request registry subsystem.
//!
//! # Data Flow
//! ```text
//! submit(options)
//!     → types.rs (RequestOptions → cancellation key, TransportRequest)
//!     → store.rs (evict same-key records when single-flight, append record)
//!     → requests.rs (spawn transport attempt)
//!     → outcome.rs (classify: resolve / reject / hold on 401)
//!     → ResponseFuture settles, record removed
//!
//! 401 answers:
//!     record stays in store.rs as Unauthorized
//!     → events.rs (Held) / has_unauthorized_request()
//!     → caller refreshes credentials
//!     → resubmit_unauthorized_requests() re-dispatches the same record
//! ```
//!
//! # Record States
//! ```text
//! InFlight → (2xx / 304)  → removed, future resolved
//! InFlight → (other/err)  → removed, future rejected
//! InFlight → (401)        → Unauthorized
//! Unauthorized → resubmit → InFlight (attempt + 1)
//! Unauthorized → TTL / capacity → removed, future rejected (Unauthorized)
//! Unauthorized → caller dropped its future → discarded on resubmit or overflow
//! any → same-key single-flight submit → removed, call aborted, future Superseded
//! ```

pub mod events;
pub mod outcome;
pub mod requests;
pub mod store;
pub mod types;

pub use events::RegistryEvent;
pub use outcome::ResponseFuture;
pub use requests::RequestRegistry;
pub use store::{RecordSnapshot, RecordStatus};
pub use types::{CallOptions, RequestError, RequestId, RequestOptions, RequestResult};
