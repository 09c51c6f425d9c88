//! Client-side request registry.
//!
//! Tracks in-flight HTTP requests, cancels superseded single-flight requests
//! by logical identifier, and holds requests answered with 401 until the
//! application refreshes credentials and resubmits them.
//!
//! ```text
//! caller → Client verbs → RequestRegistry → Transport (reqwest) → network
//! ```

pub mod client;
pub mod config;
pub mod observability;
pub mod registry;
pub mod transport;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use registry::{
    CallOptions, RegistryEvent, RequestError, RequestOptions, RequestRegistry, ResponseFuture,
};
pub use transport::{HttpTransport, Transport};
