//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RequestRegistry / HttpTransport produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → Whatever tracing subscriber the application installs (init_logging for the CLI)
//!     → Whatever metrics recorder the application installs (none by default)
//! ```
//!
//! # Design Decisions
//! - The library never installs a global recorder or subscriber on its own
//! - Request IDs appear as structured fields on every registry event

pub mod logging;
pub mod metrics;
