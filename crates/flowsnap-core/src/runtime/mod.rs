//! Runtime initialization and lifecycle management.
//!
//! Turns an [`AppConfig`](crate::config::AppConfig) into one
//! [`SnapshotPipeline`](crate::pipeline::SnapshotPipeline) per chain, all sharing one
//! HTTP client, one in-flight read semaphore and one
//! [`SnapshotStore`](crate::snapshot::SnapshotStore).
//!
//! # Example
//!
//! ```no_run
//! use flowsnap_core::{config::AppConfig, runtime::SnapshotRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!
//!     let mut runtime = SnapshotRuntime::builder().with_config(config).build()?;
//!     runtime.hydrate().await;
//!     runtime.start_schedulers();
//!
//!     // Serve reads from runtime.store() ...
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod lifecycle;

pub use builder::{RuntimeError, SnapshotRuntimeBuilder};
pub use lifecycle::SnapshotRuntime;
