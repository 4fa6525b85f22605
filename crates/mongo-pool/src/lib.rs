//! # mongo-pool
//!
//! Bounded connection pool for document database drivers.
//!
//! The pool owns up to `max_connections` driver sessions, reuses the oldest
//! idle session that still answers a ping, and opens new sessions on demand
//! while capacity remains. Everything protocol-specific lives behind the
//! [`Driver`] trait.
//!
//! ## Features
//!
//! - Liveness probes with a per-call timeout on every acquire and count
//! - Configurable max pool size and connect/probe timeout
//! - Optional fail-fast when the pool is busy
//! - Release (close and free capacity) or return (keep for reuse)
//! - Capacity is never leaked by failed or cancelled connects
//! - Database/collection handles, named literally or after a Rust type
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongo_pool::{Pool, PoolConfig, Typed};
//!
//! let config = PoolConfig::from_env()?
//!     .max_connections(20)
//!     .timeout(Duration::from_secs(30));
//!
//! let pool = Pool::builder().name("blog").config(config).driver(driver).build()?;
//! let posts = pool.get_collection(Typed::<Post>::new()).await?;
//! // Use posts.connection().session()...
//! pool.return_connection(posts.connection().clone()).await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod database;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod pool;
mod registry;

pub use config::PoolConfig;
pub use connection::Connection;
pub use database::{Collection, CollectionName, Database, Typed};
pub use driver::Driver;
pub use error::{DriverError, PoolError};
pub use metrics::PoolMetricsSnapshot;
pub use pool::{Liveness, Pool, PoolBuilder, PoolFactory, PoolStatus};
