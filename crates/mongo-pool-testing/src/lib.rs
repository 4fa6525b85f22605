//! # mongo-pool-testing
//!
//! Test infrastructure for the connection pool.
//!
//! ## Features
//!
//! - [`MockDriver`](mock_driver::MockDriver): an in-memory driver with
//!   scripted connect outcomes and per-session ping behaviour
//! - Pool fixtures with short timeouts and a fixed test endpoint
//! - `tracing` output routed to the test harness
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongo_pool_testing::{MockDriver, TestPool};
//!
//! #[tokio::test]
//! async fn test_with_mock_driver() {
//!     let driver = MockDriver::new();
//!     let pool = TestPool::new("orders", 2).error_on_busy().build(&driver);
//!
//!     let conn = pool.acquire_connection().await.unwrap();
//!     driver.kill(conn.session());
//!     assert_eq!(pool.busy_connections_count().await, 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_driver;

pub use fixtures::{TestPool, init_tracing};
pub use mock_driver::{ConnectBehavior, MockDriver, MockSession, PingBehavior};
