//! Test fixture utilities.

use std::time::Duration;

use mongo_pool::{Pool, PoolConfig};

use crate::mock_driver::MockDriver;

/// URI every fixture pool connects to.
pub const TEST_URI: &str = "mock://localhost:27017";

/// Database every fixture pool is scoped to.
pub const TEST_DATABASE: &str = "testdb";

/// Connect/probe timeout used by fixture pools.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Pool fixture describing the pool a test wants.
#[derive(Debug, Clone)]
pub struct TestPool {
    /// Pool name.
    pub name: String,
    /// Maximum tracked connections.
    pub max_connections: u32,
    /// Whether acquires fail when the pool is busy.
    pub error_on_busy: bool,
    /// Connect/probe timeout.
    pub timeout: Duration,
}

impl TestPool {
    /// Fixture named `name` with room for `max_connections`.
    #[must_use]
    pub fn new(name: impl Into<String>, max_connections: u32) -> Self {
        Self {
            name: name.into(),
            max_connections,
            error_on_busy: false,
            timeout: TEST_TIMEOUT,
        }
    }

    /// Fail acquires when the pool is busy.
    #[must_use]
    pub fn error_on_busy(mut self) -> Self {
        self.error_on_busy = true;
        self
    }

    /// Use a different timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configuration matching this fixture.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        PoolConfig::new()
            .uri(TEST_URI)
            .database(TEST_DATABASE)
            .max_connections(self.max_connections)
            .timeout(self.timeout)
            .error_on_busy(self.error_on_busy)
    }

    /// Build the pool over `driver`.
    ///
    /// # Panics
    ///
    /// Panics if the fixture describes an invalid configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(&self, driver: &MockDriver) -> Pool<MockDriver> {
        Pool::builder()
            .name(self.name.clone())
            .config(self.config())
            .driver(driver.clone())
            .build()
            .expect("fixture pool configuration is valid")
    }
}

/// Route `tracing` output to the test harness once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mongo_pool=debug")),
        )
        .with_test_writer()
        .try_init();
}
