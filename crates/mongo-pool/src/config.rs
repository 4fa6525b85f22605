//! Pool configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PoolError;

/// Default number of connections a pool may create.
///
/// Used both as the initial capacity and as `max_connections`.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Default timeout applied to every connect and liveness probe.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Name used by [`PoolFactory::create_default`](crate::PoolFactory::create_default).
pub const DEFAULT_POOL_NAME: &str = "root";

/// Default endpoint when none is configured.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Default database name when none is configured.
pub const DEFAULT_DATABASE: &str = "test";

/// Environment variable holding the endpoint URI.
pub const ENV_URI: &str = "MONGO_URL";
/// Environment variable holding the database name.
pub const ENV_DATABASE: &str = "MONGO_DATABASE";
/// Environment variable holding the pool size.
pub const ENV_POOL_SIZE: &str = "MONGO_POOL_SIZE";
/// Environment variable holding the timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "MONGO_POOL_TIMEOUT_SECS";

/// Endpoint, database and sizing for one pool.
///
/// Start from [`PoolConfig::new`] or [`PoolConfig::from_env`] and adjust
/// with the chained setters; fields cannot be set by struct literal.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Endpoint URI handed to the driver on every connect.
    pub uri: Arc<str>,

    /// Database that [`Pool::get_database`](crate::Pool::get_database) scopes to.
    pub database: Arc<str>,

    /// Minimum number of connections. Informational only.
    pub min_connections: u32,

    /// Maximum number of tracked connections, also the initial capacity.
    pub max_connections: u32,

    /// Bound applied to each connect and each liveness probe.
    pub timeout: Duration,

    /// Fail acquires with [`PoolError::PoolExhausted`] instead of handing out
    /// untracked overflow connections.
    pub error_on_busy: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            uri: Arc::from(DEFAULT_URI),
            database: Arc::from(DEFAULT_DATABASE),
            min_connections: 0,
            max_connections: DEFAULT_POOL_SIZE,
            timeout: DEFAULT_TIMEOUT,
            error_on_busy: false,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `MONGO_*` environment variables.
    ///
    /// Unset variables keep their defaults. Set but unparsable numeric
    /// variables are reported as [`PoolError::Configuration`].
    pub fn from_env() -> Result<Self, PoolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PoolError> {
        let mut config = Self::default();

        if let Some(uri) = lookup(ENV_URI) {
            config.uri = uri.into();
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = database.into();
        }
        if let Some(size) = lookup(ENV_POOL_SIZE) {
            config.max_connections = size.trim().parse().map_err(|_| {
                PoolError::Configuration(format!("{ENV_POOL_SIZE} is not a valid size: {size}"))
            })?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                PoolError::Configuration(format!(
                    "{ENV_TIMEOUT_SECS} is not a number of seconds: {secs}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the endpoint URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<Arc<str>>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<Arc<str>>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the connect/probe timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable failing acquires when the pool is busy.
    #[must_use]
    pub fn error_on_busy(mut self, enabled: bool) -> Self {
        self.error_on_busy = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// A `max_connections` of zero is accepted: such a pool never tracks a
    /// connection and every acquire is either overflow or rejected.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.uri.trim().is_empty() {
            return Err(PoolError::Configuration("uri must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(PoolError::Configuration(
                "database must not be empty".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::Configuration(
                "min_connections cannot be greater than max_connections".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.max_connections, DEFAULT_POOL_SIZE);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(!config.error_on_busy);
        assert_eq!(&*config.uri, DEFAULT_URI);
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .uri("mongodb://db.internal:27017")
            .database("blog")
            .min_connections(2)
            .max_connections(8)
            .timeout(Duration::from_secs(10))
            .error_on_busy(true);

        assert_eq!(&*config.uri, "mongodb://db.internal:27017");
        assert_eq!(&*config.database, "blog");
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.error_on_busy);
    }

    #[test]
    fn test_config_validation_min_greater_than_max() {
        let config = PoolConfig::new().min_connections(20).max_connections(10);

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("min_connections cannot be greater than max_connections")
        );
    }

    #[test]
    fn test_config_validation_allows_zero_max() {
        let config = PoolConfig::new().max_connections(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_uri() {
        let config = PoolConfig::new().uri("  ");
        assert!(config.validate().unwrap_err().to_string().contains("uri"));
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            (ENV_URI, "mongodb://cache:27017"),
            (ENV_DATABASE, "foodblog"),
            (ENV_POOL_SIZE, " 4 "),
            (ENV_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();

        assert_eq!(&*config.uri, "mongodb://cache:27017");
        assert_eq!(&*config.database, "foodblog");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_keeps_defaults_when_unset() {
        let config = PoolConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_connections, DEFAULT_POOL_SIZE);
        assert_eq!(&*config.database, DEFAULT_DATABASE);
    }

    #[test]
    fn test_from_lookup_rejects_bad_size() {
        let err = PoolConfig::from_lookup(lookup_from(&[(ENV_POOL_SIZE, "lots")])).unwrap_err();
        assert!(err.to_string().contains(ENV_POOL_SIZE));
    }
}
