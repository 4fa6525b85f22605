//! Connection pool implementation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;

use crate::config::{DEFAULT_POOL_NAME, PoolConfig};
use crate::connection::Connection;
use crate::database::{Collection, CollectionName, Database};
use crate::driver::Driver;
use crate::error::{DriverError, PoolError};
use crate::metrics::{Event, PoolMetrics, PoolMetricsSnapshot};
use crate::registry::{CheckIn, Registry, Removal, Reservation};

/// A connection pool for one logical name.
///
/// The pool tracks up to `max_connections` sessions. Acquiring reuses the
/// oldest idle session that still answers a ping; otherwise it opens a new
/// one while capacity remains. Once capacity is gone the pool either hands
/// out an untracked overflow session or, after
/// [`set_error_on_busy`](Pool::set_error_on_busy), fails with
/// [`PoolError::PoolExhausted`].
///
/// `Pool` is a cheap handle: clones share the same state.
pub struct Pool<D: Driver> {
    inner: Arc<PoolInner<D>>,
}

struct PoolInner<D: Driver> {
    driver: Arc<D>,
    config: PoolConfig,
    registry: Mutex<Registry<D::Session>>,
    metrics: PoolMetrics,
}

/// Result of one liveness scan over the tracked connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Connections that answered the probe.
    pub open: usize,
    /// Connections that failed or timed out.
    pub busy: usize,
}

impl<D: Driver> Pool<D> {
    /// Create a builder for a pool.
    #[must_use]
    pub fn builder() -> PoolBuilder<D> {
        PoolBuilder::new()
    }

    /// Create a pool named `name` over `driver`.
    pub fn new(
        name: impl Into<String>,
        config: PoolConfig,
        driver: Arc<D>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let name = name.into();
        tracing::info!(
            pool = %name,
            max_connections = config.max_connections,
            timeout = ?config.timeout,
            "connection pool initialized"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                driver,
                registry: Mutex::new(Registry::new(name, &config)),
                config,
                metrics: PoolMetrics::default(),
            }),
        })
    }

    /// Reset the pool to its configured defaults under `name`.
    ///
    /// Every tracked connection is dropped from the pool and its session
    /// closed. Connects already in flight finish as untracked connections.
    pub async fn init(&self, name: impl Into<String>) {
        let name = name.into();
        let dropped = self.inner.registry.lock().reset(name.clone(), &self.inner.config);
        tracing::info!(
            pool = %name,
            dropped = dropped.len(),
            max_connections = self.inner.config.max_connections,
            "connection pool initialized"
        );
        for conn in dropped {
            self.close_session(&conn).await;
        }
    }

    /// Get a connection from the pool.
    ///
    /// Returns the oldest idle connection that passes a liveness probe,
    /// otherwise opens a new one. Capacity taken for a new connection is
    /// given back if the connect fails, times out, or this future is
    /// dropped before it completes.
    pub async fn acquire_connection(&self) -> Result<Connection<D::Session>, PoolError> {
        let (pool, timeout, idle) = {
            let registry = self.inner.registry.lock();
            if registry.closed {
                return Err(PoolError::PoolClosed);
            }
            (registry.name.clone(), registry.timeout, registry.idle_snapshot())
        };

        tracing::trace!(pool = %pool, idle = idle.len(), "acquiring connection from pool");

        for candidate in self.healthy(idle, timeout).await {
            let claimed = self.inner.registry.lock().claim(candidate.id());
            if let Some(conn) = claimed {
                self.inner.metrics.record(Event::Acquired);
                self.inner.metrics.record(Event::Reused);
                tracing::debug!(pool = %pool, conn_id = conn.id(), "reusing idle connection");
                return Ok(conn);
            }
        }

        let reservation = {
            let mut registry = self.inner.registry.lock();
            if registry.closed {
                return Err(PoolError::PoolClosed);
            }
            match registry.reserve() {
                Some(reservation) => Some(reservation),
                None if registry.reject_when_busy => {
                    self.inner.metrics.record(Event::Rejected);
                    tracing::debug!(pool = %pool, "all connections are busy, rejecting");
                    return Err(PoolError::exhausted(pool));
                }
                None => None,
            }
        };
        let reservation = reservation.map(|reservation| CapacityReservation {
            registry: &self.inner.registry,
            reservation: Some(reservation),
        });

        let session = self.connect(timeout).await?;

        let conn = match reservation {
            Some(reservation) => {
                let conn = reservation.admit(session);
                if conn.is_tracked() {
                    self.inner.metrics.record(Event::Created);
                    tracing::debug!(pool = %pool, conn_id = conn.id(), "created connection");
                } else {
                    self.inner.metrics.record(Event::Overflow);
                    tracing::warn!(
                        pool = %pool,
                        conn_id = conn.id(),
                        "pool was reset during connect, connection is untracked"
                    );
                }
                conn
            }
            None => {
                let conn = Connection::new(session, false);
                self.inner.metrics.record(Event::Overflow);
                tracing::warn!(
                    pool = %pool,
                    conn_id = conn.id(),
                    "pool capacity exhausted, handing out untracked connection"
                );
                conn
            }
        };

        self.inner.metrics.record(Event::Acquired);
        Ok(conn)
    }

    /// Acquire a connection scoped to the configured database.
    pub async fn get_database(&self) -> Result<Database<D::Session>, PoolError> {
        let conn = self.acquire_connection().await?;
        Ok(Database::new(conn, Arc::clone(&self.inner.config.database)))
    }

    /// Acquire a connection and resolve a collection on it.
    ///
    /// `target` is a literal name or a [`Typed`](crate::Typed) placeholder.
    pub async fn get_collection(
        &self,
        target: impl CollectionName,
    ) -> Result<Collection<D::Session>, PoolError> {
        let database = self.get_database().await?;
        Ok(database.collection(target))
    }

    /// Remove a connection from the pool and close its session.
    ///
    /// Connections the pool does not track leave the pool untouched but are
    /// still closed. A handle from an earlier lease of a connection that has
    /// since been handed to someone else is ignored. Close failures are
    /// logged, never returned.
    pub async fn release_connection(&self, conn: Connection<D::Session>) {
        let (removal, capacity) = {
            let mut registry = self.inner.registry.lock();
            (registry.remove(&conn), registry.capacity())
        };
        match removal {
            Removal::Removed => {
                tracing::debug!(conn_id = conn.id(), capacity, "released connection");
            }
            Removal::Stale => {
                tracing::warn!(
                    conn_id = conn.id(),
                    "ignoring release of a connection leased to another holder"
                );
                return;
            }
            Removal::Unknown => {
                tracing::trace!(conn_id = conn.id(), "released connection was not tracked");
            }
        }
        self.close_session(&conn).await;
    }

    /// Hand a connection back for reuse without closing it.
    ///
    /// Untracked connections have nowhere to go and are closed instead.
    /// Handles from an earlier lease are ignored.
    pub async fn return_connection(&self, conn: Connection<D::Session>) {
        let outcome = self.inner.registry.lock().check_in(&conn);
        match outcome {
            CheckIn::Returned => {
                tracing::trace!(conn_id = conn.id(), "returned connection to pool");
            }
            CheckIn::NotLeased => {
                tracing::debug!(conn_id = conn.id(), "returned connection was not leased");
            }
            CheckIn::Stale => {
                tracing::warn!(
                    conn_id = conn.id(),
                    "ignoring return of a connection leased to another holder"
                );
            }
            CheckIn::Unknown => self.close_session(&conn).await,
        }
    }

    /// Tracked connections that currently answer a liveness probe.
    ///
    /// Every call probes every entry; order is creation order. Connections
    /// released while the probes ran are left out.
    /// The handles carry no lease, so the pool ignores them if they are
    /// returned or released.
    pub async fn open_connections(&self) -> Vec<Connection<D::Session>> {
        self.scan()
            .await
            .into_iter()
            .filter_map(|(conn, alive)| alive.then_some(conn))
            .collect()
    }

    /// Number of tracked connections that answer a liveness probe.
    pub async fn open_connections_count(&self) -> usize {
        self.liveness().await.open
    }

    /// Number of tracked connections that fail a liveness probe.
    ///
    /// A connection that does not answer within the timeout counts as
    /// busy, whether it is actually busy or gone.
    pub async fn busy_connections_count(&self) -> usize {
        self.liveness().await.busy
    }

    /// Probe every tracked connection once and count both outcomes.
    pub async fn liveness(&self) -> Liveness {
        let scanned = self.scan().await;
        let open = scanned.iter().filter(|(_, alive)| *alive).count();
        Liveness {
            open,
            busy: scanned.len() - open,
        }
    }

    /// Name of the pool.
    #[must_use]
    pub fn pool_name(&self) -> String {
        self.inner.registry.lock().name.clone()
    }

    /// Timeout applied to connects and probes.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.registry.lock().timeout
    }

    /// Maximum number of tracked connections.
    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.inner.registry.lock().max_connections
    }

    /// Configured minimum number of connections.
    #[must_use]
    pub fn min_connections(&self) -> u32 {
        self.inner.registry.lock().min_connections
    }

    /// Fail acquires with [`PoolError::PoolExhausted`] instead of handing
    /// out overflow connections. Stays set until the next [`init`](Pool::init).
    pub fn set_error_on_busy(&self) {
        let mut registry = self.inner.registry.lock();
        registry.reject_when_busy = true;
        tracing::debug!(pool = %registry.name, "busy-error policy enabled");
    }

    /// Has no effect.
    ///
    /// Pool sizes are fixed at construction; set them on [`PoolConfig`].
    #[deprecated(note = "pool sizes are fixed at construction; configure them on PoolConfig")]
    pub fn set_pool_size(&self, min: u32, max: u32) {
        tracing::debug!(min, max, "set_pool_size ignored");
    }

    /// Times a tracked connection has been leased, if it is tracked.
    #[must_use]
    pub fn checkout_count(&self, conn: &Connection<D::Session>) -> Option<u64> {
        self.inner.registry.lock().checkouts(conn.id())
    }

    /// Get the current pool status without probing.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.inner.registry.lock().status()
    }

    /// Get a snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Close the pool, closing every tracked connection.
    ///
    /// Later acquires fail with [`PoolError::PoolClosed`].
    pub async fn close(&self) {
        let (name, drained) = {
            let mut registry = self.inner.registry.lock();
            (registry.name.clone(), registry.drain())
        };
        for conn in &drained {
            self.close_session(conn).await;
        }
        tracing::info!(pool = %name, closed = drained.len(), "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().closed
    }

    /// Probe every tracked entry, then drop the ones removed meanwhile.
    async fn scan(&self) -> Vec<(Connection<D::Session>, bool)> {
        let (entries, timeout) = {
            let registry = self.inner.registry.lock();
            (registry.snapshot(), registry.timeout)
        };
        let probed = self.probe_all(entries, timeout).await;
        let registry = self.inner.registry.lock();
        probed
            .into_iter()
            .filter(|(conn, _)| registry.contains(conn.id()))
            .collect()
    }

    async fn connect(&self, timeout: Duration) -> Result<D::Session, PoolError> {
        let uri = &self.inner.config.uri;
        let outcome = tokio::time::timeout(timeout, self.inner.driver.connect(uri)).await;
        let source = match outcome {
            Ok(Ok(session)) => return Ok(session),
            Ok(Err(error)) => error,
            Err(_) => DriverError::Timeout(timeout),
        };
        self.inner.metrics.record(Event::ConnectFailed);
        tracing::warn!(uri = %uri, error = %source, "failed to open connection");
        Err(PoolError::ConnectFailed {
            uri: uri.to_string(),
            source,
        })
    }

    /// Probe `conns` concurrently, keeping the ones that answered in order.
    async fn healthy(
        &self,
        conns: Vec<Connection<D::Session>>,
        timeout: Duration,
    ) -> Vec<Connection<D::Session>> {
        self.probe_all(conns, timeout)
            .await
            .into_iter()
            .filter_map(|(conn, alive)| alive.then_some(conn))
            .collect()
    }

    async fn probe_all(
        &self,
        conns: Vec<Connection<D::Session>>,
        timeout: Duration,
    ) -> Vec<(Connection<D::Session>, bool)> {
        let probes = conns.iter().map(|conn| self.probe(conn, timeout));
        let results = join_all(probes).await;
        conns.into_iter().zip(results).collect()
    }

    async fn probe(&self, conn: &Connection<D::Session>, timeout: Duration) -> bool {
        self.inner.metrics.record(Event::Probed);
        let outcome = tokio::time::timeout(timeout, self.inner.driver.ping(conn.session())).await;
        let error = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(error)) => error,
            Err(_) => DriverError::Timeout(timeout),
        };
        self.inner.metrics.record(Event::ProbeFailed);
        tracing::trace!(conn_id = conn.id(), error = %error, "liveness probe failed");
        false
    }

    async fn close_session(&self, conn: &Connection<D::Session>) {
        let timeout = self.inner.config.timeout;
        let outcome = tokio::time::timeout(timeout, self.inner.driver.close(conn.session()))
            .await
            .unwrap_or(Err(DriverError::Timeout(timeout)));
        match outcome {
            Ok(()) => {
                self.inner.metrics.record(Event::Closed);
                tracing::trace!(conn_id = conn.id(), "closed connection");
            }
            Err(error) => {
                self.inner.metrics.record(Event::CloseFailed);
                tracing::warn!(conn_id = conn.id(), error = %error, "failed to close connection");
            }
        }
    }
}

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("Pool")
            .field("name", &registry.name)
            .field("tracked", &registry.len())
            .field("capacity", &registry.capacity())
            .field("closed", &registry.closed)
            .finish_non_exhaustive()
    }
}

/// One capacity unit held across a connect.
///
/// Dropping it without [`admit`](CapacityReservation::admit), whether the
/// connect failed or the acquiring future was cancelled, returns the unit.
struct CapacityReservation<'a, S> {
    registry: &'a Mutex<Registry<S>>,
    reservation: Option<Reservation>,
}

impl<S> CapacityReservation<'_, S> {
    fn admit(mut self, session: S) -> Connection<S> {
        match self.reservation.take() {
            Some(reservation) => self.registry.lock().admit(reservation, session),
            None => Connection::new(session, false),
        }
    }
}

impl<S> Drop for CapacityReservation<'_, S> {
    fn drop(&mut self) {
        if let Some(reservation) = self.reservation.take() {
            self.registry.lock().unreserve(reservation);
            tracing::trace!("returned unused capacity reservation");
        }
    }
}

/// Builder for [`Pool`].
pub struct PoolBuilder<D: Driver> {
    name: String,
    config: PoolConfig,
    driver: Option<Arc<D>>,
}

impl<D: Driver> PoolBuilder<D> {
    /// Create a builder with default configuration and the default name.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            config: PoolConfig::default(),
            driver: None,
        }
    }

    /// Set the pool name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the driver.
    #[must_use]
    pub fn driver(mut self, driver: D) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Set a driver shared with other pools.
    #[must_use]
    pub fn shared_driver(mut self, driver: Arc<D>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the endpoint URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<Arc<str>>) -> Self {
        self.config = self.config.uri(uri);
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<Arc<str>>) -> Self {
        self.config = self.config.database(database);
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.config = self.config.max_connections(count);
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.config = self.config.min_connections(count);
        self
    }

    /// Set the connect/probe timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Fail acquires when the pool is busy.
    #[must_use]
    pub fn error_on_busy(mut self, enabled: bool) -> Self {
        self.config = self.config.error_on_busy(enabled);
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool<D>, PoolError> {
        let driver = self
            .driver
            .ok_or_else(|| PoolError::Configuration("a driver is required".into()))?;
        Pool::new(self.name, self.config, driver)
    }
}

impl<D: Driver> Default for PoolBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates pools that share one driver and configuration.
pub struct PoolFactory<D: Driver> {
    driver: Arc<D>,
    config: PoolConfig,
}

impl<D: Driver> PoolFactory<D> {
    /// Create a factory.
    pub fn new(driver: Arc<D>, config: PoolConfig) -> Self {
        Self { driver, config }
    }

    /// Create a fresh pool named `name`.
    pub fn create(&self, name: impl Into<String>) -> Result<Pool<D>, PoolError> {
        Pool::new(name, self.config.clone(), Arc::clone(&self.driver))
    }

    /// Create a fresh pool with the default name.
    pub fn create_default(&self) -> Result<Pool<D>, PoolError> {
        self.create(DEFAULT_POOL_NAME)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections the pool tracks.
    pub tracked: u32,
    /// Tracked connections nobody holds.
    pub idle: u32,
    /// Tracked connections currently handed out.
    pub leased: u32,
    /// Connections that may still be created.
    pub capacity: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Calculate pool utilization as a percentage (0.0 - 100.0).
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.leased as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool can create no more tracked connections.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.capacity == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_utilization() {
        let status = PoolStatus {
            tracked: 4,
            idle: 1,
            leased: 3,
            capacity: 6,
            max: 10,
        };
        assert!((status.utilization() - 30.0).abs() < f64::EPSILON);
        assert!(!status.is_at_capacity());
    }

    #[test]
    fn test_status_utilization_zero_max() {
        let status = PoolStatus {
            tracked: 0,
            idle: 0,
            leased: 0,
            capacity: 0,
            max: 0,
        };
        assert_eq!(status.utilization(), 0.0);
        assert!(status.is_at_capacity());
    }
}
