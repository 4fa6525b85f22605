//! Driver capability consumed by the pool.
//!
//! The pool knows nothing about the wire protocol, authentication or the
//! document API. It only needs a way to open a session for a URI, to check
//! that a session still answers, and to close it. Database drivers plug in by
//! implementing [`Driver`].

use async_trait::async_trait;

use crate::error::DriverError;

/// Connection lifecycle operations provided by a database driver.
///
/// Implementations do not need to enforce deadlines themselves: the pool
/// wraps [`connect`](Driver::connect) and [`ping`](Driver::ping) in its
/// configured timeout and abandons the future when it elapses. A driver
/// that holds resources across an abandoned `connect` must release them on
/// drop.
///
/// `#[async_trait]` keeps the trait usable behind `Arc<dyn Driver<Session = S>>`.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Session handle produced by a successful connect.
    type Session: Send + Sync + 'static;

    /// Open and authenticate a new session against `uri`.
    async fn connect(&self, uri: &str) -> Result<Self::Session, DriverError>;

    /// Check that the session is alive and responsive.
    ///
    /// Typically a round-trip `ping` command against the primary.
    async fn ping(&self, session: &Self::Session) -> Result<(), DriverError>;

    /// Tear the session down.
    ///
    /// Other clones of the owning [`Connection`](crate::Connection) may
    /// still exist when this is called; the session must tolerate use after
    /// close by returning errors.
    async fn close(&self, session: &Self::Session) -> Result<(), DriverError>;
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for std::sync::Arc<D> {
    type Session = D::Session;

    async fn connect(&self, uri: &str) -> Result<Self::Session, DriverError> {
        (**self).connect(uri).await
    }

    async fn ping(&self, session: &Self::Session) -> Result<(), DriverError> {
        (**self).ping(session).await
    }

    async fn close(&self, session: &Self::Session) -> Result<(), DriverError> {
        (**self).close(session).await
    }
}
