//! Connection handles handed out by the pool.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A handle to a live database session.
///
/// Cloning a `Connection` is cheap and yields a handle to the same session;
/// the pool keeps one clone per tracked entry. Identity is the
/// process-unique [`id`](Connection::id), not the session value.
///
/// Each handle also carries the lease it was handed out under. Clones share
/// it, so a clone kept after returning the connection goes stale once the
/// pool leases the connection to someone else, and the pool then ignores it.
pub struct Connection<S> {
    inner: Arc<ConnectionInner<S>>,
    lease: u64,
}

struct ConnectionInner<S> {
    id: u64,
    created_at: Instant,
    tracked: bool,
    session: S,
}

impl<S> Connection<S> {
    pub(crate) fn new(session: S, tracked: bool) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                created_at: Instant::now(),
                tracked,
                session,
            }),
            lease: 0,
        }
    }

    /// A handle to the same session stamped with `lease`.
    pub(crate) fn leased(&self, lease: u64) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lease,
        }
    }

    pub(crate) fn lease(&self) -> u64 {
        self.lease
    }

    /// Unique identifier for this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The driver session.
    #[must_use]
    pub fn session(&self) -> &S {
        &self.inner.session
    }

    /// When the session was established.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Time since the session was established.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    /// Whether the pool counted this connection against its capacity.
    ///
    /// Overflow connections, created after capacity ran out, are not
    /// tracked: releasing them closes the session and nothing else.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.inner.tracked
    }

    /// Check whether two handles refer to the same connection.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Clone for Connection<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lease: self.lease,
        }
    }
}

impl<S> PartialEq for Connection<S> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<S> Eq for Connection<S> {}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("tracked", &self.inner.tracked)
            .field("lease", &self.lease)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Connection::new("a", true);
        let b = Connection::new("a", true);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert!(!a.same_as(&b));
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = Connection::new(7_u32, false);
        let b = a.clone();
        assert_eq!(a, b);
        assert!(a.same_as(&b));
        assert_eq!(*b.session(), 7);
        assert!(!b.is_tracked());
    }

    #[test]
    fn test_leased_handle_keeps_identity() {
        let a = Connection::new("a", true);
        let renewed = a.leased(3);
        assert_eq!(a, renewed);
        assert!(a.same_as(&renewed));
        assert_eq!(a.lease(), 0);
        assert_eq!(renewed.lease(), 3);
        assert_eq!(renewed.clone().lease(), 3);
    }

    #[test]
    fn test_debug_hides_session() {
        let conn = Connection::new("secret-token", true);
        let rendered = format!("{conn:?}");
        assert!(rendered.contains("tracked: true"));
        assert!(!rendered.contains("secret-token"));
    }
}
