//! Scriptable in-memory driver.
//!
//! `MockDriver` hands out [`MockSession`]s without any I/O. Tests script how
//! the next connects behave and flip individual sessions between alive,
//! unreachable and hanging to drive the pool's liveness classification.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongo_pool::{Driver, DriverError};
use parking_lot::Mutex;

/// How a scripted connect behaves.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    /// Return a fresh session immediately.
    Succeed,
    /// Return a fresh session after the given delay.
    Delay(Duration),
    /// Fail with the given error.
    Fail(DriverError),
    /// Never complete.
    Hang,
}

/// How a session answers pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingBehavior {
    /// Answer immediately.
    Alive,
    /// Fail immediately.
    Unreachable,
    /// Never answer.
    Hang,
}

/// Session produced by [`MockDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSession {
    /// Sequence number assigned by the driver, starting at 1.
    pub id: u64,
    /// URI the session was opened against.
    pub uri: String,
}

#[derive(Debug)]
struct MockState {
    script: VecDeque<ConnectBehavior>,
    next_id: u64,
    connect_attempts: u64,
    pings: HashMap<u64, PingBehavior>,
    closed: Vec<u64>,
    fail_close: bool,
}

/// In-memory [`Driver`] with scripted behaviour.
///
/// Clones share state, so a test can keep one clone while the pool owns
/// another.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Driver whose connects all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                script: VecDeque::new(),
                next_id: 1,
                connect_attempts: 0,
                pings: HashMap::new(),
                closed: Vec::new(),
                fail_close: false,
            })),
        }
    }

    /// Queue the behaviour of the next unscripted connect.
    ///
    /// Once the queue is empty connects succeed.
    #[must_use]
    pub fn with_connect(self, behavior: ConnectBehavior) -> Self {
        self.push_connect(behavior);
        self
    }

    /// Queue the behaviour of a later connect.
    pub fn push_connect(&self, behavior: ConnectBehavior) {
        self.state.lock().script.push_back(behavior);
    }

    /// Make closes report failure.
    pub fn fail_closes(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Set how `session` answers pings.
    pub fn set_ping(&self, session: &MockSession, behavior: PingBehavior) {
        self.state.lock().pings.insert(session.id, behavior);
    }

    /// Make `session` fail its pings.
    pub fn kill(&self, session: &MockSession) {
        self.set_ping(session, PingBehavior::Unreachable);
    }

    /// Make `session` answer its pings again.
    pub fn revive(&self, session: &MockSession) {
        self.set_ping(session, PingBehavior::Alive);
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.state.lock().next_id - 1
    }

    /// Connect calls so far, successful or not.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.state.lock().connect_attempts
    }

    /// Ids of closed sessions, in close order.
    #[must_use]
    pub fn closed(&self) -> Vec<u64> {
        self.state.lock().closed.clone()
    }

    /// Whether `session` has been closed.
    #[must_use]
    pub fn is_closed(&self, session: &MockSession) -> bool {
        self.state.lock().closed.contains(&session.id)
    }

    fn open(&self, uri: &str) -> MockSession {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.pings.insert(id, PingBehavior::Alive);
        MockSession {
            id,
            uri: uri.to_string(),
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Session = MockSession;

    async fn connect(&self, uri: &str) -> Result<MockSession, DriverError> {
        let behavior = {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            state.script.pop_front().unwrap_or(ConnectBehavior::Succeed)
        };
        tracing::trace!(uri, ?behavior, "mock connect");
        match behavior {
            ConnectBehavior::Succeed => Ok(self.open(uri)),
            ConnectBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open(uri))
            }
            ConnectBehavior::Fail(error) => Err(error),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn ping(&self, session: &MockSession) -> Result<(), DriverError> {
        let behavior = {
            let state = self.state.lock();
            if state.closed.contains(&session.id) {
                return Err(DriverError::Closed);
            }
            state
                .pings
                .get(&session.id)
                .copied()
                .unwrap_or(PingBehavior::Unreachable)
        };
        match behavior {
            PingBehavior::Alive => Ok(()),
            PingBehavior::Unreachable => Err(DriverError::Unreachable(format!(
                "mock session {} is down",
                session.id
            ))),
            PingBehavior::Hang => std::future::pending().await,
        }
    }

    async fn close(&self, session: &MockSession) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        tracing::trace!(session_id = session.id, "mock close");
        state.closed.push(session.id);
        if state.fail_close {
            return Err(DriverError::Unreachable("close failed".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_assigns_sequential_ids() {
        let driver = MockDriver::new();
        let a = driver.connect("mock://a").await.unwrap();
        let b = driver.connect("mock://b").await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(b.uri, "mock://b");
        assert_eq!(driver.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failure_then_success() {
        let driver =
            MockDriver::new().with_connect(ConnectBehavior::Fail(DriverError::Connect("refused".into())));

        assert!(driver.connect("mock://x").await.is_err());
        assert!(driver.connect("mock://x").await.is_ok());
        assert_eq!(driver.connect_attempts(), 2);
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_ping_follows_kill_revive_and_close() {
        let driver = MockDriver::new();
        let session = driver.connect("mock://x").await.unwrap();

        assert!(driver.ping(&session).await.is_ok());
        driver.kill(&session);
        assert!(driver.ping(&session).await.is_err());
        driver.revive(&session);
        assert!(driver.ping(&session).await.is_ok());

        driver.close(&session).await.unwrap();
        assert_eq!(driver.ping(&session).await, Err(DriverError::Closed));
        assert!(driver.is_closed(&session));
    }
}
