//! Entry registry: the connections a pool owns and its remaining capacity.
//!
//! Everything here is synchronous and lives behind the pool's mutex. The
//! registry never awaits; the pool snapshots it, does driver I/O unlocked,
//! then comes back to claim, admit or remove entries.
//!
//! Invariant: `capacity + entries.len() + reserved == max_connections`,
//! where `reserved` counts capacity units handed out by
//! [`Registry::reserve`] that are neither admitted nor returned yet.
//!
//! Every lease gets a fresh stamp. Check-ins and removals only act on a
//! handle carrying the entry's current stamp.

use std::time::Duration;

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::pool::PoolStatus;

/// Lease state of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeaseState {
    /// Tracked and available to the next acquirer.
    Idle,
    /// Handed to exactly one acquirer.
    Leased,
}

#[derive(Debug)]
pub(crate) struct Entry<S> {
    pub(crate) conn: Connection<S>,
    pub(crate) state: LeaseState,
    pub(crate) lease: u64,
    pub(crate) checkouts: u64,
}

/// Outcome of handing a connection back with [`Registry::check_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckIn {
    /// The entry was leased and is idle again.
    Returned,
    /// The entry exists but was not leased.
    NotLeased,
    /// The entry has been leased again since this handle was issued.
    Stale,
    /// No entry with that id.
    Unknown,
}

/// Outcome of [`Registry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The entry was removed and its capacity unit restored.
    Removed,
    /// The entry has been leased again since this handle was issued.
    Stale,
    /// No entry with that id.
    Unknown,
}

/// Token for one reserved capacity unit.
///
/// Stamped with the registry generation so that a reservation taken before
/// a reset can neither restore capacity nor add an entry afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    generation: u64,
}

#[derive(Debug)]
pub(crate) struct Registry<S> {
    pub(crate) name: String,
    pub(crate) max_connections: u32,
    pub(crate) min_connections: u32,
    pub(crate) timeout: Duration,
    pub(crate) reject_when_busy: bool,
    pub(crate) closed: bool,
    capacity: u32,
    entries: Vec<Entry<S>>,
    generation: u64,
    next_lease: u64,
}

impl<S> Registry<S> {
    pub(crate) fn new(name: impl Into<String>, config: &PoolConfig) -> Self {
        Self {
            name: name.into(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            timeout: config.timeout,
            reject_when_busy: config.error_on_busy,
            closed: false,
            capacity: config.max_connections,
            entries: Vec::new(),
            generation: 0,
            next_lease: 1,
        }
    }

    /// Reset to the configured defaults under a new name.
    ///
    /// Returns the connections that were tracked so the caller can close
    /// them. Outstanding reservations are invalidated.
    pub(crate) fn reset(&mut self, name: impl Into<String>, config: &PoolConfig) -> Vec<Connection<S>> {
        let generation = self.generation.wrapping_add(1);
        let old = std::mem::replace(self, Self::new(name, config));
        self.generation = generation;
        self.next_lease = old.next_lease;
        old.entries.into_iter().map(|entry| entry.conn).collect()
    }

    /// Mark the registry closed and hand back every tracked connection.
    pub(crate) fn drain(&mut self) -> Vec<Connection<S>> {
        self.closed = true;
        self.generation = self.generation.wrapping_add(1);
        self.capacity = self.max_connections;
        self.entries.drain(..).map(|entry| entry.conn).collect()
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// All tracked connections in creation order.
    pub(crate) fn snapshot(&self) -> Vec<Connection<S>> {
        self.entries.iter().map(|entry| entry.conn.clone()).collect()
    }

    /// Tracked connections nobody holds, in creation order.
    pub(crate) fn idle_snapshot(&self) -> Vec<Connection<S>> {
        self.entries
            .iter()
            .filter(|entry| entry.state == LeaseState::Idle)
            .map(|entry| entry.conn.clone())
            .collect()
    }

    /// Whether an entry with `id` is still tracked.
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|entry| entry.conn.id() == id)
    }

    /// Lease the entry with `id` if it is still tracked and idle.
    ///
    /// Returns a handle stamped with the new lease.
    pub(crate) fn claim(&mut self, id: u64) -> Option<Connection<S>> {
        let lease = self.next_lease;
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.conn.id() == id && entry.state == LeaseState::Idle)?;
        entry.state = LeaseState::Leased;
        entry.lease = lease;
        entry.checkouts += 1;
        self.next_lease += 1;
        Some(entry.conn.leased(lease))
    }

    /// Take one unit of capacity for a connection about to be opened.
    pub(crate) fn reserve(&mut self) -> Option<Reservation> {
        if self.closed || self.capacity == 0 {
            return None;
        }
        self.capacity -= 1;
        Some(Reservation {
            generation: self.generation,
        })
    }

    /// Give back a unit whose connect never completed.
    pub(crate) fn unreserve(&mut self, reservation: Reservation) {
        if reservation.generation == self.generation {
            self.capacity += 1;
        }
    }

    /// Turn a reservation and a fresh session into a leased, tracked entry.
    ///
    /// A reservation from before a reset or close yields an untracked
    /// connection instead, leaving the new state untouched.
    pub(crate) fn admit(&mut self, reservation: Reservation, session: S) -> Connection<S> {
        if reservation.generation != self.generation || self.closed {
            return Connection::new(session, false);
        }
        let lease = self.next_lease;
        self.next_lease += 1;
        let conn = Connection::new(session, true);
        self.entries.push(Entry {
            conn: conn.clone(),
            state: LeaseState::Leased,
            lease,
            checkouts: 1,
        });
        conn.leased(lease)
    }

    /// Remove the first entry with `conn`'s id and restore its capacity unit.
    ///
    /// A handle from an earlier lease leaves the entry alone.
    pub(crate) fn remove(&mut self, conn: &Connection<S>) -> Removal {
        let Some(index) = self.entries.iter().position(|entry| entry.conn.id() == conn.id()) else {
            return Removal::Unknown;
        };
        if self.entries[index].lease != conn.lease() {
            return Removal::Stale;
        }
        self.entries.remove(index);
        self.capacity += 1;
        Removal::Removed
    }

    /// Mark a leased entry idle again.
    pub(crate) fn check_in(&mut self, conn: &Connection<S>) -> CheckIn {
        match self.entries.iter_mut().find(|entry| entry.conn.id() == conn.id()) {
            Some(entry) if entry.lease != conn.lease() => CheckIn::Stale,
            Some(entry) if entry.state == LeaseState::Leased => {
                entry.state = LeaseState::Idle;
                CheckIn::Returned
            }
            Some(_) => CheckIn::NotLeased,
            None => CheckIn::Unknown,
        }
    }

    /// Times the entry with `id` has been leased.
    pub(crate) fn checkouts(&self, id: u64) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.conn.id() == id)
            .map(|entry| entry.checkouts)
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let leased = self
            .entries
            .iter()
            .filter(|entry| entry.state == LeaseState::Leased)
            .count() as u32;
        let tracked = self.entries.len() as u32;
        PoolStatus {
            tracked,
            idle: tracked - leased,
            leased,
            capacity: self.capacity,
            max: self.max_connections,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry(max: u32) -> Registry<&'static str> {
        Registry::new("test", &PoolConfig::new().max_connections(max))
    }

    fn admit(reg: &mut Registry<&'static str>, session: &'static str) -> Connection<&'static str> {
        let reservation = reg.reserve().unwrap();
        reg.admit(reservation, session)
    }

    #[test]
    fn test_new_registry_has_full_capacity() {
        let reg = registry(3);
        assert_eq!(reg.capacity(), 3);
        assert_eq!(reg.len(), 0);
        assert_eq!(reg.name, "test");
        assert!(!reg.reject_when_busy);
    }

    #[test]
    fn test_admit_tracks_leased_entry() {
        let mut reg = registry(2);
        let conn = admit(&mut reg, "a");

        assert!(conn.is_tracked());
        assert_eq!(reg.capacity(), 1);
        assert_eq!(reg.len(), 1);
        assert!(reg.idle_snapshot().is_empty());
        assert_eq!(reg.checkouts(conn.id()), Some(1));
    }

    #[test]
    fn test_reserve_stops_at_zero() {
        let mut reg = registry(1);
        assert!(reg.reserve().is_some());
        assert!(reg.reserve().is_none());
        assert_eq!(reg.capacity(), 0);
    }

    #[test]
    fn test_unreserve_restores_capacity() {
        let mut reg = registry(1);
        let reservation = reg.reserve().unwrap();
        reg.unreserve(reservation);
        assert_eq!(reg.capacity(), 1);
    }

    #[test]
    fn test_stale_reservation_after_reset() {
        let mut reg = registry(2);
        let reservation = reg.reserve().unwrap();
        let dropped = reg.reset("fresh", &PoolConfig::new().max_connections(2));
        assert!(dropped.is_empty());

        reg.unreserve(reservation);
        assert_eq!(reg.capacity(), 2);

        let conn = reg.admit(reservation, "late");
        assert!(!conn.is_tracked());
        assert_eq!(reg.len(), 0);
        assert_eq!(reg.name, "fresh");
    }

    #[test]
    fn test_claim_only_idle_entries() {
        let mut reg = registry(2);
        let conn = admit(&mut reg, "a");

        assert!(reg.claim(conn.id()).is_none());
        assert_eq!(reg.check_in(&conn), CheckIn::Returned);
        let again = reg.claim(conn.id()).unwrap();
        assert!(again.same_as(&conn));
        assert_ne!(again.lease(), conn.lease());
        assert!(reg.claim(conn.id()).is_none());
        assert_eq!(reg.checkouts(conn.id()), Some(2));
    }

    #[test]
    fn test_check_in_outcomes() {
        let mut reg = registry(2);
        let conn = admit(&mut reg, "a");

        assert_eq!(reg.check_in(&conn), CheckIn::Returned);
        assert_eq!(reg.check_in(&conn), CheckIn::NotLeased);
        assert_eq!(reg.check_in(&Connection::new("b", true)), CheckIn::Unknown);
    }

    #[test]
    fn test_earlier_lease_cannot_check_in_or_remove() {
        let mut reg = registry(2);
        let first = admit(&mut reg, "a");
        reg.check_in(&first);
        let second = reg.claim(first.id()).unwrap();

        assert_eq!(reg.check_in(&first), CheckIn::Stale);
        assert_eq!(reg.remove(&first), Removal::Stale);
        assert_eq!(reg.status().leased, 1);
        assert_eq!(reg.capacity(), 1);

        assert_eq!(reg.check_in(&second), CheckIn::Returned);
        assert_eq!(reg.remove(&second), Removal::Removed);
        assert_eq!(reg.capacity(), 2);
    }

    #[test]
    fn test_leases_keep_increasing_across_reset() {
        let mut reg = registry(2);
        let before = admit(&mut reg, "a");
        reg.reset("fresh", &PoolConfig::new().max_connections(2));
        let after = admit(&mut reg, "b");
        assert!(after.lease() > before.lease());
    }

    #[test]
    fn test_remove_preserves_order_and_restores_capacity() {
        let mut reg = registry(3);
        let a = admit(&mut reg, "a");
        let b = admit(&mut reg, "b");
        let c = admit(&mut reg, "c");
        assert_eq!(reg.capacity(), 0);

        assert_eq!(reg.remove(&b), Removal::Removed);
        assert_eq!(reg.capacity(), 1);
        let ids: Vec<u64> = reg.snapshot().iter().map(Connection::id).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
        assert!(!reg.contains(b.id()));

        assert_eq!(reg.remove(&b), Removal::Unknown);
        assert_eq!(reg.capacity(), 1);
    }

    #[test]
    fn test_drain_closes_and_restores() {
        let mut reg = registry(2);
        admit(&mut reg, "a");
        let reservation = reg.reserve().unwrap();

        let drained = reg.drain();
        assert_eq!(drained.len(), 1);
        assert!(reg.closed);
        assert_eq!(reg.capacity(), 2);
        assert!(reg.reserve().is_none());
        assert!(!reg.admit(reservation, "late").is_tracked());
    }

    #[test]
    fn test_status_counts() {
        let mut reg = registry(4);
        let a = admit(&mut reg, "a");
        admit(&mut reg, "b");
        reg.check_in(&a);

        let status = reg.status();
        assert_eq!(status.tracked, 2);
        assert_eq!(status.idle, 1);
        assert_eq!(status.leased, 1);
        assert_eq!(status.capacity, 2);
        assert_eq!(status.max, 4);
    }
}
