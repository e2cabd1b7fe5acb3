//! Single-flight Module
//!
//! Tracks loader calls in progress so concurrent misses on one key share a
//! single load.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::cache::{lock, CacheKey, Payload};

type Outcome = Option<Payload>;

// == Flight Table ==
/// In-flight loads keyed by cache key.
#[derive(Debug, Default)]
pub struct FlightTable {
    flights: Mutex<HashMap<CacheKey, broadcast::Sender<Outcome>>>,
}

/// Role of a caller after joining the flight table.
pub enum Flight<'a> {
    /// This caller runs the loader and must publish the outcome.
    Leader(FlightGuard<'a>),
    /// Another caller is loading; wait for its outcome.
    Follower(broadcast::Receiver<Outcome>),
    /// A load finished between the miss and the join.
    Ready(Payload),
}

impl FlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the load in progress for `key`, or claims it.
    ///
    /// `ready` runs under the table lock before a claim, so a load that
    /// completed after the caller's miss is reused instead of repeated.
    pub fn join<'a>(&'a self, key: &CacheKey, ready: impl FnOnce() -> Option<Payload>) -> Flight<'a> {
        let mut flights = lock(&self.flights);

        if let Some(tx) = flights.get(key) {
            return Flight::Follower(tx.subscribe());
        }
        if let Some(data) = ready() {
            return Flight::Ready(data);
        }

        let (tx, _) = broadcast::channel(1);
        flights.insert(key.clone(), tx.clone());
        Flight::Leader(FlightGuard {
            table: self,
            key: key.clone(),
            tx,
        })
    }

    /// Number of loads currently in progress.
    pub fn len(&self) -> usize {
        lock(&self.flights).len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Flight Guard ==
/// Claim on a key's load. Dropping it without `complete` (cancellation,
/// timeout of the caller's own future) releases the claim and followers
/// observe a miss.
pub struct FlightGuard<'a> {
    table: &'a FlightTable,
    key: CacheKey,
    tx: broadcast::Sender<Outcome>,
}

impl FlightGuard<'_> {
    /// Releases the claim and hands the outcome to every follower.
    pub fn complete(self, outcome: Outcome) {
        self.release();
        // No receivers just means nobody else was waiting
        let _ = self.tx.send(outcome);
    }

    fn release(&self) {
        let mut flights = lock(&self.table.flights);
        // A newer leader may already own the slot
        if flights
            .get(&self.key)
            .is_some_and(|tx| tx.same_channel(&self.tx))
        {
            flights.remove(&self.key);
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
