//! In-flight computation table.
//!
//! Holds at most one pending computation per key. Callers that miss while a
//! computation is pending join its shared outcome instead of starting another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::{CacheError, Result};

/// Encoded result of one computation, handed to every waiter.
pub(crate) type Outcome = Result<Arc<[u8]>>;

/// Completion signal shared by the leader and all followers of a flight.
pub(crate) type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

struct Flight {
    id: u64,
    outcome: SharedOutcome,
}

#[derive(Default)]
struct Table {
    flights: HashMap<String, Flight>,
    next_id: u64,
}

// == Flight Table ==
#[derive(Clone, Default)]
pub(crate) struct FlightTable {
    inner: Arc<Mutex<Table>>,
}

impl FlightTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Critical sections never panic midway, so a poisoned map is intact
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the flight for `key`, or registers a new one.
    ///
    /// Check and insert happen under one lock, so two callers can never both
    /// lead the same key. The leader receives a [`Ticket`] and must resolve
    /// it with the computation's outcome.
    pub(crate) fn join(&self, key: &str) -> (SharedOutcome, Option<Ticket>) {
        let mut table = self.lock();

        if let Some(flight) = table.flights.get(key) {
            return (flight.outcome.clone(), None);
        }

        let id = table.next_id;
        table.next_id += 1;

        let (tx, rx) = oneshot::channel::<Outcome>();
        let key_owned = key.to_string();
        let outcome = rx
            .map(move |received| {
                received.unwrap_or_else(|_| {
                    Err(CacheError::compute(anyhow::anyhow!(
                        "computation for '{key_owned}' ended without a result"
                    )))
                })
            })
            .boxed()
            .shared();

        table.flights.insert(
            key.to_string(),
            Flight {
                id,
                outcome: outcome.clone(),
            },
        );

        let ticket = Ticket {
            tx,
            guard: FlightGuard {
                table: self.clone(),
                key: key.to_string(),
                id,
            },
        };
        (outcome, Some(ticket))
    }

    /// Number of computations currently in progress.
    pub(crate) fn len(&self) -> usize {
        self.lock().flights.len()
    }

    fn finish(&self, key: &str, id: u64) {
        let mut table = self.lock();
        if table.flights.get(key).is_some_and(|f| f.id == id) {
            table.flights.remove(key);
        }
    }
}

// == Ticket ==
/// The leader's handle on a flight.
///
/// Dropping an unresolved ticket removes the flight and releases waiters with
/// a compute error, so an abandoned computation never blocks a key.
pub(crate) struct Ticket {
    tx: oneshot::Sender<Outcome>,
    guard: FlightGuard,
}

impl Ticket {
    /// Removes the flight, then releases every waiter with `outcome`.
    pub(crate) fn resolve(self, outcome: Outcome) {
        let Ticket { tx, guard } = self;
        drop(guard);
        // Every waiter may have gone away; the outcome is then simply dropped
        let _ = tx.send(outcome);
    }
}

struct FlightGuard {
    table: FlightTable,
    key: String,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.table.finish(&self.key, self.id);
    }
}
