use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::debug;
use parking_lot::Mutex;

use crate::errors::SchaltError;

pub type SharedFlight<T> = Shared<BoxFuture<'static, Result<T, SchaltError>>>;

struct Flight<T> {
    generation: u64,
    future: SharedFlight<T>,
}

/// Collapses concurrent calls for the same key into one outstanding future.
///
/// The first caller's producer runs; later callers await the same shared
/// future. The key is released by the flight itself once it settles, so a
/// dropped caller never leaves a stale entry behind.
pub struct SingleFlight<T> {
    flights: Arc<Mutex<HashMap<String, Flight<T>>>>,
    next_generation: AtomicU64,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: &str, producer: F) -> Result<T, SchaltError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SchaltError>> + Send + 'static,
    {
        let future = {
            let mut flights = self.flights.lock();
            match flights.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight request for '{key}'");
                    existing.future.clone()
                }
                None => self.start(&mut flights, key, producer()),
            }
        };

        future.await
    }

    /// Waits out every flight already running for `key`, then runs
    /// `producer` as a flight of its own. Checking for a running flight and
    /// starting the new one happen under the same lock, so the caller never
    /// ends up joining a flight somebody else started in between.
    pub async fn run_after_pending<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> Result<T, SchaltError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SchaltError>> + Send + 'static,
    {
        let own = loop {
            let pending = {
                let mut flights = self.flights.lock();
                match flights.get(key) {
                    Some(existing) => existing.future.clone(),
                    None => break self.start(&mut flights, key, producer()),
                }
            };
            debug!("Waiting for in-flight request for '{key}' before starting a new one");
            let _ = pending.await;
        };

        own.await
    }

    fn start<Fut>(
        &self,
        flights: &mut HashMap<String, Flight<T>>,
        key: &str,
        work: Fut,
    ) -> SharedFlight<T>
    where
        Fut: Future<Output = Result<T, SchaltError>> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.flights);
        let owned_key = key.to_string();
        let future = async move {
            let result = work.await;
            let mut flights = registry.lock();
            if flights
                .get(&owned_key)
                .is_some_and(|flight| flight.generation == generation)
            {
                flights.remove(&owned_key);
            }
            result
        }
        .boxed()
        .shared();
        flights.insert(
            key.to_string(),
            Flight {
                generation,
                future: future.clone(),
            },
        );
        future
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights.lock().contains_key(key)
    }

    /// The outstanding flight for `key`, if any, without starting a new one.
    pub fn pending(&self, key: &str) -> Option<SharedFlight<T>> {
        self.flights
            .lock()
            .get(key)
            .map(|flight| flight.future.clone())
    }
}
