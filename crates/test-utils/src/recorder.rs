//! Shared event log for asserting on execution order.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

/// One entry in the execution log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Thread-safe log of `Started` / `Finished` events.
///
/// Actions built by [`Recorder::blocking`] and [`Recorder::task`] log their
/// start, hold for a short while so overlaps would be visible, then log
/// their end.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Names in the order they started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(name) => Some(name),
                Event::Finished(_) => None,
            })
            .collect()
    }

    pub fn has_started(&self, name: &str) -> bool {
        self.started().iter().any(|n| n == name)
    }

    fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// `true` if `first` finished before `second` started.
    pub fn finished_before_started(&self, first: &str, second: &str) -> bool {
        match (
            self.position(&Event::Finished(first.to_string())),
            self.position(&Event::Started(second.to_string())),
        ) {
            (Some(f), Some(s)) => f < s,
            _ => false,
        }
    }

    /// Blocking action that records itself, sleeping `hold` in between.
    pub fn blocking(&self, name: &str, hold: Duration) -> impl FnOnce() + Send + 'static {
        let rec = self.clone();
        let name = name.to_string();
        move || {
            rec.push(Event::Started(name.clone()));
            std::thread::sleep(hold);
            rec.push(Event::Finished(name));
        }
    }

    /// Async action that records itself, sleeping `hold` in between.
    pub fn task(
        &self,
        name: &str,
        hold: Duration,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let rec = self.clone();
        let name = name.to_string();
        async move {
            rec.push(Event::Started(name.clone()));
            tokio::time::sleep(hold).await;
            rec.push(Event::Finished(name));
        }
    }

    /// Async action that records its start, waits for `gate` to open, then
    /// records its end.
    pub fn gated(
        &self,
        name: &str,
        gate: &Gate,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let rec = self.clone();
        let name = name.to_string();
        let gate = gate.clone();
        async move {
            rec.push(Event::Started(name.clone()));
            gate.wait().await;
            rec.push(Event::Finished(name));
        }
    }

    /// Poll until `name` has started, panicking after ~1s.
    pub async fn wait_for_start(&self, name: &str) {
        for _ in 0..100 {
            if self.has_started(name) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{name} did not start");
    }
}

/// A manually opened gate for holding actions in flight.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
