//! Shared mock participants for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use graceful_shutdown::lifecycle::{BoxError, Stoppable};

/// Ordered record of close starts and ends across participants.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<(String, Instant)>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push((event.into(), Instant::now()));
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn at(&self, label: &str) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(event, _)| event == label)
            .map(|(_, at)| *at)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels().iter().position(|event| event == label)
    }
}

/// Participant whose close sleeps, then succeeds or fails.
pub struct MockParticipant {
    name: String,
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
    log: Option<Arc<EventLog>>,
}

impl MockParticipant {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            failure: None,
            calls: AtomicUsize::new(0),
            log: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn logged(mut self, log: &Arc<EventLog>) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Stoppable for MockParticipant {
    fn close(&self) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.push(format!("{}:start", self.name));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if let Some(log) = &self.log {
            log.push(format!("{}:end", self.name));
        }
        match &self.failure {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
