//! Registration bins for shutdown participants.
//!
//! # Design Decisions
//! - One lock guards every bin plus the frozen flag
//! - Registration after the freeze is dropped, not queued
//! - Teardown works on a snapshot taken at freeze time, so nothing is closed twice

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lifecycle::participant::{CleanupFn, ParticipantKind, Stoppable};

#[derive(Default)]
struct Bins {
    servers: Vec<Arc<dyn Stoppable>>,
    listeners: Vec<Arc<dyn Stoppable>>,
    clients: Vec<Arc<dyn Stoppable>>,
    identity_providers: Vec<Arc<dyn Stoppable>>,
    cleanups: Vec<CleanupFn>,
    frozen: bool,
}

/// Participants taken out of the registry when shutdown begins.
#[derive(Default)]
pub struct Snapshot {
    pub servers: Vec<Arc<dyn Stoppable>>,
    pub listeners: Vec<Arc<dyn Stoppable>>,
    pub clients: Vec<Arc<dyn Stoppable>>,
    pub identity_providers: Vec<Arc<dyn Stoppable>>,
    pub cleanups: Vec<CleanupFn>,
}

impl Snapshot {
    pub fn counts(&self) -> ParticipantCounts {
        ParticipantCounts {
            servers: self.servers.len(),
            listeners: self.listeners.len(),
            clients: self.clients.len(),
            identity_providers: self.identity_providers.len(),
            cleanups: self.cleanups.len(),
        }
    }
}

/// Number of registered participants per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantCounts {
    pub servers: usize,
    pub listeners: usize,
    pub clients: usize,
    pub identity_providers: usize,
    pub cleanups: usize,
}

impl ParticipantCounts {
    pub fn total(&self) -> usize {
        self.servers + self.listeners + self.clients + self.identity_providers + self.cleanups
    }
}

/// Thread-safe participant registry.
#[derive(Default)]
pub struct Registry {
    bins: Mutex<Bins>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Bins> {
        self.bins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, kind: ParticipantKind, name: &str, insert: impl FnOnce(&mut Bins)) -> bool {
        let mut bins = self.lock();
        if bins.frozen {
            tracing::debug!(kind = %kind, name, "Shutdown in progress, registration ignored");
            return false;
        }
        insert(&mut bins);
        tracing::trace!(kind = %kind, name, "Participant registered");
        true
    }

    pub fn register_server(&self, server: Arc<dyn Stoppable>) -> bool {
        let name = server.name().to_string();
        self.admit(ParticipantKind::Server, &name, |bins| bins.servers.push(server))
    }

    pub fn register_listener(&self, listener: Arc<dyn Stoppable>) -> bool {
        let name = listener.name().to_string();
        self.admit(ParticipantKind::Listener, &name, |bins| bins.listeners.push(listener))
    }

    pub fn register_client(&self, client: Arc<dyn Stoppable>) -> bool {
        let name = client.name().to_string();
        self.admit(ParticipantKind::Client, &name, |bins| bins.clients.push(client))
    }

    pub fn register_identity_provider(&self, provider: Arc<dyn Stoppable>) -> bool {
        let name = provider.name().to_string();
        self.admit(ParticipantKind::IdentityProvider, &name, |bins| {
            bins.identity_providers.push(provider)
        })
    }

    pub fn register_cleanup(&self, cleanup: CleanupFn) -> bool {
        self.admit(ParticipantKind::Cleanup, "callback", |bins| bins.cleanups.push(cleanup))
    }

    /// Stop accepting registrations and hand out everything registered so far.
    ///
    /// A second call returns an empty snapshot.
    pub fn freeze(&self) -> Snapshot {
        let mut bins = self.lock();
        bins.frozen = true;
        Snapshot {
            servers: std::mem::take(&mut bins.servers),
            listeners: std::mem::take(&mut bins.listeners),
            clients: std::mem::take(&mut bins.clients),
            identity_providers: std::mem::take(&mut bins.identity_providers),
            cleanups: std::mem::take(&mut bins.cleanups),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    /// Participants still waiting in the registry.
    pub fn pending(&self) -> ParticipantCounts {
        let bins = self.lock();
        ParticipantCounts {
            servers: bins.servers.len(),
            listeners: bins.listeners.len(),
            clients: bins.clients.len(),
            identity_providers: bins.identity_providers.len(),
            cleanups: bins.cleanups.len(),
        }
    }
}
