use super::{ClientFactory, SourceKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const LOG_TARGET: &str = "  registry";

/// Lazily constructed, per-platform cache of source clients.
///
/// The lock is held across construction so concurrent first lookups for the
/// same platform build exactly one client and share it.
#[derive(Debug)]
pub struct SourceClientRegistry<F: ClientFactory> {
    factory: F,
    clients: Mutex<HashMap<SourceKind, Arc<F::Client>>>,
}

impl<F: ClientFactory> SourceClientRegistry<F> {
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the client for the platform called `name`, constructing it on first use.
    ///
    /// Unknown platforms and construction failures are logged and yield `None`.
    pub fn get(&self, name: &str) -> Option<Arc<F::Client>> {
        let kind = match name.parse::<SourceKind>() {
            Ok(kind) => kind,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Unknown source '{name}': {e}");
                return None;
            }
        };

        let mut clients = self.clients.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(client) = clients.get(&kind) {
            return Some(Arc::clone(client));
        }

        match self.factory.create(kind) {
            Ok(client) => {
                log::debug!(target: LOG_TARGET, "Created client for source '{kind}'");
                let client = Arc::new(client);
                let _ = clients.insert(kind, Arc::clone(&client));
                Some(client)
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not create client for source '{kind}': {e:#}");
                None
            }
        }
    }
}
