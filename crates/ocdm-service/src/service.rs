//! Content decryption control plane.
//!
//! [`ContentDecryption`] is the contract between the plugin host and a
//! decryption service. [`DecryptionService`] implements it in memory and
//! owns one exchange region per open session.

use std::collections::HashMap;

use ocdm_exchange::DataExchange;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::iterator::StringIterator;
use crate::registry::SessionRegistry;
use crate::shell::ServiceShell;
use crate::{Result, ServiceError};

/// Control-plane contract of a content decryption service.
///
/// Enumerations are snapshots taken at call time.
pub trait ContentDecryption {
    /// Bring the service up with the host's callsign and configuration.
    fn initialize(&mut self, shell: &dyn ServiceShell) -> Result<()>;

    /// Tear the service down. Closes every session.
    fn deinitialize(&mut self, shell: &dyn ServiceShell);

    /// Close every session but keep the registered key systems.
    fn reset(&mut self) -> Result<()>;

    /// Supported key systems.
    fn systems(&self) -> StringIterator;

    /// Designators of a key system.
    fn designators(&self, key_system: &str) -> StringIterator;

    /// Active sessions of a key system.
    fn sessions(&self, key_system: &str) -> StringIterator;
}

/// In-memory decryption service with one exchange region per session.
#[derive(Default)]
pub struct DecryptionService {
    callsign: Option<String>,
    config: ServiceConfig,
    registry: SessionRegistry,
    exchanges: Mutex<HashMap<String, DataExchange>>,
}

impl DecryptionService {
    /// Create an uninitialized service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `initialize` has succeeded and `deinitialize` has not run since.
    pub fn is_initialized(&self) -> bool {
        self.callsign.is_some()
    }

    /// Active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Region name used for `session`.
    ///
    /// `<prefix>-<callsign>-<session>`, with path separators in the
    /// callsign replaced so the result is a single name component.
    pub fn region_name(&self, session: &str) -> Result<String> {
        let callsign = self.callsign.as_deref().ok_or(ServiceError::NotInitialized)?;
        let callsign = callsign.replace(['/', '\\'], "_");
        Ok(self.config.exchange.region_name(&[&callsign, session]))
    }

    /// Open a session under `key_system` and create its exchange region.
    ///
    /// Returns the session id; the region name follows from
    /// [`region_name`](Self::region_name).
    pub fn open_session(&self, key_system: &str) -> Result<String> {
        if !self.is_initialized() {
            return Err(ServiceError::NotInitialized);
        }

        let session = self.registry.add_session(key_system)?;
        let name = self.region_name(&session)?;
        let exchange = match DataExchange::create_with_config(&name, &self.config.exchange) {
            Ok(exchange) => exchange,
            Err(e) => {
                let _ = self.registry.remove_session(&session);
                return Err(e.into());
            }
        };

        self.exchanges.lock().insert(session.clone(), exchange);
        info!("Opened session {session} ({key_system}) on {name}");
        Ok(session)
    }

    /// Close a session and remove its exchange region.
    pub fn close_session(&self, session: &str) -> Result<()> {
        let key_system = self.registry.remove_session(session)?;
        let exchange = self.exchanges.lock().remove(session);
        if let Some(exchange) = exchange {
            release(exchange);
        }
        info!("Closed session {session} ({key_system})");
        Ok(())
    }

    /// Run `f` against the exchange of `session`.
    pub fn with_exchange<R>(
        &self,
        session: &str,
        f: impl FnOnce(&mut DataExchange) -> R,
    ) -> Result<R> {
        let mut exchanges = self.exchanges.lock();
        let exchange = exchanges
            .get_mut(session)
            .ok_or_else(|| ServiceError::UnknownSession(session.to_string()))?;
        Ok(f(exchange))
    }

    fn close_all(&self, sessions: Vec<String>) {
        let mut exchanges = self.exchanges.lock();
        for session in sessions {
            if let Some(exchange) = exchanges.remove(&session) {
                release(exchange);
            }
        }
        if !exchanges.is_empty() {
            warn!("{} exchanges without a registered session", exchanges.len());
            for (_, exchange) in exchanges.drain() {
                release(exchange);
            }
        }
    }
}

fn release(exchange: DataExchange) {
    let name = exchange.name().to_string();
    drop(exchange);
    if let Err(e) = DataExchange::unlink(&name) {
        warn!("Failed to unlink exchange {name}: {e}");
    }
}

impl ContentDecryption for DecryptionService {
    fn initialize(&mut self, shell: &dyn ServiceShell) -> Result<()> {
        if self.is_initialized() {
            return Err(ServiceError::AlreadyInitialized);
        }

        let config = ServiceConfig::from_json(shell.config_line())?;
        for system in &config.systems {
            self.registry.register(system);
        }
        info!(
            "Initialized {} with {} key systems",
            shell.callsign(),
            config.systems.len()
        );

        self.config = config;
        self.callsign = Some(shell.callsign().to_string());
        Ok(())
    }

    fn deinitialize(&mut self, shell: &dyn ServiceShell) {
        let sessions = self.registry.clear();
        self.close_all(sessions);
        self.callsign = None;
        self.config = ServiceConfig::default();
        debug!("Deinitialized {}", shell.callsign());
    }

    fn reset(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(ServiceError::NotInitialized);
        }
        let sessions = self.registry.clear_sessions();
        debug!("Reset: closing {} sessions", sessions.len());
        self.close_all(sessions);
        Ok(())
    }

    fn systems(&self) -> StringIterator {
        StringIterator::new(self.registry.systems())
    }

    fn designators(&self, key_system: &str) -> StringIterator {
        StringIterator::new(self.registry.designators(key_system))
    }

    fn sessions(&self, key_system: &str) -> StringIterator {
        StringIterator::new(self.registry.sessions(key_system))
    }
}

impl Drop for DecryptionService {
    fn drop(&mut self) {
        let sessions = self.registry.clear();
        self.close_all(sessions);
    }
}
