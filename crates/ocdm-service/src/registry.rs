//! Key system and session bookkeeping.
//!
//! Key systems keep their registration order so enumerations are stable.
//! Session ids are unique per process: `<pid>-<counter>`.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::KeySystemConfig;
use crate::{Result, ServiceError};

#[derive(Debug)]
struct KeySystem {
    name: String,
    designators: Vec<String>,
    sessions: Vec<String>,
}

/// Registered key systems and their open sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    systems: RwLock<Vec<KeySystem>>,
    next_session: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key system. Re-registering a name replaces its
    /// designators and keeps its sessions.
    pub fn register(&self, system: &KeySystemConfig) {
        let mut systems = self.systems.write();
        if let Some(existing) = systems.iter_mut().find(|s| s.name == system.name) {
            existing.designators.clone_from(&system.designators);
        } else {
            systems.push(KeySystem {
                name: system.name.clone(),
                designators: system.designators.clone(),
                sessions: Vec::new(),
            });
        }
        debug!("Registered key system {}", system.name);
    }

    /// Whether `key_system` is registered.
    pub fn contains(&self, key_system: &str) -> bool {
        self.systems.read().iter().any(|s| s.name == key_system)
    }

    /// Registered key system names, in registration order.
    pub fn systems(&self) -> Vec<String> {
        self.systems.read().iter().map(|s| s.name.clone()).collect()
    }

    /// Designators of `key_system`; empty for unknown key systems.
    pub fn designators(&self, key_system: &str) -> Vec<String> {
        self.systems
            .read()
            .iter()
            .find(|s| s.name == key_system)
            .map(|s| s.designators.clone())
            .unwrap_or_default()
    }

    /// Open sessions of `key_system`; empty for unknown key systems.
    pub fn sessions(&self, key_system: &str) -> Vec<String> {
        self.systems
            .read()
            .iter()
            .find(|s| s.name == key_system)
            .map(|s| s.sessions.clone())
            .unwrap_or_default()
    }

    /// Allocate a session id under `key_system`.
    pub fn add_session(&self, key_system: &str) -> Result<String> {
        let mut systems = self.systems.write();
        let system = systems
            .iter_mut()
            .find(|s| s.name == key_system)
            .ok_or_else(|| ServiceError::UnknownKeySystem(key_system.to_string()))?;

        let counter = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let session = format!("{}-{counter}", std::process::id());
        system.sessions.push(session.clone());
        Ok(session)
    }

    /// Forget a session. Returns the key system it belonged to.
    pub fn remove_session(&self, session: &str) -> Result<String> {
        let mut systems = self.systems.write();
        for system in systems.iter_mut() {
            if let Some(index) = system.sessions.iter().position(|s| s == session) {
                system.sessions.remove(index);
                return Ok(system.name.clone());
            }
        }
        Err(ServiceError::UnknownSession(session.to_string()))
    }

    /// Remove all sessions, keeping the key systems. Returns the removed ids.
    pub fn clear_sessions(&self) -> Vec<String> {
        let mut systems = self.systems.write();
        systems
            .iter_mut()
            .flat_map(|s| std::mem::take(&mut s.sessions))
            .collect()
    }

    /// Remove everything. Returns the removed session ids.
    pub fn clear(&self) -> Vec<String> {
        let sessions = self.clear_sessions();
        self.systems.write().clear();
        sessions
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> SessionRegistry {
        let registry = SessionRegistry::new();
        registry.register(&KeySystemConfig::new("com.widevine.alpha", ["video/mp4"]));
        registry.register(&KeySystemConfig::new("org.w3.clearkey", ["keyids", "cenc"]));
        registry
    }

    #[test]
    fn test_systems_keep_order() {
        let registry = registry();
        assert_eq!(registry.systems(), vec!["com.widevine.alpha", "org.w3.clearkey"]);
        assert_eq!(registry.designators("org.w3.clearkey"), vec!["keyids", "cenc"]);
        assert!(registry.designators("unknown").is_empty());
    }

    #[test]
    fn test_reregister_replaces_designators() {
        let registry = registry();
        let session = registry.add_session("org.w3.clearkey").expect("session");
        registry.register(&KeySystemConfig::new("org.w3.clearkey", ["webm"]));

        assert_eq!(registry.systems().len(), 2);
        assert_eq!(registry.designators("org.w3.clearkey"), vec!["webm"]);
        assert_eq!(registry.sessions("org.w3.clearkey"), vec![session]);
    }

    #[test]
    fn test_session_lifecycle() {
        let registry = registry();
        let first = registry.add_session("com.widevine.alpha").expect("session");
        let second = registry.add_session("com.widevine.alpha").expect("session");
        assert_ne!(first, second);
        assert_eq!(registry.sessions("com.widevine.alpha"), vec![first.clone(), second.clone()]);

        assert_eq!(
            registry.remove_session(&first).expect("remove"),
            "com.widevine.alpha"
        );
        assert_eq!(registry.sessions("com.widevine.alpha"), vec![second]);
        assert!(matches!(
            registry.remove_session(&first),
            Err(ServiceError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_unknown_key_system() {
        let registry = registry();
        assert!(matches!(
            registry.add_session("com.example.none"),
            Err(ServiceError::UnknownKeySystem(_))
        ));
    }

    #[test]
    fn test_clear_sessions_and_clear() {
        let registry = registry();
        registry.add_session("com.widevine.alpha").expect("session");
        registry.add_session("org.w3.clearkey").expect("session");

        assert_eq!(registry.clear_sessions().len(), 2);
        assert_eq!(registry.systems().len(), 2);
        assert!(registry.sessions("org.w3.clearkey").is_empty());

        registry.add_session("org.w3.clearkey").expect("session");
        assert_eq!(registry.clear().len(), 1);
        assert!(registry.systems().is_empty());
    }
}
