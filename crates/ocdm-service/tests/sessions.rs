//! Session lifecycle against real exchange regions.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::panic)]

use ocdm_exchange::DataExchange;
use ocdm_service::{
    ContentDecryption, DecryptionService, KeySystemConfig, ServiceConfig, ServiceError,
    StaticShell,
};
use pretty_assertions::assert_eq;

const KEY_SYSTEM: &str = "org.w3.clearkey";

fn initialized(tag: &str) -> (StaticShell, DecryptionService) {
    let config = ServiceConfig::default()
        .with_system(KeySystemConfig::new(KEY_SYSTEM, ["keyids", "cenc"]))
        .with_exchange(ocdm_exchange::ExchangeConfig::new(1024));
    let line = serde_json::to_string(&config).expect("serialize config");
    let shell = StaticShell::new(format!("svc-{tag}-{}", std::process::id()), line);

    let mut service = DecryptionService::new();
    service.initialize(&shell).expect("initialize");
    (shell, service)
}

fn open_or_skip(service: &DecryptionService) -> Option<String> {
    match service.open_session(KEY_SYSTEM) {
        Ok(session) => Some(session),
        Err(ServiceError::Exchange(e)) => {
            eprintln!("skipping shmem test (not available): {e}");
            None
        }
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn test_session_region_is_shared() {
    let (_shell, service) = initialized("shared");
    let Some(session) = open_or_skip(&service) else {
        return;
    };

    let name = service.region_name(&session).expect("region name");
    let mut pipeline = DataExchange::open(&name).expect("open session region");
    assert_eq!(pipeline.payload_capacity(), 1024);
    pipeline.set_key_id(&[1, 2, 3, 4]).expect("key id");
    pipeline.set_status(1);

    let (status, key_id) = service
        .with_exchange(&session, |exchange| {
            let status = exchange.status();
            exchange.set_status(2);
            (status, exchange.key_id().map(<[u8]>::to_vec))
        })
        .expect("session exchange");
    assert_eq!(status, 1);
    assert_eq!(key_id, Some(vec![1, 2, 3, 4]));
    assert_eq!(pipeline.status(), 2);
}

#[test]
fn test_close_session_unlinks_region() {
    let (_shell, service) = initialized("close");
    let Some(session) = open_or_skip(&service) else {
        return;
    };
    let name = service.region_name(&session).expect("region name");

    let sessions: Vec<String> = service.sessions(KEY_SYSTEM).collect();
    assert_eq!(sessions, vec![session.clone()]);

    service.close_session(&session).expect("close");
    assert_eq!(service.sessions(KEY_SYSTEM).len(), 0);
    assert!(DataExchange::open(&name).is_err());
}

#[test]
fn test_enumeration_is_a_snapshot() {
    let (_shell, service) = initialized("snapshot");
    let Some(first) = open_or_skip(&service) else {
        return;
    };

    let mut snapshot = service.sessions(KEY_SYSTEM);
    let second = service.open_session(KEY_SYSTEM).expect("second session");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.next(), Some(first));
    snapshot.reset();
    assert_eq!(snapshot.total(), 1);
    assert_eq!(service.sessions(KEY_SYSTEM).len(), 2);

    service.close_session(&second).expect("close");
}

#[test]
fn test_reset_and_deinitialize_close_sessions() {
    let (shell, mut service) = initialized("reset");
    let Some(first) = open_or_skip(&service) else {
        return;
    };
    let first_name = service.region_name(&first).expect("region name");

    service.reset().expect("reset");
    assert_eq!(service.sessions(KEY_SYSTEM).len(), 0);
    assert_eq!(service.systems().len(), 1);
    assert!(DataExchange::open(&first_name).is_err());

    let second = service.open_session(KEY_SYSTEM).expect("session after reset");
    let second_name = service.region_name(&second).expect("region name");
    service.deinitialize(&shell);

    assert!(!service.is_initialized());
    assert_eq!(service.systems().len(), 0);
    assert!(DataExchange::open(&second_name).is_err());
}
