//! Handle caching and process identity across pid reuse

use procmem::config::Config;
use procmem::{ErrorCode, ProcessMemoryService, SimulatedBackend};

fn cached_service(max_entries: usize) -> ProcessMemoryService<SimulatedBackend> {
    let mut config = Config::default();
    config.cache.enabled = true;
    config.cache.max_entries = max_entries;
    ProcessMemoryService::with_config(SimulatedBackend::new(), &config)
}

#[test]
fn test_cache_disabled_by_default() {
    let service = ProcessMemoryService::new(SimulatedBackend::new());
    assert!(service.cache().is_none());
}

#[test]
fn test_cached_handle_is_reused() {
    let service = cached_service(8);
    let pid = service.backend().spawn("game.exe");

    let first = service.get_info(pid).unwrap();
    let second = service.get_info(pid).unwrap();
    assert_eq!(first.handle, second.handle);
    assert_eq!(service.cache().map(|c| c.len()), Some(1));
}

#[test]
fn test_identity_changes_on_pid_reuse() {
    let service = cached_service(8);
    let pid = service.backend().spawn("game.exe");
    let identity = service.identify(pid).unwrap();
    assert!(service.verify_identity(&identity).is_ok());

    service.backend().terminate(pid);
    service.backend().spawn_with_pid(pid, "intruder.exe").unwrap();

    let err = service.verify_identity(&identity).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProcessIdentityChanged);

    let current = service.identify(pid).unwrap();
    assert_eq!(current.pid, pid);
    assert!(current.generation > identity.generation);
    assert_eq!(service.get_process_name(pid).unwrap(), "intruder.exe");
}

#[test]
fn test_terminated_process_is_evicted() {
    let service = cached_service(8);
    let pid = service.backend().spawn("game.exe");
    let identity = service.identify(pid).unwrap();

    service.backend().terminate(pid);
    assert_eq!(
        service.verify_identity(&identity).unwrap_err().code(),
        ErrorCode::ProcessNotFound
    );
    assert!(!service.is_process_running(pid).unwrap());
    assert_eq!(service.cache().map(|c| c.generation(pid)), Some(None));
}

#[test]
fn test_cache_is_bounded() {
    let service = cached_service(2);
    let pids: Vec<u32> = (0..3)
        .map(|i| service.backend().spawn(&format!("p{}.exe", i)))
        .collect();
    for pid in &pids {
        service.get_info(*pid).unwrap();
    }

    let cache = service.cache().unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.generation(pids[0]), None);
}
