//! Host call dispatch: argument codes, decoding and JSON results

use pretty_assertions::assert_eq;
use procmem::{invoke, ErrorCode, Operation, ProcessMemoryService, SimulatedBackend};
use serde_json::{json, Value};

fn service() -> (ProcessMemoryService<SimulatedBackend>, u32) {
    let backend = SimulatedBackend::new();
    let pid = backend.spawn("game.exe");
    backend
        .add_module(pid, "engine.dll", "C:\\game\\engine.dll", 0x2000)
        .unwrap();
    (ProcessMemoryService::new(backend), pid)
}

fn code(service: &ProcessMemoryService<SimulatedBackend>, op: Operation, args: &[Value]) -> ErrorCode {
    invoke(service, op, args).unwrap_err().code()
}

#[test]
fn test_missing_argument_codes() {
    let (service, pid) = service();
    let cases: [(Operation, Vec<Value>, ErrorCode); 9] = [
        (Operation::FindByProcessName, vec![], ErrorCode::MissingProcessName),
        (Operation::GetProcessName, vec![], ErrorCode::MissingProcessPid),
        (Operation::GetInfo, vec![], ErrorCode::MissingProcessPid),
        (Operation::GetModule, vec![json!(pid)], ErrorCode::MissingFunctionArguments),
        (Operation::AllocateMemory, vec![], ErrorCode::InvalidParameters),
        (Operation::DeallocateMemory, vec![json!(pid), json!(4096)], ErrorCode::MissingFunctionArguments),
        (Operation::WriteMemory, vec![json!(pid), json!(4096)], ErrorCode::MissingFunctionArguments),
        (Operation::ReadMemory, vec![json!(pid), json!(4096)], ErrorCode::MissingFunctionArguments),
        (Operation::IsProcessRunning, vec![], ErrorCode::MissingFunctionArguments),
    ];

    for (op, args, expected) in cases {
        assert_eq!(code(&service, op, &args), expected, "{}", op);
    }
}

#[test]
fn test_null_arguments_count_as_missing() {
    let (service, pid) = service();
    assert_eq!(
        code(&service, Operation::GetInfo, &[Value::Null]),
        ErrorCode::MissingProcessPid
    );
    assert_eq!(
        code(&service, Operation::ReadMemory, &[json!(pid), Value::Null, json!(4)]),
        ErrorCode::MissingFunctionArguments
    );
}

#[test]
fn test_extra_arguments_are_rejected() {
    let (service, pid) = service();
    assert_eq!(
        code(&service, Operation::GetProcessName, &[json!(pid), json!(1)]),
        ErrorCode::MissingProcessPid
    );
    assert_eq!(
        code(&service, Operation::AllocateMemory, &[json!(pid), json!(4), json!("rw"), json!(1)]),
        ErrorCode::InvalidParameters
    );
}

#[test]
fn test_malformed_arguments() {
    let (service, pid) = service();
    let cases = [
        (Operation::GetInfo, vec![json!("1000")]),
        (Operation::GetInfo, vec![json!(-1)]),
        (Operation::GetInfo, vec![json!(1.5)]),
        (Operation::FindByProcessName, vec![json!(12)]),
        (Operation::ReadMemory, vec![json!(pid), json!("nothex"), json!(4)]),
        (Operation::ReadMemory, vec![json!(pid), json!(4096), json!(-4)]),
        (Operation::WriteMemory, vec![json!(pid), json!(4096), json!([1, 300])]),
        (Operation::AllocateMemory, vec![json!(pid), json!(16), json!("wx")]),
        (Operation::AllocateMemory, vec![json!(pid), json!(0)]),
    ];
    for (op, args) in cases {
        assert_eq!(code(&service, op, &args), ErrorCode::InvalidParameters, "{} {:?}", op, args);
    }
}

#[test]
fn test_lookup_results() {
    let (service, pid) = service();

    let found = invoke(&service, Operation::FindByProcessName, &[json!("game.exe")]).unwrap();
    assert_eq!(found, json!(pid));

    let name = invoke(&service, Operation::GetProcessName, &[json!(pid)]).unwrap();
    assert_eq!(name, json!("game.exe"));

    let info = invoke(&service, Operation::GetInfo, &[json!(pid)]).unwrap();
    assert_eq!(info["name"], json!("game.exe"));
    assert_eq!(info["pid"], json!(pid));
    assert!(info["handle"].is_i64());

    let module = invoke(&service, Operation::GetModule, &[json!(pid), json!("engine.dll")]).unwrap();
    let base = module["base"].as_u64().unwrap();
    assert_eq!(module["path"], json!("C:\\game\\engine.dll"));
    assert_eq!(module["end"], json!(base + 0x2000));

    assert_eq!(
        invoke(&service, Operation::IsProcessRunning, &[json!(pid)]).unwrap(),
        json!(true)
    );
    assert_eq!(
        code(&service, Operation::FindByProcessName, &[json!("missing.exe")]),
        ErrorCode::NoProcessFound
    );
}

#[test]
fn test_memory_round_trip_through_calls() {
    let (service, pid) = service();

    let address = invoke(&service, Operation::AllocateMemory, &[json!(pid), json!(8), json!("rw")]).unwrap();
    let hex_address = format!("0x{:X}", address.as_u64().unwrap());

    let wrote = invoke(
        &service,
        Operation::WriteMemory,
        &[json!(pid), json!(hex_address), json!("deadbeef")],
    )
    .unwrap();
    assert_eq!(wrote, json!(true));

    let wrote = invoke(
        &service,
        Operation::WriteMemory,
        &[json!(pid), address.clone(), json!([0, 0, 0, 0, 1, 2, 3, 4])],
    )
    .unwrap();
    assert_eq!(wrote, json!(true));

    let read = invoke(&service, Operation::ReadMemory, &[json!(pid), address.clone(), json!(8)]).unwrap();
    assert_eq!(read, json!([0, 0, 0, 0, 1, 2, 3, 4]));

    let freed = invoke(&service, Operation::DeallocateMemory, &[json!(pid), address, json!(8)]).unwrap();
    assert_eq!(freed, json!(true));
}

#[test]
fn test_default_allocation_through_calls() {
    let (service, pid) = service();
    let address = invoke(&service, Operation::AllocateMemory, &[json!(pid)]).unwrap();
    assert_eq!(
        service.backend().allocations(pid),
        vec![(procmem::Address::new(address.as_u64().unwrap() as usize), 4)]
    );
}

#[test]
fn test_huge_allocation_through_calls() {
    let (service, pid) = service();
    assert_eq!(
        code(&service, Operation::AllocateMemory, &[json!(pid), json!(1u64 << 46)]),
        ErrorCode::InvalidParameters
    );
    assert!(service.backend().allocations(pid).is_empty());
}

#[test]
fn test_pid_accepts_integral_float() {
    let (service, pid) = service();
    let name = invoke(&service, Operation::GetProcessName, &[json!(f64::from(pid))]).unwrap();
    assert_eq!(name, json!("game.exe"));
}
