//! Dispatch of host-style calls onto the service
//!
//! Hosts pass loosely typed argument lists. Presence and arity are checked
//! first, using the error code each operation has always reported, then
//! every argument is decoded into its typed form before the service runs.

use crate::backend::MemoryBackend;
use crate::core::types::{
    Address, AllocationRequest, MemoryError, MemoryResult, ProcessId, Protection,
};
use crate::service::ProcessMemoryService;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// The nine callables exposed to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindByProcessName,
    GetProcessName,
    GetInfo,
    GetModule,
    AllocateMemory,
    DeallocateMemory,
    WriteMemory,
    ReadMemory,
    IsProcessRunning,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::FindByProcessName,
        Operation::GetProcessName,
        Operation::GetInfo,
        Operation::GetModule,
        Operation::AllocateMemory,
        Operation::DeallocateMemory,
        Operation::WriteMemory,
        Operation::ReadMemory,
        Operation::IsProcessRunning,
    ];

    /// Name the operation is called by
    pub const fn name(&self) -> &'static str {
        match self {
            Operation::FindByProcessName => "findByProcessName",
            Operation::GetProcessName => "getProcessName",
            Operation::GetInfo => "getInfo",
            Operation::GetModule => "getModule",
            Operation::AllocateMemory => "allocateMemory",
            Operation::DeallocateMemory => "deallocateMemory",
            Operation::WriteMemory => "writeMemory",
            Operation::ReadMemory => "readMemory",
            Operation::IsProcessRunning => "isProcessRunning",
        }
    }

    /// Argument list, as shown in usage and error messages
    pub const fn signature(&self) -> &'static str {
        match self {
            Operation::FindByProcessName => "processName",
            Operation::GetProcessName | Operation::GetInfo | Operation::IsProcessRunning => "pid",
            Operation::GetModule => "pid, moduleName",
            Operation::AllocateMemory => "pid, [size], [protection]",
            Operation::DeallocateMemory => "pid, address, byteLength",
            Operation::WriteMemory => "pid, address, bytes",
            Operation::ReadMemory => "pid, address, byteLength",
        }
    }

    /// Accepted argument count as `(required, maximum)`
    const fn arity(&self) -> (usize, usize) {
        match self {
            Operation::FindByProcessName
            | Operation::GetProcessName
            | Operation::GetInfo
            | Operation::IsProcessRunning => (1, 1),
            Operation::GetModule => (2, 2),
            Operation::AllocateMemory => (1, 3),
            Operation::DeallocateMemory | Operation::WriteMemory | Operation::ReadMemory => (3, 3),
        }
    }

    /// Error reported when arguments are missing or the count is wrong
    fn arity_error(&self) -> MemoryError {
        match self {
            Operation::FindByProcessName => MemoryError::MissingProcessName,
            Operation::GetProcessName | Operation::GetInfo => MemoryError::MissingProcessPid,
            Operation::AllocateMemory => MemoryError::invalid_parameters(format!(
                "allocateMemory expects ({})",
                self.signature()
            )),
            _ => MemoryError::MissingFunctionArguments(self.signature()),
        }
    }

    fn check_arity(&self, args: &[Value]) -> MemoryResult<()> {
        let (required, maximum) = self.arity();
        let missing = args.len() < required || args[..required].iter().any(Value::is_null);
        if missing || args.len() > maximum {
            return Err(self.arity_error());
        }
        Ok(())
    }
}

impl FromStr for Operation {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| MemoryError::invalid_parameters(format!("unknown operation '{}'", s)))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs `op` with host-supplied arguments and returns its JSON result
pub fn invoke<B: MemoryBackend>(
    service: &ProcessMemoryService<B>,
    op: Operation,
    args: &[Value],
) -> MemoryResult<Value> {
    op.check_arity(args)?;

    let result = match op {
        Operation::FindByProcessName => {
            let name = decode_string(&args[0], "processName")?;
            json!(service.find_by_process_name(name)?)
        }
        Operation::GetProcessName => json!(service.get_process_name(decode_pid(&args[0])?)?),
        Operation::GetInfo => serde_json::to_value(service.get_info(decode_pid(&args[0])?)?)?,
        Operation::GetModule => {
            let pid = decode_pid(&args[0])?;
            let name = decode_string(&args[1], "moduleName")?;
            serde_json::to_value(service.get_module(pid, name)?)?
        }
        Operation::AllocateMemory => {
            let pid = decode_pid(&args[0])?;
            let request = decode_allocation(&args[1..], service.default_allocation())?;
            json!(service.allocate_memory_with(pid, request)?.as_usize())
        }
        Operation::DeallocateMemory => {
            let pid = decode_pid(&args[0])?;
            let address = decode_address(&args[1])?;
            let length = decode_length(&args[2], "byteLength")?;
            json!(service.deallocate_memory(pid, address, length)?)
        }
        Operation::WriteMemory => {
            let pid = decode_pid(&args[0])?;
            let address = decode_address(&args[1])?;
            let data = decode_bytes(&args[2])?;
            json!(service.write_memory(pid, address, &data)?)
        }
        Operation::ReadMemory => {
            let pid = decode_pid(&args[0])?;
            let address = decode_address(&args[1])?;
            let length = decode_length(&args[2], "byteLength")?;
            json!(service.read_memory(pid, address, length)?)
        }
        Operation::IsProcessRunning => json!(service.is_process_running(decode_pid(&args[0])?)?),
    };
    Ok(result)
}

/// Non-negative integer, accepting integral floats from hosts that only
/// have doubles
fn decode_integer(value: &Value, what: &str) -> MemoryResult<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => Ok(f as u64),
        _ => Err(MemoryError::invalid_parameters(format!(
            "{} must be a non-negative integer, got {}",
            what, value
        ))),
    }
}

fn decode_pid(value: &Value) -> MemoryResult<ProcessId> {
    let raw = decode_integer(value, "pid")?;
    ProcessId::try_from(raw)
        .map_err(|_| MemoryError::invalid_parameters(format!("pid {} is out of range", raw)))
}

fn decode_length(value: &Value, what: &str) -> MemoryResult<usize> {
    let raw = decode_integer(value, what)?;
    usize::try_from(raw)
        .map_err(|_| MemoryError::invalid_parameters(format!("{} {} is out of range", what, raw)))
}

fn decode_string<'a>(value: &'a Value, what: &str) -> MemoryResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| MemoryError::invalid_parameters(format!("{} must be a string", what)))
}

fn decode_address(value: &Value) -> MemoryResult<Address> {
    match value {
        Value::String(s) => s
            .parse::<Address>()
            .map_err(|e| MemoryError::invalid_parameters(e.to_string())),
        _ => decode_length(value, "address").map(Address::new),
    }
}

fn decode_bytes(value: &Value) -> MemoryResult<Vec<u8>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| {
                        MemoryError::invalid_parameters(format!(
                            "bytes must be integers in 0..=255, got {}",
                            item
                        ))
                    })
            })
            .collect(),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .trim_start_matches("0x")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            hex::decode(&digits)
                .map_err(|e| MemoryError::invalid_parameters(format!("invalid hex bytes: {}", e)))
        }
        other => Err(MemoryError::invalid_parameters(format!(
            "bytes must be an array or a hex string, got {}",
            other
        ))),
    }
}

/// Optional `[size, protection]` tail of `allocateMemory`
fn decode_allocation(rest: &[Value], default: AllocationRequest) -> MemoryResult<AllocationRequest> {
    let size = match rest.first() {
        Some(v) if !v.is_null() => decode_length(v, "size")?,
        _ => default.size,
    };
    let protection = match rest.get(1) {
        Some(Value::String(s)) => s.parse::<Protection>()?,
        Some(Value::Null) | None => default.protection,
        Some(other) => {
            return Err(MemoryError::invalid_parameters(format!(
                "protection must be a string, got {}",
                other
            )))
        }
    };
    AllocationRequest::new(size, protection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorCode;

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.to_string().parse::<Operation>().unwrap(), op);
        }
        assert!("readmemory".parse::<Operation>().is_err());
    }

    #[test]
    fn test_decode_integer_accepts_integral_floats() {
        assert_eq!(decode_integer(&json!(1234), "pid").unwrap(), 1234);
        assert_eq!(decode_integer(&json!(1234.0), "pid").unwrap(), 1234);
        assert!(decode_integer(&json!(12.5), "pid").is_err());
        // 2^64 would saturate to u64::MAX
        assert!(decode_integer(&json!(18446744073709551616.0), "address").is_err());
        assert!(decode_address(&json!(1e300)).is_err());
        assert!(decode_integer(&json!(-1), "pid").is_err());
        assert!(decode_integer(&json!("12"), "pid").is_err());
    }

    #[test]
    fn test_decode_pid_range() {
        assert_eq!(decode_pid(&json!(u32::MAX)).unwrap(), u32::MAX);
        let err = decode_pid(&json!(u64::from(u32::MAX) + 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameters);
    }

    #[test]
    fn test_decode_address_forms() {
        assert_eq!(decode_address(&json!(4096)).unwrap(), Address::new(0x1000));
        assert_eq!(decode_address(&json!("0x1000")).unwrap(), Address::new(0x1000));
        assert_eq!(decode_address(&json!("$1000")).unwrap(), Address::new(0x1000));
        assert!(decode_address(&json!("zz")).is_err());
        assert!(decode_address(&json!(true)).is_err());
    }

    #[test]
    fn test_decode_bytes_forms() {
        assert_eq!(decode_bytes(&json!([0, 127, 255])).unwrap(), vec![0, 127, 255]);
        assert_eq!(decode_bytes(&json!("0xDEAD beef")).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(decode_bytes(&json!([])).unwrap(), Vec::<u8>::new());
        assert!(decode_bytes(&json!([256])).is_err());
        assert!(decode_bytes(&json!("abc")).is_err());
        assert!(decode_bytes(&json!(7)).is_err());
    }

    #[test]
    fn test_decode_allocation_defaults() {
        let default = AllocationRequest::NATIVE_INT;
        assert_eq!(decode_allocation(&[], default).unwrap(), default);
        assert_eq!(
            decode_allocation(&[json!(64), json!("rw")], default).unwrap(),
            AllocationRequest {
                size: 64,
                protection: Protection::ReadWrite
            }
        );
        assert!(decode_allocation(&[json!(0)], default).is_err());
        assert!(decode_allocation(&[json!(8), json!(4)], default).is_err());
    }

    #[test]
    fn test_arity_codes() {
        let cases = [
            (Operation::FindByProcessName, ErrorCode::MissingProcessName),
            (Operation::GetProcessName, ErrorCode::MissingProcessPid),
            (Operation::GetInfo, ErrorCode::MissingProcessPid),
            (Operation::GetModule, ErrorCode::MissingFunctionArguments),
            (Operation::AllocateMemory, ErrorCode::InvalidParameters),
            (Operation::DeallocateMemory, ErrorCode::MissingFunctionArguments),
            (Operation::WriteMemory, ErrorCode::MissingFunctionArguments),
            (Operation::ReadMemory, ErrorCode::MissingFunctionArguments),
            (Operation::IsProcessRunning, ErrorCode::MissingFunctionArguments),
        ];
        for (op, code) in cases {
            assert_eq!(op.check_arity(&[]).unwrap_err().code(), code, "{}", op);
            assert_eq!(op.check_arity(&vec![Value::Null; 3]).unwrap_err().code(), code, "{}", op);
        }
    }
}
