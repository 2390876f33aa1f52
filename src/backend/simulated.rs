//! In-memory backend simulating processes, modules and address spaces
//!
//! Handles are bound to a process *instance*: terminating a process and
//! spawning a new one under the same pid leaves old handles pointing at the
//! dead instance, which is how real process handles behave.

use super::{MemoryBackend, ProcessHandle};
use crate::core::types::{
    Address, AllocationRequest, MemoryError, MemoryResult, ModuleInfo, ProcessId, ProcessInfo,
    Protection, INVALID_PROCESS_ID,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Allocation granularity of the simulated address space
pub const PAGE_SIZE: usize = 0x1000;

const FIRST_PID: ProcessId = 1000;
const FIRST_BASE: usize = 0x1000_0000;
const FIRST_HANDLE: i64 = 0x100;

// Win32 error codes reproduced so simulated failures look like native ones
const ERROR_INVALID_ADDRESS: u32 = 487;
const ERROR_NOACCESS: u32 = 998;
const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;

/// Handle to a simulated process instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedHandle {
    pid: ProcessId,
    instance: u64,
    raw: i64,
}

impl SimulatedHandle {
    /// The process instance this handle was opened against
    pub fn instance(&self) -> u64 {
        self.instance
    }
}

impl ProcessHandle for SimulatedHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn raw_value(&self) -> i64 {
        self.raw
    }
}

#[derive(Debug)]
struct Region {
    size: usize,
    protection: Protection,
    data: Vec<u8>,
    /// Created through `allocate`, as opposed to a module image
    allocated: bool,
}

#[derive(Debug)]
struct SimProcess {
    instance: u64,
    name: String,
    modules: Vec<ModuleInfo>,
    regions: BTreeMap<usize, Region>,
    next_base: usize,
}

impl SimProcess {
    fn reserve(&mut self, size: usize) -> MemoryResult<Address> {
        let base = self.next_base;
        let span = size
            .max(1)
            .checked_add(PAGE_SIZE - 1)
            .map(|s| s & !(PAGE_SIZE - 1))
            .and_then(|s| base.checked_add(s))
            .ok_or_else(|| {
                MemoryError::native_with_code("allocate", ERROR_INVALID_ADDRESS, "address space exhausted")
            })?;
        self.next_base = span;
        Ok(Address::new(base))
    }

    /// Finds the region containing `address` and the offset into it
    fn region_at(&mut self, address: Address) -> Option<(usize, &mut Region)> {
        let addr = address.as_usize();
        self.regions
            .range_mut(..=addr)
            .next_back()
            .filter(|(base, region)| addr < **base + region.size)
            .map(|(base, region)| (addr - *base, region))
    }
}

/// Zero-filled backing store, failing like the OS would instead of aborting
fn zeroed(operation: &'static str, size: usize) -> MemoryResult<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size).map_err(|e| {
        MemoryError::native_with_code(operation, ERROR_NOT_ENOUGH_MEMORY, e.to_string())
    })?;
    data.resize(size, 0);
    Ok(data)
}

#[derive(Debug)]
struct SimState {
    next_pid: ProcessId,
    next_instance: u64,
    next_handle: i64,
    processes: BTreeMap<ProcessId, SimProcess>,
}

/// A fake operating system for exercising the service without privileges
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    /// Creates an empty simulated system
    pub fn new() -> Self {
        SimulatedBackend {
            state: Mutex::new(SimState {
                next_pid: FIRST_PID,
                next_instance: 1,
                next_handle: FIRST_HANDLE,
                processes: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock leaves the maps consistent, so the
        // poisoned state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a process under the next free pid
    pub fn spawn(&self, name: &str) -> ProcessId {
        let mut state = self.lock();
        let mut pid = state.next_pid;
        while state.processes.contains_key(&pid) {
            pid += 1;
        }
        state.next_pid = pid + 1;
        Self::insert_process(&mut state, pid, name);
        pid
    }

    /// Starts a process under a specific pid, e.g. to model identifier reuse
    pub fn spawn_with_pid(&self, pid: ProcessId, name: &str) -> MemoryResult<ProcessId> {
        if pid == INVALID_PROCESS_ID {
            return Err(MemoryError::invalid_parameters("pid is reserved"));
        }
        let mut state = self.lock();
        if state.processes.contains_key(&pid) {
            return Err(MemoryError::invalid_parameters(format!(
                "pid {} is already in use",
                pid
            )));
        }
        Self::insert_process(&mut state, pid, name);
        Ok(pid)
    }

    fn insert_process(state: &mut SimState, pid: ProcessId, name: &str) {
        let instance = state.next_instance;
        state.next_instance += 1;
        state.processes.insert(
            pid,
            SimProcess {
                instance,
                name: name.to_string(),
                modules: Vec::new(),
                regions: BTreeMap::new(),
                next_base: FIRST_BASE,
            },
        );
        trace!(pid, instance, name, "simulated process spawned");
    }

    /// Terminates a process; its pid becomes free for reuse
    pub fn terminate(&self, pid: ProcessId) -> bool {
        self.lock().processes.remove(&pid).is_some()
    }

    /// Maps a module image of `size` bytes into the process
    pub fn add_module(
        &self,
        pid: ProcessId,
        name: &str,
        path: &str,
        size: usize,
    ) -> MemoryResult<ModuleInfo> {
        if size == 0 {
            return Err(MemoryError::invalid_parameters("module size must be greater than 0"));
        }
        let data = zeroed("add_module", size)?;
        let mut state = self.lock();
        let process = state
            .processes
            .get_mut(&pid)
            .ok_or(MemoryError::ProcessNotFound(pid))?;
        let base = process.reserve(size)?;
        let module = ModuleInfo::new(name, path, base, size)?;
        process.regions.insert(
            base.as_usize(),
            Region {
                size,
                protection: Protection::ExecuteRead,
                data,
                allocated: false,
            },
        );
        process.modules.push(module.clone());
        Ok(module)
    }

    /// Lists live allocations of a process as `(address, size)` pairs
    pub fn allocations(&self, pid: ProcessId) -> Vec<(Address, usize)> {
        self.lock()
            .processes
            .get(&pid)
            .map(|p| {
                p.regions
                    .iter()
                    .filter(|(_, r)| r.allocated)
                    .map(|(base, r)| (Address::new(*base), r.size))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn with_process<T>(
        &self,
        handle: &SimulatedHandle,
        operation: &'static str,
        f: impl FnOnce(&mut SimProcess) -> MemoryResult<T>,
    ) -> MemoryResult<T> {
        let mut state = self.lock();
        match state.processes.get_mut(&handle.pid) {
            Some(process) if process.instance == handle.instance => f(process),
            _ => Err(MemoryError::native_with_code(
                operation,
                ERROR_INVALID_HANDLE,
                format!("process {} has exited", handle.pid),
            )),
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend for SimulatedBackend {
    type Handle = SimulatedHandle;

    fn find_process_id(&self, name: &str) -> MemoryResult<ProcessId> {
        Ok(self
            .lock()
            .processes
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(pid, _)| *pid)
            .unwrap_or(INVALID_PROCESS_ID))
    }

    fn open_process(&self, pid: ProcessId) -> MemoryResult<SimulatedHandle> {
        let mut state = self.lock();
        let instance = state
            .processes
            .get(&pid)
            .map(|p| p.instance)
            .ok_or(MemoryError::ProcessNotFound(pid))?;
        let raw = state.next_handle;
        state.next_handle += 4;
        Ok(SimulatedHandle { pid, instance, raw })
    }

    fn process_name(&self, handle: &SimulatedHandle) -> MemoryResult<String> {
        self.with_process(handle, "process_name", |p| Ok(p.name.clone()))
    }

    fn process_info(&self, handle: &SimulatedHandle) -> MemoryResult<ProcessInfo> {
        self.with_process(handle, "process_info", |p| {
            Ok(ProcessInfo::new(p.name.clone(), handle.pid, handle.raw))
        })
    }

    fn find_module(&self, handle: &SimulatedHandle, name: &str) -> MemoryResult<Option<ModuleInfo>> {
        self.with_process(handle, "find_module", |p| {
            Ok(p.modules.iter().find(|m| m.name == name).cloned())
        })
    }

    fn allocate(&self, handle: &SimulatedHandle, request: AllocationRequest) -> MemoryResult<Address> {
        let data = zeroed("allocate", request.size)?;
        self.with_process(handle, "allocate", |p| {
            let base = p.reserve(request.size)?;
            p.regions.insert(
                base.as_usize(),
                Region {
                    size: request.size,
                    protection: request.protection,
                    data,
                    allocated: true,
                },
            );
            Ok(base)
        })
    }

    fn deallocate(&self, handle: &SimulatedHandle, address: Address, size: usize) -> MemoryResult<bool> {
        self.with_process(handle, "deallocate", |p| {
            match p.regions.get(&address.as_usize()) {
                Some(region) if region.allocated && region.size == size => {
                    p.regions.remove(&address.as_usize());
                    Ok(true)
                }
                Some(region) if region.allocated => Err(MemoryError::native_with_code(
                    "deallocate",
                    ERROR_INVALID_ADDRESS,
                    format!(
                        "size 0x{:X} does not match allocation of 0x{:X} at {}",
                        size, region.size, address
                    ),
                )),
                _ => Err(MemoryError::native_with_code(
                    "deallocate",
                    ERROR_INVALID_ADDRESS,
                    format!("{} is not an allocation base", address),
                )),
            }
        })
    }

    fn is_running(&self, handle: &SimulatedHandle) -> MemoryResult<bool> {
        Ok(self
            .lock()
            .processes
            .get(&handle.pid)
            .map_or(false, |p| p.instance == handle.instance))
    }

    fn read_bytes(&self, handle: &SimulatedHandle, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.with_process(handle, "read_bytes", |p| {
            let (offset, region) = p.region_at(address).ok_or_else(|| {
                MemoryError::native_with_code("read_bytes", ERROR_NOACCESS, format!("{} is not mapped", address))
            })?;
            if !region.protection.is_readable() {
                return Err(MemoryError::native_with_code(
                    "read_bytes",
                    ERROR_NOACCESS,
                    format!("{} is not readable ({})", address, region.protection),
                ));
            }
            let count = buffer.len().min(region.size - offset);
            buffer[..count].copy_from_slice(&region.data[offset..offset + count]);
            if count < buffer.len() {
                trace!(%address, count, requested = buffer.len(), "partial read");
            }
            Ok(count)
        })
    }

    fn write_bytes(&self, handle: &SimulatedHandle, address: Address, data: &[u8]) -> MemoryResult<usize> {
        self.with_process(handle, "write_bytes", |p| {
            let (offset, region) = p.region_at(address).ok_or_else(|| {
                MemoryError::native_with_code("write_bytes", ERROR_NOACCESS, format!("{} is not mapped", address))
            })?;
            if !region.protection.is_writable() {
                return Err(MemoryError::native_with_code(
                    "write_bytes",
                    ERROR_NOACCESS,
                    format!("{} is not writable ({})", address, region.protection),
                ));
            }
            let count = data.len().min(region.size - offset);
            region.data[offset..offset + count].copy_from_slice(&data[..count]);
            Ok(count)
        })
    }
}
