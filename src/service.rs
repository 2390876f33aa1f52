//! The process memory access service
//!
//! Each operation is a single synchronous transaction: validate the
//! arguments, resolve the pid to a live process handle, delegate to the
//! backend, and translate the result. Nothing is remembered between calls
//! unless the handle cache is enabled.
//!
//! # Process identity
//!
//! Without the cache every call re-opens the pid it is given. If the target
//! exits and the OS hands its pid to a new process between two calls, the
//! second call operates on the new process without noticing. Enable
//! `cache.enabled` and pin a [`ProcessIdentity`] with
//! [`identify`](ProcessMemoryService::identify) /
//! [`verify_identity`](ProcessMemoryService::verify_identity) to detect this.
//!
//! # Behaviour of writes
//!
//! [`write_memory`](ProcessMemoryService::write_memory) returns `true` only
//! when the backend reports that every byte was written. Failed and partial
//! writes are reported as `NATIVE_OPERATION_FAILED`.

use crate::backend::{MemoryBackend, ProcessHandle};
use crate::config::{Config, MemoryConfig};
use crate::core::types::{
    Address, AllocationRequest, MemoryError, MemoryResult, ModuleInfo, ProcessId,
    ProcessIdentity, ProcessInfo, INVALID_PROCESS_ID,
};
use crate::process::HandleCache;
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed, validated entry points over a [`MemoryBackend`]
#[derive(Debug)]
pub struct ProcessMemoryService<B: MemoryBackend> {
    backend: B,
    memory: MemoryConfig,
    cache: Option<HandleCache<B::Handle>>,
}

impl<B: MemoryBackend> ProcessMemoryService<B> {
    /// Creates a service with the default configuration
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &Config::default())
    }

    /// Creates a service from a loaded configuration
    pub fn with_config(backend: B, config: &Config) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| HandleCache::new(config.cache.max_entries));
        ProcessMemoryService {
            backend,
            memory: config.memory.clone(),
            cache,
        }
    }

    /// The underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The handle cache, when enabled
    pub fn cache(&self) -> Option<&HandleCache<B::Handle>> {
        self.cache.as_ref()
    }

    /// The allocation used by [`allocate_memory`](Self::allocate_memory)
    pub fn default_allocation(&self) -> AllocationRequest {
        self.memory.default_allocation()
    }

    /// Opens `pid` and confirms the process behind it is still running
    fn open_live(&self, pid: ProcessId) -> MemoryResult<B::Handle> {
        let handle = self.backend.open_process(pid)?;
        if !self.backend.is_running(&handle)? {
            return Err(MemoryError::ProcessNotFound(pid));
        }
        Ok(handle)
    }

    /// Resolves `pid` to a live handle and the generation it belongs to
    fn resolve(&self, pid: ProcessId) -> MemoryResult<(Arc<B::Handle>, u64)> {
        if pid == INVALID_PROCESS_ID {
            return Err(MemoryError::ProcessNotFound(pid));
        }
        match &self.cache {
            Some(cache) => cache.resolve(
                pid,
                |pid| self.open_live(pid),
                |handle| self.backend.is_running(handle),
            ),
            None => Ok((Arc::new(self.open_live(pid)?), 0)),
        }
    }

    fn handle(&self, pid: ProcessId) -> MemoryResult<Arc<B::Handle>> {
        self.resolve(pid).map(|(handle, _)| handle)
    }

    /// Resolves a process by executable name
    pub fn find_by_process_name(&self, name: &str) -> MemoryResult<ProcessId> {
        if name.trim().is_empty() {
            return Err(MemoryError::MissingProcessName);
        }
        let pid = traced("findByProcessName", self.backend.find_process_id(name))?;
        if pid == INVALID_PROCESS_ID {
            debug!(name, "no process found");
            return Err(MemoryError::NoProcessFound(name.to_string()));
        }
        debug!(name, pid, "process resolved");
        Ok(pid)
    }

    /// Executable name of a running process
    pub fn get_process_name(&self, pid: ProcessId) -> MemoryResult<String> {
        traced("getProcessName", self.handle(pid).and_then(|h| self.backend.process_name(&h)))
    }

    /// Name, pid and native handle of a running process
    pub fn get_info(&self, pid: ProcessId) -> MemoryResult<ProcessInfo> {
        traced("getInfo", self.handle(pid).and_then(|h| self.backend.process_info(&h)))
    }

    /// Looks up a loaded module by name, matched the way the backend
    /// matches module names
    pub fn get_module(&self, pid: ProcessId, module_name: &str) -> MemoryResult<ModuleInfo> {
        if module_name.trim().is_empty() {
            return Err(MemoryError::MissingFunctionArguments("pid, module_name"));
        }
        let handle = traced("getModule", self.handle(pid))?;
        let module = traced("getModule", self.backend.find_module(&handle, module_name))?
            .ok_or_else(|| MemoryError::ModuleNotFound {
                pid,
                name: module_name.to_string(),
            })?;

        // The backend's fields are public; re-derive `end` rather than trust it
        let module = ModuleInfo::from_bounds(module.name, module.path, module.base, module.size, module.end)?;
        debug!(pid, module = %module.name, base = %module.base, size = module.size, "module resolved");
        Ok(module)
    }

    /// Allocates the configured default region (one native `int` of
    /// read/write/execute memory unless configured otherwise)
    pub fn allocate_memory(&self, pid: ProcessId) -> MemoryResult<Address> {
        self.allocate_memory_with(pid, self.default_allocation())
    }

    /// Allocates a region of the requested size and protection
    pub fn allocate_memory_with(&self, pid: ProcessId, request: AllocationRequest) -> MemoryResult<Address> {
        if request.size == 0 {
            return Err(MemoryError::invalid_parameters(
                "allocation size must be greater than 0",
            ));
        }
        if request.size > self.memory.max_allocation_size {
            return Err(MemoryError::invalid_parameters(format!(
                "allocation size {} exceeds the maximum allocation size of {}",
                request.size, self.memory.max_allocation_size
            )));
        }
        let handle = traced("allocateMemory", self.handle(pid))?;
        let address = traced("allocateMemory", self.backend.allocate(&handle, request))?;
        if address.is_null() {
            return Err(MemoryError::native("allocate", "backend returned a null address"));
        }
        debug!(pid, %address, size = request.size, protection = %request.protection, "allocated");
        Ok(address)
    }

    /// Frees a region previously returned by an allocation.
    ///
    /// `byte_length` must be the size that was requested; a mismatch is
    /// rejected by the backend instead of freeing a different extent.
    pub fn deallocate_memory(&self, pid: ProcessId, address: Address, byte_length: usize) -> MemoryResult<bool> {
        let handle = traced("deallocateMemory", self.handle(pid))?;
        let freed = traced(
            "deallocateMemory",
            self.backend.deallocate(&handle, address, byte_length),
        )?;
        if !freed {
            return Err(MemoryError::native(
                "deallocate",
                format!("backend declined to free {} (0x{:X} bytes)", address, byte_length),
            ));
        }
        debug!(pid, %address, byte_length, "deallocated");
        Ok(true)
    }

    /// Writes `data` at `address`, succeeding only on a complete write
    pub fn write_memory(&self, pid: ProcessId, address: Address, data: &[u8]) -> MemoryResult<bool> {
        let handle = traced("writeMemory", self.handle(pid))?;
        if data.is_empty() {
            return Ok(true);
        }
        let written = traced("writeMemory", self.backend.write_bytes(&handle, address, data))?;
        if written != data.len() {
            let err = MemoryError::native(
                "write",
                format!(
                    "partial write at {}: expected {} bytes, wrote {} bytes",
                    address,
                    data.len(),
                    written
                ),
            );
            warn!(pid, error = %err, "writeMemory failed");
            return Err(err);
        }
        debug!(pid, %address, len = data.len(), "wrote memory");
        Ok(true)
    }

    /// Reads exactly `byte_length` bytes from `address`
    pub fn read_memory(&self, pid: ProcessId, address: Address, byte_length: usize) -> MemoryResult<Vec<u8>> {
        if byte_length > self.memory.max_read_size {
            return Err(MemoryError::invalid_parameters(format!(
                "byteLength {} exceeds the maximum read size of {}",
                byte_length, self.memory.max_read_size
            )));
        }
        let handle = traced("readMemory", self.handle(pid))?;
        if byte_length == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; byte_length];
        let read = traced("readMemory", self.backend.read_bytes(&handle, address, &mut buffer))?;
        if read != byte_length {
            let err = MemoryError::native(
                "read",
                format!(
                    "truncated read at {}: expected {} bytes, read {} bytes",
                    address, byte_length, read
                ),
            );
            warn!(pid, error = %err, "readMemory failed");
            return Err(err);
        }
        debug!(pid, %address, byte_length, "read memory");
        Ok(buffer)
    }

    /// Whether `pid` currently names a running process
    pub fn is_process_running(&self, pid: ProcessId) -> MemoryResult<bool> {
        if pid == INVALID_PROCESS_ID {
            return Ok(false);
        }
        match self.backend.open_process(pid) {
            Ok(handle) => traced("isProcessRunning", self.backend.is_running(&handle)),
            Err(MemoryError::ProcessNotFound(_)) => Ok(false),
            Err(err) => traced("isProcessRunning", Err(err)),
        }
    }

    /// Pins the process currently behind `pid`.
    ///
    /// Generations are only tracked by the handle cache; without it every
    /// identity has generation 0 and only liveness can be verified.
    pub fn identify(&self, pid: ProcessId) -> MemoryResult<ProcessIdentity> {
        let (handle, generation) = self.resolve(pid)?;
        Ok(ProcessIdentity {
            pid: handle.pid(),
            generation,
        })
    }

    /// Fails with `PROCESS_IDENTITY_CHANGED` when `pid` no longer names the
    /// process that was pinned
    pub fn verify_identity(&self, identity: &ProcessIdentity) -> MemoryResult<()> {
        let (_, generation) = self.resolve(identity.pid)?;
        if generation != identity.generation {
            return Err(MemoryError::ProcessIdentityChanged {
                pid: identity.pid,
                expected: identity.generation,
                actual: generation,
            });
        }
        Ok(())
    }
}

/// Logs backend and resolution failures; argument errors are the caller's
fn traced<T>(operation: &'static str, result: MemoryResult<T>) -> MemoryResult<T> {
    if let Err(err) = &result {
        if !err.code().is_argument_error() {
            warn!(operation, code = %err.code(), error = %err, "operation failed");
        }
    }
    result
}
