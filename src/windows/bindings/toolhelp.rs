//! ToolHelp32 snapshot iteration over processes and modules

use crate::core::types::{Address, MemoryResult, ModuleInfo, ProcessId};
use crate::windows::types::Handle;
use crate::windows::utils::{last_native_error, wide_to_string};
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, Process32FirstW, Process32NextW,
    MODULEENTRY32W, PROCESSENTRY32W, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};

/// A ToolHelp32 snapshot, closed on drop
pub struct Snapshot(Handle);

impl Snapshot {
    /// Snapshot of every process in the system
    pub fn processes() -> MemoryResult<Self> {
        Self::create(TH32CS_SNAPPROCESS, 0)
    }

    /// Snapshot of the 32- and 64-bit modules loaded in `pid`
    pub fn modules(pid: ProcessId) -> MemoryResult<Self> {
        Self::create(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)
    }

    fn create(flags: DWORD, pid: ProcessId) -> MemoryResult<Self> {
        let handle = Handle::new(unsafe { CreateToolhelp32Snapshot(flags, pid) });
        if handle.is_invalid() {
            return Err(last_native_error("CreateToolhelp32Snapshot"));
        }
        Ok(Snapshot(handle))
    }

    /// Returns the pid of the first process whose executable name matches
    /// `name` case-insensitively
    pub fn find_process(&self, name: &str) -> Option<ProcessId> {
        unsafe {
            let mut entry: PROCESSENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as DWORD;

            if Process32FirstW(self.0.raw(), &mut entry) == FALSE {
                return None;
            }
            loop {
                if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(name) {
                    return Some(entry.th32ProcessID);
                }
                if Process32NextW(self.0.raw(), &mut entry) == FALSE {
                    return None;
                }
            }
        }
    }

    /// Returns the first module whose name matches `name` case-insensitively
    pub fn find_module(&self, name: &str) -> MemoryResult<Option<ModuleInfo>> {
        unsafe {
            let mut entry: MODULEENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<MODULEENTRY32W>() as DWORD;

            if Module32FirstW(self.0.raw(), &mut entry) == FALSE {
                return Ok(None);
            }
            loop {
                let module_name = wide_to_string(&entry.szModule);
                if module_name.eq_ignore_ascii_case(name) {
                    let module = ModuleInfo::new(
                        module_name,
                        wide_to_string(&entry.szExePath),
                        Address::new(entry.modBaseAddr as usize),
                        entry.modBaseSize as usize,
                    )?;
                    return Ok(Some(module));
                }
                if Module32NextW(self.0.raw(), &mut entry) == FALSE {
                    return Ok(None);
                }
            }
        }
    }
}
