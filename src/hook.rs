// hook.rs — Mid-execution hooks and raw byte patching.
//
// Two ways into the game's code, used by every patch site:
//
//   install_mid() — trampoline interception at an arbitrary instruction.
//     The routine runs with a mutable view of the CPU registers before the
//     original instruction executes, then execution resumes. Backed by
//     ilhook's JmpBack hooks.
//
//   patch_bytes() / write() — unconditional overwrite of code or data.
//     Permanent for the process lifetime; no rollback path exists or is
//     needed, sites are patched once at startup.
//
// A MidHook is an RAII handle: dropping it uninstalls the hook. Sites that
// should live until process exit hand their handle to retain().

use std::ffi::c_void;
use std::sync::Mutex;

use ilhook::x64::{CallbackOption, HookFlags, HookPoint, HookType, Hooker};
use thiserror::Error;
use winapi::um::memoryapi::VirtualProtect;
use winapi::um::winnt::PAGE_EXECUTE_READWRITE;

pub use ilhook::x64::Registers;

/// Routine invoked at the hooked instruction. Runs in-place on whichever
/// host thread got there, possibly concurrently; keep it short and
/// allocation-free, and go through state::get() for anything shared.
pub type MidRoutine = unsafe extern "win64" fn(regs: *mut Registers, user_data: usize);

#[derive(Debug, Error)]
pub enum HookError {
    #[error("VirtualProtect failed at {addr:#x}")]
    Protect { addr: usize },
    #[error("mid hook install failed at {addr:#x}: {reason:?}")]
    Install {
        addr: usize,
        reason: ilhook::HookError,
    },
}

/// An installed interception. Alive = hooked; dropping it restores the
/// original bytes and frees the trampoline.
pub struct MidHook {
    point: Option<HookPoint>,
}

// The handle is only moved into the registry after installation; the hook
// machinery itself is touched from no other thread afterwards.
unsafe impl Send for MidHook {}

impl Drop for MidHook {
    fn drop(&mut self) {
        if let Some(point) = self.point.take() {
            // Unhook errors are only reachable at process teardown; nothing
            // useful left to do with them.
            let _ = unsafe { point.unhook() };
        }
    }
}

/// Redirect control flow at `addr` through `routine`. The target must be a
/// valid instruction boundary and not already hooked by this engine — the
/// orchestration installs at most one hook per site.
pub unsafe fn install_mid(addr: usize, routine: MidRoutine) -> Result<MidHook, HookError> {
    let hooker = Hooker::new(
        addr,
        HookType::JmpBack(routine),
        CallbackOption::None,
        0,
        HookFlags::empty(),
    );
    let point = hooker
        .hook()
        .map_err(|reason| HookError::Install { addr, reason })?;
    Ok(MidHook { point: Some(point) })
}

/// Hooks that live for the remainder of the process. There is no teardown
/// transition; the registry is only ever appended to.
static RETAINED: Mutex<Vec<MidHook>> = Mutex::new(Vec::new());

pub fn retain(hook: MidHook) {
    let mut held = match RETAINED.lock() {
        Ok(h) => h,
        Err(poisoned) => poisoned.into_inner(),
    };
    held.push(hook);
}

/// Temporarily lift the page protection around [addr, addr+len), run `f`,
/// restore the previous protection.
unsafe fn with_writable<R>(addr: usize, len: usize, f: impl FnOnce() -> R) -> Result<R, HookError> {
    let mut old: u32 = 0;
    if VirtualProtect(addr as *mut c_void, len, PAGE_EXECUTE_READWRITE, &mut old) == 0 {
        return Err(HookError::Protect { addr });
    }
    let r = f();
    VirtualProtect(addr as *mut c_void, len, old, &mut old);
    Ok(r)
}

/// Overwrite `bytes.len()` bytes at `addr`. Code pages are read/execute
/// protected, so the protection is lifted for the write.
pub unsafe fn patch_bytes(addr: usize, bytes: &[u8]) -> Result<(), HookError> {
    with_writable(addr, bytes.len(), || {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len());
    })
}

/// Overwrite a single plain-data value at `addr`.
pub unsafe fn write<T: Copy>(addr: usize, value: T) -> Result<(), HookError> {
    with_writable(addr, std::mem::size_of::<T>(), || {
        std::ptr::write_unaligned(addr as *mut T, value);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patched_bytes_read_back_exactly() {
        // Heap pages are already writable; patch_bytes must still succeed
        // and the range must read back as exactly what was written.
        let mut buf = vec![0u8; 32];
        let addr = buf.as_mut_ptr() as usize + 7;
        unsafe {
            patch_bytes(addr, &[0xEB, 0x1D]).unwrap();
        }
        assert_eq!(&buf[7..9], &[0xEB, 0x1D]);
        assert_eq!(buf[6], 0);
        assert_eq!(buf[9], 0);
    }

    #[test]
    fn typed_write_round_trips() {
        let mut slot: [u8; 8] = [0; 8];
        let addr = slot.as_mut_ptr() as usize;
        unsafe {
            write::<i32>(addr, 3440).unwrap();
            write::<i32>(addr + 4, 1440).unwrap();
        }
        assert_eq!(i32::from_le_bytes(slot[..4].try_into().unwrap()), 3440);
        assert_eq!(i32::from_le_bytes(slot[4..].try_into().unwrap()), 1440);
    }
}
