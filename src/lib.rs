// lib.rs — DLL entry point for the display fix.
//
// Loaded into the game process (ASI loader or LoadLibrary injection),
// DllMain fires with DLL_PROCESS_ATTACH and spawns a high-priority worker
// thread that:
//   1. Sets up file logging next to the game exe
//   2. Loads YumiaDisplayFix.ini from next to this DLL
//   3. Scans the exe image for every patch site and installs hooks/patches
//   4. Exits; installed hooks live until the process does
// On fatal startup errors (no log file, no ini) only this module unloads;
// the game itself keeps running untouched.
//
// Must be compiled as a 64-bit cdylib (x86_64-pc-windows-msvc).

#![allow(non_snake_case)]

#[cfg(all(target_os = "windows", not(target_arch = "x86_64")))]
compile_error!("Build with x86_64-pc-windows-msvc (64-bit x86).");

pub mod config; // ini loading and defaults
pub mod geometry; // aspect-ratio math shared by the hooks
pub mod scanner; // byte-signature scanning over the exe image
pub mod state; // state shared between hook callbacks

#[cfg(windows)]
mod hook; // mid-hook install and byte patching
#[cfg(windows)]
mod logging; // file logger and the fallback console
#[cfg(windows)]
mod patches; // the per-site scan-and-patch modules

use std::sync::atomic::{AtomicU8, Ordering};

pub const FIX_NAME: &str = "YumiaDisplayFix";
pub const FIX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Startup progresses through these stages in order. The current stage is
/// logged at each transition so a truncated log still shows how far
/// initialization got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Uninitialized = 0,
    ConfigLoaded = 1,
    ScansAttempted = 2,
    Running = 3,
}

static STAGE: AtomicU8 = AtomicU8::new(Stage::Uninitialized as u8);

pub fn stage() -> Stage {
    match STAGE.load(Ordering::Acquire) {
        1 => Stage::ConfigLoaded,
        2 => Stage::ScansAttempted,
        3 => Stage::Running,
        _ => Stage::Uninitialized,
    }
}

/// Record a stage transition. Stages only ever move forward; the worker is
/// the sole writer.
pub fn enter_stage(stage: Stage) {
    STAGE.store(stage as u8, Ordering::Release);
    log::info!("Stage: {:?}", stage);
}

#[cfg(windows)]
mod entry {
    use std::path::PathBuf;
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use winapi::shared::minwindef::{BOOL, DWORD, HINSTANCE, HMODULE, LPVOID, MAX_PATH, TRUE};
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::libloaderapi::{
        DisableThreadLibraryCalls, FreeLibraryAndExitThread, GetModuleFileNameA,
    };
    use winapi::um::processthreadsapi::{CreateThread, SetThreadPriority};
    use winapi::um::winbase::THREAD_PRIORITY_HIGHEST;
    use winapi::um::winnt::DLL_PROCESS_ATTACH;

    use crate::scanner::ModuleImage;
    use crate::{config, logging, patches, state, Stage, FIX_NAME, FIX_VERSION};

    const LOG_FILE: &str = "YumiaDisplayFix.log";
    const CONFIG_FILE: &str = "YumiaDisplayFix.ini";

    static THIS_MODULE: AtomicUsize = AtomicUsize::new(0);

    /// Full path of a loaded module; a null handle means the game exe.
    unsafe fn module_path(handle: HMODULE) -> Option<PathBuf> {
        let mut buf = [0u8; MAX_PATH];
        let len = GetModuleFileNameA(handle, buf.as_mut_ptr() as *mut i8, buf.len() as u32);
        if len == 0 {
            return None;
        }
        let path = String::from_utf8_lossy(&buf[..len as usize]).into_owned();
        Some(PathBuf::from(path))
    }

    /// Unload this DLL and end the worker thread. The game keeps running.
    unsafe fn unload_self(code: DWORD) -> DWORD {
        FreeLibraryAndExitThread(THIS_MODULE.load(Ordering::Acquire) as HMODULE, code);
        code
    }

    unsafe extern "system" fn worker(_: LPVOID) -> DWORD {
        // Log file next to the game exe, ini next to this DLL.
        let exe_dir = module_path(ptr::null_mut())
            .and_then(|p| p.parent().map(|d| d.to_path_buf()));
        let dll_path = module_path(THIS_MODULE.load(Ordering::Acquire) as HMODULE);

        let log_path = match &exe_dir {
            Some(dir) => dir.join(LOG_FILE),
            None => PathBuf::from(LOG_FILE),
        };
        if let Err(e) = logging::init(&log_path) {
            logging::console_fallback(&[
                format!(
                    "{} v{}: could not create {}: {}",
                    FIX_NAME,
                    FIX_VERSION,
                    log_path.display(),
                    e
                ),
                "Unloading.".to_string(),
            ]);
            return unload_self(1);
        }

        log::info!("{} v{} loaded", FIX_NAME, FIX_VERSION);
        log::info!("Log file: {}", log_path.display());

        let Some(image) = ModuleImage::current_exe() else {
            log::error!("could not resolve the game module");
            return unload_self(1);
        };
        log::info!("Module Name: {}", image.name());
        log::info!("Module Address: {:#x}", image.base());
        log::info!("Module Timestamp: {}", image.timestamp());

        let config_path = match dll_path.as_ref().and_then(|p| p.parent()) {
            Some(dir) => dir.join(CONFIG_FILE),
            None => PathBuf::from(CONFIG_FILE),
        };
        let cfg = match config::FixConfig::load(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("could not load {}: {}", config_path.display(), e);
                logging::console_fallback(&[
                    format!(
                        "{} v{}: could not load {}.",
                        FIX_NAME,
                        FIX_VERSION,
                        config_path.display()
                    ),
                    format!("Put {} next to the fix DLL and restart the game.", CONFIG_FILE),
                ]);
                return unload_self(1);
            }
        };
        cfg.log_values();

        let ctx = state::init(cfg);
        crate::enter_stage(Stage::ConfigLoaded);

        patches::apply_all(ctx, &image);
        crate::enter_stage(Stage::ScansAttempted);

        crate::enter_stage(Stage::Running);
        0
    }

    /// DLL entry point. All real work happens on the worker thread; loader
    /// lock rules forbid doing it here.
    #[no_mangle]
    pub unsafe extern "system" fn DllMain(
        hinst: HINSTANCE,
        reason: DWORD,
        _reserved: LPVOID,
    ) -> BOOL {
        if reason == DLL_PROCESS_ATTACH {
            DisableThreadLibraryCalls(hinst);
            THIS_MODULE.store(hinst as usize, Ordering::Release);

            let thread = CreateThread(
                ptr::null_mut(),
                0,
                Some(worker),
                ptr::null_mut(),
                0,
                ptr::null_mut(),
            );
            if !thread.is_null() {
                // Patch sites should be in place before the engine reaches them.
                SetThreadPriority(thread, THREAD_PRIORITY_HIGHEST as i32);
                CloseHandle(thread);
            }
        }
        TRUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_progress_in_order() {
        // Single writer in production; here the transitions run in sequence.
        assert_eq!(stage(), Stage::Uninitialized);
        enter_stage(Stage::ConfigLoaded);
        assert_eq!(stage(), Stage::ConfigLoaded);
        enter_stage(Stage::ScansAttempted);
        enter_stage(Stage::Running);
        assert_eq!(stage(), Stage::Running);
    }
}
