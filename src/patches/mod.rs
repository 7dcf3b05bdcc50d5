// patches/mod.rs — The scan-and-patch sites, run once at startup.
//
// Each site is independent: locate its signature in the exe image, install
// a mid-hook or write a byte patch, log the result. A missed scan disables
// only that site's feature — the remaining sites are still attempted, and
// the host process is never impacted. Signatures are valid for exactly one
// game build; after an update every one of them is expected to miss.

mod fov;
mod hud;
mod intro;
mod resolution;

use crate::hook::{self, MidRoutine};
use crate::scanner::{ModuleImage, Signature};
use crate::state::FixContext;

/// Run every site against the loaded game image. Order matters only in that
/// the resolution hook feeds the geometry the HUD/FOV hooks read.
pub unsafe fn apply_all(ctx: &'static FixContext, image: &ModuleImage) {
    resolution::install(ctx, image);
    fov::install(image);
    hud::install(ctx, image);
    intro::install(ctx, image);
}

/// Scan for one site's signature, logging hit or miss. The signature
/// strings are compile-time constants; a parse failure is a programming
/// error but still only disables the one site.
pub(crate) unsafe fn find_site(image: &ModuleImage, name: &str, pattern: &str) -> Option<usize> {
    let sig = match Signature::parse(pattern) {
        Ok(sig) => sig,
        Err(e) => {
            log::error!("{}: bad signature: {}", name, e);
            return None;
        }
    };
    match image.find(&sig) {
        Some((addr, offset)) => {
            log::info!("{}: address is {}+{:#x}", name, image.name(), offset);
            Some(addr)
        }
        None => {
            log::error!("{}: pattern scan failed", name);
            None
        }
    }
}

/// Install a mid-hook at a located site and park the handle for the process
/// lifetime. Install failures are isolated the same way scan misses are.
pub(crate) unsafe fn hook_site(name: &str, addr: usize, routine: MidRoutine) {
    match hook::install_mid(addr, routine) {
        Ok(h) => hook::retain(h),
        Err(e) => log::error!("{}: {}", name, e),
    }
}
