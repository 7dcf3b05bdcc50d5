// patches/intro.rs — One-shot skip of the startup logo/notice sequence.
//
// The title-screen sequencer advances an integer state through the company
// logos and the autosave notice. The hook sits where the next state is
// staged in eax and, exactly once per run, overwrites it with the
// end-of-sequence state. Gated on [Skip Intro].

use crate::hook::Registers;
use crate::scanner::ModuleImage;
use crate::state::{self, FixContext};

use super::{find_site, hook_site};

// Staged-state store inside the sequencer's advance routine.
const INTRO_STATE_SIG: &str = "89 ?? ?? ?? ?? ?? 8B ?? 83 F8 ?? 74 ?? FF C0 89 ?? ?? ?? ?? ??";

/// Sequencer state after the last notice screen.
const SEQUENCE_DONE: u64 = 0x05;

pub unsafe fn install(ctx: &'static FixContext, image: &ModuleImage) {
    if !ctx.config.skip_intro {
        return;
    }
    if let Some(addr) = find_site(image, "Skip Intro", INTRO_STATE_SIG) {
        hook_site("Skip Intro", addr, on_sequence_advance);
    }
}

unsafe extern "win64" fn on_sequence_advance(regs: *mut Registers, _user: usize) {
    let Some(ctx) = state::get() else { return };
    if !ctx.claim_intro_skip() {
        return;
    }
    let regs = &mut *regs;
    regs.rax = SEQUENCE_DONE;
    log::info!("Skip Intro: intro sequence skipped");
}
