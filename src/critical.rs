//! Component A — the critical-section gate (spec §4.A).
//!
//! `disable()`/`restore(mask)` wrap every public state-mutating operation
//! in B–G. `disable` nests: only the outermost `restore` actually
//! re-enables interrupts, per a bounded reentrancy counter, the same
//! "only flip the hardware flag at depth zero" idiom the teacher uses for
//! its `PREEMPTION_DISABLED` atomic flag in `scheduler/mod.rs`, generalized
//! here into a real depth counter so nested `disable`/`restore` pairs are
//! safe rather than merely a single boolean.

use crate::arch::{Arch, IrqMask};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Reentrancy depth. Zero means interrupts are (from this gate's point of
/// view) enabled; any positive depth means some critical section is active.
static DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Mask saved from the outermost `disable()` call, restored only when the
/// matching outermost `restore()` fires.
static SAVED_MASK: AtomicUsize = AtomicUsize::new(0);

/// Opaque token returned by [`disable`] and required by [`restore`].
///
/// Carries the depth the gate was at *before* this call, so a matched
/// `restore` can tell whether it is the outermost one.
#[derive(Debug, Clone, Copy)]
pub struct Mask(usize);

/// Disable interrupts and enter (or re-enter) the critical section.
///
/// Safe to call recursively up to [`usize::MAX`] times; only the
/// `restore` matching the outermost `disable` re-enables interrupts.
pub fn disable<A: Arch>() -> Mask {
    let prev_depth = DEPTH.fetch_add(1, Ordering::AcqRel);
    if prev_depth == 0 {
        let hw_mask = A::irq_disable();
        SAVED_MASK.store(hw_mask, Ordering::Release);
    }
    Mask(prev_depth)
}

/// Leave the critical section entered by the matching [`disable`] call.
///
/// If `mask` came from the outermost `disable` (i.e. the gate is about to
/// return to depth zero), interrupts are actually restored; otherwise
/// this is a no-op besides the bookkeeping decrement.
pub fn restore<A: Arch>(mask: Mask) {
    let depth = DEPTH.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(depth > 0, "restore() without a matching disable()");
    if mask.0 == 0 && depth == 1 {
        let hw_mask: IrqMask = SAVED_MASK.load(Ordering::Acquire);
        A::irq_restore(hw_mask);
    }
}

/// True while any critical section is active. Exposed for debug assertions
/// elsewhere (e.g. "this must only be called with interrupts disabled").
pub fn in_critical_section() -> bool {
    DEPTH.load(Ordering::Acquire) > 0
}

/// Run `f` inside a critical section, restoring on every exit path
/// (including panics that unwind — though kernel builds use
/// `panic = "abort"`, so this matters only for the host test harness).
pub fn with_critical_section<A: Arch, R>(f: impl FnOnce() -> R) -> R {
    let mask = disable::<A>();
    let r = f();
    restore::<A>(mask);
    r
}
