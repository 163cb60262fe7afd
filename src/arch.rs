//! Seam between the portable core and the architecture-specific or
//! otherwise external collaborators spec.md §1/§6 explicitly puts out of
//! scope: the memory allocator, the interrupt controller, and the
//! CPU register-save primitive.
//!
//! None of the five example kernels in this corpus separate "mechanism"
//! from "policy" at quite this seam (they inline `asm!` and MSR/PIC
//! calls directly in `arch/x86_64/*`), but `cluu`'s own
//! `scheduler::traits::{Scheduler, KernelSchedCtx}` split is built on
//! exactly this idea — a `dyn`-safe trait boundary so one side can be
//! swapped (or, here, supplied by a concrete booted kernel) without
//! touching the other. We reuse that shape for the boundary the spec
//! asks for instead of inventing a new one.

/// Interrupt-mask type returned by [`Arch::irq_disable`] and consumed by
/// [`Arch::irq_restore`]. Treated as opaque by the core; real
/// implementations make it the saved EFLAGS/PRIMASK/whatever the target
/// uses.
pub type IrqMask = usize;

/// The single context-switch primitive (spec §4.D Design Notes).
///
/// `ctxsw` semantically swaps the CPU state of the outgoing process for
/// that of the incoming one. The core never inspects register contents;
/// it only ever swaps the two opaque stack-pointer cells it was handed
/// at process-create time and at the moment of switch.
///
/// # Safety
/// Implementations perform a raw stack switch. `old_sp` must point at a
/// cell belonging to a process the core believes is CURR; `new_sp` must
/// be a stack pointer previously produced by [`Arch::build_initial_frame`]
/// or a prior `ctxsw` save.
pub unsafe trait Arch {
    /// Disable interrupts, returning a mask that restores the prior state.
    fn irq_disable() -> IrqMask;

    /// Restore interrupts to the state `mask` describes.
    fn irq_restore(mask: IrqMask);

    /// Swap the outgoing process's saved stack pointer for the incoming
    /// one's, returning control to the caller only once this process is
    /// switched back in.
    ///
    /// # Safety
    /// See trait documentation.
    unsafe fn ctxsw(old_sp: &mut usize, new_sp: usize);

    /// Build the initial stack frame for a newly created process so that
    /// the first `ctxsw` into it lands in `entry` with `argv[..argc]`
    /// loaded per the platform calling convention, and a return address
    /// aiming at the process-exit trampoline.
    ///
    /// `stack` is the full stack region (`stack.len()` bytes, growing
    /// toward lower addresses per spec §6). Returns the initial saved
    /// stack pointer to store in the PCB.
    fn build_initial_frame(
        stack: &mut [u8],
        entry: usize,
        argv: &[usize],
        exit_trampoline: usize,
    ) -> usize;
}

/// External memory collaborator (spec §6): a free-list heap with a
/// separate stack pool, outside this crate's scope. The process table
/// asks for stacks through this trait and returns them on `kill`.
pub trait StackPool {
    /// Allocate a stack of at least `bytes`, rounded per the
    /// implementation's alignment rules. Returns the stack as a mutable
    /// byte slice (low address first); the process grows it toward index 0.
    fn alloc_stack(&mut self, bytes: usize) -> Option<&'static mut [u8]>;

    /// Return a stack previously produced by `alloc_stack`.
    fn free_stack(&mut self, stack: &'static mut [u8]);
}

/// External interrupt-controller collaborator (spec §6). The clock
/// module calls `send_eoi` after processing a tick so the core never
/// links against a specific PIC/APIC driver.
pub trait InterruptController {
    fn send_eoi(&mut self, irq: u8);
}
