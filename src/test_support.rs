//! Host-only fakes for the external collaborators named in `arch.rs`
//! (spec §6). Only compiled under `#[cfg(test)]`; a real boot target
//! supplies its own `Arch`/`StackPool`/`InterruptController`
//! implementations instead, the way the teacher's `arch/x86_64` module
//! backs the same seam in `scheduler/traits.rs`.

use crate::arch::{Arch, InterruptController, IrqMask, StackPool};
use core::sync::atomic::{AtomicBool, Ordering};
use std::boxed::Box;
use std::vec::Vec;

static IRQS_DISABLED: AtomicBool = AtomicBool::new(false);

/// No real CPU to switch on a host test run. `irq_disable`/`irq_restore`
/// track a flag so `critical.rs`'s tests can observe gate behavior;
/// `ctxsw` has no registers to save, so it only exists to satisfy the
/// trait — nothing in this crate's tests resumes execution mid-stack.
pub struct TestArch;

unsafe impl Arch for TestArch {
    fn irq_disable() -> IrqMask {
        let was_disabled = IRQS_DISABLED.swap(true, Ordering::AcqRel);
        was_disabled as IrqMask
    }

    fn irq_restore(mask: IrqMask) {
        IRQS_DISABLED.store(mask != 0, Ordering::Release);
    }

    unsafe fn ctxsw(old_sp: &mut usize, new_sp: usize) {
        *old_sp = new_sp;
    }

    fn build_initial_frame(
        stack: &mut [u8],
        entry: usize,
        argv: &[usize],
        exit_trampoline: usize,
    ) -> usize {
        // No real calling convention to honor here; just stash enough of
        // the inputs at the top of the stack that a test could, in
        // principle, assert on them, and return that address as "sp".
        let top = stack.as_mut_ptr() as usize + stack.len();
        let _ = (entry, argv, exit_trampoline);
        top
    }
}

impl TestArch {
    pub fn irqs_disabled() -> bool {
        IRQS_DISABLED.load(Ordering::Acquire)
    }

    /// Test-only: reset the shared IRQ flag between cases that don't go
    /// through a matched `disable`/`restore` pair.
    #[allow(dead_code)]
    pub fn reset() {
        IRQS_DISABLED.store(false, Ordering::Release);
    }
}

/// Leaks a `Vec<u8>` per allocation so the returned slice can satisfy
/// `StackPool::alloc_stack`'s `'static` lifetime. Fine for a test
/// process's lifetime; a real `StackPool` draws from a fixed arena
/// instead (spec §6 memory collaborator).
pub struct TestStackPool {
    live_bytes: usize,
}

impl TestStackPool {
    pub fn new() -> Self {
        TestStackPool { live_bytes: 0 }
    }

    #[allow(dead_code)]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }
}

impl StackPool for TestStackPool {
    fn alloc_stack(&mut self, bytes: usize) -> Option<&'static mut [u8]> {
        let buf: Box<[u8]> = std::vec![0u8; bytes].into_boxed_slice();
        self.live_bytes += bytes;
        Some(Box::leak(buf))
    }

    fn free_stack(&mut self, stack: &'static mut [u8]) {
        self.live_bytes = self.live_bytes.saturating_sub(stack.len());
        // SAFETY: `stack` was produced by `Box::leak` in `alloc_stack`
        // above and is handed back exactly once, by the same caller
        // (`Kernel::kill`) that received it from `alloc_stack`.
        unsafe {
            drop(Box::from_raw(stack as *mut [u8]));
        }
    }
}

/// Records `send_eoi` calls instead of touching real interrupt-controller
/// hardware.
#[derive(Default)]
pub struct TestInterruptController {
    pub eoi_log: Vec<u8>,
}

impl InterruptController for TestInterruptController {
    fn send_eoi(&mut self, irq: u8) {
        self.eoi_log.push(irq);
    }
}
