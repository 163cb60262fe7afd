//! The single owned kernel state value.
//!
//! Xinu-tradition kernels keep one global set of arrays (process table,
//! ready list, semaphore table, ...) and let every subsystem reach into
//! all of them directly; splitting that into per-subsystem owned structs
//! would just mean passing six mutable references everywhere instead of
//! one. So, same shape as the teacher's `static SCHEDULER: Mutex<Option<Scheduler>>`
//! in `scheduler/mod.rs`: one `Kernel` struct, one `lazy_static!` mutex
//! around it, and `with_kernel`/`with_kernel_mut` accessors. Each
//! component module (`process`, `sched`, `clock`, `sem`, `msg`) then
//! contributes its operations as a separate `impl Kernel` block in its
//! own file — the struct lives here, the behavior lives with the
//! component it belongs to.

use crate::config::{NMBOX, NPORT, NPROC, NSEM, NTIMER};
use crate::msg::{MailboxSlot, Port};
use crate::process::Pcb;
use crate::queue::{Pid, Queue};
use crate::sem::Semaphore;
use crate::clock::TimerSlot;
use lazy_static::lazy_static;
use spin::Mutex;

pub struct Kernel {
    pub(crate) procs: [Pcb; NPROC],
    pub(crate) ready: Queue,
    pub(crate) sleepq: Queue,
    pub(crate) sems: [Semaphore; NSEM],
    pub(crate) timers: [TimerSlot; NTIMER],
    pub(crate) mailboxes: [Option<MailboxSlot>; NMBOX],
    pub(crate) ports: [Option<Port>; NPORT],
    pub(crate) current: Pid,
    pub(crate) quantum_left: u32,
    pub(crate) ticks: u64,
    pub(crate) resched_deferred: u32,
    pub(crate) resched_pending: bool,
    /// Ticks that arrived while `resched_deferred > 0` (spec §4.E step 2,
    /// §5 "Reentrancy of the tick"): a tick handler invoked re-entrantly
    /// (from inside another tick's deferred section) does not redo timer
    /// scanning/sleep-queue draining itself — it just counts itself here
    /// so the outer call can replay that work once after it lifts the
    /// defer, instead of doing it twice.
    pub(crate) deferred_tick_count: u32,
}

impl Kernel {
    fn new() -> Self {
        let mut procs: [Pcb; NPROC] = core::array::from_fn(|i| Pcb::free_slot(Pid(i)));
        // PID 0 is the permanently-resident null process (spec §3): always
        // CURR-eligible, lowest legal priority, never killable.
        procs[0] = Pcb::null_process();
        Kernel {
            procs,
            ready: Queue::new(),
            sleepq: Queue::new(),
            sems: core::array::from_fn(|_| Semaphore::free()),
            timers: core::array::from_fn(|_| TimerSlot::free()),
            mailboxes: core::array::from_fn(|_| None),
            ports: core::array::from_fn(|_| None),
            current: Pid::NULL,
            quantum_left: crate::config::QUANTUM,
            ticks: 0,
            resched_deferred: 0,
            resched_pending: false,
            deferred_tick_count: 0,
        }
    }

    pub fn current(&self) -> Pid {
        self.current
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True while `resched()` should be skipped even though the ready
    /// list may have changed (spec §4.D: reschedule deferral during a
    /// batch of operations performed inside one critical section).
    pub fn defer_resched(&mut self) {
        self.resched_deferred += 1;
    }

    pub fn undefer_resched(&mut self) -> bool {
        self.resched_deferred = self.resched_deferred.saturating_sub(1);
        let should_run = self.resched_deferred == 0 && self.resched_pending;
        if should_run {
            self.resched_pending = false;
        }
        should_run
    }
}

lazy_static! {
    static ref KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
}

/// Run `f` with shared access to the kernel state.
pub fn with_kernel<R>(f: impl FnOnce(&Kernel) -> R) -> R {
    f(&KERNEL.lock())
}

/// Run `f` with exclusive access to the kernel state. Callers are
/// expected to already hold a [`crate::critical`] section for anything
/// touching shared queues; this lock only protects the host test harness
/// (real freestanding builds run single-core with interrupts as the only
/// other writer, so the lock never actually contends there).
pub fn with_kernel_mut<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    f(&mut KERNEL.lock())
}

/// Replace the global kernel with a fresh one. Each `#[test]` function
/// (in this crate's own unit tests or in the `tests/` integration binary
/// built with `test-util`) calls this first so tests don't see state left
/// behind by whichever test the shared global ran previously.
#[cfg(any(test, feature = "test-util"))]
pub fn reset_for_test() {
    *KERNEL.lock() = Kernel::new();
}
