//! Component D — the scheduler (spec §4.D).
//!
//! Grounded on the teacher's `scheduler/sched_core.rs::SchedulerCore`, but
//! collapsed from its policy-pluggable `Box<dyn Scheduler>` shape (this
//! crate has no heap to box a trait object into, and the spec names one
//! fixed policy) down to a single `resched` function operating directly
//! on the ready list built in `queue.rs`.
//!
//! Blocking kernel calls elsewhere in this crate (`sem::wait`,
//! `msg::receive`, `process::suspend`, ...) never call `resched`
//! themselves — they only mutate PCB state, enqueue, and set
//! `resched_pending`. `resched` is the single place that actually leaves
//! the current process (via `Arch::ctxsw`); a caller drives it explicitly
//! after a batch of such operations, the way the tick handler in
//! `clock.rs` does after draining the sleep queue.

use crate::arch::Arch;
use crate::process::ProcState;
use crate::queue::Pid;
use crate::kernel::Kernel;

impl Kernel {
    /// Reschedule: switch away from the running process if, and only if,
    /// doing so is warranted (spec §4.D).
    ///
    /// If the running process is still `Curr` and the ready list's head
    /// does not strictly outrank it, this is a no-op (tie-break rule:
    /// cooperative among equals). The null process is the one exception —
    /// it never holds the CPU while anything else is ready, regardless of
    /// relative priority, because spec §3 forbids PID 0 from ever sitting
    /// in the ready list: there is nowhere to "tie" against.
    ///
    /// If the running process is not `Curr` any more (a blocking call
    /// already moved it to `Wait`/`Sleep`/`Recv`/`Susp`, or `kill` freed
    /// its slot and pointed `current` back at PID 0), this always
    /// dispatches whoever is next.
    pub fn resched<A: Arch>(&mut self) {
        let running = self.current;
        let running_state = self.procs[running.as_usize()].state;

        if running_state == ProcState::Curr {
            if running == Pid::NULL {
                if self.ready.is_empty() {
                    return;
                }
            } else {
                let running_prio = self.procs[running.as_usize()].prio;
                match self.ready.first() {
                    Some(head) if self.procs[head.as_usize()].prio > running_prio => {}
                    _ => return,
                }
            }

            if running == Pid::NULL {
                self.procs[running.as_usize()].state = ProcState::Idle;
            } else {
                self.procs[running.as_usize()].state = ProcState::Ready;
                let prio = self.procs[running.as_usize()].prio;
                if let Err(e) = self.ready.insert_by_priority(&mut self.procs, running, prio) {
                    log::error!("resched: could not requeue pid {:?}: {:?}", running, e);
                    return;
                }
            }
        }

        let next = self.ready.dequeue(&mut self.procs).unwrap_or(Pid::NULL);
        self.procs[next.as_usize()].state = ProcState::Curr;
        self.current = next;
        self.quantum_left = crate::config::QUANTUM;

        if next == running {
            // Idle process resuming itself; no stack to swap.
            return;
        }

        log::trace!("resched: {:?} -> {:?}", running, next);
        let old_sp_ptr: *mut usize = &mut self.procs[running.as_usize()].sp;
        let new_sp = self.procs[next.as_usize()].sp;
        // SAFETY: `old_sp_ptr` addresses the PCB this kernel itself just
        // identified as the outgoing process, and `new_sp` was produced
        // either by `Arch::build_initial_frame` at `create` time or by a
        // prior `ctxsw` leaving this same PCB.
        unsafe {
            A::ctxsw(&mut *old_sp_ptr, new_sp);
        }
    }

    /// Voluntarily give up the CPU at the caller's current priority
    /// (spec §4.C `yield`, §6 syscall 6). Unlike preemption, this moves
    /// the caller to the tail of its own priority run even when no other
    /// ready process outranks it, so `resched` must treat it as an
    /// already-not-`Curr` dispatch rather than re-deriving the decision
    /// from priority comparison.
    pub fn yield_proc(&mut self) {
        let me = self.current;
        if me == Pid::NULL {
            return;
        }
        self.procs[me.as_usize()].state = ProcState::Ready;
        let prio = self.procs[me.as_usize()].prio;
        if let Err(e) = self.ready.insert_by_priority(&mut self.procs, me, prio) {
            log::error!("yield: could not requeue pid {:?}: {:?}", me, e);
            self.procs[me.as_usize()].state = ProcState::Curr;
            return;
        }
        self.resched_pending = true;
    }

    /// Enter or leave a deferred-reschedule window (spec §4.D "Deferred
    /// reschedule mode", §5 "Reentrancy of the tick"). While deferred,
    /// `resched` is never invoked by this crate's own code paths; leaving
    /// the window (`defer == false`) replays any clock work that arrived
    /// re-entrantly (see `clock.rs::tick_handler`) and then runs `resched`
    /// once if anything left a reschedule pending.
    pub fn resched_cntl<A: Arch>(&mut self, defer: bool) {
        if defer {
            self.defer_resched();
            return;
        }
        let pending_ticks = self.deferred_tick_count;
        self.deferred_tick_count = 0;
        for _ in 0..pending_ticks {
            self.timer_scan();
            self.drain_sleep_queue();
        }
        if self.undefer_resched() {
            self.resched::<A>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use crate::test_support::{TestArch, TestStackPool};

    #[test]
    #[serial]
    fn resched_prefers_strictly_higher_priority() {
        crate::kernel::reset_for_test();
        let mut pool = TestStackPool::new();
        crate::kernel::with_kernel_mut(|k| {
            let low = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 10, "low", &[], 0)
                .unwrap();
            k.resume::<TestArch>(low).unwrap();
            k.resched::<TestArch>();
            assert_eq!(k.current(), low);

            let high = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 50, "high", &[], 0)
                .unwrap();
            k.resume::<TestArch>(high).unwrap();
            k.resched::<TestArch>();
            assert_eq!(k.current(), high);
            assert_eq!(k.procs[low.as_usize()].state, ProcState::Ready);
        });
    }

    #[test]
    #[serial]
    fn resched_is_cooperative_among_equal_priority() {
        crate::kernel::reset_for_test();
        let mut pool = TestStackPool::new();
        crate::kernel::with_kernel_mut(|k| {
            let a = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "a", &[], 0)
                .unwrap();
            let b = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "b", &[], 0)
                .unwrap();
            k.resume::<TestArch>(a).unwrap();
            k.resume::<TestArch>(b).unwrap();
            k.resched::<TestArch>();
            assert_eq!(k.current(), a);
            // b is ready at the same priority; no preemption should occur.
            k.resched::<TestArch>();
            assert_eq!(k.current(), a);
        });
    }

    #[test]
    #[serial]
    fn yield_moves_curr_to_tail_of_its_priority_run() {
        crate::kernel::reset_for_test();
        let mut pool = TestStackPool::new();
        crate::kernel::with_kernel_mut(|k| {
            let a = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "a", &[], 0)
                .unwrap();
            let b = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "b", &[], 0)
                .unwrap();
            k.resume::<TestArch>(a).unwrap();
            k.resume::<TestArch>(b).unwrap();
            k.resched::<TestArch>();
            assert_eq!(k.current(), a);
            k.yield_proc();
            k.resched::<TestArch>();
            assert_eq!(k.current(), b);
        });
    }

    #[test]
    #[serial]
    fn null_process_never_enters_ready_list() {
        crate::kernel::reset_for_test();
        crate::kernel::with_kernel(|k| {
            assert_eq!(k.current(), Pid::NULL);
        });
        crate::kernel::with_kernel_mut(|k| {
            k.resched::<TestArch>();
            assert_eq!(k.current(), Pid::NULL);
            assert_eq!(k.ready.length(), 0);
        });
    }
}
