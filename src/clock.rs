//! Component E — clock, delta-sleep, and timers (spec §4.E).
//!
//! Grounded on the teacher's `scheduler/sched_core.rs::on_tick` (tick
//! accounting, quantum decrement, `request_reschedule`) and
//! `utils/timer.rs` (tick counter, `uptime_ms`). The timer table here
//! uses a bare `fn(usize)` callback rather than a boxed closure, since
//! this crate has no heap to box one into; `arg` carries whatever state
//! the caller needs threaded through.

use crate::arch::{Arch, InterruptController};
use crate::config::NTIMER;
use crate::critical;
use crate::error::{KResult, KernelError};
use crate::kernel::Kernel;
use crate::process::{ProcState, WakeReason};
use crate::queue::Pid;

/// Convert a millisecond duration to ticks, rounding up (spec §4.E
/// `sleepms`). Zero stays zero — a zero-tick sleep is a no-op yield, not
/// a rounding artifact.
pub fn ms_to_ticks(ms: u32) -> u64 {
    if ms == 0 {
        0
    } else {
        (ms as u64 * crate::config::CLKFREQ as u64 + 999) / 1000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Free,
    Active,
    Expired,
    Stopped,
}

/// A timer callback: invoked from `timer_scan` while still inside the
/// critical section the tick handler entered (spec §4.E step 3).
pub type TimerCallback = fn(usize);

#[derive(Clone, Copy)]
pub struct TimerSlot {
    state: TimerState,
    /// Absolute tick this timer last fired or will next fire.
    expiry: u64,
    /// Original relative delay, kept so `timer_start` can recompute a
    /// fresh expiry after a stop (spec §4.E: "a stopped timer remains
    /// ACTIVE after restart with a fresh expiry").
    delay: u64,
    /// 0 for a one-shot; otherwise the tick interval between firings.
    period: u64,
    callback: Option<TimerCallback>,
    arg: usize,
}

impl TimerSlot {
    pub(crate) fn free() -> Self {
        TimerSlot {
            state: TimerState::Free,
            expiry: 0,
            delay: 0,
            period: 0,
            callback: None,
            arg: 0,
        }
    }
}

/// Timer id, dense in `[0, NTIMER)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(pub usize);

impl Kernel {
    fn timer_slot_mut(&mut self, id: TimerId) -> KResult<&mut TimerSlot> {
        let slot = self.timers.get_mut(id.0).ok_or(KernelError::InvalidId)?;
        if slot.state == TimerState::Free {
            return Err(KernelError::InvalidId);
        }
        Ok(slot)
    }

    /// Allocate a timer firing `delay` ticks from now, then every
    /// `period` ticks if nonzero (spec §4.E timer API). `delay` must be
    /// positive: a timer cannot fire in the same tick it's created on.
    pub fn timer_create<A: Arch>(
        &mut self,
        callback: TimerCallback,
        arg: usize,
        delay: u64,
        period: u64,
    ) -> KResult<TimerId> {
        critical::with_critical_section::<A, _>(|| {
            if delay == 0 {
                return Err(KernelError::PreconditionFailed);
            }
            let slot = self
                .timers
                .iter()
                .position(|t| t.state == TimerState::Free)
                .ok_or(KernelError::QuotaExhausted)?;
            self.timers[slot] = TimerSlot {
                state: TimerState::Active,
                expiry: self.ticks + delay,
                delay,
                period,
                callback: Some(callback),
                arg,
            };
            Ok(TimerId(slot))
        })
    }

    /// Pause an active timer without losing its configuration
    /// (spec §4.E `timer_stop`).
    pub fn timer_stop<A: Arch>(&mut self, id: TimerId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let slot = self.timer_slot_mut(id)?;
            if slot.state != TimerState::Active {
                return Err(KernelError::PreconditionFailed);
            }
            slot.state = TimerState::Stopped;
            Ok(())
        })
    }

    /// Resume a stopped timer with a fresh expiry counted from now
    /// (spec §4.E `timer_start`).
    pub fn timer_start<A: Arch>(&mut self, id: TimerId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let now = self.ticks;
            let slot = self.timer_slot_mut(id)?;
            if slot.state != TimerState::Stopped {
                return Err(KernelError::PreconditionFailed);
            }
            slot.expiry = now + slot.delay;
            slot.state = TimerState::Active;
            Ok(())
        })
    }

    /// Free a timer slot regardless of its current state
    /// (spec §4.E `timer_delete`).
    pub fn timer_delete<A: Arch>(&mut self, id: TimerId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let _ = self.timer_slot_mut(id)?;
            self.timers[id.0] = TimerSlot::free();
            Ok(())
        })
    }

    /// Step 3 of the tick handler: fire every expired active timer
    /// (spec §4.E). Periodic timers reschedule to `now + period`;
    /// one-shots transition to `Expired` and stay allocated until an
    /// explicit `timer_delete`.
    fn timer_scan(&mut self) {
        let now = self.ticks;
        for i in 0..NTIMER {
            if self.timers[i].state != TimerState::Active || self.timers[i].expiry > now {
                continue;
            }
            if let Some(cb) = self.timers[i].callback {
                let arg = self.timers[i].arg;
                cb(arg);
            }
            if self.timers[i].period > 0 {
                self.timers[i].expiry = now + self.timers[i].period;
            } else {
                self.timers[i].state = TimerState::Expired;
                log::debug!("timer {} expired", i);
            }
        }
    }

    /// Step 4 of the tick handler: decrement the sleep delta list's head
    /// and wake every entry whose delta reaches zero (spec §4.E).
    fn drain_sleep_queue(&mut self) {
        if let Some(head) = self.sleepq.first() {
            self.procs[head.as_usize()].delta -= 1;
        }
        while let Some(head) = self.sleepq.first() {
            if self.procs[head.as_usize()].delta > 0 {
                break;
            }
            if let Some(pid) = self.sleepq.dequeue(&mut self.procs) {
                self.wake_sleeper(pid);
            } else {
                break;
            }
        }
    }

    /// Move a delta-list entry back to `Ready`, recording why it woke and,
    /// for a `timedwait`/`recvtime` entry, unwinding the other queue it was
    /// simultaneously linked into (spec's Open Question #2 resolution,
    /// `SPEC_FULL.md` §4).
    fn wake_sleeper(&mut self, pid: Pid) {
        match self.procs[pid.as_usize()].state {
            ProcState::Sleep => {
                self.procs[pid.as_usize()].wake_reason = Some(WakeReason::Signaled);
            }
            ProcState::Wait => {
                if let Some(sid) = self.procs[pid.as_usize()].wait_sem {
                    self.sem_unlink_waiter(sid, pid);
                    self.sem_restore_permit(sid);
                }
                self.procs[pid.as_usize()].wake_reason = Some(WakeReason::TimedOut);
            }
            ProcState::Recv => {
                self.procs[pid.as_usize()].wake_reason = Some(WakeReason::TimedOut);
            }
            other => {
                log::warn!(
                    "drain_sleep_queue: pid {:?} left the delta list from unexpected state {:?}",
                    pid,
                    other
                );
            }
        }
        self.procs[pid.as_usize()].state = ProcState::Ready;
        let prio = self.procs[pid.as_usize()].prio;
        if let Err(e) = self.ready.insert_by_priority(&mut self.procs, pid, prio) {
            log::error!("drain_sleep_queue: could not ready pid {:?}: {:?}", pid, e);
        }
        self.resched_pending = true;
    }

    /// Block the caller for `ticks` clock ticks (spec §4.E `sleep`). A
    /// zero-tick sleep is accepted as a cooperative yield rather than
    /// rejected, matching `sleepms(0)` under `ms_to_ticks`.
    pub fn sleep<A: Arch>(&mut self, ticks: u32) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let me = self.current;
            if me == Pid::NULL {
                return Err(KernelError::PreconditionFailed);
            }
            if ticks == 0 {
                self.yield_proc();
                return Ok(());
            }
            self.procs[me.as_usize()].state = ProcState::Sleep;
            self.sleepq
                .insert_delta(&mut self.procs, me, ticks as i32)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
            Ok(())
        })
    }

    /// `sleep`, but in milliseconds (spec §4.E `sleepms`).
    pub fn sleepms<A: Arch>(&mut self, ms: u32) -> KResult<()> {
        self.sleep::<A>(ms_to_ticks(ms) as u32)
    }

    /// Remove a sleeping process from the delta list early (spec §4.E
    /// `unsleep`). The removed entry's delta is folded into its
    /// successor by [`crate::queue::Queue::remove`], preserving P5.
    pub fn unsleep<A: Arch>(&mut self, pid: Pid) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            if self.procs[pid.as_usize()].state != ProcState::Sleep {
                return Err(KernelError::PreconditionFailed);
            }
            self.sleepq
                .remove(&mut self.procs, pid)
                .map_err(|_| KernelError::InvalidId)?;
            self.procs[pid.as_usize()].state = ProcState::Ready;
            let prio = self.procs[pid.as_usize()].prio;
            self.ready
                .insert_by_priority(&mut self.procs, pid, prio)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
            Ok(())
        })
    }

    /// Seconds since boot (spec §6 syscall 60 `gettime`).
    pub fn gettime(&self) -> u64 {
        self.ticks / crate::config::CLKFREQ as u64
    }

    /// Low 32 bits of the tick counter (spec §6 syscall 61 `getticks`).
    pub fn getticks(&self) -> u32 {
        (self.ticks & 0xFFFF_FFFF) as u32
    }

    /// The periodic tick entry point (spec §4.E). Re-entrant arrivals —
    /// a tick whose handler fires while an earlier one is still inside a
    /// `resched_cntl(true)` deferred window — only bump
    /// `deferred_tick_count`; the deferred work is replayed once by
    /// `resched_cntl::<A>(false)` (spec §5 "Reentrancy of the tick").
    ///
    /// Takes the critical section manually rather than through
    /// [`crate::critical::with_critical_section`]: the section must be
    /// released *before* the final `resched_cntl::<A>(false)` call below,
    /// which is this operation's own explicit yield point (spec §4.A:
    /// "except where they explicitly yield via `resched`").
    pub fn tick_handler<A: Arch>(&mut self, ic: &mut impl InterruptController, irq: u8) {
        let mask = critical::disable::<A>();
        self.ticks += 1;
        if self.resched_deferred > 0 {
            self.deferred_tick_count += 1;
            log::trace!(
                "tick_handler: deferred, {} tick(s) queued for replay",
                self.deferred_tick_count
            );
            ic.send_eoi(irq);
            critical::restore::<A>(mask);
            return;
        }

        self.resched_cntl::<A>(true);
        self.timer_scan();
        self.drain_sleep_queue();
        if self.current != Pid::NULL {
            if self.quantum_left > 0 {
                self.quantum_left -= 1;
            }
            if self.quantum_left == 0 {
                self.quantum_left = crate::config::QUANTUM;
                self.resched_pending = true;
            }
        }
        ic.send_eoi(irq);
        critical::restore::<A>(mask);
        self.resched_cntl::<A>(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestArch, TestInterruptController, TestStackPool};
    use serial_test::serial;

    #[test]
    fn ms_to_ticks_rounds_up_nonzero_and_keeps_zero() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(50), 50);
        assert_eq!(ms_to_ticks(1001), 1001);
    }

    #[test]
    #[serial]
    fn sleep_wakes_after_requested_ticks() {
        crate::kernel::reset_for_test();
        let mut pool = TestStackPool::new();
        let mut ic = TestInterruptController::default();
        crate::kernel::with_kernel_mut(|k| {
            let p1 = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "a", &[], 0)
                .unwrap();
            k.resume::<TestArch>(p1).unwrap();
            k.resched::<TestArch>();
            assert_eq!(k.current(), p1);
            k.sleep::<TestArch>(3).unwrap();
            for _ in 0..2 {
                k.tick_handler::<TestArch>(&mut ic, 0);
                assert_eq!(k.procs[p1.as_usize()].state, ProcState::Sleep);
            }
            k.tick_handler::<TestArch>(&mut ic, 0);
            // Nothing else was ready, so the null process was idling when
            // p1 woke; resched() dispatches straight into p1 rather than
            // leaving it parked on the ready list.
            assert_eq!(k.procs[p1.as_usize()].state, ProcState::Curr);
            assert_eq!(
                k.take_wake_reason(p1),
                Some(crate::process::WakeReason::Signaled)
            );
        });
    }

    #[test]
    #[serial]
    fn timer_fires_once_and_reports_expired() {
        crate::kernel::reset_for_test();
        let mut ic = TestInterruptController::default();
        crate::kernel::with_kernel_mut(|k| {
            let id = k.timer_create::<TestArch>(|_| {}, 0, 2, 0).unwrap();
            k.tick_handler::<TestArch>(&mut ic, 0);
            assert_eq!(k.timer_stop::<TestArch>(id), Err(KernelError::PreconditionFailed));
            k.tick_handler::<TestArch>(&mut ic, 0);
            // Second tick reaches the expiry; a one-shot cannot be
            // stopped afterward since it is no longer Active.
            assert_eq!(k.timer_stop::<TestArch>(id), Err(KernelError::PreconditionFailed));
        });
    }

    #[test]
    #[serial]
    fn timedwait_timeout_restores_count_and_unlinks_from_both_queues() {
        crate::kernel::reset_for_test();
        let mut pool = TestStackPool::new();
        let mut ic = TestInterruptController::default();
        crate::kernel::with_kernel_mut(|k| {
            let sid = k.semcreate::<TestArch>(0).unwrap();
            let p1 = k
                .create::<TestArch>(&mut pool, 0x1000, 4096, 20, "a", &[], 0)
                .unwrap();
            k.resume::<TestArch>(p1).unwrap();
            k.resched::<TestArch>();
            k.timedwait::<TestArch>(sid, 50).unwrap();
            for _ in 0..50 {
                k.tick_handler::<TestArch>(&mut ic, 0);
            }
            // Same idle-dispatch reasoning as `sleep_wakes_after_requested_ticks`:
            // p1 is the only runnable process, so it lands back in Curr.
            assert_eq!(k.procs[p1.as_usize()].state, ProcState::Curr);
            assert_eq!(
                k.take_wake_reason(p1),
                Some(crate::process::WakeReason::TimedOut)
            );
            assert_eq!(k.semcount(sid).unwrap(), 0);
            assert_eq!(k.seminfo(sid).unwrap().1, 0);
            assert!(k.sleepq.is_empty());
        });
    }
}
