//! Component F — counting semaphores (spec §4.F).
//!
//! The teacher's own `scheduler::ipc.rs` has no semaphore type at all —
//! it backs `Port`/`Message` delivery directly with
//! `wake_thread`/`block_current_thread` calls against a
//! `Mutex<Option<BTreeMap<PortId, Port>>>` registry. This module's
//! counting semaphore has no one-for-one teacher counterpart; its count-
//! plus-wait-queue shape and `wait`/`trywait`/`signal`/`signaln` naming
//! come from `other_examples` (Xinu-style semaphore prior art), built in
//! the teacher's idiom: a fixed `[Semaphore; NSEM]` table with a
//! `Free`/`Used` slot state, the same pattern `process.rs`'s `Pcb` table
//! uses. The wait queue here is a `heapless::Deque<Pid, NPROC>` rather
//! than the PCB-intrusive [`crate::queue::Queue`] everything else in
//! this crate uses: spec §4.F's `timedwait` needs a waiter linked into
//! *two* queues at once (the semaphore's FIFO and the sleep delta list),
//! and P4 ("a PCB is linked into at most one kernel queue at a time") is
//! enforced by the intrusive queue precisely by refusing a second link.
//! A semaphore's own wait list doesn't need O(1) arbitrary removal or
//! priority ordering — only FIFO push/pop plus the occasional
//! single-element removal on a timeout or a `kill` — so a small
//! array-backed deque, independent of the PCB's `next`/`prev` link, is
//! the "second, parallel membership" spec §9's open-question resolution
//! calls for (see `SPEC_FULL.md` §4).

use crate::arch::Arch;
use crate::config::{NPROC, NSEM};
use crate::critical;
use crate::error::{KResult, KernelError};
use crate::kernel::Kernel;
use crate::process::{ProcState, WakeReason};
use crate::queue::Pid;
use heapless::Deque;

/// Semaphore id, dense in `[0, NSEM)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemId(pub usize);

impl SemId {
    fn as_usize(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SemState {
    Free,
    Used,
}

/// Why a `wait`/`timedwait` call returned: distinguishes a normal
/// `signal`-delivered wakeup from a timeout or a concurrent `semdelete`,
/// both of which also move the PCB off the semaphore's wait queue
/// (spec §4.F invariants, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Deleted,
}

/// Maximum simultaneous waiters on one semaphore — bounded by the process
/// table, since a PCB can only ever be queued on one semaphore at a time.
type WaitQueue = Deque<Pid, NPROC>;

pub struct Semaphore {
    state: SemState,
    count: i32,
    queue: WaitQueue,
}

impl Semaphore {
    pub(crate) fn free() -> Self {
        Semaphore {
            state: SemState::Free,
            count: 0,
            queue: Deque::new(),
        }
    }

    /// Remove `pid` from wherever it sits in the wait deque, preserving
    /// the relative order of everyone else. O(n) in the number of
    /// waiters, which is fine: this only runs once per timeout or kill,
    /// never on the `signal` fast path.
    fn remove_waiter(&mut self, pid: Pid) -> bool {
        let mut found = false;
        let mut rest: WaitQueue = Deque::new();
        while let Some(p) = self.queue.pop_front() {
            if p == pid {
                found = true;
            } else {
                let _ = rest.push_back(p);
            }
        }
        self.queue = rest;
        found
    }
}

fn check_sid(sems: &[Semaphore; NSEM], sid: SemId) -> KResult<()> {
    if sid.as_usize() >= NSEM || sems[sid.as_usize()].state == SemState::Free {
        return Err(KernelError::InvalidId);
    }
    Ok(())
}

impl Kernel {
    /// Allocate a semaphore with an initial count (spec §4.F `semcreate`).
    /// A negative `count` is rejected: unlike some Xinu variants, this
    /// core does not let a semaphore start with phantom waiters.
    pub fn semcreate<A: Arch>(&mut self, count: i32) -> KResult<SemId> {
        critical::with_critical_section::<A, _>(|| {
            if count < 0 {
                return Err(KernelError::PreconditionFailed);
            }
            let slot = self
                .sems
                .iter()
                .position(|s| s.state == SemState::Free)
                .ok_or(KernelError::QuotaExhausted)?;
            self.sems[slot] = Semaphore {
                state: SemState::Used,
                count,
                queue: Deque::new(),
            };
            Ok(SemId(slot))
        })
    }

    /// Decrement the count; block the caller if it goes negative
    /// (spec §4.F `wait`). Waiters queue in arrival order, so `signal`
    /// always wakes the longest-waiting process (P3).
    pub fn wait<A: Arch>(&mut self, sid: SemId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            let sem = &mut self.sems[sid.as_usize()];
            if sem.count > 0 {
                sem.count -= 1;
                return Ok(());
            }
            sem.count -= 1;
            let waiter = self.current;
            self.procs[waiter.as_usize()].state = ProcState::Wait;
            self.procs[waiter.as_usize()].wait_sem = Some(sid);
            self.sems[sid.as_usize()]
                .queue
                .push_back(waiter)
                .map_err(|_| KernelError::QuotaExhausted)?;
            self.resched_pending = true;
            log::debug!("wait: pid {:?} blocked on sem {}", waiter, sid.as_usize());
            Ok(())
        })
    }

    /// Non-blocking form: succeed only if the count is currently
    /// positive (spec §4.F `trywait`).
    pub fn trywait<A: Arch>(&mut self, sid: SemId) -> KResult<bool> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            let sem = &mut self.sems[sid.as_usize()];
            if sem.count > 0 {
                sem.count -= 1;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Increment the count, waking one waiter if any are queued
    /// (spec §4.F `signal`). §9 Design Notes: `resched` fires even when
    /// no waiter was released, to honor a possibly higher-priority
    /// process that is unrelated to this semaphore but is now due to
    /// preempt; since this crate drives `resched` from the caller rather
    /// than from inside `signal` itself (see `sched.rs`), marking
    /// `resched_pending` unconditionally here has the same effect.
    pub fn signal<A: Arch>(&mut self, sid: SemId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            self.wake_one(sid, WaitOutcome::Signaled)?;
            self.resched_pending = true;
            Ok(())
        })
    }

    /// Increment by `n` and wake up to `n` waiters (spec §4.F `signaln`).
    pub fn signaln<A: Arch>(&mut self, sid: SemId, n: u32) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            for _ in 0..n {
                self.wake_one(sid, WaitOutcome::Signaled)?;
            }
            self.resched_pending = true;
            Ok(())
        })
    }

    fn wake_one(&mut self, sid: SemId, reason: WaitOutcome) -> KResult<()> {
        self.sems[sid.as_usize()].count += 1;
        if let Some(pid) = self.sems[sid.as_usize()].queue.pop_front() {
            if self.procs[pid.as_usize()].state == ProcState::Wait {
                let _ = self.sleepq.remove(&mut self.procs, pid);
            }
            self.procs[pid.as_usize()].wait_sem = None;
            self.procs[pid.as_usize()].wake_reason = Some(match reason {
                WaitOutcome::Signaled => WakeReason::Signaled,
                WaitOutcome::TimedOut => WakeReason::TimedOut,
                WaitOutcome::Deleted => WakeReason::Deleted,
            });
            self.procs[pid.as_usize()].state = ProcState::Ready;
            let prio = self.procs[pid.as_usize()].prio;
            self.ready
                .insert_by_priority(&mut self.procs, pid, prio)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
        }
        Ok(())
    }

    /// Unlink `pid` from a semaphore's wait queue without changing the
    /// count — used by `kill` (a killed waiter does not leak a permit)
    /// and by the clock tick handler on a `timedwait` expiry.
    pub(crate) fn sem_unlink_waiter(&mut self, sid: SemId, pid: Pid) {
        let _ = self.sems[sid.as_usize()].remove_waiter(pid);
        self.procs[pid.as_usize()].wait_sem = None;
    }

    /// Restore a permit consumed by a `timedwait`/`wait` whose waiter is
    /// being removed from the queue for a reason other than `signal`
    /// (timeout, deletion) — used by `clock::drain_sleep_queue`.
    pub(crate) fn sem_restore_permit(&mut self, sid: SemId) {
        self.sems[sid.as_usize()].count += 1;
    }

    /// Delete a semaphore, releasing every waiter with
    /// [`WaitOutcome::Deleted`] instead of a permit (spec §4.F
    /// `semdelete`, P7). Deliberately does *not* reproduce a defect
    /// noted in prior-art sources where deleting a semaphore left its
    /// queued waiters' PCBs linked into a freed slot — see `DESIGN.md`.
    pub fn semdelete<A: Arch>(&mut self, sid: SemId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            while let Some(pid) = self.sems[sid.as_usize()].queue.pop_front() {
                let _ = self.sleepq.remove(&mut self.procs, pid);
                self.procs[pid.as_usize()].wait_sem = None;
                self.procs[pid.as_usize()].wake_reason = Some(WakeReason::Deleted);
                self.procs[pid.as_usize()].state = ProcState::Ready;
                let prio = self.procs[pid.as_usize()].prio;
                self.ready
                    .insert_by_priority(&mut self.procs, pid, prio)
                    .map_err(|_| KernelError::PreconditionFailed)?;
                self.resched_pending = true;
            }
            log::info!("semdelete: freed sem {}", sid.as_usize());
            self.sems[sid.as_usize()] = Semaphore::free();
            Ok(())
        })
    }

    /// Reset a semaphore's count without waking anyone, as long as
    /// nobody is currently waiting (spec §4.F `semreset`): resetting a
    /// semaphore with queued waiters would silently orphan them, so it
    /// is rejected instead.
    pub fn semreset<A: Arch>(&mut self, sid: SemId, count: i32) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            if count < 0 {
                return Err(KernelError::PreconditionFailed);
            }
            if !self.sems[sid.as_usize()].queue.is_empty() {
                return Err(KernelError::PreconditionFailed);
            }
            self.sems[sid.as_usize()].count = count;
            Ok(())
        })
    }

    pub fn semcount(&self, sid: SemId) -> KResult<i32> {
        check_sid(&self.sems, sid)?;
        Ok(self.sems[sid.as_usize()].count)
    }

    /// `(count, number of queued waiters)` (spec §4.F `seminfo`).
    pub fn seminfo(&self, sid: SemId) -> KResult<(i32, usize)> {
        check_sid(&self.sems, sid)?;
        let sem = &self.sems[sid.as_usize()];
        Ok((sem.count, sem.queue.len()))
    }

    /// Block with a deadline: queues the caller on both the semaphore's
    /// wait list and the sleep delta list (spec §4.F `timedwait`, and
    /// the Open Question #2 resolution in `SPEC_FULL.md` §4). Whichever
    /// fires first — `signal`/`signaln` or the clock tick handler —
    /// removes the PCB from the other list (`wake_one` unlinks it from
    /// the sleep delta list; `clock::drain_sleep_queue` unlinks it from
    /// the semaphore's deque via `sem_unlink_waiter`).
    pub fn timedwait<A: Arch>(&mut self, sid: SemId, ms: u32) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_sid(&self.sems, sid)?;
            let sem = &mut self.sems[sid.as_usize()];
            if sem.count > 0 {
                sem.count -= 1;
                return Ok(());
            }
            sem.count -= 1;
            let waiter = self.current;
            self.procs[waiter.as_usize()].state = ProcState::Wait;
            self.procs[waiter.as_usize()].wait_sem = Some(sid);
            self.sems[sid.as_usize()]
                .queue
                .push_back(waiter)
                .map_err(|_| KernelError::QuotaExhausted)?;
            let ticks = crate::clock::ms_to_ticks(ms).max(1);
            self.sleepq
                .insert_delta(&mut self.procs, waiter, ticks as i32)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
            Ok(())
        })
    }
}
