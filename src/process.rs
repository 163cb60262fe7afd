//! Component C — the process table (spec §4.C).
//!
//! Mirrors the teacher's `Thread`/`ThreadState` pair in
//! `scheduler/thread.rs`, but swaps its heap-backed `Box<dyn FnOnce>`
//! entry point and `Vec<u8>` stack for the allocation-free shape this
//! crate needs: a raw entry address plus a stack handed out by the
//! external [`crate::arch::StackPool`], because a kernel core with no
//! heap cannot own a boxed closure.

use crate::arch::{Arch, StackPool};
use crate::config::{NAMELEN, NPROC};
use crate::critical;
use crate::error::{KResult, KernelError};
use crate::kernel::Kernel;
use crate::queue::{Pid, QueueId};
use crate::sem::SemId;
use heapless::String;

/// Process lifecycle state (spec §3). `Curr` is not a distinct storage
/// state from `Ready` in most Xinu variants, but the spec's Open Question
/// #1 resolves in favor of keeping them distinct here: see `SPEC_FULL.md`
/// §4 and `DESIGN.md` for the reasoning. Exactly one process is ever
/// `Curr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Free,
    Curr,
    Ready,
    Recv,
    Sleep,
    Susp,
    Wait,
    /// The null process (PID 0) while some other process is `Curr`. Spec
    /// §3 requires PID 0 never sit in the ready list, so it cannot simply
    /// become `Ready` like everyone else when preempted — `Idle` is the
    /// state that keeps P1/P2 honest (exactly one `Curr`, and the ready
    /// list holding exactly the `Ready` set) without a special case in
    /// every queue-membership check.
    Idle,
}

/// Why a blocked PCB was moved back to `Ready` (spec §4.F/§4.G: `wait`
/// distinguishes a `signal` wakeup from a deleted semaphore; `timedwait`
/// and `recvtime` distinguish a normal delivery from a timeout). The
/// kernel function that originally blocked the caller reads this back
/// off the PCB once it is `Curr` again to know which result to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Released by `signal`/`signaln`, or a plain `sleep` expiring.
    Signaled,
    /// A message/mailbox item arrived.
    Delivered,
    /// `timedwait`/`recvtime` deadline elapsed first.
    TimedOut,
    /// The semaphore or mailbox being waited on was deleted.
    Deleted,
}

/// Process control block. `next`/`prev`/`in_queue`/`delta` are the
/// intrusive wait-queue link (spec §3, Design Notes strategy (a)); a PCB
/// is a member of at most one [`crate::queue::Queue`] at a time, which
/// `in_queue` makes a checkable fact instead of an informal invariant.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub id: Pid,
    pub state: ProcState,
    pub prio: i32,
    pub name: String<NAMELEN>,
    /// Saved stack pointer; opaque outside `arch::Arch::ctxsw`.
    pub sp: usize,
    stack_base: usize,
    stack_len: usize,
    pub(crate) next: Option<Pid>,
    pub(crate) prev: Option<Pid>,
    pub(crate) in_queue: Option<QueueId>,
    /// Scratch delta value, meaningful only while linked into a delta
    /// list (the sleep queue or a `timedwait` deadline list).
    pub(crate) delta: i32,
    /// Set when a `send()` deposits a word while this process is not
    /// already waiting in `receive()` (spec §4.G single-slot messaging).
    pub has_message: bool,
    pub message: crate::config::Word,
    /// The semaphore this PCB is blocked on, when `state == Wait`.
    pub wait_sem: Option<SemId>,
    /// Set by whoever moves this PCB out of `Wait`/`Sleep`/`Recv` back to
    /// `Ready`; consumed (and cleared) by [`Kernel::take_wake_reason`]
    /// once the process is dispatched again.
    pub wake_reason: Option<WakeReason>,
}

impl Pcb {
    pub(crate) fn free_slot(id: Pid) -> Self {
        Pcb {
            id,
            state: ProcState::Free,
            prio: 0,
            name: String::new(),
            sp: 0,
            stack_base: 0,
            stack_len: 0,
            next: None,
            prev: None,
            in_queue: None,
            delta: 0,
            has_message: false,
            message: 0,
            wait_sem: None,
            wake_reason: None,
        }
    }

    pub(crate) fn null_process() -> Self {
        let mut p = Pcb::free_slot(Pid::NULL);
        p.state = ProcState::Curr;
        p.prio = crate::config::MIN_PRIO;
        let _ = p.name.push_str("prnull");
        p
    }

    pub fn is_free(&self) -> bool {
        self.state == ProcState::Free
    }
}

fn check_pid(procs: &[Pcb; NPROC], pid: Pid) -> KResult<()> {
    if pid.as_usize() >= NPROC || procs[pid.as_usize()].is_free() {
        return Err(KernelError::InvalidId);
    }
    Ok(())
}

impl Kernel {
    /// Allocate a PCB, ask `pool` for a stack, build its initial frame via
    /// `A::build_initial_frame`, and place it on the ready list
    /// (spec §4.C `create`).
    pub fn create<A: Arch>(
        &mut self,
        pool: &mut impl StackPool,
        entry: usize,
        stack_bytes: usize,
        prio: i32,
        name: &str,
        argv: &[usize],
        exit_trampoline: usize,
    ) -> KResult<Pid> {
        critical::with_critical_section::<A, _>(|| {
            if entry == 0 {
                return Err(KernelError::PreconditionFailed);
            }
            if !(crate::config::MIN_PRIO..=crate::config::MAX_PRIO).contains(&prio) {
                return Err(KernelError::PreconditionFailed);
            }
            let stack_bytes = stack_bytes.max(crate::config::MIN_STACK_BYTES);
            let slot = self
                .procs
                .iter()
                .position(|p| p.is_free())
                .ok_or(KernelError::QuotaExhausted)?;
            let stack = pool.alloc_stack(stack_bytes).ok_or(KernelError::QuotaExhausted)?;
            let stack_base = stack.as_ptr() as usize;
            let stack_len = stack.len();
            let sp = A::build_initial_frame(stack, entry, argv, exit_trampoline);

            let pid = Pid(slot);
            let pcb = &mut self.procs[slot];
            *pcb = Pcb::free_slot(pid);
            pcb.state = ProcState::Susp;
            pcb.prio = prio;
            pcb.sp = sp;
            pcb.stack_base = stack_base;
            pcb.stack_len = stack_len;
            let _ = pcb.name.push_str(&name[..name.len().min(NAMELEN)]);
            Ok(pid)
        })
    }

    /// Tear a process down: reclaim its stack through `pool`, unlink it
    /// from whatever queue it sits in (ready, sleep, or a semaphore's
    /// wait list), and mark the slot `Free` (spec §4.C `kill`).
    pub fn kill<A: Arch>(&mut self, pool: &mut impl StackPool, pid: Pid) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            if pid == Pid::NULL {
                return Err(KernelError::PreconditionFailed);
            }
            check_pid(&self.procs, pid)?;

            match self.procs[pid.as_usize()].state {
                ProcState::Ready => {
                    let _ = self.ready.remove(&mut self.procs, pid);
                }
                ProcState::Sleep => {
                    let _ = self.sleepq.remove(&mut self.procs, pid);
                }
                ProcState::Wait => {
                    if let Some(sid) = self.procs[pid.as_usize()].wait_sem {
                        self.sem_unlink_waiter(sid, pid);
                    }
                }
                // Killing CURR just marks the slot free; `resched` picks a new
                // CURR on the next scheduling point.
                ProcState::Curr => {
                    self.resched_pending = true;
                }
                ProcState::Recv | ProcState::Susp => {}
                // Unreachable for a real caller (only PID 0 is ever `Idle`,
                // and PID 0 is rejected above), kept so the match stays
                // exhaustive over `ProcState`.
                ProcState::Idle => {}
                ProcState::Free => return Err(KernelError::InvalidId),
            }

            let base = self.procs[pid.as_usize()].stack_base;
            let len = self.procs[pid.as_usize()].stack_len;
            if len > 0 {
                // SAFETY: `base`/`len` were produced by a prior `alloc_stack`
                // call and handed back to the same pool, never aliased since
                // the owning PCB is being freed in this same call.
                let stack = unsafe {
                    core::slice::from_raw_parts_mut(base as *mut u8, len)
                };
                pool.free_stack(stack);
            }

            self.procs[pid.as_usize()] = Pcb::free_slot(pid);
            if pid == self.current {
                self.current = Pid::NULL;
            }
            Ok(())
        })
    }

    pub fn getpid(&self) -> Pid {
        self.current
    }

    pub fn getprio(&self, pid: Pid) -> KResult<i32> {
        check_pid(&self.procs, pid)?;
        Ok(self.procs[pid.as_usize()].prio)
    }

    /// Current lifecycle state of `pid` (spec §3). Exposed alongside
    /// `getprio`/`getname` so a caller outside this module can observe a
    /// process's state without reaching into the table directly.
    pub fn state(&self, pid: Pid) -> KResult<ProcState> {
        check_pid(&self.procs, pid)?;
        Ok(self.procs[pid.as_usize()].state)
    }

    /// Change a process's priority, returning its previous value
    /// (spec §4.C `chprio`). If the process is on the ready list it is
    /// re-inserted so priority order stays correct immediately. A
    /// changed priority can affect who the current runner should be
    /// (raising a ready process above `Curr`, or lowering `Curr` below
    /// the ready list's head), so this always marks a reschedule
    /// pending rather than trying to special-case which direction of
    /// change matters.
    pub fn chprio<A: Arch>(&mut self, pid: Pid, new_prio: i32) -> KResult<i32> {
        critical::with_critical_section::<A, _>(|| {
            check_pid(&self.procs, pid)?;
            if !(crate::config::MIN_PRIO..=crate::config::MAX_PRIO).contains(&new_prio) {
                return Err(KernelError::PreconditionFailed);
            }
            let old = self.procs[pid.as_usize()].prio;
            let was_ready = self.procs[pid.as_usize()].state == ProcState::Ready;
            if was_ready {
                let _ = self.ready.remove(&mut self.procs, pid);
            }
            self.procs[pid.as_usize()].prio = new_prio;
            if was_ready {
                self.ready
                    .insert_by_priority(&mut self.procs, pid, new_prio)
                    .map_err(|_| KernelError::PreconditionFailed)?;
            }
            self.resched_pending = true;
            Ok(old)
        })
    }

    pub fn getname(&self, pid: Pid) -> KResult<heapless::String<NAMELEN>> {
        check_pid(&self.procs, pid)?;
        Ok(self.procs[pid.as_usize()].name.clone())
    }

    /// Move a `Ready` or `Curr` process to `Susp`, taking it off the
    /// ready list (spec §4.C `suspend`).
    pub fn suspend<A: Arch>(&mut self, pid: Pid) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_pid(&self.procs, pid)?;
            if pid == Pid::NULL {
                return Err(KernelError::PreconditionFailed);
            }
            match self.procs[pid.as_usize()].state {
                ProcState::Ready => {
                    let _ = self.ready.remove(&mut self.procs, pid);
                    self.procs[pid.as_usize()].state = ProcState::Susp;
                    Ok(())
                }
                ProcState::Curr => {
                    self.procs[pid.as_usize()].state = ProcState::Susp;
                    self.resched_pending = true;
                    Ok(())
                }
                _ => Err(KernelError::PreconditionFailed),
            }
        })
    }

    /// Move a `Susp` process back to `Ready` (spec §4.C `resume`).
    pub fn resume<A: Arch>(&mut self, pid: Pid) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            check_pid(&self.procs, pid)?;
            if self.procs[pid.as_usize()].state != ProcState::Susp {
                return Err(KernelError::PreconditionFailed);
            }
            let prio = self.procs[pid.as_usize()].prio;
            self.procs[pid.as_usize()].state = ProcState::Ready;
            self.ready
                .insert_by_priority(&mut self.procs, pid, prio)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
            Ok(())
        })
    }

    /// Read back and clear the reason a blocked call's PCB was last woken
    /// (spec §4.F `wait`'s "after reawakening, check whether..." and the
    /// equivalent §4.G `recvtime` check). Called by a kernel-entry wrapper
    /// once the process is `Curr` again, after the suspension point that
    /// blocked it has been driven through a `resched`.
    pub fn take_wake_reason(&mut self, pid: Pid) -> Option<crate::process::WakeReason> {
        self.procs[pid.as_usize()].wake_reason.take()
    }
}
