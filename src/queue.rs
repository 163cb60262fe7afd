//! Component B — queue primitives (spec §4.B).
//!
//! A queue here is nothing but a head/tail pair; the actual links live in
//! the PCB itself (`Pcb::next`/`Pcb::prev`, the "polymorphic wait link"
//! spec §3 describes), strategy (a) from the Design Notes. Because each
//! PCB has exactly one `next`/`prev` pair, a process can never be linked
//! into two queues at once — P4 falls out of the representation instead
//! of needing to be checked by hand. `Pcb::in_queue` still records which
//! `Queue` currently owns a linked process, purely so a double-insert
//! becomes a caught `KernelError::PreconditionFailed` instead of silently
//! corrupting a different queue's links.
//!
//! This generalizes the teacher's `VecDeque<ThreadId>` ready queue
//! (`scheduler/mod.rs`, `scheduler/policies/round_robin.rs`) into an
//! intrusive, allocation-free arena, which is what letting queues
//! multiply (one ready list, one sleep delta list, one wait queue per
//! semaphore/port) without a heap requires.

use crate::config::NPROC;
use crate::error::{KResult, KernelError};
use crate::process::Pcb;
use core::sync::atomic::{AtomicU32, Ordering};

/// Identifies a `Queue` instance for the purpose of catching double-inserts.
/// Not otherwise meaningful; assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueId(u32);

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(1);

fn fresh_queue_id() -> QueueId {
    QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process id, a dense small integer in `[0, NPROC)` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub usize);

impl Pid {
    /// The null/idle process, always PID 0 (spec §3).
    pub const NULL: Pid = Pid(0);

    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// A FIFO or priority-ordered list of PIDs, linked intrusively through the
/// PCB array it is handed at call time.
#[derive(Debug)]
pub struct Queue {
    id: QueueId,
    head: Option<Pid>,
    tail: Option<Pid>,
    len: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            id: fresh_queue_id(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn length(&self) -> usize {
        self.len
    }

    pub fn first(&self) -> Option<Pid> {
        self.head
    }

    fn check_unlinked(&self, procs: &[Pcb; NPROC], pid: Pid) -> KResult<()> {
        if procs[pid.as_usize()].in_queue.is_some() {
            return Err(KernelError::PreconditionFailed);
        }
        Ok(())
    }

    fn link_at_tail(&mut self, procs: &mut [Pcb; NPROC], pid: Pid) {
        procs[pid.as_usize()].prev = self.tail;
        procs[pid.as_usize()].next = None;
        procs[pid.as_usize()].in_queue = Some(self.id);
        if let Some(tail) = self.tail {
            procs[tail.as_usize()].next = Some(pid);
        } else {
            self.head = Some(pid);
        }
        self.tail = Some(pid);
        self.len += 1;
    }

    fn link_before(&mut self, procs: &mut [Pcb; NPROC], pid: Pid, before: Option<Pid>) {
        procs[pid.as_usize()].in_queue = Some(self.id);
        match before {
            None => {
                // Insert at tail.
                procs[pid.as_usize()].prev = self.tail;
                procs[pid.as_usize()].next = None;
                if let Some(tail) = self.tail {
                    procs[tail.as_usize()].next = Some(pid);
                } else {
                    self.head = Some(pid);
                }
                self.tail = Some(pid);
            }
            Some(next_pid) => {
                let prev = procs[next_pid.as_usize()].prev;
                procs[pid.as_usize()].prev = prev;
                procs[pid.as_usize()].next = Some(next_pid);
                procs[next_pid.as_usize()].prev = Some(pid);
                match prev {
                    Some(p) => procs[p.as_usize()].next = Some(pid),
                    None => self.head = Some(pid),
                }
            }
        }
        self.len += 1;
    }

    /// Unlink `pid` from wherever it sits in this queue. Does not check
    /// that `pid` is actually in *this* queue versus another; callers
    /// that need that guarantee should consult `Pcb::in_queue` first.
    fn unlink(&mut self, procs: &mut [Pcb; NPROC], pid: Pid) {
        let prev = procs[pid.as_usize()].prev;
        let next = procs[pid.as_usize()].next;
        match prev {
            Some(p) => procs[p.as_usize()].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => procs[n.as_usize()].prev = prev,
            None => self.tail = prev,
        }
        procs[pid.as_usize()].prev = None;
        procs[pid.as_usize()].next = None;
        procs[pid.as_usize()].in_queue = None;
        procs[pid.as_usize()].delta = 0;
        self.len -= 1;
    }

    /// Append `pid` at the tail (spec: `enqueue`).
    pub fn enqueue(&mut self, procs: &mut [Pcb; NPROC], pid: Pid) -> KResult<()> {
        self.check_unlinked(procs, pid)?;
        self.link_at_tail(procs, pid);
        Ok(())
    }

    /// Pop the head (spec: `dequeue`). Returns `None` on an empty queue
    /// (spec's `EMPTY` sentinel).
    pub fn dequeue(&mut self, procs: &mut [Pcb; NPROC]) -> Option<Pid> {
        let pid = self.head?;
        self.unlink(procs, pid);
        Some(pid)
    }

    /// Insert by descending priority key; equal-priority entries land at
    /// the tail of their priority run, preserving FIFO within priority
    /// (spec: `insert`, used for the ready list).
    pub fn insert_by_priority(
        &mut self,
        procs: &mut [Pcb; NPROC],
        pid: Pid,
        key: i32,
    ) -> KResult<()> {
        self.check_unlinked(procs, pid)?;
        let mut cursor = self.head;
        while let Some(cur) = cursor {
            if procs[cur.as_usize()].prio < key {
                self.link_before(procs, pid, Some(cur));
                return Ok(());
            }
            cursor = procs[cur.as_usize()].next;
        }
        self.link_before(procs, pid, None);
        Ok(())
    }

    /// Insert into a delta list: `delta` is the gap beyond whatever
    /// precedes `pid`, and the delta of the entry `pid` displaces is
    /// reduced so that every absolute expiry downstream is unchanged
    /// (spec: `insertd`, P5).
    pub fn insert_delta(
        &mut self,
        procs: &mut [Pcb; NPROC],
        pid: Pid,
        mut delta: i32,
    ) -> KResult<()> {
        self.check_unlinked(procs, pid)?;
        let mut cursor = self.head;
        while let Some(cur) = cursor {
            let cur_delta = procs[cur.as_usize()].delta;
            if delta < cur_delta {
                procs[cur.as_usize()].delta = cur_delta - delta;
                procs[pid.as_usize()].delta = delta;
                self.link_before(procs, pid, Some(cur));
                return Ok(());
            }
            delta -= cur_delta;
            cursor = procs[cur.as_usize()].next;
        }
        procs[pid.as_usize()].delta = delta;
        self.link_before(procs, pid, None);
        Ok(())
    }

    /// Remove `pid` from this queue wherever it sits (spec: `remove`).
    /// For a delta list, the removed entry's delta is folded into its
    /// successor so that subsequent absolute expiries are preserved
    /// (spec §4.E `unsleep`).
    pub fn remove(&mut self, procs: &mut [Pcb; NPROC], pid: Pid) -> KResult<()> {
        if procs[pid.as_usize()].in_queue != Some(self.id) {
            return Err(KernelError::InvalidId);
        }
        let removed_delta = procs[pid.as_usize()].delta;
        let next = procs[pid.as_usize()].next;
        self.unlink(procs, pid);
        if let Some(n) = next {
            procs[n.as_usize()].delta += removed_delta;
        }
        Ok(())
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Pcb, ProcState};

    fn fresh_procs() -> [Pcb; NPROC] {
        core::array::from_fn(|i| Pcb::free_slot(Pid(i)))
    }

    #[test]
    fn fifo_order() {
        let mut procs = fresh_procs();
        let mut q = Queue::new();
        for i in [1usize, 2, 3] {
            procs[i].state = ProcState::Ready;
            q.enqueue(&mut procs, Pid(i)).unwrap();
        }
        assert_eq!(q.length(), 3);
        assert_eq!(q.dequeue(&mut procs), Some(Pid(1)));
        assert_eq!(q.dequeue(&mut procs), Some(Pid(2)));
        assert_eq!(q.dequeue(&mut procs), Some(Pid(3)));
        assert_eq!(q.dequeue(&mut procs), None);
    }

    #[test]
    fn priority_insert_ties_are_fifo() {
        let mut procs = fresh_procs();
        let mut q = Queue::new();
        let entries = [(1usize, 30), (2, 50), (3, 30), (4, 60)];
        for (pid, prio) in entries {
            procs[pid].prio = prio;
            q.insert_by_priority(&mut procs, Pid(pid), prio).unwrap();
        }
        // Descending priority: 4 (60), 2 (50), then 1, 3 (30, FIFO).
        assert_eq!(q.dequeue(&mut procs), Some(Pid(4)));
        assert_eq!(q.dequeue(&mut procs), Some(Pid(2)));
        assert_eq!(q.dequeue(&mut procs), Some(Pid(1)));
        assert_eq!(q.dequeue(&mut procs), Some(Pid(3)));
    }

    #[test]
    fn double_insert_is_rejected() {
        let mut procs = fresh_procs();
        let mut q = Queue::new();
        q.enqueue(&mut procs, Pid(1)).unwrap();
        assert_eq!(
            q.enqueue(&mut procs, Pid(1)),
            Err(KernelError::PreconditionFailed)
        );
    }

    #[test]
    fn delta_list_preserves_prefix_sums() {
        // Scenario from spec §8 seed test 4: sleep(5), sleep(3), sleep(7)
        // issued back to back with no ticks between. Expected chain:
        // P2(3) -> P1(2) -> P3(2), absolute wake ticks 3, 5, 7.
        let mut procs = fresh_procs();
        let mut q = Queue::new();
        q.insert_delta(&mut procs, Pid(1), 5).unwrap();
        q.insert_delta(&mut procs, Pid(2), 3).unwrap();
        q.insert_delta(&mut procs, Pid(3), 7).unwrap();

        let mut cursor = q.first();
        let mut absolute = 0i32;
        let mut order = alloc_order();
        while let Some(pid) = cursor {
            absolute += procs[pid.as_usize()].delta;
            order.push((pid, absolute));
            cursor = procs[pid.as_usize()].next;
        }
        assert_eq!(order, [(Pid(2), 3), (Pid(1), 5), (Pid(3), 7)]);
    }

    #[test]
    fn remove_from_delta_list_preserves_successor_sum() {
        let mut procs = fresh_procs();
        let mut q = Queue::new();
        q.insert_delta(&mut procs, Pid(1), 5).unwrap();
        q.insert_delta(&mut procs, Pid(2), 3).unwrap();
        q.insert_delta(&mut procs, Pid(3), 7).unwrap();
        // Removing P1 (absolute 5) must fold its remaining delta into P3.
        q.remove(&mut procs, Pid(1)).unwrap();
        let mut cursor = q.first();
        let mut absolute = 0i32;
        let mut order = alloc_order();
        while let Some(pid) = cursor {
            absolute += procs[pid.as_usize()].delta;
            order.push((pid, absolute));
            cursor = procs[pid.as_usize()].next;
        }
        assert_eq!(order, [(Pid(2), 3), (Pid(3), 7)]);
    }

    fn alloc_order() -> heapless::Vec<(Pid, i32), NPROC> {
        heapless::Vec::new()
    }
}
