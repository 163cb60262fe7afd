//! Component G — messaging (spec §4.G): single-slot `send`/`receive`,
//! bounded-ring mailboxes, and named ports.
//!
//! The teacher's real IPC layer, `scheduler::ipc.rs`, has no semaphore
//! or channel type either: `Port`/`Message`/`IpcError` sit behind a
//! `Mutex<Option<BTreeMap<PortId, Port>>>` registry and block/wake a
//! thread directly via `block_current_thread`/`wake_thread`, with no
//! bounded-ring mailbox at all. This module keeps the teacher's
//! fixed-table-of-slots shape (`[Option<MailboxSlot>; NMBOX]`,
//! `[Option<Port>; NPORT]`, mirroring `process.rs`'s `[Pcb; NPROC]`) and
//! its owner-checked `Port`/`PortId` naming, but builds the mailbox's
//! three-semaphore (`slots`/`mutex`/`items`) protocol spec §3/§4.G calls
//! for on top of this crate's own [`crate::sem`] component instead of
//! the teacher's direct block/wake calls — that shape is drawn from
//! `other_examples` (the same Xinu-style semaphore prior art
//! [`crate::sem`] itself is grounded on).

use crate::arch::Arch;
use crate::config::{Word, MAX_MBOX_CAPACITY, NAMELEN, PORT_CAPACITY};
use crate::critical;
use crate::error::{KResult, KernelError};
use crate::kernel::Kernel;
use crate::process::{ProcState, WakeReason};
use crate::queue::Pid;
use crate::sem::SemId;
use heapless::{Deque, String};

/// Bounded-mailbox id, dense in `[0, NMBOX)`. Distinct from [`Pid`]: a
/// mailbox has no process identity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxId(usize);

impl MailboxId {
    fn as_usize(self) -> usize {
        self.0
    }
}

/// Named-port id, dense in `[0, NPORT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortId(usize);

/// A bounded-capacity mailbox: a ring buffer plus the three counting
/// semaphores the producer/consumer protocol needs — `slots` (free ring
/// slots), `mutex` (a binary semaphore serializing the ring mutation
/// itself), and `items` (queued entries) — so `send`/`receive` block
/// correctly without polling and without two concurrent sends tearing
/// the ring (spec §3, §4.G `mailbox_create`/`mailbox_send`/
/// `mailbox_receive`).
pub struct MailboxSlot {
    ring: Deque<Word, MAX_MBOX_CAPACITY>,
    slots: SemId,
    mutex: SemId,
    items: SemId,
}

/// A process-owned rendezvous point looked up by name rather than id
/// (spec §4.G `port_create`/`port_lookup`/`port_delete`, P7: a port's
/// messages are only ever consumed by its creator).
pub struct Port {
    name: String<NAMELEN>,
    owner: Pid,
    queue: Deque<Word, PORT_CAPACITY>,
    waiting_items: SemId,
}

impl Kernel {
    /// Deliver `value` to `pid`'s single message slot, waking it if it
    /// is blocked in `receive()`/`recvtime()` (spec §4.G `send`). Fails
    /// if the slot already holds an undelivered message (no
    /// mailbox-style queuing on this path by design). A target blocked
    /// in `recvtime` is still linked into the sleep delta list for its
    /// timeout; that link is torn down here exactly as `sem::wake_one`
    /// tears down a timed semaphore waiter's, so the ready-list insert
    /// below never trips P4.
    pub fn send<A: Arch>(&mut self, pid: Pid, value: Word) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            if pid.as_usize() >= self.procs.len() || self.procs[pid.as_usize()].is_free() {
                return Err(KernelError::InvalidId);
            }
            if self.procs[pid.as_usize()].has_message {
                return Err(KernelError::PreconditionFailed);
            }
            self.procs[pid.as_usize()].has_message = true;
            self.procs[pid.as_usize()].message = value;
            if self.procs[pid.as_usize()].state == ProcState::Recv {
                if self.procs[pid.as_usize()].in_queue.is_some() {
                    let _ = self.sleepq.remove(&mut self.procs, pid);
                }
                self.procs[pid.as_usize()].state = ProcState::Ready;
                self.procs[pid.as_usize()].wake_reason = Some(WakeReason::Delivered);
                let prio = self.procs[pid.as_usize()].prio;
                self.ready
                    .insert_by_priority(&mut self.procs, pid, prio)
                    .map_err(|_| KernelError::PreconditionFailed)?;
                self.resched_pending = true;
            }
            Ok(())
        })
    }

    /// Block until a message arrives in the caller's slot, then clear
    /// and return it (spec §4.G `receive`). Returns the message directly
    /// when one is already pending; otherwise returns `None` after
    /// marking the caller `Recv` — the caller must `resched` and then
    /// read the delivered value back with [`Kernel::take_message`], since
    /// the value isn't known until `send` actually deposits it.
    pub fn receive<A: Arch>(&mut self) -> Option<Word> {
        critical::with_critical_section::<A, _>(|| {
            let me = self.current;
            if self.procs[me.as_usize()].has_message {
                self.procs[me.as_usize()].has_message = false;
                return Some(self.procs[me.as_usize()].message);
            }
            self.procs[me.as_usize()].state = ProcState::Recv;
            self.resched_pending = true;
            None
        })
    }

    /// Non-blocking form: return the pending message if any, without
    /// changing state otherwise (spec §4.G `recvclr`).
    pub fn recvclr(&mut self) -> Option<Word> {
        let me = self.current;
        if self.procs[me.as_usize()].has_message {
            self.procs[me.as_usize()].has_message = false;
            Some(self.procs[me.as_usize()].message)
        } else {
            None
        }
    }

    /// Read back and clear whatever message is sitting in `pid`'s slot
    /// (spec §4.G, the post-wake half of `receive`/`recvtime`). Called
    /// once a blocked receiver is `Curr` again, after the `resched` that
    /// suspended it — by then `send` has already deposited the value and
    /// set `has_message`, the same handoff `Kernel::take_wake_reason`
    /// uses for why it woke.
    pub fn take_message(&mut self, pid: Pid) -> Word {
        self.procs[pid.as_usize()].has_message = false;
        self.procs[pid.as_usize()].message
    }

    /// Bounded-wait receive: queues the caller on the sleep delta list
    /// alongside the `Recv` state, the same dual-queue shape
    /// `timedwait` uses (spec §4.G `recvtime`). Mirrors [`Kernel::receive`]'s
    /// `None`-means-blocked contract; the caller reads the eventual
    /// result (delivered message, or timeout via `take_wake_reason`) back
    /// through [`Kernel::take_message`] after `resched`.
    pub fn recvtime<A: Arch>(&mut self, ms: u32) -> KResult<Option<Word>> {
        critical::with_critical_section::<A, _>(|| {
            let me = self.current;
            if self.procs[me.as_usize()].has_message {
                self.procs[me.as_usize()].has_message = false;
                return Ok(Some(self.procs[me.as_usize()].message));
            }
            self.procs[me.as_usize()].state = ProcState::Recv;
            let ticks = crate::clock::ms_to_ticks(ms).max(1);
            self.sleepq
                .insert_delta(&mut self.procs, me, ticks as i32)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.resched_pending = true;
            Ok(None)
        })
    }

    /// Create a bounded mailbox owned by no particular process
    /// (spec §4.G `mailbox_create`). `capacity` is clamped to
    /// `[1, MAX_MBOX_CAPACITY]`. `mutex` starts at 1 (unlocked binary
    /// semaphore); `slots` starts at `capacity`; `items` starts at 0.
    pub fn mailbox_create<A: Arch>(&mut self, capacity: usize) -> KResult<MailboxId> {
        critical::with_critical_section::<A, _>(|| {
            let capacity = capacity.clamp(1, MAX_MBOX_CAPACITY);
            let slot = self
                .mailboxes
                .iter()
                .position(|m| m.is_none())
                .ok_or(KernelError::QuotaExhausted)?;
            let slots = self.semcreate::<A>(capacity as i32)?;
            let mutex = self.semcreate::<A>(1)?;
            let items = self.semcreate::<A>(0)?;
            self.mailboxes[slot] = Some(MailboxSlot {
                ring: Deque::new(),
                slots,
                mutex,
                items,
            });
            Ok(MailboxId(slot))
        })
    }

    fn mailbox(&self, id: MailboxId) -> KResult<&MailboxSlot> {
        self.mailboxes
            .get(id.as_usize())
            .and_then(|m| m.as_ref())
            .ok_or(KernelError::InvalidId)
    }

    /// Block until a free ring slot exists, then push `value`
    /// (spec §4.G `mailbox_send`): `wait(slots)`, `wait(mutex)`, push,
    /// `signal(mutex)`, `signal(items)`.
    pub fn mailbox_send<A: Arch>(&mut self, id: MailboxId, value: Word) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let (slots, mutex, items) = {
                let mbox = self.mailbox(id)?;
                (mbox.slots, mbox.mutex, mbox.items)
            };
            self.wait::<A>(slots)?;
            self.wait::<A>(mutex)?;
            let mbox = self.mailboxes[id.as_usize()].as_mut().ok_or(KernelError::InvalidId)?;
            mbox.ring
                .push_back(value)
                .map_err(|_| KernelError::PreconditionFailed)?;
            self.signal::<A>(mutex)?;
            self.signal::<A>(items)?;
            Ok(())
        })
    }

    /// Block until an item is available, then pop it
    /// (spec §4.G `mailbox_receive`): `wait(items)`, `wait(mutex)`, pop,
    /// `signal(mutex)`, `signal(slots)`.
    pub fn mailbox_receive<A: Arch>(&mut self, id: MailboxId) -> KResult<Word> {
        critical::with_critical_section::<A, _>(|| {
            let (slots, mutex, items) = {
                let mbox = self.mailbox(id)?;
                (mbox.slots, mbox.mutex, mbox.items)
            };
            self.wait::<A>(items)?;
            self.wait::<A>(mutex)?;
            let mbox = self.mailboxes[id.as_usize()].as_mut().ok_or(KernelError::InvalidId)?;
            let value = mbox.ring.pop_front().ok_or(KernelError::PreconditionFailed)?;
            self.signal::<A>(mutex)?;
            self.signal::<A>(slots)?;
            Ok(value)
        })
    }

    /// Delete a mailbox and the three semaphores backing it
    /// (spec §4.G `mailbox_delete`). Waiters on any of the three wake
    /// with [`crate::sem::WaitOutcome::Deleted`] via `semdelete`.
    pub fn mailbox_delete<A: Arch>(&mut self, id: MailboxId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let (slots, mutex, items) = {
                let mbox = self.mailbox(id)?;
                (mbox.slots, mbox.mutex, mbox.items)
            };
            self.semdelete::<A>(slots)?;
            self.semdelete::<A>(mutex)?;
            self.semdelete::<A>(items)?;
            self.mailboxes[id.as_usize()] = None;
            Ok(())
        })
    }

    /// Register a named rendezvous point owned by the calling process
    /// (spec §4.G `port_create`). Names must be unique among live ports.
    pub fn port_create<A: Arch>(&mut self, name: &str) -> KResult<PortId> {
        critical::with_critical_section::<A, _>(|| {
            if self.ports.iter().flatten().any(|p| p.name == name) {
                return Err(KernelError::PreconditionFailed);
            }
            let slot = self
                .ports
                .iter()
                .position(|p| p.is_none())
                .ok_or(KernelError::QuotaExhausted)?;
            let waiting_items = self.semcreate::<A>(0)?;
            let mut pname = String::new();
            let _ = pname.push_str(&name[..name.len().min(NAMELEN)]);
            self.ports[slot] = Some(Port {
                name: pname,
                owner: self.current,
                queue: Deque::new(),
                waiting_items,
            });
            Ok(PortId(slot))
        })
    }

    /// Resolve a port name to its id (spec §4.G `port_lookup`).
    pub fn port_lookup(&self, name: &str) -> KResult<PortId> {
        self.ports
            .iter()
            .position(|p| matches!(p, Some(port) if port.name == name))
            .map(PortId)
            .ok_or(KernelError::InvalidId)
    }

    /// Deliver a message into a port's queue, waking its owner if
    /// blocked in `port_receive` (spec §4.G). Open to any sender; only
    /// receipt is restricted to the owner (P7).
    pub fn port_send<A: Arch>(&mut self, port_id: PortId, value: Word) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let items = {
                let port = self.ports.get_mut(port_id.0).and_then(|p| p.as_mut()).ok_or(KernelError::InvalidId)?;
                port.queue.push_back(value).map_err(|_| KernelError::QuotaExhausted)?;
                port.waiting_items
            };
            self.signal::<A>(items)?;
            Ok(())
        })
    }

    /// Receive from a port this process owns (spec §4.G `port_receive`,
    /// P7). Any other caller is rejected outright.
    pub fn port_receive<A: Arch>(&mut self, port_id: PortId) -> KResult<Word> {
        critical::with_critical_section::<A, _>(|| {
            let (owner, items) = {
                let port = self.ports.get(port_id.0).and_then(|p| p.as_ref()).ok_or(KernelError::InvalidId)?;
                (port.owner, port.waiting_items)
            };
            if owner != self.current {
                return Err(KernelError::PreconditionFailed);
            }
            self.wait::<A>(items)?;
            let port = self.ports.get_mut(port_id.0).and_then(|p| p.as_mut()).ok_or(KernelError::InvalidId)?;
            port.queue.pop_front().ok_or(KernelError::PreconditionFailed)
        })
    }

    /// Tear down a port; only its owner may (spec §4.G `port_delete`, P7).
    pub fn port_delete<A: Arch>(&mut self, port_id: PortId) -> KResult<()> {
        critical::with_critical_section::<A, _>(|| {
            let (owner, items) = {
                let port = self.ports.get(port_id.0).and_then(|p| p.as_ref()).ok_or(KernelError::InvalidId)?;
                (port.owner, port.waiting_items)
            };
            if owner != self.current {
                return Err(KernelError::PreconditionFailed);
            }
            self.semdelete::<A>(items)?;
            self.ports[port_id.0] = None;
            Ok(())
        })
    }
}
