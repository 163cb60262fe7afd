//! Compile-time tunables.
//!
//! A freestanding kernel core has no argv and no config file; the
//! no_std-idiomatic analogue is a block of `pub const`s, the same role
//! `THREAD_STACK_SIZE`/`MAX_THREADS` played in the teacher's
//! `scheduler/mod.rs`.

/// Maximum number of processes, including the null process (PID 0).
pub const NPROC: usize = 64;

/// Maximum number of simultaneously allocated semaphores.
pub const NSEM: usize = 64;

/// Maximum number of simultaneously allocated timers.
pub const NTIMER: usize = 32;

/// Maximum number of simultaneously allocated named ports.
pub const NPORT: usize = 16;

/// Bytes of message payload per mailbox/port slot (a single u32 word per
/// spec §3/§4.G; ports carry the same word width).
pub type Word = u32;

/// Default bounded-mailbox ring capacity when a caller does not specify one.
pub const DEFAULT_MBOX_CAPACITY: usize = 16;

/// Maximum ring capacity any single mailbox or port may request.
pub const MAX_MBOX_CAPACITY: usize = 64;

/// Named port capacity is independent of, and smaller than, mailbox capacity (§3).
pub const PORT_CAPACITY: usize = 8;

/// Maximum number of simultaneously allocated bounded mailboxes.
pub const NMBOX: usize = 16;

/// Maximum bytes in a process name, including no terminator (heapless::String tracks length).
pub const NAMELEN: usize = 16;

/// Nominal clock tick frequency in Hz (§2 GLOSSARY: CLKFREQ).
pub const CLKFREQ: u32 = 1000;

/// Ticks a process runs before the scheduler preempts it for an equal-priority peer.
pub const QUANTUM: u32 = 10;

/// Lowest legal priority (the null process runs at this value).
pub const MIN_PRIO: i32 = 0;

/// Highest legal priority.
pub const MAX_PRIO: i32 = 1000;

/// Default priority assigned when a caller does not request one explicitly.
pub const DEFAULT_PRIO: i32 = 20;

/// Minimum stack size the core accepts from `Arch::alloc_stack`, in bytes.
pub const MIN_STACK_BYTES: usize = 512;
