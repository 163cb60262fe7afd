//! System call numbers and result sentinels (spec §6).
//!
//! Grounded on the teacher's `syscall/numbers.rs` (one `pub const` per
//! call, with a short doc comment naming the argument tuple and result),
//! but the numbering itself follows this kernel's own table rather than
//! the System V ABI the teacher targets — this core has no newlib/libc
//! compatibility surface to match.

/// One past the highest syscall number the dispatcher will ever accept
/// (spec §6 dispatcher contract: "validate number in `[0, 128)`").
pub const MAX_SYSCALL: usize = 128;

/// Generic success sentinel for calls whose result carries no payload.
pub const SYS_OK: isize = 0;
/// Generic failure sentinel (spec §7 "distinguished error sentinel").
pub const SYS_ERR: isize = -1;
/// `timedwait`/`recvtime` deadline elapsed before the wait was satisfied.
pub const SYS_TIMEOUT: isize = -2;

/// Create a process. Args: `entry, stack_bytes, prio, name, n`.
pub const SYS_CREATE: usize = 1;
/// Args: `pid`.
pub const SYS_KILL: usize = 2;
/// Args: none.
pub const SYS_GETPID: usize = 3;
/// Args: `pid`.
pub const SYS_SUSPEND: usize = 4;
/// Args: `pid`.
pub const SYS_RESUME: usize = 5;
/// Args: none.
pub const SYS_YIELD: usize = 6;
/// Args: `ticks`.
pub const SYS_SLEEP: usize = 7;
/// Args: `ms`.
pub const SYS_SLEEPMS: usize = 8;
/// Args: none. Does not return.
pub const SYS_EXIT: usize = 9;
/// Args: `pid`.
pub const SYS_GETPRIO: usize = 11;
/// Args: `pid, newprio`.
pub const SYS_SETPRIO: usize = 12;
/// Args: `nbytes`. External memory collaborator (spec §6); not
/// implemented by this core, see `handlers::sys_getmem`.
pub const SYS_GETMEM: usize = 20;
/// Args: `addr, nbytes`. See `SYS_GETMEM`.
pub const SYS_FREEMEM: usize = 21;
/// Args: `count`.
pub const SYS_SEMCREATE: usize = 30;
/// Args: `sid`.
pub const SYS_SEMDELETE: usize = 31;
/// Args: `sid`.
pub const SYS_WAIT: usize = 32;
/// Args: `sid`.
pub const SYS_SIGNAL: usize = 33;
/// Args: `sid, n`.
pub const SYS_SIGNALN: usize = 34;
/// Args: `sid`.
pub const SYS_SEMCOUNT: usize = 35;
/// Args: `pid, msg`.
pub const SYS_SEND: usize = 50;
/// Args: none.
pub const SYS_RECEIVE: usize = 51;
/// Args: none. Result: msg or 0 when empty.
pub const SYS_RECVCLR: usize = 52;
/// Args: `ms`. Result: msg or `SYS_TIMEOUT`.
pub const SYS_RECVTIME: usize = 53;
/// Args: none. Result: seconds since boot.
pub const SYS_GETTIME: usize = 60;
/// Args: none. Result: low 32 bits of the tick count.
pub const SYS_GETTICKS: usize = 61;

/// Every syscall number this dispatcher enables, in table order
/// (spec §6). Anything outside this list is a valid *number* but a
/// disabled *slot* — `Dispatcher::new` rejects it the same way an
/// out-of-range number is rejected.
pub const ENABLED_SYSCALLS: &[usize] = &[
    SYS_CREATE,
    SYS_KILL,
    SYS_GETPID,
    SYS_SUSPEND,
    SYS_RESUME,
    SYS_YIELD,
    SYS_SLEEP,
    SYS_SLEEPMS,
    SYS_EXIT,
    SYS_GETPRIO,
    SYS_SETPRIO,
    SYS_GETMEM,
    SYS_FREEMEM,
    SYS_SEMCREATE,
    SYS_SEMDELETE,
    SYS_WAIT,
    SYS_SIGNAL,
    SYS_SIGNALN,
    SYS_SEMCOUNT,
    SYS_SEND,
    SYS_RECEIVE,
    SYS_RECVCLR,
    SYS_RECVTIME,
    SYS_GETTIME,
    SYS_GETTICKS,
];
