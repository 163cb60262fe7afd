//! Kernel error sentinels (spec §7).
//!
//! Every kernel entry point returns either the requested result or one
//! of these; no exceptional control flow crosses the kernel boundary.
//! Modeled as a plain enum with a `Display` impl, the same shape as the
//! teacher's `scheduler::ipc::IpcError`. No `thiserror`/`anyhow` —
//! neither appears anywhere in the retrieved corpus.

use core::fmt;

/// Distinguished result sentinel returned by kernel operations that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Out-of-range id, or an id referencing a FREE slot.
    InvalidId,
    /// No free PCB, semaphore, timer, port, or mailbox slot.
    QuotaExhausted,
    /// A precondition the operation requires was not met (kill PID 0,
    /// resume a non-SUSP process, create with a null entry point, ...).
    PreconditionFailed,
    /// A blocking wait exceeded its deadline.
    Timeout,
    /// The resource (semaphore, mailbox, port) the caller was waiting on
    /// was deleted out from under it.
    ResourceDeleted,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InvalidId => write!(f, "invalid or unallocated identifier"),
            KernelError::QuotaExhausted => write!(f, "no free slot in the requested table"),
            KernelError::PreconditionFailed => write!(f, "precondition failed"),
            KernelError::Timeout => write!(f, "wait timed out"),
            KernelError::ResourceDeleted => write!(f, "resource deleted while waiting"),
        }
    }
}

/// Kernel-wide result alias.
pub type KResult<T> = Result<T, KernelError>;

/// Panics with diagnostic state. Never recoverable (spec §7): the tick
/// handler and other interrupt contexts escalate programming-bug-grade
/// invalid arguments here rather than returning an error.
#[track_caller]
pub fn kernel_panic(reason: &str) -> ! {
    log::error!("kernel panic: {}", reason);
    panic!("kernel panic: {}", reason);
}
