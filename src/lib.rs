//! Core of a small preemptive, Xinu-style multitasking kernel: process
//! table and state machine, priority scheduler with a delta-list sleep
//! queue, counting semaphores, and the tick handler that drives time,
//! wakeups, timer fire, and preemption.
//!
//! Built `#![no_std]` with no heap: every table is a fixed-size array
//! sized by the constants in [`config`], and the few dynamically-sized
//! collections (mailbox rings, wait queues) use `heapless` instead of
//! `alloc`. A real boot target wires up a concrete [`arch::Arch`],
//! [`arch::StackPool`], and [`arch::InterruptController`] and drives
//! [`clock::Kernel::tick_handler`] from its timer interrupt; everything
//! else is reached through [`kernel::with_kernel`]/[`kernel::with_kernel_mut`].
//!
//! `cargo test` links `std` so ordinary `#[test]` functions can run
//! against [`test_support`]'s host fakes for those three traits. The
//! `test-util` feature exposes the same module (and `kernel::reset_for_test`)
//! to the `tests/` integration binary, which compiles against this crate
//! as an ordinary external dependency and so never sees plain `cfg(test)`
//! — that build needs `std` linked too, which is why `no_std` below is
//! gated on the feature as well. A freestanding build enables neither and
//! stays `no_std`.
#![cfg_attr(not(any(test, feature = "test-util")), no_std)]

pub mod arch;
pub mod clock;
pub mod config;
pub mod critical;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod msg;
pub mod process;
pub mod queue;
pub mod sched;
pub mod sem;
pub mod syscall;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;
