//! Ambient logging (spec §2 additions over spec.md): a `log::Log`
//! implementation over a pluggable line sink, grounded on the teacher's
//! `utils/logger.rs::CluuLogger`. The teacher writes straight to a
//! `serial_println!` macro backed by a fixed serial port; this crate has
//! no console of its own (boot/console plumbing is an explicit
//! non-goal), so the sink is a trait a host binary implements instead.

use core::fmt::Write as _;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// A destination for one formatted log line. Implemented by whatever the
/// booted kernel uses for console/serial output; this crate never picks
/// one itself.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Discards everything. Installed by the test harness instead of a real
/// sink, so `log::info!`/`log::debug!` calls exercised by unit tests
/// never need an actual console (spec §2 "Test tooling").
pub struct NullLogger;

impl LineSink for NullLogger {
    fn write_line(&self, _line: &str) {}
}

struct KernelLogger;

static SINK: Mutex<Option<&'static dyn LineSink>> = Mutex::new(None);
static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = *SINK.lock() {
            let mut line: heapless::String<128> = heapless::String::new();
            let _ = write!(line, "[{}] {}", record.level(), record.args());
            sink.write_line(&line);
        }
    }

    fn flush(&self) {}
}

/// Install `sink` as the `log` facade's global logger at `max_level`.
/// Idempotent: a second call is a no-op besides swapping the sink, since
/// `log::set_logger` itself may only succeed once per process.
pub fn init(sink: &'static dyn LineSink, max_level: LevelFilter) {
    *SINK.lock() = Some(sink);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(max_level);
    }
}
