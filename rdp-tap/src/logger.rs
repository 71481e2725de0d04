// MIT License

//! Diagnostic logging sink, kept off the operator-facing UART so probe
//! output and trace logs never interleave. Backed by RTT, the common
//! `no_std`/Cortex-M pairing for this use.

use log::{Level, LevelFilter, Metadata, Record};

struct RttLogger;

static LOGGER: RttLogger = RttLogger;

impl log::Log for RttLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            rtt_target::rprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init() {
    rtt_target::rtt_init_print!();
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Trace))
        .ok();
}
