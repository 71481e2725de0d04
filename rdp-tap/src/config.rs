// MIT License

//! Data model shared between the console and the extraction controller.

/// Retries per word before a read is reported as a permanent failure.
pub const MAX_READ_ATTEMPTS: u32 = 100;

/// Jitter window bounds, in milliseconds, walked by [`JitterState`].
pub const JITTER_MIN: u16 = 20;
pub const JITTER_STEP: u16 = 1;
pub const JITTER_MAX: u16 = 50;

/// Readout window and output formatting, mutated only by the console and
/// read by the top-level loop.
#[derive(Debug, Clone, Copy)]
pub struct ReadoutConfig {
    pub base_address: u32,
    pub length: u32,
    pub hex_output: bool,
    pub little_endian: bool,
    pub active: bool,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        ReadoutConfig {
            base_address: 0,
            length: 64 * 1024,
            hex_output: false,
            little_endian: true,
            active: false,
        }
    }
}

impl ReadoutConfig {
    /// Set the base address, rounding **down** to a 32-bit boundary.
    pub fn set_base_address(&mut self, addr: u32) {
        self.base_address = addr & !0x3;
    }

    /// Set the readout length, rounding **up** to a 32-bit boundary.
    pub fn set_length(&mut self, len: u32) {
        self.length = (len + 0x3) & !0x3;
    }
}

/// Attempt/success/failure counters for the current extraction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionStats {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
}

/// The reset-to-read delay walked across attempts and across words.
///
/// Persists for the lifetime of the firmware: a fresh run does not reset the
/// jitter walk, only the statistics, since the point of the walk is to keep
/// exploring the timing window across the whole device's worth of words.
#[derive(Debug, Clone, Copy)]
pub struct JitterState {
    pub delay_ms: u16,
}

impl Default for JitterState {
    fn default() -> Self {
        JitterState {
            delay_ms: JITTER_MIN,
        }
    }
}

impl JitterState {
    /// Advance the walk by one failed attempt, wrapping back to
    /// `JITTER_MIN` once `JITTER_MAX` is reached.
    pub fn advance(&mut self) {
        self.delay_ms += JITTER_STEP;
        if self.delay_ms >= JITTER_MAX {
            self.delay_ms = JITTER_MIN;
        }
    }
}
