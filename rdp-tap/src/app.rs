// MIT License

//! Top-level cooperative loop.
//!
//! Each [`App::poll`] call: services the console, latches the start button,
//! drives one word of an active extraction run, and tears the run down on
//! completion or permanent failure. Modeled on a single-dispatch `poll()`
//! shape common to bare-metal STM32F0 foreground loops, adapted to this
//! firmware's SWD/UART state machine.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use rdp_tap_swd::{swd_session, CycleDelay, SwClkPin, SwdIoPin, SwdSession};

use crate::config::ReadoutConfig;
use crate::console::{self, Console, ConsoleEvent};
use crate::controller::Extractor;

pub struct App<IO, CLK, CD, PWR, RST, LED, BTN, DLY, SER> {
    console: Console,
    extractor: Extractor,
    cfg: ReadoutConfig,
    readout_index: u32,
    btn_active: bool,

    swd: SwdSession<IO, CLK, CD>,
    power: PWR,
    reset: RST,
    led: LED,
    button: BTN,
    delay: DLY,
    serial: SER,
}

impl<IO, CLK, CD, PWR, RST, LED, BTN, DLY, SER> App<IO, CLK, CD, PWR, RST, LED, BTN, DLY, SER>
where
    IO: SwdIoPin,
    CLK: SwClkPin,
    CD: CycleDelay,
    PWR: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    BTN: InputPin,
    DLY: DelayNs,
    SER: embedded_hal_nb::serial::Write<u8> + embedded_hal_nb::serial::Read<u8>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        swdio: IO,
        swclk: CLK,
        cycle_delay: CD,
        power: PWR,
        reset: RST,
        led: LED,
        button: BTN,
        delay: DLY,
        serial: SER,
    ) -> Self {
        App {
            console: Console::new(),
            extractor: Extractor::new(),
            cfg: ReadoutConfig::default(),
            readout_index: 0,
            btn_active: false,
            swd: swd_session(swdio, swclk, cycle_delay),
            power,
            reset,
            led,
            button,
            delay,
            serial,
        }
    }

    /// One iteration of the cooperative main loop.
    pub fn poll(&mut self) {
        self.poll_console();
        self.poll_button();

        if self.cfg.active || self.btn_active {
            self.step_extraction();
        }
    }

    fn poll_console(&mut self) {
        let Some(byte) = self.try_read_byte() else {
            return;
        };
        let event = self.console.process_byte(byte, &mut self.cfg);
        self.handle_console_event(event);
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        match embedded_hal_nb::serial::Read::read(&mut self.serial) {
            Ok(byte) => Some(byte),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(_)) => None,
        }
    }

    fn write_blocking(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = nb::block!(embedded_hal_nb::serial::Write::write(&mut self.serial, byte));
        }
    }

    fn write_str_blocking(&mut self, s: &str) {
        self.write_blocking(s.as_bytes());
    }

    fn handle_console_event(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::None => {}
            ConsoleEvent::Echo(s) => self.write_str_blocking(s),
            ConsoleEvent::EchoHex32 { prefix, value } => {
                self.write_str_blocking(prefix);
                self.write_blocking(&hex32_be(value));
                self.write_str_blocking("\r\n");
            }
            ConsoleEvent::PrintStats => {
                self.write_str_blocking("Statistics: \r\n");
                self.write_str_blocking("Attempts: 0x");
                self.write_blocking(&hex32_be(self.extractor.stats.attempts));
                self.write_str_blocking("\r\nSuccess: 0x");
                self.write_blocking(&hex32_be(self.extractor.stats.successes));
                self.write_str_blocking("\r\nFailure: 0x");
                self.write_blocking(&hex32_be(self.extractor.stats.failures));
                self.write_str_blocking("\r\n");
            }
            ConsoleEvent::Start { reset_stats } => {
                if reset_stats {
                    self.extractor.reset_stats();
                }
                self.write_str_blocking("Flash readout started!\r\n");
            }
            ConsoleEvent::Error => self.write_str_blocking("ERROR: unknown command\r\n"),
        }
    }

    fn poll_button(&mut self) {
        if self.button.is_high().unwrap_or(false) {
            self.btn_active = true;
        }
    }

    fn step_extraction(&mut self) {
        if self.readout_index >= self.cfg.length {
            self.finish_run();
            return;
        }

        let addr = self.cfg.base_address.wrapping_add(self.readout_index);
        let result = self.extractor.extract_word(
            &mut self.swd,
            &mut self.power,
            &mut self.reset,
            &mut self.led,
            &mut self.delay,
            addr,
        );

        match result {
            Ok(word) => {
                self.emit_word(word);
                self.readout_index += 4;
                if self.readout_index >= self.cfg.length {
                    self.finish_run();
                }
            }
            Err(err) => {
                if self.cfg.hex_output {
                    self.write_str_blocking("\r\n!ExtractionFailure");
                    self.write_blocking(&hex32_be(err.status_code()));
                }
                self.finish_run();
            }
        }
    }

    fn emit_word(&mut self, word: u32) {
        if self.cfg.hex_output {
            self.write_blocking(&console::word_hex(word, &self.cfg));
            self.write_str_blocking(" ");
        } else {
            self.write_blocking(&console::word_bin(word, &self.cfg));
        }
    }

    fn finish_run(&mut self) {
        if self.cfg.hex_output {
            self.write_str_blocking("\r\n");
        }
        self.cfg.active = false;
        self.btn_active = false;
        self.readout_index = 0;
    }
}

fn hex32_be(value: u32) -> [u8; 8] {
    console::word_hex_be(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdp_tap_swd::{swd_session, CycleDelay, SwClkPin, SwdIoPin};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::convert::Infallible;

    struct MockPin {
        high: Cell<bool>,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }
    impl OutputPin for MockPin {
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high.set(true);
            Ok(())
        }
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high.set(false);
            Ok(())
        }
    }
    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high.get())
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high.get())
        }
    }

    fn low_pin() -> MockPin {
        MockPin { high: Cell::new(false) }
    }

    struct NoopDelay;
    impl DelayNs for NoopDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// A line-layer mock that always ACKs OK and returns `word` for every
    /// data phase it is asked to read, so `extract_word` succeeds on its
    /// first attempt.
    struct AlwaysOkIo {
        word: u32,
        bitstream: VecDeque<bool>,
    }

    impl AlwaysOkIo {
        fn for_word(word: u32) -> Self {
            let ack = [true, false, false]; // 0b001, LSB first
            let mut bits: VecDeque<bool> = ack.into_iter().collect();
            bits.extend((0..32).map(|i| (word >> i) & 1 != 0));
            bits.push_back(false); // parity, unchecked
            // `read_ahb` issues TAR write (ack only), DRW read (ack+data,
            // ignored), RDBUFF read (ack+data, the real value): queue enough
            // repeats of the same ack/data shape to satisfy all three calls,
            // plus `set_ap_32bit_mode`'s CSW/RDBUFF round trip and the
            // initial IDCODE read inside `init`.
            let mut bitstream = VecDeque::new();
            for _ in 0..8 {
                bitstream.extend(bits.iter().copied());
            }
            AlwaysOkIo { word, bitstream }
        }
    }

    impl SwdIoPin for AlwaysOkIo {
        fn drive_high(&mut self) {}
        fn drive_low(&mut self) {}
        fn set_output(&mut self) {}
        fn set_input(&mut self) {}
        fn read(&mut self) -> bool {
            self.bitstream.pop_front().unwrap_or(false)
        }
    }

    struct NoopClk;
    impl SwClkPin for NoopClk {
        fn set_high(&mut self) {}
        fn set_low(&mut self) {}
    }

    struct NoopCycleDelay;
    impl CycleDelay for NoopCycleDelay {
        fn delay_cycles(&mut self, _cycles: u32) {}
    }

    #[derive(Default)]
    struct MockSerial {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl embedded_hal_nb::serial::ErrorType for MockSerial {
        type Error = Infallible;
    }
    impl embedded_hal_nb::serial::Read<u8> for MockSerial {
        fn read(&mut self) -> nb::Result<u8, Infallible> {
            self.rx.pop_front().ok_or(nb::Error::WouldBlock)
        }
    }
    impl embedded_hal_nb::serial::Write<u8> for MockSerial {
        fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
            self.tx.push(byte);
            Ok(())
        }
        fn flush(&mut self) -> nb::Result<(), Infallible> {
            Ok(())
        }
    }

    type TestApp =
        App<AlwaysOkIo, NoopClk, NoopCycleDelay, MockPin, MockPin, MockPin, MockPin, NoopDelay, MockSerial>;

    fn app_with(word: u32) -> TestApp {
        App::new(
            AlwaysOkIo::for_word(word),
            NoopClk,
            NoopCycleDelay,
            low_pin(),
            low_pin(),
            low_pin(),
            low_pin(),
            NoopDelay,
            MockSerial::default(),
        )
    }

    fn send(app: &mut TestApp, line: &str) {
        for b in line.bytes() {
            app.serial.rx.push_back(b);
            app.poll();
        }
    }

    fn take_output(app: &mut TestApp) -> String {
        let out = core::mem::take(&mut app.serial.tx);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn command_echo_table_produces_exact_strings() {
        let mut app = app_with(0);

        send(&mut app, "b\r");
        assert_eq!(take_output(&mut app), "Binary output mode selected\r\n");

        send(&mut app, "h\r");
        assert_eq!(take_output(&mut app), "Hex output mode selected\r\n");

        send(&mut app, "e\r");
        assert_eq!(take_output(&mut app), "Little Endian mode enabled\r\n");

        send(&mut app, "E\r");
        assert_eq!(take_output(&mut app), "Big Endian mode enabled\r\n");

        send(&mut app, "a08000000\r");
        assert_eq!(take_output(&mut app), "Start address set to 0x08000000\r\n");

        send(&mut app, "l00000008\r");
        assert_eq!(take_output(&mut app), "Readout length set to 0x00000008\r\n");

        send(&mut app, "z\r");
        assert_eq!(take_output(&mut app), "ERROR: unknown command\r\n");
    }

    #[test]
    fn successful_hex_run_emits_two_words_and_trailing_crlf() {
        let mut app = app_with(0xDEAD_BEEF);
        send(&mut app, "h\r"); // hex mode
        take_output(&mut app);
        send(&mut app, "E\r"); // big-endian, matching the property's vector
        take_output(&mut app);
        send(&mut app, "a08000000\r");
        take_output(&mut app);
        send(&mut app, "l00000008\r"); // two words
        take_output(&mut app);

        // The poll that processes the trailing '\r' of "s\r" both starts the
        // run and, in that same `poll()` call, drives the first word.
        send(&mut app, "s\r");
        assert_eq!(take_output(&mut app), "Flash readout started!\r\nDEADBEEF ");

        // One more `poll()` drives the second (and last) word, completing
        // the 8-byte run and appending the trailing CRLF.
        app.poll();
        assert_eq!(take_output(&mut app), "DEADBEEF \r\n");
    }
}
