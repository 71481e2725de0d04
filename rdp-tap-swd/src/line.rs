// MIT License

//! SWD line layer: raw bit clocking over SWDIO/SWCLK.
//!
//! This layer knows nothing about headers, acks or registers — it only
//! shifts bits LSB-first and drives the two-wire bus's direction changes.
//! Every half-bit is a `set-data, wait, clock-edge, wait` shape, matching the
//! original firmware's `MWAIT`-delimited GPIO pokes bit for bit.

/// Number of busy-wait cycles held on each half of a clock edge.
///
/// The original firmware's `MWAIT` macro is `movs r0, #0x30; 1: subs r0, #1;
/// bne 1b`, 0x30 (48) decrement-branch iterations on a 48 MHz Cortex-M0
/// core. `CycleDelay` implementations translate this cycle count into
/// whatever busy-wait primitive the target architecture provides (e.g.
/// `cortex_m::asm::delay`).
pub const LINE_DELAY_CYCLES: u32 = 48;

/// Placeholder for a configurable bit rate. This spec only ever runs at one
/// speed, so the enum carries a single variant — kept as an enum rather than
/// a bare constant so a future multi-speed revision has somewhere to grow
/// without changing the public API shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    #[default]
    Default,
}

impl Speed {
    pub const fn cycles(self) -> u32 {
        match self {
            Speed::Default => LINE_DELAY_CYCLES,
        }
    }
}

/// The bidirectional SWDIO pin.
///
/// `embedded-hal` has no standard "flex" GPIO trait covering runtime
/// direction switches, so this crate defines its own minimal one. A board's
/// concrete pin type (its `Flex`/`Dynamic` equivalent) implements this
/// directly; the operations are modelled as infallible because on every
/// target this crate runs on they are raw register pokes that cannot fail.
pub trait SwdIoPin {
    /// Drive the pin high (push-pull output level, independent of whether
    /// the pin is currently configured as an output).
    fn drive_high(&mut self);

    /// Drive the pin low.
    fn drive_low(&mut self);

    /// Switch the pin to push-pull output.
    fn set_output(&mut self);

    /// Switch the pin to high-impedance input with a weak pull-up.
    fn set_input(&mut self);

    /// Sample the pin's current level.
    fn read(&mut self) -> bool;
}

/// SWCLK only ever drives, so it needs nothing beyond a plain push-pull
/// output toggle.
pub trait SwClkPin {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Busy-wait for a fixed number of CPU cycles.
pub trait CycleDelay {
    fn delay_cycles(&mut self, cycles: u32);
}

/// Raw SWD line driver over a bit-banged SWDIO/SWCLK pair.
pub struct SwdLine<IO, CLK, D> {
    io: IO,
    clk: CLK,
    delay: D,
    speed: Speed,
}

impl<IO, CLK, D> SwdLine<IO, CLK, D>
where
    IO: SwdIoPin,
    CLK: SwClkPin,
    D: CycleDelay,
{
    pub fn new(io: IO, clk: CLK, delay: D) -> Self {
        Self {
            io,
            clk,
            delay,
            speed: Speed::default(),
        }
    }

    fn half_wait(&mut self) {
        self.delay.delay_cycles(self.speed.cycles());
    }

    /// Pulse SWCLK high then low, waiting a half-bit period on each side.
    fn clock_pulse(&mut self) {
        self.clk.set_high();
        self.half_wait();
        self.clk.set_low();
        self.half_wait();
    }

    /// Switch SWDIO to high-impedance input, settling the pull-up before and
    /// after the mode change (matches `swdDataIdle`'s set-then-float order).
    pub fn drive_idle(&mut self) {
        self.io.drive_high();
        self.half_wait();
        self.io.set_input();
        self.half_wait();
    }

    /// Switch SWDIO to push-pull output, driven low, settling before and
    /// after the mode change (matches `swdDataPP`).
    pub fn drive_active(&mut self) {
        self.half_wait();
        self.io.drive_low();
        self.io.set_output();
        self.half_wait();
    }

    /// Clock a single turnaround bit while SWDIO is left exactly as the
    /// caller set it (idle or active); used to satisfy the bus turnaround
    /// period between a request and a data phase, and vice versa.
    pub fn turnaround(&mut self) {
        self.clock_pulse();
    }

    fn write_bit(&mut self, bit: bool) {
        if bit {
            self.io.drive_high();
        } else {
            self.io.drive_low();
        }
        self.half_wait();
        self.clock_pulse();
    }

    fn read_bit(&mut self) -> bool {
        let bit = self.io.read();
        self.clock_pulse();
        bit
    }

    /// Shift `n_bits` out of `data`, LSB-first within each byte, byte 0
    /// first. SWDIO must already be driving (see [`Self::drive_active`]).
    pub fn send_bits(&mut self, data: &[u8], n_bits: usize) {
        for i in 0..n_bits {
            let byte = data[i / 8];
            let bit = (byte >> (i % 8)) & 0x01 != 0;
            self.write_bit(bit);
        }
    }

    /// Shift `n_bits` into `out`. Bits are packed back-to-front: the last
    /// byte of `out` holds the first 8 bits clocked in (MSB = first bit),
    /// matching the original firmware's
    /// `data[(((len + 7) >> 3) - (i >> 3)) - 1] = cdata` placement. SWDIO
    /// must already be floating (see [`Self::drive_idle`]).
    pub fn read_bits(&mut self, out: &mut [u8], n_bits: usize) {
        let n_bytes = n_bits.div_ceil(8);
        let mut cdata: u8 = 0;
        for i in 0..n_bits {
            cdata >>= 1;
            if self.read_bit() {
                cdata |= 0x80;
            }
            let byte_index = n_bytes - 1 - (i / 8);
            out[byte_index] = cdata;
            if i % 8 == 7 {
                cdata = 0;
            }
        }
    }

    /// Drive a line reset: SWDIO/SWCLK settle with SWDIO high, then (with the
    /// `jtag-reset` feature) a 60-cycle reset and the JTAG-to-SWD sequence,
    /// then an unconditional 60 high cycles (the original's "50 + 10"
    /// documented margin over the architecturally required 50), then SWDIO
    /// low and 3 trailing clocks to park the bus in the idle state a
    /// transaction expects to start from.
    pub fn line_reset(&mut self) {
        self.half_wait();
        self.io.drive_high();
        self.io.set_output();
        self.clk.set_high();
        self.half_wait();

        #[cfg(feature = "jtag-reset")]
        {
            for _ in 0..60 {
                self.clock_pulse();
            }
            self.jtag_to_swd_sequence();
        }

        for _ in 0..60 {
            self.clock_pulse();
        }

        self.io.drive_low();
        for _ in 0..3 {
            self.clock_pulse();
        }
    }

    /// Sends the documented JTAG-to-SWD bit pattern `0x79E7`, bit-reversed
    /// and clocked out LSB-first, reproducing the original firmware's
    /// hardcoded `send1[]` array (`0,1,1,1,1,0,0,1,1,1,1,0,0,1,1,1`) bit for
    /// bit.
    #[cfg(feature = "jtag-reset")]
    fn jtag_to_swd_sequence(&mut self) {
        const JTAG_TO_SWD_DOCUMENTED: u16 = 0x79E7;
        let seq = JTAG_TO_SWD_DOCUMENTED.reverse_bits();
        for i in 0..16 {
            let bit = (seq >> i) & 0x01 != 0;
            self.write_bit(bit);
        }
    }
}

pub fn calculate_parity(data: u32) -> bool {
    data.count_ones() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct MockBus {
        output: Rc<RefCell<Vec<bool>>>,
        input: RefCell<Vec<bool>>,
        driving: bool,
    }

    struct MockIo(Rc<RefCell<MockBus>>);
    struct MockClk;
    struct MockDelay;

    impl CycleDelay for MockDelay {
        fn delay_cycles(&mut self, _cycles: u32) {}
    }

    impl SwClkPin for MockClk {
        fn set_high(&mut self) {}
        fn set_low(&mut self) {}
    }

    impl SwdIoPin for MockIo {
        fn drive_high(&mut self) {
            let bus = self.0.borrow();
            if bus.driving {
                bus.output.borrow_mut().push(true);
            }
        }
        fn drive_low(&mut self) {
            let bus = self.0.borrow();
            if bus.driving {
                bus.output.borrow_mut().push(false);
            }
        }
        fn set_output(&mut self) {
            self.0.borrow_mut().driving = true;
        }
        fn set_input(&mut self) {
            self.0.borrow_mut().driving = false;
        }
        fn read(&mut self) -> bool {
            let mut bus = self.0.borrow_mut();
            if bus.input.is_empty() {
                false
            } else {
                bus.input.remove(0)
            }
        }
    }

    #[test]
    fn read_bits_packs_back_to_front() {
        let bus = Rc::new(RefCell::new(MockBus {
            output: Rc::new(RefCell::new(Vec::new())),
            input: RefCell::new(vec![
                true, false, true, false, true, false, true, false, // 0xAA? LSB first: 1,0,1,0,1,0,1,0
                true, true, false, false, true, true, false, false,
            ]),
            driving: false,
        }));
        let mut line = SwdLine::new(MockIo(bus), MockClk, MockDelay);
        let mut out = [0u8; 2];
        line.read_bits(&mut out, 16);
        // First 8 bits clocked in land in the *last* byte of `out`.
        assert_eq!(out[1], 0b0101_0101);
        assert_eq!(out[0], 0b0011_0011);
    }

    #[test]
    fn parity_is_even_for_zero_bits_set() {
        assert!(!calculate_parity(0));
        assert!(calculate_parity(1));
        assert!(calculate_parity(0b11));
        assert!(!calculate_parity(0b111));
    }

    #[test]
    fn parity_matches_xor_of_all_32_bits_for_sample_words() {
        for word in [0u32, 0xFFFF_FFFF, 0xDEAD_BEEF, 0x1234_5678] {
            let expected = (0..32).fold(false, |acc, i| acc ^ ((word >> i) & 1 != 0));
            assert_eq!(calculate_parity(word), expected, "word {word:#010x}");
        }
    }
}
