// MIT License

//! STM32F0 board bring-up: clock, GPIO and UART register glue.
//!
//! This is the "external collaborator" layer the core crates are generic
//! over — plain register pokes, not the engineering interest of this
//! firmware. Register access follows the standard `stm32ral`
//! read/modify/write macro idiom for bare-metal STM32 firmware.

use stm32ral::{gpio, modify_reg, read_reg, rcc, write_reg};
use stm32ral::{flash, usart};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rdp_tap_swd::{CycleDelay, SwClkPin, SwdIoPin};

/// Bring the core clock up to 48 MHz via the internal HSI + PLL, matching
/// the original firmware's `clkEnablePLLInt`.
pub fn enable_pll(rcc: &rcc::Instance, flash: &flash::Instance) {
    write_reg!(flash, flash, ACR, LATENCY: 1);
    write_reg!(rcc, rcc, CFGR2, PREDIV: 0b0001); // /2
    modify_reg!(rcc, rcc, CFGR, PLLSRC: 0b00, PLLMUL: 0b1010); // HSI/PREDIV * 12
    modify_reg!(rcc, rcc, CR, PLLON: 1);
    while read_reg!(rcc, rcc, CR, PLLRDY) == 0 {}
    modify_reg!(rcc, rcc, CFGR, SW: 0b10);
    while read_reg!(rcc, rcc, CFGR, SWS) != 0b10 {}
}

/// SysTick-based busy-wait timer (no interrupts), matching the original
/// firmware's `waitus`/`waitms`.
pub struct SysTickDelay {
    syst: cortex_m::peripheral::SYST,
}

const SYSTICK_TICKS_PER_US: u32 = 48;
const SYSTICK_MAX: u32 = 0x00FF_FFFF;

impl SysTickDelay {
    pub fn new(mut syst: cortex_m::peripheral::SYST) -> Self {
        syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
        syst.set_reload(SYSTICK_MAX);
        syst.enable_counter();
        SysTickDelay { syst }
    }

    pub fn wait_us(&mut self, us: u32) {
        self.syst.clear_current();
        let target = SYSTICK_MAX.saturating_sub(us.saturating_mul(SYSTICK_TICKS_PER_US));
        while self.syst.cvr.read() >= target {}
    }
}

impl DelayNs for SysTickDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wait_us(ns.div_ceil(1000).max(1));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait_us(us);
    }
}

/// Busy-wait a fixed small number of core cycles, used as the SWD line
/// layer's inter-edge delay. A plain `cortex_m::asm::delay` call.
#[derive(Default)]
pub struct LineCycleDelay;

impl CycleDelay for LineCycleDelay {
    fn delay_cycles(&mut self, cycles: u32) {
        cortex_m::asm::delay(cycles);
    }
}

fn pin_mask(pin: u8) -> u32 {
    1 << pin
}

fn set_mode(gpio: &gpio::Instance, pin: u8, mode: u32) {
    let offset = u32::from(pin) * 2;
    let mask = 0b11u32 << offset;
    let value = (mode << offset) & mask;
    modify_reg!(gpio, gpio, MODER, |r| (r & !mask) | value);
}

/// SWDIO: the only bidirectional line, switched between push-pull output
/// (driving) and floating input with a pull-up (sampling).
pub struct Swdio<'a> {
    gpio: &'a gpio::Instance,
    pin: u8,
}

impl<'a> Swdio<'a> {
    pub fn new(gpio: &'a gpio::Instance, pin: u8) -> Self {
        let offset = u32::from(pin) * 2;
        modify_reg!(gpio, gpio, PUPDR, |r| (r & !(0b11 << offset)) | (0b01 << offset));
        Swdio { gpio, pin }
    }
}

impl SwdIoPin for Swdio<'_> {
    fn drive_high(&mut self) {
        write_reg!(gpio, self.gpio, BSRR, pin_mask(self.pin));
    }

    fn drive_low(&mut self) {
        write_reg!(gpio, self.gpio, BRR, pin_mask(self.pin));
    }

    fn set_output(&mut self) {
        set_mode(self.gpio, self.pin, 0b01);
    }

    fn set_input(&mut self) {
        set_mode(self.gpio, self.pin, 0b00);
    }

    fn read(&mut self) -> bool {
        read_reg!(gpio, self.gpio, IDR) & pin_mask(self.pin) != 0
    }
}

/// SWCLK: push-pull output only.
pub struct Swclk<'a> {
    gpio: &'a gpio::Instance,
    pin: u8,
}

impl<'a> Swclk<'a> {
    pub fn new(gpio: &'a gpio::Instance, pin: u8) -> Self {
        set_mode(gpio, pin, 0b01);
        let offset = u32::from(pin) * 2;
        modify_reg!(gpio, gpio, PUPDR, |r| (r & !(0b11 << offset)) | (0b10 << offset));
        Swclk { gpio, pin }
    }
}

impl SwClkPin for Swclk<'_> {
    fn set_high(&mut self) {
        write_reg!(gpio, self.gpio, BSRR, pin_mask(self.pin));
    }

    fn set_low(&mut self) {
        write_reg!(gpio, self.gpio, BRR, pin_mask(self.pin));
    }
}

/// A plain push-pull output pin: target power, target reset, or the status
/// LED.
pub struct OutPin<'a> {
    gpio: &'a gpio::Instance,
    pin: u8,
}

impl<'a> OutPin<'a> {
    pub fn new(gpio: &'a gpio::Instance, pin: u8) -> Self {
        set_mode(gpio, pin, 0b01);
        OutPin { gpio, pin }
    }
}

impl ErrorType for OutPin<'_> {
    type Error = core::convert::Infallible;
}

impl OutputPin for OutPin<'_> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        write_reg!(gpio, self.gpio, BSRR, pin_mask(self.pin));
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        write_reg!(gpio, self.gpio, BRR, pin_mask(self.pin));
        Ok(())
    }
}

/// The start button: a plain input, no debounce. A single depressed read
/// latches activity for a whole run.
pub struct Button<'a> {
    gpio: &'a gpio::Instance,
    pin: u8,
}

impl<'a> Button<'a> {
    pub fn new(gpio: &'a gpio::Instance, pin: u8) -> Self {
        set_mode(gpio, pin, 0b00);
        Button { gpio, pin }
    }
}

impl ErrorType for Button<'_> {
    type Error = core::convert::Infallible;
}

impl InputPin for Button<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(read_reg!(gpio, self.gpio, IDR) & pin_mask(self.pin) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

/// USART1, TX/RX swapped at the pad, 115200 8N1 at 48 MHz
/// (`BRR = 0x1A1`, matching the original firmware's `uartInit`).
pub struct Uart<'a> {
    usart: &'a usart::Instance,
}

impl<'a> Uart<'a> {
    pub fn new(usart: &'a usart::Instance) -> Self {
        write_reg!(usart, usart, CR2, SWAP: 1);
        write_reg!(usart, usart, BRR, 0x1A1);
        write_reg!(usart, usart, CR1, UE: 1, RE: 1, TE: 1);
        // Flush any stale received bytes, as the original firmware does.
        for _ in 0..3 {
            let _ = read_reg!(usart, usart, RDR);
        }
        Uart { usart }
    }
}

impl ErrorType for Uart<'_> {
    type Error = core::convert::Infallible;
}

impl embedded_hal_nb::serial::Read<u8> for Uart<'_> {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if read_reg!(usart, self.usart, ISR, RXNE) == 1 {
            Ok(read_reg!(usart, self.usart, RDR) as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl embedded_hal_nb::serial::Write<u8> for Uart<'_> {
    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if read_reg!(usart, self.usart, ISR, TXE) == 1 {
            write_reg!(usart, self.usart, TDR, u32::from(byte));
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

impl Uart<'_> {
    /// Blocking write of a whole byte string, spinning on TXE per byte —
    /// the same shape as the original firmware's `uartSendStr`.
    pub fn write_str_blocking(&mut self, s: &str) {
        for byte in s.bytes() {
            let _ = nb::block!(embedded_hal_nb::serial::Write::write(self, byte));
        }
    }

    pub fn write_bytes_blocking(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = nb::block!(embedded_hal_nb::serial::Write::write(self, byte));
        }
    }

    pub fn try_read_byte(&mut self) -> Option<u8> {
        match embedded_hal_nb::serial::Read::read(self) {
            Ok(byte) => Some(byte),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(_)) => None,
        }
    }
}
