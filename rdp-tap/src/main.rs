// MIT License

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

#[cfg(not(test))]
extern crate panic_halt;

pub mod app;
pub mod config;
pub mod console;
pub mod controller;
#[cfg(not(test))]
pub mod hal;
#[cfg(not(test))]
pub mod logger;

#[cfg(not(test))]
use cortex_m_rt::entry;

#[cfg(not(test))]
#[entry]
fn main() -> ! {
    let rcc = stm32ral::rcc::RCC::take().unwrap();
    let flash = stm32ral::flash::Flash::take().unwrap();
    hal::enable_pll(&rcc, &flash);

    let core = cortex_m::Peripherals::take().unwrap();
    let ms_delay = hal::SysTickDelay::new(core.SYST);

    logger::init();

    stm32ral::modify_reg!(stm32ral::rcc, rcc, AHBENR, IOPAEN: 1, IOPBEN: 1, IOPCEN: 1);
    stm32ral::modify_reg!(stm32ral::rcc, rcc, APB2ENR, USART1EN: 1);

    let gpioa = stm32ral::gpio::GPIOA::take().unwrap();
    let gpiob = stm32ral::gpio::GPIOB::take().unwrap();
    let gpioc = stm32ral::gpio::GPIOC::take().unwrap();
    let usart1 = stm32ral::usart::USART1::take().unwrap();

    // Pinout: SWDIO/SWCLK on PB4/PB3, target power/reset on PA9/PA12
    // (matching the original firmware's GPIOA assignment), status LED and
    // start button on PC9/PA0.
    let swdio = hal::Swdio::new(&gpiob, 4);
    let swclk = hal::Swclk::new(&gpiob, 3);
    let power = hal::OutPin::new(&gpioa, 9);
    let reset = hal::OutPin::new(&gpioa, 12);
    let led = hal::OutPin::new(&gpioc, 9);
    let button = hal::Button::new(&gpioa, 0);
    let uart = hal::Uart::new(&usart1);

    let mut app = app::App::new(
        swdio,
        swclk,
        hal::LineCycleDelay,
        power,
        reset,
        led,
        button,
        ms_delay,
        uart,
    );

    loop {
        app.poll();
    }
}
