// MIT License

//! Bit-banged ARM SWD master for glitch-based RDP readout.
//!
//! Three layers, each built directly on the one below:
//!
//! - [`line`] — raw SWDIO/SWCLK bit clocking.
//! - [`transaction`] — request headers and 8/3/33-bit packets.
//! - [`session`] — DP/AP register operations (IDCODE, debug power-up, AHB
//!   memory reads).
//!
//! There is no parity checking on the read path and no DP `CTRL/STAT` error
//! scanning: the target the extraction controller is attacking is in RDP
//! level 1, a state in which only a narrow timing window around reset makes
//! a debug-port memory read succeed at all, so failures are expected and
//! handled by retrying the whole word rather than by diagnosing the ack.
#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod line;
pub mod session;
pub mod transaction;

pub use error::SwdError;
pub use line::{CycleDelay, Speed, SwClkPin, SwdIoPin, LINE_DELAY_CYCLES};
pub use session::SwdSession;
pub use transaction::{Direction, Port, SwdTransaction};

use line::SwdLine;

/// Assemble the three layers over a concrete SWDIO/SWCLK/delay
/// implementation.
pub fn swd_session<IO, CLK, D>(io: IO, clk: CLK, delay: D) -> SwdSession<IO, CLK, D>
where
    IO: SwdIoPin,
    CLK: SwClkPin,
    D: CycleDelay,
{
    SwdSession::new(SwdTransaction::new(SwdLine::new(io, clk, delay)))
}
