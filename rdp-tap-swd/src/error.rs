// MIT License

//! Error type shared by every layer of the SWD master.

use core::fmt;

/// Outcome of a single SWD transaction.
///
/// This is a trimmed version of the ack space a full ARM debug probe has to
/// handle: there is no parity-error or debug-port-error variant here, since
/// this protocol neither checks the read parity bit nor inspects DP
/// CTRL/STAT after a transaction (see the crate-level docs for why).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdError {
    /// Target responded WAIT. Transient; the extraction loop treats this
    /// the same as any other failure and retries the whole word.
    WaitAck,

    /// Target responded FAULT.
    FaultAck,

    /// Target gave an ack value other than OK/WAIT/FAULT (most commonly
    /// because SWDIO floated high for the whole ack window and no target is
    /// present to drive it low).
    NoAck(u8),

    /// An operation completed at the ack level but its result was not
    /// self-consistent (e.g. a readback that should have matched didn't).
    OperationFailed(&'static str),
}

impl SwdError {
    pub(crate) fn from_ack(ack: u8) -> Result<(), SwdError> {
        match ack {
            0b001 => Ok(()),
            0b010 => Err(SwdError::WaitAck),
            0b100 => Err(SwdError::FaultAck),
            other => Err(SwdError::NoAck(other)),
        }
    }

    /// Returns the raw status code this error corresponds to, for callers
    /// that want to report it (e.g. the console's `!ExtractionFailure`
    /// marker, which reports the last non-OK ack as a 32-bit hex value).
    pub fn status_code(&self) -> u32 {
        match self {
            SwdError::WaitAck => 0b010,
            SwdError::FaultAck => 0b100,
            SwdError::NoAck(ack) => *ack as u32,
            SwdError::OperationFailed(_) => 0b111,
        }
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdError::WaitAck => write!(f, "WAIT ack"),
            SwdError::FaultAck => write!(f, "FAULT ack"),
            SwdError::NoAck(ack) => write!(f, "no ack: {ack:#05b}"),
            SwdError::OperationFailed(msg) => write!(f, "operation failed: {msg}"),
        }
    }
}
