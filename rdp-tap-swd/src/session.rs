// MIT License

//! SWD session layer: DP/AP register operations built on the transaction
//! layer, following the exact sequence of `swd.c`'s `swdInit`/
//! `swdSetAP32BitMode`/`swdSelectAHBAP`/`swdReadAHBAddr`.

use log::debug;

use crate::error::SwdError;
use crate::line::{CycleDelay, SwClkPin, SwdIoPin};
use crate::transaction::{Port, SwdTransaction};

/// DP register address fields (A\[3:2\]), as selected by `DP_SELECT`'s bank
/// and the request header's A\[3:2\] bits.
mod dp {
    pub const IDCODE: u8 = 0b00;
    pub const ABORT: u8 = 0b00;
    pub const CTRL_STAT: u8 = 0b01;
    pub const SELECT: u8 = 0b10;
    pub const RDBUFF: u8 = 0b11;
}

mod ap {
    pub const CSW: u8 = 0b00;
    pub const TAR: u8 = 0b01;
    pub const DRW: u8 = 0b11;
}

const CSW_SIZE_MASK: u32 = 0x0000_0007;
const CSW_SIZE_32BIT: u32 = 0b010;

pub struct SwdSession<IO, CLK, D> {
    transaction: SwdTransaction<IO, CLK, D>,
}

impl<IO, CLK, D> SwdSession<IO, CLK, D>
where
    IO: SwdIoPin,
    CLK: SwClkPin,
    D: CycleDelay,
{
    pub fn new(transaction: SwdTransaction<IO, CLK, D>) -> Self {
        Self { transaction }
    }

    /// Line reset followed by an IDCODE read, confirming the target is
    /// responding to the SWD protocol at all.
    pub fn init(&mut self) -> Result<u32, SwdError> {
        self.transaction.line_reset();
        self.read_idcode()
    }

    pub fn read_idcode(&mut self) -> Result<u32, SwdError> {
        self.transaction.read_packet(Port::Dp, dp::IDCODE)
    }

    /// Write `DP_SELECT`, choosing an AP index and a 4-bit register bank
    /// within it.
    pub fn select_ap_bank(&mut self, ap_index: u8, bank: u8) -> Result<(), SwdError> {
        let value = (u32::from(ap_index) << 24) | u32::from(bank & 0x0F);
        self.transaction.write_packet(Port::Dp, dp::SELECT, value)
    }

    /// Power up the debug domain by writing `DP_CTRL/STAT` with the
    /// CSYSPWRUPREQ/CDBGPWRUPREQ bits set.
    pub fn enable_debug_if(&mut self) -> Result<(), SwdError> {
        self.transaction
            .write_packet(Port::Dp, dp::CTRL_STAT, 0x5000_0000)
    }

    /// Select AHB-AP bank 0, the only AP bank this tool ever addresses.
    pub fn select_ahb_ap(&mut self) -> Result<(), SwdError> {
        self.select_ap_bank(0, 0)
    }

    /// Force AHB-AP's CSW to fixed 32-bit auto-incrementing transfers.
    ///
    /// Mirrors `swdSetAP32BitMode`: select AP0 bank0, read CSW once (an AP
    /// read is pipelined — its result only appears on the *next* AP or DP
    /// read), read it back via `DP_RDBUFF`, clear the size field, force it
    /// to 32-bit, write CSW back, then read AP0/RDBUFF once more to flush
    /// the pipeline before the caller's next real transaction.
    pub fn set_ap_32bit_mode(&mut self) -> Result<(), SwdError> {
        self.select_ap_bank(0, 0)?;
        self.transaction.read_packet(Port::Ap, ap::CSW)?;
        let csw = self.transaction.read_packet(Port::Dp, dp::RDBUFF)?;

        let csw = (csw & !CSW_SIZE_MASK) | CSW_SIZE_32BIT;
        self.transaction.write_packet(Port::Ap, ap::CSW, csw)?;

        self.transaction.read_packet(Port::Ap, ap::CSW)?;
        self.transaction.read_packet(Port::Dp, dp::RDBUFF)?;
        Ok(())
    }

    /// Read one 32-bit word from AHB memory at `addr` through AHB-AP's
    /// TAR/DRW registers.
    ///
    /// AP reads are pipelined: the DRW read posted here only yields its
    /// result once flushed by the subsequent RDBUFF read, matching
    /// `swdReadAHBAddr`.
    pub fn read_ahb(&mut self, addr: u32) -> Result<u32, SwdError> {
        self.transaction.write_packet(Port::Ap, ap::TAR, addr)?;
        self.transaction.read_packet(Port::Ap, ap::DRW)?;
        let data = self.transaction.read_packet(Port::Dp, dp::RDBUFF)?;
        debug!("read_ahb({addr:#010x}) = {data:#010x}");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{CycleDelay, SwClkPin, SwdIoPin, SwdLine};
    use std::collections::VecDeque;

    /// A read_packet() consumes a 3-bit ack followed by a 33-bit data+parity
    /// phase; a write_packet() consumes only the 3-bit ack. Tests queue up
    /// exactly the bits each call will pull, in call order.
    fn ack_bits(ack: u8) -> Vec<bool> {
        (0..3).map(|i| (ack >> i) & 0x01 != 0).collect()
    }

    fn ack_and_data_bits(ack: u8, data: u32) -> Vec<bool> {
        let mut bits = ack_bits(ack);
        bits.extend((0..32).map(|i| (data >> i) & 0x01 != 0));
        bits.push(false); // parity, unchecked
        bits
    }

    struct Harness {
        responses: VecDeque<bool>,
    }

    impl SwdIoPin for Harness {
        fn drive_high(&mut self) {}
        fn drive_low(&mut self) {}
        fn set_output(&mut self) {}
        fn set_input(&mut self) {}
        fn read(&mut self) -> bool {
            self.responses.pop_front().unwrap_or(false)
        }
    }

    struct NoopClk;
    impl SwClkPin for NoopClk {
        fn set_high(&mut self) {}
        fn set_low(&mut self) {}
    }

    struct NoopDelay;
    impl CycleDelay for NoopDelay {
        fn delay_cycles(&mut self, _cycles: u32) {}
    }

    fn session_with(responses: Vec<bool>) -> SwdSession<Harness, NoopClk, NoopDelay> {
        let line = SwdLine::new(
            Harness {
                responses: responses.into(),
            },
            NoopClk,
            NoopDelay,
        );
        SwdSession::new(SwdTransaction::new(line))
    }

    #[test]
    fn read_idcode_decodes_ok_ack_and_data() {
        let responses = ack_and_data_bits(0b001, 0x2BA0_1477);
        let mut session = session_with(responses);
        let idcode = session.read_idcode().expect("ok ack");
        assert_eq!(idcode, 0x2BA0_1477);
    }

    #[test]
    fn read_ahb_round_trips_the_exact_word_at_each_address() {
        for addr in [0x0800_0000u32, 0x0800_0004, 0x0800_FFFC] {
            let word = 0x2BA0_1477u32;
            let mut responses = ack_bits(0b001); // TAR write ack
            responses.extend(ack_and_data_bits(0b001, 0)); // DRW read, pipelined/ignored
            responses.extend(ack_and_data_bits(0b001, word)); // RDBUFF read: the real data
            let mut session = session_with(responses);
            let result = session.read_ahb(addr);
            assert_eq!(result, Ok(word), "addr {addr:#010x}");
        }
    }

    #[test]
    fn read_ahb_propagates_fault_ack() {
        let mut responses = ack_bits(0b001); // TAR write ack
        responses.extend(ack_and_data_bits(0b001, 0)); // DRW read, pipelined/ignored
        responses.extend(ack_and_data_bits(0b100, 0)); // RDBUFF read: FAULT
        let mut session = session_with(responses);
        let result = session.read_ahb(0x0800_0000);
        assert_eq!(result, Err(SwdError::FaultAck));
    }
}
