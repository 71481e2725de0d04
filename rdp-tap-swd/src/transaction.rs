// MIT License

//! SWD transaction layer: header construction and request/ack/data packets.

use log::trace;

use crate::error::SwdError;
use crate::line::{calculate_parity, CycleDelay, SwClkPin, SwdIoPin, SwdLine};

/// Target register port selected by a request's `APnDP` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Dp,
    Ap,
}

/// Request direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Build an SWD request header byte.
///
/// Bit layout, LSB first on the wire: start(1)=1, APnDP, RnW, A\[2\], A\[3\],
/// parity (even parity over APnDP/RnW/A\[2\]/A\[3\]), stop=0, park=1.
/// `addr_field` is the 2-bit register address (bits 2:3 of the target
/// register's byte offset within its 16-byte bank), i.e. 0..=3.
pub fn build_header(direction: Direction, port: Port, addr_field: u8) -> u8 {
    let mut header: u8 = 0;
    if port == Port::Ap {
        header |= 0x02;
    }
    if direction == Direction::Read {
        header |= 0x04;
    }
    header |= (addr_field & 0x03) << 3;

    let parity = header.count_ones() % 2;
    header |= (parity as u8) << 5;
    header |= 0x01; // start
    header |= 0x80; // park
    header
}

/// SWD transaction engine, layered directly on [`SwdLine`].
pub struct SwdTransaction<IO, CLK, D> {
    line: SwdLine<IO, CLK, D>,
}

impl<IO, CLK, D> SwdTransaction<IO, CLK, D>
where
    IO: SwdIoPin,
    CLK: SwClkPin,
    D: CycleDelay,
{
    pub fn new(line: SwdLine<IO, CLK, D>) -> Self {
        Self { line }
    }

    pub fn line_reset(&mut self) {
        self.line.line_reset();
    }

    /// Issue a read request and return the 32-bit data word.
    ///
    /// The full wire sequence (header, ack, 33 data+parity bits, trailing
    /// turnaround) is always clocked in full regardless of the ack value,
    /// matching the original `swdReadPacket`; only the interpretation of the
    /// ack differs. The read parity bit is not checked.
    pub fn read_packet(&mut self, port: Port, addr_field: u8) -> Result<u32, SwdError> {
        let header = build_header(Direction::Read, port, addr_field);

        self.line.drive_active();
        self.line.send_bits(&[header], 8);
        self.line.drive_idle();
        self.line.turnaround();

        let mut ack_buf = [0u8; 1];
        self.line.read_bits(&mut ack_buf, 3);
        let ack = (ack_buf[0] >> 5) & 0x07;

        let mut resp = [0u8; 5];
        self.line.read_bits(&mut resp, 33);

        self.line.drive_active();
        for _ in 0..3 {
            self.line.turnaround();
        }

        if let Err(e) = SwdError::from_ack(ack) {
            trace!("read_packet({port:?}, {addr_field}): ack error {e}");
            return Err(e);
        }

        // `read_bits` packs back-to-front: resp[4] holds the first 8 bits
        // clocked in (data[0:7], the word's LSB), resp[1] the last full data
        // byte (data[24:31], the word's MSB); resp[0] holds only the unused
        // parity bit.
        let data = u32::from(resp[4])
            | (u32::from(resp[3]) << 8)
            | (u32::from(resp[2]) << 16)
            | (u32::from(resp[1]) << 24);
        trace!("read_packet({port:?}, {addr_field}) = {data:#010x}");
        Ok(data)
    }

    /// Issue a write request carrying `data`.
    pub fn write_packet(&mut self, port: Port, addr_field: u8, data: u32) -> Result<(), SwdError> {
        let header = build_header(Direction::Write, port, addr_field);

        self.line.drive_active();
        self.line.send_bits(&[header], 8);
        self.line.drive_idle();
        self.line.turnaround();

        let mut ack_buf = [0u8; 1];
        self.line.read_bits(&mut ack_buf, 3);
        let ack = (ack_buf[0] >> 5) & 0x07;

        self.line.drive_idle();
        self.line.turnaround();
        self.line.drive_active();

        let parity = calculate_parity(data);
        let mut payload = [
            (data & 0xFF) as u8,
            ((data >> 8) & 0xFF) as u8,
            ((data >> 16) & 0xFF) as u8,
            ((data >> 24) & 0xFF) as u8,
            0u8,
        ];
        if parity {
            payload[4] |= 0x01;
        }
        self.line.send_bits(&payload, 33);

        self.line.drive_active();
        for _ in 0..20 {
            self.line.turnaround();
        }

        let result = SwdError::from_ack(ack);
        if let Err(e) = &result {
            trace!("write_packet({port:?}, {addr_field}, {data:#010x}): ack error {e}");
        }
        result
    }
}
