// MIT License

//! Command console: line discipline, command dispatch and output encoders.
//!
//! Parsing never touches the serial port directly — [`Console::process_byte`]
//! returns a [`ConsoleEvent`] describing what happened, and the top-level
//! loop decides how to render it. This keeps the parser testable without a
//! live serial mock, the same separation the SWD layers keep between
//! deciding an outcome and a caller acting on it.

use crate::config::ReadoutConfig;

/// Usable line length: 12 bytes in the original firmware's buffer, one of
/// which is implicitly reserved as the terminator.
pub const LINE_BUFFER_CAP: usize = 11;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Nothing to report (no delimiter yet, or a no-op byte/command).
    None,
    /// Echo a fixed string verbatim.
    Echo(&'static str),
    /// Echo `prefix` followed by `value` as big-endian hex and `"\r\n"`.
    EchoHex32 { prefix: &'static str, value: u32 },
    /// Render the current extraction statistics (the console doesn't own
    /// them, so the caller fills in the values).
    PrintStats,
    /// `s`/`S` was received. `reset_stats` is true the first time a run is
    /// activated (config wasn't already active).
    Start { reset_stats: bool },
    /// Unrecognised command byte.
    Error,
}

#[derive(Default)]
struct LineBuffer {
    buf: [u8; LINE_BUFFER_CAP],
    len: usize,
}

impl LineBuffer {
    fn push(&mut self, byte: u8) {
        if self.len < LINE_BUFFER_CAP {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }

    fn clear(&mut self) {
        self.buf = [0; LINE_BUFFER_CAP];
        self.len = 0;
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

#[derive(Default)]
pub struct Console {
    line: LineBuffer,
}

fn hex_digit(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some(u32::from(c - b'0')),
        b'a'..=b'f' => Some(u32::from(c - b'a') + 0x0A),
        b'A'..=b'F' => Some(u32::from(c - b'A') + 0x0A),
        _ => None,
    }
}

/// Parse leading hex digits of `bytes`, stopping at the first non-hex byte.
/// Digits shift into the accumulator MSB-first in input order.
fn parse_hex(bytes: &[u8]) -> u32 {
    let mut value = 0u32;
    for &c in bytes {
        match hex_digit(c) {
            Some(d) => value = (value << 4) | d,
            None => break,
        }
    }
    value
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received byte. `\t` is ignored; `\r`/`\n` dispatch the
    /// accumulated line and clear the buffer; anything else is appended
    /// (silently dropped once the buffer is full).
    pub fn process_byte(&mut self, byte: u8, cfg: &mut ReadoutConfig) -> ConsoleEvent {
        match byte {
            b'\t' => ConsoleEvent::None,
            b'\r' | b'\n' => {
                let event = self.dispatch(cfg);
                self.line.clear();
                event
            }
            _ => {
                self.line.push(byte);
                ConsoleEvent::None
            }
        }
    }

    fn dispatch(&self, cfg: &mut ReadoutConfig) -> ConsoleEvent {
        let cmd = self.line.as_slice();
        let Some(&first) = cmd.first() else {
            return ConsoleEvent::None;
        };

        match first {
            b'a' | b'A' => {
                cfg.set_base_address(parse_hex(&cmd[1..]));
                ConsoleEvent::EchoHex32 {
                    prefix: "Start address set to 0x",
                    value: cfg.base_address,
                }
            }
            b'l' | b'L' => {
                cfg.set_length(parse_hex(&cmd[1..]));
                ConsoleEvent::EchoHex32 {
                    prefix: "Readout length set to 0x",
                    value: cfg.length,
                }
            }
            b'b' | b'B' => {
                cfg.hex_output = false;
                ConsoleEvent::Echo("Binary output mode selected\r\n")
            }
            b'h' | b'H' => {
                cfg.hex_output = true;
                ConsoleEvent::Echo("Hex output mode selected\r\n")
            }
            b'e' => {
                cfg.little_endian = true;
                ConsoleEvent::Echo("Little Endian mode enabled\r\n")
            }
            b'E' => {
                cfg.little_endian = false;
                ConsoleEvent::Echo("Big Endian mode enabled\r\n")
            }
            b'p' | b'P' => ConsoleEvent::PrintStats,
            b's' | b'S' => {
                let reset_stats = !cfg.active;
                cfg.active = true;
                ConsoleEvent::Start { reset_stats }
            }
            b'\r' | b'\n' | 0x00 => ConsoleEvent::None,
            _ => ConsoleEvent::Error,
        }
    }
}

pub fn word_bin_le(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

pub fn word_bin_be(word: u32) -> [u8; 4] {
    word.to_be_bytes()
}

fn hex_encode(bytes: [u8; 4]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, b) in bytes.iter().enumerate() {
        out[i * 2] = HEX_DIGITS[(b >> 4) as usize];
        out[i * 2 + 1] = HEX_DIGITS[(b & 0x0F) as usize];
    }
    out
}

pub fn word_hex_le(word: u32) -> [u8; 8] {
    hex_encode(word.to_le_bytes())
}

pub fn word_hex_be(word: u32) -> [u8; 8] {
    hex_encode(word.to_be_bytes())
}

pub fn word_bin(word: u32, cfg: &ReadoutConfig) -> [u8; 4] {
    if cfg.little_endian {
        word_bin_le(word)
    } else {
        word_bin_be(word)
    }
}

pub fn word_hex(word: u32, cfg: &ReadoutConfig) -> [u8; 8] {
    if cfg.little_endian {
        word_hex_le(word)
    } else {
        word_hex_be(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(console: &mut Console, cfg: &mut ReadoutConfig, line: &str) -> ConsoleEvent {
        let mut last = ConsoleEvent::None;
        for b in line.bytes() {
            last = console.process_byte(b, cfg);
        }
        last
    }

    #[test]
    fn address_command_rounds_down_and_echoes() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        let event = feed(&mut console, &mut cfg, "a08000003\r");
        assert_eq!(cfg.base_address, 0x0800_0000);
        assert_eq!(
            event,
            ConsoleEvent::EchoHex32 {
                prefix: "Start address set to 0x",
                value: 0x0800_0000
            }
        );
    }

    #[test]
    fn length_command_rounds_up() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        feed(&mut console, &mut cfg, "l1\r");
        assert_eq!(cfg.length, 0x0000_0004);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        let event = feed(&mut console, &mut cfg, "z\r");
        assert_eq!(event, ConsoleEvent::Error);
    }

    #[test]
    fn start_flags_stats_reset_only_on_first_activation() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        let first = feed(&mut console, &mut cfg, "s\r");
        assert_eq!(first, ConsoleEvent::Start { reset_stats: true });
        let second = feed(&mut console, &mut cfg, "s\r");
        assert_eq!(second, ConsoleEvent::Start { reset_stats: false });
    }

    #[test]
    fn case_sensitive_endian_commands() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        feed(&mut console, &mut cfg, "E\r");
        assert!(!cfg.little_endian);
        feed(&mut console, &mut cfg, "e\r");
        assert!(cfg.little_endian);
    }

    #[test]
    fn overlong_line_dispatches_on_first_eleven_bytes() {
        let mut console = Console::new();
        let mut cfg = ReadoutConfig::default();
        // 'a' plus 29 more bytes, all '1': 30 bytes total, no delimiter.
        let line: [u8; 30] = [b'1'; 30];
        let mut line = line;
        line[0] = b'a';
        for &b in &line {
            let event = console.process_byte(b, &mut cfg);
            assert_eq!(event, ConsoleEvent::None);
        }
        // Only the first 11 bytes ('a' + ten '1' digits) were kept; the
        // trailing 19 were silently dropped before the delimiter arrived.
        let event = console.process_byte(b'\r', &mut cfg);
        assert_eq!(
            event,
            ConsoleEvent::EchoHex32 {
                prefix: "Start address set to 0x",
                value: 0x1111_1110,
            }
        );
    }

    #[test]
    fn output_encoding_vectors_for_deadbeef() {
        let word = 0xDEAD_BEEFu32;
        assert_eq!(&word_hex_le(word), b"EFBEADDE");
        assert_eq!(&word_hex_be(word), b"DEADBEEF");
        assert_eq!(word_bin_le(word), [0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(word_bin_be(word), [0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
