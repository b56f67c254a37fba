//! Line-control parameters of the emulated UART
//!
//! The emulator hands over the same values the guest programs into its
//! serial chip: a baud rate, a handshake bitmask and the USART Control
//! Register. They are decoded here for logging and inspection only; no host
//! terminal attributes are changed.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Handshake selection passed alongside the baud rate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CtrlFlags: u16 {
        /// Software flow control
        const XON_XOFF = 1 << 0;
        /// Hardware flow control
        const RTS_CTS = 1 << 1;
    }
}

bitflags! {
    /// USART Control Register bits.
    ///
    /// Bits 3-4 and 5-6 are two-bit fields; use [`StopBits::from_ucr`] and
    /// [`word_length`] rather than testing them as individual flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Ucr: u16 {
        /// Even parity when set, odd parity when clear
        const EVEN_PARITY = 1 << 1;
        /// Parity enabled
        const PARITY = 1 << 2;
        const STOP_BITS_LO = 1 << 3;
        const STOP_BITS_HI = 1 << 4;
        const WORD_LEN_LO = 1 << 5;
        const WORD_LEN_HI = 1 << 6;
        /// Clock divided by 16 (TC/RC frequency select)
        const CLOCK_DIV16 = 1 << 7;
    }
}

impl Ucr {
    pub const ODD_PARITY: Ucr = Ucr::empty();
    pub const SYNC: Ucr = Ucr::empty();
    pub const ONE_STOP_BIT: Ucr = Ucr::STOP_BITS_LO;
    pub const ONE_AND_HALF_STOP_BITS: Ucr = Ucr::STOP_BITS_HI;
    pub const TWO_STOP_BITS: Ucr = Ucr::STOP_BITS_LO.union(Ucr::STOP_BITS_HI);
    pub const STOP_BITS_MASK: Ucr = Ucr::TWO_STOP_BITS;
    pub const WORD_LEN_MASK: Ucr = Ucr::WORD_LEN_LO.union(Ucr::WORD_LEN_HI);
}

/// Parity mode selected by the UCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Parity {
    pub fn from_ucr(ucr: Ucr) -> Self {
        if !ucr.contains(Ucr::PARITY) {
            Parity::None
        } else if ucr.contains(Ucr::EVEN_PARITY) {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

/// Start/stop bit format selected by the UCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// No start or stop bits (synchronous mode)
    Synchronous,
    One,
    OneAndHalf,
    Two,
}

impl StopBits {
    pub fn from_ucr(ucr: Ucr) -> Self {
        match (ucr & Ucr::STOP_BITS_MASK).bits() >> 3 {
            0 => StopBits::Synchronous,
            1 => StopBits::One,
            2 => StopBits::OneAndHalf,
            _ => StopBits::Two,
        }
    }

    fn label(self) -> &'static str {
        match self {
            StopBits::Synchronous => "sync",
            StopBits::One => "1",
            StopBits::OneAndHalf => "1.5",
            StopBits::Two => "2",
        }
    }
}

/// Data bits per character: field value 0..=3 maps to 8..=5 bits.
pub fn word_length(ucr: Ucr) -> u8 {
    8 - ((ucr & Ucr::WORD_LEN_MASK).bits() >> 5) as u8
}

/// Raw line parameters as supplied by the emulator or the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineParams {
    pub baud: u32,
    pub ctrl: u16,
    pub ucr: u16,
}

impl LineParams {
    /// 9600 baud, no handshake, one stop bit, odd parity.
    pub const DEFAULT: LineParams = LineParams {
        baud: 9600,
        ctrl: 0,
        ucr: Ucr::ONE_STOP_BIT
            .union(Ucr::PARITY)
            .union(Ucr::ODD_PARITY)
            .bits(),
    };

    pub fn decode(&self) -> LineSettings {
        LineSettings::decode(self.baud, self.ctrl, self.ucr)
    }
}

impl Default for LineParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decoded view of a [`LineParams`] triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud: u32,
    pub ctrl: CtrlFlags,
    pub ucr: Ucr,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub word_length: u8,
}

impl LineSettings {
    /// Decode the emulator's parameters. Unknown bits are kept in `ctrl` and
    /// `ucr` but do not affect the decoded fields.
    pub fn decode(baud: u32, ctrl: u16, ucr: u16) -> Self {
        let ctrl = CtrlFlags::from_bits_retain(ctrl);
        let ucr = Ucr::from_bits_retain(ucr);
        Self {
            baud,
            ctrl,
            ucr,
            parity: Parity::from_ucr(ucr),
            stop_bits: StopBits::from_ucr(ucr),
            word_length: word_length(ucr),
        }
    }

    pub fn handshake(&self) -> &'static str {
        match (
            self.ctrl.contains(CtrlFlags::XON_XOFF),
            self.ctrl.contains(CtrlFlags::RTS_CTS),
        ) {
            (false, false) => "none",
            (true, false) => "xon/xoff",
            (false, true) => "rts/cts",
            (true, true) => "xon/xoff+rts/cts",
        }
    }
}

impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{} handshake={}",
            self.baud,
            self.word_length,
            self.parity.letter(),
            self.stop_bits.label(),
            self.handshake()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let settings = LineParams::DEFAULT.decode();
        assert_eq!(settings.baud, 9600);
        assert_eq!(settings.parity, Parity::Odd);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.word_length, 8);
        assert!(settings.ctrl.is_empty());
        assert_eq!(settings.to_string(), "9600 8O1 handshake=none");
    }

    #[test]
    fn test_stop_bit_field() {
        assert_eq!(StopBits::from_ucr(Ucr::SYNC), StopBits::Synchronous);
        assert_eq!(StopBits::from_ucr(Ucr::ONE_STOP_BIT), StopBits::One);
        assert_eq!(
            StopBits::from_ucr(Ucr::ONE_AND_HALF_STOP_BITS),
            StopBits::OneAndHalf
        );
        assert_eq!(StopBits::from_ucr(Ucr::TWO_STOP_BITS), StopBits::Two);
    }

    #[test]
    fn test_word_length_field() {
        assert_eq!(word_length(Ucr::empty()), 8);
        assert_eq!(word_length(Ucr::WORD_LEN_LO), 7);
        assert_eq!(word_length(Ucr::WORD_LEN_HI), 6);
        assert_eq!(word_length(Ucr::WORD_LEN_MASK), 5);
    }

    #[test]
    fn test_parity() {
        assert_eq!(Parity::from_ucr(Ucr::EVEN_PARITY), Parity::None);
        assert_eq!(Parity::from_ucr(Ucr::PARITY), Parity::Odd);
        assert_eq!(
            Parity::from_ucr(Ucr::PARITY | Ucr::EVEN_PARITY),
            Parity::Even
        );
    }

    #[test]
    fn test_handshake_and_unknown_bits() {
        let settings = LineSettings::decode(19200, 0xFF03, 0x017E);
        assert_eq!(settings.ctrl.bits(), 0xFF03);
        assert!(settings.ctrl.contains(CtrlFlags::XON_XOFF | CtrlFlags::RTS_CTS));
        assert_eq!(settings.ucr.bits(), 0x017E);
        assert_eq!(settings.handshake(), "xon/xoff+rts/cts");
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.stop_bits, StopBits::Two);
        assert_eq!(settings.word_length, 5);
        assert_eq!(settings.to_string(), "19200 5E2 handshake=xon/xoff+rts/cts");

        // Unknown bits alone decode like an empty register
        let settings = LineSettings::decode(9600, 0x0100, 0x0100);
        assert_eq!(settings.handshake(), "none");
        assert_eq!(settings.to_string(), "9600 8Nsync handshake=none");
    }
}
