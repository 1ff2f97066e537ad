//! Driver settings and the numeric conversions into register fields

use crate::reg::can::Btr;
use crate::Error;
use f1periph_core::TimingSegments;
use fugit::HertzU32;

/// CAN controller settings
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanSettings {
    /// Nominal bit rate of the bus
    pub baud_rate: HertzU32,
}

impl CanSettings {
    /// Create an instance
    pub const fn new(baud_rate: HertzU32) -> Self {
        Self { baud_rate }
    }
}

impl Default for CanSettings {
    fn default() -> Self {
        Self::new(HertzU32::from_raw(100_000))
    }
}

/// Number of data bits per character
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    /// 8 data bits
    #[default]
    Eight,
    /// 9 data bits
    Nine,
}

/// Parity bit generation and checking
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Number of stop bits
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 2 stop bits
    Two,
}

impl StopBits {
    /// Value of the `USART_CR2.STOP` field
    pub(crate) fn field(self) -> u8 {
        match self {
            StopBits::One => 0b00,
            StopBits::Two => 0b10,
        }
    }
}

/// Serial port settings
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialSettings {
    /// Bit rate
    pub baud_rate: HertzU32,
    /// Data bits per character
    pub word_length: WordLength,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits per character
    pub stop_bits: StopBits,
}

impl SerialSettings {
    /// 8N1 at `baud_rate`
    pub const fn new(baud_rate: HertzU32) -> Self {
        Self {
            baud_rate,
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::new(HertzU32::from_raw(115_200))
    }
}

const BRP_MAX: u32 = 0x3FF;
const SJW_MAX: u32 = 0b11;
const TS1_MAX: u32 = 0xF;
const TS2_MAX: u32 = 0b111;

/// Encode `segments` into the `CAN_BTR` fields.
///
/// Every field holds its value minus one. Phase segment 1 absorbs the
/// propagation delay. Time quanta that do not fit phase segment 2 are moved
/// over to segment 1, which saturates at its field maximum.
pub(crate) fn bit_timing(segments: &TimingSegments) -> Result<Btr, Error> {
    let TimingSegments {
        prescaler,
        sync_jump_width,
        phase_segment1,
        phase_segment2,
        propagation_delay,
    } = *segments;

    if prescaler == 0
        || prescaler - 1 > BRP_MAX
        || sync_jump_width == 0
        || sync_jump_width - 1 > SJW_MAX
        || phase_segment1 + propagation_delay == 0
        || phase_segment2 == 0
    {
        return Err(Error::OperationNotSupported);
    }

    let mut ts1 = phase_segment1 + propagation_delay - 1;
    let mut ts2 = phase_segment2 - 1;
    if ts2 > TS2_MAX {
        ts1 += ts2 - TS2_MAX;
        ts2 = TS2_MAX;
    }
    let ts1 = ts1.min(TS1_MAX);

    let mut btr = Btr::from(0);
    btr.set_brp((prescaler - 1) as u16);
    btr.set_sjw((sync_jump_width - 1) as u8);
    btr.set_ts1(ts1 as u8);
    btr.set_ts2(ts2 as u8);
    Ok(btr)
}

/// Split `clock / (16 * baud_rate)` into the `USART_BRR` mantissa and its
/// fraction in sixteenths, rounded to the nearest sixteenth.
pub(crate) fn baud_divider(clock: HertzU32, baud_rate: HertzU32) -> (u16, u8) {
    let clock = clock.raw() as u64;
    let denominator = 16 * (baud_rate.raw().max(1) as u64);
    let mut mantissa = clock / denominator;
    let remainder = clock % denominator;
    let mut fraction = (remainder * 16 + denominator / 2) / denominator;
    if fraction >= 16 {
        mantissa += 1;
        fraction = 0;
    }
    (mantissa.min(0xFFF) as u16, fraction as u8)
}

#[cfg(test)]
mod test {
    use super::*;
    use fugit::RateExtU32;

    fn segments(prescaler: u32, sjw: u32, ps1: u32, ps2: u32, prop: u32) -> TimingSegments {
        TimingSegments {
            prescaler,
            sync_jump_width: sjw,
            phase_segment1: ps1,
            phase_segment2: ps2,
            propagation_delay: prop,
        }
    }

    #[test]
    fn bit_timing_stores_values_minus_one() {
        let btr = bit_timing(&segments(4, 1, 8, 2, 1)).unwrap();
        assert_eq!(btr.brp(), 3);
        assert_eq!(btr.sjw(), 0);
        assert_eq!(btr.ts1(), 8);
        assert_eq!(btr.ts2(), 1);
        assert!(!btr.lbkm());
        assert!(!btr.silm());
    }

    #[test]
    fn segment2_overflow_moves_into_segment1() {
        // ts2 = 9 - 1 = 8, one quantum over the 3-bit field
        let btr = bit_timing(&segments(1, 1, 4, 9, 1)).unwrap();
        assert_eq!(btr.ts2(), 7);
        assert_eq!(btr.ts1(), 5);
    }

    #[test]
    fn segment1_saturates() {
        let btr = bit_timing(&segments(1, 1, 14, 12, 2)).unwrap();
        assert_eq!(btr.ts2(), 7);
        assert_eq!(btr.ts1(), 15);
    }

    #[test]
    fn infeasible_timing_is_not_supported() {
        let unsupported = Err(Error::OperationNotSupported);
        assert_eq!(bit_timing(&segments(0, 1, 8, 2, 1)), unsupported);
        assert_eq!(bit_timing(&segments(1025, 1, 8, 2, 1)), unsupported);
        assert_eq!(bit_timing(&segments(4, 5, 8, 2, 1)), unsupported);
        assert_eq!(bit_timing(&segments(4, 0, 8, 2, 1)), unsupported);
        assert_eq!(bit_timing(&segments(4, 1, 0, 2, 0)), unsupported);
        assert_eq!(bit_timing(&segments(4, 1, 8, 0, 1)), unsupported);
        assert!(bit_timing(&segments(1024, 4, 8, 2, 1)).is_ok());
    }

    #[test]
    fn baud_divider_72mhz_115200() {
        let (mantissa, fraction) = baud_divider(72.MHz(), 115_200.Hz());
        assert_eq!((mantissa, fraction), (39, 1));
        let exact = 72e6 / (16.0 * 115_200.0);
        let programmed = mantissa as f64 + fraction as f64 / 16.0;
        assert!((programmed - exact).abs() <= 1.0 / 16.0);
    }

    #[test]
    fn baud_divider_exact_and_carry() {
        assert_eq!(baud_divider(36.MHz(), 9600.Hz()), (234, 6));
        // 16.995 leaves a fraction that rounds to 16 sixteenths and carries
        assert_eq!(baud_divider(8_000_000.Hz(), 29_420.Hz()), (17, 0));
    }

    #[test]
    fn serial_defaults_to_8n1() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, HertzU32::from_raw(115_200));
        assert_eq!(settings.word_length, WordLength::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(CanSettings::default().baud_rate, HertzU32::from_raw(100_000));
    }
}
