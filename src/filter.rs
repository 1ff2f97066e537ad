//! Acceptance filter banks
use crate::reg::can::{Fa1r, Ffa1r, Fm1r, Fmr, Fr1, Fr2, Fs1r, FILTER_BANKS};
use crate::reg::RegisterBlock;
use crate::rx_fifo::Fifo;
use crate::Error;

/// How the two filter registers of a bank are interpreted
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// First register is an identifier, second a mask of bits that must match
    Mask,
    /// Both registers are identifiers that are accepted
    List,
}

/// Width of the identifiers in a filter bank
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scale {
    /// Each register holds two 16-bit filters
    Dual16,
    /// Each register holds one 32-bit filter
    Single32,
}

/// Configuration of one filter bank
///
/// `first` and `second` are written to `FxR1` and `FxR2` verbatim. In 32-bit
/// scale they use the layout of the identifier register (`STID[10:0]`,
/// `EXID[17:0]`, `IDE`, `RTR`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    /// Mask or list mode
    pub mode: Mode,
    /// Filter scale
    pub scale: Scale,
    /// FIFO that receives matching frames
    pub fifo: Fifo,
    /// Whether the bank takes part in filtering
    pub active: bool,
    /// Content of `FxR1`
    pub first: u32,
    /// Content of `FxR2`
    pub second: u32,
}

impl FilterConfig {
    /// Accept every frame into FIFO 0: a 32-bit mask that compares no bits
    pub const fn accept_all() -> Self {
        Self {
            mode: Mode::Mask,
            scale: Scale::Single32,
            fifo: Fifo::Fifo0,
            active: true,
            first: 0,
            second: 0,
        }
    }

    /// Accept frames whose 32-bit identifier register image matches `id` in
    /// every bit set in `mask`
    pub const fn mask32(id: u32, mask: u32, fifo: Fifo) -> Self {
        Self {
            mode: Mode::Mask,
            scale: Scale::Single32,
            fifo,
            active: true,
            first: id,
            second: mask,
        }
    }

    /// A bank that takes no part in filtering
    pub const fn inactive() -> Self {
        Self {
            active: false,
            ..Self::accept_all()
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::accept_all()
    }
}

/// Program filter bank `bank`.
///
/// The bank is deactivated while its registers change and the filters are
/// held in initialization mode (`FMR.FINIT`) throughout.
pub(crate) fn apply<R: RegisterBlock>(
    regs: &R,
    bank: usize,
    config: &FilterConfig,
) -> Result<(), Error> {
    if bank >= FILTER_BANKS {
        return Err(Error::ArgumentOutOfDomain);
    }

    regs.modify::<Fmr, _>(|fmr| fmr.set_finit(true));
    regs.modify::<Fa1r, _>(|fa1r| fa1r.set_bank(bank, false));
    regs.modify::<Fs1r, _>(|fs1r| fs1r.set_bank(bank, config.scale == Scale::Single32));
    regs.write_at(bank, Fr1::from(config.first));
    regs.write_at(bank, Fr2::from(config.second));
    regs.modify::<Fm1r, _>(|fm1r| fm1r.set_bank(bank, config.mode == Mode::List));
    regs.modify::<Ffa1r, _>(|ffa1r| ffa1r.set_bank(bank, config.fifo == Fifo::Fifo1));
    regs.modify::<Fa1r, _>(|fa1r| fa1r.set_bank(bank, config.active));
    regs.modify::<Fmr, _>(|fmr| fmr.set_finit(false));

    debug!("filter bank {} set to {}", bank, config);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reg::can::CAN1_BASE;
    use crate::reg::AddressSpace;
    use crate::testing::FakeBus;

    const FMR: usize = CAN1_BASE + 0x200;
    const FM1R: usize = CAN1_BASE + 0x204;
    const FS1R: usize = CAN1_BASE + 0x20C;
    const FFA1R: usize = CAN1_BASE + 0x214;
    const FA1R: usize = CAN1_BASE + 0x21C;

    #[test]
    fn accept_all_on_bank_zero() {
        let bus = FakeBus::new();
        let regs = bus.block(CAN1_BASE);
        bus.set(CAN1_BASE + 0x240, 0xFFFF_FFFF);
        bus.set(FFA1R, 0b1);

        apply(&regs, 0, &FilterConfig::accept_all()).unwrap();

        assert_eq!(bus.get(FM1R) & 1, 0);
        assert_eq!(bus.get(FS1R) & 1, 1);
        assert_eq!(bus.get(FFA1R) & 1, 0);
        assert_eq!(bus.get(FA1R) & 1, 1);
        assert_eq!(bus.get(CAN1_BASE + 0x240), 0);
        assert_eq!(bus.get(CAN1_BASE + 0x244), 0);
        assert_eq!(bus.get(FMR) & 1, 0);
    }

    #[test]
    fn registers_change_only_inside_filter_init() {
        let bus = FakeBus::new();
        let regs = bus.block(CAN1_BASE);
        let mark = bus.write_count();

        let config = FilterConfig {
            mode: Mode::List,
            scale: Scale::Dual16,
            fifo: Fifo::Fifo1,
            active: true,
            first: 0x1234,
            second: 0x5678,
        };
        apply(&regs, 27, &config).unwrap();

        let writes = bus.writes_since(mark);
        assert_eq!(writes.first(), Some(&(FMR, 1)));
        assert_eq!(writes.last(), Some(&(FMR, 0)));
        assert_eq!(bus.get(CAN1_BASE + 0x240 + 27 * 8), 0x1234);
        assert_eq!(bus.get(CAN1_BASE + 0x244 + 27 * 8), 0x5678);
        assert_eq!(bus.get(FM1R), 1 << 27);
        assert_eq!(bus.get(FS1R), 0);
        assert_eq!(bus.get(FFA1R), 1 << 27);
        assert_eq!(bus.get(FA1R), 1 << 27);
    }

    #[test]
    fn bank_index_is_checked() {
        let bus = FakeBus::new();
        let regs = bus.block(CAN1_BASE);
        let mark = bus.write_count();
        assert_eq!(
            apply(&regs, 28, &FilterConfig::accept_all()),
            Err(Error::ArgumentOutOfDomain)
        );
        assert!(bus.writes_since(mark).is_empty());
    }
}
