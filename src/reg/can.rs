//! bxCAN registers
#![allow(missing_docs)]

use super::register;
use bitfield::bitfield;

/// Base address of `CAN1`
pub const CAN1_BASE: usize = 0x4000_6400;

/// Number of transmit mailboxes
pub const TX_MAILBOXES: usize = 3;

/// Number of acceptance filter banks shared between the CAN controllers
pub const FILTER_BANKS: usize = 28;

bitfield! {
    /// Master control register
    #[derive(Copy, Clone)]
    pub struct Mcr(u32);
    impl Debug;
    pub inrq, set_inrq: 0;
    pub sleep, set_sleep: 1;
    pub txfp, set_txfp: 2;
    pub rflm, set_rflm: 3;
    pub nart, set_nart: 4;
    pub awum, set_awum: 5;
    pub abom, set_abom: 6;
    pub ttcm, set_ttcm: 7;
    pub reset, set_reset: 15;
    pub dbf, set_dbf: 16;
}
register!(Mcr, 0x000);

bitfield! {
    /// Master status register
    #[derive(Copy, Clone)]
    pub struct Msr(u32);
    impl Debug;
    pub inak, _: 0;
    pub slak, _: 1;
    pub erri, set_erri: 2;
    pub wkui, set_wkui: 3;
    pub slaki, set_slaki: 4;
    pub txm, _: 8;
    pub rxm, _: 9;
    pub samp, _: 10;
    pub rx, _: 11;
}
register!(Msr, 0x004);

bitfield! {
    /// Transmit status register
    #[derive(Copy, Clone)]
    pub struct Tsr(u32);
    impl Debug;
    pub u8, code, _: 25, 24;
    pub tme0, _: 26;
    pub tme1, _: 27;
    pub tme2, _: 28;
    pub low0, _: 29;
    pub low1, _: 30;
    pub low2, _: 31;
}
register!(Tsr, 0x008);

impl Tsr {
    /// Transmit mailbox `index` is empty
    pub fn mailbox_empty(&self, index: usize) -> bool {
        self.0 & (1 << (26 + index)) != 0
    }

    /// Transmission from mailbox `index` completed successfully
    pub fn transmit_ok(&self, index: usize) -> bool {
        self.0 & (1 << (1 + 8 * index)) != 0
    }

    /// Transmission from mailbox `index` lost arbitration
    pub fn arbitration_lost(&self, index: usize) -> bool {
        self.0 & (1 << (2 + 8 * index)) != 0
    }

    /// Transmission from mailbox `index` failed with an error
    pub fn transmit_error(&self, index: usize) -> bool {
        self.0 & (1 << (3 + 8 * index)) != 0
    }
}

bitfield! {
    /// Receive FIFO register, `RF0R` followed by `RF1R`
    #[derive(Copy, Clone)]
    pub struct Rfr(u32);
    impl Debug;
    pub u8, fmp, _: 1, 0;
    pub full, set_full: 3;
    pub fovr, set_fovr: 4;
    pub rfom, set_rfom: 5;
}
register!(Rfr, 0x00C, 0x4);

bitfield! {
    /// Interrupt enable register
    #[derive(Copy, Clone)]
    pub struct Ier(u32);
    impl Debug;
    pub tmeie, set_tmeie: 0;
    pub fmpie0, set_fmpie0: 1;
    pub ffie0, set_ffie0: 2;
    pub fovie0, set_fovie0: 3;
    pub fmpie1, set_fmpie1: 4;
    pub ffie1, set_ffie1: 5;
    pub fovie1, set_fovie1: 6;
    pub ewgie, set_ewgie: 8;
    pub epvie, set_epvie: 9;
    pub bofie, set_bofie: 10;
    pub lecie, set_lecie: 11;
    pub errie, set_errie: 15;
    pub wkuie, set_wkuie: 16;
    pub slkie, set_slkie: 17;
}
register!(Ier, 0x014);

bitfield! {
    /// Error status register
    #[derive(Copy, Clone)]
    pub struct Esr(u32);
    impl Debug;
    pub ewgf, _: 0;
    pub epvf, _: 1;
    pub boff, _: 2;
    pub u8, lec, set_lec: 6, 4;
    pub u8, tec, _: 23, 16;
    pub u8, rec, _: 31, 24;
}
register!(Esr, 0x018);

bitfield! {
    /// Bit timing register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Btr(u32);
    impl Debug;
    pub u16, brp, set_brp: 9, 0;
    pub u8, ts1, set_ts1: 19, 16;
    pub u8, ts2, set_ts2: 22, 20;
    pub u8, sjw, set_sjw: 25, 24;
    pub lbkm, set_lbkm: 30;
    pub silm, set_silm: 31;
}
register!(Btr, 0x01C);

bitfield! {
    /// Transmit mailbox identifier register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Tir(u32);
    impl Debug;
    pub txrq, set_txrq: 0;
    pub rtr, set_rtr: 1;
    pub ide, set_ide: 2;
    pub u32, exid, set_exid: 31, 3;
    pub u16, stid, set_stid: 31, 21;
}
register!(Tir, 0x180, 0x10);

bitfield! {
    /// Transmit mailbox data length control and time stamp register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Tdtr(u32);
    impl Debug;
    pub u8, dlc, set_dlc: 3, 0;
    pub tgt, set_tgt: 8;
    pub u16, time, _: 31, 16;
}
register!(Tdtr, 0x184, 0x10);

bitfield! {
    /// Transmit mailbox data low register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Tdlr(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}
register!(Tdlr, 0x188, 0x10);

bitfield! {
    /// Transmit mailbox data high register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Tdhr(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}
register!(Tdhr, 0x18C, 0x10);

bitfield! {
    /// Receive FIFO mailbox identifier register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Rir(u32);
    impl Debug;
    pub rtr, set_rtr: 1;
    pub ide, set_ide: 2;
    pub u32, exid, set_exid: 31, 3;
    pub u16, stid, set_stid: 31, 21;
}
register!(Rir, 0x1B0, 0x10);

bitfield! {
    /// Receive FIFO mailbox data length control and time stamp register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Rdtr(u32);
    impl Debug;
    pub u8, dlc, set_dlc: 3, 0;
    pub u8, fmi, set_fmi: 15, 8;
    pub u16, time, set_time: 31, 16;
}
register!(Rdtr, 0x1B4, 0x10);

bitfield! {
    /// Receive FIFO mailbox data low register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Rdlr(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}
register!(Rdlr, 0x1B8, 0x10);

bitfield! {
    /// Receive FIFO mailbox data high register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Rdhr(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}
register!(Rdhr, 0x1BC, 0x10);

bitfield! {
    /// Filter master register
    #[derive(Copy, Clone)]
    pub struct Fmr(u32);
    impl Debug;
    pub finit, set_finit: 0;
    pub u8, can2sb, set_can2sb: 13, 8;
}
register!(Fmr, 0x200);

/// Registers holding one bit per filter bank
macro_rules! bank_bitmap {
    ($(#[$meta:meta])* $name:ident, $offset:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug)]
        pub struct $name(u32);
        register!($name, $offset);

        impl $name {
            /// Bit of filter bank `index`
            pub fn bank(&self, index: usize) -> bool {
                self.0 & (1 << index) != 0
            }

            /// Set the bit of filter bank `index`
            pub fn set_bank(&mut self, index: usize, value: bool) {
                if value {
                    self.0 |= 1 << index;
                } else {
                    self.0 &= !(1 << index);
                }
            }
        }
    };
}

bank_bitmap!(
    /// Filter mode register, set for identifier list mode
    Fm1r,
    0x204
);
bank_bitmap!(
    /// Filter scale register, set for single 32-bit scale
    Fs1r,
    0x20C
);
bank_bitmap!(
    /// Filter FIFO assignment register, set for FIFO1
    Ffa1r,
    0x214
);
bank_bitmap!(
    /// Filter activation register
    Fa1r,
    0x21C
);

bitfield! {
    /// First register of a filter bank
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Fr1(u32);
    impl Debug;
    pub u32, bits, set_bits: 31, 0;
}
register!(Fr1, 0x240, 0x8);

bitfield! {
    /// Second register of a filter bank
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Fr2(u32);
    impl Debug;
    pub u32, bits, set_bits: 31, 0;
}
register!(Fr2, 0x244, 0x8);
