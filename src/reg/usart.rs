//! USART registers
#![allow(missing_docs)]

use super::register;
use bitfield::bitfield;

/// Base address of `USART1`
pub const USART1_BASE: usize = 0x4001_3800;
/// Base address of `USART2`
pub const USART2_BASE: usize = 0x4000_4400;
/// Base address of `USART3`
pub const USART3_BASE: usize = 0x4000_4800;

bitfield! {
    /// Status register
    #[derive(Copy, Clone)]
    pub struct Sr(u32);
    impl Debug;
    pub pe, _: 0;
    pub fe, _: 1;
    pub ne, _: 2;
    pub ore, _: 3;
    pub idle, _: 4;
    pub rxne, set_rxne: 5;
    pub tc, set_tc: 6;
    pub txe, _: 7;
}
register!(Sr, 0x00);

bitfield! {
    /// Data register
    #[derive(Copy, Clone)]
    pub struct Dr(u32);
    impl Debug;
    pub u16, dr, set_dr: 8, 0;
}
register!(Dr, 0x04);

bitfield! {
    /// Baud rate register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Brr(u32);
    impl Debug;
    pub u8, fraction, set_fraction: 3, 0;
    pub u16, mantissa, set_mantissa: 15, 4;
}
register!(Brr, 0x08);

bitfield! {
    /// Control register 1
    #[derive(Copy, Clone)]
    pub struct Cr1(u32);
    impl Debug;
    pub sbk, set_sbk: 0;
    pub rwu, set_rwu: 1;
    pub re, set_re: 2;
    pub te, set_te: 3;
    pub idleie, set_idleie: 4;
    pub rxneie, set_rxneie: 5;
    pub tcie, set_tcie: 6;
    pub txeie, set_txeie: 7;
    pub peie, set_peie: 8;
    pub ps, set_ps: 9;
    pub pce, set_pce: 10;
    pub wake, set_wake: 11;
    pub m, set_m: 12;
    pub ue, set_ue: 13;
}
register!(Cr1, 0x0C);

bitfield! {
    /// Control register 2
    #[derive(Copy, Clone)]
    pub struct Cr2(u32);
    impl Debug;
    pub u8, stop, set_stop: 13, 12;
    pub linen, set_linen: 14;
}
register!(Cr2, 0x10);

bitfield! {
    /// Control register 3
    #[derive(Copy, Clone)]
    pub struct Cr3(u32);
    impl Debug;
    pub eie, set_eie: 0;
    pub hdsel, set_hdsel: 3;
    pub dmar, set_dmar: 6;
    pub dmat, set_dmat: 7;
    pub rtse, set_rtse: 8;
    pub ctse, set_ctse: 9;
}
register!(Cr3, 0x14);
