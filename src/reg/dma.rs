//! DMA controller registers
#![allow(missing_docs)]

use super::register;
use bitfield::bitfield;

/// Base address of `DMA1`
pub const DMA1_BASE: usize = 0x4002_0000;

bitfield! {
    /// Channel configuration register, `CCR1` to `CCR7`
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Ccr(u32);
    impl Debug;
    pub en, set_en: 0;
    pub tcie, set_tcie: 1;
    pub htie, set_htie: 2;
    pub teie, set_teie: 3;
    /// Set to read from memory
    pub dir, set_dir: 4;
    pub circ, set_circ: 5;
    pub pinc, set_pinc: 6;
    pub minc, set_minc: 7;
    pub u8, psize, set_psize: 9, 8;
    pub u8, msize, set_msize: 11, 10;
    pub u8, pl, set_pl: 13, 12;
    pub mem2mem, set_mem2mem: 14;
}
register!(Ccr, 0x08, 0x14);

bitfield! {
    /// Channel number of data register, counts down the remaining transfers
    #[derive(Copy, Clone)]
    pub struct Cndtr(u32);
    impl Debug;
    pub u16, ndt, set_ndt: 15, 0;
}
register!(Cndtr, 0x0C, 0x14);

bitfield! {
    /// Channel peripheral address register
    #[derive(Copy, Clone)]
    pub struct Cpar(u32);
    impl Debug;
    pub u32, pa, set_pa: 31, 0;
}
register!(Cpar, 0x10, 0x14);

bitfield! {
    /// Channel memory address register
    #[derive(Copy, Clone)]
    pub struct Cmar(u32);
    impl Debug;
    pub u32, ma, set_ma: 31, 0;
}
register!(Cmar, 0x14, 0x14);

/// Transfer width of a DMA channel side
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferSize {
    Bits8 = 0b00,
    Bits16 = 0b01,
    Bits32 = 0b10,
}

/// Arbitration priority of a DMA channel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}
