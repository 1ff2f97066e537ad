//! Register access layer
//!
//! Every register is a `bitfield` view over a `u32` implementing [`Register`].
//! Register blocks are reached through an [`AddressSpace`], which makes the
//! drivers independent of whether they talk to real hardware ([`SystemBus`])
//! or to a model of it.

/// Implements [`Register`] and the raw conversions for a bitfield register
macro_rules! register {
    ($name:ident, $offset:expr) => {
        register!($name, $offset, 0);
    };
    ($name:ident, $offset:expr, $stride:expr) => {
        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(register: $name) -> u32 {
                register.0
            }
        }

        impl $crate::reg::Register for $name {
            const OFFSET: usize = $offset;
            const STRIDE: usize = $stride;
        }
    };
}
pub(crate) use register;

pub mod can;
pub mod dma;
pub mod usart;

use vcell::VolatileCell;

/// A 32-bit register at a fixed offset from the start of its block
pub trait Register: Copy + From<u32> + Into<u32> {
    /// Byte offset of the register (or the first register of an array)
    const OFFSET: usize;
    /// Byte distance between consecutive elements of a register array
    const STRIDE: usize = 0;
}

/// Word access to one peripheral's registers
pub trait RegisterBlock {
    /// Load the word at `offset` bytes from the block start
    fn read_raw(&self, offset: usize) -> u32;
    /// Store `value` at `offset` bytes from the block start
    fn write_raw(&self, offset: usize, value: u32);

    /// Read a register
    fn read<R: Register>(&self) -> R {
        self.read_at(0)
    }

    /// Overwrite a register
    fn write<R: Register>(&self, value: R) {
        self.write_at(0, value)
    }

    /// Read-modify-write a register
    fn modify<R: Register, F: FnOnce(&mut R)>(&self, f: F) {
        self.modify_at(0, f)
    }

    /// Read element `index` of a register array
    fn read_at<R: Register>(&self, index: usize) -> R {
        R::from(self.read_raw(R::OFFSET + index * R::STRIDE))
    }

    /// Overwrite element `index` of a register array
    fn write_at<R: Register>(&self, index: usize, value: R) {
        self.write_raw(R::OFFSET + index * R::STRIDE, value.into())
    }

    /// Read-modify-write element `index` of a register array
    fn modify_at<R: Register, F: FnOnce(&mut R)>(&self, index: usize, f: F) {
        let mut value = self.read_at::<R>(index);
        f(&mut value);
        self.write_at(index, value);
    }
}

/// Source of register blocks
pub trait AddressSpace {
    /// Handle to the registers of one peripheral
    type Block: RegisterBlock;

    /// Register block located at `base`
    fn block(&self, base: usize) -> Self::Block;
}

impl<T: AddressSpace + ?Sized> AddressSpace for &T {
    type Block = T::Block;

    fn block(&self, base: usize) -> Self::Block {
        (**self).block(base)
    }
}

/// The memory-mapped peripheral region of the MCU
pub struct SystemBus {
    _private: (),
}

impl SystemBus {
    /// # Safety
    /// The peripheral register blocks handed out by this bus are accessed
    /// without synchronization. The caller must make sure that every driver
    /// built on top of it is the only user of its peripheral, and that the
    /// program runs on an STM32F1 where the addresses are valid.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl AddressSpace for SystemBus {
    type Block = Mmio;

    fn block(&self, base: usize) -> Mmio {
        Mmio { base }
    }
}

/// Registers of one peripheral accessed with volatile loads and stores
#[derive(Copy, Clone)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    fn cell(&self, offset: usize) -> &VolatileCell<u32> {
        // Safety: `Mmio` can only be created by `SystemBus`, whose
        // constructor requires `base` to point at a valid register block.
        unsafe { &*((self.base + offset) as *const VolatileCell<u32>) }
    }
}

impl RegisterBlock for Mmio {
    fn read_raw(&self, offset: usize) -> u32 {
        self.cell(offset).get()
    }

    fn write_raw(&self, offset: usize, value: u32) {
        self.cell(offset).set(value)
    }
}
