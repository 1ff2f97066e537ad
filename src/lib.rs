#![no_std]
#![warn(missing_docs)]
//! # f1periph
//!
//! ## Overview
//! This crate provides drivers for two peripherals of the STM32F1 family:
//!
//! - the bxCAN controller (`CAN1`): classical CAN frames with standard and
//!   extended identifiers, three transmit mailboxes, two receive FIFOs,
//!   acceptance filter banks, bus-off recovery, loop-back self test and
//!   interrupt driven reception
//! - the USART ports 1 to 3, transmitting by polling and receiving into a
//!   circular buffer filled by a `DMA1` channel
//!
//! The drivers own their register blocks but nothing around them. Clock
//! frequencies, peripheral clock gating, pin multiplexing, interrupt vector
//! installation and the CAN bit timing calculation are provided by the
//! platform through the traits of [`f1periph_core`].
//!
//! Register access goes through [`reg::AddressSpace`]. On the target this is
//! [`reg::SystemBus`], a thin wrapper around volatile loads and stores to the
//! memory-mapped peripherals.
//!
//! ## CAN usage example
//!
//! ```no_run
//! # use f1periph::prelude::*;
//! # use f1periph::bus::Can;
//! # use f1periph::config::CanSettings;
//! # use f1periph::message::Message;
//! # use f1periph::reg::SystemBus;
//! # use f1periph_core::{CanPins, Platform, BitTimingResolver};
//! # fn doc<P: Platform + 'static, R: BitTimingResolver + 'static>(
//! #     platform: P,
//! #     resolver: R,
//! #     slot: &'static mut Option<Can<SystemBus, P, R>>,
//! # ) -> Result<(), f1periph::Error> {
//! // SAFETY: nothing else accesses the peripherals
//! let bus = unsafe { SystemBus::new() };
//! let can: &'static Can<SystemBus, P, R> = slot.insert(Can::new(
//!     CanSettings::default(),
//!     CanPins::Pb8Pb9,
//!     platform,
//!     resolver,
//!     bus,
//! )?);
//!
//! // `can` has to be `'static` for the interrupt handler to reach it
//! static ON_FRAME: fn(&Message) = |message| {
//!     let _ = message.payload();
//! };
//! can.on_receive(&ON_FRAME);
//! can.send(&Message::new(0x123, &[1, 2, 3])?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Serial usage example
//!
//! ```no_run
//! # use f1periph::config::SerialSettings;
//! # use f1periph::reg::SystemBus;
//! # use f1periph::serial::Serial;
//! # use f1periph_core::Platform;
//! # fn doc<P: Platform>(
//! #     platform: P,
//! #     buffer: &'static mut [u8],
//! # ) -> Result<(), f1periph::Error> {
//! // SAFETY: nothing else accesses the peripherals
//! let bus = unsafe { SystemBus::new() };
//! let mut serial = Serial::new(1, buffer, SerialSettings::default(), platform, bus)?;
//! serial.write(b"hello\n")?;
//!
//! let mut received = [0; 16];
//! let status = serial.read(&mut received);
//! let _ = &received[..status.copied];
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
extern crate std;

pub use embedded_can;
pub use f1periph_core;
pub use fugit;

#[macro_use]
mod fmt;

pub mod bus;
pub mod config;
pub mod filter;
pub mod interrupt;
pub mod message;
pub mod prelude;
pub mod reg;
pub mod rx_fifo;
pub mod serial;
pub mod tx_mailboxes;
pub mod wait;

#[cfg(test)]
mod testing;

/// Errors reported by the drivers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The requested configuration cannot be realized by the hardware, e.g.
    /// an unknown serial port, a receive buffer of unsupported size or a bit
    /// timing that does not fit the timing register.
    OperationNotSupported,
    /// The operation is not allowed in the current state of the peripheral.
    /// Reported when sending while the CAN controller is bus-off.
    OperationNotPermitted,
    /// The hardware has no free resource right now. Reported when all
    /// transmit mailboxes are pending.
    ResourceUnavailableTryAgain,
    /// An argument is outside of the range the hardware accepts
    ArgumentOutOfDomain,
    /// A bounded [`wait::WaitPolicy`] gave up waiting for the hardware
    TimedOut,
}

impl From<f1periph_core::InvalidPinSelect> for Error {
    fn from(_: f1periph_core::InvalidPinSelect) -> Self {
        Error::ArgumentOutOfDomain
    }
}

impl embedded_can::Error for Error {
    fn kind(&self) -> embedded_can::ErrorKind {
        embedded_can::ErrorKind::Other
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::OperationNotSupported => "operation not supported",
            Error::OperationNotPermitted => "operation not permitted",
            Error::ResourceUnavailableTryAgain => "resource unavailable, try again",
            Error::ArgumentOutOfDomain => "argument out of domain",
            Error::TimedOut => "timed out",
        };
        f.write_str(text)
    }
}
