//! Busy-wait policies
//!
//! The drivers poll hardware flags in a few places: entering and leaving the
//! CAN initialization mode and waiting for the USART transmit register to
//! drain. The policy decides how long to keep polling.

use crate::Error;

/// Decides how long a busy-wait may spin
pub trait WaitPolicy {
    /// Poll `done` until it returns `true`.
    ///
    /// Returns [`Error::TimedOut`] if the policy gives up first.
    fn spin_until<F: FnMut() -> bool>(&self, done: F) -> Result<(), Error>;
}

/// Poll without bound. Hangs forever if the hardware never responds.
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Forever;

impl WaitPolicy for Forever {
    fn spin_until<F: FnMut() -> bool>(&self, mut done: F) -> Result<(), Error> {
        while !done() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

/// Poll at most the contained number of times
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MaxSpins(pub u32);

impl WaitPolicy for MaxSpins {
    fn spin_until<F: FnMut() -> bool>(&self, mut done: F) -> Result<(), Error> {
        for _ in 0..self.0 {
            if done() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        if done() {
            Ok(())
        } else {
            warn!("gave up waiting after {} polls", self.0);
            Err(Error::TimedOut)
        }
    }
}
