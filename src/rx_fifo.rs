//! Receive FIFOs

use crate::message::Message;
use crate::reg::can::{Rdhr, Rdlr, Rdtr, Rfr, Rir};
use crate::reg::RegisterBlock;

/// One of the two receive FIFOs
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fifo {
    /// FIFO 0, drained first
    Fifo0 = 0,
    /// FIFO 1
    Fifo1 = 1,
}

impl Fifo {
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Fill state of a receive FIFO
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FifoStatus {
    /// Number of frames waiting, up to 3
    pub pending: u8,
    /// All three slots are occupied
    pub full: bool,
    /// A frame arrived while the FIFO was full and was lost
    pub overrun: bool,
}

/// Both receive FIFOs of a controller
pub(crate) struct RxFifos<'a, R> {
    regs: &'a R,
}

impl<'a, R: RegisterBlock> RxFifos<'a, R> {
    pub fn new(regs: &'a R) -> Self {
        Self { regs }
    }

    /// First FIFO holding a frame, FIFO 0 taking precedence
    pub fn pending(&self) -> Option<Fifo> {
        [Fifo::Fifo0, Fifo::Fifo1]
            .into_iter()
            .find(|fifo| self.regs.read_at::<Rfr>(fifo.index()).fmp() != 0)
    }

    pub fn status(&self, fifo: Fifo) -> FifoStatus {
        let rfr = self.regs.read_at::<Rfr>(fifo.index());
        FifoStatus {
            pending: rfr.fmp(),
            full: rfr.full(),
            overrun: rfr.fovr(),
        }
    }

    /// Decode the frame at the output of `fifo` and hand its slot back to
    /// the hardware
    pub fn pop(&self, fifo: Fifo) -> Message {
        let index = fifo.index();
        let message = Message::decode(
            self.regs.read_at::<Rir>(index),
            self.regs.read_at::<Rdtr>(index),
            self.regs.read_at::<Rdlr>(index),
            self.regs.read_at::<Rdhr>(index),
        );
        // Only RFOM is written; FULL and FOVR clear on writing one
        let mut release = Rfr::from(0);
        release.set_rfom(true);
        self.regs.write_at(index, release);
        message
    }

    /// Pop the next frame, if any
    pub fn receive(&self) -> Option<Message> {
        self.pending().map(|fifo| self.pop(fifo))
    }
}
