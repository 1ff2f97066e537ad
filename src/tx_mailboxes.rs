//! Transmit mailboxes

use crate::message::Message;
use crate::reg::can::{Tdtr, Tsr, TX_MAILBOXES};
use crate::reg::RegisterBlock;
use crate::Error;

/// Outcome of the last transmission from a mailbox
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxStatus {
    /// The mailbox is free for a new frame
    pub empty: bool,
    /// The last frame was acknowledged
    pub transmitted: bool,
    /// The last frame lost arbitration
    pub arbitration_lost: bool,
    /// The last frame failed with a bus error
    pub error: bool,
}

/// The three transmit mailboxes of a controller
pub(crate) struct TxMailboxes<'a, R> {
    regs: &'a R,
}

impl<'a, R: RegisterBlock> TxMailboxes<'a, R> {
    pub fn new(regs: &'a R) -> Self {
        Self { regs }
    }

    /// Lowest numbered empty mailbox
    pub fn free(&self) -> Option<usize> {
        let tsr = self.regs.read::<Tsr>();
        (0..TX_MAILBOXES).find(|&index| tsr.mailbox_empty(index))
    }

    pub fn status(&self, index: usize) -> MailboxStatus {
        let tsr = self.regs.read::<Tsr>();
        MailboxStatus {
            empty: tsr.mailbox_empty(index),
            transmitted: tsr.transmit_ok(index),
            arbitration_lost: tsr.arbitration_lost(index),
            error: tsr.transmit_error(index),
        }
    }

    /// Load `message` into the first empty mailbox and request its
    /// transmission. Returns the mailbox used.
    ///
    /// Nothing is written if all mailboxes are pending.
    pub fn transmit(&self, message: &Message) -> Result<usize, Error> {
        let index = self.free().ok_or(Error::ResourceUnavailableTryAgain)?;
        let mailbox = message.encode();
        self.regs
            .modify_at::<Tdtr, _>(index, |tdtr| tdtr.set_dlc(mailbox.length));
        self.regs.write_at(index, mailbox.low);
        self.regs.write_at(index, mailbox.high);
        // Writing TXRQ hands the mailbox to the hardware, so it goes last
        self.regs.write_at(index, mailbox.identifier);
        trace!("frame {=u32:#x} queued in mailbox {}", message.id, index);
        Ok(index)
    }
}
