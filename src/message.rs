//! Handling of messages/frames

use crate::reg::can::{Rdhr, Rdlr, Rdtr, Rir, Tdhr, Tdlr, Tir};
use crate::Error;
use core::cmp::min;
use embedded_can::{ExtendedId, Frame, Id, StandardId};

/// Identifiers from this value upwards are sent in the extended format
pub const EXTENDED_ID_START: u32 = 1 << 11;

/// Largest identifier representable in the extended format
pub const EXTENDED_ID_MAX: u32 = (1 << 29) - 1;

/// Maximum number of data bytes in a classic CAN frame
pub const MAX_PAYLOAD: usize = 8;

/// Classic CAN frame
///
/// Identifiers below [`EXTENDED_ID_START`] use the 11-bit standard format,
/// everything above uses the 29-bit extended format. Only the first `length`
/// bytes of `payload` carry data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// Frame identifier
    pub id: u32,
    /// Data bytes
    pub payload: [u8; MAX_PAYLOAD],
    /// Number of valid bytes in `payload`, or the requested length of a
    /// remote frame
    pub length: u8,
    /// Remote transmission request
    pub is_remote_request: bool,
}

impl Message {
    /// Data frame with `id` carrying `data`.
    ///
    /// Fails with [`Error::ArgumentOutOfDomain`] if `data` is longer than
    /// 8 bytes or `id` does not fit 29 bits.
    pub fn new(id: u32, data: &[u8]) -> Result<Self, Error> {
        if data.len() > MAX_PAYLOAD {
            return Err(Error::ArgumentOutOfDomain);
        }
        let mut payload = [0; MAX_PAYLOAD];
        payload[..data.len()].copy_from_slice(data);
        let message = Self {
            id,
            payload,
            length: data.len() as u8,
            is_remote_request: false,
        };
        message.validate()?;
        Ok(message)
    }

    /// Remote frame with `id` requesting `length` bytes
    pub fn new_remote(id: u32, length: u8) -> Result<Self, Error> {
        let message = Self {
            id,
            payload: [0; MAX_PAYLOAD],
            length,
            is_remote_request: true,
        };
        message.validate()?;
        Ok(message)
    }

    /// `true` if the frame uses the 29-bit identifier format
    pub fn is_extended(&self) -> bool {
        self.id >= EXTENDED_ID_START
    }

    /// The valid part of the payload
    pub fn payload(&self) -> &[u8] {
        &self.payload[..min(self.length as usize, MAX_PAYLOAD)]
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.length as usize > MAX_PAYLOAD || self.id > EXTENDED_ID_MAX {
            Err(Error::ArgumentOutOfDomain)
        } else {
            Ok(())
        }
    }

    /// Register image for a transmit mailbox. The identifier register has the
    /// transmit request bit set.
    pub(crate) fn encode(&self) -> Mailbox<Tir, Tdlr, Tdhr> {
        let mut identifier = Tir::from(0);
        identifier.set_txrq(true);
        identifier.set_rtr(self.is_remote_request);
        if self.is_extended() {
            identifier.set_ide(true);
            identifier.set_exid(self.id);
        } else {
            identifier.set_stid(self.id as u16);
        }
        let (low, high) = split_payload(&self.payload);
        Mailbox {
            identifier,
            length: self.length,
            low: Tdlr::from(low),
            high: Tdhr::from(high),
        }
    }

    /// Rebuild a message from a receive FIFO mailbox. The length is taken
    /// verbatim and may exceed 8 on a misbehaving controller.
    pub(crate) fn decode(identifier: Rir, info: Rdtr, low: Rdlr, high: Rdhr) -> Self {
        let id = if identifier.ide() {
            identifier.exid()
        } else {
            identifier.stid() as u32
        };
        Self {
            id,
            payload: join_payload(low.into(), high.into()),
            length: info.dlc(),
            is_remote_request: identifier.rtr(),
        }
    }
}

/// Registers of a mailbox, in the order the transmit path writes them
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Mailbox<I, L, H> {
    pub identifier: I,
    pub length: u8,
    pub low: L,
    pub high: H,
}

fn split_payload(payload: &[u8; MAX_PAYLOAD]) -> (u32, u32) {
    let low = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let high = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    (low, high)
}

fn join_payload(low: u32, high: u32) -> [u8; MAX_PAYLOAD] {
    let mut payload = [0; MAX_PAYLOAD];
    payload[..4].copy_from_slice(&low.to_le_bytes());
    payload[4..].copy_from_slice(&high.to_le_bytes());
    payload
}

fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw(),
    }
}

impl Frame for Message {
    /// Extended identifiers below 2048 cannot be told apart from standard ones
    /// and yield `None`.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let id = id.into();
        if matches!(id, Id::Extended(_)) && raw_id(id) < EXTENDED_ID_START {
            return None;
        }
        Message::new(raw_id(id), data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        let id = id.into();
        if matches!(id, Id::Extended(_)) && raw_id(id) < EXTENDED_ID_START {
            return None;
        }
        if dlc > MAX_PAYLOAD {
            return None;
        }
        Message::new_remote(raw_id(id), dlc as u8).ok()
    }

    fn is_extended(&self) -> bool {
        Message::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote_request
    }

    fn id(&self) -> Id {
        if Message::is_extended(self) {
            // The mask ensures the ID is in range for a 29-bit integer
            Id::Extended(unsafe { ExtendedId::new_unchecked(self.id & ExtendedId::MAX.as_raw()) })
        } else {
            // Below `EXTENDED_ID_START`, so it fits 11 bits
            Id::Standard(unsafe { StandardId::new_unchecked(self.id as u16) })
        }
    }

    fn dlc(&self) -> usize {
        self.length as usize
    }

    fn data(&self) -> &[u8] {
        if self.is_remote_request {
            &[]
        } else {
            self.payload()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Loop the transmit image back into receive registers, like the
    /// controller does in loop-back mode
    fn loopback(message: &Message) -> Message {
        let mailbox = message.encode();
        let mut info = Rdtr::from(0);
        info.set_dlc(mailbox.length);
        Message::decode(
            Rir::from(u32::from(mailbox.identifier)),
            info,
            Rdlr::from(u32::from(mailbox.low)),
            Rdhr::from(u32::from(mailbox.high)),
        )
    }

    #[test]
    fn standard_ids_survive_the_mailbox() {
        for id in 0..EXTENDED_ID_START {
            let message = Message {
                id,
                payload: [id as u8, 1, 2, 3, 4, 5, 6, (id >> 8) as u8],
                length: (id % 9) as u8,
                is_remote_request: id % 3 == 0,
            };
            let encoded = message.encode();
            assert!(!encoded.identifier.ide());
            assert!(encoded.identifier.txrq());
            assert_eq!(loopback(&message), message);
        }
    }

    #[test]
    fn extended_ids_survive_the_mailbox() {
        let mut id = EXTENDED_ID_START;
        while id <= EXTENDED_ID_MAX {
            let message = Message {
                id,
                payload: (id as u64 * 0x0101_0101).to_le_bytes(),
                length: 8,
                is_remote_request: false,
            };
            let encoded = message.encode();
            assert!(encoded.identifier.ide());
            assert_eq!(encoded.identifier.exid(), id);
            assert_eq!(loopback(&message), message);
            id = id * 3 + 1;
        }
        let top = Message::new(EXTENDED_ID_MAX, &[0xAA]).unwrap();
        assert_eq!(loopback(&top), top);
    }

    #[test]
    fn payload_is_little_endian_per_half() {
        let message = Message::new(0x7FF, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let encoded = message.encode();
        assert_eq!(u32::from(encoded.low), 0x0403_0201);
        assert_eq!(u32::from(encoded.high), 0x0807_0605);
        assert_eq!(encoded.identifier.stid(), 0x7FF);
    }

    #[test]
    fn constructor_rejects_out_of_range_input() {
        assert_eq!(Message::new(1, &[0; 9]), Err(Error::ArgumentOutOfDomain));
        assert_eq!(Message::new(1 << 29, &[]), Err(Error::ArgumentOutOfDomain));
        assert_eq!(Message::new_remote(1, 9), Err(Error::ArgumentOutOfDomain));
        let message = Message::new(5, &[9, 8, 7]).unwrap();
        assert_eq!(message.payload(), &[9, 8, 7]);
    }

    #[test]
    fn frame_ids_follow_the_magnitude_rule() {
        let standard = StandardId::new(0x123).unwrap();
        let message = <Message as Frame>::new(standard, &[1]).unwrap();
        assert!(!Frame::is_extended(&message));
        assert_eq!(Frame::id(&message), Id::Standard(standard));

        let extended = ExtendedId::new(0x1234_5678).unwrap();
        let message = <Message as Frame>::new(extended, &[]).unwrap();
        assert!(Frame::is_extended(&message));
        assert_eq!(Frame::id(&message), Id::Extended(extended));

        let ambiguous = ExtendedId::new(0x10).unwrap();
        assert!(<Message as Frame>::new(ambiguous, &[]).is_none());
    }

    #[test]
    fn remote_frames_carry_no_data() {
        let message = <Message as Frame>::new_remote(StandardId::ZERO, 4).unwrap();
        assert!(message.is_remote_frame());
        assert_eq!(message.dlc(), 4);
        assert!(message.data().is_empty());
        assert!(<Message as Frame>::new_remote(StandardId::ZERO, 9).is_none());
    }
}
