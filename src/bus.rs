//! CAN controller

use crate::config::{self, CanSettings};
use crate::filter::{self, FilterConfig};
use crate::interrupt::{self, Dispatch, CAN1_RECEIVE_LINES};
use crate::message::{Message, MAX_PAYLOAD};
use crate::reg::can::{Btr, Esr, Ier, Mcr, Msr, CAN1_BASE, TX_MAILBOXES};
use crate::reg::{AddressSpace, RegisterBlock};
use crate::rx_fifo::{Fifo, FifoStatus, RxFifos};
use crate::tx_mailboxes::{MailboxStatus, TxMailboxes};
use crate::wait::{Forever, WaitPolicy};
use crate::Error;
use core::cell::Cell;
use core::fmt::{self, Debug};
use critical_section::Mutex;
use f1periph_core::{BitTimingResolver, CanPins, Peripheral, PinMode, Platform};

/// Operating state of the controller, as reported by the hardware
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// The peripheral clock is off
    Uninitialized,
    /// The controller acknowledged an initialization request and is off the
    /// bus. Timing and filters can be changed.
    Initializing,
    /// Taking part in bus traffic
    Normal,
    /// Off the bus after too many transmit errors. Leave with
    /// [`Can::bus_on`].
    BusOff,
}

/// Kind of the last error detected on the bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LastErrorCode {
    /// No error since the code was last cleared
    NoError,
    /// Stuff error
    Stuff,
    /// Form error
    Form,
    /// Acknowledgment error
    Acknowledgment,
    /// Bit recessive error
    BitRecessive,
    /// Bit dominant error
    BitDominant,
    /// CRC error
    Crc,
    /// Code set by software
    SetBySoftware,
}

impl From<u8> for LastErrorCode {
    fn from(value: u8) -> Self {
        match value & 0b111 {
            0 => Self::NoError,
            1 => Self::Stuff,
            2 => Self::Form,
            3 => Self::Acknowledgment,
            4 => Self::BitRecessive,
            5 => Self::BitDominant,
            6 => Self::Crc,
            _ => Self::SetBySoftware,
        }
    }
}

/// Printable ESR field
#[derive(Copy, Clone)]
pub struct ErrorStatus(pub Esr);

impl From<Esr> for ErrorStatus {
    fn from(value: Esr) -> Self {
        Self(value)
    }
}

impl ErrorStatus {
    /// Transmit error counter
    pub fn transmit_errors(&self) -> u8 {
        self.0.tec()
    }

    /// Receive error counter
    pub fn receive_errors(&self) -> u8 {
        self.0.rec()
    }

    /// Last error code
    pub fn last_error(&self) -> LastErrorCode {
        self.0.lec().into()
    }

    /// An error counter reached the warning limit of 96
    pub fn is_warning(&self) -> bool {
        self.0.ewgf()
    }

    /// An error counter exceeded 127
    pub fn is_error_passive(&self) -> bool {
        self.0.epvf()
    }

    /// The controller went bus-off
    pub fn is_bus_off(&self) -> bool {
        self.0.boff()
    }
}

impl Debug for ErrorStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorStatus")
            .field("tec", &self.transmit_errors())
            .field("rec", &self.receive_errors())
            .field("lec", &self.last_error())
            .field("ewgf", &self.is_warning())
            .field("epvf", &self.is_error_passive())
            .field("boff", &self.is_bus_off())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ErrorStatus {{ tec: {}, rec: {}, lec: {}, ewgf: {}, epvf: {}, boff: {} }}",
            self.transmit_errors(),
            self.receive_errors(),
            self.last_error(),
            self.is_warning(),
            self.is_error_passive(),
            self.is_bus_off(),
        )
    }
}

/// Status accessors of a CAN bus
pub trait CanBus {
    /// Current operating state
    fn state(&self) -> State;
    /// Read error counters and flags
    fn error_status(&self) -> ErrorStatus;
    /// Fill state of a receive FIFO
    fn fifo_status(&self, fifo: Fifo) -> FifoStatus;
}

/// Handler called with every frame received while interrupts are enabled
pub type ReceiveHandler = &'static dyn Fn(&Message);

/// Driver for the `CAN1` controller
///
/// All operations take `&self`; the instance is meant to be shared with its
/// interrupt handler through a `'static` reference (see
/// [`Self::on_receive`]). Dropping it disables the interrupts and removes
/// the peripheral's clock.
pub struct Can<B: AddressSpace, P: Platform, R, W = Forever> {
    regs: B::Block,
    platform: P,
    resolver: R,
    wait: W,
    pins: CanPins,
    handler: Mutex<Cell<Option<ReceiveHandler>>>,
}

impl<B: AddressSpace, P: Platform, R: BitTimingResolver> Can<B, P, R, Forever> {
    /// Power up and configure `CAN1`.
    ///
    /// Routes the controller to `pins`, programs the bit timing found by
    /// `resolver` for the bus clock and accepts every frame into FIFO 0 by
    /// filter bank 0. The controller is left running.
    ///
    /// Fails with [`Error::OperationNotSupported`] if `resolver` finds no
    /// timing for `settings` or the timing does not fit the hardware.
    pub fn new(
        settings: CanSettings,
        pins: CanPins,
        platform: P,
        resolver: R,
        bus: B,
    ) -> Result<Self, Error> {
        Self::with_wait_policy(settings, pins, platform, resolver, bus, Forever)
    }
}

impl<B: AddressSpace, P: Platform, R: BitTimingResolver, W: WaitPolicy> Can<B, P, R, W> {
    /// Like [`Can::new`], but waits for the hardware as `wait` decides
    pub fn with_wait_policy(
        settings: CanSettings,
        pins: CanPins,
        platform: P,
        resolver: R,
        bus: B,
        wait: W,
    ) -> Result<Self, Error> {
        // Built first so that an early return powers the controller down again
        let can = Self {
            regs: bus.block(CAN1_BASE),
            platform,
            resolver,
            wait,
            pins,
            handler: Mutex::new(Cell::new(None)),
        };

        can.platform.power_on(Peripheral::Can1);
        can.regs.modify::<Mcr, _>(|mcr| {
            mcr.set_sleep(false);
            mcr.set_nart(false);
            mcr.set_abom(false);
        });

        can.platform.configure_pin(pins.rx(), PinMode::InputPullUp)?;
        can.platform
            .configure_pin(pins.tx(), PinMode::PushPullAlternateOutput)?;
        can.platform.remap_can_pins(pins);

        can.configure(&settings)?;
        Ok(can)
    }

    /// Reprogram the bit timing for `settings` and reinstall the accept-all
    /// filter on bank 0
    pub fn configure(&self, settings: &CanSettings) -> Result<(), Error> {
        let initialization = Initialization::enter(&self.regs, &self.wait)?;

        let clock = self.platform.frequency(Peripheral::Can1);
        let segments = self
            .resolver
            .resolve(clock, settings.baud_rate)
            .ok_or(Error::OperationNotSupported)?;
        let btr = config::bit_timing(&segments)?;
        debug!(
            "CAN1 at {} Hz from {} Hz: BRP={} TS1={} TS2={} SJW={}",
            settings.baud_rate.raw(),
            clock.raw(),
            btr.brp(),
            btr.ts1(),
            btr.ts2(),
            btr.sjw(),
        );
        self.regs.write(btr);
        filter::apply(&self.regs, 0, &FilterConfig::accept_all())?;

        initialization.exit()
    }

    /// Switch the loop-back test mode on or off. In loop-back mode
    /// transmitted frames are received by the controller itself.
    ///
    /// The controller is returned to normal operation even if this fails.
    pub fn enable_self_test(&self, enable: bool) -> Result<(), Error> {
        let initialization = Initialization::enter(&self.regs, &self.wait)?;
        self.regs.modify::<Btr, _>(|btr| btr.set_lbkm(enable));
        initialization.exit()
    }

    /// Recover from bus-off by passing through initialization mode.
    ///
    /// Whether the cause of the bus-off is gone is not checked. If it
    /// persists, the controller goes bus-off again on the next transmission.
    pub fn bus_on(&self) -> Result<(), Error> {
        warn!("CAN1 leaving bus-off, {}", self.error_status());
        Initialization::enter(&self.regs, &self.wait)?.exit()
    }

    /// Program filter bank `bank` (0 to 27).
    ///
    /// The controller passes through initialization mode while the bank
    /// changes.
    pub fn set_filter(&self, bank: usize, config: &FilterConfig) -> Result<(), Error> {
        if bank >= crate::reg::can::FILTER_BANKS {
            return Err(Error::ArgumentOutOfDomain);
        }
        let initialization = Initialization::enter(&self.regs, &self.wait)?;
        filter::apply(&self.regs, bank, config)?;
        initialization.exit()
    }
}

impl<B: AddressSpace, P: Platform, R, W> Can<B, P, R, W> {
    /// Queue `message` for transmission in the first free mailbox, checking
    /// mailbox 0 first, then 1, then 2.
    ///
    /// Fails with
    /// - [`Error::OperationNotPermitted`] if the controller is bus-off; call
    ///   [`Self::bus_on`] to recover
    /// - [`Error::ArgumentOutOfDomain`] if the message is longer than 8 bytes
    ///   or its identifier does not fit 29 bits
    /// - [`Error::ResourceUnavailableTryAgain`] if all mailboxes are pending
    ///
    /// No register is written in any of these cases.
    pub fn send(&self, message: &Message) -> Result<(), Error> {
        if self.regs.read::<Esr>().boff() {
            return Err(Error::OperationNotPermitted);
        }
        message.validate()?;
        match TxMailboxes::new(&self.regs).transmit(message) {
            Ok(_) => Ok(()),
            Err(e) => {
                trace!("all transmit mailboxes pending");
                Err(e)
            }
        }
    }

    /// Status of transmit mailbox `index` (0 to 2)
    pub fn mailbox_status(&self, index: usize) -> Result<MailboxStatus, Error> {
        if index >= TX_MAILBOXES {
            return Err(Error::ArgumentOutOfDomain);
        }
        Ok(TxMailboxes::new(&self.regs).status(index))
    }

    /// Take the next received frame, if any. FIFO 0 is checked before FIFO 1.
    ///
    /// Frames claiming more than 8 bytes are discarded.
    pub fn receive(&self) -> Option<Message> {
        let fifos = RxFifos::new(&self.regs);
        while let Some(message) = fifos.receive() {
            if Self::is_intact(&message) {
                return Some(message);
            }
        }
        None
    }

    /// Route received frames to `handler` from interrupt context.
    ///
    /// Enables the "message pending" interrupts of both FIFOs and installs
    /// the same service routine on the `CAN1_RX0`, `CAN1_RX1` and `CAN1_SCE`
    /// lines. `handler` runs inside the interrupt and must return quickly.
    ///
    /// Registering again replaces the previous handler. Handler, owner slot
    /// and vectors change together inside one critical section, but a frame
    /// already being dispatched may still reach the old handler. Handlers
    /// should therefore be registered during start-up, before frames arrive.
    pub fn on_receive(&'static self, handler: ReceiveHandler)
    where
        Self: 'static,
    {
        self.platform.initialize_interrupts();
        critical_section::with(|cs| {
            self.handler.borrow(cs).set(Some(handler));
            interrupt::CAN1.claim(self, cs);
            self.regs.modify::<Ier, _>(|ier| {
                ier.set_fmpie0(true);
                ier.set_fmpie1(true);
            });
            for irq in CAN1_RECEIVE_LINES {
                self.platform
                    .enable_interrupt(irq, interrupt::trampoline::<Self>);
            }
        });
    }

    /// Decode one pending frame and pass it to the receive handler.
    ///
    /// This is what the installed interrupt routine runs. Applications that
    /// own the vector table themselves can call it from their own handler.
    pub fn dispatch(&self) {
        let message = match RxFifos::new(&self.regs).receive() {
            Some(message) => message,
            None => return,
        };
        if !Self::is_intact(&message) {
            return;
        }
        // Called outside the critical section so the handler does not
        // block other interrupts
        let handler = critical_section::with(|cs| self.handler.borrow(cs).get());
        if let Some(handler) = handler {
            handler(&message);
        }
    }

    /// Pins the controller was routed to
    pub fn pins(&self) -> CanPins {
        self.pins
    }

    fn is_intact(message: &Message) -> bool {
        if message.length as usize > MAX_PAYLOAD {
            warn!("dropped frame {=u32:#x} with length {}", message.id, message.length);
            false
        } else {
            true
        }
    }
}

impl<B: AddressSpace, P: Platform, R, W> CanBus for Can<B, P, R, W> {
    fn state(&self) -> State {
        if !self.platform.is_on(Peripheral::Can1) {
            State::Uninitialized
        } else if self.regs.read::<Esr>().boff() {
            State::BusOff
        } else if self.regs.read::<Msr>().inak() {
            State::Initializing
        } else {
            State::Normal
        }
    }

    fn error_status(&self) -> ErrorStatus {
        self.regs.read::<Esr>().into()
    }

    fn fifo_status(&self, fifo: Fifo) -> FifoStatus {
        RxFifos::new(&self.regs).status(fifo)
    }
}

impl<B: AddressSpace, P: Platform, R, W> Dispatch for Can<B, P, R, W> {
    fn dispatch(&self) {
        Can::dispatch(self)
    }
}

impl<B: AddressSpace, P: Platform, R, W> embedded_can::nb::Can for Can<B, P, R, W> {
    type Frame = Message;
    type Error = Error;

    fn transmit(&mut self, frame: &Message) -> nb::Result<Option<Message>, Error> {
        match self.send(frame) {
            Ok(()) => Ok(None),
            Err(Error::ResourceUnavailableTryAgain) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn receive(&mut self) -> nb::Result<Message, Error> {
        Can::receive(self).ok_or(nb::Error::WouldBlock)
    }
}

impl<B: AddressSpace, P: Platform, R, W> Drop for Can<B, P, R, W> {
    fn drop(&mut self) {
        critical_section::with(|cs| {
            self.regs.write(Ier::from(0));
            for irq in CAN1_RECEIVE_LINES {
                self.platform.disable_interrupt(irq);
            }
            interrupt::CAN1.release(self as *const Self, cs);
        });
        self.platform.power_off(Peripheral::Can1);
    }
}

/// Initialization mode held for the lifetime of the value.
///
/// Leave it with [`Self::exit`] to see whether the controller acknowledged.
/// If the value is dropped instead, leaving is requested without waiting.
struct Initialization<'a, Blk: RegisterBlock, W: WaitPolicy> {
    regs: &'a Blk,
    wait: &'a W,
    active: bool,
}

impl<'a, Blk: RegisterBlock, W: WaitPolicy> Initialization<'a, Blk, W> {
    fn enter(regs: &'a Blk, wait: &'a W) -> Result<Self, Error> {
        regs.modify::<Mcr, _>(|mcr| mcr.set_inrq(true));
        if let Err(e) = wait.spin_until(|| regs.read::<Msr>().inak()) {
            error!("CAN1 did not acknowledge the initialization request");
            regs.modify::<Mcr, _>(|mcr| mcr.set_inrq(false));
            return Err(e);
        }
        Ok(Self {
            regs,
            wait,
            active: true,
        })
    }

    fn exit(mut self) -> Result<(), Error> {
        self.active = false;
        self.regs.modify::<Mcr, _>(|mcr| mcr.set_inrq(false));
        self.wait.spin_until(|| !self.regs.read::<Msr>().inak())
    }
}

impl<'a, Blk: RegisterBlock, W: WaitPolicy> Drop for Initialization<'a, Blk, W> {
    fn drop(&mut self) {
        if self.active {
            self.regs.modify::<Mcr, _>(|mcr| mcr.set_inrq(false));
        }
    }
}
