//! Host-side model of the peripherals and the platform used by the tests

use crate::reg::{can, dma, usart, AddressSpace, RegisterBlock};
use core::cell::{Cell, RefCell};
use f1periph_core::{
    Bus, CanPins, ClockTree, InterruptRegistry, InvalidPinSelect, Irq, Isr, Peripheral, PinMode,
    PinRouter, PinSelect, Port, PowerControl, TimingSegments,
};
use fugit::HertzU32;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

const MCR: usize = can::CAN1_BASE;
const MSR: usize = can::CAN1_BASE + 0x004;
const TSR: usize = can::CAN1_BASE + 0x008;
const RF0R: usize = can::CAN1_BASE + 0x00C;
const ESR: usize = can::CAN1_BASE + 0x018;
const BTR: usize = can::CAN1_BASE + 0x01C;
const TIR0: usize = can::CAN1_BASE + 0x180;
const RIR0: usize = can::CAN1_BASE + 0x1B0;
const DMA_CHANNEL0: usize = dma::DMA1_BASE + 0x08;
const DMA_CHANNEL_STRIDE: usize = 0x14;

/// Frame found in a transmit mailbox when its request bit was set
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct SentFrame {
    pub mailbox: usize,
    pub identifier: u32,
    pub info: u32,
    pub low: u32,
    pub high: u32,
}

#[derive(Default)]
struct BusState {
    words: RefCell<BTreeMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
    sent: RefCell<Vec<SentFrame>>,
    transmitted: RefCell<Vec<(usize, u8)>>,
    rx_queues: RefCell<[VecDeque<[u32; 4]>; 2]>,
    dma_reload: RefCell<BTreeMap<usize, u32>>,
    init_stuck: Cell<bool>,
}

/// Register file that reacts to writes roughly like the real peripherals:
///
/// - `MCR.INRQ` is acknowledged in `MSR.INAK` unless [`Self::stick_init`]
/// - setting `TIR.TXRQ` records the frame and marks the mailbox as pending
/// - `RFxR.RFOM` releases the head of the FIFO and loads the next frame
/// - writing `CNDTR` remembers the reload value for [`Self::dma_receive`]
/// - writing a USART data register records the byte
#[derive(Clone, Default)]
pub(crate) struct FakeBus(Rc<BusState>);

impl FakeBus {
    pub fn new() -> Self {
        let bus = Self::default();
        bus.set(MCR, 0x0001_0002);
        bus.set(MSR, 0x0000_0C02);
        bus.set(TSR, 0x1C00_0000);
        bus.set(BTR, 0x0123_0000);
        for base in [usart::USART1_BASE, usart::USART2_BASE, usart::USART3_BASE] {
            bus.set(base, 0x0000_00C0);
        }
        bus
    }

    /// Current value of the word at `address`
    pub fn get(&self, address: usize) -> u32 {
        self.0.words.borrow().get(&address).copied().unwrap_or(0)
    }

    /// Change a word behind the driver's back, without side effects
    pub fn set(&self, address: usize, value: u32) {
        self.0.words.borrow_mut().insert(address, value);
    }

    /// Number of writes issued through register blocks so far
    pub fn write_count(&self) -> usize {
        self.0.writes.borrow().len()
    }

    /// Writes issued after the first `mark` writes
    pub fn writes_since(&self, mark: usize) -> Vec<(usize, u32)> {
        self.0.writes.borrow()[mark..].to_vec()
    }

    /// Frames whose transmission has been requested
    pub fn sent(&self) -> Vec<SentFrame> {
        self.0.sent.borrow().clone()
    }

    /// Bytes loaded into the data register of the USART at `base`
    pub fn transmitted(&self, base: usize) -> Vec<u8> {
        self.0
            .transmitted
            .borrow()
            .iter()
            .filter(|(b, _)| *b == base)
            .map(|(_, byte)| *byte)
            .collect()
    }

    /// Stop acknowledging initialization requests
    pub fn stick_init(&self) {
        self.0.init_stuck.set(true);
    }

    /// Never report the transmit data register of the USART at `base` empty
    pub fn stall_transmitter(&self, base: usize) {
        self.set(base, self.get(base) & !(1 << 7));
    }

    /// Mark transmit mailbox `index` empty again, as if its frame went out
    pub fn complete_mailbox(&self, index: usize) {
        self.set(TSR, self.get(TSR) | 1 << (26 + index));
    }

    /// Mark every transmit mailbox pending
    pub fn fill_mailboxes(&self) {
        self.set(TSR, self.get(TSR) & !(0b111 << 26));
    }

    /// Raise or clear `ESR.BOFF`
    pub fn set_bus_off(&self, bus_off: bool) {
        let esr = self.get(ESR);
        self.set(ESR, if bus_off { esr | 0b100 } else { esr & !0b100 });
    }

    /// Put a frame into receive FIFO `fifo` in its register image
    pub fn queue_frame(&self, fifo: usize, identifier: u32, info: u32, low: u32, high: u32) {
        self.0.rx_queues.borrow_mut()[fifo].push_back([identifier, info, low, high]);
        self.refresh_fifo(fifo);
    }

    /// Frames still queued in receive FIFO `fifo`
    pub fn queued(&self, fifo: usize) -> usize {
        self.0.rx_queues.borrow()[fifo].len()
    }

    /// Let DMA channel `channel` move `bytes` to `target` the way the
    /// hardware does: at `reload - CNDTR`, counting `CNDTR` down and
    /// reloading it when it reaches zero.
    ///
    /// `target` must point at `reload` writable bytes.
    pub fn dma_receive(&self, channel: usize, target: *mut u8, bytes: &[u8]) {
        let cndtr = DMA_CHANNEL0 + 0x04 + (channel - 1) * DMA_CHANNEL_STRIDE;
        let reload = self.0.dma_reload.borrow().get(&cndtr).copied().unwrap_or(0);
        for byte in bytes {
            let remaining = self.get(cndtr);
            // Safety: the offset stays below the programmed transfer count
            unsafe { target.add((reload - remaining) as usize).write_volatile(*byte) };
            let remaining = if remaining == 1 { reload } else { remaining - 1 };
            self.set(cndtr, remaining);
        }
    }

    fn refresh_fifo(&self, fifo: usize) {
        let rfr = RF0R + 4 * fifo;
        let queue = self.0.rx_queues.borrow();
        let pending = queue[fifo].len().min(3) as u32;
        self.set(rfr, (self.get(rfr) & !0b11) | pending);
        if let Some(frame) = queue[fifo].front() {
            for (offset, word) in frame.iter().enumerate() {
                self.set(RIR0 + 0x10 * fifo + 4 * offset, *word);
            }
        }
    }

    fn write(&self, address: usize, value: u32) {
        self.0.writes.borrow_mut().push((address, value));
        match address {
            MCR => {
                self.set(MCR, value);
                let mut msr = self.get(MSR) & !0b11;
                if self.0.init_stuck.get() {
                    msr |= self.get(MSR) & 0b1;
                } else {
                    msr |= value & 0b1;
                }
                msr |= value & 0b10;
                self.set(MSR, msr);
            }
            a if (TIR0..TIR0 + 0x30).contains(&a) && (a - TIR0) % 0x10 == 0 => {
                let mailbox = (a - TIR0) / 0x10;
                self.set(a, value);
                if value & 1 != 0 {
                    self.0.sent.borrow_mut().push(SentFrame {
                        mailbox,
                        identifier: value,
                        info: self.get(a + 0x4),
                        low: self.get(a + 0x8),
                        high: self.get(a + 0xC),
                    });
                    self.set(TSR, self.get(TSR) & !(1 << (26 + mailbox)));
                }
            }
            a if a == RF0R || a == RF0R + 4 => {
                let fifo = (a - RF0R) / 4;
                if value & (1 << 5) != 0 {
                    self.0.rx_queues.borrow_mut()[fifo].pop_front();
                }
                self.set(a, value & !(1 << 5));
                self.refresh_fifo(fifo);
            }
            a if a >= DMA_CHANNEL0
                && a < DMA_CHANNEL0 + 7 * DMA_CHANNEL_STRIDE
                && (a - DMA_CHANNEL0) % DMA_CHANNEL_STRIDE == 0x04 =>
            {
                self.0.dma_reload.borrow_mut().insert(a, value);
                self.set(a, value);
            }
            a if [usart::USART1_BASE, usart::USART2_BASE, usart::USART3_BASE]
                .iter()
                .any(|base| a == base + 0x04) =>
            {
                self.0.transmitted.borrow_mut().push((a - 0x04, value as u8));
                self.set(a, value);
            }
            _ => self.set(address, value),
        }
    }
}

/// Register block view into a [`FakeBus`]
#[derive(Clone)]
pub(crate) struct FakeBlock {
    bus: FakeBus,
    base: usize,
}

impl RegisterBlock for FakeBlock {
    fn read_raw(&self, offset: usize) -> u32 {
        self.bus.get(self.base + offset)
    }

    fn write_raw(&self, offset: usize, value: u32) {
        self.bus.write(self.base + offset, value)
    }
}

impl AddressSpace for FakeBus {
    type Block = FakeBlock;

    fn block(&self, base: usize) -> FakeBlock {
        FakeBlock {
            bus: self.clone(),
            base,
        }
    }
}

#[derive(Default)]
struct PlatformState {
    powered: RefCell<Vec<Peripheral>>,
    pins: RefCell<Vec<(PinSelect, PinMode)>>,
    remaps: RefCell<Vec<CanPins>>,
    interrupts: RefCell<Vec<(Irq, Isr)>>,
    initializations: Cell<u32>,
    fire_on_enable: Cell<bool>,
}

/// Platform that records every request. APB1 runs at 36 MHz, everything
/// else at 72 MHz.
#[derive(Clone, Default)]
pub(crate) struct FakePlatform(Rc<PlatformState>);

impl FakePlatform {
    pub fn is_powered(&self, peripheral: Peripheral) -> bool {
        self.0.powered.borrow().contains(&peripheral)
    }

    pub fn pins(&self) -> Vec<(PinSelect, PinMode)> {
        self.0.pins.borrow().clone()
    }

    pub fn remaps(&self) -> Vec<CanPins> {
        self.0.remaps.borrow().clone()
    }

    pub fn isr(&self, irq: Irq) -> Option<Isr> {
        self.0
            .interrupts
            .borrow()
            .iter()
            .find(|(i, _)| *i == irq)
            .map(|(_, isr)| *isr)
    }

    pub fn initializations(&self) -> u32 {
        self.0.initializations.get()
    }

    /// Run every routine as soon as it is installed, like a line that is
    /// already pending when it gets enabled
    pub fn fire_on_enable(&self, fire: bool) {
        self.0.fire_on_enable.set(fire);
    }
}

impl ClockTree for FakePlatform {
    fn frequency(&self, peripheral: Peripheral) -> HertzU32 {
        match peripheral.bus() {
            Bus::Apb1 => HertzU32::from_raw(36_000_000),
            _ => HertzU32::from_raw(72_000_000),
        }
    }
}

impl PowerControl for FakePlatform {
    fn power_on(&self, peripheral: Peripheral) {
        if !self.is_powered(peripheral) {
            self.0.powered.borrow_mut().push(peripheral);
        }
    }

    fn power_off(&self, peripheral: Peripheral) {
        self.0.powered.borrow_mut().retain(|p| *p != peripheral);
    }

    fn is_on(&self, peripheral: Peripheral) -> bool {
        peripheral == Peripheral::Cpu || self.is_powered(peripheral)
    }
}

impl PinRouter for FakePlatform {
    fn configure_pin(&self, pin: PinSelect, mode: PinMode) -> Result<(), InvalidPinSelect> {
        if pin.pin > 15 || matches!(pin.port, Port::F | Port::G) {
            return Err(InvalidPinSelect(pin));
        }
        self.0.pins.borrow_mut().push((pin, mode));
        Ok(())
    }

    fn remap_can_pins(&self, pins: CanPins) {
        self.0.remaps.borrow_mut().push(pins);
    }
}

impl InterruptRegistry for FakePlatform {
    fn initialize_interrupts(&self) {
        self.0.initializations.set(self.0.initializations.get() + 1);
    }

    fn enable_interrupt(&self, irq: Irq, isr: Isr) {
        {
            let mut interrupts = self.0.interrupts.borrow_mut();
            interrupts.retain(|(i, _)| *i != irq);
            interrupts.push((irq, isr));
        }
        if self.0.fire_on_enable.get() {
            isr();
        }
    }

    fn disable_interrupt(&self, irq: Irq) {
        self.0.interrupts.borrow_mut().retain(|(i, _)| *i != irq);
    }
}

/// 36 MHz / (18 * 16 quanta) = 125 kbit/s
pub(crate) fn resolve_125k(_clock: HertzU32, _baud_rate: HertzU32) -> Option<TimingSegments> {
    Some(TimingSegments {
        prescaler: 18,
        sync_jump_width: 1,
        phase_segment1: 12,
        phase_segment2: 2,
        propagation_delay: 1,
    })
}

/// Resolver that never finds a fitting timing
pub(crate) fn resolve_nothing(_clock: HertzU32, _baud_rate: HertzU32) -> Option<TimingSegments> {
    None
}
