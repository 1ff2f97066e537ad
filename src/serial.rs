//! Serial ports with DMA reception
//!
//! Transmission polls the USART data register. Reception runs without CPU
//! involvement: a `DMA1` channel copies every received character into a
//! circular buffer owned by the driver, and [`Serial::read`] derives the fill
//! level from the channel's transfer counter.

use crate::config::{self, Parity, SerialSettings, StopBits, WordLength};
use crate::reg::dma::{Ccr, Cmar, Cndtr, Cpar, Priority, TransferSize, DMA1_BASE};
use crate::reg::usart::{Brr, Cr1, Cr2, Cr3, Dr, Sr, USART1_BASE, USART2_BASE, USART3_BASE};
use crate::reg::{AddressSpace, RegisterBlock};
use crate::wait::{Forever, WaitPolicy};
use crate::Error;
use core::convert::Infallible;
use embedded_dma::WriteBuffer;
use f1periph_core::{Peripheral, PinMode, PinSelect, Platform, Port};

/// Hardware behind a logical serial port number
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortMap {
    /// Base address of the USART registers
    pub base: usize,
    /// Clock gate of the USART
    pub peripheral: Peripheral,
    /// `DMA1` channel (1 to 7) serving the USART's receive requests
    pub channel: usize,
    /// Transmit pin
    pub tx: PinSelect,
    /// Receive pin
    pub rx: PinSelect,
}

impl PortMap {
    /// Hardware of port 1, 2 or 3
    pub fn of(port: u8) -> Option<Self> {
        let map = match port {
            1 => Self {
                base: USART1_BASE,
                peripheral: Peripheral::Usart1,
                channel: 5,
                tx: PinSelect::new(Port::A, 9),
                rx: PinSelect::new(Port::A, 10),
            },
            2 => Self {
                base: USART2_BASE,
                peripheral: Peripheral::Usart2,
                channel: 6,
                tx: PinSelect::new(Port::A, 2),
                rx: PinSelect::new(Port::A, 3),
            },
            3 => Self {
                base: USART3_BASE,
                peripheral: Peripheral::Usart3,
                channel: 3,
                tx: PinSelect::new(Port::B, 10),
                rx: PinSelect::new(Port::B, 11),
            },
            _ => return None,
        };
        Some(map)
    }

    fn dma_index(&self) -> usize {
        self.channel - 1
    }
}

/// Outcome of a [`Serial::read`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadStatus {
    /// Bytes copied into the destination
    pub copied: usize,
    /// Bytes still waiting in the receive buffer
    pub remaining: usize,
    /// Size of the receive buffer
    pub capacity: usize,
}

/// Driver for one of `USART1` to `USART3`
///
/// Received characters land in `buffer`, which the driver owns and the DMA
/// engine writes for as long as the driver lives. The buffer has to be
/// `'static` so that it stays valid even if the driver is leaked with the
/// transfer still running. At most `capacity - 1` unread bytes can be held;
/// older ones are overwritten when reading falls behind.
pub struct Serial<B: AddressSpace, P: Platform, Buf, W = Forever> {
    usart: B::Block,
    dma: B::Block,
    map: PortMap,
    platform: P,
    wait: W,
    // Only reached through `rx` while the transfer runs
    _buffer: Buf,
    rx: *mut u8,
    capacity: usize,
    read_cursor: usize,
}

// Safety: `rx` points into `_buffer`, which moves together with the driver.
unsafe impl<B, P, Buf, W> Send for Serial<B, P, Buf, W>
where
    B: AddressSpace,
    B::Block: Send,
    P: Platform + Send,
    Buf: Send,
    W: Send,
{
}

impl<B, P, Buf> Serial<B, P, Buf, Forever>
where
    B: AddressSpace,
    P: Platform,
    Buf: WriteBuffer<Word = u8> + 'static,
{
    /// Power up serial port `port` (1, 2 or 3) and start receiving into
    /// `buffer`.
    ///
    /// Fails with [`Error::OperationNotSupported`] for any other port, or if
    /// `buffer` is empty or longer than 65535 bytes.
    pub fn new(
        port: u8,
        buffer: Buf,
        settings: SerialSettings,
        platform: P,
        bus: B,
    ) -> Result<Self, Error> {
        Self::with_wait_policy(port, buffer, settings, platform, bus, Forever)
    }
}

impl<B, P, Buf, W> Serial<B, P, Buf, W>
where
    B: AddressSpace,
    P: Platform,
    Buf: WriteBuffer<Word = u8> + 'static,
    W: WaitPolicy,
{
    /// Like [`Serial::new`], but waits for the transmitter as `wait` decides
    pub fn with_wait_policy(
        port: u8,
        mut buffer: Buf,
        settings: SerialSettings,
        platform: P,
        bus: B,
        wait: W,
    ) -> Result<Self, Error> {
        let map = PortMap::of(port).ok_or(Error::OperationNotSupported)?;
        // Safety: the buffer moves into the driver below and is not touched
        // again other than through `rx`
        let (rx, capacity) = unsafe { buffer.write_buffer() };
        if capacity == 0 || capacity > u16::MAX as usize {
            return Err(Error::OperationNotSupported);
        }

        let serial = Self {
            usart: bus.block(map.base),
            dma: bus.block(DMA1_BASE),
            map,
            platform,
            wait,
            _buffer: buffer,
            rx,
            capacity,
            read_cursor: 0,
        };

        serial.platform.power_on(map.peripheral);
        serial.platform.power_on(Peripheral::Dma1);
        serial.start_reception();

        serial.usart.modify::<Cr1, _>(|cr1| {
            cr1.set_ue(true);
            cr1.set_te(true);
            cr1.set_re(true);
        });
        serial.usart.modify::<Cr3, _>(|cr3| cr3.set_dmar(true));
        serial.configure(&settings);

        serial
            .platform
            .configure_pin(map.tx, PinMode::PushPullAlternateOutput)?;
        serial.platform.configure_pin(map.rx, PinMode::InputPullUp)?;
        Ok(serial)
    }

    /// Circular transfer from the data register into the buffer
    fn start_reception(&self) {
        let index = self.map.dma_index();
        self.dma.modify_at::<Ccr, _>(index, |ccr| ccr.set_en(false));

        let mut cndtr = Cndtr::from(0);
        cndtr.set_ndt(self.capacity as u16);
        self.dma.write_at(index, cndtr);
        let mut cpar = Cpar::from(0);
        cpar.set_pa((self.map.base + 0x04) as u32);
        self.dma.write_at(index, cpar);
        let mut cmar = Cmar::from(0);
        cmar.set_ma(self.rx as usize as u32);
        self.dma.write_at(index, cmar);

        let mut ccr = Ccr::from(0);
        ccr.set_dir(false);
        ccr.set_circ(true);
        ccr.set_minc(true);
        ccr.set_psize(TransferSize::Bits8 as u8);
        ccr.set_msize(TransferSize::Bits8 as u8);
        ccr.set_pl(Priority::High as u8);
        self.dma.write_at(index, ccr);
        ccr.set_en(true);
        self.dma.write_at(index, ccr);
    }
}

impl<B: AddressSpace, P: Platform, Buf, W> Serial<B, P, Buf, W> {
    /// Program baud rate and character format
    pub fn configure(&self, settings: &SerialSettings) {
        let clock = self.platform.frequency(self.map.peripheral);
        let (mantissa, fraction) = config::baud_divider(clock, settings.baud_rate);
        let mut brr = Brr::from(0);
        brr.set_mantissa(mantissa);
        brr.set_fraction(fraction);
        self.usart.write(brr);

        self.usart.modify::<Cr1, _>(|cr1| {
            cr1.set_m(settings.word_length == WordLength::Nine);
            cr1.set_pce(settings.parity != Parity::None);
            cr1.set_ps(settings.parity == Parity::Odd);
        });
        self.usart
            .modify::<Cr2, _>(|cr2| cr2.set_stop(settings.stop_bits.field()));

        debug!(
            "USART at {=usize:#x}: {} Hz, BRR={}.{}, {} stop bits",
            self.map.base,
            settings.baud_rate.raw(),
            mantissa,
            fraction,
            if settings.stop_bits == StopBits::Two { 2 } else { 1 },
        );
    }

    /// Hardware this port runs on
    pub fn port_map(&self) -> PortMap {
        self.map
    }

    /// Size of the receive buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Position the DMA engine writes to next
    fn write_cursor(&self) -> usize {
        let remaining = self.dma.read_at::<Cndtr>(self.map.dma_index()).ndt() as usize;
        self.capacity.saturating_sub(remaining) % self.capacity
    }

    fn available(&self) -> usize {
        (self.write_cursor() + self.capacity - self.read_cursor) % self.capacity
    }

    /// Copy received bytes into `destination` without waiting.
    ///
    /// Only one reader may consume the buffer; the read position lives in
    /// this instance and is not synchronized with anything.
    pub fn read(&mut self, destination: &mut [u8]) -> ReadStatus {
        let available = self.available();
        let copied = available.min(destination.len());
        for (offset, byte) in destination[..copied].iter_mut().enumerate() {
            let index = (self.read_cursor + offset) % self.capacity;
            // Safety: `index` is below `capacity`. The DMA engine writes
            // concurrently, so the byte is read with a volatile load.
            *byte = unsafe { self.rx.add(index).read_volatile() };
        }
        self.read_cursor = (self.read_cursor + copied) % self.capacity;
        ReadStatus {
            copied,
            remaining: available - copied,
            capacity: self.capacity,
        }
    }

    /// Discard everything received so far
    pub fn flush(&mut self) {
        self.read_cursor = self.write_cursor();
    }

    #[cfg(test)]
    pub(crate) fn dma_target(&self) -> *mut u8 {
        self.rx
    }

    fn transmit_empty(&self) -> bool {
        self.usart.read::<Sr>().txe()
    }

    fn load(&self, byte: u8) {
        let mut dr = Dr::from(0);
        dr.set_dr(byte as u16);
        self.usart.write(dr);
    }
}

impl<B: AddressSpace, P: Platform, Buf, W: WaitPolicy> Serial<B, P, Buf, W> {
    /// Transmit `bytes`, waiting for the data register before each one.
    ///
    /// Returns once the last byte is handed to the shift register, not when
    /// it left the line.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            self.wait.spin_until(|| self.transmit_empty())?;
            self.load(byte);
        }
        Ok(())
    }
}

impl<B: AddressSpace, P: Platform, Buf, W> embedded_hal::serial::Read<u8>
    for Serial<B, P, Buf, W>
{
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        let mut byte = [0];
        match Serial::read(self, &mut byte).copied {
            0 => Err(nb::Error::WouldBlock),
            _ => Ok(byte[0]),
        }
    }
}

impl<B: AddressSpace, P: Platform, Buf, W> embedded_hal::serial::Write<u8>
    for Serial<B, P, Buf, W>
{
    type Error = Infallible;

    fn write(&mut self, word: u8) -> nb::Result<(), Infallible> {
        if !self.transmit_empty() {
            return Err(nb::Error::WouldBlock);
        }
        self.load(word);
        Ok(())
    }

    /// Wait until the last character left the line. Unlike
    /// [`Serial::flush`] this does not touch received data.
    fn flush(&mut self) -> nb::Result<(), Infallible> {
        if self.usart.read::<Sr>().tc() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<B: AddressSpace, P: Platform, Buf, W> embedded_hal::blocking::serial::write::Default<u8>
    for Serial<B, P, Buf, W>
{
}

impl<B: AddressSpace, P: Platform, Buf, W: WaitPolicy> core::fmt::Write for Serial<B, P, Buf, W> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        Serial::write(self, s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}

impl<B: AddressSpace, P: Platform, Buf, W> Drop for Serial<B, P, Buf, W> {
    /// The transfer is stopped before the buffer is released. `DMA1` stays
    /// powered, other channels may be in use.
    fn drop(&mut self) {
        self.dma
            .modify_at::<Ccr, _>(self.map.dma_index(), |ccr| ccr.set_en(false));
        self.usart.modify::<Cr1, _>(|cr1| cr1.set_ue(false));
        self.platform.power_off(self.map.peripheral);
    }
}
