#![no_std]
#![warn(missing_docs)]

//! `f1periph-core` provides the thin integration layer between the platform
//! independent drivers in [`f1periph`] and the platform specific code that
//! owns clocks, power gates, pins and the interrupt vector table (in
//! documentation also referred to as the _platform_).
//!
//! The drivers never program the clock tree, the RCC enable registers, the
//! GPIO/AFIO blocks or the NVIC themselves. They consume these services
//! through the traits of this crate:
//!
//! - [`ClockTree`] resolves the bus clock feeding a peripheral
//! - [`PowerControl`] gates peripheral clocks on and off
//! - [`PinRouter`] configures pin modes and the CAN pin remap
//! - [`InterruptRegistry`] installs interrupt service routines
//! - [`BitTimingResolver`] turns a CAN baud rate into time quanta
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by the board
//! support or HAL crate. The [`Platform`] trait is implemented automatically
//! for every type that provides the first four.
//!
//! [`f1periph`]: <https://docs.rs/crate/f1periph/>

pub use fugit;

use fugit::HertzU32;

/// Number of peripheral enable bits reserved per bus in [`Peripheral`]
/// discriminants.
pub const BUS_ID_OFFSET: u8 = 32;

/// Peripheral identity
///
/// The discriminant encodes the bus the peripheral hangs off and the bit
/// position of its clock enable in that bus' `RCC_xxxENR` register:
/// `bus * BUS_ID_OFFSET + bit`. Entries past the last bus describe clock
/// domains that have no enable bit (such as the CPU).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Peripheral {
    /// DMA controller 1
    Dma1 = 0,
    /// DMA controller 2
    Dma2 = 1,
    /// USART2
    Usart2 = BUS_ID_OFFSET + 17,
    /// USART3
    Usart3 = BUS_ID_OFFSET + 18,
    /// bxCAN controller 1
    Can1 = BUS_ID_OFFSET + 25,
    /// Alternate function IO
    Afio = 2 * BUS_ID_OFFSET,
    /// GPIO port A
    GpioA = 2 * BUS_ID_OFFSET + 2,
    /// GPIO port B
    GpioB = 2 * BUS_ID_OFFSET + 3,
    /// GPIO port C
    GpioC = 2 * BUS_ID_OFFSET + 4,
    /// GPIO port D
    GpioD = 2 * BUS_ID_OFFSET + 5,
    /// GPIO port E
    GpioE = 2 * BUS_ID_OFFSET + 6,
    /// USART1
    Usart1 = 2 * BUS_ID_OFFSET + 14,
    /// Core clock
    Cpu = 3 * BUS_ID_OFFSET,
}

/// Bus a [`Peripheral`] is attached to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    /// Advanced high-performance bus
    Ahb,
    /// Low speed peripheral bus
    Apb1,
    /// High speed peripheral bus
    Apb2,
    /// Not behind a gated bus
    Core,
}

impl Peripheral {
    /// Bus that clocks this peripheral
    pub fn bus(self) -> Bus {
        match self as u8 / BUS_ID_OFFSET {
            0 => Bus::Ahb,
            1 => Bus::Apb1,
            2 => Bus::Apb2,
            _ => Bus::Core,
        }
    }

    /// Bit position of the clock enable inside the bus' enable register
    pub fn enable_bit(self) -> u8 {
        self as u8 % BUS_ID_OFFSET
    }
}

/// Interrupt request numbers used by the drivers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Irq {
    /// USB low priority or CAN1 RX0
    Can1Rx0 = 20,
    /// CAN1 RX1
    Can1Rx1 = 21,
    /// CAN1 status change and error
    Can1Sce = 22,
}

impl Irq {
    /// Position in the NVIC vector table, not counting the core exceptions
    pub fn number(self) -> u16 {
        self as u16
    }
}

/// Interrupt service routine as stored in the vector table
pub type Isr = fn();

/// GPIO port
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// Port A
    A,
    /// Port B
    B,
    /// Port C
    C,
    /// Port D
    D,
    /// Port E
    E,
    /// Port F
    F,
    /// Port G
    G,
}

/// A single pin of a GPIO port
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinSelect {
    /// GPIO port
    pub port: Port,
    /// Pin number, 0 to 15
    pub pin: u8,
}

impl PinSelect {
    /// Shorthand constructor
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }
}

/// Electrical configuration of a pin
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Input with the internal pull-up engaged
    InputPullUp,
    /// Input without pull resistors
    InputFloating,
    /// General purpose push-pull output
    PushPullOutput,
    /// Push-pull output driven by the alternate function
    PushPullAlternateOutput,
}

impl PinMode {
    /// `CNF[1:0]` and `MODE[1:0]` bits for `GPIOx_CRL/CRH`
    ///
    /// Outputs are configured for the fastest slew rate. For
    /// [`PinMode::InputPullUp`] the platform also has to set the pin's `ODR`
    /// bit.
    pub fn config_bits(self) -> u8 {
        match self {
            PinMode::InputPullUp => 0b1000,
            PinMode::InputFloating => 0b0100,
            PinMode::PushPullOutput => 0b0011,
            PinMode::PushPullAlternateOutput => 0b1011,
        }
    }
}

/// Pin pairs the bxCAN controller can be routed to
///
/// The discriminant is the value of the `CAN_REMAP` field in `AFIO_MAPR`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CanPins {
    /// RX on PA11, TX on PA12
    #[default]
    Pa11Pa12 = 0b00,
    /// RX on PB8, TX on PB9
    Pb8Pb9 = 0b10,
    /// RX on PD0, TX on PD1
    Pd0Pd1 = 0b11,
}

impl CanPins {
    /// Receive pin
    pub fn rx(self) -> PinSelect {
        match self {
            CanPins::Pa11Pa12 => PinSelect::new(Port::A, 11),
            CanPins::Pb8Pb9 => PinSelect::new(Port::B, 8),
            CanPins::Pd0Pd1 => PinSelect::new(Port::D, 0),
        }
    }

    /// Transmit pin
    pub fn tx(self) -> PinSelect {
        match self {
            CanPins::Pa11Pa12 => PinSelect::new(Port::A, 12),
            CanPins::Pb8Pb9 => PinSelect::new(Port::B, 9),
            CanPins::Pd0Pd1 => PinSelect::new(Port::D, 1),
        }
    }

    /// Value of the `AFIO_MAPR.CAN_REMAP` field
    pub fn remap_bits(self) -> u8 {
        self as u8
    }
}

/// The requested pin does not exist on this part
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPinSelect(pub PinSelect);

/// Source of peripheral clock frequencies
pub trait ClockTree {
    /// Frequency of the clock feeding `peripheral`.
    ///
    /// For bus peripherals this is the frequency of the APB/AHB clock the
    /// peripheral is attached to, after all prescalers.
    fn frequency(&self, peripheral: Peripheral) -> HertzU32;
}

/// Peripheral clock gating
pub trait PowerControl {
    /// Enable the clock of `peripheral`
    fn power_on(&self, peripheral: Peripheral);
    /// Disable the clock of `peripheral`
    fn power_off(&self, peripheral: Peripheral);
    /// `true` if the clock of `peripheral` is enabled. Clock domains without
    /// an enable bit are always on.
    fn is_on(&self, peripheral: Peripheral) -> bool;
}

/// Pin multiplexing
pub trait PinRouter {
    /// Put `pin` into `mode`, powering its GPIO port first if needed.
    fn configure_pin(&self, pin: PinSelect, mode: PinMode) -> Result<(), InvalidPinSelect>;
    /// Route the bxCAN signals to `pins` through `AFIO_MAPR`.
    fn remap_can_pins(&self, pins: CanPins);
}

/// Interrupt vector registration
///
/// Drivers register plain function pointers. Any per-instance state is looked
/// up by the driver itself from inside the routine.
pub trait InterruptRegistry {
    /// Prepare the vector table and NVIC. Only the first call has an effect,
    /// every further call does nothing.
    fn initialize_interrupts(&self);
    /// Install `isr` for `irq` and unmask the interrupt.
    fn enable_interrupt(&self, irq: Irq, isr: Isr);
    /// Mask `irq`.
    fn disable_interrupt(&self, irq: Irq);
}

/// Everything the drivers need from the platform
pub trait Platform: ClockTree + PowerControl + PinRouter + InterruptRegistry {}

impl<T> Platform for T where T: ClockTree + PowerControl + PinRouter + InterruptRegistry + ?Sized {}

impl<T: ClockTree + ?Sized> ClockTree for &T {
    fn frequency(&self, peripheral: Peripheral) -> HertzU32 {
        (**self).frequency(peripheral)
    }
}

impl<T: PowerControl + ?Sized> PowerControl for &T {
    fn power_on(&self, peripheral: Peripheral) {
        (**self).power_on(peripheral)
    }
    fn power_off(&self, peripheral: Peripheral) {
        (**self).power_off(peripheral)
    }
    fn is_on(&self, peripheral: Peripheral) -> bool {
        (**self).is_on(peripheral)
    }
}

impl<T: PinRouter + ?Sized> PinRouter for &T {
    fn configure_pin(&self, pin: PinSelect, mode: PinMode) -> Result<(), InvalidPinSelect> {
        (**self).configure_pin(pin, mode)
    }
    fn remap_can_pins(&self, pins: CanPins) {
        (**self).remap_can_pins(pins)
    }
}

impl<T: InterruptRegistry + ?Sized> InterruptRegistry for &T {
    fn initialize_interrupts(&self) {
        (**self).initialize_interrupts()
    }
    fn enable_interrupt(&self, irq: Irq, isr: Isr) {
        (**self).enable_interrupt(irq, isr)
    }
    fn disable_interrupt(&self, irq: Irq) {
        (**self).disable_interrupt(irq)
    }
}

/// CAN bit timing expressed in time quanta
///
/// All values are *real* values; the `- 1` encodings expected by the `BTR`
/// register are applied by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingSegments {
    /// Divider from the peripheral clock to the time quantum
    pub prescaler: u32,
    /// Resynchronization jump width
    pub sync_jump_width: u32,
    /// Phase segment before the sample point, excluding propagation delay
    pub phase_segment1: u32,
    /// Phase segment after the sample point
    pub phase_segment2: u32,
    /// Propagation delay segment
    pub propagation_delay: u32,
}

impl TimingSegments {
    /// Number of time quanta that make up one bit time, including the
    /// synchronization segment
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + self.propagation_delay + self.phase_segment1 + self.phase_segment2
    }
}

/// Resolves a CAN baud rate into bit timing segments
///
/// Implemented for any `Fn(HertzU32, HertzU32) -> Option<TimingSegments>`.
///
/// # Example
/// ```
/// use f1periph_core::{BitTimingResolver, TimingSegments};
/// use fugit::{HertzU32, RateExtU32};
///
/// let fixed = |_clock: HertzU32, _baud: HertzU32| {
///     Some(TimingSegments {
///         prescaler: 4,
///         sync_jump_width: 1,
///         phase_segment1: 8,
///         phase_segment2: 2,
///         propagation_delay: 1,
///     })
/// };
/// let segments = fixed.resolve(36.MHz(), 750.kHz()).unwrap();
/// assert_eq!(segments.time_quanta_per_bit(), 12);
/// ```
pub trait BitTimingResolver {
    /// Segments that produce `baud_rate` from `clock`, or `None` if no
    /// combination fits.
    fn resolve(&self, clock: HertzU32, baud_rate: HertzU32) -> Option<TimingSegments>;
}

impl<F> BitTimingResolver for F
where
    F: Fn(HertzU32, HertzU32) -> Option<TimingSegments>,
{
    fn resolve(&self, clock: HertzU32, baud_rate: HertzU32) -> Option<TimingSegments> {
        self(clock, baud_rate)
    }
}
