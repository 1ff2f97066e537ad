//! Traits needed to call driver methods, imported anonymously
pub use crate::bus::CanBus as _;
pub use crate::reg::AddressSpace as _;
pub use crate::reg::RegisterBlock as _;
pub use crate::wait::WaitPolicy as _;
pub use embedded_can::Frame as _;
pub use f1periph_core::BitTimingResolver as _;
