//! Routing of hardware interrupt lines to driver instances
//!
//! The platform's vector table stores plain function pointers. A driver that
//! wants to be reached from an interrupt claims the [`OwnerSlot`] of its
//! hardware unit and registers a [`trampoline`], which looks the instance up
//! again when the interrupt fires.

use core::ptr;
use critical_section::CriticalSection;
use core::sync::atomic::{AtomicPtr, Ordering};
use f1periph_core::Irq;

/// Interrupt lines on which `CAN1` signals received frames and errors
pub const CAN1_RECEIVE_LINES: [Irq; 3] = [Irq::Can1Rx0, Irq::Can1Rx1, Irq::Can1Sce];

/// Slot owned by the `CAN1` driver instance that registered for interrupts
pub(crate) static CAN1: OwnerSlot = OwnerSlot::new();

/// Work done by a driver instance in interrupt context
pub(crate) trait Dispatch {
    fn dispatch(&self);
}

/// Type-erased pointer to the driver instance serving a hardware unit
pub(crate) struct OwnerSlot(AtomicPtr<()>);

impl OwnerSlot {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    /// Make `owner` the instance served by this slot, replacing any
    /// previous one.
    ///
    /// Vectors installed for a previous owner of another type must not run
    /// between this and installing the trampoline for `T`, hence the
    /// critical section.
    pub fn claim<T>(&self, owner: &'static T, _cs: CriticalSection<'_>) {
        self.0.store(owner as *const T as *mut (), Ordering::Release);
    }

    /// Empty the slot if `owner` is the current owner
    pub fn release<T>(&self, owner: *const T, _cs: CriticalSection<'_>) {
        let _ = self.0.compare_exchange(
            owner as *mut (),
            ptr::null_mut(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    #[cfg(test)]
    pub fn is_owned_by<T>(&self, owner: *const T) -> bool {
        self.0.load(Ordering::Acquire) == owner as *mut ()
    }

    /// # Safety
    /// Every pointer stored in the slot while `T` is requested must have been
    /// claimed from a `&'static T`.
    pub unsafe fn get<T>(&self) -> Option<&'static T> {
        let owner = self.0.load(Ordering::Acquire) as *const T;
        owner.as_ref()
    }
}

/// Interrupt service routine forwarding to the `CAN1` owner of type `T`.
///
/// Only registered by `T` itself, in the same critical section that claimed
/// [`CAN1`], so the slot holds a `T` whenever this runs.
pub(crate) fn trampoline<T: Dispatch + 'static>() {
    // Safety: see above
    if let Some(owner) = unsafe { CAN1.get::<T>() } {
        owner.dispatch();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slot_is_released_by_owner_only() {
        static A: u8 = 1;
        static B: u8 = 2;
        let slot = OwnerSlot::new();
        assert!(unsafe { slot.get::<u8>() }.is_none());

        critical_section::with(|cs| {
            slot.claim(&A, cs);
            assert!(slot.is_owned_by(&A as *const u8));
            slot.release(&B as *const u8, cs);
            assert_eq!(unsafe { slot.get::<u8>() }, Some(&1));

            slot.claim(&B, cs);
            slot.release(&A as *const u8, cs);
            assert_eq!(unsafe { slot.get::<u8>() }, Some(&2));
            slot.release(&B as *const u8, cs);
        });
        assert!(unsafe { slot.get::<u8>() }.is_none());
    }
}
