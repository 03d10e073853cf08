//! Critical section protected cell
//!
//! Holds a kernel instance (or any other shared state) in a `static` so that
//! task code and interrupt handlers reach it only inside a critical section.
//!
//! ```ignore
//! static KERNEL: CsCell<Scheduler> = CsCell::new();
//!
//! KERNEL.init(Scheduler::new());
//! let resched = KERNEL.with(|k| k.start())??;
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::{OsError, OsResult};

/// A cell that can only be accessed within a critical section.
pub struct CsCell<T>(Mutex<RefCell<Option<T>>>);

impl<T> CsCell<T> {
    /// Create an empty CsCell
    #[inline(always)]
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }

    /// Store a value, returning the previous one
    pub fn init(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).replace(value))
    }

    /// Run `f` on the value inside a critical section
    ///
    /// # Returns
    /// * `Err(OsError::NotInitialized)` - Nothing stored yet
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> OsResult<R> {
        critical_section::with(|cs| {
            let mut cell = self.0.borrow_ref_mut(cs);
            cell.as_mut().map(f).ok_or(OsError::NotInitialized)
        })
    }

    /// Remove the value
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).take())
    }
}

impl<T> Default for CsCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
