//! Preemptive priority scheduler core with a priority-inheritance mutex
//!
//! A μC/OS-III style kernel core providing:
//! - Priority-based preemptive scheduling (higher number = more urgent)
//! - Round-robin time slicing among equal priorities
//! - Tick-based delays and bounded mutex waits
//! - Mutexes with transitive priority inheritance and deadlock detection
//!
//! All state lives in a [`Scheduler`] value. Operations that may change which
//! task runs return a [`Resched`] describing the decision; on Cortex-M the
//! port also pends the context switch.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;

pub mod core;
pub mod sync;
pub mod port;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::cs_cell;
pub use crate::core::cs_cell::CsCell;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::kernel;
pub use crate::core::kernel::Scheduler;
pub use crate::core::prio;
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::task;
pub use crate::core::task::OsTaskFn;
pub use crate::core::sched;
pub use crate::core::sched::Resched;
pub use crate::core::time;
pub use crate::core::time::{ms_to_ticks, TickCounter};

pub use sync::mutex;
pub use sync::mutex::Take;
