//! Core type definitions
//!
//! These types provide strong typing for kernel primitives.

/// Task priority (higher value = more urgent)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Handle to a task control block
///
/// Carries the slot generation so a handle to a deleted task is rejected
/// once its slot has been handed to a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId {
    pub(crate) index: u8,
    pub(crate) gen: u16,
}

impl TaskId {
    /// Slot index inside the TCB table
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// Handle to a mutex slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MutexId {
    pub(crate) index: u8,
    pub(crate) gen: u16,
}

impl MutexId {
    /// Slot index inside the mutex table
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Task is ready to run
    Ready = 0,
    /// Task owns the CPU
    Running = 1,
    /// Task is waiting on a mutex
    Blocked = 2,
    /// Task is delayed until its wake tick
    Delayed = 3,
    /// Task was deleted (or the slot was never used)
    Terminated = 4,
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsPendStatus {
    /// Last wait ended with ownership
    Ok = 0,
    /// Task is still waiting
    Pending = 1,
    /// Wait bound expired
    Timeout = 2,
}

/// Wait bound for a blocking call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Fail instead of blocking
    NoWait,
    /// Wait at most this many ticks (`Ticks(0)` behaves like `NoWait`)
    Ticks(OsTick),
    /// Wait until given
    Forever,
}

impl Timeout {
    /// Number of ticks to wait, `None` for an unbounded wait
    ///
    /// Returns `Some(0)` when the caller must not block at all.
    #[inline]
    pub const fn ticks(self) -> Option<OsTick> {
        match self {
            Timeout::NoWait => Some(0),
            Timeout::Ticks(t) => Some(t),
            Timeout::Forever => None,
        }
    }
}
