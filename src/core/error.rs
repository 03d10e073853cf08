//! Error types for the scheduler core
//!
//! Every operation reports misuse synchronously through [`OsResult`].

use core::fmt;

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ Mutex errors ============
    /// Caller is not the mutex owner
    NotOwner = 22401,
    /// Task already owns the mutex
    AlreadyOwned = 22402,
    /// Taking the mutex would close a wait-for cycle
    Deadlock = 22405,

    // ============ Object errors ============
    /// Handle was never issued or its slot was reused
    UnknownHandle = 24003,
    /// Mutex still has an owner or waiters
    MutexInUse = 24005,

    // ============ OS state errors ============
    /// Scheduler has not been started
    OsNotRunning = 24201,
    /// Scheduler is already running
    OsRunning = 24202,
    /// Shared scheduler cell accessed before initialization
    NotInitialized = 24203,

    // ============ Pend errors ============
    /// Mutex is held and the caller asked not to block
    WouldBlock = 25008,

    // ============ Priority errors ============
    /// Priority outside the supported range
    InvalidPriority = 25203,

    // ============ Scheduler errors ============
    /// Task is already in the ready queue
    DoubleInsert = 28010,

    // ============ State errors ============
    /// Operation not permitted in the task's current state
    InvalidStateTransition = 28205,

    // ============ Task errors ============
    /// No more TCB or mutex slots available
    NoFreeSlot = 29008,

    // ============ Time errors ============
    /// Delay components out of range
    InvalidDelay = 29311,

    // ============ Timeout ============
    /// Operation timed out
    Timeout = 29401,
}

/// Result type alias for kernel operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric error code
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OsError::NotOwner => "caller does not own the mutex",
            OsError::AlreadyOwned => "caller already owns the mutex",
            OsError::Deadlock => "wait would deadlock",
            OsError::UnknownHandle => "unknown handle",
            OsError::MutexInUse => "mutex is owned or has waiters",
            OsError::OsNotRunning => "scheduler not started",
            OsError::OsRunning => "scheduler already started",
            OsError::NotInitialized => "scheduler not initialized",
            OsError::WouldBlock => "mutex is held",
            OsError::InvalidPriority => "priority out of range",
            OsError::DoubleInsert => "task already in ready queue",
            OsError::InvalidStateTransition => "invalid task state transition",
            OsError::NoFreeSlot => "no free slot",
            OsError::InvalidDelay => "invalid delay",
            OsError::Timeout => "timed out",
        };
        write!(f, "{} ({})", msg, self.code())
    }
}
