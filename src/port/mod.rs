//! Port layer - CPU-specific implementations
//!
//! The scheduler decides which task runs; the port performs the switch.
//! On Cortex-M a switch is deferred to PendSV, which runs once the current
//! exception or critical section ends.

#[cfg(target_arch = "arm")]
mod cortex_m4 {
    use cortex_m::peripheral::SCB;

    /// Request a context switch
    #[inline(always)]
    pub fn os_ctx_sw() {
        SCB::set_pendsv();
    }
}

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

// Stub implementations for non-ARM targets (for testing)
#[cfg(not(target_arch = "arm"))]
mod stub {
    pub fn os_ctx_sw() {
        // No-op for testing
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
