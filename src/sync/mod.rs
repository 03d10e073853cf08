//! Synchronization primitives
//!
//! Contains the priority-inheritance mutex.

pub mod mutex;
