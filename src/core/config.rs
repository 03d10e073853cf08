//! Compile-time configuration for the scheduler core
//!
//! These constants control the behavior and resource limits of the kernel.
//! Priorities grow with urgency: `CFG_PRIO_MAX - 1` is the most urgent level.

use crate::types::{OsPrio, OsTick};

/// Maximum number of priority levels
pub const CFG_PRIO_MAX: usize = 32;

/// Idle task priority (least urgent level, reserved)
pub const CFG_PRIO_IDLE: OsPrio = 0;

/// Least urgent priority an application task may use
pub const CFG_PRIO_MIN: OsPrio = 1;

/// Number of task control blocks, idle task included
pub const CFG_TASK_MAX: usize = 16;

/// Number of mutex slots
pub const CFG_MUTEX_MAX: usize = 16;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Number of entries in tick wheel
pub const CFG_TICK_WHEEL_SIZE: usize = 16;

/// Enable round-robin scheduling for same-priority tasks
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Default time quanta for round-robin scheduling
pub const CFG_TIME_QUANTA_DEFAULT: OsTick = 10;
