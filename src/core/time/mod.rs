//! Time management module
//!
//! Provides the tick clock, time delays, and timeout management.
//!
//! Delayed tasks and bounded mutex waits share one tick wheel: a task is
//! hashed into slot `wake_tick % CFG_TICK_WHEEL_SIZE` and fires when the
//! clock reaches its `wake_tick` exactly, so wrap-around of the tick counter
//! needs no special handling.

use portable_atomic::{AtomicU32, Ordering};

use crate::config::{CFG_TICK_RATE_HZ, CFG_TICK_WHEEL_SIZE};
use crate::error::{OsError, OsResult};
use crate::kernel::Scheduler;
use crate::sched::Resched;
use crate::task::TcbTable;
use crate::types::{OsTaskState, OsTick, TaskId};

/// Monotonic tick counter
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    tick: OsTick,
}

impl Clock {
    pub const fn new() -> Self {
        Clock { tick: 0 }
    }

    /// Get current tick count
    #[inline]
    pub fn now(&self) -> OsTick {
        self.tick
    }

    /// Increment and return tick count
    #[inline]
    pub(crate) fn advance(&mut self) -> OsTick {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }
}

/// Hashed wheel of tasks waiting for a tick
#[derive(Debug)]
pub struct TickWheel {
    slots: [Option<usize>; CFG_TICK_WHEEL_SIZE],
}

impl TickWheel {
    pub const fn new() -> Self {
        TickWheel {
            slots: [None; CFG_TICK_WHEEL_SIZE],
        }
    }

    /// Get the tick wheel slot
    #[inline(always)]
    fn slot(tick: OsTick) -> usize {
        (tick as usize) % CFG_TICK_WHEEL_SIZE
    }

    /// Get head of tick wheel at a slot
    #[inline]
    pub fn head(&self, slot: usize) -> Option<usize> {
        self.slots[slot]
    }

    /// Add task to tick wheel
    pub(crate) fn insert(&mut self, tcbs: &mut TcbTable, idx: usize, wake_tick: OsTick) {
        let slot = Self::slot(wake_tick);

        tcbs[idx].wake_tick = wake_tick;
        tcbs[idx].tick_wheel_slot = Some(slot as u8);

        // Insert at head of slot
        tcbs[idx].tick_next = self.slots[slot];
        tcbs[idx].tick_prev = None;

        if let Some(old_head) = self.slots[slot] {
            tcbs[old_head].tick_prev = Some(idx);
        }

        self.slots[slot] = Some(idx);
    }

    /// Remove task from tick wheel; a task that is not linked is left alone
    pub(crate) fn remove(&mut self, tcbs: &mut TcbTable, idx: usize) {
        let Some(slot) = tcbs[idx].tick_wheel_slot else {
            return;
        };
        let (prev, next) = (tcbs[idx].tick_prev, tcbs[idx].tick_next);

        match prev {
            Some(prev) => tcbs[prev].tick_next = next,
            None => self.slots[slot as usize] = next,
        }

        if let Some(next) = next {
            tcbs[next].tick_prev = prev;
        }

        tcbs[idx].tick_next = None;
        tcbs[idx].tick_prev = None;
        tcbs[idx].tick_wheel_slot = None;
    }
}

impl Default for TickWheel {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick count handed from an interrupt to task context
///
/// The timer interrupt calls [`TickCounter::signal`]; whoever holds the
/// scheduler later replays the ticks with [`Scheduler::tick_drain`].
#[derive(Debug, Default)]
pub struct TickCounter {
    pending: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        TickCounter {
            pending: AtomicU32::new(0),
        }
    }

    /// Record one elapsed tick
    #[inline]
    pub fn signal(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Take all recorded ticks
    #[inline]
    pub fn take(&self) -> OsTick {
        self.pending.swap(0, Ordering::AcqRel)
    }
}

/// Convert milliseconds to ticks, rounding down
#[inline]
pub const fn ms_to_ticks(ms: u32) -> OsTick {
    ((ms as u64 * CFG_TICK_RATE_HZ as u64) / 1000) as OsTick
}

impl Scheduler {
    /// Get current tick count
    #[inline]
    pub fn time_get(&self) -> OsTick {
        self.clock.now()
    }

    /// Tick handler
    ///
    /// Advances the clock by one, readies every task whose delay or wait
    /// bound expires on this tick, then runs the scheduling decision and
    /// round-robin accounting. Ticks before [`Scheduler::start`] are ignored.
    pub fn tick(&mut self) -> Resched {
        if !self.started {
            return Resched::Continue;
        }

        self.clock.advance();
        self.process_tick_wheel();

        match self.os_sched() {
            Resched::Continue => self.os_sched_round_robin(),
            switch => switch,
        }
    }

    /// Replay every tick recorded by an interrupt
    pub fn tick_drain(&mut self, counter: &TickCounter) -> Resched {
        let mut resched = Resched::Continue;
        for _ in 0..counter.take() {
            resched = resched.then(self.tick());
        }
        resched
    }

    /// Process tasks in the current tick wheel slot
    fn process_tick_wheel(&mut self) {
        let now = self.clock.now();
        let mut current = self.tick_wheel.head(TickWheel::slot(now));

        while let Some(idx) = current {
            let next = self.tcbs[idx].tick_next;

            // Slot is shared with later rotations of the wheel
            if self.tcbs[idx].wake_tick == now {
                self.tick_wheel.remove(&mut self.tcbs, idx);

                match self.tcbs[idx].task_state {
                    OsTaskState::Delayed => self.os_rdy_list_insert(idx),
                    OsTaskState::Blocked => self.os_mutex_pend_timeout(idx),
                    _ => {}
                }
            }

            current = next;
        }
    }

    /// Time delay in ticks
    ///
    /// Delays the calling task for the specified number of system ticks.
    /// The task is removed from the CPU and placed on the tick wheel; the
    /// tick handler makes it ready again once the delay expires.
    ///
    /// # Arguments
    /// * `task` - The running task
    /// * `ticks` - Number of ticks to delay (0 = yield)
    ///
    /// # Returns
    /// * `Ok(resched)` - Task delayed, another task dispatched
    /// * `Err(OsError::InvalidStateTransition)` - `task` is not running, or
    ///   is the idle task
    pub fn time_dly(&mut self, task: TaskId, ticks: OsTick) -> OsResult<Resched> {
        let idx = self.resolve_blocking(task)?;

        if ticks == 0 {
            return self.yield_now(task);
        }

        let expiry_tick = self.clock.now().wrapping_add(ticks);
        self.tcbs[idx].task_state = OsTaskState::Delayed;
        self.tick_wheel.insert(&mut self.tcbs, idx, expiry_tick);

        crate::trace!("task {} delayed until tick {}", idx, expiry_tick);
        Ok(self.os_sched())
    }

    /// Time delay in hours, minutes, seconds, milliseconds
    ///
    /// # Arguments
    /// * `hours` - Hours (0-999)
    /// * `minutes` - Minutes (0-59)
    /// * `seconds` - Seconds (0-59)
    /// * `milliseconds` - Milliseconds (0-999)
    pub fn time_dly_hmsm(
        &mut self,
        task: TaskId,
        hours: u16,
        minutes: u8,
        seconds: u8,
        milliseconds: u16,
    ) -> OsResult<Resched> {
        if hours > 999 || minutes > 59 || seconds > 59 || milliseconds > 999 {
            return Err(OsError::InvalidDelay);
        }

        let total_ms = (hours as u32) * 3_600_000
            + (minutes as u32) * 60_000
            + (seconds as u32) * 1000
            + (milliseconds as u32);

        self.time_dly(task, ms_to_ticks(total_ms))
    }

    /// Resume a delayed task before its delay expires
    pub fn time_dly_resume(&mut self, task: TaskId) -> OsResult<Resched> {
        let idx = self.tcbs.resolve(task)?;

        if !self.tcbs[idx].is_delayed() {
            return Err(OsError::InvalidStateTransition);
        }

        self.tick_wheel.remove(&mut self.tcbs, idx);
        self.os_rdy_list_insert(idx);

        Ok(self.os_sched())
    }
}
