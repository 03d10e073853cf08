//! Kernel state and initialization
//!
//! [`Scheduler`] owns every table the kernel uses: TCBs, the ready queue,
//! mutexes, the tick wheel and the clock. There is no global state; each
//! instance is an independent kernel, and callers pass it by reference to
//! every operation. The operations themselves live next to their subsystem
//! (`task`, `sched`, `time`, `sync::mutex`).

use crate::config::CFG_PRIO_IDLE;
use crate::error::{OsError, OsResult};
use crate::sched::{ReadyQueue, Resched};
use crate::sync::mutex::MutexTable;
use crate::task::{OsTaskFn, TcbTable};
use crate::time::{Clock, TickWheel};
use crate::types::{OsPendStatus, OsPrio, OsTaskState, OsTick, TaskId};

/// A single-core preemptive priority scheduler
#[derive(Debug)]
pub struct Scheduler {
    pub(crate) tcbs: TcbTable,
    pub(crate) rdy: ReadyQueue,
    pub(crate) mutexes: MutexTable,
    pub(crate) tick_wheel: TickWheel,
    pub(crate) clock: Clock,
    /// Slot of the task that last got the CPU
    pub(crate) cur: Option<usize>,
    pub(crate) idle: usize,
    pub(crate) started: bool,
    pub(crate) ctx_sw_ctr: u32,
}

/// Internal IDLE task function
fn os_idle_task(_: usize) {
    loop {
        core::hint::spin_loop();
    }
}

impl Scheduler {
    /// Create a kernel with only the idle task
    ///
    /// The idle task sits at [`CFG_PRIO_IDLE`], never blocks and cannot be
    /// deleted, so once started there is always exactly one running task.
    pub fn new() -> Self {
        let mut tcbs = TcbTable::new();
        let mut rdy = ReadyQueue::new();

        // An empty table always has room and an unqueued idle TCB
        let idle = tcbs.alloc("Idle", CFG_PRIO_IDLE, 0).unwrap_or(0);
        tcbs[idle].task_entry = Some(os_idle_task as OsTaskFn);
        let _ = rdy.insert(&mut tcbs, idle);

        Scheduler {
            tcbs,
            rdy,
            mutexes: MutexTable::new(),
            tick_wheel: TickWheel::new(),
            clock: Clock::new(),
            cur: None,
            idle,
            started: false,
            ctx_sw_ctr: 0,
        }
    }

    /// Start multitasking
    ///
    /// The most urgent ready task becomes the running task.
    ///
    /// # Returns
    /// * `Ok(Resched::Switch { .. })` - First task dispatched
    /// * `Err(OsError::OsRunning)` - Already started
    pub fn start(&mut self) -> OsResult<Resched> {
        if self.started {
            return Err(OsError::OsRunning);
        }

        self.started = true;
        crate::info!("scheduler started at tick {}", self.clock.now());
        Ok(self.os_sched())
    }

    /// Check if the scheduler has been started
    #[inline]
    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Task currently owning the CPU
    pub fn running(&self) -> Option<TaskId> {
        self.cur
            .filter(|&idx| self.tcbs[idx].task_state == OsTaskState::Running)
            .map(|idx| self.tcbs.id_of(idx))
    }

    /// Handle of the built-in idle task
    #[inline]
    pub fn idle_task(&self) -> TaskId {
        self.tcbs.id_of(self.idle)
    }

    /// Number of context switches since creation
    #[inline]
    pub fn ctx_switch_count(&self) -> u32 {
        self.ctx_sw_ctr
    }

    /// Current task state
    pub fn task_state(&self, task: TaskId) -> OsResult<OsTaskState> {
        let idx = self.tcbs.resolve(task)?;
        Ok(self.tcbs[idx].task_state)
    }

    /// Priority used by scheduling decisions, inheritance included
    pub fn effective_priority(&self, task: TaskId) -> OsResult<OsPrio> {
        let idx = self.tcbs.resolve(task)?;
        Ok(self.tcbs[idx].prio)
    }

    /// Priority given at creation or by [`Scheduler::task_change_prio`]
    pub fn base_priority(&self, task: TaskId) -> OsResult<OsPrio> {
        let idx = self.tcbs.resolve(task)?;
        Ok(self.tcbs[idx].base_prio)
    }

    /// Outcome of the task's last mutex wait
    pub fn pend_status(&self, task: TaskId) -> OsResult<OsPendStatus> {
        let idx = self.tcbs.resolve(task)?;
        Ok(self.tcbs[idx].pend_status)
    }

    /// Last mutex wait as a result
    ///
    /// # Returns
    /// * `Ok(())` - The wait ended with ownership
    /// * `Err(OsError::Timeout)` - The wait bound expired first
    /// * `Err(OsError::WouldBlock)` - The task is still waiting
    pub fn pend_result(&self, task: TaskId) -> OsResult<()> {
        match self.pend_status(task)? {
            OsPendStatus::Ok => Ok(()),
            OsPendStatus::Pending => Err(OsError::WouldBlock),
            OsPendStatus::Timeout => Err(OsError::Timeout),
        }
    }

    /// Tick at which a delayed or bounded-wait task wakes
    pub fn wake_tick(&self, task: TaskId) -> OsResult<Option<OsTick>> {
        let idx = self.tcbs.resolve(task)?;
        let tcb = &self.tcbs[idx];
        Ok(tcb.tick_wheel_slot.map(|_| tcb.wake_tick))
    }

    /// Task name
    pub fn task_name(&self, task: TaskId) -> OsResult<&'static str> {
        let idx = self.tcbs.resolve(task)?;
        Ok(self.tcbs[idx].name)
    }

    /// Entry function and argument, for the port to build the task context
    pub fn task_entry(&self, task: TaskId) -> OsResult<(Option<OsTaskFn>, usize)> {
        let idx = self.tcbs.resolve(task)?;
        Ok((self.tcbs[idx].task_entry, self.tcbs[idx].task_entry_arg))
    }

    /// Resolve a handle that must belong to the running task
    ///
    /// Blocking calls and mutex operations are made by the task that owns
    /// the CPU; anything else is a state error.
    pub(crate) fn resolve_running(&self, task: TaskId) -> OsResult<usize> {
        if !self.started {
            return Err(OsError::OsNotRunning);
        }

        let idx = self.tcbs.resolve(task)?;
        if self.tcbs[idx].task_state != OsTaskState::Running {
            crate::debug!(
                "task {} is not running ({:?})",
                idx,
                self.tcbs[idx].task_state
            );
            return Err(OsError::InvalidStateTransition);
        }
        Ok(idx)
    }

    /// Resolve the running task for a call that may give up the CPU
    ///
    /// The idle task must stay runnable, so it may not delay, yield or wait.
    pub(crate) fn resolve_blocking(&self, task: TaskId) -> OsResult<usize> {
        let idx = self.resolve_running(task)?;
        if idx == self.idle {
            crate::debug!("idle task may not block");
            return Err(OsError::InvalidStateTransition);
        }
        Ok(idx)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
