//! Task management module
//!
//! Provides task creation, deletion, and priority control.

mod tcb;

pub use tcb::{OsTaskFn, OsTcb, TcbTable};

use crate::config::{CFG_PRIO_MAX, CFG_PRIO_MIN, CFG_TIME_QUANTA_DEFAULT};
use crate::error::{OsError, OsResult};
use crate::kernel::Scheduler;
use crate::sched::Resched;
use crate::types::{OsPrio, OsTaskState, OsTick, TaskId};

/// Check that a priority is available to application tasks
#[inline]
fn os_prio_check(prio: OsPrio) -> OsResult<()> {
    if prio < CFG_PRIO_MIN || prio as usize >= CFG_PRIO_MAX {
        return Err(OsError::InvalidPriority);
    }
    Ok(())
}

impl Scheduler {
    /// Create a new task
    ///
    /// The task starts Ready with its effective priority equal to `prio`.
    /// Once the scheduler runs, creation is a preemption point: a new task
    /// more urgent than the running one takes the CPU immediately, and the
    /// returned [`Resched`] says so.
    ///
    /// # Arguments
    /// * `name` - Task name for debugging
    /// * `prio` - Task priority (`CFG_PRIO_MIN..CFG_PRIO_MAX`, higher = more urgent)
    /// * `task_fn` - Task entry point function
    /// * `arg` - Argument to pass to task function
    ///
    /// # Example
    /// ```
    /// use pisched::Scheduler;
    ///
    /// fn worker(_: usize) {}
    ///
    /// let mut sched = Scheduler::new();
    /// let (task, _) = sched.task_create("Worker", 5, worker, 0).unwrap();
    /// assert_eq!(sched.effective_priority(task), Ok(5));
    /// ```
    pub fn task_create(
        &mut self,
        name: &'static str,
        prio: OsPrio,
        task_fn: OsTaskFn,
        arg: usize,
    ) -> OsResult<(TaskId, Resched)> {
        self.task_create_ext(name, prio, task_fn, arg, CFG_TIME_QUANTA_DEFAULT)
    }

    /// Create a new task with an explicit round-robin time quanta
    ///
    /// A quanta of 0 disables time slicing for the task.
    pub fn task_create_ext(
        &mut self,
        name: &'static str,
        prio: OsPrio,
        task_fn: OsTaskFn,
        arg: usize,
        time_quanta: OsTick,
    ) -> OsResult<(TaskId, Resched)> {
        os_prio_check(prio)?;

        let idx = self.tcbs.alloc(name, prio, time_quanta)?;
        self.tcbs[idx].task_entry = Some(task_fn);
        self.tcbs[idx].task_entry_arg = arg;
        self.rdy.insert(&mut self.tcbs, idx)?;

        crate::info!("task {} '{}' created at prio {}", idx, name, prio);

        let id = self.tcbs.id_of(idx);
        Ok((id, self.os_sched()))
    }

    /// Delete a task
    ///
    /// Only a Running or Ready task that owns no mutex may be deleted; the
    /// idle task can never be. Deleting the running task dispatches the next
    /// ready task.
    ///
    /// # Returns
    /// * `Ok(resched)` - Task terminated
    /// * `Err(OsError::InvalidStateTransition)` - Task is blocked, delayed,
    ///   already terminated, holds a mutex, or is the idle task
    pub fn task_delete(&mut self, task: TaskId) -> OsResult<Resched> {
        let idx = self.tcbs.resolve(task)?;
        let tcb = &self.tcbs[idx];

        if idx == self.idle {
            return Err(OsError::InvalidStateTransition);
        }

        if !matches!(tcb.task_state, OsTaskState::Running | OsTaskState::Ready) {
            crate::debug!("task {} cannot be deleted while {:?}", idx, tcb.task_state);
            return Err(OsError::InvalidStateTransition);
        }

        if tcb.holds_mutex() {
            crate::debug!("task {} cannot be deleted while holding a mutex", idx);
            return Err(OsError::InvalidStateTransition);
        }

        self.rdy.remove(&mut self.tcbs, idx);
        self.tcbs[idx].task_state = OsTaskState::Terminated;

        crate::info!("task {} '{}' deleted", idx, self.tcbs[idx].name);

        Ok(self.os_sched())
    }

    /// Change a task's base priority
    ///
    /// The effective priority follows, but never drops below what waiters
    /// on the task's mutexes demand. If the task is itself blocked, the new
    /// priority is passed along the chain of mutex owners.
    pub fn task_change_prio(&mut self, task: TaskId, prio: OsPrio) -> OsResult<Resched> {
        os_prio_check(prio)?;
        let idx = self.tcbs.resolve(task)?;

        if idx == self.idle || self.tcbs[idx].task_state == OsTaskState::Terminated {
            return Err(OsError::InvalidStateTransition);
        }

        self.tcbs[idx].base_prio = prio;
        let effective = self.os_mutex_inherited_prio(idx);
        self.os_change_prio(idx, effective);

        if let Some(m) = self.tcbs[idx].blocked_on {
            self.os_mutex_prio_propagate(m);
        }

        Ok(self.os_sched())
    }
}
