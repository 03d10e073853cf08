//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.

mod rdy_list;

pub use rdy_list::{ReadyList, ReadyQueue};

use crate::config::CFG_SCHED_ROUND_ROBIN_EN;
use crate::error::OsResult;
use crate::kernel::Scheduler;
use crate::types::{OsPrio, OsTaskState, TaskId};

/// Outcome of a preemption point
///
/// Operations never switch stacks themselves; a `Switch` tells the caller's
/// execution model (thread, fiber, PendSV handler) that `to` now owns the
/// CPU and `from` must stop executing.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resched {
    /// The running task keeps the CPU
    Continue,
    /// Another task was dispatched
    Switch {
        /// Task that held the CPU, if any
        from: Option<TaskId>,
        /// Task that now holds the CPU
        to: TaskId,
    },
}

impl Resched {
    /// Check if a context switch happened
    #[inline]
    pub fn is_switch(self) -> bool {
        matches!(self, Resched::Switch { .. })
    }

    /// Fold two consecutive decisions into one
    pub fn then(self, next: Resched) -> Resched {
        match (self, next) {
            (Resched::Continue, next) => next,
            (first, Resched::Continue) => first,
            (Resched::Switch { from, .. }, Resched::Switch { to, .. }) => {
                Resched::Switch { from, to }
            }
        }
    }
}

impl Scheduler {
    /// Main scheduling point
    ///
    /// Evaluated after every operation that may change task readiness or
    /// priority. The running task keeps the CPU unless a ready task has a
    /// strictly higher effective priority; a running task that blocked,
    /// delayed or terminated is always replaced.
    pub(crate) fn os_sched(&mut self) -> Resched {
        if !self.started {
            return Resched::Continue;
        }

        let Some(high_rdy) = self.rdy.highest() else {
            return Resched::Continue;
        };

        if let Some(cur) = self.cur {
            let tcb = &self.tcbs[cur];
            if tcb.task_state == OsTaskState::Running && tcb.prio >= self.tcbs[high_rdy].prio {
                return Resched::Continue;
            }
        }

        self.os_switch_to(high_rdy)
    }

    /// Hand the CPU to a ready task
    ///
    /// A preempted task re-enters the ready queue at the tail of its level.
    fn os_switch_to(&mut self, next: usize) -> Resched {
        let prev = self.cur;

        if let Some(prev) = prev {
            if self.tcbs[prev].task_state == OsTaskState::Running {
                self.tcbs[prev].task_state = OsTaskState::Ready;
                self.os_rdy_list_insert(prev);
            }
        }

        self.rdy.remove(&mut self.tcbs, next);
        let tcb = &mut self.tcbs[next];
        tcb.task_state = OsTaskState::Running;
        tcb.time_quanta_ctr = tcb.time_quanta;

        self.cur = Some(next);
        self.ctx_sw_ctr = self.ctx_sw_ctr.wrapping_add(1);
        crate::port::os_ctx_sw();

        crate::trace!(
            "switch {} -> {} (prio {}) at tick {}",
            prev.map_or(-1, |p| p as i32),
            next,
            self.tcbs[next].prio,
            self.clock.now()
        );

        Resched::Switch {
            from: prev.map(|p| self.tcbs.id_of(p)),
            to: self.tcbs.id_of(next),
        }
    }

    /// Round-robin scheduling for tasks at the same priority
    ///
    /// Charges one tick to the running task; when its quanta runs out and
    /// another task of equal priority is ready, that task takes over.
    pub(crate) fn os_sched_round_robin(&mut self) -> Resched {
        if !CFG_SCHED_ROUND_ROBIN_EN {
            return Resched::Continue;
        }

        let Some(cur) = self.cur else {
            return Resched::Continue;
        };

        let tcb = &mut self.tcbs[cur];
        if tcb.task_state != OsTaskState::Running || tcb.time_quanta == 0 {
            return Resched::Continue;
        }

        tcb.time_quanta_ctr = tcb.time_quanta_ctr.saturating_sub(1);
        if tcb.time_quanta_ctr > 0 {
            return Resched::Continue;
        }
        tcb.time_quanta_ctr = tcb.time_quanta;

        let prio = tcb.prio;
        match self.rdy.highest() {
            Some(next) if self.tcbs[next].prio == prio => self.os_switch_to(next),
            _ => Resched::Continue,
        }
    }

    /// Give up the CPU to ready tasks of the same priority
    ///
    /// The caller goes behind every equal-priority ready task. Without one,
    /// the caller keeps running.
    pub fn yield_now(&mut self, task: TaskId) -> OsResult<Resched> {
        let idx = self.resolve_blocking(task)?;

        match self.rdy.highest() {
            Some(next) if self.tcbs[next].prio >= self.tcbs[idx].prio => {
                Ok(self.os_switch_to(next))
            }
            _ => Ok(Resched::Continue),
        }
    }

    /// Make a task ready
    pub(crate) fn os_rdy_list_insert(&mut self, idx: usize) {
        self.tcbs[idx].task_state = OsTaskState::Ready;
        if self.rdy.insert(&mut self.tcbs, idx).is_err() {
            crate::error!("task {} queued twice", idx);
            debug_assert!(false, "task queued twice");
        }
    }

    /// Set a task's effective priority
    ///
    /// Keeps whichever queue the task sits in ordered: a ready task moves to
    /// its new level, a blocked task is re-sorted among the mutex waiters.
    pub(crate) fn os_change_prio(&mut self, idx: usize, new_prio: OsPrio) {
        if self.tcbs[idx].prio == new_prio {
            return;
        }

        match self.tcbs[idx].task_state {
            OsTaskState::Ready => self.rdy.change_prio(&mut self.tcbs, idx, new_prio),
            OsTaskState::Blocked => {
                self.tcbs[idx].prio = new_prio;
                if let Some(m) = self.tcbs[idx].blocked_on {
                    self.mutexes.reorder_waiter(&mut self.tcbs, m, idx);
                }
            }
            _ => self.tcbs[idx].prio = new_prio,
        }
    }
}
