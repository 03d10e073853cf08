//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task. TCBs live
//! in a fixed [`TcbTable`]; the intrusive links below are slot indices into
//! that table (or into the mutex table for the held-mutex chain).

use core::ops::{Index, IndexMut};

use crate::config::CFG_TASK_MAX;
use crate::error::{OsError, OsResult};
use crate::types::{OsPendStatus, OsPrio, OsTaskState, OsTick, TaskId};

/// Task entry point function type
///
/// The argument is the value given at creation. Running the entry is the
/// port's business; the scheduler only records it.
pub type OsTaskFn = fn(usize);

/// Task Control Block
#[derive(Debug, Clone, Copy)]
pub struct OsTcb {
    // ============ Task identification ============
    /// Task name
    pub(crate) name: &'static str,
    /// Slot generation, bumped on every allocation
    pub(crate) gen: u16,

    // ============ Ready list links ============
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
    /// Linked into the ready queue
    pub(crate) queued: bool,

    // ============ Pend list links ============
    pub(crate) pend_next: Option<usize>,
    pub(crate) pend_prev: Option<usize>,
    /// Mutex slot this task is blocked on
    pub(crate) blocked_on: Option<usize>,
    /// Result of the last mutex wait
    pub(crate) pend_status: OsPendStatus,

    // ============ Tick list links ============
    pub(crate) tick_next: Option<usize>,
    pub(crate) tick_prev: Option<usize>,
    /// Tick wheel slot while linked
    pub(crate) tick_wheel_slot: Option<u8>,
    /// Tick at which a delay or wait bound expires
    pub(crate) wake_tick: OsTick,

    // ============ Priority ============
    /// Effective priority
    pub(crate) prio: OsPrio,
    /// Base priority
    pub(crate) base_prio: OsPrio,

    // ============ State ============
    pub(crate) task_state: OsTaskState,

    // ============ Mutex priority inheritance ============
    /// First mutex slot of the chain of mutexes owned by this task
    pub(crate) mutex_grp_head: Option<usize>,

    // ============ Time slicing ============
    /// Time quanta for this task (0 disables slicing)
    pub(crate) time_quanta: OsTick,
    /// Remaining time quanta
    pub(crate) time_quanta_ctr: OsTick,

    // ============ Task entry point ============
    pub(crate) task_entry: Option<OsTaskFn>,
    pub(crate) task_entry_arg: usize,
}

impl OsTcb {
    /// Create a new, unused TCB
    pub const fn new() -> Self {
        OsTcb {
            name: "",
            gen: 0,

            next: None,
            prev: None,
            queued: false,

            pend_next: None,
            pend_prev: None,
            blocked_on: None,
            pend_status: OsPendStatus::Ok,

            tick_next: None,
            tick_prev: None,
            tick_wheel_slot: None,
            wake_tick: 0,

            prio: 0,
            base_prio: 0,

            task_state: OsTaskState::Terminated,

            mutex_grp_head: None,

            time_quanta: 0,
            time_quanta_ctr: 0,

            task_entry: None,
            task_entry_arg: 0,
        }
    }

    /// Check if task is ready to run
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.task_state == OsTaskState::Ready
    }

    /// Check if task is waiting on a mutex
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.task_state == OsTaskState::Blocked
    }

    /// Check if task is delayed
    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.task_state == OsTaskState::Delayed
    }

    /// Check if the task owns at least one mutex
    #[inline]
    pub fn holds_mutex(&self) -> bool {
        self.mutex_grp_head.is_some()
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed table of TCBs, the task registry
#[derive(Debug)]
pub struct TcbTable {
    tcbs: [OsTcb; CFG_TASK_MAX],
}

impl TcbTable {
    pub const fn new() -> Self {
        TcbTable {
            tcbs: [OsTcb::new(); CFG_TASK_MAX],
        }
    }

    /// Claim a terminated slot and reset it
    ///
    /// The slot generation is bumped so handles to the previous occupant
    /// stop resolving.
    pub(crate) fn alloc(
        &mut self,
        name: &'static str,
        prio: OsPrio,
        time_quanta: OsTick,
    ) -> OsResult<usize> {
        let idx = self
            .tcbs
            .iter()
            .position(|tcb| tcb.task_state == OsTaskState::Terminated)
            .ok_or(OsError::NoFreeSlot)?;

        let gen = match self.tcbs[idx].gen.wrapping_add(1) {
            0 => 1,
            gen => gen,
        };
        let tcb = &mut self.tcbs[idx];
        *tcb = OsTcb::new();
        tcb.gen = gen;
        tcb.name = name;
        tcb.prio = prio;
        tcb.base_prio = prio;
        tcb.time_quanta = time_quanta;
        tcb.time_quanta_ctr = time_quanta;
        tcb.task_state = OsTaskState::Ready;

        Ok(idx)
    }

    /// Map a handle to its slot
    pub fn resolve(&self, id: TaskId) -> OsResult<usize> {
        match self.tcbs.get(id.index()) {
            Some(tcb) if tcb.gen == id.gen && tcb.gen != 0 => Ok(id.index()),
            _ => Err(OsError::UnknownHandle),
        }
    }

    /// Handle for the current occupant of a slot
    #[inline]
    pub fn id_of(&self, idx: usize) -> TaskId {
        TaskId {
            index: idx as u8,
            gen: self.tcbs[idx].gen,
        }
    }

    /// Slots whose task has not terminated
    pub fn live(&self) -> impl Iterator<Item = usize> + '_ {
        self.tcbs
            .iter()
            .enumerate()
            .filter(|(_, tcb)| tcb.task_state != OsTaskState::Terminated)
            .map(|(idx, _)| idx)
    }
}

impl Default for TcbTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for TcbTable {
    type Output = OsTcb;

    #[inline]
    fn index(&self, idx: usize) -> &OsTcb {
        &self.tcbs[idx]
    }
}

impl IndexMut<usize> for TcbTable {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut OsTcb {
        &mut self.tcbs[idx]
    }
}
