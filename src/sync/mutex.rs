//! Mutex implementation with priority inheritance
//!
//! Mutexes provide mutual exclusion with automatic priority boosting
//! to prevent priority inversion.
//!
//! A task's effective priority is the maximum of its base priority and the
//! priority of the most urgent waiter on each mutex it owns. Waiters are
//! counted with their own effective priority, so a boost flows along chains
//! of "owner is blocked on another mutex" until it reaches a task that is
//! not blocked. The boost is always a maximum, never a sum.

use core::ops::{Index, IndexMut};

use crate::config::{CFG_MUTEX_MAX, CFG_TASK_MAX};
use crate::error::{OsError, OsResult};
use crate::kernel::Scheduler;
use crate::sched::Resched;
use crate::task::TcbTable;
use crate::types::{MutexId, OsPendStatus, OsPrio, OsTaskState, TaskId, Timeout};

/// Pend list for tasks waiting on a mutex
///
/// Sorted by effective priority, most urgent first; tasks of equal priority
/// keep their arrival order.
#[derive(Debug, Clone, Copy)]
pub struct PendList {
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl PendList {
    /// Create a new empty pend list
    pub const fn new() -> Self {
        PendList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Check if list is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get head of list
    #[inline(always)]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Number of waiters
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert in priority order, behind waiters of equal priority
    pub(crate) fn insert_by_prio(&mut self, tcbs: &mut TcbTable, idx: usize) {
        let prio = tcbs[idx].prio;

        let mut current = self.head;
        let mut prev: Option<usize> = None;

        while let Some(cur) = current {
            if prio > tcbs[cur].prio {
                break;
            }
            prev = current;
            current = tcbs[cur].pend_next;
        }

        tcbs[idx].pend_prev = prev;
        tcbs[idx].pend_next = current;

        match prev {
            Some(p) => tcbs[p].pend_next = Some(idx),
            None => self.head = Some(idx),
        }

        match current {
            Some(c) => tcbs[c].pend_prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.count += 1;
    }

    /// Remove specific TCB from list
    pub(crate) fn remove(&mut self, tcbs: &mut TcbTable, idx: usize) {
        let (prev, next) = (tcbs[idx].pend_prev, tcbs[idx].pend_next);

        match prev {
            Some(prev) => tcbs[prev].pend_next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => tcbs[next].pend_prev = prev,
            None => self.tail = prev,
        }

        tcbs[idx].pend_prev = None;
        tcbs[idx].pend_next = None;
        self.count = self.count.saturating_sub(1);
    }
}

impl Default for PendList {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutex with priority inheritance
#[derive(Debug, Clone, Copy)]
pub struct OsMutex {
    /// Name for debugging
    name: &'static str,
    /// Slot generation, bumped on every creation
    gen: u16,
    in_use: bool,
    /// List of tasks waiting on this mutex
    pend_list: PendList,
    /// Task that owns the mutex
    owner: Option<usize>,
    /// Next mutex owned by the same task
    owner_next: Option<usize>,
}

impl OsMutex {
    /// Create a new, unused mutex slot
    pub const fn new() -> Self {
        OsMutex {
            name: "",
            gen: 0,
            in_use: false,
            pend_list: PendList::new(),
            owner: None,
            owner_next: None,
        }
    }

    /// Check if mutex is owned
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// Tasks waiting for ownership
    #[inline]
    pub fn pend_list(&self) -> &PendList {
        &self.pend_list
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed table of mutexes
#[derive(Debug)]
pub struct MutexTable {
    mutexes: [OsMutex; CFG_MUTEX_MAX],
}

impl MutexTable {
    pub const fn new() -> Self {
        MutexTable {
            mutexes: [OsMutex::new(); CFG_MUTEX_MAX],
        }
    }

    fn alloc(&mut self, name: &'static str) -> OsResult<usize> {
        let idx = self
            .mutexes
            .iter()
            .position(|m| !m.in_use)
            .ok_or(OsError::NoFreeSlot)?;

        let gen = match self.mutexes[idx].gen.wrapping_add(1) {
            0 => 1,
            gen => gen,
        };
        self.mutexes[idx] = OsMutex {
            name,
            gen,
            in_use: true,
            ..OsMutex::new()
        };
        Ok(idx)
    }

    /// Map a handle to its slot
    pub fn resolve(&self, id: MutexId) -> OsResult<usize> {
        match self.mutexes.get(id.index()) {
            Some(m) if m.in_use && m.gen == id.gen => Ok(id.index()),
            _ => Err(OsError::UnknownHandle),
        }
    }

    /// Handle for the current occupant of a slot
    #[inline]
    pub fn id_of(&self, idx: usize) -> MutexId {
        MutexId {
            index: idx as u8,
            gen: self.mutexes[idx].gen,
        }
    }

    /// Re-sort a waiter whose effective priority changed
    pub(crate) fn reorder_waiter(&mut self, tcbs: &mut TcbTable, m: usize, idx: usize) {
        let pend_list = &mut self.mutexes[m].pend_list;
        pend_list.remove(tcbs, idx);
        pend_list.insert_by_prio(tcbs, idx);
    }
}

impl Default for MutexTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for MutexTable {
    type Output = OsMutex;

    #[inline]
    fn index(&self, idx: usize) -> &OsMutex {
        &self.mutexes[idx]
    }
}

impl IndexMut<usize> for MutexTable {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut OsMutex {
        &mut self.mutexes[idx]
    }
}

/// Outcome of [`Scheduler::mutex_take`]
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Take {
    /// The caller owns the mutex
    Acquired,
    /// The caller is blocked; another task was dispatched
    ///
    /// The caller resumes once it is given the mutex or its wait bound
    /// expires; [`Scheduler::pend_status`] tells which.
    Blocked(Resched),
}

impl Scheduler {
    /// Create a mutex
    pub fn mutex_create(&mut self, name: &'static str) -> OsResult<MutexId> {
        let m = self.mutexes.alloc(name)?;
        crate::debug!("mutex {} '{}' created", m, name);
        Ok(self.mutexes.id_of(m))
    }

    /// Delete a mutex
    ///
    /// # Returns
    /// * `Err(OsError::MutexInUse)` - Mutex is owned or has waiters
    pub fn mutex_delete(&mut self, mutex: MutexId) -> OsResult<()> {
        let m = self.mutexes.resolve(mutex)?;

        if self.mutexes[m].is_owned() || !self.mutexes[m].pend_list.is_empty() {
            return Err(OsError::MutexInUse);
        }

        self.mutexes[m].in_use = false;
        Ok(())
    }

    /// Current owner of a mutex
    pub fn mutex_owner(&self, mutex: MutexId) -> OsResult<Option<TaskId>> {
        let m = self.mutexes.resolve(mutex)?;
        Ok(self.mutexes[m].owner.map(|idx| self.tcbs.id_of(idx)))
    }

    /// Number of tasks blocked on a mutex
    pub fn mutex_waiter_count(&self, mutex: MutexId) -> OsResult<usize> {
        let m = self.mutexes.resolve(mutex)?;
        Ok(self.mutexes[m].pend_list.count())
    }

    /// Mutex name
    pub fn mutex_name(&self, mutex: MutexId) -> OsResult<&'static str> {
        let m = self.mutexes.resolve(mutex)?;
        Ok(self.mutexes[m].name)
    }

    /// Acquire the mutex
    ///
    /// If the mutex is owned by a less urgent task, the owner's priority
    /// is boosted to the caller's (and further up the chain if the owner is
    /// itself blocked) to prevent priority inversion.
    ///
    /// # Arguments
    /// * `task` - The running task
    /// * `mutex` - Mutex to acquire
    /// * `timeout` - Maximum ticks to wait
    ///
    /// # Returns
    /// * `Ok(Take::Acquired)` - The caller owns the mutex
    /// * `Ok(Take::Blocked(_))` - The caller waits; see [`Take::Blocked`]
    /// * `Err(OsError::AlreadyOwned)` - The caller already owns the mutex
    /// * `Err(OsError::WouldBlock)` - Mutex is held and `timeout` forbids waiting
    /// * `Err(OsError::Deadlock)` - Waiting would close a wait-for cycle
    pub fn mutex_take(
        &mut self,
        task: TaskId,
        mutex: MutexId,
        timeout: Timeout,
    ) -> OsResult<Take> {
        let idx = self.resolve_blocking(task)?;
        let m = self.mutexes.resolve(mutex)?;

        let Some(owner) = self.mutexes[m].owner else {
            self.os_mutex_grp_add(idx, m);
            self.tcbs[idx].pend_status = OsPendStatus::Ok;
            crate::debug!("mutex {} taken by task {}", m, idx);
            return Ok(Take::Acquired);
        };

        if owner == idx {
            return Err(OsError::AlreadyOwned);
        }

        let bound = timeout.ticks();
        if bound == Some(0) {
            return Err(OsError::WouldBlock);
        }

        if self.os_mutex_would_deadlock(idx, m) {
            crate::warn!("task {} would deadlock on mutex {}", idx, m);
            return Err(OsError::Deadlock);
        }

        // Block current task
        let tcb = &mut self.tcbs[idx];
        tcb.task_state = OsTaskState::Blocked;
        tcb.blocked_on = Some(m);
        tcb.pend_status = OsPendStatus::Pending;
        self.mutexes[m].pend_list.insert_by_prio(&mut self.tcbs, idx);

        if let Some(ticks) = bound {
            let expiry_tick = self.clock.now().wrapping_add(ticks);
            self.tick_wheel.insert(&mut self.tcbs, idx, expiry_tick);
        }

        crate::debug!("task {} blocked on mutex {} owned by task {}", idx, m, owner);

        // Priority inheritance
        self.os_mutex_prio_propagate(m);

        Ok(Take::Blocked(self.os_sched()))
    }

    /// Release the mutex
    ///
    /// Ownership passes directly to the most urgent waiter (the earliest
    /// among equals), which becomes ready. The caller's priority drops to
    /// what its remaining mutexes demand. The new owner may preempt the
    /// caller before this returns.
    ///
    /// # Returns
    /// * `Err(OsError::NotOwner)` - The caller does not own the mutex
    pub fn mutex_give(&mut self, task: TaskId, mutex: MutexId) -> OsResult<Resched> {
        let idx = self.resolve_running(task)?;
        let m = self.mutexes.resolve(mutex)?;

        if self.mutexes[m].owner != Some(idx) {
            return Err(OsError::NotOwner);
        }

        self.os_mutex_grp_remove(idx, m);

        if let Some(waiter) = self.mutexes[m].pend_list.head() {
            self.mutexes[m].pend_list.remove(&mut self.tcbs, waiter);
            self.tick_wheel.remove(&mut self.tcbs, waiter);

            let tcb = &mut self.tcbs[waiter];
            tcb.blocked_on = None;
            tcb.pend_status = OsPendStatus::Ok;

            // Hand-off: the mutex is never observed unowned with waiters
            self.os_mutex_grp_add(waiter, m);

            // Remaining waiters now push on the new owner
            let inherited = self.os_mutex_inherited_prio(waiter);
            self.tcbs[waiter].prio = inherited;
            self.os_rdy_list_insert(waiter);

            crate::debug!("mutex {} handed from task {} to task {}", m, idx, waiter);
        } else {
            crate::debug!("mutex {} released by task {}", m, idx);
        }

        // Restore owner's priority if it was boosted
        let restored = self.os_mutex_inherited_prio(idx);
        if restored != self.tcbs[idx].prio {
            crate::debug!(
                "task {} priority restored {} -> {}",
                idx,
                self.tcbs[idx].prio,
                restored
            );
            self.os_change_prio(idx, restored);
        }

        Ok(self.os_sched())
    }

    /// Priority a task is entitled to from its base and its mutexes' waiters
    pub(crate) fn os_mutex_inherited_prio(&self, idx: usize) -> OsPrio {
        let mut prio = self.tcbs[idx].base_prio;
        let mut held = self.tcbs[idx].mutex_grp_head;

        while let Some(m) = held {
            if let Some(waiter) = self.mutexes[m].pend_list.head() {
                prio = prio.max(self.tcbs[waiter].prio);
            }
            held = self.mutexes[m].owner_next;
        }

        prio
    }

    /// Recompute owner priorities starting at a mutex
    ///
    /// Walks owner -> blocked_on -> owner ... and stops at the first owner
    /// whose priority does not change or that is not blocked. Raises and
    /// lowers alike, so it also undoes a boost after a waiter leaves.
    pub(crate) fn os_mutex_prio_propagate(&mut self, mut m: usize) {
        // Cycles are refused at take time; the bound only guards the walk
        for _ in 0..CFG_TASK_MAX {
            let Some(owner) = self.mutexes[m].owner else {
                return;
            };

            let old = self.tcbs[owner].prio;
            let new = self.os_mutex_inherited_prio(owner);
            if new == old {
                return;
            }

            if new > old {
                crate::debug!("task {} inherits prio {} -> {}", owner, old, new);
            } else {
                crate::debug!("task {} boost lowered {} -> {}", owner, old, new);
            }
            self.os_change_prio(owner, new);

            match self.tcbs[owner].blocked_on {
                Some(next) => m = next,
                None => return,
            }
        }
    }

    /// Wait bound expired for a blocked task
    pub(crate) fn os_mutex_pend_timeout(&mut self, idx: usize) {
        let Some(m) = self.tcbs[idx].blocked_on.take() else {
            return;
        };

        self.mutexes[m].pend_list.remove(&mut self.tcbs, idx);
        self.tcbs[idx].pend_status = OsPendStatus::Timeout;
        self.os_rdy_list_insert(idx);

        crate::warn!("task {} timed out on mutex {}", idx, m);

        // The former owner may lose the boost this waiter gave it
        self.os_mutex_prio_propagate(m);
    }

    /// Check if `idx` waiting on `m` would close a wait-for cycle
    fn os_mutex_would_deadlock(&self, idx: usize, m: usize) -> bool {
        let mut owner = self.mutexes[m].owner;

        for _ in 0..CFG_TASK_MAX {
            match owner {
                Some(o) if o == idx => return true,
                Some(o) => match self.tcbs[o].blocked_on {
                    Some(next) => owner = self.mutexes[next].owner,
                    None => return false,
                },
                None => return false,
            }
        }

        // Longer than any chain the table can hold
        true
    }

    /// Record `m` as owned by `idx`
    fn os_mutex_grp_add(&mut self, idx: usize, m: usize) {
        self.mutexes[m].owner = Some(idx);
        self.mutexes[m].owner_next = self.tcbs[idx].mutex_grp_head;
        self.tcbs[idx].mutex_grp_head = Some(m);
    }

    /// Drop `m` from the mutexes owned by `idx`
    fn os_mutex_grp_remove(&mut self, idx: usize, m: usize) {
        let after = self.mutexes[m].owner_next;

        if self.tcbs[idx].mutex_grp_head == Some(m) {
            self.tcbs[idx].mutex_grp_head = after;
        } else {
            let mut cur = self.tcbs[idx].mutex_grp_head;
            while let Some(c) = cur {
                if self.mutexes[c].owner_next == Some(m) {
                    self.mutexes[c].owner_next = after;
                    break;
                }
                cur = self.mutexes[c].owner_next;
            }
        }

        self.mutexes[m].owner = None;
        self.mutexes[m].owner_next = None;
    }
}
