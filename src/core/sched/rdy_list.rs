//! Ready list - doubly linked list of TCBs at a given priority
//!
//! Each priority level has its own ready list. Tasks are added to the
//! tail (FIFO for round-robin) and scheduled from the head. The
//! [`ReadyQueue`] pairs the per-level lists with the priority bitmap.

use crate::config::CFG_PRIO_MAX;
use crate::error::{OsError, OsResult};
use crate::prio::PrioTable;
use crate::task::TcbTable;
use crate::types::OsPrio;

/// Ready list for a single priority level
///
/// Doubly-linked list of tasks ready to run at this priority.
/// Tasks are inserted at the tail for FIFO ordering and
/// scheduled from the head.
#[derive(Debug, Clone, Copy)]
pub struct ReadyList {
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl ReadyList {
    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Get head of list (first to be scheduled)
    #[inline]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Get tail of list
    #[inline]
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    /// Check if list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get number of entries
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert TCB at the tail of the list (FIFO order)
    fn insert_tail(&mut self, tcbs: &mut TcbTable, idx: usize) {
        tcbs[idx].next = None;
        tcbs[idx].prev = self.tail;

        match self.tail {
            // List not empty - link from current tail
            Some(tail) => tcbs[tail].next = Some(idx),
            // List is empty - this becomes head
            None => self.head = Some(idx),
        }

        self.tail = Some(idx);
        self.count += 1;
    }

    /// Remove a TCB from the list
    fn remove(&mut self, tcbs: &mut TcbTable, idx: usize) {
        let (prev, next) = (tcbs[idx].prev, tcbs[idx].next);

        match prev {
            Some(prev) => tcbs[prev].next = next,
            // This was the head
            None => self.head = next,
        }

        match next {
            Some(next) => tcbs[next].prev = prev,
            // This was the tail
            None => self.tail = prev,
        }

        tcbs[idx].prev = None;
        tcbs[idx].next = None;
        self.count = self.count.saturating_sub(1);
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority-ordered set of ready tasks
///
/// Yields the head of the most urgent non-empty level; tasks of equal
/// priority are served in the order they became ready.
#[derive(Debug)]
pub struct ReadyQueue {
    prio_tbl: PrioTable,
    lists: [ReadyList; CFG_PRIO_MAX],
}

impl ReadyQueue {
    pub const fn new() -> Self {
        ReadyQueue {
            prio_tbl: PrioTable::new(),
            lists: [ReadyList::new(); CFG_PRIO_MAX],
        }
    }

    /// Add a task at the tail of its effective priority level
    pub fn insert(&mut self, tcbs: &mut TcbTable, idx: usize) -> OsResult<()> {
        if tcbs[idx].queued {
            return Err(OsError::DoubleInsert);
        }

        let prio = tcbs[idx].prio;
        self.lists[prio as usize].insert_tail(tcbs, idx);
        self.prio_tbl.insert(prio);
        tcbs[idx].queued = true;
        Ok(())
    }

    /// Remove a task; a task that is not queued is left alone
    pub fn remove(&mut self, tcbs: &mut TcbTable, idx: usize) {
        if !tcbs[idx].queued {
            return;
        }

        let prio = tcbs[idx].prio;
        let list = &mut self.lists[prio as usize];
        list.remove(tcbs, idx);
        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
        tcbs[idx].queued = false;
    }

    /// Task to run next, without dequeuing it
    #[inline]
    pub fn highest(&self) -> Option<usize> {
        self.prio_tbl
            .get_highest()
            .and_then(|prio| self.lists[prio as usize].head())
    }

    /// Most urgent priority with a ready task
    #[inline]
    pub fn highest_prio(&self) -> Option<OsPrio> {
        self.prio_tbl.get_highest()
    }

    /// Move a queued task to a new priority level
    ///
    /// The task goes to the tail of the new level. For a task that is not
    /// queued only the priority field changes.
    pub fn change_prio(&mut self, tcbs: &mut TcbTable, idx: usize, new_prio: OsPrio) {
        if tcbs[idx].prio == new_prio {
            return;
        }

        if !tcbs[idx].queued {
            tcbs[idx].prio = new_prio;
            return;
        }

        self.remove(tcbs, idx);
        tcbs[idx].prio = new_prio;
        // Just dequeued, cannot be a double insert
        let _ = self.insert(tcbs, idx);
    }

    /// Ready list of one priority level
    #[inline]
    pub fn list(&self, prio: OsPrio) -> &ReadyList {
        &self.lists[prio as usize]
    }

    /// Check if no task is ready
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prio_tbl.is_empty()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
