//! Priority inheritance scenarios
//!
//! Each test drives a host scheduler through the same calls the tasks would
//! make on target, checking who runs and at which effective priority.

use pisched::{
    MutexId, OsError, OsPendStatus, OsTaskState, Resched, Scheduler, TaskId, Take, Timeout,
    CFG_MUTEX_MAX,
};

fn noop(_: usize) {}

/// Started scheduler whose only application task owns `count` fresh mutexes
fn owner_with_mutexes(count: usize) -> (Scheduler, TaskId, Vec<MutexId>) {
    let mut sched = Scheduler::new();
    let low = sched.task_create("Low", 1, noop, 0).unwrap().0;
    let _ = sched.start().unwrap();

    let mutexes = (0..count)
        .map(|_| {
            let m = sched.mutex_create("M").unwrap();
            assert_eq!(sched.mutex_take(low, m, Timeout::Forever), Ok(Take::Acquired));
            m
        })
        .collect();

    (sched, low, mutexes)
}

/// Create a task that preempts the running one and blocks on `m`
fn block_on(sched: &mut Scheduler, name: &'static str, prio: u8, m: MutexId) -> TaskId {
    let task = sched.task_create(name, prio, noop, 0).unwrap().0;
    assert_eq!(sched.running(), Some(task));

    match sched.mutex_take(task, m, Timeout::Forever) {
        Ok(Take::Blocked(resched)) => assert!(resched.is_switch()),
        other => panic!("expected {} to block, got {:?}", name, other),
    }
    assert_eq!(sched.task_state(task), Ok(OsTaskState::Blocked));
    task
}

#[test]
fn test_classic_inversion_scenario() {
    let mut sched = Scheduler::new();
    let low = sched.task_create("Low", 1, noop, 0).unwrap().0;
    let medium = sched.task_create("Medium", 2, noop, 0).unwrap().0;
    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    let m = sched.mutex_create("Shared").unwrap();
    let _ = sched.start().unwrap();

    // High and Medium sleep first so Low gets the mutex at tick 0
    let _ = sched.time_dly(high, 200).unwrap();
    let _ = sched.time_dly(medium, 50).unwrap();
    assert_eq!(sched.running(), Some(low));
    assert_eq!(sched.mutex_take(low, m, Timeout::Forever), Ok(Take::Acquired));

    for _ in 0..49 {
        assert_eq!(sched.tick(), Resched::Continue);
    }
    assert_eq!(
        sched.tick(),
        Resched::Switch {
            from: Some(low),
            to: medium
        }
    );

    for _ in 50..199 {
        let _ = sched.tick();
    }
    assert_eq!(sched.running(), Some(medium));
    assert_eq!(
        sched.tick(),
        Resched::Switch {
            from: Some(medium),
            to: high
        }
    );
    assert_eq!(sched.time_get(), 200);

    // High blocks; Low inherits and runs ahead of Medium
    assert_eq!(
        sched.mutex_take(high, m, Timeout::Forever),
        Ok(Take::Blocked(Resched::Switch {
            from: Some(high),
            to: low
        }))
    );
    assert_eq!(sched.effective_priority(low), Ok(3));
    assert_eq!(sched.base_priority(low), Ok(1));
    assert_eq!(sched.task_state(medium), Ok(OsTaskState::Ready));

    for _ in 0..30 {
        let _ = sched.tick();
        assert_eq!(sched.running(), Some(low));
    }

    // Release hands the mutex straight to High
    assert_eq!(
        sched.mutex_give(low, m),
        Ok(Resched::Switch {
            from: Some(low),
            to: high
        })
    );
    assert_eq!(sched.mutex_owner(m), Ok(Some(high)));
    assert_eq!(sched.pend_status(high), Ok(OsPendStatus::Ok));
    assert_eq!(sched.pend_result(high), Ok(()));
    assert_eq!(sched.effective_priority(low), Ok(1));
    assert_eq!(sched.effective_priority(high), Ok(3));
}

#[test]
fn test_boost_is_max_of_waiters() {
    let (mut sched, low, mutexes) = owner_with_mutexes(2);
    let (m1, m2) = (mutexes[0], mutexes[1]);

    let a = block_on(&mut sched, "A", 2, m1);
    assert_eq!(sched.running(), Some(low));
    assert_eq!(sched.effective_priority(low), Ok(2));

    let b = block_on(&mut sched, "B", 4, m2);
    assert_eq!(sched.running(), Some(low));
    assert_eq!(sched.effective_priority(low), Ok(4));

    // Dropping the more urgent waiter leaves the other boost in place
    assert_eq!(
        sched.mutex_give(low, m2),
        Ok(Resched::Switch {
            from: Some(low),
            to: b
        })
    );
    assert_eq!(sched.effective_priority(low), Ok(2));

    assert_eq!(sched.mutex_give(b, m2), Ok(Resched::Continue));
    let _ = sched.time_dly(b, 10).unwrap();
    assert_eq!(sched.running(), Some(low));

    assert_eq!(
        sched.mutex_give(low, m1),
        Ok(Resched::Switch {
            from: Some(low),
            to: a
        })
    );
    assert_eq!(sched.effective_priority(low), Ok(1));
    assert_eq!(sched.mutex_owner(m1), Ok(Some(a)));
}

#[test]
fn test_equal_priority_waiters_are_fifo() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    let first = block_on(&mut sched, "First", 3, m);

    // Equal priority does not preempt; Low yields to let the second one in
    let second = sched.task_create("Second", 3, noop, 0).unwrap().0;
    assert_eq!(sched.running(), Some(low));
    assert_eq!(
        sched.yield_now(low),
        Ok(Resched::Switch {
            from: Some(low),
            to: second
        })
    );
    assert!(matches!(
        sched.mutex_take(second, m, Timeout::Forever),
        Ok(Take::Blocked(_))
    ));
    assert_eq!(sched.running(), Some(low));
    assert_eq!(sched.mutex_waiter_count(m), Ok(2));

    let _ = sched.mutex_give(low, m).unwrap();
    assert_eq!(sched.mutex_owner(m), Ok(Some(first)));
    assert_eq!(sched.running(), Some(first));

    assert_eq!(sched.mutex_give(first, m), Ok(Resched::Continue));
    assert_eq!(sched.mutex_owner(m), Ok(Some(second)));
    assert_eq!(sched.mutex_waiter_count(m), Ok(0));
}

#[test]
fn test_more_urgent_waiter_goes_first() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    let mid = block_on(&mut sched, "Mid", 2, m);
    let high = block_on(&mut sched, "High", 5, m);
    assert_eq!(sched.running(), Some(low));

    let _ = sched.mutex_give(low, m).unwrap();
    assert_eq!(sched.mutex_owner(m), Ok(Some(high)));
    assert_eq!(sched.task_state(mid), Ok(OsTaskState::Blocked));

    // Mid still waits, so High keeps at least its own priority
    assert_eq!(sched.effective_priority(high), Ok(5));
}

#[test]
fn test_wait_timeout_restores_owner() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    assert!(matches!(
        sched.mutex_take(high, m, Timeout::Ticks(5)),
        Ok(Take::Blocked(_))
    ));
    assert_eq!(sched.wake_tick(high), Ok(Some(5)));
    assert_eq!(sched.pend_result(high), Err(OsError::WouldBlock));
    assert_eq!(sched.effective_priority(low), Ok(3));

    for _ in 0..4 {
        assert_eq!(sched.tick(), Resched::Continue);
    }
    assert_eq!(
        sched.tick(),
        Resched::Switch {
            from: Some(low),
            to: high
        }
    );

    assert_eq!(sched.pend_status(high), Ok(OsPendStatus::Timeout));
    assert_eq!(sched.pend_result(high), Err(OsError::Timeout));
    assert_eq!(sched.mutex_owner(m), Ok(Some(low)));
    assert_eq!(sched.mutex_waiter_count(m), Ok(0));
    assert_eq!(sched.effective_priority(low), Ok(1));
}

#[test]
fn test_idle_cannot_take() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];
    let free = sched.mutex_create("Free").unwrap();
    let idle = sched.idle_task();

    let _ = sched.time_dly(low, 10).unwrap();
    assert_eq!(sched.running(), Some(idle));

    assert_eq!(
        sched.mutex_take(idle, m, Timeout::Forever),
        Err(OsError::InvalidStateTransition)
    );
    assert_eq!(
        sched.mutex_take(idle, free, Timeout::Forever),
        Err(OsError::InvalidStateTransition)
    );
    assert_eq!(sched.running(), Some(idle));
    assert_eq!(sched.mutex_waiter_count(m), Ok(0));
    assert_eq!(sched.mutex_owner(free), Ok(None));
}

#[test]
fn test_wait_timeout_unwinds_chain() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m1 = mutexes[0];
    let m2 = sched.mutex_create("M2").unwrap();

    // Mid owns M2 and waits on M1
    let mid = sched.task_create("Mid", 2, noop, 0).unwrap().0;
    assert_eq!(sched.mutex_take(mid, m2, Timeout::Forever), Ok(Take::Acquired));
    assert!(matches!(
        sched.mutex_take(mid, m1, Timeout::Forever),
        Ok(Take::Blocked(_))
    ));

    // High waits on M2 for a bounded time
    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    assert!(matches!(
        sched.mutex_take(high, m2, Timeout::Ticks(4)),
        Ok(Take::Blocked(_))
    ));
    assert_eq!(sched.effective_priority(mid), Ok(3));
    assert_eq!(sched.effective_priority(low), Ok(3));
    assert_eq!(sched.running(), Some(low));

    for _ in 0..3 {
        assert_eq!(sched.tick(), Resched::Continue);
    }
    assert_eq!(
        sched.tick(),
        Resched::Switch {
            from: Some(low),
            to: high
        }
    );

    assert_eq!(sched.pend_result(high), Err(OsError::Timeout));
    assert_eq!(sched.mutex_waiter_count(m2), Ok(0));
    // Mid is back at its base; Low keeps only the boost Mid still gives it
    assert_eq!(sched.effective_priority(mid), Ok(2));
    assert_eq!(sched.task_state(mid), Ok(OsTaskState::Blocked));
    assert_eq!(sched.effective_priority(low), Ok(2));
    assert_eq!(sched.base_priority(low), Ok(1));
}

#[test]
fn test_give_cancels_wait_bound() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    let _ = sched.mutex_take(high, m, Timeout::Ticks(5)).unwrap();
    let _ = sched.tick();
    let _ = sched.mutex_give(low, m).unwrap();

    assert_eq!(sched.wake_tick(high), Ok(None));
    for _ in 0..10 {
        let _ = sched.tick();
    }
    assert_eq!(sched.pend_status(high), Ok(OsPendStatus::Ok));
    assert_eq!(sched.mutex_owner(m), Ok(Some(high)));
}

#[test]
fn test_transitive_inheritance() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m1 = mutexes[0];
    let m2 = sched.mutex_create("M2").unwrap();

    // Mid owns M2 and waits on M1
    let mid = sched.task_create("Mid", 2, noop, 0).unwrap().0;
    assert_eq!(sched.mutex_take(mid, m2, Timeout::Forever), Ok(Take::Acquired));
    assert!(matches!(
        sched.mutex_take(mid, m1, Timeout::Forever),
        Ok(Take::Blocked(_))
    ));
    assert_eq!(sched.effective_priority(low), Ok(2));

    // High waits on M2; the boost flows through Mid to Low
    let high = block_on(&mut sched, "High", 3, m2);
    assert_eq!(sched.effective_priority(mid), Ok(3));
    assert_eq!(sched.effective_priority(low), Ok(3));
    assert_eq!(sched.running(), Some(low));

    assert_eq!(
        sched.mutex_give(low, m1),
        Ok(Resched::Switch {
            from: Some(low),
            to: mid
        })
    );
    assert_eq!(sched.effective_priority(low), Ok(1));
    assert_eq!(sched.effective_priority(mid), Ok(3));

    assert_eq!(
        sched.mutex_give(mid, m2),
        Ok(Resched::Switch {
            from: Some(mid),
            to: high
        })
    );
    assert_eq!(sched.effective_priority(mid), Ok(2));
    assert_eq!(sched.mutex_owner(m1), Ok(Some(mid)));
    assert_eq!(sched.mutex_owner(m2), Ok(Some(high)));
}

#[test]
fn test_deadlock_detected() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m1 = mutexes[0];
    let m2 = sched.mutex_create("M2").unwrap();

    let other = sched.task_create("Other", 3, noop, 0).unwrap().0;
    assert_eq!(sched.mutex_take(other, m2, Timeout::Forever), Ok(Take::Acquired));
    assert!(matches!(
        sched.mutex_take(other, m1, Timeout::Forever),
        Ok(Take::Blocked(_))
    ));
    assert_eq!(sched.running(), Some(low));

    assert_eq!(
        sched.mutex_take(low, m2, Timeout::Forever),
        Err(OsError::Deadlock)
    );
    assert_eq!(sched.task_state(low), Ok(OsTaskState::Running));
    assert_eq!(sched.mutex_waiter_count(m2), Ok(0));
}

#[test]
fn test_take_errors() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    assert_eq!(
        sched.mutex_take(low, m, Timeout::Forever),
        Err(OsError::AlreadyOwned)
    );

    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    assert_eq!(
        sched.mutex_take(high, m, Timeout::NoWait),
        Err(OsError::WouldBlock)
    );
    assert_eq!(
        sched.mutex_take(high, m, Timeout::Ticks(0)),
        Err(OsError::WouldBlock)
    );
    assert_eq!(sched.running(), Some(high));
    assert_eq!(sched.effective_priority(low), Ok(1));

    // Only the running task may take
    assert_eq!(
        sched.mutex_take(low, m, Timeout::Forever),
        Err(OsError::InvalidStateTransition)
    );
}

#[test]
fn test_take_before_start() {
    let mut sched = Scheduler::new();
    let task = sched.task_create("A", 1, noop, 0).unwrap().0;
    let m = sched.mutex_create("M").unwrap();
    assert_eq!(
        sched.mutex_take(task, m, Timeout::Forever),
        Err(OsError::OsNotRunning)
    );
}

#[test]
fn test_give_by_non_owner() {
    let (mut sched, _low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];
    let free = sched.mutex_create("Free").unwrap();

    let high = sched.task_create("High", 3, noop, 0).unwrap().0;
    assert_eq!(sched.mutex_give(high, m), Err(OsError::NotOwner));
    assert_eq!(sched.mutex_give(high, free), Err(OsError::NotOwner));
}

#[test]
fn test_mutex_delete() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];

    assert_eq!(sched.mutex_delete(m), Err(OsError::MutexInUse));
    let _ = sched.mutex_give(low, m).unwrap();
    assert_eq!(sched.mutex_delete(m), Ok(()));

    assert_eq!(sched.mutex_owner(m), Err(OsError::UnknownHandle));
    assert_eq!(
        sched.mutex_take(low, m, Timeout::Forever),
        Err(OsError::UnknownHandle)
    );
}

#[test]
fn test_mutex_table_full() {
    let mut sched = Scheduler::new();
    for _ in 0..CFG_MUTEX_MAX {
        sched.mutex_create("M").unwrap();
    }
    assert_eq!(sched.mutex_create("M"), Err(OsError::NoFreeSlot));
}

#[test]
fn test_owner_cannot_be_deleted() {
    let (mut sched, low, _mutexes) = owner_with_mutexes(1);
    assert_eq!(sched.task_delete(low), Err(OsError::InvalidStateTransition));
}

#[test]
fn test_change_prio_of_boosted_owner() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];
    let high = block_on(&mut sched, "High", 3, m);

    // A lower base never undercuts the boost
    assert_eq!(sched.task_change_prio(low, 2), Ok(Resched::Continue));
    assert_eq!(sched.base_priority(low), Ok(2));
    assert_eq!(sched.effective_priority(low), Ok(3));

    assert_eq!(sched.task_change_prio(low, 5), Ok(Resched::Continue));
    assert_eq!(sched.effective_priority(low), Ok(5));

    assert_eq!(sched.mutex_give(low, m), Ok(Resched::Continue));
    assert_eq!(sched.effective_priority(low), Ok(5));
    assert_eq!(sched.task_state(high), Ok(OsTaskState::Ready));
}

#[test]
fn test_change_prio_of_waiter_propagates() {
    let (mut sched, low, mutexes) = owner_with_mutexes(1);
    let m = mutexes[0];
    let high = block_on(&mut sched, "High", 3, m);

    assert_eq!(sched.task_change_prio(high, 6), Ok(Resched::Continue));
    assert_eq!(sched.effective_priority(high), Ok(6));
    assert_eq!(sched.effective_priority(low), Ok(6));

    assert_eq!(sched.task_change_prio(high, 2), Ok(Resched::Continue));
    assert_eq!(sched.effective_priority(low), Ok(2));
}
