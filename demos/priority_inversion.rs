//! Priority Inversion Demo - mutex priority inheritance
//!
//! Three tasks: High(3), Medium(2), Low(1)
//! Low holds mutex -> Medium wakes -> High waits -> Low boosted to prio 3
//!
//! Runs on the host: every loop iteration is one tick of CPU time for the
//! running task, followed by the tick interrupt.

use pisched::{
    CsCell, MutexId, OsResult, Resched, Scheduler, TaskId, TickCounter, Take, Timeout,
};

static KERNEL: CsCell<Scheduler> = CsCell::new();
static TICKS: TickCounter = TickCounter::new();

/// Ticks of CPU time Low needs inside the critical section
const LOW_HOLD_TICKS: u32 = 300;
/// Ticks of CPU time High needs inside the critical section
const HIGH_HOLD_TICKS: u32 = 20;

fn task_body(_arg: usize) {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Start,
    Holding(u32),
    Done,
}

struct Demo {
    low: TaskId,
    high: TaskId,
    mtx: MutexId,
    low_step: Step,
    high_step: Step,
}

impl Demo {
    fn setup(k: &mut Scheduler) -> OsResult<Self> {
        let low = k.task_create("Low", 1, task_body, 0)?.0;
        let medium = k.task_create("Medium", 2, task_body, 0)?.0;
        let high = k.task_create("High", 3, task_body, 0)?.0;
        let mtx = k.mutex_create("Shared")?;

        let r = k.start()?;
        report(k, r);

        // High and Medium sleep first so Low reaches the mutex
        let r = k.time_dly(high, 200)?;
        report(k, r);
        let r = k.time_dly(medium, 50)?;
        report(k, r);

        Ok(Demo {
            low,
            high,
            mtx,
            low_step: Step::Start,
            high_step: Step::Start,
        })
    }

    /// One tick of work for whichever task owns the CPU
    fn run_slice(&mut self, k: &mut Scheduler) -> OsResult<()> {
        let Some(task) = k.running() else {
            return Ok(());
        };

        if task == self.low {
            self.low_step = match self.low_step {
                Step::Start => match k.mutex_take(self.low, self.mtx, Timeout::Forever)? {
                    Take::Acquired => {
                        println!("[{:>4}] LOW   acquired mutex", k.time_get());
                        Step::Holding(0)
                    }
                    Take::Blocked(r) => {
                        report(k, r);
                        Step::Start
                    }
                },
                Step::Holding(n) if n + 1 >= LOW_HOLD_TICKS => {
                    println!(
                        "[{:>4}] LOW   releasing mutex at prio {}",
                        k.time_get(),
                        k.effective_priority(self.low)?
                    );
                    let r = k.mutex_give(self.low, self.mtx)?;
                    println!(
                        "[{:>4}] LOW   back to prio {}",
                        k.time_get(),
                        k.effective_priority(self.low)?
                    );
                    report(k, r);
                    Step::Done
                }
                Step::Holding(n) => Step::Holding(n + 1),
                Step::Done => Step::Done,
            };
        } else if task == self.high {
            self.high_step = match self.high_step {
                Step::Start => {
                    println!("[{:>4}] HIGH  wants mutex", k.time_get());
                    match k.mutex_take(self.high, self.mtx, Timeout::Forever)? {
                        Take::Acquired => Step::Holding(0),
                        Take::Blocked(r) => {
                            println!(
                                "[{:>4}] HIGH  blocked, LOW boosted to prio {}",
                                k.time_get(),
                                k.effective_priority(self.low)?
                            );
                            report(k, r);
                            Step::Holding(0)
                        }
                    }
                }
                Step::Holding(n) if n + 1 >= HIGH_HOLD_TICKS => {
                    let r = k.mutex_give(self.high, self.mtx)?;
                    println!("[{:>4}] HIGH  done", k.time_get());
                    report(k, r);
                    let r = k.task_delete(self.high)?;
                    report(k, r);
                    Step::Done
                }
                Step::Holding(n) => Step::Holding(n + 1),
                Step::Done => Step::Done,
            };
        }

        // Medium is CPU bound: it only ever burns its slice
        Ok(())
    }
}

fn report(k: &Scheduler, resched: Resched) {
    if let Resched::Switch { from, to } = resched {
        let name = |t: Option<TaskId>| {
            t.and_then(|t| k.task_name(t).ok()).unwrap_or("-")
        };
        println!(
            "[{:>4}] switch {} -> {}",
            k.time_get(),
            name(from),
            name(Some(to))
        );
    }
}

fn main() -> OsResult<()> {
    println!("Priority Inversion Demo: H(3) M(2) L(1)");

    KERNEL.init(Scheduler::new());
    let mut demo = KERNEL.with(|k| Demo::setup(k))??;

    for _ in 0..700 {
        KERNEL.with(|k| demo.run_slice(k))??;

        // Timer interrupt
        TICKS.signal();
        KERNEL.with(|k| {
            let r = k.tick_drain(&TICKS);
            report(k, r);
        })?;
    }

    KERNEL.with(|k| {
        println!(
            "done at tick {} after {} context switches",
            k.time_get(),
            k.ctx_switch_count()
        );
    })?;
    Ok(())
}
