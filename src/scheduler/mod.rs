//! QoR: the cooperative, tickless, priority-based scheduler that hosts the
//! Chip32 VM (and any host tasks) as lightweight threads.
//!
//! Adapted from a four-level priority, preemptive design to an open
//! priority range with strictly cooperative scheduling and a tickless
//! timer: instead of a fixed quantum firing on every tick, the scheduler
//! computes the earliest pending sleep deadline and re-arms a single-shot
//! alarm for it.
//!
//! Every mutation of the thread list or a mailbox's waiter chain happens
//! under an [`InterruptGuard`], so an ISR-driven notify can never observe a
//! half-updated link.

pub mod clock;
pub mod context;
pub mod mailbox;
pub mod task;

use core::marker::PhantomData;

use heapless::Vec;

pub use clock::{Clock, ManualClock};
pub use context::{ContextSwitch, InterruptGuard, NullGuard, RecordingContext};
pub use mailbox::{InsertAt, Mailbox, NotifyResult, WaitResult};
pub use task::{Priority, Tcb, ThreadId, ThreadState, IDLE_PRIORITY};

/// Result of a scheduling pass: who runs next, and (if everyone is asleep
/// or idle) how long until the next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub current: ThreadId,
    /// `None` when an active thread was selected (no alarm needed); `Some`
    /// with the next wake deadline, capped at 60 seconds, otherwise.
    pub next_deadline_ms: Option<u64>,
}

/// Fixed-capacity thread table of at most `N` threads (including Idle).
///
/// `G` is the local-interrupt guard acquired around every mutation of the
/// thread list or a mailbox's waiter chain, so an ISR can never observe (or
/// corrupt) a partially-updated link. Defaults to [`NullGuard`] for hosts —
/// tests included — that only ever drive the scheduler from one execution
/// context; real firmware picks its own guard type.
///
/// `C` performs the actual context switch whenever `schedule()` selects a
/// thread other than the one already running. Defaults to
/// [`RecordingContext`], which has nothing behind it beyond bookkeeping;
/// real firmware supplies the asm trampoline.
pub struct Scheduler<const N: usize, G: InterruptGuard = NullGuard, C: ContextSwitch = RecordingContext> {
    threads: Vec<Tcb, N>,
    list_head: Option<ThreadId>,
    list_tail: Option<ThreadId>,
    current: ThreadId,
    idle: ThreadId,
    context: C,
    _guard: PhantomData<G>,
}

impl<const N: usize, G: InterruptGuard, C: ContextSwitch + Default> Scheduler<N, G, C> {
    /// Creates the idle thread (priority 0) and makes it current until the
    /// first [`Scheduler::start`] pass.
    pub fn new(idle_stack_base: u32, idle_stack_pointer: u32) -> Self {
        Self::with_context(idle_stack_base, idle_stack_pointer, C::default())
    }
}

impl<const N: usize, G: InterruptGuard, C: ContextSwitch> Scheduler<N, G, C> {
    /// Creates the idle thread (priority 0) using a caller-supplied context
    /// switcher, for hosts whose `C` has no meaningful [`Default`].
    pub fn with_context(idle_stack_base: u32, idle_stack_pointer: u32, context: C) -> Self {
        let mut sched = Self {
            threads: Vec::new(),
            list_head: None,
            list_tail: None,
            current: 0,
            idle: 0,
            context,
            _guard: PhantomData,
        };
        let idle = sched.push_tcb(Tcb::new("idle", IDLE_PRIORITY, idle_stack_base, idle_stack_pointer));
        sched.idle = idle;
        sched.current = idle;
        sched
    }

    fn push_tcb(&mut self, tcb: Tcb) -> ThreadId {
        let _guard = G::enter_critical();
        self.threads
            .push(tcb)
            .unwrap_or_else(|_| panic!("thread table full"));
        let id = self.threads.len() - 1;
        if let Some(tail) = self.list_tail {
            self.threads[tail].next_in_list = Some(id);
        } else {
            self.list_head = Some(id);
        }
        self.list_tail = Some(id);
        id
    }

    /// Prepares a new thread. Priority 0 is reserved for Idle; passing it
    /// here is an invariant violation and panics, as does exceeding the
    /// thread table's static capacity.
    pub fn create_thread(
        &mut self,
        name: &'static str,
        priority: Priority,
        stack_base: u32,
        stack_pointer: u32,
    ) -> ThreadId {
        assert!(priority >= 1, "priority 0 is reserved for the idle thread");
        self.push_tcb(Tcb::new(name, priority, stack_base, stack_pointer))
    }

    pub fn current(&self) -> ThreadId {
        self.current
    }

    pub fn idle(&self) -> ThreadId {
        self.idle
    }

    pub fn thread(&self, id: ThreadId) -> &Tcb {
        &self.threads[id]
    }

    /// The context switcher driving `schedule()`'s thread transitions.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Runs the first scheduling pass, selecting the highest-priority
    /// thread to run.
    pub fn start(&mut self, now_ms: u64) -> ScheduleOutcome {
        self.schedule(now_ms)
    }

    /// Marks the current thread `Sleeping` with an absolute wake deadline.
    /// Per the documented cancellation model, the only way out of a sleep
    /// is that deadline — there is no thread cancellation.
    pub fn sleep(&mut self, ms: u64, now_ms: u64) {
        let _guard = G::enter_critical();
        let id = self.current;
        self.threads[id].state = ThreadState::Sleeping;
        self.threads[id].wait_deadline_ms = now_ms + ms;
    }

    /// Voluntary yield: the current thread stays `Active` and a scheduling
    /// pass runs immediately, letting an equal-or-higher priority thread
    /// take over.
    pub fn yield_now(&mut self, now_ms: u64) -> ScheduleOutcome {
        self.schedule(now_ms)
    }

    /// One scheduling pass: wake any sleeper whose deadline has passed,
    /// then select `best_active ?? best_sleeping ?? idle`. Scanning starts
    /// just after the current thread and wraps, so equal-priority active
    /// threads round-robin across calls instead of starving one another.
    ///
    /// Falling back to the highest-priority *sleeping* thread when no
    /// thread is active is a documented quirk, not a bug: it is what the
    /// original scheduler does when the list walk races with a wakeup, and
    /// callers should not assume Idle runs whenever nothing is Active.
    pub fn schedule(&mut self, now_ms: u64) -> ScheduleOutcome {
        let _guard = G::enter_critical();
        let total = self.threads.len();
        let mut id = self.threads[self.current].next_in_list.or(self.list_head);
        let mut best_active: Option<ThreadId> = None;
        let mut best_sleeping: Option<ThreadId> = None;
        let mut min_wait: u64 = 60_000;
        let mut visited = 0usize;

        while visited < total {
            let Some(i) = id else { break };
            visited += 1;
            id = self.threads[i].next_in_list.or(self.list_head);

            if i == self.idle {
                continue;
            }
            if self.threads[i].state == ThreadState::Sleeping
                && now_ms >= self.threads[i].wait_deadline_ms
            {
                self.threads[i].state = ThreadState::Active;
            }
            match self.threads[i].state {
                ThreadState::Active => {
                    let better = match best_active {
                        Some(b) => self.threads[i].priority > self.threads[b].priority,
                        None => true,
                    };
                    if better {
                        best_active = Some(i);
                    }
                }
                ThreadState::Sleeping => {
                    let remaining = self.threads[i].wait_deadline_ms.saturating_sub(now_ms);
                    if remaining < min_wait {
                        min_wait = remaining;
                    }
                    let better = match best_sleeping {
                        Some(b) => self.threads[i].priority > self.threads[b].priority,
                        None => true,
                    };
                    if better {
                        best_sleeping = Some(i);
                    }
                }
            }
        }

        let selected = best_active.or(best_sleeping).unwrap_or(self.idle);
        let previous = self.current;
        if selected != previous {
            let next_sp = self.threads[selected].stack_pointer;
            self.context
                .save_and_switch(&mut self.threads[previous].stack_pointer, next_sp);
        }
        self.current = selected;
        ScheduleOutcome {
            current: selected,
            next_deadline_ms: if best_active.is_some() {
                None
            } else {
                Some(min_wait)
            },
        }
    }

    /// Performs one scheduling pass and re-arms `clock`'s alarm if nothing
    /// is active.
    pub fn tick(&mut self, clock: &mut dyn Clock) -> ScheduleOutcome {
        let outcome = self.schedule(clock.now_ms());
        if let Some(deadline) = outcome.next_deadline_ms {
            clock.arm(deadline);
        }
        outcome
    }

    /// Non-blocking fast path and blocking attach-and-sleep for an empty
    /// mailbox. A `Blocked` result means the current thread was attached
    /// as a waiter and put to sleep; the driving loop must call
    /// [`Scheduler::schedule`] (or [`Scheduler::tick`]) to let other
    /// threads run, then [`Scheduler::mbox_wait_resume`] once this thread
    /// is current again.
    pub fn mbox_wait<const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<CAP>,
        timeout_ms: u64,
        now_ms: u64,
    ) -> WaitResult {
        let _guard = G::enter_critical();
        if let Some(msg) = mbox.dequeue() {
            return WaitResult::Ok(msg);
        }
        if timeout_ms == 0 {
            return WaitResult::Error;
        }
        let current = self.current;
        self.threads[current].next_in_mbox_waiters = mbox.waiters_head;
        mbox.waiters_head = Some(current);
        self.threads[current].mailbox_waiting_on = true;
        self.threads[current].state = ThreadState::Sleeping;
        self.threads[current].wait_deadline_ms = now_ms + timeout_ms;
        WaitResult::Blocked
    }

    /// Resolves a `Blocked` wait once the waiting thread is rescheduled:
    /// retries the dequeue once (a notify may have raced the timeout) and
    /// detaches the thread from the mailbox's waiter chain either way.
    pub fn mbox_wait_resume<const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<CAP>,
        thread: ThreadId,
    ) -> WaitResult {
        let _guard = G::enter_critical();
        let result = match mbox.dequeue() {
            Some(msg) => WaitResult::Ok(msg),
            None => WaitResult::Error,
        };
        self.detach_waiter(mbox, thread);
        self.threads[thread].mailbox_waiting_on = false;
        result
    }

    /// Enqueues `msg` and wakes the mailbox's most recently attached
    /// waiter, if any. Full mailboxes are a normal return value, not an
    /// error.
    pub fn mbox_notify<const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<CAP>,
        msg: u32,
        at: InsertAt,
    ) -> NotifyResult {
        let _guard = G::enter_critical();
        if !mbox.try_enqueue(msg, at) {
            return NotifyResult::Full;
        }
        if let Some(waiter) = mbox.waiters_head {
            self.threads[waiter].state = ThreadState::Active;
            self.threads[waiter].wait_deadline_ms = 0;
        }
        NotifyResult::Ok
    }

    fn detach_waiter<const CAP: usize>(&mut self, mbox: &mut Mailbox<CAP>, thread: ThreadId) {
        if mbox.waiters_head == Some(thread) {
            mbox.waiters_head = self.threads[thread].next_in_mbox_waiters;
            self.threads[thread].next_in_mbox_waiters = None;
            return;
        }
        let mut cur = mbox.waiters_head;
        while let Some(i) = cur {
            let next = self.threads[i].next_in_mbox_waiters;
            if next == Some(thread) {
                self.threads[i].next_in_mbox_waiters = self.threads[thread].next_in_mbox_waiters;
                self.threads[thread].next_in_mbox_waiters = None;
                return;
            }
            cur = next;
        }
    }
}
