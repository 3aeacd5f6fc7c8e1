//! Integration tests for the QoR scheduler: priority selection, sleep
//! wakeups, and the bounded mailbox — including the spec scenario of two
//! threads rendezvousing through a capacity-4 mailbox.

use chip32_core::scheduler::{InsertAt, Mailbox, NotifyResult, Scheduler, ThreadState, WaitResult};
use proptest::prelude::*;

#[test]
fn two_threads_rendezvous_through_a_shared_mailbox() {
    let mut sched: Scheduler<4> = Scheduler::new(0, 0);
    let thread2 = sched.create_thread("thread-2", 2, 0, 0x2000);
    let thread1 = sched.create_thread("thread-1", 1, 0, 0x1000);

    // thread-2 is the higher priority thread and starts first.
    let outcome = sched.start(0);
    assert_eq!(outcome.current, thread2);

    let mut mbox: Mailbox<4> = Mailbox::new();
    assert_eq!(sched.mbox_wait(&mut mbox, 100, 0), WaitResult::Blocked);

    // thread-2 is asleep on the mailbox; thread-1 becomes current.
    let outcome = sched.schedule(0);
    assert_eq!(outcome.current, thread1);

    // thread-1 sleeps 10ms, then wakes and notifies.
    sched.sleep(10, 0);
    let outcome = sched.schedule(10);
    assert_eq!(outcome.current, thread1);
    assert_eq!(
        sched.mbox_notify(&mut mbox, 0xDEAD, InsertAt::Back),
        NotifyResult::Ok
    );
    assert_eq!(sched.thread(thread2).state, ThreadState::Active);

    // thread-2 outranks thread-1 again now that it is awake.
    let outcome = sched.schedule(10);
    assert_eq!(outcome.current, thread2);
    assert_eq!(
        sched.mbox_wait_resume(&mut mbox, thread2),
        WaitResult::Ok(0xDEAD)
    );
}

#[test]
fn context_switch_fires_once_per_actual_thread_change() {
    let mut sched: Scheduler<4> = Scheduler::new(0, 0);
    sched.create_thread("a", 1, 0, 0x1000);
    sched.create_thread("b", 1, 0, 0x2000);

    sched.start(0);
    assert_eq!(sched.context().switches.len(), 1);

    // Same thread stays current if nothing higher-priority woke up, but the
    // round-robin scan here always rotates to the other equal-priority
    // thread, so every pass is a real switch.
    sched.schedule(0);
    sched.schedule(0);
    assert_eq!(sched.context().switches.len(), 3);
}

#[test]
fn thread_table_capacity_is_enforced() {
    let result = std::panic::catch_unwind(|| {
        let mut sched: Scheduler<2> = Scheduler::new(0, 0);
        sched.create_thread("only", 1, 0, 0);
        sched.create_thread("overflow", 1, 0, 0);
    });
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn fairness_within_priority(n in 2usize..8) {
        let mut sched: Scheduler<16> = Scheduler::new(0, 0);
        for i in 0..n {
            sched.create_thread("t", 1, 0, (i as u32) * 0x1000);
        }
        sched.start(0);

        let mut selected = std::collections::HashSet::new();
        for _ in 0..n {
            let outcome = sched.schedule(0);
            selected.insert(outcome.current);
        }
        prop_assert_eq!(selected.len(), n);
    }

    #[test]
    fn mailbox_round_trip_preserves_fifo_order(msgs in prop::collection::vec(0u32..10_000, 1..6)) {
        let mut sched: Scheduler<4> = Scheduler::new(0, 0);
        sched.start(0);
        let mut mbox: Mailbox<8> = Mailbox::new();
        for &m in &msgs {
            prop_assert_eq!(
                sched.mbox_notify(&mut mbox, m, InsertAt::Back),
                NotifyResult::Ok
            );
        }
        for &m in &msgs {
            prop_assert_eq!(sched.mbox_wait(&mut mbox, 0, 0), WaitResult::Ok(m));
        }
    }

    #[test]
    fn wait_timeout_resolves_within_the_requested_bound(timeout in 1u64..500) {
        let mut sched: Scheduler<4> = Scheduler::new(0, 0);
        let waiter = sched.create_thread("waiter", 1, 0, 0x1000);
        sched.start(0);
        let mut mbox: Mailbox<4> = Mailbox::new();
        prop_assert_eq!(sched.mbox_wait(&mut mbox, timeout, 0), WaitResult::Blocked);

        sched.schedule(timeout.saturating_sub(1));
        prop_assert_eq!(sched.thread(waiter).state, ThreadState::Sleeping);

        sched.schedule(timeout);
        prop_assert_eq!(sched.thread(waiter).state, ThreadState::Active);
        prop_assert_eq!(
            sched.mbox_wait_resume(&mut mbox, waiter),
            WaitResult::Error
        );
    }
}
