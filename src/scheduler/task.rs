//! Thread control block and the intrusive, insertion-ordered thread list.

/// Index into the scheduler's fixed thread table.
pub type ThreadId = usize;

/// Higher numeric value runs first; priority 0 is reserved for Idle.
pub type Priority = u8;

pub const IDLE_PRIORITY: Priority = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Active,
    Sleeping,
}

/// One thread's scheduling state. `stack_base`/`stack_pointer` are opaque
/// handles a platform's context-switch implementation interprets; the
/// scheduler core never dereferences them.
#[derive(Debug, Clone, Copy)]
pub struct Tcb {
    pub name: &'static str,
    pub priority: Priority,
    pub state: ThreadState,
    pub stack_base: u32,
    pub stack_pointer: u32,
    pub wait_deadline_ms: u64,
    pub mailbox_waiting_on: bool,
    pub(crate) next_in_list: Option<ThreadId>,
    pub(crate) next_in_mbox_waiters: Option<ThreadId>,
}

impl Tcb {
    pub(crate) fn new(
        name: &'static str,
        priority: Priority,
        stack_base: u32,
        stack_pointer: u32,
    ) -> Self {
        Self {
            name,
            priority,
            state: ThreadState::Active,
            stack_base,
            stack_pointer,
            wait_deadline_ms: 0,
            mailbox_waiting_on: false,
            next_in_list: None,
            next_in_mbox_waiters: None,
        }
    }
}
