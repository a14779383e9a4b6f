use alloc::{collections::VecDeque, vec::Vec};

use crate::{
    program::{Inst, Program, FAILURE, SUCCESS},
    vm::error::MachineError,
};

/// The identifier of a thread.
///
/// Identifiers are assigned from a counter owned by each machine, starting at
/// zero for the root thread. They are never reused, and a thread's identifier
/// is always greater than that of the thread that spawned it. Threads are
/// scheduled in ascending order of their identifiers.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ThreadID(u64);

impl ThreadID {
    /// The identifier of the root thread of every machine.
    pub const ZERO: ThreadID = ThreadID(0);

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ThreadID {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A generator of fresh thread identifiers.
#[derive(Clone, Debug, Default)]
pub(crate) struct ThreadIDs {
    next: u64,
}

impl ThreadIDs {
    pub(crate) fn next(&mut self) -> ThreadID {
        let id = ThreadID(self.next);
        self.next += 1;
        id
    }
}

/// The execution state of a thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThreadState {
    /// The thread can make progress and will execute instructions the next
    /// time it is scheduled.
    Running,
    /// The thread is blocked on an `Input` instruction until a new item is
    /// submitted.
    WaitingForInput,
    /// The thread has finished. Its register holds its result.
    Terminated,
}

/// A single cooperative thread of execution.
///
/// Each thread owns all of its state. Spawning a clone copies everything,
/// including pending input, the stack and an armed timer, so that no state is
/// ever shared between threads.
#[derive(Clone, Debug)]
pub struct Thread<I> {
    id: ThreadID,
    state: ThreadState,
    pc: usize,
    register: i64,
    stack: Vec<i64>,
    input: VecDeque<I>,
    deadline: Option<u64>,
    steps: u64,
}

impl<I> Thread<I> {
    pub(crate) fn new(id: ThreadID, pc: usize) -> Thread<I> {
        Thread {
            id,
            state: ThreadState::Running,
            pc,
            register: SUCCESS,
            stack: Vec::new(),
            input: VecDeque::new(),
            deadline: None,
            steps: 0,
        }
    }

    pub fn id(&self) -> ThreadID {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// The address of the next instruction this thread executes. For a waiting
    /// thread, this is the `Input` instruction it is blocked on.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn register(&self) -> i64 {
        self.register
    }

    /// The thread's stack, bottom first.
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    /// Input items submitted to this thread that it has not yet consumed.
    pub fn pending_input(&self) -> impl Iterator<Item = &I> + '_ {
        self.input.iter()
    }

    /// The clock value at which this thread's timer fires, if one is armed.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// The number of instructions executed along this thread's path of
    /// execution, including those its ancestors executed before it was
    /// spawned.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Returns true if this thread terminated with a successful match.
    pub fn is_match(&self) -> bool {
        self.state == ThreadState::Terminated && self.register == SUCCESS
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state == ThreadState::Terminated
    }

    pub(crate) fn terminate(&mut self, register: i64) {
        self.register = register;
        self.state = ThreadState::Terminated;
    }

    /// Append an item to this thread's input.
    ///
    /// A thread that is waiting with input still pending has rejected that
    /// input under an armed timer. Such stale items are dropped so that the
    /// thread looks at the new item next.
    pub(crate) fn push_input(&mut self, item: I) {
        if self.state == ThreadState::WaitingForInput {
            self.input.clear();
        }
        self.input.push_back(item);
    }

    /// Prepare this thread for a new turn at the given clock.
    ///
    /// A waiting thread with pending input becomes runnable. A thread whose
    /// timer has fired is terminated with `FAILURE`, which takes precedence
    /// over waking up. Returns true when the timer fired.
    pub(crate) fn wake(&mut self, clock: u64) -> bool {
        if self.is_terminated() {
            return false;
        }
        if self.state == ThreadState::WaitingForInput && !self.input.is_empty()
        {
            self.state = ThreadState::Running;
        }
        match self.deadline {
            Some(deadline) if deadline <= clock => {
                self.terminate(FAILURE);
                true
            }
            _ => false,
        }
    }
}

impl<I: Clone> Thread<I> {
    /// Create a deep copy of this thread that starts running at `pc`.
    fn spawn(&self, id: ThreadID, pc: usize) -> Thread<I> {
        Thread {
            id,
            state: ThreadState::Running,
            pc,
            register: self.register,
            stack: self.stack.clone(),
            input: self.input.clone(),
            deadline: self.deadline,
            steps: self.steps,
        }
    }

    /// Execute instructions until this thread blocks on input or terminates.
    ///
    /// Clones spawned along the way are pushed onto the turn's list of new
    /// threads, in the order they were created. On error, this thread is left
    /// at the offending instruction and the caller is responsible for
    /// terminating it.
    pub(crate) fn run<M: PartialEq<I>>(
        &mut self,
        program: &Program<M>,
        turn: &mut Turn<'_, I>,
    ) -> Result<(), MachineError> {
        while self.state == ThreadState::Running {
            let pc = self.pc;
            let inst = match program.get(pc) {
                Some(inst) => inst,
                None => {
                    // Ran off the end. The register keeps whatever the
                    // program last stored in it.
                    trace!("thread {} completed the program", self.id);
                    self.state = ThreadState::Terminated;
                    break;
                }
            };
            match *inst {
                Inst::Pass => self.pc = pc + 1,
                Inst::Jump(addr) => self.pc = target(program, pc, addr)?,
                Inst::Fork(ref addrs) => {
                    // The fork itself counts towards every clone's steps.
                    self.steps += 1;
                    for &addr in addrs {
                        let addr = target(program, pc, addr)?;
                        turn.spawn(self, addr)?;
                    }
                    self.pc = pc + 1;
                    continue;
                }
                Inst::Split(ref addrs) => {
                    let (&first, rest) = addrs
                        .split_first()
                        .ok_or_else(|| MachineError::empty_split(pc))?;
                    self.steps += 1;
                    for &addr in rest {
                        let addr = target(program, pc, addr)?;
                        turn.spawn(self, addr)?;
                    }
                    self.pc = target(program, pc, first)?;
                    continue;
                }
                Inst::Input(ref matcher) => match self.input.front() {
                    None => {
                        self.state = ThreadState::WaitingForInput;
                        continue;
                    }
                    Some(item) if *matcher == *item => {
                        self.input.pop_front();
                        self.pc = pc + 1;
                    }
                    Some(_) if self.deadline.is_some()
                        && turn.timer_blocks_mismatch =>
                    {
                        self.state = ThreadState::WaitingForInput;
                        continue;
                    }
                    Some(_) => self.terminate(FAILURE),
                },
                Inst::Set(value) => {
                    self.register = value;
                    self.pc = pc + 1;
                }
                Inst::Add(value) => {
                    self.register = self.register.wrapping_add(value);
                    self.pc = pc + 1;
                }
                Inst::Equal { value, addr } => {
                    let addr = target(program, pc, addr)?;
                    self.pc =
                        if self.register == value { addr } else { pc + 1 };
                }
                Inst::Lt { value, addr } => {
                    let addr = target(program, pc, addr)?;
                    self.pc =
                        if self.register < value { addr } else { pc + 1 };
                }
                Inst::SetTimer(seconds) => {
                    self.deadline = Some(turn.clock.saturating_add(seconds));
                    self.pc = pc + 1;
                }
                Inst::StackPushValue(value) => {
                    self.stack.push(value);
                    self.pc = pc + 1;
                }
                Inst::StackPush => {
                    self.stack.push(self.register);
                    self.pc = pc + 1;
                }
                Inst::StackPop(count) => {
                    let depth = self.stack.len();
                    if count > depth {
                        let pos = -(count as isize);
                        return Err(MachineError::stack_underflow(
                            pc, pos, depth,
                        ));
                    }
                    self.stack.truncate(depth - count);
                    self.pc = pc + 1;
                }
                Inst::StackGet(pos) => {
                    let slot = self.slot(pc, pos)?;
                    self.register = self.stack[slot];
                    self.pc = pc + 1;
                }
                Inst::StackSet(pos) => {
                    let slot = self.slot(pc, pos)?;
                    self.stack[slot] = self.register;
                    self.pc = pc + 1;
                }
                Inst::StackSetValue { pos, value } => {
                    let slot = self.slot(pc, pos)?;
                    self.stack[slot] = value;
                    self.pc = pc + 1;
                }
                Inst::Match(yes) => {
                    self.terminate(if yes { SUCCESS } else { FAILURE })
                }
            }
            self.steps += 1;
        }
        Ok(())
    }

    /// Resolve a stack position into an index of the stack.
    fn slot(&self, pc: usize, pos: isize) -> Result<usize, MachineError> {
        let depth = self.stack.len();
        let index = if pos >= 0 {
            Some(pos as usize)
        } else {
            depth.checked_sub(pos.unsigned_abs())
        };
        match index {
            Some(index) if index < depth => Ok(index),
            _ => Err(MachineError::stack_underflow(pc, pos, depth)),
        }
    }
}

fn target<M>(
    program: &Program<M>,
    pc: usize,
    addr: usize,
) -> Result<usize, MachineError> {
    if addr > program.len() {
        return Err(MachineError::invalid_address(pc, addr, program.len()));
    }
    Ok(addr)
}

/// The context shared by every thread that runs during a single turn.
#[derive(Debug)]
pub(crate) struct Turn<'a, I> {
    pub(crate) clock: u64,
    pub(crate) timer_blocks_mismatch: bool,
    pub(crate) thread_limit: Option<usize>,
    /// The number of threads that existed before this turn's spawns.
    pub(crate) live: usize,
    pub(crate) ids: &'a mut ThreadIDs,
    pub(crate) spawned: &'a mut Vec<Thread<I>>,
}

impl<'a, I: Clone> Turn<'a, I> {
    fn spawn(
        &mut self,
        parent: &Thread<I>,
        pc: usize,
    ) -> Result<(), MachineError> {
        if let Some(limit) = self.thread_limit {
            if self.live + self.spawned.len() >= limit {
                return Err(MachineError::thread_limit_exceeded(limit));
            }
        }
        let id = self.ids.next();
        trace!("thread {} spawned thread {} at {}", parent.id, id, pc);
        self.spawned.push(parent.spawn(id, pc));
        Ok(())
    }
}
