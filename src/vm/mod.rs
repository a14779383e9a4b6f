/*!
A virtual machine that matches programs against input submitted one item at a
time.

The [`Machine`] in this module is a Pike VM: a set of cooperative threads,
each executing the same [`Program`] with its own program counter, register,
stack, input queue and timer. Threads that reach an `Input` instruction block
until the caller submits another item. Non-deterministic choices in the
program spawn new threads, so every possible path through the program is
explored in lockstep with the input.

Execution proceeds in *turns*. Each call to [`Machine::submit_input`],
[`Machine::run`] or [`Machine::tick`] is one turn. Building a machine runs the
first turn, so that the machine is already waiting for input when it is
returned. A turn:

1. wakes threads that have pending input, and terminates threads whose timer
   has fired,
2. runs every runnable thread, in ascending order of its identifier, until it
   blocks or terminates (including threads spawned during this turn),
3. records every terminated thread as a [`Termination`] and discards it.

Between turns, no thread is ever runnable.

# Example

This matches a `login` followed by at least one `read`, where the reads must
arrive within 30 seconds of the login:

```
use token_automata::{pattern::{Compiler, Pattern}, vm::Machine};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event { Login, Read, Logout }

let pattern = Pattern::sequence(vec![
    Pattern::input(Event::Login),
    Pattern::deadline(30, Pattern::one_or_more(Pattern::input(Event::Read))),
]);
let program = Compiler::new().compile(&pattern)?;

let mut machine = Machine::new(program)?;
machine.set_clock(1_000);
machine.submit_input(Event::Login)?;
machine.submit_input(Event::Read)?;
assert!(machine.is_match());
assert_eq!(vec![&Event::Read], machine.expected_inputs());

// Past the deadline, the remaining threads fail.
machine.tick(1_030)?;
assert!(machine.is_finished());
assert!(machine.has_matched());

# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use alloc::{vec, vec::Vec};

use crate::{
    program::{Inst, Program, FAILURE, SUCCESS},
    vm::thread::{ThreadIDs, Turn},
};

pub use self::{
    error::MachineError,
    thread::{Thread, ThreadID, ThreadState},
};

mod error;
mod thread;

/// The configuration used for building a machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    timer_blocks_mismatch: Option<bool>,
    thread_limit: Option<Option<usize>>,
}

impl Config {
    /// Return a new default machine configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Whether a mismatched input item makes a thread with an armed timer
    /// wait for the next item rather than fail.
    ///
    /// This is enabled by default, which makes timed patterns tolerant of
    /// unrelated items interleaved in the input. When disabled, a mismatch
    /// always terminates the thread with
    /// [`FAILURE`](crate::program::FAILURE), and timers only serve to fail
    /// threads that wait too long.
    pub fn timer_blocks_mismatch(mut self, yes: bool) -> Config {
        self.timer_blocks_mismatch = Some(yes);
        self
    }

    /// Set a limit on the number of threads alive at once.
    ///
    /// When spawning a thread would exceed this limit, the turn stops with an
    /// error. Setting this to `None` removes the limit, which is only safe for
    /// programs whose thread count is otherwise known to be bounded.
    ///
    /// The default is `Some(65_536)`.
    pub fn thread_limit(mut self, limit: Option<usize>) -> Config {
        self.thread_limit = Some(limit);
        self
    }

    pub fn get_timer_blocks_mismatch(&self) -> bool {
        self.timer_blocks_mismatch.unwrap_or(true)
    }

    pub fn get_thread_limit(&self) -> Option<usize> {
        self.thread_limit.unwrap_or(Some(65_536))
    }

    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config {
            timer_blocks_mismatch: o
                .timer_blocks_mismatch
                .or(self.timer_blocks_mismatch),
            thread_limit: o.thread_limit.or(self.thread_limit),
        }
    }
}

/// A builder for a machine.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Create a new machine builder with its default configuration.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Build a machine that executes the given program.
    ///
    /// The machine's root thread starts at address `0` and runs immediately,
    /// so this returns an error if the program is malformed before its first
    /// `Input` instruction.
    pub fn build<M, I>(
        &self,
        program: Program<M>,
    ) -> Result<Machine<M, I>, MachineError>
    where
        M: PartialEq<I>,
        I: Clone,
    {
        debug!("building machine for {} instructions", program.len());
        let mut ids = ThreadIDs::default();
        let root = Thread::new(ids.next(), 0);
        let mut machine = Machine {
            config: self.config,
            program,
            threads: vec![root],
            ids,
            clock: 0,
            turn: 0,
            input_turn: 0,
            last_match_turn: None,
            terminations: Vec::new(),
        };
        machine.run_turn()?;
        Ok(machine)
    }

    /// Apply the given machine options to this builder.
    pub fn configure(&mut self, config: Config) -> &mut Builder {
        self.config = self.config.overwrite(config);
        self
    }
}

/// The record of a single thread terminating.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Termination {
    thread: ThreadID,
    turn: u64,
    register: i64,
}

impl Termination {
    pub fn thread(&self) -> ThreadID {
        self.thread
    }

    /// The turn during which the thread terminated. The turn that runs while
    /// building a machine is `0`.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// The thread's register at the time it terminated.
    pub fn register(&self) -> i64 {
        self.register
    }

    pub fn is_match(&self) -> bool {
        self.register == SUCCESS
    }
}

/// A Pike VM executing a single program against a stream of input items.
///
/// `M` is the matcher type of the program, and `I` the type of input items.
/// An `Input` instruction accepts an item when `M: PartialEq<I>` reports the
/// two as equal. Input items are cloned into every thread alive when they are
/// submitted.
///
/// Every terminated thread is recorded as a [`Termination`], and the log of
/// terminations is never trimmed by the machine itself. On a long running
/// stream, callers should periodically drain it with
/// [`Machine::take_terminations`] to keep memory use bounded. Doing so
/// doesn't affect [`Machine::has_matched`] or [`Machine::is_match`].
#[derive(Clone, Debug)]
pub struct Machine<M, I> {
    config: Config,
    program: Program<M>,
    /// Threads that haven't yet been discarded, in ascending order of their
    /// identifiers.
    threads: Vec<Thread<I>>,
    ids: ThreadIDs,
    clock: u64,
    turn: u64,
    /// The turn that most recently consumed submitted input.
    input_turn: u64,
    last_match_turn: Option<u64>,
    terminations: Vec<Termination>,
}

impl Machine<(), ()> {
    /// Return a new default machine configuration.
    pub fn config() -> Config {
        Config::new()
    }

    /// Return a builder for configuring the construction of a machine.
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<M: PartialEq<I>, I: Clone> Machine<M, I> {
    /// Create a machine with the default configuration that executes the
    /// given program.
    pub fn new(program: Program<M>) -> Result<Machine<M, I>, MachineError> {
        Builder::new().build(program)
    }

    /// Submit the next input item and run a turn.
    ///
    /// The item is appended to the input of every thread that hasn't
    /// terminated. A waiting thread only ever looks at the item submitted
    /// most recently: anything it rejected earlier is dropped.
    pub fn submit_input(&mut self, item: I) -> Result<(), MachineError> {
        for thread in self.threads.iter_mut() {
            if !thread.is_terminated() {
                thread.push_input(item.clone());
            }
        }
        self.turn += 1;
        self.input_turn = self.turn;
        self.run_turn()
    }

    /// Run a turn without submitting input.
    ///
    /// This is mostly useful after advancing the clock, in order to fail
    /// threads whose timer has fired.
    pub fn run(&mut self) -> Result<(), MachineError> {
        self.turn += 1;
        self.run_turn()
    }

    /// Set the clock to the given value and run a turn.
    pub fn tick(&mut self, clock: u64) -> Result<(), MachineError> {
        self.set_clock(clock);
        self.run()
    }

    fn run_turn(&mut self) -> Result<(), MachineError> {
        trace!("turn {} at clock {}", self.turn, self.clock);
        for thread in self.threads.iter_mut() {
            if thread.wake(self.clock) {
                debug!("timer of thread {} fired", thread.id());
            }
        }
        let result = self.run_threads();
        self.retire();
        result
    }

    /// Run every runnable thread until it blocks or terminates.
    ///
    /// A thread that fails with an error is terminated with `FAILURE`. The
    /// remaining threads still run, and the first error is returned once the
    /// pass is complete.
    fn run_threads(&mut self) -> Result<(), MachineError> {
        let mut spawned = Vec::new();
        let mut first_err = None;
        let mut i = 0;
        // Threads spawned during this turn are appended, so they run later in
        // this same loop. Their identifiers are larger than every existing
        // one, which keeps the thread list sorted.
        while i < self.threads.len() {
            if self.threads[i].state() == ThreadState::Running {
                let mut turn = Turn {
                    clock: self.clock,
                    timer_blocks_mismatch: self
                        .config
                        .get_timer_blocks_mismatch(),
                    thread_limit: self.config.get_thread_limit(),
                    live: self.threads.len(),
                    ids: &mut self.ids,
                    spawned: &mut spawned,
                };
                let result = self.threads[i].run(&self.program, &mut turn);
                self.threads.append(&mut spawned);
                if let Err(err) = result {
                    debug!("thread {} failed: {}", self.threads[i].id(), err);
                    self.threads[i].terminate(FAILURE);
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
            i += 1;
        }
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Record and discard every terminated thread.
    fn retire(&mut self) {
        let turn = self.turn;
        for thread in self.threads.iter() {
            if !thread.is_terminated() {
                continue;
            }
            trace!(
                "thread {} terminated with register {}",
                thread.id(),
                thread.register()
            );
            if thread.is_match() {
                self.last_match_turn = Some(turn);
            }
            self.terminations.push(Termination {
                thread: thread.id(),
                turn,
                register: thread.register(),
            });
        }
        self.threads.retain(|t| !t.is_terminated());
    }
}

impl<M, I> Machine<M, I> {
    /// Returns true if and only if some thread has terminated with a
    /// successful match at any point so far.
    pub fn has_matched(&self) -> bool {
        self.last_match_turn.is_some()
    }

    /// Returns true if and only if some thread terminated with a successful
    /// match while processing the most recently submitted input item.
    ///
    /// Before any input is submitted, this reports whether the program
    /// matches the empty input.
    pub fn is_match(&self) -> bool {
        self.last_match_turn == Some(self.input_turn)
    }

    /// Returns true when no thread is left, i.e., no further input can
    /// change the outcome.
    pub fn is_finished(&self) -> bool {
        self.threads.is_empty()
    }

    /// Every termination recorded so far, in the order of their turns and,
    /// within a turn, in ascending order of thread identifiers.
    pub fn terminations(&self) -> &[Termination] {
        &self.terminations
    }

    /// The terminations recorded during the most recent turn.
    pub fn last_terminations(&self) -> &[Termination] {
        let turn = self.turn;
        let start = self.terminations.partition_point(|t| t.turn < turn);
        &self.terminations[start..]
    }

    /// Remove and return every termination recorded so far.
    ///
    /// This doesn't affect [`Machine::has_matched`] or
    /// [`Machine::is_match`].
    pub fn take_terminations(&mut self) -> Vec<Termination> {
        core::mem::take(&mut self.terminations)
    }

    /// The threads that haven't terminated, in ascending order of their
    /// identifiers.
    pub fn threads(&self) -> &[Thread<I>] {
        &self.threads
    }

    pub fn program(&self) -> &Program<M> {
        &self.program
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Set the logical clock used for timers.
    ///
    /// The clock is just a number of seconds. It's up to the caller to
    /// decide what it means and how it advances. Timers are only checked at
    /// the start of a turn.
    pub fn set_clock(&mut self, clock: u64) {
        self.clock = clock;
    }

    /// Set the clock to the number of seconds since the UNIX epoch.
    #[cfg(feature = "std")]
    pub fn set_clock_now(&mut self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.set_clock(now);
    }

    /// The number of turns run so far, not counting the initial turn.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Returns the distinct matchers that waiting threads are blocked on, in
    /// ascending order of the first thread waiting on each.
    pub fn expected_inputs(&self) -> Vec<&M>
    where
        M: PartialEq,
    {
        let mut expected: Vec<&M> = Vec::new();
        for thread in self.threads.iter() {
            if thread.state() != ThreadState::WaitingForInput {
                continue;
            }
            let matcher = match self.program.get(thread.pc()) {
                Some(&Inst::Input(ref m)) => m,
                _ => continue,
            };
            if !expected.iter().any(|&m| m == matcher) {
                expected.push(matcher);
            }
        }
        expected
    }
}
