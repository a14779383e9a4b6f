/*!
The instruction set executed by the [`Machine`](crate::vm::Machine).

A [`Program`] is an immutable, ordered sequence of [`Inst`] values. Addresses
used by jumps, forks and conditional branches are absolute indices into that
sequence. The address one past the last instruction is also valid: a thread
that arrives there has completed the program.

Instructions are generic over a matcher type `M`. The only instruction that
looks at a matcher is [`Inst::Input`], which compares it against the next
pending input item `I` of a thread via `M: PartialEq<I>`. The virtual machine
never inspects matchers or input items beyond that equality test.
*/

use alloc::{sync::Arc, vec::Vec};

use crate::error::BuildError;

/// The register value of a thread that terminated with a successful match.
pub const SUCCESS: i64 = 0;

/// The register value of a thread that terminated without a match.
///
/// Callers branch on this value, so it is fixed at `-1`.
pub const FAILURE: i64 = -1;

/// A single instruction of a program.
///
/// Each variant documents its effect on the executing thread. Unless stated
/// otherwise, an instruction advances the program counter by one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Inst<M> {
    /// Do nothing.
    Pass,
    /// Continue execution at the given address.
    Jump(usize),
    /// Continue at the next instruction, and start a clone of the current
    /// thread at every one of the given addresses, in order.
    Fork(Vec<usize>),
    /// Continue at the first of the given addresses, and start a clone of the
    /// current thread at each of the remaining addresses, in order. The list
    /// must not be empty.
    Split(Vec<usize>),
    /// Compare the next pending input item with this matcher. On a match, the
    /// item is consumed. Otherwise the thread either blocks (no pending input,
    /// or a mismatch while a timer is armed) or terminates with [`FAILURE`].
    Input(M),
    /// Overwrite the register with a literal.
    Set(i64),
    /// Add a literal to the register.
    Add(i64),
    /// Continue at `addr` if the register equals `value`.
    Equal { value: i64, addr: usize },
    /// Continue at `addr` if the register is less than `value`.
    Lt { value: i64, addr: usize },
    /// Arm the thread's timer so that it fires `seconds` after the current
    /// clock.
    SetTimer(u64),
    /// Push a literal onto the thread's stack.
    StackPushValue(i64),
    /// Push the register onto the thread's stack.
    StackPush,
    /// Discard this many values from the top of the stack.
    StackPop(usize),
    /// Load the stack slot at the given position into the register.
    ///
    /// Non-negative positions are relative to the bottom of the stack, while
    /// negative positions are relative to its top (so `-1` is the top).
    StackGet(isize),
    /// Store the register into the stack slot at the given position. Uses the
    /// same indexing rule as [`Inst::StackGet`].
    StackSet(isize),
    /// Store a literal into the stack slot at the given position.
    StackSetValue { pos: isize, value: i64 },
    /// Write [`SUCCESS`] (when `true`) or [`FAILURE`] (when `false`) into the
    /// register and terminate the thread.
    Match(bool),
}

impl<M> Inst<M> {
    /// Returns every address operand of this instruction.
    ///
    /// This is empty for instructions that never transfer control.
    pub fn addresses(&self) -> &[usize] {
        match *self {
            Inst::Jump(ref addr)
            | Inst::Equal { ref addr, .. }
            | Inst::Lt { ref addr, .. } => core::slice::from_ref(addr),
            Inst::Fork(ref addrs) | Inst::Split(ref addrs) => addrs,
            Inst::Pass
            | Inst::Input(_)
            | Inst::Set(_)
            | Inst::Add(_)
            | Inst::SetTimer(_)
            | Inst::StackPushValue(_)
            | Inst::StackPush
            | Inst::StackPop(_)
            | Inst::StackGet(_)
            | Inst::StackSet(_)
            | Inst::StackSetValue { .. }
            | Inst::Match(_) => &[],
        }
    }

    /// Returns the matcher of an `Input` instruction.
    pub fn matcher(&self) -> Option<&M> {
        match *self {
            Inst::Input(ref m) => Some(m),
            _ => None,
        }
    }
}

/// An immutable sequence of instructions.
///
/// Cloning a program is cheap: the instructions are shared behind an `Arc`.
/// This is what lets every thread of a machine read the same program without
/// any synchronization.
#[derive(Debug, Eq, PartialEq)]
pub struct Program<M> {
    insts: Arc<[Inst<M>]>,
}

impl<M> Clone for Program<M> {
    fn clone(&self) -> Program<M> {
        Program { insts: Arc::clone(&self.insts) }
    }
}

impl<M> Program<M> {
    /// Create a new program from the given instructions.
    ///
    /// This returns an error if any address operand points beyond one past
    /// the last instruction, or if a `Split` has no addresses.
    pub fn new(insts: Vec<Inst<M>>) -> Result<Program<M>, BuildError> {
        let len = insts.len();
        for (pc, inst) in insts.iter().enumerate() {
            if let Inst::Split(ref addrs) = *inst {
                if addrs.is_empty() {
                    return Err(BuildError::empty_split(pc));
                }
            }
            for &target in inst.addresses() {
                if target > len {
                    return Err(BuildError::invalid_address(pc, target, len));
                }
            }
        }
        Ok(Program::new_unchecked(insts))
    }

    /// Create a new program without validating its address operands.
    ///
    /// Executing an invalid program never misbehaves silently: the machine
    /// reports a [`MachineError`](crate::vm::MachineError) when it reaches
    /// the offending instruction.
    pub fn new_unchecked(insts: Vec<Inst<M>>) -> Program<M> {
        Program { insts: Arc::from(insts) }
    }

    /// Returns the instruction at the given address, if one exists.
    pub fn get(&self, addr: usize) -> Option<&Inst<M>> {
        self.insts.get(addr)
    }

    /// Returns the number of instructions in this program.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Returns true if and only if this program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Returns all instructions in this program, in address order.
    pub fn insts(&self) -> &[Inst<M>] {
        &self.insts
    }
}

impl<M> core::ops::Index<usize> for Program<M> {
    type Output = Inst<M>;

    fn index(&self, addr: usize) -> &Inst<M> {
        &self.insts[addr]
    }
}
