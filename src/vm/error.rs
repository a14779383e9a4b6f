/// An error that occurred while a machine was executing a program.
///
/// Every one of these errors is caused by a malformed program, typically one
/// that was assembled by hand and created via
/// [`Program::new_unchecked`](crate::program::Program::new_unchecked), or by
/// a program whose threads multiply beyond the configured
/// [thread limit](crate::vm::Config::thread_limit). Programs compiled from
/// patterns never produce the first three kinds of error.
///
/// When an error is returned, the thread that caused it has been terminated
/// with [`FAILURE`](crate::program::FAILURE) and the machine remains usable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineError {
    kind: MachineErrorKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum MachineErrorKind {
    /// A control transfer to an address beyond one past the end of the
    /// program.
    InvalidAddress { pc: usize, target: usize, len: usize },
    /// A split with nothing to split into.
    EmptySplit { pc: usize },
    /// A stack access outside of the thread's current stack.
    StackUnderflow { pc: usize, pos: isize, depth: usize },
    /// Spawning another thread would exceed the configured limit.
    ThreadLimitExceeded { limit: usize },
}

impl MachineError {
    pub(crate) fn invalid_address(
        pc: usize,
        target: usize,
        len: usize,
    ) -> MachineError {
        MachineError {
            kind: MachineErrorKind::InvalidAddress { pc, target, len },
        }
    }

    pub(crate) fn empty_split(pc: usize) -> MachineError {
        MachineError { kind: MachineErrorKind::EmptySplit { pc } }
    }

    pub(crate) fn stack_underflow(
        pc: usize,
        pos: isize,
        depth: usize,
    ) -> MachineError {
        MachineError {
            kind: MachineErrorKind::StackUnderflow { pc, pos, depth },
        }
    }

    pub(crate) fn thread_limit_exceeded(limit: usize) -> MachineError {
        MachineError { kind: MachineErrorKind::ThreadLimitExceeded { limit } }
    }

    /// Returns true if this error occurred because too many threads were
    /// alive at once.
    pub fn is_thread_limit_exceeded(&self) -> bool {
        matches!(self.kind, MachineErrorKind::ThreadLimitExceeded { .. })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MachineError {}

impl core::fmt::Display for MachineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            MachineErrorKind::InvalidAddress { pc, target, len } => write!(
                f,
                "instruction at {} jumps to address {}, \
                 but the program only has {} instructions",
                pc, target, len,
            ),
            MachineErrorKind::EmptySplit { pc } => {
                write!(f, "split instruction at {} has no addresses", pc)
            }
            MachineErrorKind::StackUnderflow { pc, pos, depth } => write!(
                f,
                "instruction at {} accessed stack position {}, \
                 but the stack only has {} values",
                pc, pos, depth,
            ),
            MachineErrorKind::ThreadLimitExceeded { limit } => write!(
                f,
                "number of live threads exceeds the limit of {}",
                limit,
            ),
        }
    }
}
