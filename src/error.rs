#[cfg(feature = "syntax")]
use alloc::string::String;

/// An error that occurred while building a program.
///
/// Programs are built either directly from instructions via
/// [`Program::new`](crate::program::Program::new), or from a
/// [`Pattern`](crate::pattern::Pattern) via the
/// [pattern compiler](crate::pattern::Compiler). In the former case, an error
/// means an instruction refers to an address that doesn't exist. In the latter
/// case, it means the pattern describes something the machine can't execute,
/// such as a repetition whose minimum exceeds its maximum.
///
/// This error does not provide many introspection capabilities. Its primary
/// use is obtaining a human readable message via its `Display` impl. When the
/// `syntax` feature is enabled and the error came from parsing a concrete
/// regex, the underlying [`regex_syntax::Error`] is available from the
/// `source` method of the `std::error::Error` trait.
#[derive(Clone, Debug)]
pub struct BuildError {
    kind: BuildErrorKind,
}

/// The kind of error that occurred while building a program.
#[derive(Clone, Debug)]
enum BuildErrorKind {
    /// An instruction refers to an address beyond one past the end of the
    /// program.
    InvalidAddress { pc: usize, target: usize, len: usize },
    /// A split instruction with no addresses, which gives the executing thread
    /// nowhere to go.
    EmptySplit { pc: usize },
    /// An alternation without any alternatives.
    EmptyAlternation,
    /// A compiled pattern placed at `start` would need addresses past
    /// `usize::MAX`.
    AddressOverflow { start: usize, len: usize },
    /// A bounded repetition whose minimum is greater than its maximum.
    InvalidRepetition { min: u32, max: u32 },
    /// An unbounded repetition of a pattern that can match the empty
    /// sequence. Executing it would fork new threads forever without ever
    /// blocking on input.
    EmptyRepetition,
    /// An error that occurred while parsing a regular expression. Note that
    /// this error may be printed over multiple lines, and is generally
    /// intended to be end user readable on its own.
    #[cfg(feature = "syntax")]
    Syntax(regex_syntax::Error),
    /// A regex feature that has no counterpart in a token pattern, such as an
    /// anchor or a word boundary.
    #[cfg(feature = "syntax")]
    Unsupported(String),
    /// A character class that expands to more literals than permitted.
    #[cfg(feature = "syntax")]
    ClassTooBig { size: usize, limit: usize },
}

impl BuildError {
    fn kind(&self) -> &BuildErrorKind {
        &self.kind
    }

    pub(crate) fn invalid_address(
        pc: usize,
        target: usize,
        len: usize,
    ) -> BuildError {
        BuildError { kind: BuildErrorKind::InvalidAddress { pc, target, len } }
    }

    pub(crate) fn empty_split(pc: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::EmptySplit { pc } }
    }

    pub(crate) fn empty_alternation() -> BuildError {
        BuildError { kind: BuildErrorKind::EmptyAlternation }
    }

    pub(crate) fn address_overflow(start: usize, len: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::AddressOverflow { start, len } }
    }

    pub(crate) fn invalid_repetition(min: u32, max: u32) -> BuildError {
        BuildError { kind: BuildErrorKind::InvalidRepetition { min, max } }
    }

    pub(crate) fn empty_repetition() -> BuildError {
        BuildError { kind: BuildErrorKind::EmptyRepetition }
    }

    #[cfg(feature = "syntax")]
    pub(crate) fn syntax(err: regex_syntax::Error) -> BuildError {
        BuildError { kind: BuildErrorKind::Syntax(err) }
    }

    #[cfg(feature = "syntax")]
    pub(crate) fn unsupported_anchor() -> BuildError {
        let msg = r"anchors such as ^, $, \A and \z are not supported";
        BuildError { kind: BuildErrorKind::Unsupported(msg.into()) }
    }

    #[cfg(feature = "syntax")]
    pub(crate) fn unsupported_word() -> BuildError {
        let msg = r"word boundary assertions (\b and \B) are not supported";
        BuildError { kind: BuildErrorKind::Unsupported(msg.into()) }
    }

    #[cfg(feature = "syntax")]
    pub(crate) fn class_too_big(size: usize, limit: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::ClassTooBig { size, limit } }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            #[cfg(feature = "syntax")]
            BuildErrorKind::Syntax(ref err) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for BuildError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self.kind() {
            BuildErrorKind::InvalidAddress { pc, target, len } => write!(
                f,
                "instruction at {} refers to address {}, \
                 but the program only has {} instructions",
                pc, target, len,
            ),
            BuildErrorKind::EmptySplit { pc } => {
                write!(f, "split instruction at {} has no addresses", pc)
            }
            BuildErrorKind::EmptyAlternation => {
                write!(f, "alternation must have at least one alternative")
            }
            BuildErrorKind::AddressOverflow { start, len } => write!(
                f,
                "{} instructions starting at address {} overflow the \
                 address space",
                len, start,
            ),
            BuildErrorKind::InvalidRepetition { min, max } => write!(
                f,
                "repetition minimum {} exceeds its maximum {}",
                min, max,
            ),
            BuildErrorKind::EmptyRepetition => write!(
                f,
                "unbounded repetition of a pattern that can match \
                 the empty sequence",
            ),
            #[cfg(feature = "syntax")]
            BuildErrorKind::Syntax(_) => write!(f, "error parsing regex"),
            #[cfg(feature = "syntax")]
            BuildErrorKind::Unsupported(ref msg) => write!(f, "{}", msg),
            #[cfg(feature = "syntax")]
            BuildErrorKind::ClassTooBig { size, limit } => write!(
                f,
                "character class with {} characters exceeds the limit of {}",
                size, limit,
            ),
        }
    }
}
