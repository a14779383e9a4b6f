/*!
Patterns and their compilation into programs.

A [`Pattern`] is an immutable tree describing a language of input sequences.
Leaves wrap a matcher value. Composite nodes describe sequencing, alternation,
optionality and repetition. A pattern is built once by the caller, compiled
once into a [`Program`](crate::program::Program) by a [`Compiler`] and has no
role after that.

# Example

This matches one `a`, then either `b` or `c`, then between two and four `d`s:

```
use token_automata::{pattern::{Compiler, Pattern}, vm::Machine};

let pattern = Pattern::sequence(vec![
    Pattern::input('a'),
    Pattern::alternation(vec![Pattern::input('b'), Pattern::input('c')]),
    Pattern::repeat(Pattern::input('d'), 2, Some(4)),
]);
let program = Compiler::new().compile(&pattern)?;

let mut machine = Machine::new(program)?;
for item in "acddd".chars() {
    machine.submit_input(item)?;
}
assert!(machine.is_match());

# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use alloc::{boxed::Box, vec::Vec};

use crate::{error::BuildError, program::Inst};

pub use self::compiler::{Compiler, Config};

mod compiler;
#[cfg(feature = "syntax")]
pub mod syntax;

/// A description of the input sequences to match.
///
/// Matchers of type `M` sit at the leaves. Compiled programs compare them
/// against input items by value equality.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pattern<M> {
    /// Matches exactly one input item equal to the matcher.
    Input(M),
    /// Matches each pattern in turn. An empty sequence matches the empty
    /// input.
    Sequence(Vec<Pattern<M>>),
    /// Matches any one of the alternatives. Must not be empty.
    Alternation(Vec<Pattern<M>>),
    /// Matches the pattern zero or one times.
    Optional(Box<Pattern<M>>),
    /// Matches the pattern one or more times.
    OneOrMore(Box<Pattern<M>>),
    /// Matches the pattern zero or more times.
    ZeroOrMore(Box<Pattern<M>>),
    /// Matches the pattern at least `min` times and, if `max` is present, at
    /// most `max` times.
    ///
    /// Matching more than `max` repetitions is explicitly rejected: the thread
    /// that consumes the extra item terminates with
    /// [`FAILURE`](crate::program::FAILURE).
    Repeat { pattern: Box<Pattern<M>>, min: u32, max: Option<u32> },
    /// Matches the pattern, and arms a timer that fires `seconds` after the
    /// clock at the time the pattern is entered.
    ///
    /// Once armed, the timer is never disarmed: when the machine's clock
    /// reaches the deadline, any thread still waiting for input is terminated
    /// with a failure. While the timer is armed, a mismatched input item makes
    /// the thread wait for another item instead of failing.
    Deadline { seconds: u64, pattern: Box<Pattern<M>> },
}

impl<M> Pattern<M> {
    /// Create a pattern matching a single input item equal to `matcher`.
    pub fn input(matcher: M) -> Pattern<M> {
        Pattern::Input(matcher)
    }

    /// Create a pattern matching each of the given patterns in order.
    pub fn sequence<P>(patterns: P) -> Pattern<M>
    where
        P: IntoIterator<Item = Pattern<M>>,
    {
        Pattern::Sequence(patterns.into_iter().collect())
    }

    /// Create a pattern matching any one of the given patterns.
    pub fn alternation<P>(patterns: P) -> Pattern<M>
    where
        P: IntoIterator<Item = Pattern<M>>,
    {
        Pattern::Alternation(patterns.into_iter().collect())
    }

    pub fn optional(pattern: Pattern<M>) -> Pattern<M> {
        Pattern::Optional(Box::new(pattern))
    }

    pub fn one_or_more(pattern: Pattern<M>) -> Pattern<M> {
        Pattern::OneOrMore(Box::new(pattern))
    }

    pub fn zero_or_more(pattern: Pattern<M>) -> Pattern<M> {
        Pattern::ZeroOrMore(Box::new(pattern))
    }

    /// Create a pattern matching `pattern` between `min` and `max` times,
    /// inclusive. When `max` is `None`, there is no upper bound.
    pub fn repeat(
        pattern: Pattern<M>,
        min: u32,
        max: Option<u32>,
    ) -> Pattern<M> {
        Pattern::Repeat { pattern: Box::new(pattern), min, max }
    }

    /// Create a pattern matching `pattern`, where the remainder of the match
    /// must complete within `seconds` of entering it.
    pub fn deadline(seconds: u64, pattern: Pattern<M>) -> Pattern<M> {
        Pattern::Deadline { seconds, pattern: Box::new(pattern) }
    }

    /// Returns true if and only if this pattern can match the empty sequence.
    pub fn is_nullable(&self) -> bool {
        match *self {
            Pattern::Input(_) => false,
            Pattern::Sequence(ref ps) => ps.iter().all(Pattern::is_nullable),
            Pattern::Alternation(ref ps) => {
                ps.iter().any(Pattern::is_nullable)
            }
            Pattern::Optional(_) | Pattern::ZeroOrMore(_) => true,
            Pattern::OneOrMore(ref p) => p.is_nullable(),
            Pattern::Repeat { ref pattern, min, .. } => {
                min == 0 || pattern.is_nullable()
            }
            Pattern::Deadline { ref pattern, .. } => pattern.is_nullable(),
        }
    }
}

impl<M: Clone> Pattern<M> {
    /// Compile this pattern into a sequence of instructions meant to be
    /// placed at address `start` of a program.
    ///
    /// Every address in the returned instructions is absolute, i.e., already
    /// relocated to `start`. When `append_match` is true, a successful
    /// `Match` instruction follows the compiled pattern.
    ///
    /// The result depends only on this pattern, `start` and `append_match`.
    /// In particular, compiling the same pattern twice always yields
    /// identical instructions.
    ///
    /// This returns an error when the pattern can't be compiled, or when
    /// `start` plus the number of emitted instructions overflows a `usize`.
    pub fn compile(
        &self,
        start: usize,
        append_match: bool,
    ) -> Result<Vec<Inst<M>>, BuildError> {
        compiler::compile_at(self, start, append_match)
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Pattern<char> {
    fn arbitrary(g: &mut quickcheck::Gen) -> Pattern<char> {
        arbitrary_pattern(g, 3)
    }
}

#[cfg(test)]
fn arbitrary_pattern(g: &mut quickcheck::Gen, depth: u32) -> Pattern<char> {
    use quickcheck::Arbitrary;

    let leaf = *g.choose(&['a', 'b', 'c']).unwrap();
    if depth == 0 {
        return Pattern::Input(leaf);
    }
    let depth = depth - 1;
    match u8::arbitrary(g) % 10 {
        0 | 1 => Pattern::Input(leaf),
        2 | 3 => {
            let len = usize::arbitrary(g) % 3 + 1;
            let mut ps = Vec::with_capacity(len);
            for _ in 0..len {
                ps.push(arbitrary_pattern(g, depth));
            }
            Pattern::Sequence(ps)
        }
        4 | 5 => {
            let len = usize::arbitrary(g) % 3 + 1;
            let mut ps = Vec::with_capacity(len);
            for _ in 0..len {
                ps.push(arbitrary_pattern(g, depth));
            }
            Pattern::Alternation(ps)
        }
        6 => Pattern::optional(arbitrary_pattern(g, depth)),
        7 => Pattern::one_or_more(arbitrary_pattern(g, depth)),
        8 => Pattern::zero_or_more(arbitrary_pattern(g, depth)),
        _ => {
            let min = u32::arbitrary(g) % 3;
            let max = if bool::arbitrary(g) {
                Some(min + u32::arbitrary(g) % 3)
            } else {
                None
            };
            Pattern::repeat(arbitrary_pattern(g, depth), min, max)
        }
    }
}
