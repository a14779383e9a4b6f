use alloc::{vec, vec::Vec};

use crate::{
    error::BuildError,
    pattern::Pattern,
    program::{Inst, Program, FAILURE, SUCCESS},
};

/// The stack slot of a bounded repetition that counts completed iterations.
const COUNTER: isize = -2;
/// The stack slot of a bounded repetition that records whether too many
/// iterations were matched.
const FLAG: isize = -1;

/// The configuration used for compiling a pattern into a program.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    append_match: Option<bool>,
}

impl Config {
    /// Return a new default pattern compiler configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// When enabled (the default), the compiled program ends with a `Match`
    /// instruction that terminates the thread with
    /// [`SUCCESS`](crate::program::SUCCESS).
    ///
    /// When disabled, a thread that completes the pattern runs off the end of
    /// the program instead. This is useful when the compiled instructions are
    /// meant to be embedded in a larger program.
    pub fn append_match(mut self, yes: bool) -> Config {
        self.append_match = Some(yes);
        self
    }

    pub fn get_append_match(&self) -> bool {
        self.append_match.unwrap_or(true)
    }

    /// Overwrite the default configuration such that the options in `o` are
    /// always used. If an option in `o` is not set, then the corresponding
    /// option in `self` is used. If it's not set in `self` either, then it
    /// remains not set.
    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config { append_match: o.append_match.or(self.append_match) }
    }
}

/// A builder for compiling patterns into programs.
///
/// # Example
///
/// ```
/// use token_automata::{
///     pattern::{Compiler, Config, Pattern},
///     program::Inst,
/// };
///
/// let pattern = Pattern::one_or_more(Pattern::input(5u8));
/// let program = Compiler::new()
///     .configure(Config::new().append_match(false))
///     .compile(&pattern)?;
/// assert_eq!(program.insts(), &[
///     Inst::Input(5),
///     Inst::Split(vec![0, 2]),
/// ]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct Compiler {
    config: Config,
    #[cfg(feature = "syntax")]
    syntax: crate::pattern::syntax::Config,
}

impl Compiler {
    /// Create a new pattern compiler with its default configuration.
    pub fn new() -> Compiler {
        Compiler {
            config: Config::default(),
            #[cfg(feature = "syntax")]
            syntax: crate::pattern::syntax::Config::default(),
        }
    }

    /// Compile the given pattern into a program starting at address `0`.
    pub fn compile<M: Clone>(
        &self,
        pattern: &Pattern<M>,
    ) -> Result<Program<M>, BuildError> {
        let insts = pattern.compile(0, self.config.get_append_match())?;
        debug!("compiled pattern into {} instructions", insts.len());
        Program::new(insts)
    }

    /// Parse the given regular expression and compile it into a program
    /// whose matchers are the characters of the regex.
    ///
    /// See the [`syntax`](crate::pattern::syntax) module for which regex
    /// features are supported.
    ///
    /// # Example
    ///
    /// ```
    /// use token_automata::{pattern::Compiler, vm::Machine};
    ///
    /// let program = Compiler::new().build("ab{2,3}")?;
    /// let mut machine = Machine::new(program)?;
    /// for ch in "abb".chars() {
    ///     machine.submit_input(ch)?;
    /// }
    /// assert!(machine.is_match());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[cfg(feature = "syntax")]
    pub fn build(&self, pattern: &str) -> Result<Program<char>, BuildError> {
        let pattern =
            crate::pattern::syntax::parse_with(&self.syntax, pattern)?;
        self.compile(&pattern)
    }

    /// Apply the given compiler options to this builder.
    pub fn configure(&mut self, config: Config) -> &mut Compiler {
        self.config = self.config.overwrite(config);
        self
    }

    /// Set the syntax configuration used by [`Compiler::build`].
    #[cfg(feature = "syntax")]
    pub fn syntax(
        &mut self,
        config: crate::pattern::syntax::Config,
    ) -> &mut Compiler {
        self.syntax = self.syntax.overwrite(config);
        self
    }
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

pub(crate) fn compile_at<M: Clone>(
    pattern: &Pattern<M>,
    start: usize,
    append_match: bool,
) -> Result<Vec<Inst<M>>, BuildError> {
    let insts = emit(pattern, 0, append_match)?;
    if start == 0 {
        return Ok(insts);
    }
    // Addresses up to one past the last instruction must be representable.
    if start.checked_add(insts.len()).is_none() {
        return Err(BuildError::address_overflow(start, insts.len()));
    }
    emit(pattern, start, append_match)
}

fn emit<M: Clone>(
    pattern: &Pattern<M>,
    start: usize,
    append_match: bool,
) -> Result<Vec<Inst<M>>, BuildError> {
    let mut emitter = Emitter::new(start);
    c(&mut emitter, pattern)?;
    if append_match {
        emitter.push(Inst::Match(true));
    }
    Ok(emitter.finish())
}

/// A buffer of instructions that knows the absolute address of each one.
///
/// Forward references are handled by reserving a slot, emitting whatever
/// comes between, and then patching the slot once its targets are known.
#[derive(Debug)]
struct Emitter<M> {
    start: usize,
    insts: Vec<Inst<M>>,
}

impl<M> Emitter<M> {
    fn new(start: usize) -> Emitter<M> {
        Emitter { start, insts: vec![] }
    }

    /// The address of the next instruction emitted.
    fn here(&self) -> usize {
        self.start + self.insts.len()
    }

    fn push(&mut self, inst: Inst<M>) -> usize {
        let addr = self.here();
        self.insts.push(inst);
        addr
    }

    /// Emit a placeholder to be overwritten by `patch`.
    fn reserve(&mut self) -> usize {
        self.push(Inst::Pass)
    }

    fn patch(&mut self, addr: usize, inst: Inst<M>) {
        self.insts[addr - self.start] = inst;
    }

    fn finish(self) -> Vec<Inst<M>> {
        self.insts
    }
}

fn c<M: Clone>(
    e: &mut Emitter<M>,
    pattern: &Pattern<M>,
) -> Result<(), BuildError> {
    match *pattern {
        Pattern::Input(ref m) => {
            e.push(Inst::Input(m.clone()));
            Ok(())
        }
        Pattern::Sequence(ref ps) => {
            for p in ps {
                c(e, p)?;
            }
            Ok(())
        }
        Pattern::Alternation(ref ps) => c_alternation(e, ps),
        Pattern::Optional(ref p) => c_optional(e, |e| c(e, p)),
        Pattern::OneOrMore(ref p) => {
            if p.is_nullable() {
                return Err(BuildError::empty_repetition());
            }
            c_one_or_more(e, |e| c(e, p))
        }
        Pattern::ZeroOrMore(ref p) => {
            if p.is_nullable() {
                return Err(BuildError::empty_repetition());
            }
            c_optional(e, |e| c_one_or_more(e, |e| c(e, p)))
        }
        Pattern::Repeat { ref pattern, min, max } => {
            c_repeat(e, pattern, min, max)
        }
        Pattern::Deadline { seconds, ref pattern } => {
            e.push(Inst::SetTimer(seconds));
            c(e, pattern)
        }
    }
}

fn c_alternation<M: Clone>(
    e: &mut Emitter<M>,
    alts: &[Pattern<M>],
) -> Result<(), BuildError> {
    if alts.is_empty() {
        return Err(BuildError::empty_alternation());
    }
    let split = e.reserve();
    let mut starts = Vec::with_capacity(alts.len());
    let mut exits = Vec::with_capacity(alts.len());
    for alt in alts {
        starts.push(e.here());
        c(e, alt)?;
        exits.push(e.reserve());
    }
    let end = e.here();
    e.patch(split, Inst::Split(starts));
    for exit in exits {
        e.patch(exit, Inst::Jump(end));
    }
    Ok(())
}

fn c_optional<M, F>(e: &mut Emitter<M>, body: F) -> Result<(), BuildError>
where
    F: FnOnce(&mut Emitter<M>) -> Result<(), BuildError>,
{
    let split = e.reserve();
    body(e)?;
    let end = e.here();
    e.patch(split, Inst::Split(vec![split + 1, end]));
    Ok(())
}

fn c_one_or_more<M, F>(e: &mut Emitter<M>, body: F) -> Result<(), BuildError>
where
    F: FnOnce(&mut Emitter<M>) -> Result<(), BuildError>,
{
    let start = e.here();
    body(e)?;
    let split = e.here();
    e.push(Inst::Split(vec![start, split + 1]));
    Ok(())
}

fn c_repeat<M: Clone>(
    e: &mut Emitter<M>,
    pattern: &Pattern<M>,
    min: u32,
    max: Option<u32>,
) -> Result<(), BuildError> {
    match max {
        Some(max) if min > max => {
            return Err(BuildError::invalid_repetition(min, max));
        }
        None if pattern.is_nullable() => {
            return Err(BuildError::empty_repetition());
        }
        _ => {}
    }
    if min == 0 {
        if max == Some(0) {
            return Ok(());
        }
        return c_optional(e, |e| c_counted(e, pattern, 1, max));
    }
    c_counted(e, pattern, min, max)
}

/// Emit a repetition with `min >= 1`.
///
/// Two slots are pushed onto the thread's stack for the duration of the
/// repetition: an iteration counter and a flag that is set to `FAILURE` once
/// a thread matches more than `max` iterations. Both are popped on the way
/// out, and a set flag terminates the thread.
fn c_counted<M: Clone>(
    e: &mut Emitter<M>,
    pattern: &Pattern<M>,
    min: u32,
    max: Option<u32>,
) -> Result<(), BuildError> {
    e.push(Inst::StackPushValue(0));
    e.push(Inst::StackPushValue(SUCCESS));
    let body = e.here();
    c(e, pattern)?;
    e.push(Inst::StackGet(COUNTER));
    e.push(Inst::Add(1));
    e.push(Inst::StackSet(COUNTER));
    if min > 1 {
        e.push(Inst::Lt { value: i64::from(min), addr: body });
    }
    match max {
        None => {
            let split = e.here();
            e.push(Inst::Split(vec![body, split + 1]));
        }
        Some(max) => {
            let reached = e.reserve();
            let below = if max > min { Some(e.reserve()) } else { None };
            e.push(Inst::StackSetValue { pos: FLAG, value: FAILURE });
            let reject = e.reserve();
            // Once the maximum is reached, one clone keeps trying the body so
            // that an item beyond the maximum is consumed and rejected,
            // rather than silently left for whatever follows.
            let probe = e.reserve();
            let more = below.map(|_| e.reserve());
            let exit = e.here();

            let max = i64::from(max);
            e.patch(reached, Inst::Equal { value: max, addr: probe });
            if let (Some(below), Some(more)) = (below, more) {
                e.patch(below, Inst::Lt { value: max, addr: more });
                e.patch(more, Inst::Split(vec![body, exit]));
            }
            e.patch(reject, Inst::Jump(exit));
            e.patch(probe, Inst::Split(vec![exit, body]));
        }
    }
    e.push(Inst::StackGet(FLAG));
    e.push(Inst::StackPop(2));
    let accept = e.reserve();
    e.push(Inst::Match(false));
    let next = e.here();
    e.patch(accept, Inst::Equal { value: SUCCESS, addr: next });
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use quickcheck::{quickcheck, TestResult};

    use super::*;

    fn a() -> Pattern<char> {
        Pattern::input('a')
    }

    #[test]
    fn input() {
        assert_eq!(
            vec![Inst::Input('a'), Inst::Match(true)],
            a().compile(0, true).unwrap(),
        );
        assert_eq!(vec![Inst::Input('a')], a().compile(9, false).unwrap());
    }

    #[test]
    fn start_near_the_end_of_the_address_space() {
        let p = Pattern::sequence(vec![a(), Pattern::optional(a())]);
        assert!(p.compile(usize::MAX - 2, true).is_err());
        assert!(p.compile(usize::MAX, false).is_err());

        let insts = p.compile(usize::MAX - 3, false).unwrap();
        assert_eq!(
            vec![
                Inst::Input('a'),
                Inst::Split(vec![usize::MAX - 1, usize::MAX]),
                Inst::Input('a'),
            ],
            insts,
        );
    }

    #[test]
    fn alternation() {
        let p = Pattern::alternation(vec![a(), Pattern::input('b')]);
        assert_eq!(
            vec![
                Inst::Split(vec![1, 3]),
                Inst::Input('a'),
                Inst::Jump(5),
                Inst::Input('b'),
                Inst::Jump(5),
            ],
            p.compile(0, false).unwrap(),
        );
    }

    #[test]
    fn optional_and_star() {
        assert_eq!(
            vec![Inst::Split(vec![11, 12]), Inst::Input('a')],
            Pattern::optional(a()).compile(10, false).unwrap(),
        );
        assert_eq!(
            vec![
                Inst::Split(vec![1, 3]),
                Inst::Input('a'),
                Inst::Split(vec![1, 3]),
            ],
            Pattern::zero_or_more(a()).compile(0, false).unwrap(),
        );
    }

    #[test]
    fn deadline() {
        assert_eq!(
            vec![Inst::SetTimer(30), Inst::Input('a'), Inst::Match(true)],
            Pattern::deadline(30, a()).compile(0, true).unwrap(),
        );
    }

    #[test]
    fn bounded_repetition() {
        let insts =
            Pattern::repeat(a(), 2, Some(4)).compile(0, false).unwrap();
        assert_eq!(
            vec![
                Inst::StackPushValue(0),
                Inst::StackPushValue(SUCCESS),
                Inst::Input('a'),
                Inst::StackGet(COUNTER),
                Inst::Add(1),
                Inst::StackSet(COUNTER),
                Inst::Lt { value: 2, addr: 2 },
                Inst::Equal { value: 4, addr: 11 },
                Inst::Lt { value: 4, addr: 12 },
                Inst::StackSetValue { pos: FLAG, value: FAILURE },
                Inst::Jump(13),
                Inst::Split(vec![13, 2]),
                Inst::Split(vec![2, 13]),
                Inst::StackGet(FLAG),
                Inst::StackPop(2),
                Inst::Equal { value: SUCCESS, addr: 17 },
                Inst::Match(false),
            ],
            insts,
        );
    }

    #[test]
    fn exact_repetition_has_no_more_branch() {
        let insts =
            Pattern::repeat(a(), 3, Some(3)).compile(0, false).unwrap();
        assert!(!insts.iter().any(|inst| match *inst {
            Inst::Lt { value: 3, addr } => addr != 2,
            _ => false,
        }));
        assert_eq!(
            1,
            insts.iter().filter(|i| matches!(i, Inst::Split(_))).count()
        );
    }

    #[test]
    fn zero_repetition_is_empty() {
        let insts =
            Pattern::repeat(a(), 0, Some(0)).compile(4, false).unwrap();
        assert!(insts.is_empty());
    }

    #[test]
    fn invalid_patterns() {
        assert!(Pattern::repeat(a(), 3, Some(2)).compile(0, true).is_err());
        assert!(Pattern::<char>::alternation(vec![])
            .compile(0, true)
            .is_err());
        assert!(Pattern::zero_or_more(Pattern::optional(a()))
            .compile(0, true)
            .is_err());
        assert!(Pattern::repeat(Pattern::<char>::sequence(vec![]), 1, None)
            .compile(0, true)
            .is_err());
        // A bounded repetition of a nullable pattern always terminates.
        assert!(Pattern::repeat(Pattern::optional(a()), 1, Some(3))
            .compile(0, true)
            .is_ok());
    }

    #[test]
    fn compiler_config() {
        let mut compiler = Compiler::new();
        let prog = compiler.compile(&a()).unwrap();
        assert_eq!(&[Inst::Input('a'), Inst::Match(true)], prog.insts());

        compiler.configure(Config::new().append_match(false));
        // Options not set by a later configuration are preserved.
        compiler.configure(Config::new());
        let prog = compiler.compile(&a()).unwrap();
        assert_eq!(&[Inst::Input('a')], prog.insts());
    }

    quickcheck! {
        fn prop_addresses_in_range(p: Pattern<char>, start: u8) -> TestResult {
            let start = usize::from(start);
            let insts = match p.compile(start, true) {
                Ok(insts) => insts,
                Err(_) => return TestResult::discard(),
            };
            let end = start + insts.len();
            TestResult::from_bool(insts.iter().all(|inst| {
                inst.addresses().iter().all(|&a| start <= a && a <= end)
            }))
        }

        fn prop_deterministic(p: Pattern<char>) -> bool {
            p.compile(0, true).ok() == p.compile(0, true).ok()
        }

        fn prop_relocatable(p: Pattern<char>, start: u8) -> TestResult {
            let start = usize::from(start);
            let base = p.compile(0, false);
            let (base, moved) = match (base, p.compile(start, false)) {
                (Ok(base), Ok(moved)) => (base, moved),
                _ => return TestResult::discard(),
            };
            let shifted: Vec<Inst<char>> = base
                .into_iter()
                .map(|inst| relocate(inst, start))
                .collect();
            TestResult::from_bool(shifted == moved)
        }
    }

    fn relocate(inst: Inst<char>, by: usize) -> Inst<char> {
        match inst {
            Inst::Jump(addr) => Inst::Jump(addr + by),
            Inst::Fork(addrs) => {
                Inst::Fork(addrs.into_iter().map(|a| a + by).collect())
            }
            Inst::Split(addrs) => {
                Inst::Split(addrs.into_iter().map(|a| a + by).collect())
            }
            Inst::Equal { value, addr } => {
                Inst::Equal { value, addr: addr + by }
            }
            Inst::Lt { value, addr } => Inst::Lt { value, addr: addr + by },
            inst => inst,
        }
    }
}
