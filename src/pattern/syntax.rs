/*!
Translation of concrete regular expression syntax into character patterns.

Regexes are parsed with the [`regex-syntax`](regex_syntax) crate and then
lowered into a [`Pattern<char>`]. This gives a compact way of writing patterns
over streams of characters:

* Literals become `Input` matchers.
* Concatenation, alternation and groups map onto sequences and alternations.
* `?`, `*`, `+` and `{m}`, `{m,}`, `{m,n}` map onto the corresponding
  repetition patterns. Greedy and lazy repetitions compile identically, since
  the machine reports every match rather than a preferred one.
* Character classes (including `.`) are expanded into an alternation of their
  characters. Classes larger than
  [`Config::class_size_limit`] are rejected.

Anchors and word boundaries have no meaning for an unbounded token stream and
result in an error.
*/

use alloc::vec::Vec;

use regex_syntax::{
    hir::{self, Hir, HirKind},
    ParserBuilder,
};

use crate::{error::BuildError, pattern::Pattern};

/// The configuration used for translating regex syntax into patterns.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    case_insensitive: Option<bool>,
    nest_limit: Option<u32>,
    class_size_limit: Option<usize>,
}

impl Config {
    /// Return a new default syntax configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Enable or disable the case insensitive flag by default.
    ///
    /// When enabled, every cased literal is expanded into an alternation of
    /// its case variants.
    pub fn case_insensitive(mut self, yes: bool) -> Config {
        self.case_insensitive = Some(yes);
        self
    }

    /// Set the nesting limit used for the regex parser.
    ///
    /// See the corresponding option on
    /// [`regex_syntax::ParserBuilder::nest_limit`] for details.
    pub fn nest_limit(mut self, limit: u32) -> Config {
        self.nest_limit = Some(limit);
        self
    }

    /// Set the maximum number of characters a single character class may
    /// expand into.
    pub fn class_size_limit(mut self, limit: usize) -> Config {
        self.class_size_limit = Some(limit);
        self
    }

    pub fn get_case_insensitive(&self) -> bool {
        self.case_insensitive.unwrap_or(false)
    }

    pub fn get_nest_limit(&self) -> u32 {
        self.nest_limit.unwrap_or(250)
    }

    pub fn get_class_size_limit(&self) -> usize {
        self.class_size_limit.unwrap_or(256)
    }

    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config {
            case_insensitive: o.case_insensitive.or(self.case_insensitive),
            nest_limit: o.nest_limit.or(self.nest_limit),
            class_size_limit: o.class_size_limit.or(self.class_size_limit),
        }
    }
}

/// Parse the given regex into a pattern using the default configuration.
///
/// # Example
///
/// ```
/// use token_automata::pattern::{syntax, Pattern};
///
/// let pattern = syntax::parse("ab?")?;
/// assert_eq!(
///     Pattern::sequence(vec![
///         Pattern::input('a'),
///         Pattern::optional(Pattern::input('b')),
///     ]),
///     pattern,
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse(pattern: &str) -> Result<Pattern<char>, BuildError> {
    parse_with(&Config::default(), pattern)
}

/// Parse the given regex into a pattern using the given configuration.
pub fn parse_with(
    config: &Config,
    pattern: &str,
) -> Result<Pattern<char>, BuildError> {
    let hir = ParserBuilder::new()
        .case_insensitive(config.get_case_insensitive())
        .nest_limit(config.get_nest_limit())
        .build()
        .parse(pattern)
        .map_err(BuildError::syntax)?;
    translate(config, &hir)
}

fn translate(
    config: &Config,
    expr: &Hir,
) -> Result<Pattern<char>, BuildError> {
    match *expr.kind() {
        HirKind::Empty => Ok(Pattern::Sequence(Vec::new())),
        HirKind::Literal(hir::Literal::Unicode(ch)) => Ok(Pattern::Input(ch)),
        HirKind::Literal(hir::Literal::Byte(b)) => {
            Ok(Pattern::Input(char::from(b)))
        }
        HirKind::Class(hir::Class::Unicode(ref cls)) => {
            let ranges = cls.iter().map(|r| (r.start(), r.end())).collect();
            class(config, ranges)
        }
        HirKind::Class(hir::Class::Bytes(ref cls)) => {
            let ranges = cls
                .iter()
                .map(|r| (char::from(r.start()), char::from(r.end())))
                .collect();
            class(config, ranges)
        }
        HirKind::Anchor(_) => Err(BuildError::unsupported_anchor()),
        HirKind::WordBoundary(_) => Err(BuildError::unsupported_word()),
        HirKind::Repetition(ref rep) => repetition(config, rep),
        HirKind::Group(ref group) => translate(config, &group.hir),
        HirKind::Concat(ref exprs) => Ok(Pattern::Sequence(
            exprs
                .iter()
                .map(|e| translate(config, e))
                .collect::<Result<_, _>>()?,
        )),
        HirKind::Alternation(ref exprs) => Ok(Pattern::Alternation(
            exprs
                .iter()
                .map(|e| translate(config, e))
                .collect::<Result<_, _>>()?,
        )),
    }
}

fn class(
    config: &Config,
    ranges: Vec<(char, char)>,
) -> Result<Pattern<char>, BuildError> {
    let limit = config.get_class_size_limit();
    let size = ranges
        .iter()
        .map(|&(start, end)| (u32::from(end) - u32::from(start)) as usize + 1)
        .sum::<usize>();
    if size > limit {
        return Err(BuildError::class_too_big(size, limit));
    }
    let mut alts: Vec<Pattern<char>> = ranges
        .into_iter()
        .flat_map(|(start, end)| start..=end)
        .map(Pattern::Input)
        .collect();
    if alts.len() == 1 {
        return Ok(alts.remove(0));
    }
    Ok(Pattern::Alternation(alts))
}

fn repetition(
    config: &Config,
    rep: &hir::Repetition,
) -> Result<Pattern<char>, BuildError> {
    let p = translate(config, &rep.hir)?;
    Ok(match rep.kind {
        hir::RepetitionKind::ZeroOrOne => Pattern::optional(p),
        hir::RepetitionKind::ZeroOrMore => Pattern::zero_or_more(p),
        hir::RepetitionKind::OneOrMore => Pattern::one_or_more(p),
        hir::RepetitionKind::Range(hir::RepetitionRange::Exactly(n)) => {
            Pattern::repeat(p, n, Some(n))
        }
        hir::RepetitionKind::Range(hir::RepetitionRange::AtLeast(n)) => {
            Pattern::repeat(p, n, None)
        }
        hir::RepetitionKind::Range(hir::RepetitionRange::Bounded(m, n)) => {
            Pattern::repeat(p, m, Some(n))
        }
    })
}
