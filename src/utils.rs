use std::fmt;
use std::io;
use thiserror::Error;

/// A 1-based position in grammar source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A place where a rule is referenced from
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// The rule whose definition contains the reference
    pub rule: String,
    /// Where the reference appears, if the rule came from source text
    pub span: Option<Span>,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'{}", self.rule, at(&self.span))
    }
}

fn at(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" at {}", span),
        None => String::new(),
    }
}

fn join_sites(sites: &[Site]) -> String {
    sites
        .iter()
        .map(|site| site.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error types for compiling grammars and generating text
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Syntax error at {span}: expected {expected}, found {found}")]
    Syntax {
        span: Span,
        expected: String,
        found: String,
    },

    #[error("Duplicate rule '{name}': first defined{}, redefined{}", at(.first), at(.second))]
    DuplicateRule {
        name: String,
        first: Option<Span>,
        second: Option<Span>,
    },

    #[error("Undefined rule '{name}' referenced from {}", join_sites(.sites))]
    UndefinedRule { name: String, sites: Vec<Site> },

    #[error("Invalid weight {weight} in rule '{rule}'{}: weights must be positive", at(.span))]
    InvalidWeight {
        rule: String,
        weight: f64,
        span: Option<Span>,
    },

    #[error("Alternation weights in rule '{rule}'{} add up to more than a finite number", at(.span))]
    WeightOverflow { rule: String, span: Option<Span> },

    #[error("Invalid repetition bounds {{{min},{max}}} in rule '{rule}'{}", at(.span))]
    InvalidBounds {
        rule: String,
        min: u32,
        max: u32,
        span: Option<Span>,
    },

    #[error("Empty production: alternation with no options in rule '{0}'")]
    EmptyProduction(String),

    #[error("Unknown transform '.{name}' at {span}")]
    UnknownTransform { name: String, span: Span },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown start rule: {0}")]
    UnknownStartRule(String),

    #[error("Recursion limit of {limit} exceeded while expanding '{rule}'")]
    RecursionLimitExceeded { rule: String, limit: usize },

    #[error("Grammar looks up [{column}] but no lexicon is attached")]
    MissingLexicon { column: String },

    #[error("Lexicon has no column named [{column}]")]
    UnknownColumn { column: String },

    #[error("Lexicon ran out of unused words for [{column}]")]
    LexiconExhausted { column: String },
}

impl GrammarError {
    pub(crate) fn syntax(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        GrammarError::Syntax {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Whether the error was raised while compiling, as opposed to generating
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            GrammarError::Syntax { .. }
                | GrammarError::DuplicateRule { .. }
                | GrammarError::UndefinedRule { .. }
                | GrammarError::InvalidWeight { .. }
                | GrammarError::WeightOverflow { .. }
                | GrammarError::InvalidBounds { .. }
                | GrammarError::EmptyProduction(_)
                | GrammarError::UnknownTransform { .. }
        )
    }
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GrammarError>;

/// Trait extension for Option<T> to convert to GrammarError
pub trait OptionExt<T> {
    fn ok_or_grammar_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> GrammarError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_grammar_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> GrammarError,
    {
        self.ok_or_else(f)
    }
}
