//! Babble-Gen is a grammar engine for random "babble" text.
//!
//! Grammars are written in a compact ABNF-like metalanguage, compiled once
//! into an immutable [`Grammar`], and then expanded any number of times with
//! a caller-supplied random source. With a seeded source the output is
//! reproducible byte for byte.
//!
//! # Metalanguage
//!
//! ```text
//! # comments run to the end of the line
//! RESULT    = title | 2: title ", " subtitle   # "N:" weights an alternative
//! title.cap = adjective{1,2} noun              # ".cap" on a rule name applies to its result
//! adjective = "quantum " | "neural " | "hyper-"
//! noun      = "engine" | "drive" | <flux core>
//! <flux core> = "flux core"                    # angle brackets allow any rule name
//! subtitle  = "with " [Agent].a                # [Column] draws from a lexicon
//! ```
//!
//! Repetition uses `{n}`, `{m,n}`, `{m,}`, `?`, `*` and `+`; parentheses
//! group; `,` may be used between sequence items. The engine never inserts
//! whitespace, so spacing lives inside literals.
//!
//! # Example
//!
//! ```rust
//! use babble_gen::Grammar;
//! use rand::rngs::mock::StepRng;
//!
//! let grammar = Grammar::compile(r#"
//!     greeting = "hello " name
//!     name     = "Ada" | "Grace"
//! "#).unwrap();
//!
//! // A source that always draws zero picks the first alternative.
//! let text = grammar.generate("greeting", &mut StepRng::new(0, 0)).unwrap();
//! assert_eq!(text, "hello Ada");
//! ```

pub mod analysis;
pub mod generator;
pub mod grammar;
pub mod lexer;
pub mod lexicon;
pub mod parser;
pub mod rule;
pub mod transform;
pub mod utils;

pub use analysis::Analysis;
pub use generator::Generator;
pub use grammar::{Grammar, GrammarBuilder, GrammarConfig, MAX_RECURSION_DEPTH, Rule};
pub use lexicon::Lexicon;
pub use rule::{RuleExpr, WeightedOption};
pub use transform::Transform;
pub use utils::{GrammarError, Result, Site, Span};

use rand::Rng;

/// Compile metalanguage source into a grammar
pub fn compile(source: &str) -> Result<Grammar> {
    Grammar::compile(source)
}

/// Expand `start` once, with the default configuration and no lexicon
pub fn generate<R: Rng + ?Sized>(grammar: &Grammar, start: &str, rng: &mut R) -> Result<String> {
    Generator::new(grammar).generate(start, rng)
}
