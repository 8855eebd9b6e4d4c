//! Random expansion of compiled grammars.
//!
//! Expansion is a pure function of the grammar, the start rule and the
//! sequence of draws taken from the caller's random source. Draw order is
//! fixed so a seeded source reproduces output exactly:
//!
//! - an alternation takes one `f64` draw in `[0, total weight)` and picks the
//!   first option whose cumulative weight exceeds it;
//! - a repetition takes one integer draw in `[min, max]`, an optional one in
//!   `[0, 1]`;
//! - a lookup takes one integer draw over its candidate rows;
//! - children are expanded left to right.

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, trace};

use crate::grammar::{Grammar, GrammarConfig};
use crate::lexicon::Lexicon;
use crate::rule::{RuleExpr, WeightedOption};
use crate::transform;
use crate::utils::{GrammarError, OptionExt, Result};

/// Expands rules of a grammar into text
///
/// A generator only borrows its grammar and lexicon, so one grammar can back
/// any number of generators, including on different threads, as long as each
/// call gets its own random source.
#[derive(Debug, Clone)]
pub struct Generator<'a> {
    grammar: &'a Grammar,
    lexicon: Option<&'a Lexicon>,
    config: GrammarConfig,
}

impl<'a> Generator<'a> {
    pub fn new(grammar: &'a Grammar) -> Self {
        Generator {
            grammar,
            lexicon: None,
            config: GrammarConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GrammarConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the word table used by `[Column]` lookups
    pub fn with_lexicon(mut self, lexicon: &'a Lexicon) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    /// Expand `start` into one string
    pub fn generate<R: Rng + ?Sized>(&self, start: &str, rng: &mut R) -> Result<String> {
        self.config.validate()?;
        let expr = self
            .grammar
            .rule(start)
            .ok_or_grammar_err(|| GrammarError::UnknownStartRule(start.to_string()))?;

        let mut expansion = Expansion {
            grammar: self.grammar,
            lexicon: self.lexicon,
            config: &self.config,
            rng,
            used_rows: HashSet::new(),
        };
        let mut out = String::new();
        expansion.expand(expr, 0, &mut out)?;

        debug!(start, len = out.len(), "generated text");
        Ok(out)
    }

    /// Expand `start` `count` times with the same random source
    pub fn generate_many<R: Rng + ?Sized>(
        &self,
        start: &str,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        (0..count).map(|_| self.generate(start, rng)).collect()
    }
}

/// State of one `generate` call
struct Expansion<'a, 'r, R: Rng + ?Sized> {
    grammar: &'a Grammar,
    lexicon: Option<&'a Lexicon>,
    config: &'a GrammarConfig,
    rng: &'r mut R,
    /// Lexicon rows already drawn during this call
    used_rows: HashSet<usize>,
}

impl<R: Rng + ?Sized> Expansion<'_, '_, R> {
    fn expand(&mut self, expr: &RuleExpr, depth: usize, out: &mut String) -> Result<()> {
        match expr {
            RuleExpr::Literal(text) => out.push_str(text),
            RuleExpr::Reference(name) => {
                let depth = depth + 1;
                if depth > self.config.max_recursion_depth {
                    return Err(GrammarError::RecursionLimitExceeded {
                        rule: name.clone(),
                        limit: self.config.max_recursion_depth,
                    });
                }
                // Compiled grammars never hold dangling references.
                let target = self.grammar.rule(name).ok_or_grammar_err(|| {
                    GrammarError::UndefinedRule {
                        name: name.clone(),
                        sites: Vec::new(),
                    }
                })?;
                self.expand(target, depth, out)?;
            }
            RuleExpr::Lookup(column) => {
                let lexicon = self.lexicon.ok_or_grammar_err(|| GrammarError::MissingLexicon {
                    column: column.clone(),
                })?;
                let used = self
                    .config
                    .avoid_lookup_repeats
                    .then_some(&mut self.used_rows);
                out.push_str(lexicon.pick(column, &mut *self.rng, used)?);
            }
            RuleExpr::Sequence(children) => {
                for child in children {
                    self.expand(child, depth, out)?;
                }
            }
            RuleExpr::Alternation(options) => {
                let chosen = self.choose(options);
                self.expand(&options[chosen].expr, depth, out)?;
            }
            RuleExpr::Repetition { child, min, max } => {
                let count = self.rng.gen_range(*min..=*max);
                trace!(count, min, max, "repetition");
                for _ in 0..count {
                    self.expand(child, depth, out)?;
                }
            }
            RuleExpr::Optional(child) => {
                if self.rng.gen_range(0..=1u32) == 1 {
                    self.expand(child, depth, out)?;
                }
            }
            RuleExpr::Transform { child, transforms } => {
                let mut inner = String::new();
                self.expand(child, depth, &mut inner)?;
                out.push_str(&transform::apply_all(transforms, inner));
            }
        }
        Ok(())
    }

    /// Weighted pick; ties in the draw go to the earliest option
    fn choose(&mut self, options: &[WeightedOption]) -> usize {
        let total: f64 = options.iter().map(|option| option.weight).sum();
        let draw = self.rng.gen_range(0.0..total);

        let mut cumulative = 0.0;
        for (index, option) in options.iter().enumerate() {
            cumulative += option.weight;
            if draw < cumulative {
                trace!(index, draw, total, "alternation");
                return index;
            }
        }
        // Only reachable through float rounding at the top of the range.
        options.len() - 1
    }
}
