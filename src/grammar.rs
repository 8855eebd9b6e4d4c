use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::generator::Generator;
use crate::parser::{self, RawExpr, RawExprKind, RawRule, RepeatOp};
use crate::rule::{RuleExpr, WeightedOption, is_bare_name};
use crate::transform::Transform;
use crate::utils::{GrammarError, Result, Site, Span};

/// Largest accepted `max_recursion_depth`; each nested reference costs native stack
pub const MAX_RECURSION_DEPTH: usize = 1_000;

/// Configuration options for compiling and generating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Maximum nesting of rule references during one expansion
    pub max_recursion_depth: usize,
    /// Upper repetition bound for the open forms `*`, `+` and `{m,}`
    pub open_repeat_limit: u32,
    /// Whether lexicon rows used once are skipped for the rest of a generation
    pub avoid_lookup_repeats: bool,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            max_recursion_depth: 100,
            open_repeat_limit: 3,
            avoid_lookup_repeats: true,
        }
    }
}

impl GrammarConfig {
    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GrammarConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_RECURSION_DEPTH).contains(&self.max_recursion_depth) {
            return Err(GrammarError::InvalidConfig(format!(
                "max_recursion_depth must be between 1 and {}",
                MAX_RECURSION_DEPTH
            )));
        }
        if self.open_repeat_limit == 0 {
            return Err(GrammarError::InvalidConfig(
                "open_repeat_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named rule of a grammar
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expr: RuleExpr,
    /// Where the rule was defined, if it came from source text
    pub span: Option<Span>,
}

/// An immutable set of rules, keyed by unique name
///
/// Every name referenced inside any rule is guaranteed to be defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    rules: HashMap<String, Rule>,
    /// Rule names in definition order
    order: Vec<String>,
}

impl Grammar {
    /// Compile metalanguage source with the default configuration
    pub fn compile(source: &str) -> Result<Self> {
        Self::compile_with(source, &GrammarConfig::default())
    }

    /// Compile metalanguage source
    pub fn compile_with(source: &str, config: &GrammarConfig) -> Result<Self> {
        config.validate()?;
        let raw_rules = parser::parse(source)?;

        let mut compiler = Compiler {
            config,
            rule: String::new(),
            references: Vec::new(),
        };
        let mut rules = Vec::with_capacity(raw_rules.len());
        for raw in raw_rules {
            rules.push(compiler.rule(raw)?);
        }

        let grammar = Self::assemble(rules, compiler.references)?;
        debug!(rules = grammar.len(), "compiled grammar");
        Ok(grammar)
    }

    /// Read and compile a grammar file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(GrammarError::Io)?;
        Self::compile(&source)
    }

    /// Check for duplicate names and undefined references, then freeze
    fn assemble(rules: Vec<Rule>, references: Vec<(String, Site)>) -> Result<Self> {
        let mut map: HashMap<String, Rule> = HashMap::with_capacity(rules.len());
        let mut order = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Some(first) = map.get(&rule.name) {
                return Err(GrammarError::DuplicateRule {
                    name: rule.name.clone(),
                    first: first.span,
                    second: rule.span,
                });
            }
            order.push(rule.name.clone());
            map.insert(rule.name.clone(), rule);
        }

        if let Some((missing, _)) = references.iter().find(|(name, _)| !map.contains_key(name)) {
            let sites = references
                .iter()
                .filter(|(name, _)| name == missing)
                .map(|(_, site)| site.clone())
                .collect();
            return Err(GrammarError::UndefinedRule {
                name: missing.clone(),
                sites,
            });
        }

        Ok(Grammar { rules: map, order })
    }

    /// Get the expression of a rule
    pub fn rule(&self, name: &str) -> Option<&RuleExpr> {
        self.rules.get(name).map(|rule| &rule.expr)
    }

    /// Get a rule with its definition site
    pub fn rule_definition(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Check if the grammar defines a rule
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Rule names in definition order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Rules in definition order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.order.iter().filter_map(|name| self.rules.get(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All lexicon columns looked up anywhere in the grammar
    pub fn lookup_columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        for rule in self.rules.values() {
            rule.expr.for_each_lookup(&mut |column| {
                columns.insert(column);
            });
        }
        columns
    }

    /// Generate text from `start` with the default configuration and no lexicon
    pub fn generate<R: Rng + ?Sized>(&self, start: &str, rng: &mut R) -> Result<String> {
        Generator::new(self).generate(start, rng)
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(source: &str) -> Result<Self> {
        Grammar::compile(source)
    }
}

/// Prints the grammar in metalanguage syntax, one rule per line
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rules() {
            if is_bare_name(&rule.name) {
                write!(f, "{}", rule.name)?;
            } else {
                write!(f, "{}", RuleExpr::Reference(rule.name.clone()))?;
            }
            writeln!(f, " = {}", rule.expr)?;
        }
        Ok(())
    }
}

/// Second compile pass: raw tree to `RuleExpr`, collecting references
struct Compiler<'c> {
    config: &'c GrammarConfig,
    /// Name of the rule being converted
    rule: String,
    references: Vec<(String, Site)>,
}

impl Compiler<'_> {
    fn rule(&mut self, raw: RawRule) -> Result<Rule> {
        self.rule = raw.name.clone();
        let mut expr = self.expr(raw.body)?;
        for (name, span) in raw.transforms {
            expr = expr.transformed(transform(&name, span)?);
        }
        Ok(Rule {
            name: raw.name,
            expr,
            span: Some(raw.span),
        })
    }

    fn expr(&mut self, raw: RawExpr) -> Result<RuleExpr> {
        let span = raw.span;
        Ok(match raw.kind {
            RawExprKind::Literal(text) => RuleExpr::Literal(text),
            RawExprKind::Lookup(column) => RuleExpr::Lookup(column),
            RawExprKind::Name(name) => {
                self.references.push((
                    name.clone(),
                    Site {
                        rule: self.rule.clone(),
                        span: Some(span),
                    },
                ));
                RuleExpr::Reference(name)
            }
            RawExprKind::Sequence(items) => RuleExpr::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<_>>()?,
            ),
            RawExprKind::Alternation(alternatives) => {
                let mut options = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    let weight = match alternative.weight {
                        Some((weight, span)) => {
                            check_weight(&self.rule, weight, Some(span))?;
                            weight
                        }
                        None => 1.0,
                    };
                    options.push(WeightedOption {
                        weight,
                        expr: self.expr(alternative.expr)?,
                    });
                }
                check_total_weight(&self.rule, &options, Some(span))?;
                RuleExpr::Alternation(options)
            }
            RawExprKind::Repeat(inner, op) => {
                let child = self.expr(*inner)?;
                let limit = self.config.open_repeat_limit;
                let (min, max) = match op {
                    RepeatOp::Optional => return Ok(RuleExpr::optional(child)),
                    RepeatOp::ZeroOrMore => (0, limit),
                    RepeatOp::OneOrMore => (1, limit.max(1)),
                    RepeatOp::Bounded(min, Some(max)) => (min, max),
                    RepeatOp::Bounded(min, None) => (min, limit.max(min)),
                };
                check_bounds(&self.rule, min, max, Some(span))?;
                RuleExpr::repetition(child, min, max)
            }
            RawExprKind::Transform(inner, (name, name_span)) => {
                let transform = transform(&name, name_span)?;
                self.expr(*inner)?.transformed(transform)
            }
        })
    }
}

fn transform(name: &str, span: Span) -> Result<Transform> {
    Transform::from_name(name).ok_or_else(|| GrammarError::UnknownTransform {
        name: name.to_string(),
        span,
    })
}

fn check_weight(rule: &str, weight: f64, span: Option<Span>) -> Result<()> {
    if weight > 0.0 && weight.is_finite() {
        Ok(())
    } else {
        Err(GrammarError::InvalidWeight {
            rule: rule.to_string(),
            weight,
            span,
        })
    }
}

/// Expansion draws in `[0, total)`, so the sum has to stay finite too
fn check_total_weight(rule: &str, options: &[WeightedOption], span: Option<Span>) -> Result<()> {
    let total: f64 = options.iter().map(|option| option.weight).sum();
    if total.is_finite() {
        Ok(())
    } else {
        Err(GrammarError::WeightOverflow {
            rule: rule.to_string(),
            span,
        })
    }
}

fn check_bounds(rule: &str, min: u32, max: u32, span: Option<Span>) -> Result<()> {
    if max >= min {
        Ok(())
    } else {
        Err(GrammarError::InvalidBounds {
            rule: rule.to_string(),
            min,
            max,
            span,
        })
    }
}

/// Structural checks for expressions built in code rather than parsed
fn validate(rule: &str, expr: &RuleExpr, references: &mut Vec<(String, Site)>) -> Result<()> {
    match expr {
        RuleExpr::Literal(_) | RuleExpr::Lookup(_) => Ok(()),
        RuleExpr::Reference(name) => {
            references.push((
                name.clone(),
                Site {
                    rule: rule.to_string(),
                    span: None,
                },
            ));
            Ok(())
        }
        RuleExpr::Sequence(children) => children
            .iter()
            .try_for_each(|child| validate(rule, child, references)),
        RuleExpr::Alternation(options) => {
            if options.is_empty() {
                return Err(GrammarError::EmptyProduction(rule.to_string()));
            }
            for option in options {
                check_weight(rule, option.weight, None)?;
                validate(rule, &option.expr, references)?;
            }
            check_total_weight(rule, options, None)
        }
        RuleExpr::Repetition { child, min, max } => {
            check_bounds(rule, *min, *max, None)?;
            validate(rule, child, references)
        }
        RuleExpr::Optional(child) | RuleExpr::Transform { child, .. } => {
            validate(rule, child, references)
        }
    }
}

/// Builder for constructing Grammar instances in code
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: Vec<Rule>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder { rules: Vec::new() }
    }

    /// Add a rule; all checks are deferred to `build`
    pub fn rule(mut self, name: &str, expr: RuleExpr) -> Self {
        self.rules.push(Rule {
            name: name.to_string(),
            expr,
            span: None,
        });
        self
    }

    /// Validate the rules and build the grammar
    pub fn build(self) -> Result<Grammar> {
        let mut references = Vec::new();
        for rule in &self.rules {
            validate(&rule.name, &rule.expr, &mut references)?;
        }
        Grammar::assemble(self.rules, references)
    }
}
