use std::fmt;

use crate::transform::Transform;

/// One weighted choice of an alternation
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedOption {
    /// Relative probability mass, always positive
    pub weight: f64,
    pub expr: RuleExpr,
}

/// A node of a rule definition
///
/// Rules refer to each other by name only, so a recursive grammar is a
/// logical cycle resolved through `Grammar` lookups, never an ownership cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleExpr {
    /// Fixed text
    Literal(String),
    /// Whatever the named rule expands to
    Reference(String),
    /// A word drawn from the attached lexicon column
    Lookup(String),
    /// Children expanded in order and concatenated
    Sequence(Vec<RuleExpr>),
    /// Exactly one option, chosen by weight
    Alternation(Vec<WeightedOption>),
    /// Child expanded a uniformly drawn number of times in `[min, max]`
    Repetition {
        child: Box<RuleExpr>,
        min: u32,
        max: u32,
    },
    /// Same as a repetition with bounds `[0, 1]`
    Optional(Box<RuleExpr>),
    /// Child expansion passed through transforms, left to right
    Transform {
        child: Box<RuleExpr>,
        transforms: Vec<Transform>,
    },
}

impl RuleExpr {
    pub fn literal(text: impl Into<String>) -> Self {
        RuleExpr::Literal(text.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        RuleExpr::Reference(name.into())
    }

    pub fn lookup(column: impl Into<String>) -> Self {
        RuleExpr::Lookup(column.into())
    }

    /// Sequence of children; a single child stands for itself, matching
    /// what the parser produces
    pub fn sequence(mut children: Vec<RuleExpr>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            RuleExpr::Sequence(children)
        }
    }

    /// Alternation from `(weight, expr)` pairs; weights are checked when the
    /// grammar is built
    pub fn alternation(options: Vec<(f64, RuleExpr)>) -> Self {
        RuleExpr::Alternation(
            options
                .into_iter()
                .map(|(weight, expr)| WeightedOption { weight, expr })
                .collect(),
        )
    }

    /// Alternation where every option has weight 1
    pub fn choice(options: Vec<RuleExpr>) -> Self {
        Self::alternation(options.into_iter().map(|expr| (1.0, expr)).collect())
    }

    pub fn repetition(child: RuleExpr, min: u32, max: u32) -> Self {
        RuleExpr::Repetition {
            child: Box::new(child),
            min,
            max,
        }
    }

    pub fn optional(child: RuleExpr) -> Self {
        RuleExpr::Optional(Box::new(child))
    }

    /// Attach a transform, merging into an existing transform chain
    pub fn transformed(self, transform: Transform) -> Self {
        match self {
            RuleExpr::Transform {
                child,
                mut transforms,
            } => {
                transforms.push(transform);
                RuleExpr::Transform { child, transforms }
            }
            child => RuleExpr::Transform {
                child: Box::new(child),
                transforms: vec![transform],
            },
        }
    }

    /// Visit every rule name referenced beneath this node
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            RuleExpr::Reference(name) => f(name),
            RuleExpr::Literal(_) | RuleExpr::Lookup(_) => {}
            RuleExpr::Sequence(children) => {
                for child in children {
                    child.for_each_reference(f);
                }
            }
            RuleExpr::Alternation(options) => {
                for option in options {
                    option.expr.for_each_reference(f);
                }
            }
            RuleExpr::Repetition { child, .. }
            | RuleExpr::Optional(child)
            | RuleExpr::Transform { child, .. } => child.for_each_reference(f),
        }
    }

    /// Visit every lexicon column looked up beneath this node
    pub fn for_each_lookup<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            RuleExpr::Lookup(column) => f(column),
            RuleExpr::Literal(_) | RuleExpr::Reference(_) => {}
            RuleExpr::Sequence(children) => {
                for child in children {
                    child.for_each_lookup(f);
                }
            }
            RuleExpr::Alternation(options) => {
                for option in options {
                    option.expr.for_each_lookup(f);
                }
            }
            RuleExpr::Repetition { child, .. }
            | RuleExpr::Optional(child)
            | RuleExpr::Transform { child, .. } => child.for_each_lookup(f),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            RuleExpr::Alternation(_) => 0,
            RuleExpr::Sequence(children) if children.len() > 1 => 1,
            _ => 2,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }

        match self {
            RuleExpr::Literal(text) => write_quoted(f, text, '"', '"'),
            RuleExpr::Reference(name) if is_bare_name(name) => write!(f, "{}", name),
            RuleExpr::Reference(name) => write_quoted(f, name, '<', '>'),
            RuleExpr::Lookup(column) => write_quoted(f, column, '[', ']'),
            RuleExpr::Sequence(children) if children.is_empty() => write!(f, "()"),
            RuleExpr::Sequence(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    child.fmt_at(f, 2)?;
                }
                Ok(())
            }
            RuleExpr::Alternation(options) => {
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    if option.weight != 1.0 || options.len() == 1 {
                        write!(f, "{}: ", option.weight)?;
                    }
                    option.expr.fmt_at(f, 1)?;
                }
                Ok(())
            }
            RuleExpr::Repetition { child, min, max } => {
                child.fmt_at(f, 2)?;
                if min == max {
                    write!(f, "{{{}}}", min)
                } else {
                    write!(f, "{{{},{}}}", min, max)
                }
            }
            RuleExpr::Optional(child) => {
                child.fmt_at(f, 2)?;
                write!(f, "?")
            }
            RuleExpr::Transform { child, transforms } => {
                child.fmt_at(f, 2)?;
                for transform in transforms {
                    write!(f, "{}", transform)?;
                }
                Ok(())
            }
        }
    }
}

/// Prints the node back in metalanguage syntax
impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

pub(crate) fn is_bare_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str, open: char, close: char) -> fmt::Result {
    write!(f, "{}", open)?;
    for c in text.chars() {
        match c {
            '\n' if open == '"' => write!(f, "\\n")?,
            '\t' if open == '"' => write!(f, "\\t")?,
            '\\' => write!(f, "\\\\")?,
            c if c == close => write!(f, "\\{}", c)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_precedence() {
        let expr = RuleExpr::choice(vec![
            RuleExpr::sequence(vec![
                RuleExpr::literal("hello "),
                RuleExpr::reference("name"),
            ]),
            RuleExpr::repetition(
                RuleExpr::sequence(vec![RuleExpr::literal("a"), RuleExpr::lookup("Noun")]),
                1,
                3,
            ),
        ]);
        assert_eq!(expr.to_string(), r#""hello " name | ("a" [Noun]){1,3}"#);
    }

    #[test]
    fn test_empty_sequence_round_trips() {
        let expr = RuleExpr::choice(vec![RuleExpr::sequence(Vec::new()), RuleExpr::literal("")]);
        assert_eq!(expr.to_string(), r#"() | """#);

        let grammar = crate::GrammarBuilder::new()
            .rule("a", expr.clone())
            .rule("b", RuleExpr::sequence(vec![RuleExpr::reference("a")]))
            .build()
            .unwrap();
        let reparsed = crate::Grammar::compile(&grammar.to_string()).unwrap();
        assert_eq!(reparsed.rule("a"), Some(&expr));
        assert_eq!(reparsed.rule("b"), Some(&RuleExpr::reference("a")));
    }

    #[test]
    fn test_display_weights_and_transforms() {
        let expr = RuleExpr::alternation(vec![
            (2.5, RuleExpr::reference("full name")),
            (1.0, RuleExpr::optional(RuleExpr::literal("say \"x\""))),
        ])
        .transformed(Transform::Capitalize)
        .transformed(Transform::IndefiniteArticle);
        assert_eq!(
            expr.to_string(),
            r#"(2.5: <full name> | "say \"x\""?).cap.a"#
        );
    }

    #[test]
    fn test_transformed_merges_chain() {
        let expr = RuleExpr::literal("x")
            .transformed(Transform::Uppercase)
            .transformed(Transform::IndefiniteArticle);
        match expr {
            RuleExpr::Transform { transforms, .. } => {
                assert_eq!(
                    transforms,
                    vec![Transform::Uppercase, Transform::IndefiniteArticle]
                );
            }
            other => panic!("Expected Transform, got {:?}", other),
        }
    }

    #[test]
    fn test_for_each_reference() {
        let expr = RuleExpr::sequence(vec![
            RuleExpr::reference("a"),
            RuleExpr::optional(RuleExpr::choice(vec![
                RuleExpr::reference("b"),
                RuleExpr::lookup("C"),
            ])),
        ]);
        let mut names = Vec::new();
        expr.for_each_reference(&mut |name| names.push(name));
        assert_eq!(names, vec!["a", "b"]);

        let mut columns = Vec::new();
        expr.for_each_lookup(&mut |column| columns.push(column));
        assert_eq!(columns, vec!["C"]);
    }
}
