//! Static diagnostics over a compiled grammar, and enumeration of the
//! output shapes it can produce.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::grammar::{Grammar, GrammarConfig};
use crate::rule::RuleExpr;
use crate::transform::Transform;
use crate::utils::{GrammarError, Result};

/// Findings about a grammar relative to a start rule
///
/// None of these stop a grammar from compiling: recursion is allowed, and an
/// unreachable rule can still serve as a start rule of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    /// Rules that cannot be reached from the start rule
    pub unreachable: Vec<String>,
    /// Rules that can reach themselves through references
    pub recursive: Vec<String>,
    /// Rules with no finite expansion; generating them always hits the depth limit
    pub non_terminating: Vec<String>,
}

impl Analysis {
    pub fn is_clean(&self) -> bool {
        self.unreachable.is_empty() && self.non_terminating.is_empty()
    }
}

impl Grammar {
    /// Analyse the grammar as seen from `start`
    ///
    /// Lists are sorted by rule name.
    pub fn analyze(&self, start: &str) -> Result<Analysis> {
        if !self.has_rule(start) {
            return Err(GrammarError::UnknownStartRule(start.to_string()));
        }

        let reachable = self.reachable_from([start]);
        let unreachable = self
            .rule_names()
            .filter(|name| !reachable.contains(name))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        let recursive = self
            .rule_names()
            .filter(|name| self.reachable_from(self.references_of(name)).contains(name))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        let terminating = self.terminating_rules();
        let non_terminating = self
            .rule_names()
            .filter(|name| !terminating.contains(name))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        Ok(Analysis {
            unreachable: unreachable.into_iter().collect(),
            recursive: recursive.into_iter().collect(),
            non_terminating: non_terminating.into_iter().collect(),
        })
    }

    /// List distinct terminal sequences derivable from `start`, at most `limit`
    ///
    /// Every alternation option, optional part and repetition count is
    /// followed, in declared order. Lookups stay as `[Column]` placeholders
    /// and literal brackets and backslashes are escaped with `\`, so each
    /// entry reads as an output template. Branches that nest references
    /// deeper than the default recursion depth are dropped, which keeps
    /// recursive grammars finite. Case transforms apply to literal text;
    /// `.cap` and `.a` over a leading lookup are left to generation time.
    pub fn terminal_sequences(&self, start: &str, limit: usize) -> Result<Vec<String>> {
        let expr = self
            .rule(start)
            .ok_or_else(|| GrammarError::UnknownStartRule(start.to_string()))?;

        let mut enumerator = Enumerator {
            grammar: self,
            limit,
            max_depth: GrammarConfig::default().max_recursion_depth,
            memo: HashMap::new(),
        };
        let formats = enumerator.formats(expr, 0);
        Ok(formats.iter().map(Format::render).collect())
    }

    fn references_of<'g>(&'g self, name: &str) -> Vec<&'g str> {
        let mut names = Vec::new();
        if let Some(expr) = self.rule(name) {
            expr.for_each_reference(&mut |reference| names.push(reference));
        }
        names
    }

    /// Breadth-first closure over references, including the roots
    fn reachable_from<'g>(&'g self, roots: impl IntoIterator<Item = &'g str>) -> HashSet<&'g str> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = roots.into_iter().collect();
        while let Some(name) = queue.pop_front() {
            if seen.insert(name) {
                queue.extend(self.references_of(name));
            }
        }
        seen
    }

    /// Fixpoint of rules known to have at least one finite expansion
    fn terminating_rules(&self) -> HashSet<&str> {
        let mut terminating = HashSet::new();
        loop {
            let before = terminating.len();
            for rule in self.rules() {
                if !terminating.contains(rule.name.as_str()) && terminates(&rule.expr, &terminating) {
                    terminating.insert(rule.name.as_str());
                }
            }
            if terminating.len() == before {
                return terminating;
            }
        }
    }
}

fn terminates(expr: &RuleExpr, terminating: &HashSet<&str>) -> bool {
    match expr {
        RuleExpr::Literal(_) | RuleExpr::Lookup(_) | RuleExpr::Optional(_) => true,
        RuleExpr::Reference(name) => terminating.contains(name.as_str()),
        RuleExpr::Sequence(children) => children.iter().all(|child| terminates(child, terminating)),
        RuleExpr::Alternation(options) => options
            .iter()
            .any(|option| terminates(&option.expr, terminating)),
        RuleExpr::Repetition { child, min, .. } => *min == 0 || terminates(child, terminating),
        RuleExpr::Transform { child, .. } => terminates(child, terminating),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Lookup(String),
}

/// One output template; adjacent text pieces are always merged
#[derive(Debug, Clone, Default, PartialEq)]
struct Format(Vec<Piece>);

impl Format {
    fn text(text: &str) -> Self {
        if text.is_empty() {
            Format::default()
        } else {
            Format(vec![Piece::Text(text.to_string())])
        }
    }

    fn append(&mut self, other: &Format) {
        for piece in &other.0 {
            match (self.0.last_mut(), piece) {
                (Some(Piece::Text(last)), Piece::Text(text)) => last.push_str(text),
                _ => self.0.push(piece.clone()),
            }
        }
    }

    fn transformed(mut self, transform: Transform) -> Self {
        match transform {
            Transform::Uppercase | Transform::Lowercase => {
                for piece in &mut self.0 {
                    if let Piece::Text(text) = piece {
                        *text = transform.apply(text);
                    }
                }
            }
            Transform::Capitalize | Transform::IndefiniteArticle => {
                if let Some(Piece::Text(text)) = self.0.first_mut() {
                    *text = transform.apply(text);
                }
            }
        }
        self
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for piece in &self.0 {
            match piece {
                Piece::Text(text) => {
                    for c in text.chars() {
                        if matches!(c, '[' | ']' | '\\') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                }
                Piece::Lookup(column) => {
                    out.push('[');
                    out.push_str(column);
                    out.push(']');
                }
            }
        }
        out
    }
}

/// Breadth of every intermediate result is capped at `limit`
struct Enumerator<'g> {
    grammar: &'g Grammar,
    limit: usize,
    max_depth: usize,
    /// Results per rule and depth; depth matters because it bounds pruning
    memo: HashMap<(&'g str, usize), Vec<Format>>,
}

impl<'g> Enumerator<'g> {
    fn formats(&mut self, expr: &'g RuleExpr, depth: usize) -> Vec<Format> {
        match expr {
            RuleExpr::Literal(text) => self.capped(vec![Format::text(text)]),
            RuleExpr::Lookup(column) => self.capped(vec![Format(vec![Piece::Lookup(column.clone())])]),
            RuleExpr::Reference(name) => self.reference(name, depth + 1),
            RuleExpr::Sequence(children) => {
                let mut current = self.capped(vec![Format::default()]);
                for child in children {
                    let next = self.formats(child, depth);
                    current = self.product(&current, &next);
                }
                current
            }
            RuleExpr::Alternation(options) => {
                let mut out = Vec::new();
                for option in options {
                    let formats = self.formats(&option.expr, depth);
                    self.merge(&mut out, formats);
                }
                out
            }
            RuleExpr::Repetition { child, min, max } => {
                let once = self.formats(child, depth);
                let mut out = Vec::new();
                let mut current = self.capped(vec![Format::default()]);
                let mut count = 0;
                loop {
                    if count >= *min {
                        self.merge(&mut out, current.clone());
                    }
                    if count == *max || out.len() >= self.limit {
                        break;
                    }
                    let next = self.product(&current, &once);
                    // An empty or text-free child would repeat forever.
                    if next.is_empty() || next == current {
                        if next == current && count < *min {
                            self.merge(&mut out, next);
                        }
                        break;
                    }
                    current = next;
                    count += 1;
                }
                out
            }
            RuleExpr::Optional(child) => {
                let mut out = self.formats(child, depth);
                self.merge(&mut out, vec![Format::default()]);
                out
            }
            RuleExpr::Transform { child, transforms } => {
                let transformed = self
                    .formats(child, depth)
                    .into_iter()
                    .map(|format| {
                        transforms
                            .iter()
                            .fold(format, |format, transform| format.transformed(*transform))
                    })
                    .collect();
                let mut out = Vec::new();
                self.merge(&mut out, transformed);
                out
            }
        }
    }

    fn reference(&mut self, name: &'g str, depth: usize) -> Vec<Format> {
        if depth > self.max_depth {
            return Vec::new();
        }
        if let Some(formats) = self.memo.get(&(name, depth)) {
            return formats.clone();
        }
        let formats = match self.grammar.rule(name) {
            Some(expr) => self.formats(expr, depth),
            None => Vec::new(),
        };
        self.memo.insert((name, depth), formats.clone());
        formats
    }

    /// Every left followed by every right, in order, without duplicates
    fn product(&self, left: &[Format], right: &[Format]) -> Vec<Format> {
        let mut out = Vec::new();
        for head in left {
            for tail in right {
                if out.len() >= self.limit {
                    return out;
                }
                let mut format = head.clone();
                format.append(tail);
                if !out.contains(&format) {
                    out.push(format);
                }
            }
        }
        out
    }

    fn merge(&self, out: &mut Vec<Format>, formats: Vec<Format>) {
        for format in formats {
            if out.len() >= self.limit {
                return;
            }
            if !out.contains(&format) {
                out.push(format);
            }
        }
    }

    fn capped(&self, mut formats: Vec<Format>) -> Vec<Format> {
        formats.truncate(self.limit);
        formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_grammar() {
        let grammar = Grammar::compile("a = b \"x\"\nb = \"y\"").unwrap();
        let analysis = grammar.analyze("a").unwrap();
        assert_eq!(analysis, Analysis::default());
        assert!(analysis.is_clean());
    }

    #[test]
    fn test_unreachable_rules() {
        let grammar = Grammar::compile("a = b\nb = \"y\"\nc = \"z\"\nd = c").unwrap();
        let analysis = grammar.analyze("a").unwrap();
        assert_eq!(analysis.unreachable, vec!["c", "d"]);
        assert!(!analysis.is_clean());

        assert!(grammar.analyze("d").unwrap().unreachable.contains(&"a".to_string()));
    }

    #[test]
    fn test_recursion_and_termination() {
        let grammar = Grammar::compile(
            r#"
            RESULT = list | loop
            list = "x" | "x" list
            loop = loop
            ping = pong "!"
            pong = ping
        "#,
        )
        .unwrap();
        let analysis = grammar.analyze("RESULT").unwrap();
        assert_eq!(analysis.unreachable, vec!["ping", "pong"]);
        assert_eq!(analysis.recursive, vec!["list", "loop", "ping", "pong"]);
        assert_eq!(analysis.non_terminating, vec!["loop", "ping", "pong"]);
    }

    #[test]
    fn test_optional_recursion_terminates() {
        let grammar = Grammar::compile("a = \"x\" a?\nb = b{0,2} \"y\"").unwrap();
        let analysis = grammar.analyze("a").unwrap();
        assert_eq!(analysis.recursive, vec!["a", "b"]);
        assert!(analysis.non_terminating.is_empty());
    }

    #[test]
    fn test_terminal_sequences_follow_every_branch() {
        let grammar = Grammar::compile(
            r#"
            RESULT = A " " B
            A = "Hello" | "Goodbye"
            B = "[cruel] "? "world"
        "#,
        )
        .unwrap();
        assert_eq!(
            grammar.terminal_sequences("RESULT", 10).unwrap(),
            vec![
                r"Hello \[cruel\] world",
                "Hello world",
                r"Goodbye \[cruel\] world",
                "Goodbye world",
            ]
        );
    }

    #[test]
    fn test_terminal_sequences_respect_limit_and_depth() {
        let grammar = Grammar::compile(
            r#"
            pick = ("x" | "y"){3}
            list = "x" | "x, " list
            loop = loop
            same = "a" | "a"
        "#,
        )
        .unwrap();
        assert_eq!(
            grammar.terminal_sequences("pick", 5).unwrap(),
            vec!["xxx", "xxy", "xyx", "xyy", "yxx"]
        );
        assert_eq!(
            grammar.terminal_sequences("list", 3).unwrap(),
            vec!["x", "x, x", "x, x, x"]
        );
        assert!(grammar.terminal_sequences("loop", 3).unwrap().is_empty());
        assert_eq!(grammar.terminal_sequences("same", 3).unwrap(), vec!["a"]);
        assert!(grammar.terminal_sequences("pick", 0).unwrap().is_empty());
    }

    #[test]
    fn test_terminal_sequences_keep_lookups() {
        let grammar = Grammar::compile(
            r#"
            RESULT   = greeting.cap ", " [Name] "!" | thing.a
            greeting = "hello" | "hi"
            thing    = [Noun] " drive"
            empty    = ""{0,5} "z"
        "#,
        )
        .unwrap();
        assert_eq!(
            grammar.terminal_sequences("RESULT", 10).unwrap(),
            vec!["Hello, [Name]!", "Hi, [Name]!", "[Noun] drive"]
        );
        assert_eq!(grammar.terminal_sequences("empty", 10).unwrap(), vec!["z"]);
    }

    #[test]
    fn test_unknown_start() {
        let grammar = Grammar::compile("a = \"x\"").unwrap();
        assert!(matches!(
            grammar.analyze("RESULT"),
            Err(GrammarError::UnknownStartRule(_))
        ));
        assert!(matches!(
            grammar.terminal_sequences("RESULT", 5),
            Err(GrammarError::UnknownStartRule(_))
        ));
    }
}
