//! Recursive-descent parser producing the raw rule tree.
//!
//! Precedence from loosest to tightest: alternation (`|`), sequence
//! (adjacency or `,`), postfix (`?`, `*`, `+`, `{m,n}`, `.transform`),
//! atoms and parenthesised groups.

use crate::lexer::{Lexer, Token, TokenKind};
use crate::utils::{GrammarError, Result, Span};

/// A rule definition as written in source
#[derive(Debug, Clone, PartialEq)]
pub struct RawRule {
    pub name: String,
    pub span: Span,
    /// Transforms attached to the rule name, e.g. `title.cap = ...`
    pub transforms: Vec<(String, Span)>,
    pub body: RawExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawExpr {
    pub kind: RawExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawExprKind {
    Literal(String),
    Name(String),
    Lookup(String),
    Sequence(Vec<RawExpr>),
    Alternation(Vec<RawAlternative>),
    Repeat(Box<RawExpr>, RepeatOp),
    Transform(Box<RawExpr>, (String, Span)),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAlternative {
    /// Weight as written, with its position
    pub weight: Option<(f64, Span)>,
    pub expr: RawExpr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatOp {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `{min}`, `{min,max}` or `{min,}`
    Bounded(u32, Option<u32>),
}

/// Parse metalanguage source into raw rule definitions
pub fn parse(source: &str) -> Result<Vec<RawRule>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.grammar()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Span> {
        if &self.peek().kind == kind {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> GrammarError {
        let token = self.peek();
        GrammarError::syntax(token.span, expected, token.kind.describe())
    }

    /// Whether the upcoming tokens read `name ('.' ident)* '='`
    fn at_rule_start(&self) -> bool {
        if !matches!(
            self.peek_at(0),
            TokenKind::Ident(_) | TokenKind::AngleName(_)
        ) {
            return false;
        }
        let mut offset = 1;
        while self.peek_at(offset) == &TokenKind::Dot
            && matches!(self.peek_at(offset + 1), TokenKind::Ident(_))
        {
            offset += 2;
        }
        self.peek_at(offset) == &TokenKind::Equals
    }

    fn grammar(&mut self) -> Result<Vec<RawRule>> {
        let mut rules = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            rules.push(self.rule()?);
        }
        Ok(rules)
    }

    fn rule(&mut self) -> Result<RawRule> {
        let token = self.advance();
        let name = match token.kind {
            TokenKind::Ident(name) | TokenKind::AngleName(name) => name,
            other => {
                return Err(GrammarError::syntax(
                    token.span,
                    "a rule name",
                    other.describe(),
                ));
            }
        };

        let mut transforms = Vec::new();
        while self.eat(&TokenKind::Dot) {
            transforms.push(self.transform_name()?);
        }

        self.expect(&TokenKind::Equals, "'=' after rule name")?;
        let body = self.alternation()?;

        // An explicit terminator is optional.
        self.eat(&TokenKind::Semicolon);

        Ok(RawRule {
            name,
            span: token.span,
            transforms,
            body,
        })
    }

    fn transform_name(&mut self) -> Result<(String, Span)> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.span)),
            other => Err(GrammarError::syntax(
                token.span,
                "a transform name after '.'",
                other.describe(),
            )),
        }
    }

    fn alternation(&mut self) -> Result<RawExpr> {
        let span = self.peek().span;
        let mut alternatives = vec![self.alternative()?];
        while self.eat(&TokenKind::Pipe) {
            alternatives.push(self.alternative()?);
        }

        if alternatives.len() == 1 && alternatives[0].weight.is_none() {
            return Ok(alternatives.remove(0).expr);
        }
        Ok(RawExpr {
            kind: RawExprKind::Alternation(alternatives),
            span,
        })
    }

    fn alternative(&mut self) -> Result<RawAlternative> {
        let weighted = self.peek_at(1) == &TokenKind::Colon;
        let weight = match self.peek().clone() {
            Token {
                kind: TokenKind::Number(raw),
                span,
            } if weighted => {
                let weight = raw
                    .parse::<f64>()
                    .map_err(|_| GrammarError::syntax(span, "a weight", raw.as_str()))?;
                self.advance();
                self.advance();
                Some((weight, span))
            }
            _ => None,
        };

        Ok(RawAlternative {
            weight,
            expr: self.sequence()?,
        })
    }

    fn at_sequence_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Pipe | TokenKind::RParen | TokenKind::Semicolon | TokenKind::Eof
        ) || self.at_rule_start()
    }

    fn sequence(&mut self) -> Result<RawExpr> {
        let span = self.peek().span;
        if self.at_sequence_end() {
            return Err(self.unexpected("an expression"));
        }

        let mut items = vec![self.postfix()?];
        loop {
            if self.eat(&TokenKind::Comma) {
                // An explicit `,` must be followed by another item.
                if self.at_sequence_end() {
                    return Err(self.unexpected("an expression after ','"));
                }
            } else if self.at_sequence_end() {
                break;
            }
            items.push(self.postfix()?);
        }

        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(RawExpr {
            kind: RawExprKind::Sequence(items),
            span,
        })
    }

    fn postfix(&mut self) -> Result<RawExpr> {
        let mut expr = self.atom()?;
        loop {
            let span = expr.span;
            let op = match self.peek().kind {
                TokenKind::Question => {
                    self.advance();
                    RepeatOp::Optional
                }
                TokenKind::Star => {
                    self.advance();
                    RepeatOp::ZeroOrMore
                }
                TokenKind::Plus => {
                    self.advance();
                    RepeatOp::OneOrMore
                }
                TokenKind::LBrace => {
                    self.advance();
                    self.bounds()?
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.transform_name()?;
                    expr = RawExpr {
                        kind: RawExprKind::Transform(Box::new(expr), name),
                        span,
                    };
                    continue;
                }
                _ => return Ok(expr),
            };
            expr = RawExpr {
                kind: RawExprKind::Repeat(Box::new(expr), op),
                span,
            };
        }
    }

    /// Parse the inside of `{...}` after the opening brace
    fn bounds(&mut self) -> Result<RepeatOp> {
        let min = self.count()?;
        let max = if self.eat(&TokenKind::Comma) {
            if matches!(self.peek().kind, TokenKind::RBrace) {
                None
            } else {
                Some(self.count()?)
            }
        } else {
            Some(min)
        };
        self.expect(&TokenKind::RBrace, "'}' to close repetition bounds")?;
        Ok(RepeatOp::Bounded(min, max))
    }

    fn count(&mut self) -> Result<u32> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(raw) => {
                let count = raw.parse::<u32>().map_err(|_| {
                    GrammarError::syntax(token.span, "a whole repetition count", raw.clone())
                })?;
                self.advance();
                Ok(count)
            }
            _ => Err(self.unexpected("a repetition count")),
        }
    }

    fn atom(&mut self) -> Result<RawExpr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Literal(text) => RawExprKind::Literal(text),
            TokenKind::Lookup(column) => RawExprKind::Lookup(column),
            TokenKind::Ident(name) | TokenKind::AngleName(name) => RawExprKind::Name(name),
            TokenKind::LParen => {
                self.advance();
                // `()` is the empty sequence and expands to nothing.
                if self.eat(&TokenKind::RParen) {
                    return Ok(RawExpr {
                        kind: RawExprKind::Sequence(Vec::new()),
                        span: token.span,
                    });
                }
                let inner = self.alternation()?;
                self.expect(&TokenKind::RParen, "')' to close group")?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("a literal, name, lookup or '('")),
        };
        self.advance();
        Ok(RawExpr {
            kind,
            span: token.span,
        })
    }
}
