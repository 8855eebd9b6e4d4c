//! Tokenizer for the rule metalanguage.

use crate::utils::{GrammarError, Result, Span};

/// Token kinds of the metalanguage
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare rule name, or a transform name after `.`
    Ident(String),
    /// A rule name written as `<...>`
    AngleName(String),
    /// A quoted literal, escapes already resolved
    Literal(String),
    /// A lexicon lookup written as `[...]`
    Lookup(String),
    /// An unsigned decimal number, kept as written
    Number(String),

    Equals,    // =
    Pipe,      // |
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Dot,       // .
    Question,  // ?
    Star,      // *
    Plus,      // +
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }

    Eof,
}

impl TokenKind {
    /// How the token is shown in diagnostics
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("name '{}'", name),
            TokenKind::AngleName(name) => format!("name <{}>", name),
            TokenKind::Literal(text) => format!("literal {:?}", text),
            TokenKind::Lookup(column) => format!("lookup [{}]", column),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Question => "'?'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let span = self.span();

        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span,
            });
        };

        let kind = match c {
            '=' => TokenKind::Equals,
            '|' => TokenKind::Pipe,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '*' => TokenKind::Star,
            '+' => TokenKind::Plus,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '"' | '\'' => TokenKind::Literal(self.delimited(c, span, true)?),
            '<' => TokenKind::AngleName(self.delimited('>', span, false)?),
            '[' => TokenKind::Lookup(self.delimited(']', span, false)?),
            c if c.is_ascii_digit() => TokenKind::Number(self.number(c)),
            c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.ident(c)),
            other => {
                return Err(GrammarError::syntax(
                    span,
                    "a rule or expression",
                    format!("{:?}", other),
                ));
            }
        };

        Ok(Token { kind, span })
    }

    /// Read up to the closing delimiter, resolving backslash escapes
    fn delimited(&mut self, close: char, start: Span, is_literal: bool) -> Result<String> {
        let mut content = String::new();
        loop {
            let here = self.span();
            match self.bump() {
                None => {
                    return Err(GrammarError::syntax(
                        here,
                        format!("closing {:?} for token opened at {}", close, start),
                        "end of input",
                    ));
                }
                Some('\n') => {
                    return Err(GrammarError::syntax(
                        here,
                        format!("closing {:?} for token opened at {}", close, start),
                        "end of line",
                    ));
                }
                Some('\\') => match self.bump() {
                    Some('n') if is_literal => content.push('\n'),
                    Some('t') if is_literal => content.push('\t'),
                    Some('\n') | None => {
                        return Err(GrammarError::syntax(
                            self.span(),
                            "an escaped character",
                            "end of line",
                        ));
                    }
                    Some(escaped) => content.push(escaped),
                },
                Some(c) if c == close => return Ok(content),
                Some(c) => content.push(c),
            }
        }
    }

    fn number(&mut self, first: char) -> String {
        let mut number = String::from(first);
        self.take_digits(&mut number);

        // A fractional part needs a digit after the dot, otherwise the dot
        // belongs to the next token.
        let mut lookahead = self.chars.clone();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            number.push('.');
            self.take_digits(&mut number);
        }
        number
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            out.push(c);
            self.bump();
        }
    }

    fn ident(&mut self, first: char) -> String {
        let mut ident = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '-') {
                break;
            }
            ident.push(c);
            self.bump();
        }
        ident
    }
}
