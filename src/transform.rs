//! Text transforms applied to the result of an expansion.
//!
//! Transforms are attached explicitly in grammar source with a postfix
//! `.name`, either to a single atom (`noun.a`) or to a whole rule definition
//! (`title.cap = ...`). They always run on the finished text of their
//! operand, so the indefinite article is chosen by the real first letter.

use std::fmt;

/// A named post-processing step for expanded text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Uppercase the first letter
    Capitalize,
    /// Uppercase everything
    Uppercase,
    /// Lowercase everything
    Lowercase,
    /// Prefix with "a " or "an "
    IndefiniteArticle,
}

impl Transform {
    /// Resolve a transform from the name used in grammar source
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cap" | "capitalize" => Some(Transform::Capitalize),
            "upper" => Some(Transform::Uppercase),
            "lower" => Some(Transform::Lowercase),
            "a" | "an" | "article" => Some(Transform::IndefiniteArticle),
            _ => None,
        }
    }

    /// The canonical source name of this transform
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Capitalize => "cap",
            Transform::Uppercase => "upper",
            Transform::Lowercase => "lower",
            Transform::IndefiniteArticle => "a",
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Transform::Capitalize => capitalize(text),
            Transform::Uppercase => text.to_uppercase(),
            Transform::Lowercase => text.to_lowercase(),
            Transform::IndefiniteArticle => with_article(text),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.name())
    }
}

/// Apply a chain of transforms left to right
pub fn apply_all(transforms: &[Transform], text: String) -> String {
    transforms
        .iter()
        .fold(text, |acc, transform| transform.apply(&acc))
}

/// Uppercase the first alphabetic character, leaving any leading
/// punctuation or whitespace in place
fn capitalize(text: &str) -> String {
    match text.char_indices().find(|(_, c)| c.is_alphabetic()) {
        None => text.to_string(),
        Some((index, first)) => {
            let rest = &text[index + first.len_utf8()..];
            format!("{}{}{}", &text[..index], first.to_uppercase(), rest)
        }
    }
}

fn with_article(text: &str) -> String {
    // Empty text gets no article.
    let Some(first) = text.chars().next() else {
        return String::new();
    };

    let article = if matches!(first.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u') {
        "an"
    } else {
        "a"
    };
    format!("{} {}", article, text)
}
