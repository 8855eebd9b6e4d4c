//! Word tables consumed by `[Column]` lookups.
//!
//! A lexicon is a list of rows; each row maps column names (word classes
//! such as `Adjective` or `Agent`) to one word. Rows are the unit of repeat
//! avoidance: once any column of a row is used, the whole row is skipped for
//! the rest of that generation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grammar::Grammar;
use crate::utils::{GrammarError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lexicon {
    rows: Vec<BTreeMap<String, String>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon { rows: Vec::new() }
    }

    /// Add a row of `(column, word)` pairs
    pub fn add_row<I, K, V>(&mut self, row: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.rows.push(
            row.into_iter()
                .map(|(column, word)| (column.into(), word.into()))
                .collect(),
        );
        self
    }

    /// Load a lexicon from a JSON array of row objects
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(GrammarError::Io)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every column name that appears in at least one row
    pub fn columns(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(column))
    }

    /// Non-empty words of a column, in row order
    pub fn words<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column))
            .map(String::as_str)
            .filter(|word| !word.is_empty())
    }

    /// Check that every column the grammar looks up exists
    pub fn check(&self, grammar: &Grammar) -> Result<()> {
        match grammar
            .lookup_columns()
            .into_iter()
            .find(|column| !self.has_column(column))
        {
            Some(column) => Err(GrammarError::UnknownColumn {
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Draw one word from `column`, skipping and then recording rows in `used`
    pub(crate) fn pick<R: Rng + ?Sized>(
        &self,
        column: &str,
        rng: &mut R,
        mut used: Option<&mut HashSet<usize>>,
    ) -> Result<&str> {
        if !self.has_column(column) {
            return Err(GrammarError::UnknownColumn {
                column: column.to_string(),
            });
        }

        let candidates: Vec<(usize, &str)> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(index, _)| used.as_ref().is_none_or(|used| !used.contains(index)))
            .filter_map(|(index, row)| {
                row.get(column)
                    .filter(|word| !word.is_empty())
                    .map(|word| (index, word.as_str()))
            })
            .collect();

        if candidates.is_empty() {
            return Err(GrammarError::LexiconExhausted {
                column: column.to_string(),
            });
        }

        let (index, word) = candidates[rng.gen_range(0..candidates.len())];
        if let Some(used) = used.as_mut() {
            used.insert(index);
        }
        Ok(word)
    }
}
