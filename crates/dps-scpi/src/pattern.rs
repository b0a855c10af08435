//! Compiled SCPI command patterns.
//!
//! A pattern such as `MEASure:VOLTage[:DC]?` is a list of keywords. Each
//! keyword's uppercase prefix is its short form (`MEAS`), the whole word
//! its long form (`MEASURE`); either is accepted case-insensitively.
//! Bracketed keywords may be omitted and a trailing `?` marks a query.

use std::fmt;

use thiserror::Error;

/// Errors compiling a pattern string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Empty pattern")]
    Empty,

    #[error("Empty keyword in pattern {0}")]
    EmptyKeyword(String),

    #[error("Unclosed '[' in pattern {0}")]
    UnclosedOptional(String),

    #[error("Optional group in pattern {0} must hold exactly one keyword")]
    CompoundOptional(String),

    #[error("Invalid character {character:?} in pattern {pattern}")]
    InvalidCharacter { pattern: String, character: char },

    #[error("Keyword {keyword} in pattern {pattern} has no short form")]
    NoShortForm { pattern: String, keyword: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Keyword {
    short: String,
    long: String,
    optional: bool,
}

impl Keyword {
    fn parse(pattern: &str, name: &str, optional: bool) -> Result<Self, PatternError> {
        if name.is_empty() {
            return Err(PatternError::EmptyKeyword(pattern.to_string()));
        }

        if let Some(character) = name
            .chars()
            .enumerate()
            .find(|&(i, c)| !(c.is_ascii_alphanumeric() || c == '_' || (c == '*' && i == 0)))
            .map(|(_, c)| c)
        {
            return Err(PatternError::InvalidCharacter {
                pattern: pattern.to_string(),
                character,
            });
        }

        let short: String = name
            .chars()
            .take_while(|c| !c.is_ascii_lowercase())
            .collect();
        if short.is_empty() || short == "*" {
            return Err(PatternError::NoShortForm {
                pattern: pattern.to_string(),
                keyword: name.to_string(),
            });
        }

        Ok(Self {
            short,
            long: name.to_ascii_uppercase(),
            optional,
        })
    }

    fn accepts(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.short) || token.eq_ignore_ascii_case(&self.long)
    }

    fn shares_form_with(&self, other: &Keyword) -> bool {
        [&self.short, &self.long]
            .iter()
            .any(|form| other.accepts(form))
    }
}

/// A compiled command pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    keywords: Vec<Keyword>,
    query: bool,
}

impl Pattern {
    /// Compiles a pattern string.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let (body, query) = match source.strip_suffix('?') {
            Some(body) => (body, true),
            None => (source, false),
        };
        if body.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut keywords = Vec::new();
        let mut rest = body;
        while !rest.is_empty() {
            if let Some(group) = rest.strip_prefix('[') {
                let end = group
                    .find(']')
                    .ok_or_else(|| PatternError::UnclosedOptional(source.to_string()))?;
                let (inner, after) = group.split_at(end);
                let name = inner.trim_matches(':');
                if name.contains(':') {
                    return Err(PatternError::CompoundOptional(source.to_string()));
                }
                keywords.push(Keyword::parse(source, name, true)?);
                rest = after.strip_prefix(']').unwrap_or(after);
            } else {
                let trimmed = rest.strip_prefix(':').unwrap_or(rest);
                let end = trimmed
                    .find(|c: char| c == ':' || c == '[')
                    .unwrap_or(trimmed.len());
                let (name, after) = trimmed.split_at(end);
                keywords.push(Keyword::parse(source, name, false)?);
                rest = after;
            }
        }

        Ok(Self {
            source: source.to_string(),
            keywords,
            query,
        })
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if this pattern is a query.
    pub fn is_query(&self) -> bool {
        self.query
    }

    /// Returns true if `header` (a program header without parameters)
    /// selects this pattern.
    pub fn matches(&self, header: &str) -> bool {
        let header = header.strip_prefix(':').unwrap_or(header);
        let (body, query) = match header.strip_suffix('?') {
            Some(body) => (body, true),
            None => (header, false),
        };
        if query != self.query || body.is_empty() {
            return false;
        }

        let tokens: Vec<&str> = body.split(':').collect();
        match_keywords(&self.keywords, &tokens)
    }

    /// Returns true if some input header would match both patterns.
    pub fn overlaps(&self, other: &Pattern) -> bool {
        if self.query != other.query {
            return false;
        }

        let ours = expansions(&self.keywords);
        let theirs = expansions(&other.keywords);
        ours.iter().any(|a| {
            theirs.iter().any(|b| {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.shares_form_with(y))
            })
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn match_keywords(keywords: &[Keyword], tokens: &[&str]) -> bool {
    let Some((keyword, remaining)) = keywords.split_first() else {
        return tokens.is_empty();
    };

    if let Some((token, rest)) = tokens.split_first() {
        if keyword.accepts(token) && match_keywords(remaining, rest) {
            return true;
        }
    }

    keyword.optional && match_keywords(remaining, tokens)
}

/// Every keyword sequence the pattern admits, with optional keywords
/// either present or absent.
fn expansions(keywords: &[Keyword]) -> Vec<Vec<&Keyword>> {
    let mut result: Vec<Vec<&Keyword>> = vec![Vec::new()];
    for keyword in keywords {
        let mut next = Vec::with_capacity(result.len() * 2);
        for prefix in &result {
            let mut with = prefix.clone();
            with.push(keyword);
            next.push(with);
            if keyword.optional {
                next.push(prefix.clone());
            }
        }
        result = next;
    }
    result
}
