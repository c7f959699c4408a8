//! Tag list value type and its delimited text form.
//!
//! A [`TagList`] behaves as a set of trimmed tag names while remembering the
//! order in which names were first added, so that its text form is stable.
//!
//! Text form: tokens separated by `,`; surrounding whitespace is trimmed and
//! empty tokens are dropped. A token may be wrapped in `"` or `'` so that it
//! can contain the delimiter, e.g. `"Very good", nature`. Inside a quoted
//! token the quote character is written twice: `"say ""hi"", then"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Tag delimiter in the text form.
pub const DELIMITER: char = ',';

const QUOTES: [char; 2] = ['"', '\''];

/// Ordered, duplicate-free list of tag names.
#[derive(Clone, Default)]
pub struct TagList(Vec<String>);

impl TagList {
    /// Create an empty tag list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse the delimited text form. Never fails; empty input gives an empty list.
    pub fn parse(text: &str) -> Self {
        let mut list = Self::new();
        for token in split_tokens(text) {
            list.add(token);
        }
        list
    }

    /// Add a name. Returns false if it was blank or already present.
    pub fn add(&mut self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref().trim();
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.0.push(name.to_string());
        true
    }

    /// Remove a name. Returns false if it was not present.
    pub fn remove(&mut self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref().trim();
        let before = self.0.len();
        self.0.retain(|existing| existing != name);
        self.0.len() != before
    }

    /// Check membership by trimmed name.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref().trim();
        self.0.iter().any(|existing| existing == name)
    }

    /// Names in `self` that are not in `other`, in `self`'s order.
    pub fn difference(&self, other: &TagList) -> TagList {
        Self(
            self.0
                .iter()
                .filter(|name| !other.contains(name.as_str()))
                .cloned()
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// Split text into raw tokens, honouring quoted segments.
fn split_tokens(text: &str) -> Vec<Cow<'_, str>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        let segment = rest.trim_start();
        let quoted = segment
            .chars()
            .next()
            .filter(|first| QUOTES.contains(first))
            .and_then(|quote| quoted_token(&segment[quote.len_utf8()..], quote));
        let (token, remainder) = match quoted {
            Some((name, after)) => {
                let remainder = if after.is_empty() {
                    None
                } else {
                    Some(&after[DELIMITER.len_utf8()..])
                };
                (Cow::Owned(name), remainder)
            }
            None => {
                let (token, remainder) = split_unquoted(segment);
                (Cow::Borrowed(token), remainder)
            }
        };
        tokens.push(token);
        match remainder {
            Some(next) => rest = next,
            None => break,
        }
    }
    tokens
}

fn split_unquoted(segment: &str) -> (&str, Option<&str>) {
    match segment.find(DELIMITER) {
        Some(pos) => (&segment[..pos], Some(&segment[pos + DELIMITER.len_utf8()..])),
        None => (segment, None),
    }
}

/// Read a quoted token body. A doubled quote stands for one literal quote;
/// the token closes at a single quote followed only by whitespace and then
/// the delimiter or the end of input. Returns the unescaped name and the
/// text after the closing quote, or `None` if the quote is never closed.
fn quoted_token(body: &str, quote: char) -> Option<(String, &str)> {
    let mut name = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if c != quote {
            name.push(c);
            continue;
        }
        if chars.next_if(|&(_, next)| next == quote).is_some() {
            name.push(quote);
            continue;
        }
        let after = body[pos + quote.len_utf8()..].trim_start();
        if after.is_empty() || after.starts_with(DELIMITER) {
            return Some((name, after));
        }
        name.push(c);
    }
    None
}

fn needs_quotes(name: &str) -> bool {
    name.contains(DELIMITER) || name.starts_with(QUOTES)
}

/// Prefer a quote the name does not contain, so nothing needs escaping.
fn quote_for(name: &str) -> char {
    QUOTES
        .into_iter()
        .find(|quote| !name.contains(*quote))
        .unwrap_or(QUOTES[0])
}

impl fmt::Display for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{DELIMITER} ")?;
            }
            if needs_quotes(name) {
                let quote = quote_for(name);
                let escaped = name.replace(quote, &format!("{quote}{quote}"));
                write!(f, "{quote}{escaped}{quote}")?;
            } else {
                f.write_str(name)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagList({:?})", self.0)
    }
}

/// Set equality: order is ignored.
impl PartialEq for TagList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|name| other.contains(name.as_str()))
    }
}

impl Eq for TagList {}

impl FromStr for TagList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for TagList {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<S: AsRef<str>> Extend<S> for TagList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.add(name);
        }
    }
}

impl IntoIterator for TagList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for TagList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
