//! Path expressions addressing nodes of the fixture tree.
//!
//! `orders[*].items[0].sku` parses into three segments; each segment carries
//! its bracketed index groups in order, so `matrix[0][1]` keeps both indices.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::domain::error::{DomainError, DomainResult};

/// Segment name addressing the root node.
pub const ROOT_NAME: &str = "$";

/// Textual token for the wildcard index.
pub const ALL_INDEX_TOKEN: &str = "*";

/// One bracketed index of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    At(usize),
    All,
}

impl Index {
    /// Ordering key; the wildcard sorts above every concrete index.
    fn sort_key(self) -> (u8, usize) {
        match self {
            Index::At(i) => (0, i),
            Index::All => (1, 0),
        }
    }

    /// Wildcard-insensitive equality: `All` matches any index.
    pub fn matches(self, other: Index) -> bool {
        match (self, other) {
            (Index::All, _) | (_, Index::All) => true,
            (Index::At(a), Index::At(b)) => a == b,
        }
    }

    pub fn is_all(self) -> bool {
        matches!(self, Index::All)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::At(i) => write!(f, "{i}"),
            Index::All => f.write_str(ALL_INDEX_TOKEN),
        }
    }
}

/// A field name plus zero or more index groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    name: String,
    indices: Vec<Index>,
}

impl Segment {
    pub fn new(name: impl Into<String>, indices: Vec<Index>) -> Self {
        Self {
            name: name.into(),
            indices,
        }
    }

    fn parse(raw: &str, expression: &str) -> DomainResult<Self> {
        let (name, mut rest) = match raw.find(|c: char| c == '[' || c == ']') {
            Some(pos) => (&raw[..pos], &raw[pos..]),
            None => (raw, ""),
        };
        if name.is_empty() {
            return Err(DomainError::syntax(expression, "empty segment name"));
        }

        let mut indices = Vec::new();
        while !rest.is_empty() {
            let Some(body) = rest.strip_prefix('[') else {
                return Err(DomainError::syntax(
                    expression,
                    format!("unexpected '{rest}' after index in segment '{raw}'"),
                ));
            };
            let Some(close) = body.find(']') else {
                return Err(DomainError::syntax(
                    expression,
                    format!("unmatched '[' in segment '{raw}'"),
                ));
            };
            let token = &body[..close];
            if token.contains('[') {
                return Err(DomainError::syntax(
                    expression,
                    format!("nested '[' in segment '{raw}'"),
                ));
            }
            indices.push(parse_index(token, expression)?);
            rest = &body[close + 1..];
        }

        Ok(Self::new(name, indices))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn has_all_index(&self) -> bool {
        self.indices.iter().any(|i| i.is_all())
    }

    /// Same name and index count, every index wildcard-compatible.
    pub fn matches_ignoring_all(&self, other: &Segment) -> bool {
        self.name == other.name
            && self.indices.len() == other.indices.len()
            && self
                .indices
                .iter()
                .zip(&other.indices)
                .all(|(a, b)| a.matches(*b))
    }
}

fn parse_index(token: &str, expression: &str) -> DomainResult<Index> {
    if token == ALL_INDEX_TOKEN {
        return Ok(Index::All);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::syntax(
            expression,
            format!("invalid index '[{token}]'"),
        ));
    }
    token
        .parse::<usize>()
        .map(Index::At)
        .map_err(|e| DomainError::syntax(expression, format!("invalid index '[{token}]': {e}")))
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for index in &self.indices {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.name != other.name {
            return self.name.cmp(&other.name);
        }
        for (mine, theirs) in self.indices.iter().zip(&other.indices) {
            // higher index first, the wildcard before every concrete index
            let ord = theirs.sort_key().cmp(&mine.sort_key());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        other.indices.len().cmp(&self.indices.len())
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Immutable, parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

impl PathExpression {
    /// Parse a dotted, bracketed expression.
    pub fn from(expression: &str) -> DomainResult<Self> {
        if expression.is_empty() {
            return Err(DomainError::syntax(expression, "empty expression"));
        }
        let segments = expression
            .split('.')
            .map(|raw| Segment::parse(raw, expression))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Expression addressing the root node.
    pub fn root() -> Self {
        Self {
            segments: vec![Segment::new(ROOT_NAME, Vec::new())],
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        Self { segments }
    }

    /// `prefix.self`, reparsed so the prefix is validated like fresh input.
    pub fn append_left(&self, expression: &str) -> DomainResult<Self> {
        Self::from(&format!("{expression}.{self}"))
    }

    /// `self.suffix`, reparsed so the suffix is validated like fresh input.
    pub fn append_right(&self, expression: &str) -> DomainResult<Self> {
        Self::from(&format!("{self}.{expression}"))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Last segment, the one naming the addressed field.
    pub fn field_segment(&self) -> &Segment {
        // never empty: constructors reject or replace empty segment lists
        &self.segments[self.segments.len() - 1]
    }

    /// Checks segment names only, indices are ignored.
    pub fn has_field(&self, name: &str) -> bool {
        self.segments.iter().any(|s| s.name == name)
    }

    /// Compares the last segment, indices included, against `field`.
    pub fn is_field_name(&self, field: &str) -> bool {
        Segment::parse(field, field)
            .map(|s| &s == self.field_segment())
            .unwrap_or(false)
    }

    /// True for `$`.
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
            && self.segments[0].name == ROOT_NAME
            && self.segments[0].indices.is_empty()
    }

    /// Segments below the root: a leading bare `$` is dropped.
    pub fn relative_segments(&self) -> &[Segment] {
        match self.segments.first() {
            Some(first) if first.name == ROOT_NAME && first.indices.is_empty() => {
                &self.segments[1..]
            }
            _ => &self.segments,
        }
    }

    /// Tree levels below the root the expression descends: one per field and per index.
    pub fn step_count(&self) -> usize {
        self.relative_segments()
            .iter()
            .map(|s| s.indices.len() + usize::from(s.name != ROOT_NAME))
            .sum()
    }

    /// Serializes the first `size` segments; all of them when `size` exceeds the length.
    pub fn to_string_prefix(&self, size: usize) -> String {
        self.segments.iter().take(size).join(".")
    }

    /// Wildcard-insensitive equality over the whole expression.
    pub fn matches(&self, other: &PathExpression) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.matches_ignoring_all(b))
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().join("."))
    }
}

impl FromStr for PathExpression {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathExpression::from(s)
    }
}

impl TryFrom<&str> for PathExpression {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        PathExpression::from(value)
    }
}

impl Ord for PathExpression {
    fn cmp(&self, other: &Self) -> Ordering {
        for (mine, theirs) in self.segments.iter().zip(&other.segments) {
            let ord = mine.cmp(theirs);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // longer expressions first
        other.segments.len().cmp(&self.segments.len())
    }
}

impl PartialOrd for PathExpression {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
