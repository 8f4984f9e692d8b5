//! Dotted field paths
//!
//! Provides [`FieldPath`] for addressing fields inside nested configs, the
//! way a script loader names them.
//!
//! # Examples
//! - `threshold` → field `threshold` of the root config
//! - `inner.f` → field `f` of the `inner` sub-config
//! - `values[2]` → element 2 of the list field `values`
//! - `algorithm[gauss].sigma` → field `sigma` of the `gauss` choice sub-config
//! - `algorithm.name` → selection of the `algorithm` choice field
//! - `gains["g-1"]` → item `g-1` of the dict field `gains`

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Subscript of a path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// List position
    Index(usize),
    /// Choice name or dict key
    Name(String),
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Name(name) => write!(f, "[{name}]"),
        }
    }
}

/// One segment: a field name with an optional subscript
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    name: String,
    key: Option<Key>,
}

impl Segment {
    /// Create a plain segment
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    /// Create a subscripted segment
    #[inline]
    #[must_use]
    pub fn keyed(name: impl Into<String>, key: Key) -> Self {
        Self {
            name: name.into(),
            key: Some(key),
        }
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscript, if any
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(key) = &self.key {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Path from a config to one of its (possibly nested) fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Create from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Path with a single plain segment
    #[inline]
    #[must_use]
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![Segment::new(name)])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment and the remaining path
    #[must_use]
    pub fn split_first(&self) -> Option<(&Segment, FieldPath)> {
        self.0
            .split_first()
            .map(|(first, rest)| (first, Self(rest.to_vec())))
    }

    /// Last segment (if not empty)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Check a field name for dotted-path compatibility
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn parse_segment(raw: &str) -> Result<Segment, PathError> {
    let (name, rest) = match raw.find('[') {
        Some(open) => (&raw[..open], Some(&raw[open..])),
        None => (raw, None),
    };
    if name.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if !is_valid_name(name) {
        return Err(PathError::InvalidSegment(raw.to_string()));
    }
    let Some(rest) = rest else {
        return Ok(Segment::new(name));
    };

    let inner = rest
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| PathError::UnterminatedKey(raw.to_string()))?;
    let inner = inner.trim();
    let key = if let Ok(index) = inner.parse::<usize>() {
        Key::Index(index)
    } else {
        let unquoted = inner
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
            .unwrap_or(inner);
        if unquoted.is_empty() || unquoted.contains(['[', ']']) {
            return Err(PathError::InvalidKey(raw.to_string()));
        }
        Key::Name(unquoted.to_string())
    };
    Ok(Segment::keyed(name, key))
}

/// Split on dots that are not inside brackets
fn split_segments(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = split_segments(s)
            .into_iter()
            .map(parse_segment)
            .collect::<Result<_, _>>()?;
        Ok(Self(segments))
    }
}

/// Errors related to field paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("empty path segment")]
    EmptySegment,

    #[error("invalid path segment: {0}")]
    InvalidSegment(String),

    #[error("unterminated subscript in segment: {0}")]
    UnterminatedKey(String),

    #[error("invalid subscript in segment: {0}")]
    InvalidKey(String),
}
