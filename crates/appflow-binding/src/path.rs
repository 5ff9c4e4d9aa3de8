//! Typed form data paths.
//!
//! A path such as `Group[0].Child[1].Field` is a sequence of segments, each
//! a field name with an optional array index. [`FieldPath`] is the single
//! parser and printer for this notation; nothing else in the workspace
//! splits binding strings by hand.

use std::fmt;
use std::str::FromStr;

use crate::error::{BindingError, Result};

/// One `field` or `field[index]` step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub field: String,
    pub index: Option<usize>,
}

impl Segment {
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            index: None,
        }
    }

    pub fn indexed(field: impl Into<String>, index: usize) -> Self {
        Self {
            field: field.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.field, index),
            None => f.write_str(&self.field),
        }
    }
}

/// A parsed form data key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse dot/bracket notation.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(BindingError::invalid(path, "empty path"));
        }
        path.split('.')
            .map(|part| parse_segment(path, part))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
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

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// New path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// The same path with every array index removed.
    #[must_use]
    pub fn without_indices(&self) -> Self {
        Self::new(
            self.segments
                .iter()
                .map(|segment| Segment::field(segment.field.clone()))
                .collect(),
        )
    }

    /// Row of the repeating group at `group` this path belongs to.
    ///
    /// `group` is the (possibly partially indexed) array path of a group,
    /// e.g. `Outer[1].Inner`. The path belongs to row `n` when it starts
    /// with `Outer[1].Inner[n]`.
    pub fn row_in(&self, group: &FieldPath) -> Option<usize> {
        let depth = group.len();
        if depth == 0 || self.len() < depth {
            return None;
        }
        let last = depth - 1;
        if self.segments[..last] != group.segments[..last] {
            return None;
        }
        let own = &self.segments[last];
        let grp = &group.segments[last];
        if own.field != grp.field || grp.index.is_some() {
            return None;
        }
        own.index
    }

    /// Copy of this path with the index at segment `position` replaced.
    #[must_use]
    pub fn with_index_at(&self, position: usize, index: usize) -> Self {
        let mut path = self.clone();
        if let Some(segment) = path.segments.get_mut(position) {
            segment.index = Some(index);
        }
        path
    }

    /// Whether `self` starts with all segments of `prefix`.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_segment(path: &str, part: &str) -> Result<Segment> {
    let Some(open) = part.find('[') else {
        if part.is_empty() {
            return Err(BindingError::invalid(path, "empty segment"));
        }
        if part.contains(']') {
            return Err(BindingError::invalid(path, "unbalanced ']'"));
        }
        return Ok(Segment::field(part));
    };

    let field = &part[..open];
    if field.is_empty() {
        return Err(BindingError::invalid(path, "index without field name"));
    }
    let rest = &part[open + 1..];
    let Some(digits) = rest.strip_suffix(']') else {
        return Err(BindingError::invalid(path, "missing ']'"));
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BindingError::invalid(path, "index is not a number"));
    }
    let index = digits
        .parse::<usize>()
        .map_err(|_| BindingError::invalid(path, "index out of range"))?;
    Ok(Segment::indexed(field, index))
}

/// Remove every `[n]` from a binding, giving its schema-relative path.
///
/// Works on any string, including ones that do not parse as a
/// [`FieldPath`].
pub fn strip_indices(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.char_indices();
    while let Some((start, ch)) = chars.next() {
        if ch == '[' {
            let tail = &path[start + 1..];
            if let Some(close) = tail.find(']') {
                let digits = &tail[..close];
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    for _ in 0..=close {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        result.push(ch);
    }
    result
}

/// Row indices of a binding, outermost first.
///
/// `Group[1].Child[3].Field` gives `[1, 3]`. Used to build row-suffixed
/// component ids such as `field-1-3`.
pub fn indices_of(path: &str) -> Vec<usize> {
    FieldPath::parse(path)
        .map(|parsed| {
            parsed
                .segments()
                .iter()
                .filter_map(|segment| segment.index)
                .collect()
        })
        .unwrap_or_default()
}
