//! Slash-separated store paths (`contests/c1/entries/e1`).

use std::fmt;

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// A non-empty path into the mirror tree.
///
/// Every segment is non-empty and free of `/`, so `Display` followed by
/// [`StorePath::parse`] always yields the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// Parse `a/b/c`. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(raw, "path must have at least one segment"));
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(invalid(raw, "empty segment"));
            }
            segments.push(segment.to_string());
        }
        Ok(StorePath(segments))
    }

    /// A single-segment path such as `contests`.
    pub fn root(segment: impl Into<String>) -> StorageResult<Self> {
        let segment = segment.into();
        validate_segment(&segment)?;
        Ok(StorePath(vec![segment]))
    }

    /// Extend this path by one segment.
    pub fn child(&self, segment: impl Into<String>) -> StorageResult<Self> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.0.clone();
        segments.push(segment);
        Ok(StorePath(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final segment (the child key under the parent).
    pub fn key(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Parent path, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<StorePath> {
        if self.0.len() < 2 {
            return None;
        }
        Some(StorePath(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The first `len` segments of this path.
    pub fn prefix(&self, len: usize) -> Option<StorePath> {
        if len == 0 || len > self.0.len() {
            return None;
        }
        Some(StorePath(self.0[..len].to_vec()))
    }

    /// True when `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &StorePath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty() {
        return Err(invalid(segment, "empty segment"));
    }
    if segment.contains('/') {
        return Err(invalid(segment, "segment contains '/'"));
    }
    Ok(())
}

fn invalid(path: &str, reason: &str) -> StorageError {
    StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_agree() {
        let path = StorePath::parse("/contests/c1/entries/").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "contests/c1/entries");
        assert_eq!(StorePath::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(StorePath::parse("").is_err());
        assert!(StorePath::parse("contests//c1").is_err());
    }

    #[test]
    fn child_rejects_slash() {
        let root = StorePath::root("contests").unwrap();
        let err = root.child("a/b").unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }));
    }

    #[test]
    fn parent_prefix_and_key() {
        let path = StorePath::parse("contests/c1/entries/e1").unwrap();
        assert_eq!(path.key(), "e1");
        assert_eq!(path.parent().unwrap().to_string(), "contests/c1/entries");
        assert_eq!(path.prefix(2).unwrap().to_string(), "contests/c1");
        assert!(path.prefix(0).is_none());
        assert!(path.starts_with(&StorePath::parse("contests/c1").unwrap()));
        assert!(!path.starts_with(&StorePath::parse("contests/c2").unwrap()));
        assert!(StorePath::root("contests").unwrap().parent().is_none());
    }
}
