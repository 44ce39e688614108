//! Absolute node paths.
//!
//! Paths look like `/sites/demo/home`. The root node has the path `/`. Ancestor paths are what
//! the index stores to answer "is a descendant of" filters.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::RepositoryError;

/// An absolute, normalized node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// The repository root, `/`.
    pub fn root() -> Self {
        Self(String::from("/"))
    }

    /// Parses a path. A single trailing slash is accepted and dropped.
    pub fn parse(path: &str) -> Result<Self, RepositoryError> {
        let invalid = |reason| RepositoryError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        let Some(rest) = path.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }
        if rest.split('/').any(str::is_empty) {
            return Err(invalid("empty segment"));
        }
        if rest.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        Ok(Self(format!("/{rest}")))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    /// Appends a segment. `name` must be non-empty and must not contain `/`.
    pub fn child(&self, name: &str) -> Result<Self, RepositoryError> {
        let reason = if name.is_empty() {
            Some("empty child segment")
        } else if name.contains('/') {
            Some("child segment contains '/'")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RepositoryError::InvalidPath {
                path: format!("{}/{name}", self.0.trim_end_matches('/')),
                reason,
            });
        }

        if self.is_root() {
            Self::parse(&format!("/{name}"))
        } else {
            Self::parse(&format!("{}/{name}", self.0))
        }
    }

    /// Returns all proper ancestors, nearest first, ending with the root.
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            out.push(path);
        }
        out
    }

    /// Returns true if `self` lies strictly below `other`.
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        if self == other {
            return false;
        }
        if other.is_root() {
            return true;
        }
        self.0
            .strip_prefix(other.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodePath {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = RepositoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_trailing_slash() {
        assert_eq!(p("/sites/demo/").as_str(), "/sites/demo");
        assert!(p("/").is_root());
        assert!(p("//").is_root());
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        assert!(NodePath::parse("sites/demo").is_err());
        assert!(NodePath::parse("/sites//demo").is_err());
        assert!(NodePath::parse("/sites/de mo").is_err());
        assert!(NodePath::parse("").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        let path = p("/sites/demo/home");
        assert_eq!(path.name(), "home");
        assert_eq!(path.parent(), Some(p("/sites/demo")));
        assert_eq!(p("/sites").parent(), Some(NodePath::root()));
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(NodePath::root().name(), "");
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let ancestors: Vec<String> = p("/a/b/c").ancestors().into_iter().map(String::from).collect();
        assert_eq!(ancestors, vec!["/a/b", "/a", "/"]);
        assert!(NodePath::root().ancestors().is_empty());
    }

    #[test]
    fn test_is_descendant_of() {
        assert!(p("/a/b").is_descendant_of(&p("/a")));
        assert!(p("/a/b").is_descendant_of(&NodePath::root()));
        assert!(!p("/a").is_descendant_of(&p("/a")));
        assert!(!p("/ab").is_descendant_of(&p("/a")));
    }

    #[test]
    fn test_child() {
        assert_eq!(NodePath::root().child("a").unwrap(), p("/a"));
        assert_eq!(p("/a").child("b").unwrap(), p("/a/b"));
        assert!(p("/a").child("").is_err());
        assert!(NodePath::root().child("").is_err());
        assert!(p("/a").child("b/c").is_err());
        assert!(p("/a").child("/b").is_err());
        assert!(matches!(
            p("/a").child(""),
            Err(RepositoryError::InvalidPath { .. })
        ));
    }
}
