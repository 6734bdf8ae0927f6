//! Hierarchical channel names.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A hierarchical channel path such as `/sensors/camera/left/`.
///
/// Paths are normalized: they always start and end with `/` when
/// printed, and every component is non-empty and made of ASCII
/// alphanumerics, `_` or `-`. Ordering is component-wise, so a
/// channel always sorts directly before its sub-channels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelPath {
    components: Vec<String>,
}

impl ChannelPath {
    /// The root channel `/`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self, SyncError> {
        let invalid = |reason| SyncError::InvalidChannel {
            path: path.to_string(),
            reason,
        };

        let Some(rest) = path.strip_prefix('/') else {
            return Err(invalid("path must start with '/'"));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let components = rest
            .split('/')
            .map(|component| {
                if component.is_empty() {
                    return Err(invalid("empty path component"));
                }
                let valid = component
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(invalid("illegal character in path component"));
                }
                Ok(component.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns true if `self` lies strictly below `other`.
    pub fn is_sub_channel_of(&self, other: &ChannelPath) -> bool {
        self.components.len() > other.components.len()
            && self.components.starts_with(&other.components)
    }

    /// Returns true if `other` lies strictly below `self`.
    pub fn is_super_channel_of(&self, other: &ChannelPath) -> bool {
        other.is_sub_channel_of(self)
    }

    /// Appends the components of `other` to this path.
    pub fn concat(&self, other: &ChannelPath) -> ChannelPath {
        let components = self
            .components
            .iter()
            .chain(other.components.iter())
            .cloned()
            .collect();
        Self { components }
    }
}

impl fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for component in &self.components {
            write!(f, "{component}/")?;
        }
        Ok(())
    }
}

impl FromStr for ChannelPath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelPath {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ChannelPath {
    type Error = SyncError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ChannelPath> for String {
    fn from(path: ChannelPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ChannelPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_normalizes_trailing_slash() {
        assert_eq!(path("/a/b"), path("/a/b/"));
        assert_eq!(path("/a/b").to_string(), "/a/b/");
        assert_eq!(path("/").to_string(), "/");
        assert!(path("/").is_root());
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(ChannelPath::parse("a/b").is_err());
        assert!(ChannelPath::parse("/a//b").is_err());
        assert!(ChannelPath::parse("/a b/").is_err());
        assert!(ChannelPath::parse("").is_err());
    }

    #[test]
    fn test_sub_channel_relation() {
        let parent = path("/sensors");
        let child = path("/sensors/camera");

        assert!(child.is_sub_channel_of(&parent));
        assert!(parent.is_super_channel_of(&child));
        assert!(!parent.is_sub_channel_of(&child));
        assert!(!parent.is_sub_channel_of(&parent));
        assert!(!path("/sensorsx/camera").is_sub_channel_of(&parent));
        assert!(child.is_sub_channel_of(&ChannelPath::root()));
    }

    #[test]
    fn test_ordering_groups_sub_channels() {
        let mut paths = vec![path("/b"), path("/a/z"), path("/a")];
        paths.sort();
        assert_eq!(paths, vec![path("/a"), path("/a/z"), path("/b")]);
    }

    #[test]
    fn test_concat() {
        assert_eq!(path("/a").concat(&path("/b/c")), path("/a/b/c"));
        assert_eq!(ChannelPath::root().concat(&path("/x")), path("/x"));
    }

    #[test]
    fn test_serde_as_string() {
        let parsed: ChannelPath = serde_yaml::from_str("/camera/left").unwrap();
        assert_eq!(parsed, path("/camera/left/"));
        assert!(serde_yaml::from_str::<ChannelPath>("camera").is_err());
    }
}
