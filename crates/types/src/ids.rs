//! Newtype wrappers for resource keys and measurable region keys
//!
//! Resource keys are normalized URLs; region keys name the sub-regions of a
//! section whose pixel height the host surface can report.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// The normalized URL of an image resource, used as the cache key.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Arc<str>);

impl ResourceKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `data:` and `blob:` keys carry or reference their bytes locally.
    pub fn is_local(&self) -> bool {
        self.0.starts_with("data:") || self.0.starts_with("blob:")
    }
}

impl From<String> for ResourceKey {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // data: URLs can be megabytes long
        match self.0.char_indices().nth(48) {
            Some((cut, _)) if self.0.starts_with("data:") => write!(f, "{}…", &self.0[..cut]),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Identifies one measurable sub-region of a rendered section.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum RegionKey {
    Title { section: usize },
    Paragraph { section: usize, index: usize },
    Cell { section: usize, row: usize, col: usize },
    /// Height of a whole grid, typically supplied out of band by the surface.
    Grid { section: usize },
    Custom(Arc<str>),
}

impl RegionKey {
    pub fn section(&self) -> Option<usize> {
        match self {
            RegionKey::Title { section }
            | RegionKey::Paragraph { section, .. }
            | RegionKey::Cell { section, .. }
            | RegionKey::Grid { section } => Some(*section),
            RegionKey::Custom(_) => None,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Title { section } => write!(f, "s{section}/title"),
            RegionKey::Paragraph { section, index } => write!(f, "s{section}/p{index}"),
            RegionKey::Cell { section, row, col } => write!(f, "s{section}/r{row}c{col}"),
            RegionKey::Grid { section } => write!(f, "s{section}/grid"),
            RegionKey::Custom(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_resource_key_creation() {
        let k1 = ResourceKey::new("https://cdn.example.com/a.png");
        let k2 = ResourceKey::from("https://cdn.example.com/a.png");
        let k3 = ResourceKey::from(String::from("https://cdn.example.com/a.png"));

        assert_eq!(k1, k2);
        assert_eq!(k2, k3);
        assert!(!k1.is_local());
    }

    #[test]
    fn test_local_keys() {
        assert!(ResourceKey::from("data:image/png;base64,AAAA").is_local());
        assert!(ResourceKey::from("blob:session/1").is_local());
    }

    #[test]
    fn test_long_data_url_display_is_truncated() {
        let url = format!("data:image/png;base64,{}", "A".repeat(200));
        let shown = ResourceKey::from(url).to_string();
        assert!(shown.chars().count() <= 49);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn test_region_key_display_and_section() {
        let cell = RegionKey::Cell {
            section: 2,
            row: 1,
            col: 3,
        };
        assert_eq!(cell.to_string(), "s2/r1c3");
        assert_eq!(cell.section(), Some(2));
        assert_eq!(RegionKey::Custom("banner".into()).section(), None);
    }

    #[test]
    fn test_region_key_hash_map_usage() {
        let mut heights = HashMap::new();
        heights.insert(RegionKey::Title { section: 0 }, 32.0);
        heights.insert(RegionKey::Paragraph { section: 0, index: 0 }, 64.0);

        assert_eq!(heights.get(&RegionKey::Title { section: 0 }), Some(&32.0));
        assert_eq!(heights.get(&RegionKey::Title { section: 1 }), None);
    }
}
