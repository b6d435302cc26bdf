//! Product categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Catalog category.
///
/// The display name doubles as the wire and storage name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Electronics,
    Fashion,
    #[serde(rename = "Home & Kitchen")]
    HomeKitchen,
    #[serde(rename = "Toys & Games")]
    ToysGames,
    #[serde(rename = "Sports & Outdoors")]
    SportsOutdoors,
    #[serde(rename = "Video Games")]
    VideoGames,
    Books,
    Beauty,
}

impl Category {
    /// Every category, in menu order.
    pub const ALL: [Self; 8] = [
        Self::Electronics,
        Self::Fashion,
        Self::HomeKitchen,
        Self::ToysGames,
        Self::SportsOutdoors,
        Self::VideoGames,
        Self::Books,
        Self::Beauty,
    ];

    /// Display and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Electronics => "Electronics",
            Self::Fashion => "Fashion",
            Self::HomeKitchen => "Home & Kitchen",
            Self::ToysGames => "Toys & Games",
            Self::SportsOutdoors => "Sports & Outdoors",
            Self::VideoGames => "Video Games",
            Self::Books => "Books",
            Self::Beauty => "Beauty",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("category", s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_names() {
        assert_eq!(
            "Home & Kitchen".parse::<Category>().unwrap(),
            Category::HomeKitchen
        );
        assert_eq!("Books".parse::<Category>().unwrap(), Category::Books);
    }

    #[test]
    fn test_parse_is_exact() {
        assert!("books".parse::<Category>().is_err());
        assert!("Garden".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_uses_display_name() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }
}
