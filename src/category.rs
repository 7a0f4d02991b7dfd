use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prize class of a draw result. Each class has a fixed value length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Two,
    ThreeFirst,
    ThreeLast,
    NearFirst,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown category '{0}' (expected one of FIRST, SECOND, THIRD, FOURTH, FIFTH, TWO, THREE_FIRST, THREE_LAST, NEAR_FIRST)")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 9] = [
        Category::First,
        Category::Second,
        Category::Third,
        Category::Fourth,
        Category::Fifth,
        Category::Two,
        Category::ThreeFirst,
        Category::ThreeLast,
        Category::NearFirst,
    ];

    /// Tag as it appears at the start of a line in a draw file.
    pub fn tag(self) -> &'static str {
        match self {
            Category::First => "FIRST",
            Category::Second => "SECOND",
            Category::Third => "THIRD",
            Category::Fourth => "FOURTH",
            Category::Fifth => "FIFTH",
            Category::Two => "TWO",
            Category::ThreeFirst => "THREE_FIRST",
            Category::ThreeLast => "THREE_LAST",
            Category::NearFirst => "NEAR_FIRST",
        }
    }

    pub fn value_len(self) -> usize {
        match self {
            Category::Two => 2,
            Category::ThreeFirst | Category::ThreeLast => 3,
            _ => 6,
        }
    }

    /// Exact, case-sensitive lookup used by the parser.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::from_tag(&normalized).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
