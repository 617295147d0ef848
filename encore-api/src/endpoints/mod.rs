pub mod artists;
pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Window the catalog uses to compute a listener's favorites.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortTerm => f.write_str("short_term"),
            Self::MediumTerm => f.write_str("medium_term"),
            Self::LongTerm => f.write_str("long_term"),
        }
    }
}

/// Category id the events service files concerts under.
pub const CONCERTS_CATEGORY_ID: &str = "460";
