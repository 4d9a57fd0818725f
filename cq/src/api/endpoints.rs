//! Endpoint builders for the catalog API
//!
//! Endpoints are path + query strings relative to the configured base URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default page size for title search
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Curated titles shown as recommendations on the home view
pub const RECOMMENDED_IDS: [u32; 20] = [
    21, 1535, 22319, 20, 40748, 31240, 30831, 40052, 34572, 39551, 24833, 37999, 33255, 23755, 28171, 19815, 14719,
    36035, 49596, 11757,
];

/// Sub-resources of a single title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimeSection {
    Full,
    Episodes,
    Videos,
    Characters,
    Staff,
    Statistics,
    MoreInfo,
    Reviews,
    Streaming,
    Pictures,
    Voices,
}

impl AnimeSection {
    pub const ALL: [AnimeSection; 11] = [
        AnimeSection::Full,
        AnimeSection::Episodes,
        AnimeSection::Videos,
        AnimeSection::Characters,
        AnimeSection::Staff,
        AnimeSection::Statistics,
        AnimeSection::MoreInfo,
        AnimeSection::Reviews,
        AnimeSection::Streaming,
        AnimeSection::Pictures,
        AnimeSection::Voices,
    ];

    /// Path segment for this section
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimeSection::Full => "full",
            AnimeSection::Episodes => "episodes",
            AnimeSection::Videos => "videos",
            AnimeSection::Characters => "characters",
            AnimeSection::Staff => "staff",
            AnimeSection::Statistics => "statistics",
            AnimeSection::MoreInfo => "moreinfo",
            AnimeSection::Reviews => "reviews",
            AnimeSection::Streaming => "streaming",
            AnimeSection::Pictures => "pictures",
            AnimeSection::Voices => "voices",
        }
    }
}

impl fmt::Display for AnimeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimeSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        AnimeSection::ALL
            .into_iter()
            .find(|section| section.as_str() == lower)
            .ok_or_else(|| {
                let known: Vec<_> = AnimeSection::ALL.iter().map(|s| s.as_str()).collect();
                format!("Unknown section '{}'. Known: {}", s, known.join(", "))
            })
    }
}

/// Which seasonal listing to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Now,
    Upcoming,
}

/// Most popular titles
pub fn top_anime() -> String {
    "/top/anime".to_string()
}

/// Seasonal listing
pub fn season(season: Season) -> String {
    match season {
        Season::Now => "/seasons/now".to_string(),
        Season::Upcoming => "/seasons/upcoming".to_string(),
    }
}

/// Title search ordered by popularity
///
/// Returns None for an empty or whitespace-only query.
pub fn search(query: &str, limit: u32) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(format!(
        "/anime?q={}&limit={}&order_by=popularity&sort=asc",
        urlencoding::encode(query),
        limit
    ))
}

/// A single title
pub fn anime(id: u32) -> String {
    format!("/anime/{}", id)
}

/// A sub-resource of a single title
pub fn anime_section(id: u32, section: AnimeSection) -> String {
    format!("/anime/{}/{}", id, section)
}
