use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Paged list wrapper returned by the data API's `me/top/*` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub name: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreCount {
    pub genre: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningStats {
    pub time_range: TimeRange,
    pub top_artists: Vec<String>,
    pub top_tracks: Vec<TrackSummary>,
    pub top_genres: Vec<GenreCount>,
    pub average_popularity: Option<f64>,
    pub obscurity_score: Option<f64>,
}

impl ListeningStats {
    pub fn summarize(time_range: TimeRange, artists: &[Artist], tracks: &[Track]) -> Self {
        let mut genres: HashMap<&str, usize> = HashMap::new();
        for artist in artists {
            for genre in &artist.genres {
                *genres.entry(genre.as_str()).or_default() += 1;
            }
        }
        let mut top_genres: Vec<GenreCount> = genres
            .into_iter()
            .map(|(genre, count)| GenreCount { genre: genre.to_string(), count })
            .collect();
        top_genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));

        let popularity: Vec<u32> = artists.iter().filter_map(|a| a.popularity).collect();
        let average_popularity = if popularity.is_empty() {
            None
        } else {
            let mean = popularity.iter().map(|p| *p as f64).sum::<f64>() / popularity.len() as f64;
            Some(round1(mean))
        };

        Self {
            time_range,
            top_artists: artists.iter().map(|a| a.name.clone()).collect(),
            top_tracks: tracks
                .iter()
                .map(|t| TrackSummary {
                    name: t.name.clone(),
                    artist: t.artists.first().map(|a| a.name.clone()).unwrap_or_default(),
                })
                .collect(),
            top_genres,
            average_popularity,
            obscurity_score: average_popularity.map(|p| round1(100.0 - p)),
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
