//! OpenStreetMap Nominatim geocoder.

use super::http;
use super::{Provider, ProviderResults, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

const ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

static LEADING_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:where\s+(?:is|are)|address\s+of|coordinates\s+of|directions\s+to|map\s+of)\s+(?:the\s+)?")
        .expect("valid question regex")
});

pub struct NominatimProvider {
    client: Client,
}

impl NominatimProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    osm_type: Option<String>,
    #[serde(default)]
    osm_id: Option<u64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
}

/// Geocoders want the place, not the question around it.
fn place_query(query: &str) -> String {
    LEADING_QUESTION
        .replace(query, "")
        .trim()
        .trim_end_matches('?')
        .to_string()
}

fn into_results(places: Vec<Place>) -> ProviderResults {
    let total = places.len();
    let sources = places
        .into_iter()
        .map(|place| {
            let url = match (place.osm_type.as_deref(), place.osm_id) {
                (Some(kind), Some(id)) => format!("https://www.openstreetmap.org/{kind}/{id}"),
                _ => format!(
                    "https://www.openstreetmap.org/?mlat={}&mlon={}#map=16/{}/{}",
                    place.lat, place.lon, place.lat, place.lon
                ),
            };
            let title = place
                .display_name
                .split(',')
                .next()
                .unwrap_or(&place.display_name)
                .trim()
                .to_string();
            let kind = match (place.category.as_deref(), place.kind.as_deref()) {
                (Some(c), Some(k)) => format!(" ({c}/{k})"),
                (None, Some(k)) => format!(" ({k})"),
                _ => String::new(),
            };
            let content = format!(
                "{}. Coordinates: {}, {}{kind}",
                place.display_name, place.lat, place.lon
            );
            let score = place.importance.map(|i| i.clamp(0.0, 1.0) as f32).unwrap_or(0.5);
            Source::new(url, title).with_content(content).with_quality(score)
        })
        .collect();
    ProviderResults::new(sources, total)
}

#[async_trait]
impl Provider for NominatimProvider {
    fn id(&self) -> &'static str {
        "nominatim"
    }

    fn description(&self) -> &'static str {
        "OpenStreetMap geocoder for places and addresses"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<ProviderResults, ProviderError> {
        let cleaned = place_query(http::require_query(query)?);
        let q = http::require_query(&cleaned)?;
        let limit = limit.clamp(1, 40).to_string();
        let req = self.client.get(ENDPOINT).query(&[
            ("q", q),
            ("format", "jsonv2"),
            ("limit", limit.as_str()),
            ("addressdetails", "0"),
        ]);
        let places: Vec<Place> = http::get_json(self.id(), req).await?;
        Ok(into_results(places))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_query_strips_question() {
        assert_eq!(place_query("Where is the Eiffel Tower?"), "Eiffel Tower");
        assert_eq!(place_query("address of 10 Downing Street"), "10 Downing Street");
        assert_eq!(place_query("Kyoto Station"), "Kyoto Station");
    }

    #[test]
    fn test_maps_places() {
        let json = r#"[
            {"place_id": 1, "lat": "48.8582599", "lon": "2.2945006", "osm_type": "way", "osm_id": 5013364,
             "category": "man_made", "type": "tower", "importance": 0.73,
             "display_name": "Eiffel Tower, Avenue Gustave Eiffel, Paris, France"},
            {"place_id": 2, "lat": "1.0", "lon": "2.0", "display_name": "Somewhere"}
        ]"#;
        let results = into_results(serde_json::from_str(json).unwrap());
        assert_eq!(results.sources.len(), 2);
        let tower = &results.sources[0];
        assert_eq!(tower.title, "Eiffel Tower");
        assert_eq!(tower.url, "https://www.openstreetmap.org/way/5013364");
        assert!(tower.content.contains("48.8582599, 2.2945006 (man_made/tower)"));
        assert_eq!(results.sources[1].quality_score, 0.5);
        assert!(results.sources[1].url.contains("mlat=1.0"));
    }
}
