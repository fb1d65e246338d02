//! Location extraction: free text in, best-guess place-name candidate out.
//!
//! Strategies run in a fixed order and short-circuit on the first hit:
//! exact gazetteer/generic-region membership, capitalized-phrase tagging,
//! fuzzy similarity, then (when configured) a remote model. The tier that
//! produced a candidate is carried along for logging only.

use std::sync::Arc;

use tracing::{debug, warn};

use signalpost_common::{normalize_key, ExtractionTier, LocationCandidate};

use crate::fuzzy;
use crate::gazetteer::Gazetteer;
use crate::generic;
use crate::ner;
use crate::resolve::LocationModel;

pub struct LocationExtractor {
    gazetteer: Arc<Gazetteer>,
    fuzzy_threshold: u8,
    ngram_window: usize,
    model: Option<Arc<dyn LocationModel>>,
}

impl LocationExtractor {
    pub fn new(gazetteer: Arc<Gazetteer>, fuzzy_threshold: u8) -> Self {
        // The n-gram window must cover the longest known key, or names of
        // more tokens than the window can never match exactly.
        let ngram_window = gazetteer
            .keys()
            .chain(generic::GENERIC_REGIONS.iter().map(|r| r.key))
            .map(|k| k.split_whitespace().count())
            .max()
            .unwrap_or(1);
        Self {
            gazetteer,
            fuzzy_threshold,
            ngram_window,
            model: None,
        }
    }

    /// Register the remote extraction tier. Left unset, the cascade ends
    /// at fuzzy matching.
    pub fn with_model(mut self, model: Arc<dyn LocationModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub async fn extract(&self, text: &str) -> Option<LocationCandidate> {
        if text.trim().is_empty() {
            return None;
        }

        if let Some(candidate) = self.exact_tier(text) {
            debug!(name = %candidate.name, tier = %candidate.tier, "Location extracted");
            return Some(candidate);
        }

        if let Some(candidate) = self.ner_tier(text) {
            debug!(name = %candidate.name, tier = %candidate.tier, "Location extracted");
            return Some(candidate);
        }

        if let Some((entry, score)) = fuzzy::best_match(text, &self.gazetteer, self.fuzzy_threshold)
        {
            debug!(name = %entry.name, score, "Location extracted via fuzzy match");
            return Some(LocationCandidate {
                name: entry.name.clone(),
                tier: ExtractionTier::Fuzzy,
            });
        }

        if let Some(model) = &self.model {
            match model.extract_place(text).await {
                Ok(Some(name)) => {
                    debug!(name = %name, "Location extracted via model");
                    return Some(LocationCandidate {
                        name,
                        tier: ExtractionTier::Model,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Model extraction failed, no candidate"),
            }
        }

        debug!("No location detected");
        None
    }

    /// Tier 1: the full trimmed text, then every token n-gram (longest
    /// first at each position, window sized to the longest key), against
    /// the gazetteer and generic-region key sets. First token-order match
    /// wins; no scoring.
    fn exact_tier(&self, text: &str) -> Option<LocationCandidate> {
        let full = normalize_key(text);
        if let Some(candidate) = self.lookup_exact(&full) {
            return Some(candidate);
        }

        let tokens: Vec<&str> = full
            .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
            .filter(|t| !t.is_empty())
            .collect();

        for start in 0..tokens.len() {
            let max_len = self.ngram_window.min(tokens.len() - start);
            for len in (1..=max_len).rev() {
                let gram = tokens[start..start + len].join(" ");
                if let Some(candidate) = self.lookup_exact(&gram) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn lookup_exact(&self, key: &str) -> Option<LocationCandidate> {
        if let Some(entry) = self.gazetteer.get_normalized(key) {
            return Some(LocationCandidate {
                name: entry.name.clone(),
                tier: ExtractionTier::Exact,
            });
        }
        if let Some(region) = generic::lookup(key) {
            return Some(LocationCandidate {
                name: region.name.to_string(),
                tier: ExtractionTier::Generic,
            });
        }
        None
    }

    /// Tier 2: capitalized-phrase candidates validated against the
    /// gazetteer.
    fn ner_tier(&self, text: &str) -> Option<LocationCandidate> {
        for candidate in ner::place_candidates(text) {
            if let Some(entry) = self.gazetteer.get_normalized(&candidate) {
                return Some(LocationCandidate {
                    name: entry.name.clone(),
                    tier: ExtractionTier::Ner,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::GazetteerEntry;
    use anyhow::Result;
    use signalpost_common::GeoPoint;

    fn entry(name: &str, lat: f64, lon: f64) -> GazetteerEntry {
        GazetteerEntry {
            name: name.to_string(),
            lat,
            lon,
            district: None,
            place_type: None,
            native_name: None,
        }
    }

    fn sample_gazetteer() -> Arc<Gazetteer> {
        let mut gaz = Gazetteer::empty();
        gaz.insert(entry("Jenin", 32.46, 35.30));
        gaz.insert(entry("Khan Younis", 31.34, 34.30));
        gaz.insert(entry("Kufr Qaddum", 32.22, 35.14));
        gaz.insert(entry("Tel As Sultan Camp", 31.30, 34.24));
        Arc::new(gaz)
    }

    struct StubModel {
        place: Option<String>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LocationModel for StubModel {
        async fn extract_place(&self, _text: &str) -> Result<Option<String>> {
            if self.fail {
                anyhow::bail!("service unavailable");
            }
            Ok(self.place.clone())
        }

        async fn estimate_coords(&self, _place: &str) -> Result<Option<GeoPoint>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn exact_single_token_match() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor
            .extract("clashes erupted in jenin today")
            .await
            .unwrap();
        assert_eq!(candidate.name, "Jenin");
        assert_eq!(candidate.tier, ExtractionTier::Exact);
    }

    #[tokio::test]
    async fn exact_multi_token_match() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor
            .extract("protest reported in khan younis this evening")
            .await
            .unwrap();
        assert_eq!(candidate.name, "Khan Younis");
        assert_eq!(candidate.tier, ExtractionTier::Exact);
    }

    #[tokio::test]
    async fn generic_region_match() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor
            .extract("update from the occupied territories")
            .await
            .unwrap();
        assert_eq!(candidate.name, "Occupied Territories");
        assert_eq!(candidate.tier, ExtractionTier::Generic);
    }

    #[tokio::test]
    async fn exact_tier_matches_long_lowercase_names() {
        // Four tokens, no capitalization: the n-gram window has to reach
        // the longest gazetteer key.
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor
            .extract("families displaced from tel as sultan camp overnight")
            .await
            .unwrap();
        assert_eq!(candidate.name, "Tel As Sultan Camp");
        assert_eq!(candidate.tier, ExtractionTier::Exact);
    }

    #[test]
    fn ner_tier_validates_capitalized_phrases() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor
            .ner_tier("Families fled Tel As Sultan Camp overnight")
            .unwrap();
        assert_eq!(candidate.name, "Tel As Sultan Camp");
        assert_eq!(candidate.tier, ExtractionTier::Ner);
        // Capitalized words that are not gazetteer names propose nothing.
        assert!(extractor.ner_tier("Families fled the area").is_none());
    }

    #[tokio::test]
    async fn fuzzy_tier_matches_misspelling() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        let candidate = extractor.extract("kufr qadum").await.unwrap();
        assert_eq!(candidate.name, "Kufr Qaddum");
        assert_eq!(candidate.tier, ExtractionTier::Fuzzy);
    }

    #[tokio::test]
    async fn model_tier_runs_last() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85).with_model(Arc::new(
            StubModel {
                place: Some("Deir Sharaf".to_string()),
                fail: false,
            },
        ));
        let candidate = extractor
            .extract("soldiers raided a village west of the city")
            .await
            .unwrap();
        assert_eq!(candidate.name, "Deir Sharaf");
        assert_eq!(candidate.tier, ExtractionTier::Model);
    }

    #[tokio::test]
    async fn model_failure_means_no_candidate() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85).with_model(Arc::new(
            StubModel {
                place: None,
                fail: true,
            },
        ));
        assert!(extractor
            .extract("nothing resolvable in this text")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn empty_text_yields_nothing() {
        let extractor = LocationExtractor::new(sample_gazetteer(), 85);
        assert!(extractor.extract("   ").await.is_none());
    }
}
