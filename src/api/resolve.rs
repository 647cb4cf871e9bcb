//! Offline resolution - one raw OCR string to bills or a legislator

use crate::api::models::detection::{ResolveResponse, ResolvedMatch};
use crate::core::bill::{BillIdentifierResolver, MatchSource};
use crate::core::legislator::{LegislatorNameResolver, NameContext, NameMiss, NameScorer, Roster};
use crate::core::noise::NoiseModel;
use crate::core::pipeline::{DetectionConfig, ResolvedValue};
use crate::core::region::DetectionType;
use std::sync::Arc;

/// Runs the resolver for `mode` over `raw_text` without a screenshot or context.
///
/// ```ignore
/// let response = resolve_text(DetectionType::BillDetection, "H8 2067", roster, &DetectionConfig::default());
/// assert_eq!(response.matches[0].label, "HB2067");
/// ```
pub fn resolve_text(
    mode: DetectionType,
    raw_text: &str,
    roster: Arc<Roster>,
    config: &DetectionConfig,
) -> ResolveResponse {
    let threshold = config.threshold(mode);
    let mut matches = Vec::new();
    let mut misses = Vec::new();

    match mode {
        DetectionType::BillDetection => {
            let resolved = BillIdentifierResolver::default().resolve_lines(raw_text);
            if resolved.is_empty() {
                misses.push("no bill identifier found".to_string());
            }
            for scored in resolved {
                let detail = match &scored.source {
                    MatchSource::Literal => "literal".to_string(),
                    MatchSource::Repaired { variant } => format!("repaired from '{}'", variant),
                };
                let value = ResolvedValue::Bill(scored.candidate);
                matches.push(ResolvedMatch {
                    label: value.label(),
                    value,
                    confidence: scored.confidence,
                    accepted: scored.confidence >= threshold,
                    detail,
                });
            }
        }
        DetectionType::SpeakerDetection => {
            let scorer = NameScorer::new(NoiseModel::ocr(), config.name_variation_limit);
            let resolver = LegislatorNameResolver::with_scorer(roster, scorer, config.min_name_letters);
            for (candidate, result) in resolver.resolve_blocks(raw_text, &NameContext::default()) {
                match result {
                    Ok(scored) => {
                        let value = ResolvedValue::Legislator(scored.legislator);
                        matches.push(ResolvedMatch {
                            label: value.label(),
                            value,
                            confidence: scored.confidence,
                            accepted: scored.confidence >= threshold,
                            detail: format!("'{}' matched '{}'", candidate.cleaned, scored.matched_form),
                        });
                    }
                    Err(NameMiss::Ambiguous { confidence, ids }) => {
                        misses.push(format!("'{}' ties at {:.1} between {:?}", candidate.cleaned, confidence, ids))
                    }
                    Err(miss) => misses.push(format!("'{}': {}", candidate.cleaned, miss)),
                }
            }
            if matches.is_empty() && misses.is_empty() {
                misses.push("no name found".to_string());
            }
        }
    }

    ResolveResponse {
        mode,
        raw_text: raw_text.to_string(),
        matches,
        misses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Arc<Roster> {
        Arc::new(
            Roster::from_json_str(
                r#"[{"id": 1, "first_name": "Vivian", "last_name": "Watts", "party": "D", "district": "39"}]"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_resolve_bill_text() {
        let response = resolve_text(DetectionType::BillDetection, "H8 2067", roster(), &DetectionConfig::default());
        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].label, "HB2067");
        assert!(response.matches[0].accepted);
        assert!(response.matches[0].detail.starts_with("repaired"));

        let response = resolve_text(DetectionType::BillDetection, "Call to order", roster(), &DetectionConfig::default());
        assert!(response.matches.is_empty());
        assert_eq!(response.misses.len(), 1);
    }

    #[test]
    fn test_resolve_speaker_text() {
        let response = resolve_text(
            DetectionType::SpeakerDetection,
            "Del. Vivian E. Watts (D-39)",
            roster(),
            &DetectionConfig::default(),
        );
        assert_eq!(response.matches[0].label, "Vivian Watts");
        assert!(response.matches[0].accepted);

        let response = resolve_text(DetectionType::SpeakerDetection, "", roster(), &DetectionConfig::default());
        assert!(response.matches.is_empty());
        assert_eq!(response.misses, vec!["no name found".to_string()]);
    }
}
