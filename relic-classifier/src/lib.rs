//! Jewel colour classification for `relic-classifier`.
//!
//! `classify(sample, margin, mapping)` compares the red and blue channels of
//! one colour reading and names the side whose colour clearly dominates. It
//! is the only place where sensor noise is interpreted: anything that is not
//! a clear win for one channel comes back as
//! [`ClassificationResult::Indeterminate`], never as a guess.

use relic_core::config::KnockerConfig;
use relic_core::types::{
    AllianceColor, ChannelMapping, ClassificationResult, ColorSample, TeamIdentity, Threshold,
};
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Why a reading came back indeterminate. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ambiguity {
    /// The sensor returned nothing (not ready, no light).
    NoReading,
    /// Negative or non-finite channel values.
    InvalidReading,
    /// Both channels read zero.
    NoLight,
    /// A channel is at or above the saturation limit.
    Saturated,
    /// The relative difference is below the margin.
    BelowMargin,
}

/// A classification together with the reason for any ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub result: ClassificationResult,
    pub ambiguity: Option<Ambiguity>,
}

impl Verdict {
    fn identified(side: TeamIdentity) -> Self {
        Self {
            result: ClassificationResult::Identified(side),
            ambiguity: None,
        }
    }

    fn ambiguous(reason: Ambiguity) -> Self {
        Self {
            result: ClassificationResult::Indeterminate,
            ambiguity: Some(reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("saturation limit must be a positive reading, got {0}")]
    InvalidSaturation(f64),
}

/// A configured classifier: margin, channel mapping and optional saturation limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorClassifier {
    margin: Threshold,
    mapping: ChannelMapping,
    saturation: Option<f64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify one sample against `margin`.
///
/// Returns `Indeterminate` when both channels are zero, when the channels
/// are equal, or when `|red - blue| / (red + blue)` is below `margin`.
pub fn classify(
    sample: &ColorSample,
    margin: Threshold,
    mapping: ChannelMapping,
) -> ClassificationResult {
    evaluate(sample, margin, mapping, None).result
}

/// Combine several single-sample results.
///
/// A side wins only with a strict majority of *all* samples; ties,
/// pluralities and an empty input are indeterminate.
pub fn majority(results: &[ClassificationResult]) -> ClassificationResult {
    let count = |side: TeamIdentity| {
        results
            .iter()
            .filter(|r| **r == ClassificationResult::Identified(side))
            .count()
    };
    TeamIdentity::ALL
        .into_iter()
        .find(|side| count(*side) * 2 > results.len())
        .map(ClassificationResult::Identified)
        .unwrap_or(ClassificationResult::Indeterminate)
}

impl ColorClassifier {
    pub fn new(
        margin: Threshold,
        mapping: ChannelMapping,
        saturation: Option<f64>,
    ) -> Result<Self, ClassifierError> {
        if let Some(limit) = saturation {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(ClassifierError::InvalidSaturation(limit));
            }
        }
        Ok(Self {
            margin,
            mapping,
            saturation,
        })
    }

    /// Classifier for the given alliance using the knocker's margin and limit.
    pub fn for_alliance(
        alliance: AllianceColor,
        knocker: &KnockerConfig,
    ) -> Result<Self, ClassifierError> {
        Self::new(knocker.margin, alliance.channel_mapping(), knocker.saturation)
    }

    pub fn margin(&self) -> Threshold {
        self.margin
    }

    /// Classify a reading that may be absent.
    pub fn classify_reading(&self, reading: Option<&ColorSample>) -> Verdict {
        match reading {
            Some(sample) => evaluate(sample, self.margin, self.mapping, self.saturation),
            None => Verdict::ambiguous(Ambiguity::NoReading),
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn evaluate(
    sample: &ColorSample,
    margin: Threshold,
    mapping: ChannelMapping,
    saturation: Option<f64>,
) -> Verdict {
    if !sample.is_valid() {
        return Verdict::ambiguous(Ambiguity::InvalidReading);
    }
    let (red, blue) = (sample.red, sample.blue);

    if let Some(limit) = saturation {
        if red >= limit || blue >= limit {
            return Verdict::ambiguous(Ambiguity::Saturated);
        }
    }

    let total = red + blue;
    if total <= 0.0 {
        return Verdict::ambiguous(Ambiguity::NoLight);
    }
    // Equal channels never identify, even with a zero margin.
    if red == blue || (red - blue).abs() / total < margin.value() {
        return Verdict::ambiguous(Ambiguity::BelowMargin);
    }

    if red > blue {
        Verdict::identified(mapping.red_side)
    } else {
        Verdict::identified(mapping.blue_side())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn own_red() -> ChannelMapping {
        ChannelMapping {
            red_side: TeamIdentity::OwnSide,
        }
    }

    #[test]
    fn absent_reading_is_no_reading() {
        let c = ColorClassifier::new(Threshold::default(), own_red(), None).expect("classifier");
        let v = c.classify_reading(None);
        assert_eq!(v.result, ClassificationResult::Indeterminate);
        assert_eq!(v.ambiguity, Some(Ambiguity::NoReading));
    }

    #[test]
    fn saturated_channel_is_indeterminate() {
        let c = ColorClassifier::new(Threshold::default(), own_red(), Some(255.0))
            .expect("classifier");
        let v = c.classify_reading(Some(&ColorSample::new(255.0, 3.0)));
        assert_eq!(v.ambiguity, Some(Ambiguity::Saturated));
    }

    #[test]
    fn invalid_saturation_is_rejected() {
        assert!(ColorClassifier::new(Threshold::default(), own_red(), Some(0.0)).is_err());
    }

    #[test]
    fn majority_requires_more_than_half() {
        use ClassificationResult::*;
        let own = Identified(TeamIdentity::OwnSide);
        let opp = Identified(TeamIdentity::OpposingSide);
        assert_eq!(majority(&[own, own, opp]), own);
        assert_eq!(majority(&[own, opp]), Indeterminate);
        assert_eq!(majority(&[own, Indeterminate, Indeterminate]), Indeterminate);
        assert_eq!(majority(&[]), Indeterminate);
    }
}
