//! Analysis report domain model.
//!
//! Every record here deserializes leniently from model output: absent
//! fields take their defaults and mistyped values are coerced, so a decoded
//! record is always fully shaped.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::analysis::SpecializedKind;

/// Comment used when the model returned scores without a comment.
pub const DESIGN_COMMENT_MISSING: &str = "No comment from the model.";

/// Comment used when the design response could not be decoded.
pub const DESIGN_COMMENT_UNPARSEABLE: &str = "The model did not return a valid design assessment.";

/// Comment used for modes that do not score design.
pub const DESIGN_COMMENT_NOT_SCORED: &str = "Design is not scored for this analysis type.";

/// Neutral score reported for modes without a design stage.
pub const NEUTRAL_DESIGN_SCORE: f64 = 0.5;

/// Sentinel for an unavailable audience estimate.
pub const VISITORS_UNAVAILABLE: &str = "N/A";

mod lenient {
    use super::*;

    pub fn to_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .map(to_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Bool(_) | Value::Number(_) | Value::Object(_) => value.to_string(),
        }
    }

    pub fn to_text_list(value: &Value) -> Vec<String> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(to_text)
                .filter(|s| !s.is_empty())
                .collect(),
            other => {
                let s = to_text(other);
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s]
                }
            }
        }
    }

    /// Coerces a number or numeric string into `[0, 1]`; anything else is 0.
    pub fn to_unit_score(value: &Value) -> f64 {
        let raw = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match raw {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(to_text(&Value::deserialize(d)?))
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(to_text_list(&Value::deserialize(d)?))
    }
}

/// One analyzed aspect (SEO, UX or content).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub observations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

/// Three bounded design scores plus a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDesignScore")]
pub struct DesignScore {
    pub usability: f64,
    pub aesthetics: f64,
    pub performance: f64,
    pub comment: String,
}

#[derive(Deserialize)]
struct RawDesignScore {
    #[serde(default)]
    usability: Value,
    #[serde(default)]
    aesthetics: Value,
    #[serde(default)]
    performance: Value,
    #[serde(default)]
    comment: Value,
}

impl From<RawDesignScore> for DesignScore {
    fn from(raw: RawDesignScore) -> Self {
        let comment = lenient::to_text(&raw.comment);
        Self {
            usability: lenient::to_unit_score(&raw.usability),
            aesthetics: lenient::to_unit_score(&raw.aesthetics),
            performance: lenient::to_unit_score(&raw.performance),
            comment: if comment.is_empty() {
                DESIGN_COMMENT_MISSING.to_string()
            } else {
                comment
            },
        }
    }
}

impl DesignScore {
    pub fn unparseable() -> Self {
        Self {
            usability: 0.0,
            aesthetics: 0.0,
            performance: 0.0,
            comment: DESIGN_COMMENT_UNPARSEABLE.to_string(),
        }
    }

    pub fn neutral() -> Self {
        Self {
            usability: NEUTRAL_DESIGN_SCORE,
            aesthetics: NEUTRAL_DESIGN_SCORE,
            performance: NEUTRAL_DESIGN_SCORE,
            comment: DESIGN_COMMENT_NOT_SCORED.to_string(),
        }
    }
}

/// Cross-cutting improvement summary for the standard family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationsSummary {
    #[serde(default, deserialize_with = "lenient::text")]
    pub seo_recommendations: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub ux_recommendations: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_recommendations: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub overall_summary: String,
}

impl RecommendationsSummary {
    pub fn unavailable() -> Self {
        Self {
            overall_summary: "No recommendations could be generated.".to_string(),
            ..Default::default()
        }
    }
}

/// Cross-cutting strengths summary for the competitor family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthsSummary {
    #[serde(default, deserialize_with = "lenient::text")]
    pub seo_strengths: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub ux_strengths: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub content_strengths: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub overall_strengths: String,
}

impl StrengthsSummary {
    pub fn unavailable() -> Self {
        Self {
            overall_strengths: "Strengths could not be summarized.".to_string(),
            ..Default::default()
        }
    }
}

/// Summary stage output, by family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryRecord {
    Recommendations(RecommendationsSummary),
    Strengths(StrengthsSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingPageAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub clarity: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub conversion_potential: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub structure: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub persuasiveness: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPageAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub targeting: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub seo: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub persuasiveness: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustCheckAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub professionalism: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub security_indicators: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub transparency: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub risk_assessment: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub positioning: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tone_of_voice: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub visual_identity: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub audience_appeal: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileExperienceAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub responsiveness: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub navigation: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub performance: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub usability: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendations: String,
}

/// Single-prompt analysis output, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SpecializedAnalysis {
    LandingPage(LandingPageAnalysis),
    ProductPage(ProductPageAnalysis),
    TrustCheck(TrustCheckAnalysis),
    BrandAnalysis(BrandAnalysis),
    MobileExperience(MobileExperienceAnalysis),
}

impl SpecializedAnalysis {
    /// Fully-shaped empty record for a kind.
    pub fn empty(kind: SpecializedKind) -> Self {
        match kind {
            SpecializedKind::LandingPage => Self::LandingPage(Default::default()),
            SpecializedKind::ProductPage => Self::ProductPage(Default::default()),
            SpecializedKind::TrustCheck => Self::TrustCheck(Default::default()),
            SpecializedKind::BrandAnalysis => Self::BrandAnalysis(Default::default()),
            SpecializedKind::MobileExperience => Self::MobileExperience(Default::default()),
        }
    }

    pub fn kind(&self) -> SpecializedKind {
        match self {
            Self::LandingPage(_) => SpecializedKind::LandingPage,
            Self::ProductPage(_) => SpecializedKind::ProductPage,
            Self::TrustCheck(_) => SpecializedKind::TrustCheck,
            Self::BrandAnalysis(_) => SpecializedKind::BrandAnalysis,
            Self::MobileExperience(_) => SpecializedKind::MobileExperience,
        }
    }
}

/// Pipeline stage whose wall time is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Extraction,
    Generation,
    Parsing,
    Design,
    Summary,
    VisitorLookup,
    Total,
}

impl Stage {
    pub fn metric_key(&self) -> &'static str {
        match self {
            Stage::Extraction => "scrape_time",
            Stage::Generation => "openai_analysis_time",
            Stage::Parsing => "json_parse_time",
            Stage::Design => "design_analysis_time",
            Stage::Summary => "summary_time",
            Stage::VisitorLookup => "visitor_lookup_time",
            Stage::Total => "total_processing_time",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Generation => "generation",
            Stage::Parsing => "parsing",
            Stage::Design => "design",
            Stage::Summary => "summary",
            Stage::VisitorLookup => "visitor_lookup",
            Stage::Total => "total",
        }
    }
}

/// Wall time per stage. Parallel stages each report their own duration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    stages: BTreeMap<Stage, Duration>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.insert(stage, elapsed);
    }

    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages.get(&stage).copied()
    }

    /// Seconds rounded to two decimals, as reported to callers.
    pub fn seconds(&self, stage: Stage) -> Option<f64> {
        self.get(stage)
            .map(|d| (d.as_secs_f64() * 100.0).round() / 100.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        self.stages.iter().map(|(s, d)| (*s, *d))
    }
}

impl Serialize for StageTimings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stages.len()))?;
        for stage in self.stages.keys() {
            map.serialize_entry(stage.metric_key(), &self.seconds(*stage).unwrap_or(0.0))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardReport {
    pub seo_analysis: AspectAnalysis,
    pub ux_analysis: AspectAnalysis,
    pub content_analysis: AspectAnalysis,
    #[serde(rename = "designScore")]
    pub design_score: DesignScore,
    pub recommendations_summary: RecommendationsSummary,
    pub visitors_per_month: String,
    pub performance_metrics: StageTimings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorReport {
    pub seo_analysis: AspectAnalysis,
    pub ux_analysis: AspectAnalysis,
    pub content_analysis: AspectAnalysis,
    #[serde(rename = "designScore")]
    pub design_score: DesignScore,
    pub strengths_summary: StrengthsSummary,
    pub visitors_per_month: String,
    pub is_competitor: bool,
    pub performance_metrics: StageTimings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecializedReport {
    pub analysis_type: SpecializedKind,
    pub specialized_analysis: SpecializedAnalysis,
    #[serde(rename = "designScore")]
    pub design_score: DesignScore,
    pub visitors_per_month: String,
    pub performance_metrics: StageTimings,
}

/// Final, immutable result of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisReport {
    Standard(StandardReport),
    Competitor(CompetitorReport),
    Specialized(SpecializedReport),
}

impl AnalysisReport {
    pub fn design_score(&self) -> &DesignScore {
        match self {
            AnalysisReport::Standard(r) => &r.design_score,
            AnalysisReport::Competitor(r) => &r.design_score,
            AnalysisReport::Specialized(r) => &r.design_score,
        }
    }

    pub fn visitors_per_month(&self) -> &str {
        match self {
            AnalysisReport::Standard(r) => &r.visitors_per_month,
            AnalysisReport::Competitor(r) => &r.visitors_per_month,
            AnalysisReport::Specialized(r) => &r.visitors_per_month,
        }
    }

    pub fn timings(&self) -> &StageTimings {
        match self {
            AnalysisReport::Standard(r) => &r.performance_metrics,
            AnalysisReport::Competitor(r) => &r.performance_metrics,
            AnalysisReport::Specialized(r) => &r.performance_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aspect_backfills_missing_fields() {
        let aspect: AspectAnalysis = serde_json::from_value(json!({"summary": "x"})).unwrap();
        assert_eq!(aspect.summary, "x");
        assert!(aspect.observations.is_empty());
        assert_eq!(aspect.recommendations, "");
    }

    #[test]
    fn test_aspect_coerces_mistyped_fields() {
        let aspect: AspectAnalysis = serde_json::from_value(json!({
            "summary": null,
            "observations": "single observation",
            "recommendations": ["first", "second"]
        }))
        .unwrap();
        assert_eq!(aspect.summary, "");
        assert_eq!(aspect.observations, vec!["single observation"]);
        assert_eq!(aspect.recommendations, "first\nsecond");
    }

    #[test]
    fn test_design_score_clamps_and_backfills() {
        let score: DesignScore = serde_json::from_value(json!({
            "usability": 1.7,
            "aesthetics": -0.2,
        }))
        .unwrap();
        assert_eq!(score.usability, 1.0);
        assert_eq!(score.aesthetics, 0.0);
        assert_eq!(score.performance, 0.0);
        assert_eq!(score.comment, DESIGN_COMMENT_MISSING);
    }

    #[test]
    fn test_design_score_accepts_numeric_strings() {
        let score: DesignScore = serde_json::from_value(json!({
            "usability": "0.65",
            "aesthetics": "high",
            "performance": 0.4,
            "comment": "Cluttered header"
        }))
        .unwrap();
        assert_eq!(score.usability, 0.65);
        assert_eq!(score.aesthetics, 0.0);
        assert_eq!(score.performance, 0.4);
        assert_eq!(score.comment, "Cluttered header");
    }

    #[test]
    fn test_neutral_design_score() {
        let score = DesignScore::neutral();
        assert_eq!(
            (score.usability, score.aesthetics, score.performance),
            (0.5, 0.5, 0.5)
        );
        assert!(!score.comment.is_empty());
    }

    #[test]
    fn test_specialized_serializes_flat() {
        let analysis = SpecializedAnalysis::empty(SpecializedKind::TrustCheck);
        let value = serde_json::to_value(&analysis).unwrap();
        assert!(value.get("risk_assessment").is_some());
        assert!(value.get("security_indicators").is_some());
        assert_eq!(analysis.kind(), SpecializedKind::TrustCheck);
    }

    #[test]
    fn test_stage_timings_serialize_rounded() {
        let mut timings = StageTimings::new();
        timings.record(Stage::Extraction, Duration::from_millis(1234));
        timings.record(Stage::Total, Duration::from_millis(5678));

        let value = serde_json::to_value(&timings).unwrap();
        assert_eq!(value["scrape_time"], json!(1.23));
        assert_eq!(value["total_processing_time"], json!(5.68));
        assert!(value.get("design_analysis_time").is_none());
    }

    #[test]
    fn test_standard_report_keys() {
        let report = AnalysisReport::Standard(StandardReport {
            seo_analysis: AspectAnalysis::default(),
            ux_analysis: AspectAnalysis::default(),
            content_analysis: AspectAnalysis::default(),
            design_score: DesignScore::unparseable(),
            recommendations_summary: RecommendationsSummary::unavailable(),
            visitors_per_month: VISITORS_UNAVAILABLE.to_string(),
            performance_metrics: StageTimings::new(),
        });

        let value = serde_json::to_value(&report).unwrap();
        for key in [
            "seo_analysis",
            "ux_analysis",
            "content_analysis",
            "designScore",
            "recommendations_summary",
            "visitors_per_month",
            "performance_metrics",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["seo_analysis"]["observations"], json!([]));
    }
}
