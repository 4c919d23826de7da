//! Aggregator.
//!
//! Turns raw model text into typed records, substituting defaults for any
//! aspect that fails to parse, and composes the final report.

use crate::models::analysis::{AnalysisMode, SpecializedKind};
use crate::models::report::{
    AnalysisReport, AspectAnalysis, BrandAnalysis, CompetitorReport, DesignScore,
    LandingPageAnalysis, MobileExperienceAnalysis, ProductPageAnalysis, RecommendationsSummary,
    SpecializedAnalysis, SpecializedReport, StageTimings, StandardReport, StrengthsSummary,
    SummaryRecord, TrustCheckAnalysis,
};

use super::response_parser::ResponseParser;

const ASPECT_NAMES: [&str; 3] = ["seo", "ux", "content"];

/// Parsed primary-stage output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryRecords {
    /// SEO, UX and content, in that order.
    Aspects(Box<[AspectAnalysis; 3]>),
    Specialized(SpecializedAnalysis),
}

#[derive(Clone, Default)]
pub struct Aggregator {
    parser: ResponseParser,
}

impl Aggregator {
    pub fn new(parser: ResponseParser) -> Self {
        Self { parser }
    }

    /// Parses the primary outputs for a mode. Missing or unparseable slots
    /// become fully-shaped empty records.
    pub fn parse_primary(&self, mode: AnalysisMode, raw: &[String]) -> PrimaryRecords {
        let slot = |i: usize| raw.get(i).map(String::as_str).unwrap_or_default();
        match mode {
            AnalysisMode::Standard | AnalysisMode::Competitor => {
                let aspects: [AspectAnalysis; 3] =
                    std::array::from_fn(|i| self.parse_aspect(ASPECT_NAMES[i], slot(i)));
                PrimaryRecords::Aspects(Box::new(aspects))
            }
            AnalysisMode::Specialized(kind) => {
                PrimaryRecords::Specialized(self.parse_specialized(kind, slot(0)))
            }
        }
    }

    pub fn parse_aspect(&self, aspect: &str, raw: &str) -> AspectAnalysis {
        self.parser.parse(raw).unwrap_or_else(|e| {
            tracing::warn!(
                aspect = aspect,
                error = %e,
                "Aspect response unparseable, using defaults"
            );
            AspectAnalysis::default()
        })
    }

    pub fn parse_specialized(&self, kind: SpecializedKind, raw: &str) -> SpecializedAnalysis {
        let parsed = match kind {
            SpecializedKind::LandingPage => self
                .parser
                .parse::<LandingPageAnalysis>(raw)
                .map(SpecializedAnalysis::LandingPage),
            SpecializedKind::ProductPage => self
                .parser
                .parse::<ProductPageAnalysis>(raw)
                .map(SpecializedAnalysis::ProductPage),
            SpecializedKind::TrustCheck => self
                .parser
                .parse::<TrustCheckAnalysis>(raw)
                .map(SpecializedAnalysis::TrustCheck),
            SpecializedKind::BrandAnalysis => self
                .parser
                .parse::<BrandAnalysis>(raw)
                .map(SpecializedAnalysis::BrandAnalysis),
            SpecializedKind::MobileExperience => self
                .parser
                .parse::<MobileExperienceAnalysis>(raw)
                .map(SpecializedAnalysis::MobileExperience),
        };
        parsed.unwrap_or_else(|e| {
            tracing::warn!(
                kind = %kind,
                error = %e,
                "Specialized response unparseable, using defaults"
            );
            SpecializedAnalysis::empty(kind)
        })
    }

    pub fn parse_design(&self, raw: &str) -> DesignScore {
        self.parser.parse(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Design response unparseable, using zero scores");
            DesignScore::unparseable()
        })
    }

    /// Parses the summary output for the mode's family.
    pub fn parse_summary(&self, mode: AnalysisMode, raw: &str) -> Option<SummaryRecord> {
        match mode {
            AnalysisMode::Standard => Some(SummaryRecord::Recommendations(
                self.parser.parse(raw).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Recommendations summary unparseable");
                    RecommendationsSummary::unavailable()
                }),
            )),
            AnalysisMode::Competitor => Some(SummaryRecord::Strengths(
                self.parser.parse(raw).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Strengths summary unparseable");
                    StrengthsSummary::unavailable()
                }),
            )),
            AnalysisMode::Specialized(_) => None,
        }
    }

    /// Composes the final report.
    ///
    /// A missing design score is neutral for modes without a design stage
    /// and zero otherwise; a missing or mismatched summary falls back to the
    /// family's canned summary.
    pub fn assemble(
        &self,
        mode: AnalysisMode,
        primary: PrimaryRecords,
        design: Option<DesignScore>,
        summary: Option<SummaryRecord>,
        visitors: String,
        timings: StageTimings,
    ) -> AnalysisReport {
        let design_score = match design {
            Some(score) => score,
            None if mode.runs_design_stage() => DesignScore::unparseable(),
            None => DesignScore::neutral(),
        };

        match mode {
            AnalysisMode::Standard | AnalysisMode::Competitor => {
                let [seo, ux, content] = match primary {
                    PrimaryRecords::Aspects(aspects) => *aspects,
                    PrimaryRecords::Specialized(_) => Default::default(),
                };
                if mode == AnalysisMode::Competitor {
                    let strengths_summary = match summary {
                        Some(SummaryRecord::Strengths(s)) => s,
                        _ => StrengthsSummary::unavailable(),
                    };
                    AnalysisReport::Competitor(CompetitorReport {
                        seo_analysis: seo,
                        ux_analysis: ux,
                        content_analysis: content,
                        design_score,
                        strengths_summary,
                        visitors_per_month: visitors,
                        is_competitor: true,
                        performance_metrics: timings,
                    })
                } else {
                    let recommendations_summary = match summary {
                        Some(SummaryRecord::Recommendations(s)) => s,
                        _ => RecommendationsSummary::unavailable(),
                    };
                    AnalysisReport::Standard(StandardReport {
                        seo_analysis: seo,
                        ux_analysis: ux,
                        content_analysis: content,
                        design_score,
                        recommendations_summary,
                        visitors_per_month: visitors,
                        performance_metrics: timings,
                    })
                }
            }
            AnalysisMode::Specialized(kind) => {
                let specialized_analysis = match primary {
                    PrimaryRecords::Specialized(analysis) if analysis.kind() == kind => analysis,
                    _ => SpecializedAnalysis::empty(kind),
                };
                AnalysisReport::Specialized(SpecializedReport {
                    analysis_type: kind,
                    specialized_analysis,
                    design_score,
                    visitors_per_month: visitors,
                    performance_metrics: timings,
                })
            }
        }
    }
}
