//! Analysis pipeline.
//!
//! extraction → prompts → fan-out → parse → design / summary → aggregate.
//!
//! The design prompt depends only on the snapshot, so it runs alongside the
//! primary chain and the visitor lookup. Each stage reports its own wall
//! time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::models::analysis::{AnalysisMode, AnalysisPlan};
use crate::models::report::{
    AnalysisReport, DesignScore, Stage, StageTimings, SummaryRecord, VISITORS_UNAVAILABLE,
};
use crate::models::snapshot::PageSnapshot;

use super::aggregator::{Aggregator, PrimaryRecords};
use super::fanout::{FanOut, FanOutError};
use super::prompts::PromptBuilder;

type GenerationOutcome = (
    PrimaryRecords,
    Option<SummaryRecord>,
    Option<DesignScore>,
    StageTimings,
);

/// Default bound on loading one page.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Page load timed out after {0}s")]
    Timeout(u64),

    #[error("Page could not be fetched: {0}")]
    Fetch(String),

    #[error("Page returned status {0}")]
    Status(u16),

    #[error("Page content is not usable: {0}")]
    InvalidContent(String),
}

/// Content extraction gateway.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Loads and extracts one page. Never returns an empty snapshot in place
    /// of a failure.
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, ExtractionError>;
}

/// Audience metrics gateway. Best effort; degrades to `"N/A"`.
#[async_trait]
pub trait AudienceMetrics: Send + Sync {
    async fn lookup(&self, domain: &str) -> String;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Generation backend is not configured")]
    NotConfigured,

    #[error("Content extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Generation failed: {0}")]
    Generation(#[from] FanOutError),
}

impl AnalysisError {
    fn outcome(&self) -> &'static str {
        match self {
            AnalysisError::NotConfigured => "not_configured",
            AnalysisError::Extraction(_) => "extraction_failed",
            AnalysisError::Generation(_) => "generation_failed",
        }
    }
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    extractor: Arc<dyn ContentExtractor>,
    audience: Arc<dyn AudienceMetrics>,
    fanout: FanOut,
    prompts: PromptBuilder,
    aggregator: Aggregator,
    page_timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        audience: Arc<dyn AudienceMetrics>,
        fanout: FanOut,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            extractor,
            audience,
            fanout,
            prompts,
            aggregator: Aggregator::default(),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.fanout.backend().is_configured()
    }

    /// Runs one analysis to completion.
    ///
    /// Aborts on missing configuration, extraction failure or an empty
    /// prompt batch. Per-slot generation and parse failures degrade to
    /// default records instead.
    pub async fn run(&self, plan: &AnalysisPlan) -> Result<AnalysisReport, AnalysisError> {
        let result = self.execute(plan).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::counter!(
            "analyses_total",
            "mode" => plan.mode.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn execute(&self, plan: &AnalysisPlan) -> Result<AnalysisReport, AnalysisError> {
        if !self.is_configured() {
            return Err(AnalysisError::NotConfigured);
        }

        let total_start = Instant::now();
        let mut timings = StageTimings::new();
        let mode = plan.mode;
        let url = plan.url.as_str();

        let started = Instant::now();
        let fetch = self.extractor.fetch(&plan.url);
        let snapshot = match tokio::time::timeout(self.page_timeout, fetch).await {
            Ok(result) => result?,
            Err(_) => return Err(ExtractionError::Timeout(self.page_timeout.as_secs()).into()),
        };
        timings.record(Stage::Extraction, started.elapsed());

        let primary_prompts = self.prompts.primary(mode, &snapshot, url);
        let domain = plan.domain();

        let (analysis, visitors) = tokio::join!(
            self.generation_stages(mode, &primary_prompts, &snapshot, url),
            self.visitor_stage(&domain),
        );
        let (primary, summary, design, stage_timings) = analysis?;
        for (stage, elapsed) in stage_timings.iter() {
            timings.record(stage, elapsed);
        }
        let (visitors, visitor_elapsed) = visitors;
        timings.record(Stage::VisitorLookup, visitor_elapsed);

        timings.record(Stage::Total, total_start.elapsed());
        for (stage, elapsed) in timings.iter() {
            metrics::histogram!("analysis_stage_duration_seconds", "stage" => stage.as_str())
                .record(elapsed.as_secs_f64());
        }

        tracing::info!(
            url = %plan.url,
            mode = %mode,
            extraction_s = timings.seconds(Stage::Extraction).unwrap_or_default(),
            generation_s = timings.seconds(Stage::Generation).unwrap_or_default(),
            parsing_s = timings.seconds(Stage::Parsing).unwrap_or_default(),
            design_s = timings.seconds(Stage::Design).unwrap_or_default(),
            summary_s = timings.seconds(Stage::Summary).unwrap_or_default(),
            visitor_lookup_s = timings.seconds(Stage::VisitorLookup).unwrap_or_default(),
            total_s = timings.seconds(Stage::Total).unwrap_or_default(),
            "Analysis complete"
        );

        Ok(self
            .aggregator
            .assemble(mode, primary, design, summary, visitors, timings))
    }

    /// Primary fan-out first. Once it completes, the design prompt runs
    /// alongside parsing and the summary over the raw outputs.
    async fn generation_stages(
        &self,
        mode: AnalysisMode,
        prompts: &[String],
        snapshot: &PageSnapshot,
        url: &str,
    ) -> Result<GenerationOutcome, AnalysisError> {
        let mut timings = StageTimings::new();

        let started = Instant::now();
        let raw = self.fanout.invoke(prompts).await?;
        timings.record(Stage::Generation, started.elapsed());

        let ((primary, summary, summary_timings), (design, design_elapsed)) = tokio::join!(
            self.summary_chain(mode, &raw),
            self.design_stage(mode, snapshot, url),
        );
        for (stage, elapsed) in summary_timings.iter() {
            timings.record(stage, elapsed);
        }
        if let Some(elapsed) = design_elapsed {
            timings.record(Stage::Design, elapsed);
        }

        Ok((primary, summary, design, timings))
    }

    async fn summary_chain(
        &self,
        mode: AnalysisMode,
        raw: &[String],
    ) -> (PrimaryRecords, Option<SummaryRecord>, StageTimings) {
        let mut timings = StageTimings::new();

        let started = Instant::now();
        let primary = self.aggregator.parse_primary(mode, raw);
        timings.record(Stage::Parsing, started.elapsed());

        let summary = match self.prompts.summary(mode, raw) {
            Some(prompt) => {
                let started = Instant::now();
                let output = self.single(prompt).await;
                let record = self.aggregator.parse_summary(mode, &output);
                timings.record(Stage::Summary, started.elapsed());
                record
            }
            None => None,
        };

        (primary, summary, timings)
    }

    async fn design_stage(
        &self,
        mode: AnalysisMode,
        snapshot: &PageSnapshot,
        url: &str,
    ) -> (Option<DesignScore>, Option<Duration>) {
        if !mode.runs_design_stage() {
            return (None, None);
        }
        let started = Instant::now();
        let output = self.single(self.prompts.design(snapshot, url)).await;
        let score = self.aggregator.parse_design(&output);
        (Some(score), Some(started.elapsed()))
    }

    async fn visitor_stage(&self, domain: &str) -> (String, Duration) {
        let started = Instant::now();
        let visitors = self.audience.lookup(domain).await;
        (visitors, started.elapsed())
    }

    /// One-slot fan-out. A failure yields the slot's sentinel text, which
    /// the parser then rejects.
    async fn single(&self, prompt: String) -> String {
        match self.fanout.invoke(std::slice::from_ref(&prompt)).await {
            Ok(mut outputs) => outputs.pop().unwrap_or_default(),
            Err(e) => e.to_string(),
        }
    }
}

/// Extractor returning a fixed snapshot or failure, for development and
/// testing.
#[derive(Debug)]
pub struct MockContentExtractor {
    result: Result<PageSnapshot, ExtractionError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockContentExtractor {
    pub fn returning(snapshot: PageSnapshot) -> Self {
        Self {
            result: Ok(snapshot),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ExtractionError) -> Self {
        Self {
            result: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentExtractor for MockContentExtractor {
    async fn fetch(&self, _url: &Url) -> Result<PageSnapshot, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// Audience gateway answering with a fixed value.
#[derive(Debug, Clone)]
pub struct MockAudienceMetrics {
    value: String,
}

impl Default for MockAudienceMetrics {
    fn default() -> Self {
        Self {
            value: VISITORS_UNAVAILABLE.to_string(),
        }
    }
}

impl MockAudienceMetrics {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

#[async_trait]
impl AudienceMetrics for MockAudienceMetrics {
    async fn lookup(&self, _domain: &str) -> String {
        self.value.clone()
    }
}
