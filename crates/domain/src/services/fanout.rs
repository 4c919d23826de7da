//! Model invocation fan-out.
//!
//! Sends N prompts to the generation backend concurrently, one task per
//! prompt, each with its own timeout. A failed slot yields an error sentinel
//! in its position; it never cancels or fails its siblings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

/// Prefix of the text placed in a failed slot.
pub const ERROR_SENTINEL_PREFIX: &str = "Error: ";

/// Default bound on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation backend is not configured")]
    NotConfigured,

    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FanOutError {
    #[error("No usable prompts in batch")]
    EmptyBatch,
}

/// Text-only generation backend (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError>;

    /// Whether credentials are present. An unconfigured backend aborts the
    /// pipeline before any work is done.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Whether a slot output is an error sentinel.
pub fn is_error_sentinel(output: &str) -> bool {
    output.starts_with(ERROR_SENTINEL_PREFIX)
}

fn sentinel(err: &GenerationError) -> String {
    format!("{}{}", ERROR_SENTINEL_PREFIX, err)
}

#[derive(Clone)]
pub struct FanOut {
    backend: Arc<dyn GenerationBackend>,
    system_prompt: Arc<str>,
    timeout: Duration,
}

impl FanOut {
    pub fn new(backend: Arc<dyn GenerationBackend>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: Arc::from(system_prompt.into()),
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Runs every prompt concurrently. Output index `i` is always the
    /// response (or error sentinel) for prompt `i`.
    ///
    /// Fails only when the batch has no non-empty prompt.
    pub async fn invoke(&self, prompts: &[String]) -> Result<Vec<String>, FanOutError> {
        if prompts.iter().all(|p| p.trim().is_empty()) {
            return Err(FanOutError::EmptyBatch);
        }

        let batch_start = Instant::now();
        let total = prompts.len();

        let slots = prompts.iter().enumerate().map(|(slot, prompt)| {
            let backend = self.backend.clone();
            let system_prompt = self.system_prompt.clone();
            let prompt = prompt.clone();
            let limit = self.timeout;

            async move {
                if prompt.trim().is_empty() {
                    return Err(GenerationError::EmptyPrompt);
                }

                // Dispatched calls outlive an abandoned request.
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = match tokio::time::timeout(
                        limit,
                        backend.generate(&system_prompt, &prompt),
                    )
                    .await
                    {
                        Ok(inner) => inner,
                        Err(_) => Err(GenerationError::Timeout(limit.as_secs())),
                    };
                    tracing::debug!(
                        slot = slot,
                        total = total,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        ok = result.is_ok(),
                        "Generation slot finished"
                    );
                    result
                });

                match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(GenerationError::Backend(format!(
                        "generation task aborted: {}",
                        e
                    ))),
                }
            }
        });

        let outputs: Vec<String> = join_all(slots)
            .await
            .into_iter()
            .enumerate()
            .map(|(slot, result)| match result {
                Ok(text) => text,
                Err(e) => {
                    metrics::counter!("generation_slot_failures_total").increment(1);
                    tracing::warn!(slot = slot, error = %e, "Generation slot failed");
                    sentinel(&e)
                }
            })
            .collect();

        tracing::info!(
            prompts = total,
            failed = outputs.iter().filter(|o| is_error_sentinel(o)).count(),
            elapsed_ms = batch_start.elapsed().as_millis() as u64,
            "Generation fan-out complete"
        );

        Ok(outputs)
    }
}

/// Scripted generation backend for development and testing.
///
/// Answers with the first rule whose needle occurs in the user prompt and
/// falls back to a fixed response otherwise.
#[derive(Debug)]
pub struct MockGenerationBackend {
    rules: Vec<(String, Result<String, String>)>,
    fallback: String,
    delay: Option<Duration>,
    configured: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: "{}".to_string(),
            delay: None,
            configured: true,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A backend reporting missing credentials.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn respond_to(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(response.into())));
        self
    }

    pub fn fail_on(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = response.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user_prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self
            .rules
            .iter()
            .find(|(needle, _)| user_prompt.contains(needle.as_str()))
        {
            Some((_, Ok(text))) => Ok(text.clone()),
            Some((_, Err(message))) => Err(GenerationError::Backend(message.clone())),
            None => Ok(self.fallback.clone()),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failed_slot_is_isolated() {
        let backend = Arc::new(
            MockGenerationBackend::new()
                .respond_to("first", "one")
                .fail_on("second", "upstream 500")
                .respond_to("third", "three"),
        );
        let fanout = FanOut::new(backend, "system");

        let out = fanout
            .invoke(&prompts(&["first", "second", "third"]))
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "one");
        assert!(is_error_sentinel(&out[1]));
        assert!(out[1].contains("upstream 500"));
        assert_eq!(out[2], "three");
    }

    #[tokio::test]
    async fn test_order_is_preserved() {
        let backend = Arc::new(
            MockGenerationBackend::new()
                .respond_to("a", "A")
                .respond_to("b", "B")
                .respond_to("c", "C")
                .respond_to("d", "D"),
        );
        let out = FanOut::new(backend, "system")
            .invoke(&prompts(&["d", "b", "a", "c"]))
            .await
            .unwrap();
        assert_eq!(out, vec!["D", "B", "A", "C"]);
    }

    #[tokio::test]
    async fn test_slots_run_concurrently() {
        let backend = Arc::new(MockGenerationBackend::new().with_delay(Duration::from_millis(300)));
        let fanout = FanOut::new(backend.clone(), "system");

        let started = Instant::now();
        let out = fanout.invoke(&prompts(&["x", "y", "z"])).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(backend.call_count(), 3);
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_timeout_becomes_sentinel() {
        let backend = Arc::new(MockGenerationBackend::new().with_delay(Duration::from_secs(5)));
        let fanout = FanOut::new(backend, "system").with_timeout(Duration::from_millis(50));

        let out = fanout.invoke(&prompts(&["slow"])).await.unwrap();
        assert!(is_error_sentinel(&out[0]));
        assert!(out[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_batch_fails() {
        let backend = Arc::new(MockGenerationBackend::new());
        let fanout = FanOut::new(backend.clone(), "system");

        assert_eq!(fanout.invoke(&[]).await, Err(FanOutError::EmptyBatch));
        assert_eq!(
            fanout.invoke(&prompts(&["", "   "])).await,
            Err(FanOutError::EmptyBatch)
        );
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_in_mixed_batch_skips_backend() {
        let backend = Arc::new(MockGenerationBackend::new().with_fallback("ok"));
        let fanout = FanOut::new(backend.clone(), "system");

        let out = fanout.invoke(&prompts(&["real", ""])).await.unwrap();
        assert_eq!(out[0], "ok");
        assert!(is_error_sentinel(&out[1]));
        assert_eq!(backend.call_count(), 1);
    }
}
