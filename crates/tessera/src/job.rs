//! Batch extraction with bounded concurrency.
//!
//! ```text
//! inputs ──► tokio::spawn per file ──► Semaphore permit
//!                                        │
//!                              spawn_blocking(pipeline)
//!                                        │
//!                 timeout / job cancel / done ──► index.insert
//! ```
//!
//! Each file runs on the blocking pool under its own child cancellation
//! token. A file that exceeds its budget has its token cancelled and its
//! partial result discarded; the permit is released only once the pipeline
//! has actually stopped, so at most `maxConcurrency` pipelines ever run.
//! Results come back in input order.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::ExtractorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsCollector};
use crate::error::Result;
use crate::extract::{ExtractionInput, ExtractionOutput, Extractor, OutputRecord};
use crate::index::ExtractionIndex;
use crate::types::Language;

/// Final state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Every file finished without error-severity diagnostics
    Completed,
    /// Every file was attempted; some produced errors or timed out
    CompletedWithErrors,
    /// The job was cancelled before every file finished
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithErrors => write!(f, "completed with errors"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One result per input, in input order
    pub results: Vec<ExtractionOutput>,
    /// Overall status
    pub status: JobStatus,
    /// Job-level diagnostics (timeouts, failures, cancellation)
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutcome {
    /// Serializable form.
    #[must_use]
    pub fn to_record(&self) -> BatchRecord {
        BatchRecord {
            results: self.results.iter().map(ExtractionOutput::to_record).collect(),
            status: self.status,
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Stable serialized form of a [`BatchOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    /// Per-file records in input order
    pub results: Vec<OutputRecord>,
    /// Overall status
    pub status: JobStatus,
    /// Job-level diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

/// A batch extraction feeding one index.
#[derive(Debug)]
pub struct ExtractionJob {
    extractor: Arc<Extractor>,
    index: Arc<ExtractionIndex>,
    max_concurrency: usize,
    per_file_timeout: Duration,
    cancel: CancellationToken,
}

/// How one file's pipeline ended.
enum FileEnd {
    Done(Option<ExtractionOutput>),
    TimedOut,
    Cancelled,
    Failed(String),
}

impl ExtractionJob {
    /// Create a job.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` fails validation.
    pub fn new(
        extractor: Arc<Extractor>,
        index: Arc<ExtractionIndex>,
        config: &ExtractorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor,
            index,
            max_concurrency: config.max_concurrency,
            per_file_timeout: config.per_file_timeout(),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that cancels this job when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the job. Files already inserted stay in the index.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The index this job inserts into.
    #[must_use]
    pub fn index(&self) -> &Arc<ExtractionIndex> {
        &self.index
    }

    /// Extract every input and insert the finished tables into the index.
    ///
    /// Per-file failures, including a panicking adapter, become diagnostics
    /// on that file's result. Every task is awaited before this returns.
    pub async fn run(&self, inputs: impl IntoIterator<Item = ExtractionInput>) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let job_diagnostics = DiagnosticsCollector::new();

        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let id = input.id.clone();
                let language = self.extractor.classify(&input);
                let task = FileTask {
                    extractor: Arc::clone(&self.extractor),
                    index: Arc::clone(&self.index),
                    semaphore: Arc::clone(&semaphore),
                    job_cancel: self.cancel.clone(),
                    budget: self.per_file_timeout,
                    job_diagnostics: job_diagnostics.clone(),
                };
                (id, language, tokio::spawn(task.run(input, language)))
            })
            .collect();

        tracing::info!(
            files = handles.len(),
            max_concurrency = self.max_concurrency,
            "Starting extraction job"
        );

        let mut results = Vec::with_capacity(handles.len());
        for (id, language, handle) in handles {
            let output = match handle.await {
                Ok(output) => output,
                Err(err) => {
                    tracing::error!(source = %id, error = %err, "File task failed");
                    let diagnostic = Diagnostic::extraction_failed(&id, &err);
                    job_diagnostics.add(diagnostic.clone());
                    ExtractionOutput::empty(&id, language, vec![diagnostic])
                }
            };
            results.push(output);
        }

        let status = if self.cancel.is_cancelled() {
            let unfinished = results
                .iter()
                .filter(|result| result.count(DiagnosticKind::Cancelled) > 0)
                .count();
            job_diagnostics.add(Diagnostic::new(
                DiagnosticKind::Cancelled,
                format!(
                    "job cancelled before {unfinished} of {} files finished",
                    results.len()
                ),
            ));
            JobStatus::Cancelled
        } else if !job_diagnostics.is_empty() || results.iter().any(ExtractionOutput::has_errors) {
            JobStatus::CompletedWithErrors
        } else {
            JobStatus::Completed
        };

        tracing::info!(
            files = results.len(),
            %status,
            job_diagnostics = job_diagnostics.len(),
            "Extraction job finished"
        );
        BatchOutcome {
            results,
            status,
            diagnostics: job_diagnostics.take(),
        }
    }
}

/// Shared handles one spawned file task needs.
struct FileTask {
    extractor: Arc<Extractor>,
    index: Arc<ExtractionIndex>,
    semaphore: Arc<Semaphore>,
    job_cancel: CancellationToken,
    budget: Duration,
    job_diagnostics: DiagnosticsCollector,
}

impl FileTask {
    async fn run(self, input: ExtractionInput, language: Language) -> ExtractionOutput {
        let id = input.id.clone();

        let permit = tokio::select! {
            biased;
            () = self.job_cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            return ExtractionOutput::empty(&id, language, vec![Diagnostic::cancelled(&id)]);
        };

        let file_cancel = self.job_cancel.child_token();
        let pipeline = tokio::task::spawn_blocking({
            let extractor = Arc::clone(&self.extractor);
            let token = file_cancel.clone();
            move || {
                let _permit = permit;
                extractor.extract_cancellable(&input, &token)
            }
        });

        let end = tokio::select! {
            biased;
            () = self.job_cancel.cancelled() => FileEnd::Cancelled,
            joined = tokio::time::timeout(self.budget, pipeline) => match joined {
                Ok(Ok(output)) => FileEnd::Done(output),
                Ok(Err(err)) => FileEnd::Failed(err.to_string()),
                Err(_) => FileEnd::TimedOut,
            },
        };

        // The parser enforces the same budget and reports it in-band.
        let end = match end {
            FileEnd::Done(Some(output)) if output.count(DiagnosticKind::Timeout) > 0 => {
                FileEnd::TimedOut
            }
            other => other,
        };

        match end {
            FileEnd::Done(Some(output)) if !self.job_cancel.is_cancelled() => {
                self.index.insert(Arc::clone(&output.symbol_table));
                output
            }
            FileEnd::Done(_) | FileEnd::Cancelled => {
                file_cancel.cancel();
                tracing::debug!(source = %id, "Cancelled before completion");
                ExtractionOutput::empty(&id, language, vec![Diagnostic::cancelled(&id)])
            }
            FileEnd::TimedOut => {
                file_cancel.cancel();
                tracing::warn!(
                    source = %id,
                    budget_ms = self.budget.as_millis(),
                    "File exceeded its time budget"
                );
                let diagnostic = Diagnostic::timeout(&id, self.budget);
                self.job_diagnostics.add(diagnostic.clone());
                ExtractionOutput::empty(&id, language, vec![diagnostic])
            }
            FileEnd::Failed(reason) => {
                file_cancel.cancel();
                tracing::error!(source = %id, %reason, "Extraction pipeline failed");
                let diagnostic = Diagnostic::extraction_failed(&id, &reason);
                self.job_diagnostics.add(diagnostic.clone());
                ExtractionOutput::empty(&id, language, vec![diagnostic])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AdapterRegistry;

    fn job(config: &ExtractorConfig) -> ExtractionJob {
        let extractor = Extractor::new(Arc::new(AdapterRegistry::with_builtin()), config);
        ExtractionJob::new(Arc::new(extractor), Arc::new(ExtractionIndex::new()), config)
            .expect("valid config")
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let job = job(&ExtractorConfig::default().with_max_concurrency(2));
        let inputs = (0..6).map(|i| {
            ExtractionInput::text(format!("m{i}.py"), format!("def f{i}():\n    pass\n"))
        });
        let outcome = job.run(inputs).await;
        let ids: Vec<_> = outcome
            .results
            .iter()
            .map(|r| r.symbol_table.source_id().to_string())
            .collect();
        assert_eq!(ids, ["m0.py", "m1.py", "m2.py", "m3.py", "m4.py", "m5.py"]);
        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(job.index().len(), 6);
    }

    #[tokio::test]
    async fn file_errors_mark_the_job() {
        let job = job(&ExtractorConfig::default());
        let outcome = job
            .run([
                ExtractionInput::text("ok.py", "x = 1\n"),
                ExtractionInput::text("notes.txt", "hello"),
            ])
            .await;
        assert_eq!(outcome.status, JobStatus::CompletedWithErrors);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.results[1].count(DiagnosticKind::UnsupportedLanguage), 1);
    }

    #[tokio::test]
    async fn cancelled_job_inserts_nothing() {
        let job = job(&ExtractorConfig::default());
        job.cancel();
        let outcome = job
            .run([ExtractionInput::text("a.rs", "fn a() {}\n")])
            .await;
        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.results[0].count(DiagnosticKind::Cancelled), 1);
        assert!(job.index().is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].message.contains("1 of 1"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ExtractorConfig::default().with_max_concurrency(0);
        let extractor = Extractor::new(Arc::new(AdapterRegistry::with_builtin()), &config);
        let index = Arc::new(ExtractionIndex::new());
        assert!(ExtractionJob::new(Arc::new(extractor), index, &config).is_err());
    }

    #[test]
    fn status_serializes_in_camel_case() {
        let json = serde_json::to_string(&JobStatus::CompletedWithErrors).expect("serialize");
        assert_eq!(json, "\"completedWithErrors\"");
    }
}
