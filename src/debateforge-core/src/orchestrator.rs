//! Expansion orchestration logic.
//!
//! Drives seed questions through generation in batches, paces requests,
//! retries whole generations and persists the dataset after every success.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::client::{ChatTransport, GenerationClient};
use crate::config::{Config, PipelineConfig};
use crate::error::{GenerationError, PipelineError};
use crate::record::{DebateRecord, SeedQuestion, now_timestamp};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::store::DatasetStore;

/// Callback for expansion events.
pub type ExpansionCallback = Box<dyn Fn(ExpansionEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum ExpansionEvent {
    /// Prior dataset loaded and seeds filtered.
    RunStart { existing: usize, pending: usize },
    BatchStart { number: usize, total: usize, size: usize },
    QuestionStart { question: String },
    QuestionCompleted { question: String, total_records: usize },
    /// Every generation attempt failed; the question stays unprocessed.
    QuestionExhausted { question: String, error: String },
    BatchEnd { number: usize, completed: usize },
    RunEnd { summary: RunSummary },
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub seeds: usize,
    /// Seeds skipped because the dataset already holds them.
    pub already_processed: usize,
    /// Seeds skipped for an empty question text.
    pub empty: usize,
    pub attempted: usize,
    pub completed: usize,
    pub exhausted: usize,
    pub total_records: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Orchestrates the expansion of seed questions into the dataset.
pub struct ExpansionOrchestrator<T: ChatTransport, S: Sleeper = TokioSleeper> {
    client: GenerationClient<T, S>,
    store: DatasetStore,
    sleeper: S,
    pipeline: PipelineConfig,
    min_questions: usize,
    retry: RetryPolicy,
    /// Accumulated dataset, prior records first.
    records: Vec<DebateRecord>,
    /// Question texts present in `records`.
    processed: HashSet<String>,
    /// Records count at the last successful save.
    saved_len: usize,
    stop: Arc<AtomicBool>,
    callback: Option<ExpansionCallback>,
}

impl<T: ChatTransport, S: Sleeper + Clone> ExpansionOrchestrator<T, S> {
    /// Create a new orchestrator; `sleeper` paces requests and outer retries.
    pub fn new(
        client: GenerationClient<T, S>,
        store: DatasetStore,
        config: &Config,
        sleeper: S,
    ) -> Self {
        Self {
            client,
            store,
            sleeper,
            pipeline: config.pipeline.clone(),
            min_questions: config.validation.min_questions,
            retry: config.pipeline.generation_retry(),
            records: Vec::new(),
            processed: HashSet::new(),
            saved_len: 0,
            stop: Arc::new(AtomicBool::new(false)),
            callback: None,
        }
    }

    /// Set a callback for expansion events.
    pub fn with_callback(mut self, callback: ExpansionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Flag checked before each question; setting it ends the run early.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn client(&self) -> &GenerationClient<T, S> {
        &self.client
    }

    /// The accumulated dataset.
    pub fn records(&self) -> &[DebateRecord] {
        &self.records
    }

    /// Run the full expansion.
    ///
    /// Fails only on conditions that make the dataset state unknown: a
    /// corrupt existing file or a failed save.
    pub async fn run(&mut self, seeds: &[SeedQuestion]) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            seeds: seeds.len(),
            ..RunSummary::default()
        };

        self.records = self.store.load()?;
        self.processed = self.records.iter().map(|r| r.question.clone()).collect();
        self.saved_len = self.records.len();

        if seeds.len() < self.min_questions {
            warn!(
                seeds = seeds.len(),
                min_questions = self.min_questions,
                "not enough seed questions, nothing to do"
            );
            return Ok(self.finish(summary, started));
        }

        let pending: Vec<&SeedQuestion> = seeds
            .iter()
            .filter(|seed| {
                if seed.question.trim().is_empty() {
                    warn!("skipping seed with empty question");
                    summary.empty += 1;
                    false
                } else if self.processed.contains(&seed.question) {
                    summary.already_processed += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        info!(
            existing = self.records.len(),
            pending = pending.len(),
            "starting expansion"
        );
        self.emit_event(ExpansionEvent::RunStart {
            existing: self.records.len(),
            pending: pending.len(),
        });

        let batch_size = self.pipeline.batch_size.max(1);
        let total_batches = pending.len().div_ceil(batch_size);

        'batches: for (index, batch) in pending.chunks(batch_size).enumerate() {
            let number = index + 1;
            info!(batch = number, total = total_batches, size = batch.len(), "processing batch");
            self.emit_event(ExpansionEvent::BatchStart {
                number,
                total: total_batches,
                size: batch.len(),
            });

            let mut completed_in_batch = 0;
            for (position, seed) in batch.iter().enumerate() {
                if self.stop.load(Ordering::SeqCst) {
                    warn!("interrupt requested, stopping before next question");
                    summary.interrupted = true;
                    break 'batches;
                }
                // A repeated seed in the same run completes only once.
                if self.processed.contains(&seed.question) {
                    summary.already_processed += 1;
                    continue;
                }

                summary.attempted += 1;
                if self.expand_one(seed).await? {
                    summary.completed += 1;
                    completed_in_batch += 1;
                } else {
                    summary.exhausted += 1;
                }

                if position + 1 < batch.len() {
                    let wait = self.pipeline.jitter().apply(self.pipeline.request_delay());
                    self.sleeper.sleep(wait).await;
                }
            }

            info!(
                batch = number,
                completed = completed_in_batch,
                total_records = self.records.len(),
                "batch finished"
            );
            self.emit_event(ExpansionEvent::BatchEnd {
                number,
                completed: completed_in_batch,
            });

            if number < total_batches {
                let wait = self.pipeline.batch_delay();
                info!(wait_secs = wait.as_secs_f64(), "waiting before next batch");
                self.sleeper.sleep(wait).await;
            }
        }

        if self.records.len() != self.saved_len {
            self.persist()?;
        }

        Ok(self.finish(summary, started))
    }

    /// Generate one question with outer retries; `Ok(false)` means exhausted.
    async fn expand_one(&mut self, seed: &SeedQuestion) -> Result<bool, PipelineError> {
        let question = seed.question.as_str();
        info!(%question, "expanding question");
        self.emit_event(ExpansionEvent::QuestionStart {
            question: question.to_string(),
        });

        let client = &self.client;
        let outcome = self
            .retry
            .run(
                &self.sleeper,
                "generation",
                |_: &GenerationError| true,
                |_| client.generate(question),
            )
            .await;

        match outcome {
            Ok(debate) => {
                let record = DebateRecord::from_generated(debate, seed, now_timestamp());
                self.processed.insert(record.question.clone());
                self.records.push(record);
                self.persist()?;
                self.emit_event(ExpansionEvent::QuestionCompleted {
                    question: question.to_string(),
                    total_records: self.records.len(),
                });
                Ok(true)
            }
            Err(err) => {
                error!(
                    %question,
                    attempts = self.retry.max_attempts,
                    error = %err,
                    "failed to expand question"
                );
                self.emit_event(ExpansionEvent::QuestionExhausted {
                    question: question.to_string(),
                    error: err.to_string(),
                });
                Ok(false)
            }
        }
    }

    fn persist(&mut self) -> Result<(), PipelineError> {
        self.store.save(&self.records)?;
        self.saved_len = self.records.len();
        Ok(())
    }

    fn finish(&self, mut summary: RunSummary, started: Instant) -> RunSummary {
        summary.total_records = self.records.len();
        summary.elapsed = started.elapsed();
        info!(
            elapsed_mins = summary.elapsed.as_secs_f64() / 60.0,
            attempted = summary.attempted,
            completed = summary.completed,
            exhausted = summary.exhausted,
            total_records = summary.total_records,
            "expansion finished"
        );
        self.emit_event(ExpansionEvent::RunEnd {
            summary: summary.clone(),
        });
        summary
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: ExpansionEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
