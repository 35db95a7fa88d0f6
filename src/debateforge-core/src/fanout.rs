//! Bounded-concurrency generation.
//!
//! Issues up to `max_concurrent_requests` generations at once, collects
//! failures without aborting siblings, and writes the gathered training
//! examples in one go at the end. Nothing is persisted per item, so a crash
//! mid-run loses the whole batch.

use std::path::PathBuf;

use futures::future::join_all;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::client::{ChatTransport, GenerationClient};
use crate::config::Config;
use crate::error::{GenerationError, PipelineError};
use crate::record::{DebateRecord, SeedQuestion, now_timestamp};
use crate::retry::Sleeper;
use crate::store::write_atomic;
use crate::training::{TrainingExample, encode_jsonl, to_training_examples};

#[derive(Debug, Default)]
pub struct FanOutReport {
    pub records: Vec<DebateRecord>,
    pub examples: Vec<TrainingExample>,
    pub failures: Vec<(String, GenerationError)>,
}

pub struct FanOutExpander<T: ChatTransport, S: Sleeper> {
    client: GenerationClient<T, S>,
    max_concurrent: usize,
    output: PathBuf,
}

impl<T: ChatTransport, S: Sleeper> FanOutExpander<T, S> {
    pub fn new(client: GenerationClient<T, S>, config: &Config) -> Self {
        Self {
            client,
            max_concurrent: config.pipeline.max_concurrent_requests.max(1),
            output: config.paths.training_output.clone(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub async fn run<R: Rng>(
        &self,
        seeds: &[SeedQuestion],
        rng: &mut R,
    ) -> Result<FanOutReport, PipelineError> {
        let permits = Semaphore::new(self.max_concurrent);
        let seeds: Vec<&SeedQuestion> =
            seeds.iter().filter(|s| !s.question.trim().is_empty()).collect();
        info!(
            questions = seeds.len(),
            concurrency = self.max_concurrent,
            "starting concurrent generation"
        );

        let tasks = seeds.iter().map(|seed| {
            let permits = &permits;
            async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = permits.acquire().await.ok();
                info!(question = %seed.question, "generating");
                (*seed, self.client.generate(&seed.question).await)
            }
        });

        let mut report = FanOutReport::default();
        for (seed, outcome) in join_all(tasks).await {
            match outcome {
                Ok(debate) => {
                    let record = DebateRecord::from_generated(debate, seed, now_timestamp());
                    report.examples.extend(to_training_examples(&record, rng));
                    report.records.push(record);
                }
                Err(err) => {
                    warn!(question = %seed.question, error = %err, "generation failed");
                    report.failures.push((seed.question.clone(), err));
                }
            }
        }

        write_atomic(&self.output, &encode_jsonl(&report.examples)?)?;
        info!(
            succeeded = report.records.len(),
            failed = report.failures.len(),
            examples = report.examples.len(),
            path = %self.output.display(),
            "saved training examples"
        );
        Ok(report)
    }
}
