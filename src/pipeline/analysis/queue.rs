//! Serialized, rate-limited dispatch of analysis requests.
//!
//! All provider traffic funnels through one worker thread: jobs run
//! strictly in submission order and a fixed delay separates consecutive
//! requests, keeping the pipeline inside provider rate limits no matter
//! how many documents a run discovers. Enqueueing never blocks; callers
//! hold a receiver and wait only when they need the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::provider::{AnalysisProvider, ProviderAnalysis};
use super::{AnalysisError, AnalysisPrompt};

/// How often the worker wakes to check the shutdown flag while idle.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// An analysis result plus the name of the provider that produced it.
pub type QueuedResult = Result<(ProviderAnalysis, String), AnalysisError>;

struct Job {
    prompt: AnalysisPrompt,
    reply: mpsc::Sender<QueuedResult>,
}

pub struct AnalysisQueue {
    tx: mpsc::Sender<Job>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisQueue {
    /// Spawn the worker owning the provider preference list.
    pub fn start(providers: Vec<Box<dyn AnalysisProvider>>, delay_ms: u64) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);
        let delay = Duration::from_millis(delay_ms);

        let handle = thread::Builder::new()
            .name("analysis-queue".to_string())
            .spawn(move || {
                tracing::info!(providers = providers.len(), "Analysis queue started");
                loop {
                    if worker_shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    let job = match rx.recv_timeout(IDLE_POLL) {
                        Ok(job) => job,
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    };

                    let result = analyze_with_fallback(&providers, &job.prompt);
                    // The caller may have given up waiting; that is fine.
                    let _ = job.reply.send(result);

                    thread::sleep(delay);
                }
                tracing::info!("Analysis queue stopped");
            })
            .expect("Failed to spawn analysis queue thread");

        Self {
            tx,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Submit a prompt without blocking. The returned receiver yields the
    /// result once the worker reaches this job.
    pub fn enqueue(&self, prompt: AnalysisPrompt) -> mpsc::Receiver<QueuedResult> {
        let (reply_tx, reply_rx) = mpsc::channel();

        let job = Job {
            prompt,
            reply: reply_tx.clone(),
        };
        if self.tx.send(job).is_err() {
            // Worker already gone; answer the caller directly.
            let _ = reply_tx.send(Err(AnalysisError::QueueClosed));
        }

        reply_rx
    }
}

impl Drop for AnalysisQueue {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Try each provider in preference order; the first success wins, the
/// last failure is the error reported.
pub fn analyze_with_fallback(
    providers: &[Box<dyn AnalysisProvider>],
    prompt: &AnalysisPrompt,
) -> QueuedResult {
    if providers.is_empty() {
        return Err(AnalysisError::NoProviderConfigured);
    }

    let mut last_error = AnalysisError::NoProviderConfigured;
    for provider in providers {
        match provider.analyze(prompt) {
            Ok(analysis) => return Ok((analysis, provider.name().to_string())),
            Err(e) => {
                tracing::warn!(provider = provider.name(), error = %e, "Provider failed, trying next");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::provider::MockProvider;

    fn prompt() -> AnalysisPrompt {
        AnalysisPrompt {
            system: String::new(),
            user: "fragmento".to_string(),
            fragment_count: 1,
        }
    }

    #[test]
    fn jobs_complete_in_submission_order() {
        let queue = AnalysisQueue::start(vec![Box::new(MockProvider::new())], 0);

        let first = queue.enqueue(prompt());
        let second = queue.enqueue(prompt());

        let (_, name) = first.recv().unwrap().unwrap();
        assert_eq!(name, "mock-analyst");
        assert!(second.recv().unwrap().is_ok());
    }

    #[test]
    fn fallback_reaches_second_provider() {
        let providers: Vec<Box<dyn AnalysisProvider>> =
            vec![Box::new(MockProvider::failing()), Box::new(MockProvider::new())];

        let result = analyze_with_fallback(&providers, &prompt());
        assert!(result.is_ok());
    }

    #[test]
    fn all_providers_failing_reports_last_error() {
        let providers: Vec<Box<dyn AnalysisProvider>> =
            vec![Box::new(MockProvider::failing()), Box::new(MockProvider::failing())];

        let err = analyze_with_fallback(&providers, &prompt()).unwrap_err();
        assert!(matches!(err, AnalysisError::Connection(_)));
    }

    #[test]
    fn no_providers_is_a_configuration_error() {
        let err = analyze_with_fallback(&[], &prompt()).unwrap_err();
        assert!(matches!(err, AnalysisError::NoProviderConfigured));
    }

    #[test]
    fn drop_joins_the_worker() {
        let queue = AnalysisQueue::start(vec![Box::new(MockProvider::new())], 0);
        let rx = queue.enqueue(prompt());
        assert!(rx.recv().unwrap().is_ok());
        drop(queue); // must not hang
    }

    #[test]
    fn delay_spaces_consecutive_jobs() {
        let queue = AnalysisQueue::start(vec![Box::new(MockProvider::new())], 80);

        let start = std::time::Instant::now();
        let first = queue.enqueue(prompt());
        let second = queue.enqueue(prompt());
        first.recv().unwrap().unwrap();
        second.recv().unwrap().unwrap();

        // The second result cannot arrive before the inter-job delay.
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
