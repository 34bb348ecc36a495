//! Job Dispatcher
//!
//! Single owner of the pending queue and completion bookkeeping. All state lives in
//! one tokio task that processes events one at a time; everyone else talks to it
//! through a cloneable [`DispatcherHandle`].
//!
//! The queue is a stack: the most recently enqueued job (fresh or reposted) is handed
//! out first. The dispatcher closes the moment end-of-input has been seen and no job
//! is outstanding; parked `request_work` callers are then released with `None`.

mod completion;
mod state;

pub use completion::{Completion, CompletionToken};

use crate::domain::{Command, DispatcherStats, DomainError, Job, JobId, JobResult, Tally};
use crate::port::{CommandSink, CompletionLog, IdProvider};
use async_trait::async_trait;
use completion::{completion_channel, CompletionSender};
use state::DispatchState;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

enum Event {
    Submit(Job),
    RequestWork(oneshot::Sender<Option<Job>>),
    Report(JobResult),
    EndOfInput,
    Stats(oneshot::Sender<DispatcherStats>),
}

/// Dispatcher event loop
pub struct Dispatcher {
    state: DispatchState,
    events: mpsc::UnboundedReceiver<Event>,
    /// Parked `request_work` callers, served in arrival order
    waiting: VecDeque<oneshot::Sender<Option<Job>>>,
    completion_log: Arc<dyn CompletionLog>,
    completion: CompletionSender,
}

impl Dispatcher {
    /// Start the event loop on the current tokio runtime
    ///
    /// The join handle resolves with the final tally once the dispatcher closes, with
    /// `DomainError::UnknownJob` if a proxy reported a job that was never handed out, or
    /// with `DomainError::Abandoned` if every handle went away before completion.
    pub fn spawn(
        completion_log: Arc<dyn CompletionLog>,
        id_provider: Arc<dyn IdProvider>,
    ) -> (DispatcherHandle, JoinHandle<Result<Tally, DomainError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (completion, token) = completion_channel();

        let dispatcher = Dispatcher {
            state: DispatchState::new(),
            events: rx,
            waiting: VecDeque::new(),
            completion_log,
            completion,
        };
        let handle = DispatcherHandle {
            events: tx,
            id_provider,
            completion: token,
        };

        (handle, tokio::spawn(dispatcher.run()))
    }

    async fn run(mut self) -> Result<Tally, DomainError> {
        info!("Dispatcher started");
        let outcome = self.event_loop().await;

        match &outcome {
            Ok(tally) => {
                info!(ok = tally.ok, failed = tally.failed, "All work done");
                self.completion.close(*tally);
            }
            Err(e) => {
                error!(error = %e, "Dispatcher aborted");
                self.completion.abort(e.clone());
            }
        }
        outcome
    }

    async fn event_loop(&mut self) -> Result<Tally, DomainError> {
        while let Some(event) = self.events.recv().await {
            match event {
                Event::Submit(job) => {
                    debug!(job_id = %job.id, command = %job.command, "Got post");
                    self.state.post(job);
                    self.dispatch();
                }
                Event::RequestWork(reply) => {
                    self.waiting.push_back(reply);
                    self.dispatch();
                }
                Event::Report(result) => {
                    self.record(result)?;
                    if self.state.is_complete() {
                        return Ok(self.close());
                    }
                    self.dispatch();
                }
                Event::EndOfInput => {
                    if self.state.end_of_input() {
                        info!("Got EOF");
                    } else {
                        warn!("Duplicate end-of-input ignored");
                    }
                    if self.state.is_complete() {
                        return Ok(self.close());
                    }
                }
                Event::Stats(reply) => {
                    let _ = reply.send(self.state.stats());
                }
            }
        }

        // Every handle is gone; nobody can signal EOF any more
        let outstanding = self.state.stats().outstanding;
        warn!(outstanding, "All dispatcher handles dropped before completion");
        self.close();
        Err(DomainError::Abandoned { outstanding })
    }

    /// Pair parked requesters with queued jobs
    fn dispatch(&mut self) {
        while let Some(waiter) = self.waiting.pop_front() {
            if waiter.is_closed() {
                continue;
            }
            let Some(job) = self.state.take_next() else {
                self.waiting.push_front(waiter);
                break;
            };

            let job_id = job.id.clone();
            match waiter.send(Some(job)) {
                Ok(()) => debug!(job_id = %job_id, "Sent job"),
                Err(Some(job)) => self.state.return_undelivered(job),
                Err(None) => {}
            }
        }
    }

    fn record(&mut self, result: JobResult) -> Result<(), DomainError> {
        self.state.apply(result.clone())?;

        let written = match &result {
            JobResult::Ok(job) => {
                info!(job_id = %job.id, command = %job.command, "Completed");
                self.completion_log.record_ok(&job.command)
            }
            JobResult::Fail { job, output } => {
                info!(job_id = %job.id, command = %job.command, "Failed");
                self.completion_log.record_failure(&job.command, output)
            }
            JobResult::Repost(job) => {
                info!(job_id = %job.id, command = %job.command, "Reposted");
                Ok(())
            }
        };

        if let Err(e) = written {
            error!(job_id = %result.job().id, error = %e, "Failed to write completion log");
        }
        Ok(())
    }

    fn close(&mut self) -> Tally {
        for waiter in self.waiting.drain(..) {
            let _ = waiter.send(None);
        }
        self.events.close();
        self.state.close()
    }
}

/// Cloneable access to a running dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    events: mpsc::UnboundedSender<Event>,
    id_provider: Arc<dyn IdProvider>,
    completion: CompletionToken,
}

impl DispatcherHandle {
    /// Enqueue a command; never waits on the event loop
    ///
    /// # Errors
    /// - DomainError::DispatcherClosed once the dispatcher has stopped
    pub fn submit(&self, command: impl Into<Command>) -> Result<JobId, DomainError> {
        let job = Job::new(self.id_provider.generate_id(), command);
        let job_id = job.id.clone();
        self.events
            .send(Event::Submit(job))
            .map_err(|_| DomainError::DispatcherClosed)?;
        Ok(job_id)
    }

    /// Wait for the next job; `None` means the dispatcher has closed
    pub async fn request_work(&self) -> Option<Job> {
        let (tx, rx) = oneshot::channel();
        self.events.send(Event::RequestWork(tx)).ok()?;
        rx.await.ok().flatten()
    }

    /// # Errors
    /// - DomainError::DispatcherClosed once the dispatcher has stopped
    pub fn report_result(&self, result: JobResult) -> Result<(), DomainError> {
        self.events
            .send(Event::Report(result))
            .map_err(|_| DomainError::DispatcherClosed)
    }

    /// # Errors
    /// - DomainError::DispatcherClosed once the dispatcher has stopped
    pub fn signal_end_of_input(&self) -> Result<(), DomainError> {
        self.events
            .send(Event::EndOfInput)
            .map_err(|_| DomainError::DispatcherClosed)
    }

    /// Snapshot of the bookkeeping; after close, the final counts
    pub async fn stats(&self) -> DispatcherStats {
        let (tx, rx) = oneshot::channel();
        if self.events.send(Event::Stats(tx)).is_ok() {
            if let Ok(stats) = rx.await {
                return stats;
            }
        }

        let tally = match self.completion.current() {
            Completion::Closed(tally) => tally,
            _ => Tally::default(),
        };
        DispatcherStats {
            ok: tally.ok,
            failed: tally.failed,
            got_eof: true,
            closed: true,
            ..Default::default()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.completion.is_closed()
    }

    /// Wait until the dispatcher closes and return the final tally
    pub async fn closed(&self) -> Result<Tally, DomainError> {
        self.completion.clone().wait().await
    }
}

#[async_trait]
impl CommandSink for DispatcherHandle {
    async fn submit(&self, command: Command) -> crate::error::Result<JobId> {
        Ok(DispatcherHandle::submit(self, command)?)
    }

    async fn signal_end_of_input(&self) -> crate::error::Result<()> {
        Ok(DispatcherHandle::signal_end_of_input(self)?)
    }
}
