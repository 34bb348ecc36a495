// Dispatcher bookkeeping
// Only ever touched from the dispatcher event loop, so no locking here.

use crate::domain::{Command, DispatcherStats, DomainError, Job, JobId, JobResult, Tally};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    /// Pending jobs; the top of the stack is handed out first
    queue: Vec<Job>,
    in_flight: HashMap<JobId, Command>,
    /// posted - resolved
    outstanding: u64,
    tally: Tally,
    reposted: u64,
    got_eof: bool,
    closed: bool,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, job: Job) {
        self.outstanding += 1;
        self.queue.push(job);
    }

    /// Pop the most recent job and mark it in flight
    pub fn take_next(&mut self) -> Option<Job> {
        let job = self.queue.pop()?;
        self.in_flight.insert(job.id.clone(), job.command.clone());
        Some(job)
    }

    /// The requester vanished before the job reached it
    pub fn return_undelivered(&mut self, job: Job) {
        self.in_flight.remove(&job.id);
        self.queue.push(job);
    }

    /// Apply a proxy's report
    ///
    /// # Errors
    /// - DomainError::UnknownJob if the job is not in flight
    pub fn apply(&mut self, result: JobResult) -> Result<(), DomainError> {
        let job_id = result.job().id.clone();
        if self.in_flight.remove(&job_id).is_none() {
            return Err(DomainError::UnknownJob(job_id));
        }

        match result {
            JobResult::Ok(_) => {
                self.tally.ok += 1;
                self.outstanding -= 1;
            }
            JobResult::Fail { .. } => {
                self.tally.failed += 1;
                self.outstanding -= 1;
            }
            JobResult::Repost(job) => {
                self.reposted += 1;
                self.queue.push(job);
            }
        }
        Ok(())
    }

    /// Returns false if EOF had already been seen
    pub fn end_of_input(&mut self) -> bool {
        !std::mem::replace(&mut self.got_eof, true)
    }

    /// EOF seen and nothing outstanding
    pub fn is_complete(&self) -> bool {
        self.got_eof && self.outstanding == 0
    }

    pub fn close(&mut self) -> Tally {
        self.closed = true;
        self.tally()
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            outstanding: self.outstanding,
            queued: self.queue.len(),
            in_flight: self.in_flight.len(),
            ok: self.tally.ok,
            failed: self.tally.failed,
            reposted: self.reposted,
            got_eof: self.got_eof,
            closed: self.closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, cmd: &str) -> Job {
        Job::new(id, cmd)
    }

    fn assert_conserved(state: &DispatchState, submitted: u64) {
        let stats = state.stats();
        assert_eq!(stats.ok + stats.failed + stats.outstanding, submitted);
        assert_eq!(stats.queued + stats.in_flight, stats.outstanding as usize);
    }

    #[test]
    fn test_stack_order() {
        let mut state = DispatchState::new();
        state.post(job("1", "a"));
        state.post(job("2", "b"));
        state.post(job("3", "c"));

        assert_eq!(state.take_next().unwrap().id, "3");
        assert_eq!(state.take_next().unwrap().id, "2");
        state.post(job("4", "d"));
        assert_eq!(state.take_next().unwrap().id, "4");
        assert_eq!(state.take_next().unwrap().id, "1");
        assert!(state.take_next().is_none());
    }

    #[test]
    fn test_repost_goes_to_top_and_stays_outstanding() {
        let mut state = DispatchState::new();
        state.post(job("1", "a"));
        state.post(job("2", "b"));

        let taken = state.take_next().unwrap();
        assert_eq!(taken.id, "2");
        state.apply(JobResult::Repost(taken)).unwrap();

        assert_eq!(state.stats().outstanding, 2);
        assert_eq!(state.stats().reposted, 1);
        assert_eq!(state.tally(), Tally::default());
        assert_eq!(state.take_next().unwrap().id, "2");
        assert_conserved(&state, 2);
    }

    #[test]
    fn test_terminal_results_conserve_total() {
        let mut state = DispatchState::new();
        for i in 0..6 {
            state.post(job(&i.to_string(), "x"));
        }
        assert_conserved(&state, 6);

        let mut n = 0;
        while let Some(j) = state.take_next() {
            let result = match n % 3 {
                0 => JobResult::Ok(j),
                1 => JobResult::Fail {
                    job: j,
                    output: "boom".to_string(),
                },
                _ => JobResult::Ok(j),
            };
            state.apply(result).unwrap();
            assert_conserved(&state, 6);
            n += 1;
        }

        assert_eq!(state.tally(), Tally { ok: 4, failed: 2 });
        assert_eq!(state.stats().outstanding, 0);
    }

    #[test]
    fn test_unknown_job_rejected_without_touching_counts() {
        let mut state = DispatchState::new();
        state.post(job("1", "a"));

        let err = state.apply(JobResult::Ok(job("ghost", "a"))).unwrap_err();
        assert_eq!(err, DomainError::UnknownJob("ghost".to_string()));
        assert_eq!(state.stats().outstanding, 1);
        assert_eq!(state.tally(), Tally::default());
    }

    #[test]
    fn test_double_report_rejected() {
        let mut state = DispatchState::new();
        state.post(job("1", "a"));
        let j = state.take_next().unwrap();
        state.apply(JobResult::Ok(j.clone())).unwrap();

        assert!(state.apply(JobResult::Ok(j)).is_err());
        assert_eq!(state.tally().ok, 1);
    }

    #[test]
    fn test_completion_requires_eof_and_zero_outstanding() {
        let mut state = DispatchState::new();
        assert!(!state.is_complete());

        state.post(job("1", "a"));
        assert!(state.end_of_input());
        assert!(!state.is_complete());

        let j = state.take_next().unwrap();
        state.apply(JobResult::Ok(j)).unwrap();
        assert!(state.is_complete());
    }

    #[test]
    fn test_end_of_input_only_once() {
        let mut state = DispatchState::new();
        assert!(state.end_of_input());
        assert!(!state.end_of_input());
        assert!(state.is_complete());
    }

    #[test]
    fn test_undelivered_job_returns_to_queue() {
        let mut state = DispatchState::new();
        state.post(job("1", "a"));
        let j = state.take_next().unwrap();
        state.return_undelivered(j);

        let stats = state.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.outstanding, 1);
    }
}
