//! Cooperative runner lifecycle and the race harness.
//!
//! A [`Runner`] is a long-running, resumable computation: [`Runner::run`]
//! works until it either completes or observes a stop request through its
//! [`StopToken`]. A [`Race`] owns several runners and executes them in
//! parallel threads; the first runner to declare itself finished wins, and
//! every other runner is asked to stop.
//!
//! # Cancellation
//! Cancellation is cooperative: runners poll their token at natural bounded
//! units of work (a batch of insertions, a relation trace, a stack-clearing
//! step), never mid-update, so a stopped runner always leaves its state
//! consistent and can be resumed by another call to `run`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::Error;

#[derive(Debug, Default)]
struct StopInner {
    stop: AtomicBool,
    timed_out: AtomicBool,
    has_deadline: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

/// A shared flag used to request that a runner stop, plus an optional
/// deadline that trips the flag automatically.
///
/// Cloning yields a handle to the same flag. Requesting a stop is
/// idempotent.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

impl StopToken {
    /// Creates a fresh token that never stops until asked to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the owner of this token to stop at its next poll.
    pub fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
    }

    /// Resets the stop and timeout flags so the runner can be restarted.
    /// Any deadline remains in force.
    pub fn clear(&self) {
        self.inner.stop.store(false, Ordering::Release);
        self.inner.timed_out.store(false, Ordering::Release);
    }

    /// Sets an absolute deadline; the stop flag trips once it has passed.
    pub fn set_deadline(&self, deadline: Instant) {
        *self.inner.deadline.lock().unwrap() = Some(deadline);
        self.inner.has_deadline.store(true, Ordering::Release);
    }

    /// Removes the deadline, if any.
    pub fn clear_deadline(&self) {
        *self.inner.deadline.lock().unwrap() = None;
        self.inner.has_deadline.store(false, Ordering::Release);
    }

    /// Returns `true` if a stop was requested or the deadline has passed.
    ///
    /// This is the poll sites' entry point; it is cheap when no deadline is
    /// set.
    pub fn should_stop(&self) -> bool {
        if self.inner.stop.load(Ordering::Acquire) {
            return true;
        }
        if self.inner.has_deadline.load(Ordering::Acquire) {
            let deadline = *self.inner.deadline.lock().unwrap();
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    self.inner.timed_out.store(true, Ordering::Release);
                    self.inner.stop.store(true, Ordering::Release);
                    return true;
                }
            }
        }
        false
    }

    /// Returns `true` if a stop was explicitly requested.
    pub fn stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// Returns `true` if the deadline fired.
    pub fn timed_out(&self) -> bool {
        self.inner.timed_out.load(Ordering::Acquire)
    }
}

/// The uniform lifecycle shared by every long-running computation in the
/// crate.
///
/// Apart from [`Runner::run`], every method is a non-blocking inspection.
pub trait Runner: Send {
    /// Works until finished or until the stop token fires. Calling `run`
    /// again after it has finished is a no-op; calling it after a stop
    /// resumes from the preserved state.
    fn run(&mut self);

    /// Returns `true` if the computation ran to completion (not merely
    /// returned).
    fn finished(&self) -> bool;

    /// Returns `true` if the runner can never finish (for example after an
    /// internal overflow); a dead runner is skipped when classifying a race.
    fn dead(&self) -> bool {
        false
    }

    /// The token polled by this runner's `run` loop.
    fn stop_token(&self) -> &StopToken;

    /// Asks the runner to stop at its next poll.
    fn request_stop(&self) {
        self.stop_token().request_stop();
    }

    /// Returns `true` if this runner stopped because its deadline fired.
    fn timed_out(&self) -> bool {
        self.stop_token().timed_out()
    }

    /// Gives the runner an absolute deadline.
    fn set_deadline(&mut self, deadline: Instant) {
        self.stop_token().set_deadline(deadline);
    }

    /// Hints how many worker threads the runner may use internally.
    /// Runners that are sequential ignore this.
    fn set_thread_count(&mut self, _nr_threads: usize) {}
}

const NO_WINNER: usize = usize::MAX;

/// Runs a set of [`Runner`]s in parallel and keeps the first to finish.
///
/// The race owns its runners. At most `max_threads` runners take part in one
/// call to [`Race::run_race`]; the winner is installed exactly once by
/// compare-and-swap, after which every other participant is asked to stop
/// and all threads are joined. Losers keep their partial state and can be
/// raced again.
#[derive(Debug)]
pub struct Race<R: Runner> {
    runners: Vec<R>,
    winner: Option<usize>,
    max_threads: usize,
}

impl<R: Runner> Default for Race<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runner> Race<R> {
    /// Creates an empty race bounded by the available parallelism.
    pub fn new() -> Self {
        let max_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            runners: Vec::new(),
            winner: None,
            max_threads,
        }
    }

    /// Bounds the number of concurrently racing runners. Values below 1 are
    /// clamped to 1.
    pub fn set_max_threads(&mut self, nr_threads: usize) {
        self.max_threads = nr_threads.max(1);
    }

    /// Adds a runner to the race.
    pub fn add_runner(&mut self, runner: R) {
        self.runners.push(runner);
    }

    /// Number of runners.
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    /// Returns `true` if the race has no runners.
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Index of the winner, if the race has been won.
    pub fn winner_index(&self) -> Option<usize> {
        self.winner
    }

    /// The winning runner, if any.
    pub fn winner(&self) -> Option<&R> {
        self.winner.map(|i| &self.runners[i])
    }

    /// The winning runner, mutably.
    pub fn winner_mut(&mut self) -> Option<&mut R> {
        self.winner.map(move |i| &mut self.runners[i])
    }

    /// The runners, in insertion order.
    pub fn runners(&self) -> &[R] {
        &self.runners
    }

    /// The runners, mutably.
    pub fn runners_mut(&mut self) -> &mut [R] {
        &mut self.runners
    }

    /// Sets the same absolute deadline on every runner.
    pub fn set_deadline(&mut self, deadline: Instant) {
        for runner in &mut self.runners {
            runner.set_deadline(deadline);
        }
    }

    /// Races the runners and returns the index of the winner.
    ///
    /// Returns the cached winner immediately if the race was already won.
    /// With no winner, returns [`Error::TimedOut`] if any participant hit
    /// its deadline and [`Error::Cancelled`] otherwise (every participant
    /// stopped or died without finishing).
    pub fn run_race(&mut self) -> Result<usize, Error> {
        if let Some(index) = self.winner {
            return Ok(index);
        }
        if self.runners.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot run a race with no runners".into(),
            ));
        }
        let nr_participants = self.runners.len().min(self.max_threads);
        for runner in &self.runners[..nr_participants] {
            runner.stop_token().clear();
        }
        log::debug!(
            "race: {} of {} runners starting",
            nr_participants,
            self.runners.len()
        );

        if nr_participants == 1 {
            let runner = &mut self.runners[0];
            runner.run();
            if runner.finished() {
                self.winner = Some(0);
                return Ok(0);
            }
            return Err(if runner.timed_out() {
                Error::TimedOut
            } else {
                Error::Cancelled
            });
        }

        let winner_slot = AtomicUsize::new(NO_WINNER);
        let tokens: Vec<StopToken> = self.runners[..nr_participants]
            .iter()
            .map(|r| r.stop_token().clone())
            .collect();

        std::thread::scope(|scope| {
            for (index, runner) in self.runners[..nr_participants].iter_mut().enumerate() {
                let winner_slot = &winner_slot;
                let tokens = &tokens;
                scope.spawn(move || {
                    runner.run();
                    if runner.finished()
                        && winner_slot
                            .compare_exchange(
                                NO_WINNER,
                                index,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                    {
                        log::debug!("race: runner {} is the winner", index);
                        for (other, token) in tokens.iter().enumerate() {
                            if other != index {
                                token.request_stop();
                            }
                        }
                    }
                });
            }
        });

        let index = winner_slot.load(Ordering::Acquire);
        if index != NO_WINNER {
            self.winner = Some(index);
            Ok(index)
        } else if self.runners[..nr_participants]
            .iter()
            .any(|r| r.timed_out())
        {
            Err(Error::TimedOut)
        } else {
            Err(Error::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Counts up to a target, polling the token between steps.
    struct CountRunner {
        target: u64,
        count: u64,
        token: StopToken,
    }

    impl CountRunner {
        fn new(target: u64) -> Self {
            Self {
                target,
                count: 0,
                token: StopToken::new(),
            }
        }
    }

    impl Runner for CountRunner {
        fn run(&mut self) {
            while self.count < self.target {
                if self.token.should_stop() {
                    return;
                }
                self.count += 1;
            }
        }

        fn finished(&self) -> bool {
            self.count >= self.target
        }

        fn stop_token(&self) -> &StopToken {
            &self.token
        }
    }

    /// Never finishes; spins until stopped.
    struct SpinRunner {
        token: StopToken,
    }

    impl Runner for SpinRunner {
        fn run(&mut self) {
            while !self.token.should_stop() {
                std::hint::spin_loop();
            }
        }

        fn finished(&self) -> bool {
            false
        }

        fn stop_token(&self) -> &StopToken {
            &self.token
        }
    }

    enum TestRunner {
        Count(CountRunner),
        Spin(SpinRunner),
    }

    impl Runner for TestRunner {
        fn run(&mut self) {
            match self {
                TestRunner::Count(r) => r.run(),
                TestRunner::Spin(r) => r.run(),
            }
        }

        fn finished(&self) -> bool {
            match self {
                TestRunner::Count(r) => r.finished(),
                TestRunner::Spin(r) => r.finished(),
            }
        }

        fn stop_token(&self) -> &StopToken {
            match self {
                TestRunner::Count(r) => r.stop_token(),
                TestRunner::Spin(r) => r.stop_token(),
            }
        }
    }

    #[test]
    fn fast_runner_wins_and_stops_the_loser() {
        let mut race = Race::new();
        race.add_runner(TestRunner::Count(CountRunner::new(1000)));
        race.add_runner(TestRunner::Spin(SpinRunner {
            token: StopToken::new(),
        }));
        let winner = race.run_race().unwrap();
        assert_eq!(winner, 0);
        assert!(race.winner().unwrap().finished());
        assert!(race.runners()[1].stop_token().stop_requested());
        // A second call returns the cached winner.
        assert_eq!(race.run_race().unwrap(), 0);
    }

    #[test]
    fn deadline_produces_timed_out() {
        let mut race = Race::new();
        race.add_runner(TestRunner::Spin(SpinRunner {
            token: StopToken::new(),
        }));
        race.set_deadline(Instant::now() + Duration::from_millis(20));
        assert_eq!(race.run_race(), Err(Error::TimedOut));
        assert!(race.runners()[0].timed_out());
    }

    #[test]
    fn stop_is_idempotent_and_clearable() {
        let token = StopToken::new();
        token.request_stop();
        token.request_stop();
        assert!(token.should_stop());
        token.clear();
        assert!(!token.should_stop());
    }

    #[test]
    fn empty_race_is_an_error() {
        let mut race: Race<TestRunner> = Race::new();
        assert!(matches!(
            race.run_race(),
            Err(Error::InvalidOperation(_))
        ));
    }
}
