use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerState {
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub has_started: bool,
}

/// Emitted by [`TimerEngine::tick`] when a countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerCompletion {
    pub generation: u64,
}

/// A single countdown for the step currently on screen.
///
/// Every `start` and `reset` begins a new generation. A generation completes at most
/// once, so a completion can never be delivered twice for the same countdown even if the
/// owner restarts the engine in quick succession.
#[derive(Debug, Clone, Default)]
pub struct TimerEngine {
    total_seconds: u32,
    state: TimerState,
    generation: u64,
    completed_generation: Option<u64>,
}

impl TimerEngine {
    pub fn new(total_seconds: u32) -> Self {
        let mut engine = Self::default();
        engine.start(total_seconds);
        engine
    }

    /// Load a new countdown. A zero duration leaves the engine inert.
    pub fn start(&mut self, total_seconds: u32) {
        self.total_seconds = total_seconds;
        self.rewind();
    }

    /// Flip between running and paused. Returns whether anything changed.
    pub fn toggle(&mut self) -> bool {
        if self.is_inert() || self.state.remaining_seconds == 0 {
            return false;
        }
        self.state.is_running = !self.state.is_running;
        self.state.has_started = true;
        true
    }

    pub fn reset(&mut self) {
        self.rewind();
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> Option<TimerCompletion> {
        if !self.state.is_running {
            return None;
        }
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        if self.state.remaining_seconds > 0 {
            return None;
        }
        self.state.is_running = false;
        if self.completed_generation == Some(self.generation) {
            return None;
        }
        self.completed_generation = Some(self.generation);
        Some(TimerCompletion {
            generation: self.generation,
        })
    }

    /// Fraction of the countdown already elapsed, `None` without a countdown.
    pub fn progress(&self) -> Option<f64> {
        (self.total_seconds > 0).then(|| {
            f64::from(self.total_seconds - self.state.remaining_seconds)
                / f64::from(self.total_seconds)
        })
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_inert(&self) -> bool {
        self.total_seconds == 0
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    fn rewind(&mut self) {
        self.generation += 1;
        self.state = TimerState {
            remaining_seconds: self.total_seconds,
            is_running: false,
            has_started: false,
        };
    }
}
