use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepChange {
    pub from: usize,
    pub to: usize,
}

/// Position within the ordered steps of one recipe. First and last steps are absorbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNavigator {
    current: usize,
    step_count: usize,
}

impl StepNavigator {
    /// Start on the first step. There is nothing to navigate without steps.
    pub fn new(step_count: usize) -> Option<Self> {
        (step_count > 0).then_some(Self {
            current: 0,
            step_count,
        })
    }

    /// Move to `index`. Out-of-range targets and the current step are ignored.
    pub fn go_to(&mut self, index: usize) -> Option<StepChange> {
        if index >= self.step_count || index == self.current {
            return None;
        }
        let change = StepChange {
            from: self.current,
            to: index,
        };
        self.current = index;
        Some(change)
    }

    pub fn next(&mut self) -> Option<StepChange> {
        self.go_to(self.current + 1)
    }

    pub fn previous(&mut self) -> Option<StepChange> {
        self.current.checked_sub(1).and_then(|i| self.go_to(i))
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.step_count
    }

    pub fn progress_percent(&self) -> f64 {
        (self.current + 1) as f64 / self.step_count as f64 * 100.0
    }
}
