use serde::{Deserialize, Serialize};

use super::{
    checklist::{ChecklistItem, IngredientChecklist},
    navigator::{StepChange, StepNavigator},
    timer::TimerEngine,
};
use crate::models::{IngredientKey, Recipe, RecipeId, RecipeStep, TimerType};

/// Minimum horizontal travel, in pixels, for a swipe to count as navigation.
pub const SWIPE_THRESHOLD_PX: f64 = 50.0;

/// Keyboard keys, named as browsers report them in `KeyboardEvent.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationKey {
    ArrowLeft,
    ArrowRight,
    Escape,
    #[serde(other)]
    Other,
}

/// Everything the cook can do while in cooking mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CookingInput {
    Next,
    Previous,
    GoTo { index: usize },
    /// The primary button: next step, or finish on the last one.
    Advance,
    Exit,
    Key { key: NavigationKey },
    Swipe { start_x: f64, end_x: f64 },
    ToggleTimer,
    ResetTimer,
    Tick,
    ToggleIngredient { key: IngredientKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CookingEvent {
    StepChanged { from: usize, to: usize },
    TimerCompleted { step: usize, generation: u64 },
    Exited { finished: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Active { step: usize },
    Exited { finished: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    pub label: Option<String>,
    pub timer_type: Option<TimerType>,
    pub total_seconds: u32,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub has_started: bool,
    pub progress: f64,
    pub generation: u64,
}

/// A snapshot of cooking mode, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookingView {
    pub recipe_id: RecipeId,
    pub title: String,
    pub state: SessionState,
    pub step_index: usize,
    pub step_count: usize,
    pub description: String,
    pub progress_percent: f64,
    pub is_first: bool,
    pub is_last: bool,
    pub timer: Option<TimerView>,
    pub ingredients: Vec<ChecklistItem>,
    pub checked_count: usize,
}

/// One walk through a recipe in cooking mode.
///
/// Composes the step navigator, the countdown for the step on screen and the
/// session-wide ingredient checklist. The timer is reloaded from the new step on every
/// step change while the checklist carries over. Once exited, the session ignores all
/// further input; cooking again means starting a new session.
#[derive(Debug, Clone)]
pub struct CookingSession {
    recipe: Recipe,
    navigator: StepNavigator,
    timer: TimerEngine,
    checklist: IngredientChecklist,
    exited: Option<bool>,
}

impl CookingSession {
    /// Enter cooking mode on the first step. Recipes without steps cannot be cooked.
    pub fn start(recipe: Recipe) -> Option<Self> {
        let navigator = StepNavigator::new(recipe.content.steps.len())?;
        let timer = TimerEngine::new(recipe.content.steps[0].timer_seconds());
        tracing::debug!(recipe_id = recipe.id, "Entering cooking mode");
        Some(Self {
            recipe,
            navigator,
            timer,
            checklist: IngredientChecklist::default(),
            exited: None,
        })
    }

    /// Apply one input and report what happened.
    pub fn handle(&mut self, input: CookingInput) -> Vec<CookingEvent> {
        if self.exited.is_some() {
            return vec![];
        }
        let mut events = vec![];
        match input {
            CookingInput::Next => self.navigate(StepNavigator::next, &mut events),
            CookingInput::Previous => self.navigate(StepNavigator::previous, &mut events),
            CookingInput::GoTo { index } => {
                self.navigate(|nav| nav.go_to(index), &mut events)
            }
            CookingInput::Advance => {
                if self.navigator.is_last() {
                    self.exit(true, &mut events);
                } else {
                    self.navigate(StepNavigator::next, &mut events);
                }
            }
            CookingInput::Exit => self.exit(false, &mut events),
            CookingInput::Key { key } => match key {
                NavigationKey::ArrowRight => self.navigate(StepNavigator::next, &mut events),
                NavigationKey::ArrowLeft => self.navigate(StepNavigator::previous, &mut events),
                NavigationKey::Escape => self.exit(false, &mut events),
                NavigationKey::Other => {}
            },
            CookingInput::Swipe { start_x, end_x } => {
                let distance = start_x - end_x;
                if distance >= SWIPE_THRESHOLD_PX {
                    self.navigate(StepNavigator::next, &mut events);
                } else if distance <= -SWIPE_THRESHOLD_PX {
                    self.navigate(StepNavigator::previous, &mut events);
                }
            }
            CookingInput::ToggleTimer => {
                self.timer.toggle();
            }
            CookingInput::ResetTimer => self.timer.reset(),
            CookingInput::Tick => {
                if let Some(done) = self.timer.tick() {
                    tracing::info!(
                        recipe_id = self.recipe.id,
                        step = self.navigator.current(),
                        "Step timer finished"
                    );
                    events.push(CookingEvent::TimerCompleted {
                        step: self.navigator.current(),
                        generation: done.generation,
                    });
                }
            }
            CookingInput::ToggleIngredient { key } => {
                if self.recipe.content.ingredient(key).is_some() {
                    self.checklist.toggle(key);
                }
            }
        }
        events
    }

    pub fn next(&mut self) -> Vec<CookingEvent> {
        self.handle(CookingInput::Next)
    }

    pub fn previous(&mut self) -> Vec<CookingEvent> {
        self.handle(CookingInput::Previous)
    }

    pub fn go_to(&mut self, index: usize) -> Vec<CookingEvent> {
        self.handle(CookingInput::GoTo { index })
    }

    pub fn state(&self) -> SessionState {
        match self.exited {
            Some(finished) => SessionState::Exited { finished },
            None => SessionState::Active {
                step: self.navigator.current(),
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.exited.is_none()
    }

    pub fn current_step(&self) -> &RecipeStep {
        &self.recipe.content.steps[self.navigator.current()]
    }

    pub fn navigator(&self) -> &StepNavigator {
        &self.navigator
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn checklist(&self) -> &IngredientChecklist {
        &self.checklist
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn has_timer(&self) -> bool {
        !self.timer.is_inert()
    }

    pub fn view(&self) -> CookingView {
        let step = self.current_step();
        let timer = (!self.timer.is_inert()).then(|| {
            let state = self.timer.state();
            TimerView {
                label: step.timer_label.clone(),
                timer_type: step.timer_type,
                total_seconds: self.timer.total_seconds(),
                remaining_seconds: state.remaining_seconds,
                is_running: state.is_running,
                has_started: state.has_started,
                progress: self.timer.progress().unwrap_or_default(),
                generation: self.timer.generation(),
            }
        });
        CookingView {
            recipe_id: self.recipe.id,
            title: self.recipe.content.title.clone(),
            state: self.state(),
            step_index: self.navigator.current(),
            step_count: self.navigator.step_count(),
            description: step.description.clone(),
            progress_percent: self.navigator.progress_percent(),
            is_first: self.navigator.is_first(),
            is_last: self.navigator.is_last(),
            timer,
            ingredients: self.checklist.view(&self.recipe.content, step),
            checked_count: self.checklist.len(),
        }
    }

    fn navigate(
        &mut self,
        mv: impl FnOnce(&mut StepNavigator) -> Option<StepChange>,
        events: &mut Vec<CookingEvent>,
    ) {
        if let Some(StepChange { from, to }) = mv(&mut self.navigator) {
            self.timer.start(self.recipe.content.steps[to].timer_seconds());
            events.push(CookingEvent::StepChanged { from, to });
        }
    }

    fn exit(&mut self, finished: bool, events: &mut Vec<CookingEvent>) {
        // Stop the countdown so nothing keeps ticking for a closed session.
        self.timer.start(0);
        self.exited = Some(finished);
        tracing::debug!(recipe_id = self.recipe.id, finished, "Leaving cooking mode");
        events.push(CookingEvent::Exited { finished });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecipeContent, RecipeIngredient};

    fn step(description: &str, keys: &[u32], timer: Option<(u32, TimerType)>) -> RecipeStep {
        RecipeStep {
            description: description.into(),
            ingredient_keys: keys.iter().copied().map(IngredientKey).collect(),
            timer_minutes: timer.map(|t| t.0),
            timer_label: timer.map(|_| "Timer".to_string()),
            timer_type: timer.map(|t| t.1),
        }
    }

    fn recipe(steps: Vec<RecipeStep>) -> Recipe {
        let now = chrono::Utc::now();
        Recipe {
            id: 7,
            owner: "cook".into(),
            content: RecipeContent {
                title: "Roast chicken".into(),
                category: "Dinner".into(),
                ingredients: ["chicken", "salt", "lemon"]
                    .iter()
                    .enumerate()
                    .map(|(i, name)| RecipeIngredient {
                        key: IngredientKey(i as u32),
                        ingredient_id: None,
                        name: name.to_string(),
                        quantity: None,
                        unit: None,
                    })
                    .collect(),
                steps,
                cooking_methods: vec!["oven".into()],
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn recipe_without_steps_cannot_be_cooked() {
        assert!(CookingSession::start(recipe(vec![])).is_none());
    }

    #[test]
    fn checks_persist_across_steps() {
        let mut session = CookingSession::start(recipe(vec![
            step("Season", &[0, 1], None),
            step("Rest", &[], None),
            step("Carve", &[0], None),
        ]))
        .unwrap();
        session.handle(CookingInput::ToggleIngredient {
            key: IngredientKey(0),
        });
        session.next();
        session.next();
        let view = session.view();
        assert_eq!(view.step_index, 2);
        assert_eq!(view.ingredients.len(), 1);
        assert!(view.ingredients[0].checked);

        session.go_to(0);
        let view = session.view();
        assert!(view.ingredients[0].checked);
        assert!(!view.ingredients[1].checked);
    }

    #[test]
    fn steps_without_timers_are_inert() {
        let mut session =
            CookingSession::start(recipe(vec![step("Season", &[], None), step("Carve", &[], None)]))
                .unwrap();
        assert!(!session.has_timer());
        session.handle(CookingInput::ToggleTimer);
        session.handle(CookingInput::Tick);
        assert_eq!(session.timer().state().remaining_seconds, 0);
        assert!(!session.timer().state().has_started);
        assert!(session.view().timer.is_none());
    }

    #[test]
    fn one_minute_cook_timer_runs_out() {
        let mut session =
            CookingSession::start(recipe(vec![step("Roast", &[], Some((1, TimerType::Cook)))]))
                .unwrap();
        session.handle(CookingInput::ToggleTimer);
        let events = (0..60)
            .flat_map(|_| session.handle(CookingInput::Tick))
            .collect::<Vec<_>>();
        assert_eq!(
            events,
            [CookingEvent::TimerCompleted {
                step: 0,
                generation: session.timer().generation()
            }]
        );
        let timer = session.view().timer.unwrap();
        assert_eq!(timer.remaining_seconds, 0);
        assert!(!timer.is_running);
        assert!(timer.has_started);
        assert_eq!(timer.timer_type, Some(TimerType::Cook));
    }

    #[test]
    fn changing_step_reloads_the_timer() {
        let mut session = CookingSession::start(recipe(vec![
            step("Prep", &[], Some((2, TimerType::Prep))),
            step("Roast", &[], Some((45, TimerType::Cook))),
        ]))
        .unwrap();
        session.handle(CookingInput::ToggleTimer);
        session.handle(CookingInput::Tick);
        let before = session.timer().generation();

        session.next();
        let state = session.timer().state();
        assert_eq!(state.remaining_seconds, 45 * 60);
        assert!(!state.is_running);
        assert!(!state.has_started);
        assert_ne!(session.timer().generation(), before);

        session.previous();
        assert_eq!(session.timer().state().remaining_seconds, 120);
    }

    #[test]
    fn keys_and_swipes_navigate() {
        let mut session = CookingSession::start(recipe(vec![
            step("One", &[], None),
            step("Two", &[], None),
            step("Three", &[], None),
        ]))
        .unwrap();
        session.handle(CookingInput::Key {
            key: NavigationKey::ArrowRight,
        });
        assert_eq!(session.navigator().current(), 1);
        session.handle(CookingInput::Swipe {
            start_x: 300.0,
            end_x: 200.0,
        });
        assert_eq!(session.navigator().current(), 2);
        // Too short to count.
        session.handle(CookingInput::Swipe {
            start_x: 100.0,
            end_x: 130.0,
        });
        assert_eq!(session.navigator().current(), 2);
        session.handle(CookingInput::Swipe {
            start_x: 100.0,
            end_x: 180.0,
        });
        assert_eq!(session.navigator().current(), 1);
        session.handle(CookingInput::Key {
            key: NavigationKey::Other,
        });
        assert_eq!(session.navigator().current(), 1);
    }

    #[test]
    fn arrow_right_on_last_step_does_not_finish() {
        let mut session = CookingSession::start(recipe(vec![step("Only", &[], None)])).unwrap();
        let events = session.handle(CookingInput::Key {
            key: NavigationKey::ArrowRight,
        });
        assert!(events.is_empty());
        assert!(session.is_active());
    }

    #[test]
    fn advance_on_last_step_finishes() {
        let mut session =
            CookingSession::start(recipe(vec![step("One", &[], None), step("Two", &[], None)]))
                .unwrap();
        assert_eq!(
            session.handle(CookingInput::Advance),
            [CookingEvent::StepChanged { from: 0, to: 1 }]
        );
        assert!(session.view().is_last);
        assert_eq!(
            session.handle(CookingInput::Advance),
            [CookingEvent::Exited { finished: true }]
        );
        assert_eq!(session.state(), SessionState::Exited { finished: true });
    }

    #[test]
    fn escape_exits_from_any_step_and_is_terminal() {
        let mut session = CookingSession::start(recipe(vec![
            step("One", &[], Some((5, TimerType::Prep))),
            step("Two", &[], None),
        ]))
        .unwrap();
        session.handle(CookingInput::ToggleTimer);
        assert_eq!(
            session.handle(CookingInput::Key {
                key: NavigationKey::Escape
            }),
            [CookingEvent::Exited { finished: false }]
        );
        assert!(!session.timer().is_running());
        assert!(session.next().is_empty());
        assert!(session.handle(CookingInput::Tick).is_empty());
        assert_eq!(session.state(), SessionState::Exited { finished: false });
    }

    #[test]
    fn unknown_ingredients_are_not_checked() {
        let mut session = CookingSession::start(recipe(vec![step("One", &[0], None)])).unwrap();
        session.handle(CookingInput::ToggleIngredient {
            key: IngredientKey(42),
        });
        assert!(session.checklist().is_empty());
    }

    #[test]
    fn inputs_deserialize_from_tagged_json() {
        let input: CookingInput =
            serde_json::from_str(r#"{"action":"swipe","start_x":10,"end_x":90}"#).unwrap();
        assert_eq!(
            input,
            CookingInput::Swipe {
                start_x: 10.0,
                end_x: 90.0
            }
        );
        let input: CookingInput =
            serde_json::from_str(r#"{"action":"key","key":"Enter"}"#).unwrap();
        assert_eq!(
            input,
            CookingInput::Key {
                key: NavigationKey::Other
            }
        );
    }
}
