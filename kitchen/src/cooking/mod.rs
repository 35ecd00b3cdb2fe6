//! Guided, step-by-step cooking mode.

pub mod checklist;
pub mod navigator;
pub mod session;
pub mod timer;

pub use checklist::{ChecklistItem, IngredientChecklist};
pub use navigator::{StepChange, StepNavigator};
pub use session::{
    CookingEvent, CookingInput, CookingSession, CookingView, NavigationKey, SessionState,
    TimerView, SWIPE_THRESHOLD_PX,
};
pub use timer::{TimerCompletion, TimerEngine, TimerState};
