pub mod browse;
pub mod cooking;
pub mod dictation;
pub mod drafts;
pub mod editor;
pub mod form;
pub mod lookup;
pub mod models;
pub mod preferences;
pub mod repository;
pub mod validation;
