pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod cooking;
pub mod database;
pub mod drafts;
pub mod editing;
pub mod errors;
pub mod images;
pub mod models;
pub mod pages;
