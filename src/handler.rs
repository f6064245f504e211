pub mod app;
pub mod assessments;
pub mod auth;
pub mod questions;
pub mod reports;
pub mod users;
