pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod progress;
pub mod response;
pub mod store;
pub mod syllabus;
pub mod utils;
pub mod video;
