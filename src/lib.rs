//! Telegram bot that turns course-data API responses into text files.

pub mod api;
pub mod bot;
pub mod config;
pub mod course;
pub mod pipeline;
pub mod quality;
pub mod render;
pub mod telegram;
