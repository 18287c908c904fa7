pub mod amenities;
pub mod api;
pub mod cache;
pub mod categorize;
pub mod config;
pub mod error;
pub mod geocode;
pub mod llm;
pub mod models;
pub mod pipeline;
