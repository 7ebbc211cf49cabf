pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod forms;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
