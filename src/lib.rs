pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod model;
pub mod storage;
pub mod todo;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
