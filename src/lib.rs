pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod environment;
pub mod identity;
pub mod lifecycle;
pub mod paths;
pub mod platform;
pub mod runtime;
pub mod ui;
pub mod watchdog;
