pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod session;
