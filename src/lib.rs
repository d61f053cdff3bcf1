pub mod client;
pub mod components;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod infrastructure;
pub mod scanner;
