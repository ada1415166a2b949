pub mod config;
pub mod focus;
pub mod rules;
pub mod stats;
pub mod timer;
