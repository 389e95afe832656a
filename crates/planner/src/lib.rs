pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod planner;
pub mod prompt_template;
pub mod providers;
pub mod services;
pub mod systems;
pub mod workflow;
