pub mod cli;
pub mod config;
pub mod session;
pub mod simulation;
pub mod strategy;
pub mod world;
