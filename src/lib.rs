pub mod action;
pub mod app;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod probes;
pub mod sampler;
pub mod scheduler;
pub mod theme;
pub mod tui;
pub mod utils;
pub mod widgets;
