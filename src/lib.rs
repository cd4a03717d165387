//! An interactive command shell: a compact command language with comma-list
//! expansion, control-flow operators and pipes, per-command directives, a
//! persistent result cache and a self-reloading run loop.

pub mod cli;
pub mod commands;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod render;
pub mod settings;
pub mod system;
