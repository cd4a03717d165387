// src/core/mod.rs

pub mod arg_parser;
pub mod cache;
pub mod command_list;
pub mod context;
pub mod deferred;
pub mod directives;
pub mod engine;
pub mod events;
pub mod expander;
pub mod interpreter;
pub mod lexer;
pub mod paths;
pub mod pool;
pub mod registry;
