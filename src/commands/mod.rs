// src/commands/mod.rs

//! Builtin dagcmds, so the shell is usable on its own.

pub mod cache;
pub mod fs;
pub mod session;
pub mod text;

use crate::core::registry::{CommandDefinition, Registry};

// --- Command Table ---

/// The single source of truth for all builtin commands.
static BUILTINS: &[CommandDefinition] = &[
    CommandDefinition {
        path: "echo",
        aliases: &[],
        signature: text::echo_signature,
        handler: text::echo,
    },
    CommandDefinition {
        path: "upper",
        aliases: &[],
        signature: text::upper_signature,
        handler: text::upper,
    },
    CommandDefinition {
        path: "split",
        aliases: &[],
        signature: text::split_signature,
        handler: text::split,
    },
    CommandDefinition {
        path: "count",
        aliases: &["len"],
        signature: text::count_signature,
        handler: text::count,
    },
    CommandDefinition {
        path: "head",
        aliases: &[],
        signature: text::head_signature,
        handler: text::head,
    },
    CommandDefinition {
        path: "fail",
        aliases: &[],
        signature: text::fail_signature,
        handler: text::fail,
    },
    CommandDefinition {
        path: "cd",
        aliases: &[],
        signature: session::cd_signature,
        handler: session::cd,
    },
    CommandDefinition {
        path: "pwd",
        aliases: &[],
        signature: session::pwd_signature,
        handler: session::pwd,
    },
    CommandDefinition {
        path: "sleep",
        aliases: &[],
        signature: session::sleep_signature,
        handler: session::sleep,
    },
    CommandDefinition {
        path: "reload",
        aliases: &["restart"],
        signature: session::reload_signature,
        handler: session::reload,
    },
    CommandDefinition {
        path: "exit",
        aliases: &["quit"],
        signature: session::exit_signature,
        handler: session::exit,
    },
    CommandDefinition {
        path: "stat",
        aliases: &[],
        signature: fs::stat_signature,
        handler: fs::stat,
    },
    CommandDefinition {
        path: "cache.list",
        aliases: &[],
        signature: cache::list_signature,
        handler: cache::list,
    },
    CommandDefinition {
        path: "cache.clear",
        aliases: &[],
        signature: cache::clear_signature,
        handler: cache::clear,
    },
];

/// Registers every builtin into `registry`.
pub fn register_builtins(registry: &mut Registry) {
    registry.register_table(BUILTINS);
    log::debug!("Registered {} builtin commands.", BUILTINS.len());
}
