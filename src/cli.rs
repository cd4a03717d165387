// src/cli.rs

use clap::Parser;

/// dag: an interactive command shell with a compact command language.
///
/// Lines combine commands with `;`, `;;`, `&&`, `||` and the pipes `|`, `@|`,
/// `.>` and `>.`. A comma-list such as `echo a,b,c` runs the command once per
/// value. Directives like `=c` (cache) or `=j` (json) modify a single command.
///
/// Typical wrapper invocation:
///    `dag /tmp/dag-cwd /tmp/dag-reload [first line...]`
/// where the wrapper `cd`s into the directory written to the first file when
/// the shell exits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File that receives the final working directory if it changed.
    /// `-` or an empty string disables it.
    pub cwd_file: Option<String>,

    /// File that receives the arguments of every reload.
    /// `-` or an empty string disables it.
    pub reload_file: Option<String>,

    /// Run as the first input line. `=m` anywhere enables memory tracing.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
