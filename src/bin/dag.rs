// src/bin/dag.rs

use anyhow::Result;
use clap::Parser;
use dag::{
    cli::Cli,
    core::{interpreter::Interpreter, paths},
    render,
    settings::Settings,
    system::supervisor::{self, RunReport, StartupArgs},
};
use std::io::{self, IsTerminal};

/// The main entry point of `dag`.
/// It sets up logging, parses arguments, runs the reload loop and performs
/// centralized error handling.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // Only startup and environment errors get here; command failures are
        // printed by the interpreter.
        let _ = render::print_error(&format!("{:#}", e), &mut io::stderr());
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    let startup = StartupArgs::new(cli.cwd_file, cli.reload_file, cli.args);
    let layout = paths::layout()?;
    let initial_cwd = std::env::current_dir()?;
    let interactive = io::stdin().is_terminal();

    supervisor::supervise(startup, initial_cwd, |request| {
        // Settings are re-read on every run so a reload picks up edits.
        let settings = Settings::load(&layout.settings_file())?;
        let mut interpreter = Interpreter::new(settings, &layout, request.cwd)?;
        let outcome = interpreter.run(
            &request.args,
            io::stdin().lock(),
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
            interactive,
        )?;
        Ok(RunReport {
            outcome,
            cwd: interpreter.context().cwd().to_path_buf(),
        })
    })?;
    Ok(())
}
