// src/render.rs

//! Terminal output of line reports.

use crate::core::interpreter::{LineEntry, LineReport};
use crate::models::Response;
use colored::Colorize;
use std::fmt::Display;
use std::io::{self, Write};

/// Prints every entry of `report` in the order it happened: responses and
/// their notes to `out`, failures to `err`.
///
/// # Errors
/// I/O errors of the streams.
pub fn print_report<W: Write, E: Write>(
    report: &LineReport,
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    for entry in &report.entries {
        match entry {
            LineEntry::Response(response) => print_response(response, out)?,
            LineEntry::Failure(error) => print_error(error, err)?,
        }
    }
    out.flush()?;
    err.flush()
}

fn print_response<W: Write>(response: &Response, out: &mut W) -> io::Result<()> {
    if !response.is_suppressed() {
        let text = response.text();
        if !text.is_empty() {
            writeln!(out, "{}", text)?;
        }
    }
    for note in response.notes() {
        writeln!(out, "{}", note.dimmed())?;
    }
    Ok(())
}

/// Prints a failure as `Error: <message>`.
///
/// # Errors
/// I/O errors of the stream.
pub fn print_error<E: Write>(error: &impl Display, err: &mut E) -> io::Result<()> {
    writeln!(err, "{} {}", "Error:".red().bold(), error)
}
