// src/core/directives.rs

use crate::models::Response;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a directive acts in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Replaces normal execution entirely.
    Meta,
    /// Adjusts the execution plan before the command runs.
    Execution,
    /// Transforms the response; higher priority runs first.
    Response(u8),
}

/// A modifier attached to a command while its arguments are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `=h`: show usage instead of running.
    Help,
    /// `=x`: show the cache identity and path instead of running.
    Explain,
    /// `=c`: serve from cache when possible, write once otherwise.
    Cache,
    /// `=C`: always run and overwrite the cache entry.
    CacheUpdate,
    /// `=i`: turn a failure of the command into an empty response.
    Catch,
    /// `=j`: render the response as JSON.
    Json,
    /// `=o <path>`: also write the rendered text to a file.
    WriteFile(PathBuf),
    /// `=t`: report how long the command took.
    Timing,
    /// `=q`: do not print the response.
    Quiet,
}

impl Directive {
    /// Maps a directive letter to its directive. `o` needs a path and is
    /// handled by the parser.
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'h' => Self::Help,
            'x' => Self::Explain,
            'c' => Self::Cache,
            'C' => Self::CacheUpdate,
            'i' => Self::Catch,
            'j' => Self::Json,
            't' => Self::Timing,
            'q' => Self::Quiet,
            _ => return None,
        })
    }

    /// Every letter accepted after the `=` prefix.
    pub fn is_letter(letter: char) -> bool {
        letter == 'o' || Self::from_letter(letter).is_some()
    }

    /// The phase this directive belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::Help | Self::Explain => Category::Meta,
            Self::Cache | Self::CacheUpdate | Self::Catch => Category::Execution,
            Self::Json => Category::Response(30),
            Self::WriteFile(_) => Category::Response(20),
            Self::Timing => Category::Response(10),
            Self::Quiet => Category::Response(0),
        }
    }

    fn priority(&self) -> Option<u8> {
        match self.category() {
            Category::Response(priority) => Some(priority),
            _ => None,
        }
    }

    /// Applies an execution directive to the plan. Other categories are ignored.
    pub fn apply_execution(&self, plan: &mut ExecutionPlan) {
        match self {
            Self::Cache => {
                if plan.cache == CachePolicy::Bypass {
                    plan.cache = CachePolicy::ReadOrWriteOnce;
                }
            }
            Self::CacheUpdate => plan.cache = CachePolicy::Refresh,
            Self::Catch => plan.catch_failures = true,
            _ => {}
        }
    }

    /// Applies a response directive to the envelope. Other categories are ignored.
    /// Relative output paths are taken from `cwd`.
    ///
    /// # Errors
    /// Returns [`DirectiveError::Write`] when the output file cannot be written.
    pub fn apply_response(&self, response: &mut Response, cwd: &Path) -> Result<(), DirectiveError> {
        match self {
            Self::Json => {
                let text = serde_json::to_string_pretty(&response.value().to_json())
                    .map_err(|e| DirectiveError::Json(e.to_string()))?;
                response.set_rendered(text);
            }
            Self::WriteFile(target) => {
                let path = cwd.join(target);
                let text = response.text();
                fs::write(&path, &text).map_err(|source| DirectiveError::Write {
                    path: path.clone(),
                    source,
                })?;
                response.push_note(format!("wrote {} bytes to {}", text.len(), path.display()));
            }
            Self::Timing => {
                let origin = if response.from_cache() { " (cached)" } else { "" };
                let note = format!("took {:.3}s{}", response.elapsed().as_secs_f64(), origin);
                response.push_note(note);
            }
            Self::Quiet => response.suppress(),
            _ => {}
        }
        Ok(())
    }
}

/// Failures of response directives.
#[derive(Error, Debug)]
pub enum DirectiveError {
    #[error("Could not write response to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not render response as JSON: {0}")]
    Json(String),
}

/// How the engine treats the cache for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    Bypass,
    ReadOrWriteOnce,
    Refresh,
}

/// What execution directives decide before a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
    pub cache: CachePolicy,
    pub catch_failures: bool,
}

/// The directives of one command, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    directives: Vec<Directive>,
}

impl DirectiveSet {
    pub fn new(directives: Vec<Directive>) -> Self {
        Self { directives }
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn contains(&self, directive: &Directive) -> bool {
        self.directives.contains(directive)
    }

    /// The first meta directive in declaration order.
    pub fn first_meta(&self) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|d| d.category() == Category::Meta)
    }

    /// Folds all execution directives, in registration order, into a plan.
    pub fn plan(&self) -> ExecutionPlan {
        let mut plan = ExecutionPlan::default();
        for directive in self
            .directives
            .iter()
            .filter(|d| d.category() == Category::Execution)
        {
            directive.apply_execution(&mut plan);
        }
        plan
    }

    /// Response directives ordered by descending priority, stable within a priority.
    pub fn response_order(&self) -> Vec<&Directive> {
        let mut ordered: Vec<&Directive> = self
            .directives
            .iter()
            .filter(|d| d.priority().is_some())
            .collect();
        ordered.sort_by_key(|d| std::cmp::Reverse(d.priority()));
        ordered
    }

    /// Runs every response directive over `response`.
    ///
    /// # Errors
    /// Stops at the first directive that fails.
    pub fn apply_responses(&self, response: &mut Response, cwd: &Path) -> Result<(), DirectiveError> {
        for directive in self.response_order() {
            log::debug!("Applying response directive {:?}.", directive);
            directive.apply_response(response, cwd)?;
        }
        Ok(())
    }
}
