// src/core/context.rs

use crate::core::cache::CacheStore;
use crate::core::events::{EventBus, SessionEvent};
use crate::core::pool::WorkerPool;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors of path handling on the session.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Could not expand path '{path}': {reason}")]
    Expand { path: String, reason: String },
    #[error("No such directory: '{}'", .0.display())]
    NotADirectory(PathBuf),
    #[error("Could not resolve '{}': {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings that hold only while one command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    pub catch_failures: bool,
}

/// Session state threaded through every command of one interpreter run.
///
/// The working directory here is logical: changing it never touches the
/// process working directory. The supervisor reads it when the run ends.
#[derive(Debug)]
pub struct Context {
    session: Uuid,
    cwd: PathBuf,
    scope: Scope,
    events: EventBus,
    pool: WorkerPool,
    cache: CacheStore,
}

impl Context {
    /// A fresh session starting in `cwd`, with a new session id.
    pub fn new(cwd: PathBuf, cache: CacheStore, pool: WorkerPool) -> Self {
        Self {
            session: Uuid::new_v4(),
            cwd,
            scope: Scope::default(),
            events: EventBus::new(),
            pool,
            cache,
        }
    }

    /// Stable id of this run; the subject of its session events.
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// The logical working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Resolves `target` against the current directory, expanding `~` and
    /// environment variables.
    ///
    /// # Errors
    /// See [`ContextError`].
    pub fn resolve_path(&self, target: &str) -> Result<PathBuf, ContextError> {
        let expanded = shellexpand::full(target).map_err(|e| ContextError::Expand {
            path: target.to_string(),
            reason: e.to_string(),
        })?;
        let joined = self.cwd.join(expanded.as_ref());
        dunce::canonicalize(&joined).map_err(|source| ContextError::Resolve {
            path: joined,
            source,
        })
    }

    /// Moves the logical working directory and publishes `CwdChanged`.
    ///
    /// # Errors
    /// Fails when the target does not resolve to a directory.
    pub fn change_dir(&mut self, target: &str) -> Result<&Path, ContextError> {
        let resolved = self.resolve_path(target)?;
        if !resolved.is_dir() {
            return Err(ContextError::NotADirectory(resolved));
        }
        let from = std::mem::replace(&mut self.cwd, resolved);
        if from != self.cwd {
            let event = SessionEvent::CwdChanged {
                from,
                to: self.cwd.clone(),
            };
            self.events.publish(self.session, &event);
        }
        Ok(&self.cwd)
    }

    /// Publishes an event about this session.
    pub fn publish(&mut self, event: &SessionEvent) -> usize {
        self.events.publish(self.session, event)
    }

    /// Runs `f` with `scope` in effect and restores the previous scope on
    /// every exit path, unwinding included.
    pub fn scoped<T>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.scope, scope);
        let mut guard = scopeguard::guard(self, move |ctx| ctx.scope = previous);
        f(&mut guard)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A context rooted at `dir`, with its cache in `dir/cache`.
    pub(crate) fn context_in(dir: &Path) -> Context {
        let pool = WorkerPool::new(2).unwrap();
        Context::new(dir.to_path_buf(), CacheStore::new(dir.join("cache")), pool)
    }

    #[test]
    fn test_scope_is_restored_after_success_and_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        let inside = ctx.scoped(Scope { catch_failures: true }, |c| c.scope().catch_failures);
        assert!(inside);
        assert!(!ctx.scope().catch_failures);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.scoped(Scope { catch_failures: true }, |_| panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(!ctx.scope().catch_failures);
    }

    #[test]
    fn test_nested_scopes_unwind_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        ctx.scoped(Scope { catch_failures: true }, |outer| {
            outer.scoped(Scope::default(), |inner| assert!(!inner.scope().catch_failures));
            assert!(outer.scope().catch_failures);
        });
        assert!(!ctx.scope().catch_failures);
    }

    #[test]
    fn test_change_dir_is_logical_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        let mut ctx = context_in(&root);
        let process_cwd = std::env::current_dir().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let session = ctx.session();
        ctx.events_mut()
            .subscribe(session, move |e| sink.borrow_mut().push(e.clone()));

        assert_eq!(ctx.change_dir("sub").unwrap(), root.join("sub"));
        assert_eq!(std::env::current_dir().unwrap(), process_cwd);
        assert_eq!(
            *seen.borrow(),
            vec![SessionEvent::CwdChanged {
                from: root.clone(),
                to: root.join("sub")
            }]
        );

        ctx.change_dir("..").unwrap();
        assert_eq!(ctx.cwd(), root);
        assert!(matches!(ctx.change_dir("missing"), Err(ContextError::Resolve { .. })));
    }

    #[test]
    fn test_change_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("file.txt"), "x").unwrap();
        let mut ctx = context_in(&root);
        assert!(matches!(
            ctx.change_dir("file.txt"),
            Err(ContextError::NotADirectory(_))
        ));
        assert_eq!(ctx.cwd(), root);
    }
}
