//! Action registry and ready-set computation.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::warn;

use crate::core::action::Action;
use crate::core::context::RunContext;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action kind must be non-empty")]
    EmptyKind,
    #[error("action kind '{0}' has leading or trailing whitespace")]
    UntrimmedKind(String),
    #[error("action '{0}' is already registered")]
    Duplicate(String),
}

/// Actions keyed by kind, kept in registration order.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn Action>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: impl Action + 'static) -> Result<(), RegistryError> {
        self.register_boxed(Box::new(action))
    }

    pub fn register_boxed(&mut self, action: Box<dyn Action>) -> Result<(), RegistryError> {
        let kind = action.kind();
        if kind.trim().is_empty() {
            return Err(RegistryError::EmptyKind);
        }
        if kind.trim() != kind {
            return Err(RegistryError::UntrimmedKind(kind.to_string()));
        }
        if self.index.contains_key(kind) {
            return Err(RegistryError::Duplicate(kind.to_string()));
        }
        self.index.insert(kind.to_string(), self.actions.len());
        self.actions.push(action);
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.iter().map(|action| action.as_ref())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|action| action.kind())
    }

    /// `(kind, dependency)` pairs whose dependency is not registered.
    ///
    /// Such actions can never become ready.
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for action in self.iter() {
            for dep in action.dependencies() {
                if !self.contains(dep) {
                    missing.push((action.kind().to_string(), dep.clone()));
                }
            }
        }
        missing
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// Actions eligible to run now, in registration order.
///
/// An action is ready when it has not yet succeeded, all of its dependencies
/// have succeeded, and its guard holds. Guards are only evaluated for actions
/// passing the first two checks.
pub fn ready_set<'r>(registry: &'r ActionRegistry, ctx: &RunContext) -> Vec<&'r dyn Action> {
    registry
        .iter()
        .filter(|action| !ctx.has_succeeded(action.kind()))
        .filter(|action| {
            action
                .dependencies()
                .iter()
                .all(|dep| ctx.has_succeeded(dep))
        })
        .filter(|action| evaluate_guard(*action, ctx))
        .collect()
}

fn evaluate_guard(action: &dyn Action, ctx: &RunContext) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| action.guard(ctx))) {
        Ok(ready) => ready,
        Err(_) => {
            warn!(action = action.kind(), "guard panicked, treating as not ready");
            false
        }
    }
}
