//! Primary → deterministic fallback combinator.
//!
//! Every LLM-backed step has exactly one deterministic alternative and no
//! retry. [`Fallback::resolve`] applies the alternative on error and records
//! which path produced the value.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Which path produced a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Origin {
    Primary,
    Fallback { reason: String },
}

impl Origin {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Origin::Fallback { .. })
    }

    /// Short tag for logs and trace entries.
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Primary => "primary",
            Origin::Fallback { .. } => "fallback",
        }
    }
}

/// Value plus the path that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Resolved<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

pub struct Fallback;

impl Fallback {
    /// Take the primary value, or run `fallback` with the error.
    pub fn resolve<T, E, F>(result: Result<T, E>, fallback: F) -> Resolved<T>
    where
        E: Display,
        F: FnOnce(&E) -> T,
    {
        match result {
            Ok(value) => Resolved {
                value,
                origin: Origin::Primary,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Primary path failed, using fallback");
                Resolved {
                    value: fallback(&e),
                    origin: Origin::Fallback {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}
