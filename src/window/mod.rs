//! Reaction windows
//!
//! A reaction window is the bounded interval in which a defender may answer
//! an incoming attack. This module owns the window data model, the rank to
//! duration policy, and the registry of currently open windows.
//!
//! # Architecture
//!
//! - [`RankDurationTable`]: Pure lookup from power rank to window length
//! - [`ReactionWindow`]: One open window and its single terminal transition
//! - [`WindowRegistry`]: Concurrent store of open windows with per-window locks

pub mod rank;
pub mod registry;
pub mod state;

pub use rank::{Rank, RankDurationTable, RankEntry};
pub use registry::{WindowHandle, WindowRegistry};
pub use state::{ReactionWindow, WindowSnapshot, WindowStatus};

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Correlation key of a window, usually the id of the attack action.
    WindowId
);

string_id!(
    /// Identity of the defending actor. May name a non-interactive actor.
    SubjectId
);

string_id!(
    /// Channel or room a window belongs to; used only to route notifications.
    ContextId
);

impl WindowId {
    /// Generates a fresh random window id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
