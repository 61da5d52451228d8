//! Day-status widget state.
//!
//! An in-memory "day opened / closed" flag with a toggle. It starts from a
//! mock status source and is not connected to the fiscalization service;
//! restarting resets it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the fiscal day is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    Opened,
    Closed,
}

/// Stand-in for the device status call. Always reports a closed day.
pub fn mock_get_status() -> bool {
    false
}

impl DayStatus {
    /// Initial state from the mock status source.
    pub fn initial() -> Self {
        Self::from_flag(mock_get_status())
    }

    pub fn from_flag(is_open: bool) -> Self {
        if is_open {
            Self::Opened
        } else {
            Self::Closed
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Opened
    }

    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::Opened => Self::Closed,
            Self::Closed => Self::Opened,
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            Self::Opened => "Day is OPENED",
            Self::Closed => "Day is CLOSED",
        }
    }

    /// Label of the button that flips the state.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Opened => "Close Day",
            Self::Closed => "Open Day",
        }
    }
}

impl Default for DayStatus {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.headline())
    }
}
