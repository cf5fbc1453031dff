//! Entity domains the bridge can control
//!
//! The bridge only drives `switch` and `light` entities. Every other domain is
//! carried through as [`Domain::Other`] so the dispatcher can reject it with
//! the domain name in the acknowledgment.

use std::fmt;

/// Service name for switching an entity on
pub const SERVICE_TURN_ON: &str = "turn_on";

/// Service name for switching an entity off
pub const SERVICE_TURN_OFF: &str = "turn_off";

/// The domain part of an entity ID, as far as command dispatch is concerned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// `switch.*` entities: on/off only
    Switch,
    /// `light.*` entities: on/off with optional brightness
    Light,
    /// Any domain the bridge does not control
    Other(String),
}

impl Domain {
    /// Domain name as used in entity IDs and service URLs
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Switch => "switch",
            Domain::Light => "light",
            Domain::Other(name) => name,
        }
    }

    /// Service that drives an entity of this domain to the desired state
    pub fn toggle_service(on: bool) -> &'static str {
        if on {
            SERVICE_TURN_ON
        } else {
            SERVICE_TURN_OFF
        }
    }

    /// Whether the bridge knows how to dispatch commands for this domain
    pub fn is_supported(&self) -> bool {
        !matches!(self, Domain::Other(_))
    }
}

impl From<&str> for Domain {
    fn from(name: &str) -> Self {
        match name {
            "switch" => Domain::Switch,
            "light" => Domain::Light,
            other => Domain::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
