//! Display mapping for service statuses

use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::ServiceStatus;

/// Badge color of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
    Gray,
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusColor::Green => write!(f, "green"),
            StatusColor::Yellow => write!(f, "yellow"),
            StatusColor::Red => write!(f, "red"),
            StatusColor::Gray => write!(f, "gray"),
        }
    }
}

impl ServiceStatus {
    pub fn color(self) -> StatusColor {
        match self {
            ServiceStatus::Operational => StatusColor::Green,
            ServiceStatus::Degraded => StatusColor::Yellow,
            ServiceStatus::Downtime => StatusColor::Red,
            ServiceStatus::Maintenance => StatusColor::Gray,
        }
    }

    pub fn color_hex(self) -> &'static str {
        match self {
            ServiceStatus::Operational => "#10b981",
            ServiceStatus::Degraded => "#f59e0b",
            ServiceStatus::Downtime => "#ef4444",
            ServiceStatus::Maintenance => "#6b7280",
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            ServiceStatus::Operational => "Operational",
            ServiceStatus::Degraded => "Degraded",
            ServiceStatus::Downtime => "Down",
            ServiceStatus::Maintenance => "Maintenance",
        }
    }
}

/// Availability fraction as a percentage with two decimals, e.g. `99.90%`
pub fn format_availability(availability: f64) -> String {
    format!("{:.2}%", availability * 100.0)
}

/// Timestamp in the badge's `Oct 18, 2026, 02:03:04 PM` style
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%b %-d, %Y, %I:%M:%S %p").to_string()
}
