//! Domain enums shared by entities, services, and handlers.
//!
//! Entities persist these as upper-case strings; parsing happens at the
//! service boundary so an unknown value surfaces as a validation error
//! instead of a panic.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum Role {
    #[strum(serialize = "ADMIN")]
    #[serde(rename = "ADMIN")]
    Admin,
    #[strum(serialize = "MANAGER")]
    #[serde(rename = "MANAGER")]
    Manager,
    #[strum(serialize = "WORKER")]
    #[serde(rename = "WORKER")]
    Worker,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum OrderStatus {
    #[strum(serialize = "PENDING")]
    #[serde(rename = "PENDING")]
    Pending,
    #[strum(serialize = "IN_PRODUCTION")]
    #[serde(rename = "IN_PRODUCTION")]
    InProduction,
    #[strum(serialize = "COMPLETED")]
    #[serde(rename = "COMPLETED")]
    Completed,
    #[strum(serialize = "CANCELLED")]
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    /// COMPLETED and CANCELLED accept no further status writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Forward-only transition graph. Identity transitions are allowed so a
    /// patch repeating the current status is a no-op rather than an error.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Pending => matches!(
                next,
                Self::InProduction | Self::Completed | Self::Cancelled
            ),
            Self::InProduction => matches!(next, Self::Completed | Self::Cancelled),
            Self::Completed | Self::Cancelled => false,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum StageStatus {
    #[strum(serialize = "PLANNED")]
    #[serde(rename = "PLANNED")]
    Planned,
    #[strum(serialize = "IN_PROGRESS")]
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[strum(serialize = "COMPLETED")]
    #[serde(rename = "COMPLETED")]
    Completed,
    #[strum(serialize = "DELAYED")]
    #[serde(rename = "DELAYED")]
    Delayed,
    #[strum(serialize = "CANCELLED")]
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum TaskStatus {
    #[strum(serialize = "PENDING")]
    #[serde(rename = "PENDING")]
    Pending,
    #[strum(serialize = "IN_PROGRESS")]
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[strum(serialize = "COMPLETED")]
    #[serde(rename = "COMPLETED")]
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum ProductType {
    #[strum(serialize = "NEON")]
    #[serde(rename = "NEON")]
    Neon,
    #[strum(serialize = "LED")]
    #[serde(rename = "LED")]
    Led,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum ProductStatus {
    #[strum(serialize = "ACTIVE")]
    #[serde(rename = "ACTIVE")]
    Active,
    #[strum(serialize = "DISCONTINUED")]
    #[serde(rename = "DISCONTINUED")]
    Discontinued,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum MaterialType {
    #[strum(serialize = "RAW")]
    #[serde(rename = "RAW")]
    Raw,
    #[strum(serialize = "COMPONENT")]
    #[serde(rename = "COMPONENT")]
    Component,
    #[strum(serialize = "PACKAGING")]
    #[serde(rename = "PACKAGING")]
    Packaging,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in OrderStatus::iter() {
            assert_eq!(OrderStatus::from_str(status.as_ref()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("SHIPPED").is_err());
    }

    #[test]
    fn pending_moves_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::InProduction));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::InProduction.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::InProduction.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn terminal_states_reject_all_changes() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::iter().filter(|s| *s != terminal) {
                assert!(!terminal.can_transition_to(next));
            }
            // repeating the current status stays a no-op
            assert!(terminal.can_transition_to(terminal));
        }
    }
}
