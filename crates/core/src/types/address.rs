//! Postal address snapshot.

use serde::{Deserialize, Serialize};

/// A postal address.
///
/// Stored on customers as their current address and copied onto orders as an
/// immutable shipping/billing snapshot, so later profile edits never rewrite
/// order history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Recipient name, when it differs from the customer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    /// State, province, or emirate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl Address {
    /// True when no line of the address carries any content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.line1.trim().is_empty()
            && self.line2.as_deref().is_none_or(|l| l.trim().is_empty())
            && self.city.trim().is_empty()
            && self.postal_code.trim().is_empty()
            && self.country.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_blank() {
        assert!(Address::default().is_blank());
        let addr = Address {
            city: "Kuala Lumpur".to_owned(),
            ..Address::default()
        };
        assert!(!addr.is_blank());
    }
}
