//! Caller identity: canonical client ids, client apps and policy flags.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical client identity. Unmapped callers stay `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientId {
    Unknown,
    Skype,
    Bing,
    Outlook,
    Edge,
}

impl ClientId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientId::Unknown => "Unknown",
            ClientId::Skype => "Skype",
            ClientId::Bing => "Bing",
            ClientId::Outlook => "Outlook",
            ClientId::Edge => "Edge",
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical client application (the platform segment of the caller token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientApp {
    Unknown,
    Android,
    Ios,
    WindowsPhone,
    Desktop,
    Web,
}

impl ClientApp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientApp::Unknown => "Unknown",
            ClientApp::Android => "Android",
            ClientApp::Ios => "iOS",
            ClientApp::WindowsPhone => "WindowsPhone",
            ClientApp::Desktop => "Desktop",
            ClientApp::Web => "Web",
        }
    }
}

impl fmt::Display for ClientApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw value to canonical value lookup tables, as configured.
///
/// Keys are matched case-insensitively against caller token segments; the id
/// table and the app table are independent of each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMappings {
    #[serde(default)]
    pub id_values: HashMap<String, ClientId>,
    #[serde(default)]
    pub app_values: HashMap<String, ClientApp>,
}

/// Resolved caller identity. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Client {
    pub id: ClientId,
    pub app: ClientApp,
}

impl Client {
    pub fn new(id: ClientId, app: ClientApp) -> Self {
        Self { id, app }
    }

    /// Composite key used by allocation and placement lookups.
    pub fn key(&self) -> String {
        format!("{}_{}", self.id.as_str(), self.app.as_str())
    }

    /// Whether result sets for this client must be restricted to the
    /// caller's home market.
    pub fn filter_deals_by_market(&self) -> bool {
        matches!(self.id, ClientId::Skype | ClientId::Outlook)
    }

    /// Whether this (id, app) combination serves monetized placements.
    /// Fixed policy table, not configuration-driven.
    pub fn is_monetizable(&self) -> bool {
        matches!(
            (self.id, self.app),
            (ClientId::Skype, ClientApp::Android)
                | (ClientId::Skype, ClientApp::Ios)
                | (ClientId::Skype, ClientApp::Desktop)
                | (ClientId::Bing, ClientApp::Web)
                | (ClientId::Edge, ClientApp::Web)
        )
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id.as_str(), self.app.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_format() {
        let client = Client::new(ClientId::Skype, ClientApp::Android);
        assert_eq!(client.key(), "Skype_Android");

        let unknown = Client::new(ClientId::Unknown, ClientApp::Unknown);
        assert_eq!(unknown.key(), "Unknown_Unknown");
    }

    #[test]
    fn test_policy_flags_derive_from_identity() {
        assert!(Client::new(ClientId::Skype, ClientApp::Ios).filter_deals_by_market());
        assert!(Client::new(ClientId::Outlook, ClientApp::Web).filter_deals_by_market());
        assert!(!Client::new(ClientId::Bing, ClientApp::Web).filter_deals_by_market());

        assert!(Client::new(ClientId::Skype, ClientApp::Android).is_monetizable());
        assert!(Client::new(ClientId::Edge, ClientApp::Web).is_monetizable());
        assert!(!Client::new(ClientId::Skype, ClientApp::Web).is_monetizable());
        assert!(!Client::new(ClientId::Unknown, ClientApp::Unknown).is_monetizable());
    }

    #[test]
    fn test_same_identity_same_flags() {
        let a = Client::new(ClientId::Bing, ClientApp::Web);
        let b = Client::new(ClientId::Bing, ClientApp::Web);
        assert_eq!(a, b);
        assert_eq!(a.is_monetizable(), b.is_monetizable());
        assert_eq!(a.filter_deals_by_market(), b.filter_deals_by_market());
    }
}
