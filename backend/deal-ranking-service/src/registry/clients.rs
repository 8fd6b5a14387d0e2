//! Client identity resolution.

use std::collections::HashMap;
use tracing::warn;

use crate::models::client::{Client, ClientApp, ClientId, ClientMappings};

/// Case-insensitive value lookup tables turning raw caller tokens into
/// canonical (client id, client app) pairs.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    id_values: HashMap<String, ClientId>,
    app_values: HashMap<String, ClientApp>,
}

impl ClientRegistry {
    pub fn new(mappings: &ClientMappings) -> Self {
        let id_values = mappings
            .id_values
            .iter()
            .map(|(value, id)| (value.to_lowercase(), *id))
            .collect();
        let app_values = mappings
            .app_values
            .iter()
            .map(|(value, app)| (value.to_lowercase(), *app))
            .collect();
        Self { id_values, app_values }
    }

    /// Canonicalize a raw caller token.
    ///
    /// Only the first whitespace-delimited segment is considered; it splits
    /// once on `_` into an id segment and an optional app segment. Segments
    /// with no mapping resolve to `Unknown` without failing the request; the
    /// id miss is logged when `validate` is set.
    pub fn resolve(&self, raw: &str, validate: bool) -> Client {
        let token = raw.split_whitespace().next().unwrap_or("");
        let (id_segment, app_segment) = match token.split_once('_') {
            Some((id, app)) => (id, Some(app)),
            None => (token, None),
        };

        let id = match self.id_values.get(&id_segment.to_lowercase()) {
            Some(id) => *id,
            None => {
                if validate && !id_segment.is_empty() {
                    warn!(segment = %id_segment, "Unmapped client id segment, resolving as Unknown");
                }
                ClientId::Unknown
            }
        };

        let app = app_segment
            .and_then(|segment| self.app_values.get(&segment.to_lowercase()).copied())
            .unwrap_or(ClientApp::Unknown);

        Client::new(id, app)
    }
}
