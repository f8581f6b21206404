use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validated aspect payload collected for a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    /// Identification of the descriptor the payload was fetched for
    pub identification: String,
    /// Semantic type classifying the payload's schema/content
    pub aspect_type: String,
    pub payload: Value,
}

impl Submodel {
    pub fn new(
        identification: impl Into<String>,
        aspect_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            identification: identification.into(),
            aspect_type: aspect_type.into(),
            payload,
        }
    }
}
