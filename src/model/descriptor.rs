use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies one node being traversed within one crawl.
///
/// The global asset id is stamped onto every tombstone produced while
/// processing this node, regardless of which step failed. The BPN (business
/// partner number) names the data owner whose connectors offer the node's
/// submodels; without it no remote retrieval is possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartChainIdentificationKey {
    pub global_asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpn: Option<String>,
    /// Optional extra discriminators (e.g. batch or serial scoping)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub discriminators: BTreeMap<String, String>,
}

impl PartChainIdentificationKey {
    pub fn new(global_asset_id: impl Into<String>, bpn: impl Into<String>) -> Self {
        Self {
            global_asset_id: global_asset_id.into(),
            bpn: Some(bpn.into()),
            discriminators: BTreeMap::new(),
        }
    }

    pub fn without_bpn(global_asset_id: impl Into<String>) -> Self {
        Self {
            global_asset_id: global_asset_id.into(),
            bpn: None,
            discriminators: BTreeMap::new(),
        }
    }

    /// Resolvable owning business partner, if any. Blank values count as
    /// unresolved.
    pub fn resolved_bpn(&self) -> Option<&str> {
        self.bpn
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Ordered set of namespace-qualified type strings identifying a submodel's
/// aspect type. The first value is the primary type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticId {
    pub values: Vec<String>,
}

impl SemanticId {
    pub fn of(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    pub fn primary(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn matches(&self, aspect_type: &str) -> bool {
        self.values.iter().any(|value| value == aspect_type)
    }
}

/// Human-readable description attached to a submodel descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub language: String,
    pub text: String,
}

/// Connection metadata for one remote location offering a submodel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolInformation {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol_body: Option<String>,
}

/// One remote location offering a submodel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub interface: String,
    pub protocol_information: ProtocolInformation,
}

/// Remote record describing one submodel available on a shell.
///
/// Immutable, sourced from the remote shell descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelDescriptor {
    pub identification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<Description>,
    pub semantic_id: SemanticId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
}

impl SubmodelDescriptor {
    pub fn aspect_type(&self) -> Option<&str> {
        self.semantic_id.primary()
    }

    /// Href of the first declared endpoint, used on tombstones produced
    /// before any remote attempt was made.
    pub fn declared_href(&self) -> Option<&str> {
        self.endpoints
            .first()
            .map(|endpoint| endpoint.protocol_information.href.as_str())
    }
}

/// Remote record listing the submodels available for one traceable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellDescriptor {
    pub global_asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default)]
    pub submodel_descriptors: Vec<SubmodelDescriptor>,
}
