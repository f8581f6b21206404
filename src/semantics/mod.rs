//! Schema acquisition and payload validation capabilities
//!
//! Schema-registry lookup internals are out of scope; the pipeline consumes
//! them through [`SchemaProvider`] and [`SchemaValidator`]. The error split in
//! [`SchemaError`] matters downstream: a malformed schema document tombstones
//! as a validation failure, while not-found and transport failures tombstone
//! as schema-request failures.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no schema registered for {0}")]
    NotFound(String),

    #[error("malformed schema document: {0}")]
    Malformed(String),

    #[error("schema lookup failed: {0}")]
    Transport(String),
}

/// A resolved aspect-type JSON schema
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub semantic_id: String,
    pub document: Value,
}

/// Resolves the JSON schema for an aspect type, possibly remotely
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn schema_for(&self, semantic_id: &str) -> Result<SchemaDocument, SchemaError>;
}

/// Outcome of validating one payload against one schema
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    pub fn invalid(violations: Vec<String>) -> Self {
        Self {
            valid: false,
            violations,
        }
    }
}

/// Validates payloads against aspect-type schemas
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, payload: &Value, schema: &SchemaDocument) -> ValidationReport;
}
