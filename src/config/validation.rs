use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Worker count must be positive")]
    NoWorkers,

    #[error("Worker channel size must be positive")]
    ZeroChannelSize,

    #[error("Poll interval must be positive")]
    ZeroPollInterval,

    #[error("Request TTL ({ttl}) must exceed the poll interval ({interval})")]
    RequestTtlTooSmall { ttl: String, interval: String },

    #[error("Relationship aspect must not be empty")]
    EmptyRelationshipAspect,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.runtime.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.runtime.channel_size == 0 {
        return Err(ValidationError::ZeroChannelSize);
    }
    if config.polling.poll_interval.as_millis() == 0 {
        return Err(ValidationError::ZeroPollInterval);
    }
    if config.polling.request_ttl.as_millis() <= config.polling.poll_interval.as_millis() {
        return Err(ValidationError::RequestTtlTooSmall {
            ttl: config.polling.request_ttl.to_human_readable(),
            interval: config.polling.poll_interval.to_human_readable(),
        });
    }
    if config.traversal.relationship_aspect.trim().is_empty() {
        return Err(ValidationError::EmptyRelationshipAspect);
    }
    Ok(())
}
