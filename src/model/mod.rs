//! Domain values for part-chain traversal
//!
//! These are the value types flowing through the delegate chain and into
//! batch results:
//!
//! - [`PartChainIdentificationKey`] - identifies one traversed node
//! - [`ShellDescriptor`] / [`SubmodelDescriptor`] - remote shell contents
//! - [`Submodel`] - one validated aspect payload
//! - [`Tombstone`] - one structured, irrecoverable failure
//!
//! Everything here is serde-serializable so the surrounding service can
//! export merged batch results as JSON.

mod descriptor;
mod submodel;
mod tombstone;

pub use descriptor::{
    Description, Endpoint, PartChainIdentificationKey, ProtocolInformation, SemanticId,
    ShellDescriptor, SubmodelDescriptor,
};
pub use submodel::Submodel;
pub use tombstone::{ProcessStep, ProcessingError, Tombstone};
