use serde::{Deserialize, Serialize};

use crate::error::SourcingError;
use crate::ids::RfqId;

/// A buyer's request for a fixed number of containers.
///
/// The required count is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfq {
    id: RfqId,
    required_containers: u32,
    created_at_ms: u64,
}

impl Rfq {
    pub fn new(id: RfqId, required_containers: u32, created_at_ms: u64) -> Result<Self, SourcingError> {
        if required_containers == 0 {
            return Err(SourcingError::validation(format!(
                "{id} must require at least one container"
            )));
        }
        Ok(Self {
            id,
            required_containers,
            created_at_ms,
        })
    }

    pub fn id(&self) -> RfqId {
        self.id
    }

    pub fn required_containers(&self) -> u32 {
        self.required_containers
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}
