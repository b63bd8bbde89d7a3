//! Pairing code directory
//!
//! Maps human-shared pairing codes to durable source identities. Codes are
//! bound once and never expire. The directory has no locking of its own; it
//! lives inside the registry's state and is mutated under the registry lock.

use std::collections::HashMap;

use super::error::RegistryError;
use super::identity::SourceId;

#[derive(Debug, Default)]
pub struct PairingDirectory {
    codes: HashMap<String, SourceId>,
}

impl PairingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the durable identity bound to `code`
    pub fn resolve(&self, code: &str) -> Result<SourceId, RegistryError> {
        self.codes
            .get(code)
            .cloned()
            .ok_or(RegistryError::UnknownCode)
    }

    /// Bind `code` to `durable_id`
    pub fn bind(&mut self, code: &str, durable_id: SourceId) -> Result<(), RegistryError> {
        if let Some(existing) = self.codes.get(code) {
            return Err(RegistryError::DuplicateCode {
                existing: existing.clone(),
            });
        }

        self.codes.insert(code.to_owned(), durable_id);
        Ok(())
    }
}
