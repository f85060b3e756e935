//! Credentials that grant scoped write access to the trusted API.

use std::collections::BTreeSet;

/// Shared-secret credential managed by an administrative collaborator.
///
/// An empty `authorized_resource_keys` set denies every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCredential {
    pub id: String,
    pub secret: String,
    pub authorized_resource_keys: BTreeSet<String>,
}

impl AuthCredential {
    pub fn authorizes(&self, resource_key: &str) -> bool {
        self.authorized_resource_keys.contains(resource_key)
    }

    /// Authorized resource keys in stable order, for error messages.
    pub fn authorized_list(&self) -> Vec<&str> {
        self.authorized_resource_keys
            .iter()
            .map(String::as_str)
            .collect()
    }
}
