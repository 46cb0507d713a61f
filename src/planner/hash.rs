//! Template fingerprinting.
//!
//! The fingerprint is computed over the serialized template, which is
//! byte-stable because every map in it is ordered.

use sha2::{Digest, Sha256};

use crate::error::Result;

use super::template::StackPlan;

/// Hasher for computing template fingerprints.
#[derive(Debug, Default)]
pub struct PlanHasher;

impl PlanHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the SHA-256 hex digest of a plan's JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be serialized.
    pub fn hash_plan(&self, plan: &StackPlan) -> Result<String> {
        let canonical = plan.to_json()?.to_string();
        Ok(self.hash_bytes(canonical.as_bytes()))
    }

    /// Computes the SHA-256 hex digest of raw bytes.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::template::{Resource, ResourceFragment, ResourceType};

    fn plan_with(name: &str) -> StackPlan {
        let mut resources = ResourceFragment::new();
        resources
            .insert(name, Resource::new(ResourceType::SecurityGroup))
            .unwrap();
        StackPlan::with_resources(resources)
    }

    #[test]
    fn test_plan_hash_deterministic() {
        let hasher = PlanHasher::new();
        let a = hasher.hash_plan(&plan_with("sec")).unwrap();
        let b = hasher.hash_plan(&plan_with("sec")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hasher.hash_plan(&plan_with("sec-2")).unwrap());
    }

    #[test]
    fn test_short_hash() {
        let hasher = PlanHasher::new();
        let short = hasher.short_hash("abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }
}
