//! Identifier generators used when a model has no explicit `id` field.

use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Value;
}

/// Random 32-character hex identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Value {
        Value::String(Uuid::new_v4().simple().to_string())
    }
}

/// Monotonically increasing integer identifiers, local to one process.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicI64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequenceGenerator {
    fn generate(&self) -> Value {
        Value::from(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_unique_strings() {
        let generator = UuidGenerator;
        let ids: HashSet<String> = (0..100)
            .map(|_| generator.generate().as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.len() == 32));
    }

    #[test]
    fn sequence_counts_up() {
        let generator = SequenceGenerator::starting_at(10);
        assert_eq!(generator.generate(), Value::from(10));
        assert_eq!(generator.generate(), Value::from(11));
    }
}
