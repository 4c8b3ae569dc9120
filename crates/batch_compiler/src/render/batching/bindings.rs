//! Uniform binding point allocation
//!
//! A fixed pool of binding points handed out by purpose string. A purpose keeps
//! its point for the allocator's lifetime, and points are never reused, so two
//! groups that declare the same purpose share one binding point and rebind
//! their own buffer to it before drawing.

use std::collections::HashMap;

use super::error::{BuildError, BuildResult};

/// Binding point allocator owned by one compiler
#[derive(Debug, Clone)]
pub struct BindingAllocator {
    capacity: usize,
    assigned: HashMap<String, u32>,
    next: u32,
}

impl BindingAllocator {
    /// Create a pool of `capacity` binding points
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            assigned: HashMap::new(),
            next: 0,
        }
    }

    /// Binding point for `purpose`, assigning the next free one on first use
    pub fn allocate(&mut self, purpose: &str) -> BuildResult<u32> {
        if let Some(binding) = self.assigned.get(purpose) {
            return Ok(*binding);
        }

        if self.next as usize >= self.capacity {
            return Err(BuildError::BindingPoolExhausted {
                purpose: purpose.to_string(),
                capacity: self.capacity,
            });
        }

        let binding = self.next;
        self.next += 1;
        self.assigned.insert(purpose.to_string(), binding);
        log::debug!("Assigned binding point {} to '{}'", binding, purpose);
        Ok(binding)
    }

    /// Binding point already assigned to `purpose`
    pub fn get(&self, purpose: &str) -> Option<u32> {
        self.assigned.get(purpose).copied()
    }

    /// Pool size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points handed out so far
    pub fn allocated(&self) -> usize {
        self.assigned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_purpose_same_binding() {
        let mut bindings = BindingAllocator::new(4);
        let mvps = bindings.allocate("mvps").unwrap();
        let models = bindings.allocate("models").unwrap();
        assert_ne!(mvps, models);
        assert_eq!(bindings.allocate("mvps").unwrap(), mvps);
        assert_eq!(bindings.allocated(), 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut bindings = BindingAllocator::new(1);
        bindings.allocate("mvps").unwrap();
        assert_eq!(
            bindings.allocate("models").unwrap_err(),
            BuildError::BindingPoolExhausted {
                purpose: "models".to_string(),
                capacity: 1,
            }
        );
        assert!(bindings.allocate("mvps").is_ok());
        assert_eq!(bindings.get("models"), None);
    }
}
