//! Material parameter observers
//!
//! Render groups subscribe to the `(material, parameter)` pairs their packed
//! material buffer depends on. A parameter change looks up its subscribers here
//! instead of calling back into groups, and a torn-down group is purged from
//! every entry.

use std::collections::HashMap;

use crate::foundation::collections::MaterialKey;

/// Index of a render group inside the compiler's current group list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

/// `(material, parameter)` to subscribing groups
#[derive(Debug, Default)]
pub struct ParameterObservers {
    subscribers: HashMap<(MaterialKey, String), Vec<GroupId>>,
}

impl ParameterObservers {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `group` to changes of `parameter` on `material`
    pub fn subscribe(&mut self, material: MaterialKey, parameter: &str, group: GroupId) {
        let groups = self.subscribers.entry((material, parameter.to_string())).or_default();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }

    /// Groups subscribed to `parameter` on `material`
    pub fn subscribers(&self, material: MaterialKey, parameter: &str) -> &[GroupId] {
        self.subscribers
            .get(&(material, parameter.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// Remove a group from every entry
    pub fn remove_group(&mut self, group: GroupId) {
        self.subscribers.retain(|_, groups| {
            groups.retain(|g| *g != group);
            !groups.is_empty()
        });
    }

    /// Drop every subscription
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Number of observed `(material, parameter)` pairs
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nothing is observed
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
