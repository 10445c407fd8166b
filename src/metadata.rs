use std::collections::HashSet;

use dashmap::DashMap;

/// Slowly-changing attributes of one queue, taken from its definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// The queue was reported by the most recent inventory query.
    pub exists: bool,
    /// Configured MAXDEPTH.
    pub max_depth: i64,
    /// Configured USAGE (normal or transmission).
    pub usage: i64,
    pub description: String,
}

/// Attribute values decoded from one attribute-inquiry reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub name: String,
    pub max_depth: Option<i64>,
    pub usage: Option<i64>,
    pub description: Option<String>,
}

/// Shared cache of queue definitions, refreshed on the discovery cycle and
/// read during collection.
///
/// Entries are always replaced as a whole, so a reader sees either the old
/// or the new record and never a mix.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<String, ObjectMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ObjectMetadata> {
        self.entries.get(name).map(|e| e.value().clone())
    }

    /// Fold an attribute reply into the entry for its queue.
    ///
    /// Only positive numbers and non-empty descriptions replace cached
    /// values; a zero or blank in a reply keeps what was there. A queue the
    /// inventory has not reported gets an entry that does not exist yet, so
    /// it is never a per-object query target.
    pub fn merge(&self, attrs: &ObjectAttributes) {
        if attrs.name.is_empty() {
            return;
        }

        let mut next = self.get(&attrs.name).unwrap_or_default();

        if let Some(v) = attrs.max_depth.filter(|v| *v > 0) {
            next.max_depth = v;
        }
        if let Some(v) = attrs.usage.filter(|v| *v > 0) {
            next.usage = v;
        }
        if let Some(d) = attrs.description.as_ref().filter(|d| !d.is_empty()) {
            next.description = d.clone();
        }

        self.entries.insert(attrs.name.clone(), next);
    }

    /// Replace the set of known queues with an inventory result.
    ///
    /// Queues no longer listed are dropped, queues still listed keep their
    /// cached attributes and new queues get an empty entry.
    pub fn sync_inventory(&self, names: &[String]) {
        let listed: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.entries.retain(|name, _| listed.contains(name.as_str()));

        for name in names.iter().filter(|n| !n.is_empty()) {
            let next = match self.get(name) {
                Some(existing) => ObjectMetadata {
                    exists: true,
                    ..existing
                },
                None => ObjectMetadata {
                    exists: true,
                    ..Default::default()
                },
            };
            self.entries.insert(name.clone(), next);
        }
    }

    /// Names of existing queues, sorted.
    pub fn known_objects(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().exists && !e.key().is_empty())
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
