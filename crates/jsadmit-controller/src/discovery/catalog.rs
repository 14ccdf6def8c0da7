use jsadmit_core::protocol::{ResourceKind, ResourceQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub kind: ResourceKind,
    /// Served under its group's preferred version.
    pub preferred: bool,
}

/// Served resources, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best match for `query`: the core group wins, then a group's
    /// preferred version, then discovery order.
    pub fn resolve(&self, query: &ResourceQuery) -> Option<ResourceKind> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| query.matches(&e.kind))
            .min_by_key(|(idx, e)| (!e.kind.group.is_empty(), !e.preferred, *idx))
            .map(|(_, e)| e.kind.clone())
    }
}
