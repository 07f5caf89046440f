//! Application-defined custom metric and dimension keys and the registries that map them to the
//! numeric slots the collection endpoint expects (`cm<index>` / `cd<index>`).

use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::analytics::error::{invalid_argument, AnalyticsResult};

/// Key family shared by [`MetricKey`] and [`DimensionKey`].
pub trait IndexedKey: Clone + Ord + fmt::Debug + fmt::Display {
    /// Value type paired with keys of this family inside a hit.
    type Value: Clone + fmt::Debug + fmt::Display;

    /// Human readable family name used in error messages.
    const FAMILY: &'static str;

    /// Wire field prefix the slot index is appended to.
    const WIRE_PREFIX: &'static str;
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey(Cow<'static, str>);

impl MetricKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Usable in `const`/`static` declarations.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IndexedKey for MetricKey {
    type Value = u32;
    const FAMILY: &'static str = "metric";
    const WIRE_PREFIX: &'static str = "cm";
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionKey(Cow<'static, str>);

impl DimensionKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IndexedKey for DimensionKey {
    type Value = String;
    const FAMILY: &'static str = "dimension";
    const WIRE_PREFIX: &'static str = "cd";
}

/// Immutable key to slot lookup table, one per key family.
///
/// Keys and indices are both unique within a registry. Registries of different families are
/// independent, so a metric and a dimension may share an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRegistry<K: IndexedKey> {
    slots: BTreeMap<K, u32>,
}

pub type MetricRegistry = IndexRegistry<MetricKey>;
pub type DimensionRegistry = IndexRegistry<DimensionKey>;

impl<K: IndexedKey> IndexRegistry<K> {
    pub fn from_entries<I>(entries: I) -> AnalyticsResult<Self>
    where
        I: IntoIterator<Item = (K, u32)>,
    {
        let mut slots = BTreeMap::new();
        let mut used = BTreeSet::new();
        for (key, index) in entries {
            if !used.insert(index) {
                return Err(invalid_argument(format!(
                    "{} index {index} is assigned to more than one key",
                    K::FAMILY
                )));
            }
            match slots.entry(key) {
                Entry::Occupied(existing) => {
                    return Err(invalid_argument(format!(
                        "{} key `{}` is registered twice",
                        K::FAMILY,
                        existing.key()
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
        Ok(Self { slots })
    }

    pub fn index_of(&self, key: &K) -> Option<u32> {
        self.slots.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u32)> {
        self.slots.iter().map(|(key, index)| (key, *index))
    }
}
