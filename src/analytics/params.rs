use std::collections::BTreeMap;

/// Wire field name to wire value mapping produced for a single hit.
///
/// Entries iterate in field-name order so serialized bodies are deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterMap {
    fields: BTreeMap<String, String>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Inserts `value` shortened to at most `max_len` bytes. `None` leaves the map unchanged.
    pub(crate) fn insert_limited(&mut self, name: &str, value: Option<&str>, max_len: usize) {
        if let Some(value) = value {
            self.insert(name, truncate_to_bytes(value, max_len));
        }
    }

    /// Moves every entry of `other` into this map, replacing fields with the same name.
    pub(crate) fn append(&mut self, other: ParameterMap) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the map as an `application/x-www-form-urlencoded` body.
    pub fn to_form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ParameterMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Shortens `value` to at most `max_len` bytes without splitting a UTF-8 sequence.
pub(crate) fn truncate_to_bytes(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
