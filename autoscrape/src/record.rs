use std::collections::BTreeMap;

use serde::Serialize;

/// Name of the field injected into every record with the target name.
pub const SOURCE_FIELD: &str = "source";

/// One scraped item: field name to value, `None` when the selector matched nothing.
///
/// Fields are kept sorted by name, so two records built in a different order
/// compare (and hash) the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Record(BTreeMap<String, Option<String>>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Option<String>) {
        self.0.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Raw value of `field`, empty strings included.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_deref())
    }

    /// Value of `field`, if present and not empty.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|v| !v.is_empty())
    }

    /// At least one field carries a non-empty value.
    pub fn has_content(&self) -> bool {
        self.0.values().flatten().any(|v| !v.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_order_does_not_matter() {
        let a = Record::new().with("title", "A").with("link", "u");
        let b = Record::new().with("link", "u").with("title", "A");
        assert_eq!(a, b);
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let absent: Record = [("title", None::<&str>)].into_iter().collect();
        let empty: Record = [("title", Some(""))].into_iter().collect();
        assert_ne!(absent, empty);
        assert!(!absent.has_content());
        assert!(!empty.has_content());
        assert_eq!(None, empty.value("title"));
    }

    #[test]
    fn test_has_content() {
        let r: Record = [("a", None), ("b", Some("x"))].into_iter().collect();
        assert!(r.has_content());
        assert_eq!(Some("x"), r.value("b"));
    }
}
