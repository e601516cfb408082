//! Ordered, de-duplicated string lists
//!
//! Command-line list values (`-r web,theme`, `-i img`) and watch patterns are
//! collected into an [`ItemList`]. Input may be a single value, a
//! delimiter-joined value, or a nested list of either.

/// Default delimiter for list-valued flags.
pub const DEFAULT_DELIMITER: char = ',';

/// Input accepted by [`ItemList::add`] and [`ItemList::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    /// A single value, possibly containing the delimiter
    One(String),
    /// A nested list of values
    Many(Vec<Items>),
}

impl From<&str> for Items {
    fn from(value: &str) -> Self {
        Items::One(value.to_string())
    }
}

impl From<String> for Items {
    fn from(value: String) -> Self {
        Items::One(value)
    }
}

impl From<&String> for Items {
    fn from(value: &String) -> Self {
        Items::One(value.clone())
    }
}

impl From<&std::path::Path> for Items {
    fn from(value: &std::path::Path) -> Self {
        Items::One(value.display().to_string())
    }
}

impl<T: Into<Items>> From<Vec<T>> for Items {
    fn from(values: Vec<T>) -> Self {
        Items::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Items>> From<Option<T>> for Items {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Items::Many(Vec::new()),
        }
    }
}

/// An ordered list where every value appears at most once.
///
/// Re-adding a value moves it to the end.
///
/// # Examples
///
/// ```
/// use assetflow::items::ItemList;
///
/// let list = ItemList::from_items("a, b, a, c");
/// assert_eq!(list.items(), ["b", "a", "c"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemList {
    items: Vec<String>,
    delimiter: char,
}

impl Default for ItemList {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemList {
    /// Create an empty list using the default `,` delimiter.
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER)
    }

    /// Create an empty list splitting on `delimiter`.
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { items: Vec::new(), delimiter }
    }

    /// Create a list and add `items` to it.
    pub fn from_items(items: impl Into<Items>) -> Self {
        let mut list = Self::new();
        list.add(items);
        list
    }

    /// Add values, flattening nested lists and splitting on the delimiter.
    ///
    /// Each value is trimmed; empty values are ignored. A value already in
    /// the list is removed first, so it ends up last.
    pub fn add(&mut self, items: impl Into<Items>) -> &mut Self {
        for value in self.leaves(items.into()) {
            self.items.retain(|existing| *existing != value);
            self.items.push(value);
        }
        self
    }

    /// Remove values, using the same flattening and splitting rules as `add`.
    pub fn remove(&mut self, items: impl Into<Items>) -> &mut Self {
        for value in self.leaves(items.into()) {
            self.items.retain(|existing| *existing != value);
        }
        self
    }

    /// Current values in order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|item| item == value)
    }

    /// Flatten `items` into trimmed, non-empty leaf values in order.
    fn leaves(&self, items: Items) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(items, &mut out);
        out
    }

    fn collect_leaves(&self, items: Items, out: &mut Vec<String>) {
        match items {
            Items::Many(nested) => {
                for item in nested {
                    self.collect_leaves(item, out);
                }
            }
            Items::One(value) if value.contains(self.delimiter) => {
                for part in value.split(self.delimiter) {
                    self.collect_leaves(Items::One(part.to_string()), out);
                }
            }
            Items::One(value) => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a ItemList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_delimited_collapses_duplicates_to_last_position() {
        let list = ItemList::from_items("a, b, a, c");
        assert_eq!(list.items(), ["b", "a", "c"]);
    }

    #[test]
    fn test_add_trims_and_skips_empty() {
        let list = ItemList::from_items("  web  ,, ,theme,");
        assert_eq!(list.items(), ["web", "theme"]);
    }

    #[test]
    fn test_add_nested() {
        let nested = Items::Many(vec![
            Items::from("x,y"),
            Items::Many(vec![Items::from("z"), Items::from(" x ")]),
        ]);
        let list = ItemList::from_items(nested);
        assert_eq!(list.items(), ["y", "z", "x"]);
    }

    #[test]
    fn test_add_is_chainable() {
        let mut list = ItemList::new();
        list.add("a").add(vec!["b", "c"]).add("a");
        assert_eq!(list.items(), ["b", "c", "a"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove() {
        let mut list = ItemList::from_items("a,b,c,d");
        list.remove("b, d").remove(vec!["missing"]);
        assert_eq!(list.items(), ["a", "c"]);
        assert!(list.contains("a"));
        assert!(!list.contains("b"));
    }

    #[test]
    fn test_empty_inputs() {
        let mut list = ItemList::new();
        list.add("").add("   ").add(Items::Many(vec![])).add(None::<String>);
        assert!(list.is_empty());
    }

    #[test]
    fn test_custom_delimiter() {
        let mut list = ItemList::with_delimiter(';');
        list.add("a;b,c;a");
        assert_eq!(list.items(), ["b,c", "a"]);
    }

    #[test]
    fn test_every_value_once() {
        let mut list = ItemList::new();
        for raw in ["a,b", "b,c", "c,a", "a"] {
            list.add(raw);
        }
        let mut sorted = list.items().to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), list.len());
    }
}
