//! The external representation of list-view state: a query-string shaped
//! view link that every state key mirrors into.
//!
//! An `Address` is an ordered set of `key=value` parameters. Keys appear
//! only while their state differs from the default, so a fresh view renders
//! an empty link. `SharedAddress` is the single mutable copy a coordinator
//! tree writes into; everything else sees snapshots.

use std::cell::RefCell;
use std::rc::Rc;

/// One shareable address: an ordered set of key=value parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pairs: Vec<(String, String)>,
}

impl Address {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Parse from a rendered link. Accepts a bare query string, a leading
    /// `?`, or a full `path?query` form. Malformed percent escapes keep
    /// their raw text rather than failing the whole link.
    pub fn parse(link: &str) -> Self {
        let query = match link.split_once('?') {
            Some((_, q)) => q,
            None => link,
        };
        let mut pairs = Vec::new();
        for part in query.split('&') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k, v),
                None => (part, ""),
            };
            pairs.push((decode(key), decode(value)));
        }
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, keeping its position if it already exists. New keys are
    /// appended; flushes apply changes in registry order, so links minted
    /// by the engine always come out in a stable order.
    pub fn set(&mut self, key: &str, value: String) {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.pairs.push((key.to_string(), value));
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Render as a shareable query string (`?a=1&b=2`; empty string when
    /// no parameters are present). Values are percent-encoded.
    pub fn render(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let mut out = String::from("?");
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&urlencoding::encode(value));
        }
        out
    }
}

fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(cow) => cow.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// The single mutable external representation owned by one coordinator
/// tree. Cloning shares the underlying address.
#[derive(Clone, Default)]
pub struct SharedAddress {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Default)]
struct Inner {
    current: Address,
    writes: u64,
}

impl SharedAddress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the address from an existing link, e.g. one pasted back in to
    /// restore a bookmarked view.
    pub fn with_link(link: &str) -> Self {
        let shared = Self::new();
        shared.inner.borrow_mut().current = Address::parse(link);
        shared
    }

    pub fn current(&self) -> Address {
        self.inner.borrow().current.clone()
    }

    pub fn replace(&self, next: Address) {
        let mut inner = self.inner.borrow_mut();
        inner.current = next;
        inner.writes += 1;
    }

    /// Number of replacements performed so far. One flush is exactly one
    /// write, which is what the batching guarantees are stated in terms of.
    pub fn write_count(&self) -> u64 {
        self.inner.borrow().writes
    }

    pub fn render(&self) -> String {
        self.inner.borrow().current.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_round_trip() {
        let addr = Address::parse("?page=2&search=rust%20basics");
        assert_eq!(addr.get("page"), Some("2"));
        assert_eq!(addr.get("search"), Some("rust basics"));
        assert_eq!(addr.render(), "?page=2&search=rust%20basics");
    }

    #[test]
    fn test_parse_accepts_full_links_and_bare_queries() {
        let full = Address::parse("/courses?page=3");
        assert_eq!(full.get("page"), Some("3"));

        let bare = Address::parse("page=3");
        assert_eq!(bare.get("page"), Some("3"));

        let empty = Address::parse("");
        assert!(empty.is_empty());
        assert_eq!(empty.render(), "");
    }

    #[test]
    fn test_set_keeps_position_remove_drops() {
        let mut addr = Address::parse("?a=1&b=2&c=3");
        addr.set("b", "9".to_string());
        assert_eq!(addr.render(), "?a=1&b=9&c=3");

        addr.remove("a");
        assert_eq!(addr.render(), "?b=9&c=3");

        addr.set("d", "4".to_string());
        assert_eq!(addr.render(), "?b=9&c=3&d=4");
    }

    #[test]
    fn test_json_values_survive_encoding() {
        let mut addr = Address::new();
        addr.set("column_filters", r#"[{"id":"status","value":"active"}]"#.to_string());
        let rendered = addr.render();
        assert!(!rendered.contains('{'), "braces must be percent-encoded");

        let back = Address::parse(&rendered);
        assert_eq!(
            back.get("column_filters"),
            Some(r#"[{"id":"status","value":"active"}]"#)
        );
    }

    #[test]
    fn test_shared_address_counts_writes() {
        let shared = SharedAddress::new();
        assert_eq!(shared.write_count(), 0);

        let mut next = shared.current();
        next.set("page", "2".to_string());
        shared.replace(next);

        assert_eq!(shared.write_count(), 1);
        assert_eq!(shared.render(), "?page=2");
    }
}
