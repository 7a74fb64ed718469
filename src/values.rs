//! Multi-valued name/value containers.
//!
//! This module provides the [`Values`] trait, the abstraction used for both
//! header fields and form fields, and [`ValueMap`], the storage every bundled
//! implementation is built on.
//!
//! A [`ValueMap`] is parameterised by a [`Casing`] policy:
//!
//! - [`Exact`] keeps names verbatim (form fields, query parameters)
//! - [`Canonical`] maps names to canonical MIME header form, so
//!   `content-type` and `CONTENT-TYPE` address the same entry
//!
//! # Examples
//!
//! ```rust
//! use http_provider::{FormValues, HeaderValues, Values};
//!
//! let mut form = FormValues::new();
//! form.add("tag", "a");
//! form.add("tag", "b");
//! assert_eq!(form.values("tag"), ["a", "b"]);
//! assert!(!form.has("Tag"));
//!
//! let mut header = HeaderValues::new();
//! header.add("content-type", "text/plain");
//! assert_eq!(header.value("Content-Type"), "text/plain");
//! ```
use core::fmt;
use core::marker::PhantomData;
use std::borrow::Cow;
use std::collections::HashMap;

/// An ordered multi-map from names to string values.
///
/// Missing names are never an error: [`Values::value`] returns `""` and
/// [`Values::values`] returns an empty slice. Only [`Values::has`] (or
/// [`Values::values`]) distinguishes an absent name from one whose first
/// value is empty.
pub trait Values: Send {
    /// Calls `visit` for every name with its values. Order is unspecified.
    fn each(&self, visit: &mut dyn FnMut(&str, &[String]));

    /// Replaces the values stored under `name`.
    ///
    /// An empty `values` keeps `name` present with no values, which is
    /// distinct from deleting it.
    fn set(&mut self, name: &str, values: Vec<String>);

    /// Appends `value` to the values stored under `name`.
    fn add(&mut self, name: &str, value: &str);

    /// Removes `name` and all of its values.
    fn delete(&mut self, name: &str);

    /// Returns `true` if `name` is present, even with no values.
    fn has(&self, name: &str) -> bool;

    /// Returns the first value of `name`, or `""`.
    fn value(&self, name: &str) -> &str;

    /// Returns all values of `name`, or an empty slice.
    fn values(&self, name: &str) -> &[String];

    /// Returns the number of distinct names.
    fn len(&self) -> usize;

    /// Returns `true` if no names are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every name, leaving the container as if freshly constructed.
    fn reset(&mut self);
}

/// Name normalisation policy for a [`ValueMap`].
pub trait Casing: Send + Sync + 'static {
    /// Returns the storage key for `name`.
    fn normalize(name: &str) -> Cow<'_, str>;
}

/// Case-sensitive names, stored verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exact;

/// Case-insensitive names, stored in canonical MIME header form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Canonical;

impl Casing for Exact {
    fn normalize(name: &str) -> Cow<'_, str> {
        Cow::Borrowed(name)
    }
}

impl Casing for Canonical {
    fn normalize(name: &str) -> Cow<'_, str> {
        canonical_header_key(name)
    }
}

/// Case-sensitive container used for form and query values.
pub type FormValues = ValueMap<Exact>;

/// Case-insensitive container used for header and trailer fields.
pub type HeaderValues = ValueMap<Canonical>;

/// Storage for a [`Values`] container.
pub struct ValueMap<C: Casing> {
    entries: HashMap<String, Vec<String>>,
    _casing: PhantomData<fn() -> C>,
}

impl<C: Casing> ValueMap<C> {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            _casing: PhantomData,
        }
    }

    /// Creates an empty container with room for `capacity` names.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            _casing: PhantomData,
        }
    }

    /// Returns how many names the container can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Iterates over `(name, values)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Returns the names sorted lexicographically.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Appends every value of `other` to this container.
    pub fn merge<D: Casing>(&mut self, other: &ValueMap<D>) {
        for (name, values) in other.iter() {
            let key = C::normalize(name).into_owned();
            self.entries
                .entry(key)
                .or_default()
                .extend(values.iter().cloned());
        }
    }
}

impl<C: Casing> Values for ValueMap<C> {
    fn each(&self, visit: &mut dyn FnMut(&str, &[String])) {
        for (name, values) in &self.entries {
            visit(name, values);
        }
    }

    fn set(&mut self, name: &str, values: Vec<String>) {
        self.entries.insert(C::normalize(name).into_owned(), values);
    }

    fn add(&mut self, name: &str, value: &str) {
        let key = C::normalize(name);
        match self.entries.get_mut(key.as_ref()) {
            Some(values) => values.push(value.to_owned()),
            None => {
                self.entries
                    .insert(key.into_owned(), vec![value.to_owned()]);
            }
        }
    }

    fn delete(&mut self, name: &str) {
        self.entries.remove(C::normalize(name).as_ref());
    }

    fn has(&self, name: &str) -> bool {
        self.entries.contains_key(C::normalize(name).as_ref())
    }

    fn value(&self, name: &str) -> &str {
        self.values(name).first().map_or("", String::as_str)
    }

    fn values(&self, name: &str) -> &[String] {
        self.entries
            .get(C::normalize(name).as_ref())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn reset(&mut self) {
        self.entries.clear();
    }
}

impl<C: Casing> Default for ValueMap<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Casing> Clone for ValueMap<C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            _casing: PhantomData,
        }
    }
}

impl<C: Casing> PartialEq for ValueMap<C> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<C: Casing> Eq for ValueMap<C> {}

impl<C: Casing> fmt::Debug for ValueMap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<C, N, V> FromIterator<(N, V)> for ValueMap<C>
where
    C: Casing,
    N: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<C, N, V> Extend<(N, V)> for ValueMap<C>
where
    C: Casing,
    N: AsRef<str>,
    V: AsRef<str>,
{
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name.as_ref(), value.as_ref());
        }
    }
}

/// Returns the canonical MIME form of a header name.
///
/// The first letter and every letter following a hyphen are upper-cased, the
/// rest lower-cased. Names containing a byte that is not a valid token
/// character are returned unchanged.
///
/// ```rust
/// use http_provider::values::canonical_header_key;
///
/// assert_eq!(canonical_header_key("x-request-id"), "X-Request-Id");
/// assert_eq!(canonical_header_key("bad name"), "bad name");
/// ```
pub fn canonical_header_key(name: &str) -> Cow<'_, str> {
    let bytes = name.as_bytes();
    if !bytes.iter().copied().all(is_token_byte) {
        return Cow::Borrowed(name);
    }

    let mut upper = true;
    let canonical = bytes.iter().all(|&b| {
        let ok = if upper {
            !b.is_ascii_lowercase()
        } else {
            !b.is_ascii_uppercase()
        };
        upper = b == b'-';
        ok
    });
    if canonical {
        return Cow::Borrowed(name);
    }

    let mut out = String::with_capacity(name.len());
    upper = true;
    for &b in bytes {
        let c = if upper {
            b.to_ascii_uppercase()
        } else {
            b.to_ascii_lowercase()
        };
        out.push(char::from(c));
        upper = b == b'-';
    }
    Cow::Owned(out)
}

/// RFC 9110 `tchar`.
pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_appends_in_order() {
        let mut form = FormValues::new();
        form.add("k", "1");
        form.add("k", "2");
        assert_eq!(form.values("k"), ["1", "2"]);
        assert_eq!(form.value("k"), "1");
        assert_eq!(form.len(), 1);
    }

    #[test]
    fn set_empty_is_present_but_empty() {
        let mut form = FormValues::new();
        form.set("k", Vec::new());
        assert!(form.has("k"));
        assert_eq!(form.value("k"), "");
        assert!(form.values("k").is_empty());
        assert_eq!(form.len(), 1);

        form.delete("k");
        assert!(!form.has("k"));
    }

    #[test]
    fn missing_name_is_empty() {
        let form = FormValues::new();
        assert_eq!(form.value("missing"), "");
        assert!(form.values("missing").is_empty());
        assert!(!form.has("missing"));
    }

    #[test]
    fn reset_clears_every_name() {
        let mut header = HeaderValues::new();
        header.add("Accept", "text/html");
        header.set("X-Many", vec!["a".into(), "b".into()]);
        header.reset();
        assert_eq!(header.len(), 0);
        assert!(header.is_empty());
        assert!(!header.has("Accept"));
        assert!(!header.has("X-Many"));

        header.reset();
        assert_eq!(header, HeaderValues::new());
    }

    #[test]
    fn exact_casing_is_case_sensitive() {
        let mut form = FormValues::new();
        form.add("Name", "a");
        assert!(!form.has("name"));
        assert!(form.has("Name"));
    }

    #[test]
    fn canonical_casing_folds_names() {
        let mut header = HeaderValues::new();
        header.add("content-type", "text/plain");
        header.add("CONTENT-TYPE", "text/html");
        assert_eq!(header.len(), 1);
        assert_eq!(header.values("Content-Type"), ["text/plain", "text/html"]);

        let mut names = Vec::new();
        header.each(&mut |name, _| names.push(name.to_owned()));
        assert_eq!(names, ["Content-Type"]);
    }

    #[test]
    fn canonical_key_rules() {
        assert_eq!(canonical_header_key("content-length"), "Content-Length");
        assert_eq!(canonical_header_key("WWW-AUTHENTICATE"), "Www-Authenticate");
        assert_eq!(canonical_header_key("X-Id"), "X-Id");
        assert!(matches!(canonical_header_key("Host"), Cow::Borrowed(_)));
        assert_eq!(canonical_header_key("with space"), "with space");
    }

    #[test]
    fn merge_appends_across_casings() {
        let mut form = FormValues::new();
        form.add("q", "1");
        let mut other = FormValues::new();
        other.add("q", "2");
        other.add("r", "3");
        form.merge(&other);
        assert_eq!(form.values("q"), ["1", "2"]);
        assert_eq!(form.value("r"), "3");
    }

    #[test]
    fn collects_from_pairs() {
        let form: FormValues = [("a", "1"), ("a", "2"), ("b", "3")].into_iter().collect();
        assert_eq!(form.values("a"), ["1", "2"]);
        assert_eq!(form.sorted_names(), ["a", "b"]);
    }
}
