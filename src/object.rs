//! The PDF object model.
//!
//! Objects live in a single arena on [`crate::Document`] keyed by
//! `(obj_num, gen)`; every indirect reference is a small `ObjectId` rather
//! than an owning pointer, so reference cycles are trivially representable
//! since reference cycles don't involve ownership cycles.

use std::collections::HashMap;

/// `(object number, generation number)`, the key into a [`crate::Document`]'s
/// object arena.
pub type ObjectId = (u32, u16);

/// A PDF name, stored without its leading `/` internally but always
/// printed and compared as the interned byte-string the spec describes
/// ("Dictionary keys in this spec are always stored with the leading
/// `/`. All lookups are byte-exact.").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Name(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl<'a> From<&'a str> for Name {
    fn from(s: &'a str) -> Self {
        Name(s.as_bytes().to_vec())
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str_lossy())
    }
}

/// An ordered `Name -> Object` mapping with unique keys. Preserves
/// insertion order (dictionaries are
/// small; linear scan is fine and order-preservation matters for
/// round-tripping diagnostics).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(Name, Object)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.iter().find(|(k, _)| k.as_bytes() == key.as_bytes()).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: impl Into<Name>, value: Object) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<Name>> From<Vec<(S, Object)>> for Dictionary {
    fn from(pairs: Vec<(S, Object)>) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in pairs {
            dict.set(k, v);
        }
        dict
    }
}

/// A stream object: the dictionary that describes it plus its raw,
/// not-yet-filtered payload. "A Stream's Dictionary owns the stream; the
/// payload is meaningful only after the declared filter chain has been
/// run.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub raw: Vec<u8>,
    /// Cached post-filter payload, populated the first time the stream is
    /// decoded, so the payload of a stream is cached next to the
    /// stream object.
    pub decoded_cache: std::cell::RefCell<Option<Vec<u8>>>,
}

impl Stream {
    pub fn new(dict: Dictionary, raw: Vec<u8>) -> Self {
        Stream { dict, raw, decoded_cache: std::cell::RefCell::new(None) }
    }
}

/// One of the nine PDF object variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    /// Double-valued; integers and reals are not distinguished at this
    /// layer.
    Number(f64),
    /// Opaque bytes: either a literal string with escapes already resolved
    /// or a hex string already unpacked — by the time an `Object::String`
    /// exists, decoding has happened (see [`crate::lexer`]).
    String(Vec<u8>),
    Name(Name),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_number().map(|n| n as i64)
    }

    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
}

/// The raw in-memory object arena: every object the parser produced,
/// keyed by `(num, gen)`. `Document` wraps this with reference resolution,
/// decryption, and filter decoding.
pub type ObjectArena = HashMap<ObjectId, Object>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_keeps_keys_unique_and_ordered() {
        let mut d = Dictionary::new();
        d.set("Type", Object::Name("Catalog".into()));
        d.set("Pages", Object::Reference((2, 0)));
        d.set("Type", Object::Name("Overwritten".into()));
        assert_eq!(d.len(), 2);
        assert_eq!(d.get("Type"), Some(&Object::Name("Overwritten".into())));
    }

    #[test]
    fn name_display_keeps_leading_slash() {
        let n = Name::from("Font");
        assert_eq!(format!("{n}"), "/Font");
    }
}
