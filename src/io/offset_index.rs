use indexmap::map::{Iter, Keys};
use indexmap::IndexMap;

/**
An ordered mapping from entity ID to the byte offset of its opening tag in
the document it was written to.

A wrapper around [`indexmap::IndexMap`].
*/
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    /// The name of the index, the `name` attribute of the `<index>` element
    pub name: String,

    /// The mapping from ID to byte offset, ordered by occurrence
    pub offsets: IndexMap<Box<str>, u64>,
}

impl OffsetIndex {
    pub fn new(name: String) -> OffsetIndex {
        OffsetIndex {
            name,
            ..Default::default()
        }
    }

    /// Get the offset of the specified key
    #[inline]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Get the associated key and offset for the specified index position
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&str, u64)> {
        self.offsets
            .get_index(index)
            .map(|(key, offset)| (key.as_ref(), *offset))
    }

    /// Insert `key` into the index with an offset value
    #[inline]
    pub fn insert<T: Into<Box<str>>>(&mut self, key: T, offset: u64) -> Option<u64> {
        self.offsets.insert(key.into(), offset)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, Box<str>, u64> {
        self.offsets.keys()
    }

    /// Iterate over the keys and offsets in insertion order
    pub fn iter(&self) -> Iter<'_, Box<str>, u64> {
        self.offsets.iter()
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.offsets.contains_key(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut index = OffsetIndex::new("spectrum".into());
        assert!(index.is_empty());
        index.insert("scan=2", 200);
        index.insert("scan=1", 100);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get_index(0), Some(("scan=2", 200)));
        assert_eq!(index.get("scan=1"), Some(100));
        assert!(index.contains_key("scan=2"));
        assert_eq!(index.keys().map(|k| k.as_ref()).collect::<Vec<_>>(), vec!["scan=2", "scan=1"]);
    }
}
