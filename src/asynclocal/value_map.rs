//! Decoding of the runtime's async-local value maps.
//!
//! The runtime picks a different map class depending on how many async-locals
//! are bound, and older runtimes used a plain dictionary. The class is only
//! known through the object's runtime type name, so decoding starts by
//! classifying the object against a fixed table of known encodings.

use super::DecodeError;
use crate::heap::{Address, FieldValue, HeapIntrospector};
use crate::layout;
use std::iter;

/// The encodings an async-local value map can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapLayout {
    Empty,
    OneElement,
    TwoElement,
    ThreeElement,
    MultiElement,
    ManyElement,
    LegacyDictionary,
}

const KNOWN_LAYOUTS: &[(&str, MapLayout)] = &[
    (layout::EMPTY_VALUE_MAP, MapLayout::Empty),
    (layout::ONE_ELEMENT_VALUE_MAP, MapLayout::OneElement),
    (layout::TWO_ELEMENT_VALUE_MAP, MapLayout::TwoElement),
    (layout::THREE_ELEMENT_VALUE_MAP, MapLayout::ThreeElement),
    (layout::MULTI_ELEMENT_VALUE_MAP, MapLayout::MultiElement),
    (layout::MANY_ELEMENT_VALUE_MAP, MapLayout::ManyElement),
    (layout::LEGACY_DICTIONARY_VALUE_MAP, MapLayout::LegacyDictionary),
];

impl MapLayout {
    /// Look up the layout for an exact runtime type name.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        KNOWN_LAYOUTS
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|&(_, layout)| layout)
    }
}

/// One binding read out of a value map.
///
/// The key is the async-local slot object; the value may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValueEntry {
    pub key: Address,
    pub value: Option<Address>,
}

/// A value map classified by its runtime type, holding the raw fields needed
/// to enumerate its bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadLocalMap {
    Empty,
    OneElement { map: Address },
    TwoElement { map: Address },
    ThreeElement { map: Address },
    /// Elements of `_keyValues`, every one a live key/value pair.
    MultiElement { pairs: Vec<FieldValue> },
    /// Elements of `_entries`; entries with a null key are free slots.
    ManyElement { entries: Vec<FieldValue> },
    /// Elements of the dictionary's `entries`, same free-slot rule.
    LegacyDictionary { entries: Vec<FieldValue> },
}

impl ThreadLocalMap {
    /// Classify the map stored at `map`. A null map is empty.
    pub fn classify<H>(heap: &H, map: Option<Address>) -> Result<Self, DecodeError>
    where
        H: HeapIntrospector + ?Sized,
    {
        let Some(map) = map else {
            return Ok(ThreadLocalMap::Empty);
        };

        let type_name = heap.type_name(map)?;
        let Some(kind) = MapLayout::from_type_name(type_name) else {
            return Err(DecodeError::UnsupportedLayout {
                address: map,
                type_name: type_name.to_string(),
                detail: "not a known async-local storage encoding".to_string(),
            });
        };

        Ok(match kind {
            MapLayout::Empty => ThreadLocalMap::Empty,
            MapLayout::OneElement => ThreadLocalMap::OneElement { map },
            MapLayout::TwoElement => ThreadLocalMap::TwoElement { map },
            MapLayout::ThreeElement => ThreadLocalMap::ThreeElement { map },
            MapLayout::MultiElement => ThreadLocalMap::MultiElement {
                pairs: read_array(heap, map, layout::MULTI_ELEMENT_PAIRS)?,
            },
            MapLayout::ManyElement => ThreadLocalMap::ManyElement {
                entries: read_array(heap, map, layout::MANY_ELEMENT_ENTRIES)?,
            },
            MapLayout::LegacyDictionary => ThreadLocalMap::LegacyDictionary {
                entries: read_array(heap, map, layout::DICTIONARY_ENTRIES)?,
            },
        })
    }

    pub fn layout(&self) -> MapLayout {
        match self {
            ThreadLocalMap::Empty => MapLayout::Empty,
            ThreadLocalMap::OneElement { .. } => MapLayout::OneElement,
            ThreadLocalMap::TwoElement { .. } => MapLayout::TwoElement,
            ThreadLocalMap::ThreeElement { .. } => MapLayout::ThreeElement,
            ThreadLocalMap::MultiElement { .. } => MapLayout::MultiElement,
            ThreadLocalMap::ManyElement { .. } => MapLayout::ManyElement,
            ThreadLocalMap::LegacyDictionary { .. } => MapLayout::LegacyDictionary,
        }
    }

    /// Lazily enumerate the bindings held by the map, skipping free slots.
    pub fn entries<'a, H>(
        &'a self,
        heap: &'a H,
    ) -> Box<dyn Iterator<Item = Result<KeyValueEntry, DecodeError>> + 'a>
    where
        H: HeapIntrospector + ?Sized,
    {
        match self {
            ThreadLocalMap::Empty => Box::new(iter::empty()),
            ThreadLocalMap::OneElement { map } => fixed_slots(heap, *map, 1),
            ThreadLocalMap::TwoElement { map } => fixed_slots(heap, *map, 2),
            ThreadLocalMap::ThreeElement { map } => fixed_slots(heap, *map, 3),
            ThreadLocalMap::MultiElement { pairs } => Box::new(
                pairs
                    .iter()
                    .filter_map(move |pair| read_entry(heap, pair, false).transpose()),
            ),
            ThreadLocalMap::ManyElement { entries }
            | ThreadLocalMap::LegacyDictionary { entries } => Box::new(
                entries
                    .iter()
                    .filter_map(move |entry| read_entry(heap, entry, true).transpose()),
            ),
        }
    }
}

/// Classify and fully decode the map at `map`.
pub fn decode<H>(heap: &H, map: Option<Address>) -> Result<Vec<KeyValueEntry>, DecodeError>
where
    H: HeapIntrospector + ?Sized,
{
    let map = ThreadLocalMap::classify(heap, map)?;
    map.entries(heap).collect()
}

fn read_array<H>(heap: &H, map: Address, field: &str) -> Result<Vec<FieldValue>, DecodeError>
where
    H: HeapIntrospector + ?Sized,
{
    match heap.field(map, field)? {
        FieldValue::Array(items) => Ok(items),
        FieldValue::Null => Ok(Vec::new()),
        other => Err(heap.unexpected(map, field, "array", &other).into()),
    }
}

fn fixed_slots<'a, H>(
    heap: &'a H,
    map: Address,
    count: usize,
) -> Box<dyn Iterator<Item = Result<KeyValueEntry, DecodeError>> + 'a>
where
    H: HeapIntrospector + ?Sized,
{
    Box::new((0..count).map(move |slot| -> Result<KeyValueEntry, DecodeError> {
        let key_field = layout::SLOT_KEYS[slot];
        let key = heap
            .field_object(map, key_field)?
            .ok_or_else(|| heap.unexpected(map, key_field, "object", &FieldValue::Null))?;
        let value = heap.field_object(map, layout::SLOT_VALUES[slot])?;
        Ok(KeyValueEntry { key, value })
    }))
}

/// Read one key/value element. Returns `Ok(None)` for a free slot when
/// `skip_free` is set; otherwise a null key is malformed.
fn read_entry<H>(
    heap: &H,
    element: &FieldValue,
    skip_free: bool,
) -> Result<Option<KeyValueEntry>, DecodeError>
where
    H: HeapIntrospector + ?Sized,
{
    let entry = match element {
        FieldValue::Object(entry) => *entry,
        FieldValue::Null if skip_free => return Ok(None),
        other => {
            return Err(DecodeError::UnexpectedElement {
                expected: "key/value entry",
                found: other.kind(),
            })
        }
    };

    match heap.field_object(entry, layout::ENTRY_KEY)? {
        Some(key) => Ok(Some(KeyValueEntry {
            key,
            value: heap.field_object(entry, layout::ENTRY_VALUE)?,
        })),
        None if skip_free => Ok(None),
        None => Err(heap
            .unexpected(entry, layout::ENTRY_KEY, "object", &FieldValue::Null)
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{JsonSnapshot, SnapshotBuilder};

    fn obj(addr: u64) -> FieldValue {
        FieldValue::Object(Address(addr))
    }

    /// A map of the given layout whose slots hold keys 0x100.. and values
    /// 0x200.., built at address 0x10.
    fn fixed_map(type_name: &str, slots: usize) -> JsonSnapshot {
        let mut fields = Vec::new();
        for slot in 0..slots {
            fields.push((layout::SLOT_KEYS[slot], obj(0x100 + slot as u64)));
            fields.push((layout::SLOT_VALUES[slot], obj(0x200 + slot as u64)));
        }
        JsonSnapshot::builder().object(0x10, type_name, fields).build()
    }

    /// An entries-style map whose second entry is a free slot.
    fn map_with_free_slot(type_name: &str, field: &str) -> JsonSnapshot {
        let entry = |builder: SnapshotBuilder, addr: u64, key: FieldValue, value: FieldValue| {
            builder.object(
                addr,
                "System.Collections.Generic.KeyValuePair",
                [(layout::ENTRY_KEY, key), (layout::ENTRY_VALUE, value)],
            )
        };
        let builder = JsonSnapshot::builder().object(
            0x10,
            type_name,
            [(field, FieldValue::Array(vec![obj(0x20), obj(0x21), obj(0x22)]))],
        );
        let builder = entry(builder, 0x20, obj(0x100), obj(0x200));
        let builder = entry(builder, 0x21, FieldValue::Null, FieldValue::Null);
        let builder = entry(builder, 0x22, obj(0x102), FieldValue::Null);
        builder.build()
    }

    #[test]
    fn test_absent_map_is_empty() {
        let heap = JsonSnapshot::default();
        assert_eq!(decode(&heap, None).unwrap(), vec![]);
    }

    #[test]
    fn test_fixed_slot_pair_counts() {
        let cases = [
            (layout::EMPTY_VALUE_MAP, 0),
            (layout::ONE_ELEMENT_VALUE_MAP, 1),
            (layout::TWO_ELEMENT_VALUE_MAP, 2),
            (layout::THREE_ELEMENT_VALUE_MAP, 3),
        ];
        for (type_name, expected) in cases {
            let heap = fixed_map(type_name, expected);
            let entries = decode(&heap, Some(Address(0x10))).unwrap();
            assert_eq!(entries.len(), expected, "{type_name}");
            for (slot, entry) in entries.iter().enumerate() {
                assert_eq!(entry.key, Address(0x100 + slot as u64));
                assert_eq!(entry.value, Some(Address(0x200 + slot as u64)));
            }
        }
    }

    #[test]
    fn test_many_element_skips_free_slots() {
        let heap = map_with_free_slot(
            layout::MANY_ELEMENT_VALUE_MAP,
            layout::MANY_ELEMENT_ENTRIES,
        );
        let entries = decode(&heap, Some(Address(0x10))).unwrap();
        assert_eq!(
            entries,
            vec![
                KeyValueEntry {
                    key: Address(0x100),
                    value: Some(Address(0x200)),
                },
                KeyValueEntry {
                    key: Address(0x102),
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn test_legacy_dictionary_skips_free_slots() {
        let heap = map_with_free_slot(
            layout::LEGACY_DICTIONARY_VALUE_MAP,
            layout::DICTIONARY_ENTRIES,
        );
        let map = ThreadLocalMap::classify(&heap, Some(Address(0x10))).unwrap();
        assert_eq!(map.layout(), MapLayout::LegacyDictionary);
        assert_eq!(map.entries(&heap).count(), 2);
    }

    #[test]
    fn test_multi_element_yields_every_pair() {
        let heap = JsonSnapshot::builder()
            .object(
                0x10,
                layout::MULTI_ELEMENT_VALUE_MAP,
                [(
                    layout::MULTI_ELEMENT_PAIRS,
                    FieldValue::Array(vec![obj(0x20), obj(0x21)]),
                )],
            )
            .object(
                0x20,
                "System.Collections.Generic.KeyValuePair",
                [(layout::ENTRY_KEY, obj(0x100)), (layout::ENTRY_VALUE, obj(0x200))],
            )
            .object(
                0x21,
                "System.Collections.Generic.KeyValuePair",
                [(layout::ENTRY_KEY, obj(0x101)), (layout::ENTRY_VALUE, obj(0x201))],
            )
            .build();
        let keys: Vec<_> = decode(&heap, Some(Address(0x10)))
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![Address(0x100), Address(0x101)]);
    }

    #[test]
    fn test_multi_element_rejects_null_key() {
        let heap = JsonSnapshot::builder()
            .object(
                0x10,
                layout::MULTI_ELEMENT_VALUE_MAP,
                [(layout::MULTI_ELEMENT_PAIRS, FieldValue::Array(vec![obj(0x20)]))],
            )
            .object(
                0x20,
                "System.Collections.Generic.KeyValuePair",
                [
                    (layout::ENTRY_KEY, FieldValue::Null),
                    (layout::ENTRY_VALUE, FieldValue::Null),
                ],
            )
            .build();
        assert!(decode(&heap, Some(Address(0x10))).is_err());
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let heap = JsonSnapshot::builder()
            .object(
                0x10,
                "System.Threading.SomeFutureValueMap",
                Vec::<(&str, FieldValue)>::new(),
            )
            .build();
        let err = decode(&heap, Some(Address(0x10))).unwrap_err();
        match err {
            DecodeError::UnsupportedLayout { type_name, .. } => {
                assert_eq!(type_name, "System.Threading.SomeFutureValueMap")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_layout_table_lookup() {
        for (name, kind) in KNOWN_LAYOUTS {
            assert_eq!(MapLayout::from_type_name(name), Some(*kind));
        }
        assert_eq!(MapLayout::from_type_name("System.Object"), None);
    }
}
