use crate::constants::storage::BLOCK_SZ;
use crate::error::RelationError;
use crate::storage::heap_file::HeapFile;
use crate::storage::heap_table::Handle;
use crate::storage::slotted_page::SlottedPage;
use crate::value::{DataType, Value};

/// Block 1 of every index file holds the stats.
pub const STAT_BLOCK: u32 = 1;

/// An index key: the indexed column values in declared order. The derived
/// `Ord` on `Value` makes comparison lexicographic over the tuple.
pub type KeyValue = Vec<Value>;

/// Serializes a key according to the index's key profile: INT as 4 bytes
/// little-endian, TEXT as a u16 little-endian length plus bytes, BOOLEAN as
/// one byte.
pub fn marshal_key(profile: &[DataType], key: &KeyValue) -> Result<Vec<u8>, RelationError> {
    if profile.len() != key.len() {
        return Err(RelationError::TypeMismatch("index key".to_string()));
    }
    let mut bytes = Vec::new();
    for (data_type, value) in profile.iter().zip(key) {
        match (data_type, value) {
            (DataType::Int, Value::Int(n)) => bytes.extend_from_slice(&n.to_le_bytes()),
            (DataType::Text, Value::Text(s)) => {
                if s.len() > u16::MAX as usize {
                    return Err(RelationError::TextTooLong(s.len()));
                }
                bytes.extend_from_slice(&(s.len() as u16).to_le_bytes());
                bytes.extend_from_slice(s.as_bytes());
            }
            (DataType::Boolean, Value::Boolean(b)) => bytes.push(*b as u8),
            _ => return Err(RelationError::TypeMismatch("index key".to_string())),
        }
    }
    Ok(bytes)
}

/// Inverts `marshal_key`, returning the key and the number of bytes it
/// occupied so callers can read the payload that follows.
pub fn unmarshal_key(
    profile: &[DataType],
    bytes: &[u8],
) -> Result<(KeyValue, usize), RelationError> {
    let mut key = KeyValue::new();
    let mut offset = 0usize;
    for data_type in profile {
        let value = match data_type {
            DataType::Int => {
                let raw: [u8; 4] = bytes
                    .get(offset..offset + 4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or(RelationError::Corrupt("truncated INT key"))?;
                offset += 4;
                Value::Int(i32::from_le_bytes(raw))
            }
            DataType::Text => {
                let raw: [u8; 2] = bytes
                    .get(offset..offset + 2)
                    .and_then(|s| s.try_into().ok())
                    .ok_or(RelationError::Corrupt("truncated TEXT key length"))?;
                offset += 2;
                let len = u16::from_le_bytes(raw) as usize;
                let text = bytes
                    .get(offset..offset + len)
                    .ok_or(RelationError::Corrupt("truncated TEXT key"))?;
                offset += len;
                Value::Text(
                    String::from_utf8(text.to_vec())
                        .map_err(|_| RelationError::Corrupt("TEXT key is not valid UTF-8"))?,
                )
            }
            DataType::Boolean => {
                let raw = *bytes
                    .get(offset)
                    .ok_or(RelationError::Corrupt("truncated BOOLEAN key"))?;
                offset += 1;
                Value::Boolean(raw != 0)
            }
        };
        key.push(value);
    }
    Ok((key, offset))
}

/// Persistent index statistics: where the root lives, how tall the tree is,
/// and the data types making up the key.
#[derive(Debug, Clone)]
pub struct BTreeStat {
    pub root_id: u32,
    pub height: u16,
    pub key_profile: Vec<DataType>,
}

impl BTreeStat {
    pub fn save(&self, file: &mut HeapFile) -> Result<(), RelationError> {
        let mut page = SlottedPage::new(Box::new([0u8; BLOCK_SZ]), STAT_BLOCK, true);
        let mut header = Vec::with_capacity(6);
        header.extend_from_slice(&self.root_id.to_le_bytes());
        header.extend_from_slice(&self.height.to_le_bytes());
        page.add(&header)?;
        let tags: Vec<u8> = self.key_profile.iter().map(|dt| dt.to_tag()).collect();
        page.add(&tags)?;
        file.put(&page)
    }

    pub fn load(file: &mut HeapFile) -> Result<Self, RelationError> {
        let page = file.get(STAT_BLOCK)?;
        let header = page
            .get(1)
            .ok_or(RelationError::Corrupt("missing index stat header"))?;
        if header.len() < 6 {
            return Err(RelationError::Corrupt("short index stat header"));
        }
        let root_id = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let height = u16::from_le_bytes(header[4..6].try_into().unwrap());
        let tags = page
            .get(2)
            .ok_or(RelationError::Corrupt("missing index key profile"))?;
        let key_profile = tags
            .iter()
            .map(|&tag| DataType::from_tag(tag))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            root_id,
            height,
            key_profile,
        })
    }
}

/// A leaf node: ordered `(key, handle)` entries. The whole node is rebuilt
/// from its block on read and rewritten on save, so the records on the block
/// are always stored in key order.
#[derive(Debug)]
pub struct BTreeLeaf {
    pub block_id: u32,
    pub entries: Vec<(KeyValue, Handle)>,
}

impl BTreeLeaf {
    pub fn empty(block_id: u32) -> Self {
        Self {
            block_id,
            entries: Vec::new(),
        }
    }

    pub fn read(page: &SlottedPage, profile: &[DataType]) -> Result<Self, RelationError> {
        let mut entries = Vec::new();
        for record_id in page.ids() {
            let bytes = page.get(record_id).unwrap();
            let (key, offset) = unmarshal_key(profile, bytes)?;
            let tail = bytes
                .get(offset..offset + 6)
                .ok_or(RelationError::Corrupt("truncated leaf handle"))?;
            let handle = Handle {
                block_id: u32::from_le_bytes(tail[0..4].try_into().unwrap()),
                record_id: u16::from_le_bytes(tail[4..6].try_into().unwrap()),
            };
            entries.push((key, handle));
        }
        Ok(Self {
            block_id: page.block_id(),
            entries,
        })
    }

    pub fn serialize(&self, profile: &[DataType]) -> Result<SlottedPage, RelationError> {
        let mut page = SlottedPage::new(Box::new([0u8; BLOCK_SZ]), self.block_id, true);
        for (key, handle) in &self.entries {
            let mut record = marshal_key(profile, key)?;
            record.extend_from_slice(&handle.block_id.to_le_bytes());
            record.extend_from_slice(&handle.record_id.to_le_bytes());
            page.add(&record)?;
        }
        Ok(page)
    }

    pub fn find_eq(&self, key: &KeyValue) -> Option<Handle> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Inserts in key order; equal keys are rejected, the index is unique.
    pub fn insert(&mut self, key: KeyValue, handle: Handle) -> Result<(), RelationError> {
        match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(_) => Err(RelationError::DuplicateKey),
            Err(pos) => {
                self.entries.insert(pos, (key, handle));
                Ok(())
            }
        }
    }

    /// Moves the upper half into a new right sibling. Returns the sibling
    /// and the boundary key: the smallest key of the right leaf.
    pub fn split(&mut self, right_id: u32) -> (BTreeLeaf, KeyValue) {
        let mid = self.entries.len() / 2;
        let right_entries = self.entries.split_off(mid);
        let boundary = right_entries[0].0.clone();
        (
            BTreeLeaf {
                block_id: right_id,
                entries: right_entries,
            },
            boundary,
        )
    }
}

/// An interior node: a distinguished first child plus ordered
/// `(key, child)` entries. Record 1 on the block is the first child pointer,
/// later records are the entries in key order.
#[derive(Debug)]
pub struct BTreeInterior {
    pub block_id: u32,
    pub first: u32,
    pub entries: Vec<(KeyValue, u32)>,
}

impl BTreeInterior {
    pub fn empty(block_id: u32) -> Self {
        Self {
            block_id,
            first: 0,
            entries: Vec::new(),
        }
    }

    pub fn read(page: &SlottedPage, profile: &[DataType]) -> Result<Self, RelationError> {
        let mut ids = page.ids().into_iter();
        let first_record = ids
            .next()
            .and_then(|id| page.get(id))
            .ok_or(RelationError::Corrupt("interior node has no first child"))?;
        if first_record.len() < 4 {
            return Err(RelationError::Corrupt("short first-child record"));
        }
        let first = u32::from_le_bytes(first_record[0..4].try_into().unwrap());

        let mut entries = Vec::new();
        for record_id in ids {
            let bytes = page.get(record_id).unwrap();
            let (key, offset) = unmarshal_key(profile, bytes)?;
            let tail = bytes
                .get(offset..offset + 4)
                .ok_or(RelationError::Corrupt("truncated child pointer"))?;
            entries.push((key, u32::from_le_bytes(tail.try_into().unwrap())));
        }
        Ok(Self {
            block_id: page.block_id(),
            first,
            entries,
        })
    }

    pub fn serialize(&self, profile: &[DataType]) -> Result<SlottedPage, RelationError> {
        let mut page = SlottedPage::new(Box::new([0u8; BLOCK_SZ]), self.block_id, true);
        page.add(&self.first.to_le_bytes())?;
        for (key, child) in &self.entries {
            let mut record = marshal_key(profile, key)?;
            record.extend_from_slice(&child.to_le_bytes());
            page.add(&record)?;
        }
        Ok(page)
    }

    /// The child to follow for a probe key: the entry with the greatest key
    /// less than or equal to it, or the first child when every key is
    /// greater.
    pub fn find_child(&self, key: &KeyValue) -> u32 {
        let idx = self.entries.partition_point(|(k, _)| k <= key);
        if idx == 0 {
            self.first
        } else {
            self.entries[idx - 1].1
        }
    }

    pub fn insert(&mut self, key: KeyValue, child: u32) {
        let pos = self.entries.partition_point(|(k, _)| *k < key);
        self.entries.insert(pos, (key, child));
    }

    /// Splits around the middle entry, whose key moves up to the parent and
    /// whose child becomes the right sibling's first child.
    pub fn split(&mut self, right_id: u32) -> (BTreeInterior, KeyValue) {
        let mid = self.entries.len() / 2;
        let mut upper = self.entries.split_off(mid);
        let (boundary, right_first) = upper.remove(0);
        (
            BTreeInterior {
                block_id: right_id,
                first: right_first,
                entries: upper,
            },
            boundary,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_key(n: i32) -> KeyValue {
        vec![Value::Int(n)]
    }

    fn handle(n: u32) -> Handle {
        Handle {
            block_id: n,
            record_id: 1,
        }
    }

    #[test]
    fn test_key_codec_round_trip() {
        let profile = vec![DataType::Int, DataType::Text, DataType::Boolean];
        let key = vec![
            Value::Int(-5),
            Value::Text("abc".to_string()),
            Value::Boolean(true),
        ];
        let bytes = marshal_key(&profile, &key).unwrap();
        let (decoded, used) = unmarshal_key(&profile, &bytes).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn test_leaf_round_trip_and_order() {
        let profile = vec![DataType::Int];
        let mut leaf = BTreeLeaf::empty(2);
        for n in [30, 10, 20] {
            leaf.insert(int_key(n), handle(n as u32)).unwrap();
        }
        let page = leaf.serialize(&profile).unwrap();
        let reread = BTreeLeaf::read(&page, &profile).unwrap();
        let keys: Vec<i32> = reread
            .entries
            .iter()
            .map(|(k, _)| match k[0] {
                Value::Int(n) => n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![10, 20, 30]);
        assert_eq!(reread.find_eq(&int_key(20)), Some(handle(20)));
        assert_eq!(reread.find_eq(&int_key(15)), None);
    }

    #[test]
    fn test_leaf_rejects_duplicates() {
        let mut leaf = BTreeLeaf::empty(2);
        leaf.insert(int_key(1), handle(1)).unwrap();
        assert!(matches!(
            leaf.insert(int_key(1), handle(2)),
            Err(RelationError::DuplicateKey)
        ));
    }

    #[test]
    fn test_leaf_split_boundary() {
        let mut leaf = BTreeLeaf::empty(2);
        for n in 0..6 {
            leaf.insert(int_key(n), handle(n as u32)).unwrap();
        }
        let (right, boundary) = leaf.split(3);
        assert_eq!(leaf.entries.len(), 3);
        assert_eq!(right.entries.len(), 3);
        assert_eq!(boundary, int_key(3));
        assert_eq!(right.block_id, 3);
    }

    #[test]
    fn test_interior_find_child() {
        let mut node = BTreeInterior::empty(5);
        node.first = 100;
        node.insert(int_key(10), 101);
        node.insert(int_key(20), 102);

        assert_eq!(node.find_child(&int_key(5)), 100);
        assert_eq!(node.find_child(&int_key(10)), 101);
        assert_eq!(node.find_child(&int_key(15)), 101);
        assert_eq!(node.find_child(&int_key(25)), 102);
    }

    #[test]
    fn test_interior_round_trip_and_split() {
        let profile = vec![DataType::Int];
        let mut node = BTreeInterior::empty(5);
        node.first = 100;
        for n in 0..5 {
            node.insert(int_key(n * 10), 101 + n as u32);
        }
        let page = node.serialize(&profile).unwrap();
        let mut reread = BTreeInterior::read(&page, &profile).unwrap();
        assert_eq!(reread.first, 100);
        assert_eq!(reread.entries.len(), 5);

        let (right, boundary) = reread.split(9);
        // Middle key moves up, its child seeds the right sibling.
        assert_eq!(boundary, int_key(20));
        assert_eq!(reread.entries.len(), 2);
        assert_eq!(right.first, 103);
        assert_eq!(right.entries.len(), 2);
    }
}
