use super::IndexedLog;
use phoenixdb_core::{Key, Result, Value};

/// Cursor over every (key, value) pair in the indexed log
///
/// Iteration visits each key's duplicate chain in insertion order;
/// under the ordered-tree structure keys themselves are visited in key
/// order, under hash in arbitrary order. The key set is snapshotted
/// when the cursor is created; chains are read lazily, so a key deleted
/// after the snapshot is silently skipped.
pub struct ScanCursor<'a> {
    log: &'a IndexedLog,
    keys: Vec<Key>,
    /// Next index in `keys` to load a chain from
    pos: usize,
    /// Currently loaded chain and the duplicate index within it
    chain: Option<(Key, Vec<Value>)>,
    dup: usize,
}

impl<'a> ScanCursor<'a> {
    pub(super) fn new(log: &'a IndexedLog, keys: Vec<Key>) -> Self {
        Self {
            log,
            keys,
            pos: 0,
            chain: None,
            dup: 0,
        }
    }

    /// Returns the next (key, value) pair, walking duplicate chains
    pub fn next(&mut self) -> Result<Option<(Key, Value)>> {
        loop {
            if let Some((key, values)) = &self.chain {
                if self.dup < values.len() {
                    let pair = (key.clone(), values[self.dup].clone());
                    self.dup += 1;
                    return Ok(Some(pair));
                }
                self.chain = None;
            }

            if self.pos >= self.keys.len() {
                return Ok(None);
            }
            let key = self.keys[self.pos].clone();
            self.pos += 1;

            let values = self.log.lookup(&key)?;
            if values.is_empty() {
                continue;
            }
            self.chain = Some((key, values));
            self.dup = 0;
        }
    }

    /// Skips any remaining duplicates of the current key and returns
    /// the first pair of the next distinct key
    pub fn next_distinct(&mut self) -> Result<Option<(Key, Value)>> {
        self.chain = None;
        self.next()
    }
}
