use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use std::collections::HashMap;

/// A registered, pinned result of a successful `execQuery`, kept alive until
/// the client disposes it or the session closes (spec §4.F "Result lifetime").
pub struct ResultSetHandle {
    pub id: u64,
    pub table: EvalTable,
}

pub struct ResultSetTable {
    sets: HashMap<u64, ResultSetHandle>,
    next_id: u64,
}

impl ResultSetTable {
    pub fn new() -> Self {
        ResultSetTable { sets: HashMap::new(), next_id: 1 }
    }

    pub fn register(&mut self, table: EvalTable) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.sets.insert(id, ResultSetHandle { id, table });
        id
    }

    pub fn get(&self, id: u64) -> Option<&ResultSetHandle> {
        self.sets.get(&id)
    }

    pub fn dispose(&mut self, id: u64) -> EngineResult<()> {
        self.sets.remove(&id).ok_or_else(|| EngineError::statement_error(format!("result set {} not found", id)))?;
        Ok(())
    }
}

impl Default for ResultSetTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A large object uploaded in chunks before the query referencing it runs.
/// Identified by `(object_type, total_length, id)` per spec §6/§4.F, not by a
/// server-assigned handle, since the client names it before the first chunk
/// arrives.
pub struct LargeObjectRef {
    pub object_type: u8,
    pub total_length: u64,
    pub id: u64,
    pub buffer: Vec<u8>,
    pub complete: bool,
}

impl LargeObjectRef {
    pub fn new(object_type: u8, total_length: u64, id: u64) -> Self {
        LargeObjectRef { object_type, total_length, id, buffer: Vec::new(), complete: false }
    }

    pub fn write(&mut self, offset: u64, buf: &[u8]) -> EngineResult<()> {
        let end = offset as usize + buf.len();
        if end as u64 > self.total_length {
            return Err(EngineError::statement_error("streamable object write exceeds declared length"));
        }
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[offset as usize..end].copy_from_slice(buf);
        if end as u64 == self.total_length {
            self.complete = true;
        }
        Ok(())
    }

    /// Returns at most `EngineConfig::MAX_STREAMABLE_PART_BYTES` bytes starting at `offset`.
    pub fn read_part(&self, offset: u64, len: u64) -> &[u8] {
        let start = offset as usize;
        let capped = len.min(EngineConfig::MAX_STREAMABLE_PART_BYTES as u64) as usize;
        let end = (start + capped).min(self.buffer.len());
        if start >= self.buffer.len() {
            &[]
        } else {
            &self.buffer[start..end]
        }
    }
}

pub struct LargeObjectUploadMap {
    pending: HashMap<(u8, u64, u64), LargeObjectRef>,
}

impl LargeObjectUploadMap {
    pub fn new() -> Self {
        LargeObjectUploadMap { pending: HashMap::new() }
    }

    pub fn begin(&mut self, object_type: u8, total_length: u64, id: u64) {
        self.pending.entry((object_type, total_length, id)).or_insert_with(|| LargeObjectRef::new(object_type, total_length, id));
    }

    pub fn push_part(&mut self, object_type: u8, total_length: u64, id: u64, offset: u64, buf: &[u8]) -> EngineResult<()> {
        let entry = self
            .pending
            .get_mut(&(object_type, total_length, id))
            .ok_or_else(|| EngineError::statement_error("no pending streamable object upload for this id"))?;
        entry.write(offset, buf)
    }

    /// Resolves a completed upload, removing it from the pending map (spec
    /// §4.F: "completed and removed").
    pub fn take_completed(&mut self, object_type: u8, total_length: u64, id: u64) -> EngineResult<LargeObjectRef> {
        let key = (object_type, total_length, id);
        match self.pending.get(&key) {
            Some(r) if r.complete => Ok(self.pending.remove(&key).unwrap()),
            Some(_) => Err(EngineError::statement_error("streamable object upload is incomplete")),
            None => Err(EngineError::statement_error("no pending streamable object upload for this id")),
        }
    }

    /// Same as `take_completed` but keyed on `id` alone: a client reading back
    /// a streamable section only names the id it was assigned, not the
    /// `(object_type, total_length)` pair it uploaded with.
    pub fn take_completed_by_id(&mut self, id: u64) -> EngineResult<LargeObjectRef> {
        let key = *self.pending.keys().find(|(_, _, oid)| *oid == id).ok_or_else(|| EngineError::statement_error("no pending streamable object upload for this id"))?;
        self.take_completed(key.0, key.1, key.2)
    }
}

impl Default for LargeObjectUploadMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_object_part_is_capped_at_max_bytes() {
        let mut obj = LargeObjectRef::new(0, 10, 1);
        obj.write(0, &[1; 10]).unwrap();
        let part = obj.read_part(0, 1_000_000);
        assert_eq!(part.len(), 10);
    }

    #[test]
    fn upload_must_complete_before_resolution() {
        let mut map = LargeObjectUploadMap::new();
        map.begin(0, 4, 1);
        map.push_part(0, 4, 1, 0, &[1, 2]).unwrap();
        assert!(map.take_completed(0, 4, 1).is_err());
        map.push_part(0, 4, 1, 2, &[3, 4]).unwrap();
        assert!(map.take_completed(0, 4, 1).is_ok());
    }
}
