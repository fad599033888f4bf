use std::collections::HashMap;
use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;

use super::block::DatumId;

// Pushed blocks wait here until the namenode commits them.
const STAGING_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoDatumError;

pub struct Datanode {
    /// `host:port` the datanode reports itself as.
    pub name: String,
    pub host: String,

    /// The LRU cache for pushed, uncommitted block data.
    staging: LruCache<DatumId, Bytes>,

    /// Committed block replicas by block id.
    blocks: HashMap<u64, Bytes>,
}

impl Datanode {
    pub fn new(host: &str, port: u16) -> Datanode {
        Datanode {
            name: format!("{host}:{port}"),
            host: host.to_string(),
            staging: LruCache::new(NonZeroUsize::new(STAGING_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
            blocks: HashMap::new(),
        }
    }

    /// Receive block data pushed by a client into the staging cache, keyed by
    /// the sha256 of `data`.
    pub fn push_block(&mut self, datum_id: DatumId, data: Bytes) {
        self.staging.put(datum_id, data);
    }

    /// Move a staged datum into block storage under `block_id`.
    pub fn commit_block(&mut self, datum_id: &DatumId, block_id: u64) -> Result<(), NoDatumError> {
        let data = self.staging.pop(datum_id).ok_or(NoDatumError)?;
        self.blocks.insert(block_id, data);
        Ok(())
    }

    pub fn read_block(&self, block_id: u64) -> Option<Bytes> {
        self.blocks.get(&block_id).cloned()
    }

    pub fn remove_block(&mut self, block_id: u64) {
        self.blocks.remove(&block_id);
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn bytes_used(&self) -> u64 {
        self.blocks.values().map(|b| b.len() as u64).sum()
    }

    /// Flip the first byte of a stored replica.
    pub fn corrupt_block(&mut self, block_id: u64) -> bool {
        match self.blocks.get_mut(&block_id) {
            Some(data) if !data.is_empty() => {
                let mut corrupted = data.to_vec();
                corrupted[0] ^= 0xff;
                *data = Bytes::from(corrupted);
                true
            }
            _ => false,
        }
    }
}
