//! In-process stand-in for a remote HDFS service.
//!
//! A [`MiniCluster`] is one namenode (the namespace) plus a few datanodes
//! (block storage). Writes are split into blocks, each block is pushed to
//! its replica datanodes and then committed under a block id allocated by
//! the namenode. Every block carries a CRC32 that is checked on read.

pub mod block;
pub mod datanode;
pub mod namenode;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{HdfsError, Result};
use crate::filesystem::{CreateOptions, FileSystem};
use crate::path::HdfsPath;
use crate::status::{BlockLocation, FileStatus, FsPermission};

use self::block::data_to_blocks;
use self::datanode::Datanode;
use self::namenode::{BlockInfo, Namenode};

pub const DEFAULT_URI: &str = "hdfs://localhost:8020";
const DATANODE_HOST: &str = "127.0.0.1";
const DATANODE_BASE_PORT: u16 = 9866;

struct ClusterState {
    namenode: Namenode,
    datanodes: Vec<Datanode>,
}

impl ClusterState {
    /// Store `data` as new blocks of `path`, starting at file offset `offset`.
    fn write_blocks(&mut self, path: &HdfsPath, data: &Bytes, offset: u64) -> Result<()> {
        let (replication, block_size) = {
            let file = self.namenode.file(path)?;
            (file.replication, file.block_size)
        };

        for proto in data_to_blocks(data, offset, block_size) {
            let block_id = self.namenode.allocate_block();
            let targets = self.namenode.choose_targets(replication);

            let mut locations = vec![];
            for target in targets {
                let datanode = &mut self.datanodes[target];
                datanode.push_block(proto.datum_id, proto.data.clone());
                if datanode.commit_block(&proto.datum_id, block_id).is_err() {
                    warn!(datanode = %datanode.name, block_id, "failed to commit block replica");
                    continue;
                }
                locations.push(target);
            }
            if locations.is_empty() {
                warn!(%path, block_id, offset = proto.offset, "no datanode took the block");
                return Err(HdfsError::NoReplicas { path: path.to_string(), offset: proto.offset });
            }

            debug!(%path, block_id, offset = proto.offset, replicas = locations.len(), "committed block");
            self.namenode.add_block(
                path,
                BlockInfo {
                    id: block_id,
                    offset: proto.offset,
                    length: proto.data.len() as u64,
                    checksum: proto.checksum,
                    locations,
                },
            )?;
        }
        Ok(())
    }

    /// Read a whole block from the first replica whose checksum matches.
    fn read_block(&self, path: &HdfsPath, block: &BlockInfo) -> Result<Bytes> {
        for &location in &block.locations {
            let Some(data) = self.datanodes.get(location).and_then(|d| d.read_block(block.id)) else {
                continue;
            };
            if crc32fast::hash(&data) == block.checksum {
                return Ok(data);
            }
            warn!(%path, block_id = block.id, datanode = %self.datanodes[location].name, "checksum mismatch, trying next replica");
        }
        Err(HdfsError::ChecksumMismatch { path: path.to_string(), offset: block.offset })
    }

    fn free_blocks(&mut self, blocks: &[BlockInfo]) {
        for block in blocks {
            for &location in &block.locations {
                if let Some(datanode) = self.datanodes.get_mut(location) {
                    datanode.remove_block(block.id);
                }
            }
        }
    }

    fn to_location(&self, block: &BlockInfo) -> BlockLocation {
        let datanodes: Vec<&Datanode> = block
            .locations
            .iter()
            .filter_map(|&i| self.datanodes.get(i))
            .collect();
        BlockLocation {
            names: datanodes.iter().map(|d| d.name.clone()).collect(),
            hosts: datanodes.iter().map(|d| d.host.clone()).collect(),
            offset: block.offset,
            length: block.length,
        }
    }
}

/// An in-process filesystem service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MiniCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MiniCluster {
    /// Start a cluster with `num_datanodes` datanodes whose files are owned
    /// by `owner`.
    pub fn new(num_datanodes: usize, owner: &str) -> MiniCluster {
        let datanodes = (0..num_datanodes)
            .map(|i| Datanode::new(DATANODE_HOST, DATANODE_BASE_PORT + i as u16))
            .collect();
        MiniCluster {
            state: Arc::new(Mutex::new(ClusterState {
                namenode: Namenode::new(owner, num_datanodes),
                datanodes,
            })),
        }
    }

    /// The URI clients use to address this cluster.
    pub fn uri(&self) -> &'static str {
        DEFAULT_URI
    }

    /// Bytes stored on each datanode, counting every replica.
    pub async fn datanode_usage(&self) -> Vec<(String, u64)> {
        let state = self.state.lock().await;
        state
            .datanodes
            .iter()
            .map(|d| (d.name.clone(), d.bytes_used()))
            .collect()
    }

    /// Corrupt the replica of the block at `block_index` of `path` held by
    /// its `replica`-th location. Returns false if there is no such replica.
    pub async fn corrupt_replica(&self, path: &HdfsPath, block_index: usize, replica: usize) -> bool {
        let mut state = self.state.lock().await;
        let Ok(file) = state.namenode.file(path) else {
            return false;
        };
        let Some(block) = file.blocks.get(block_index) else {
            return false;
        };
        let (block_id, location) = match block.locations.get(replica) {
            Some(&location) => (block.id, location),
            None => return false,
        };
        state
            .datanodes
            .get_mut(location)
            .map(|d| d.corrupt_block(block_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FileSystem for MiniCluster {
    async fn mkdirs(&self, path: &HdfsPath, permission: FsPermission) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.namenode.mkdirs(path, permission)
    }

    async fn create(&self, path: &HdfsPath, data: Bytes, options: &CreateOptions) -> Result<()> {
        let mut state = self.state.lock().await;
        let replaced = state.namenode.create_file(path, options)?;
        state.free_blocks(&replaced);
        state.write_blocks(path, &data, 0)
    }

    async fn append(&self, path: &HdfsPath, data: Bytes) -> Result<()> {
        let mut state = self.state.lock().await;
        state.namenode.file(path)?;
        if data.is_empty() {
            return Ok(());
        }

        // Refill a partial last block before starting new ones.
        let partial = {
            let file = state.namenode.file(path)?;
            file.blocks.last().filter(|b| b.length < file.block_size).cloned()
        };
        match partial {
            Some(last) => {
                let existing = state.read_block(path, &last)?;
                state.namenode.take_partial_last_block(path)?;
                state.free_blocks(std::slice::from_ref(&last));
                let mut combined = BytesMut::with_capacity(existing.len() + data.len());
                combined.extend_from_slice(&existing);
                combined.extend_from_slice(&data);
                state.write_blocks(path, &combined.freeze(), last.offset)
            }
            None => {
                let length = state.namenode.file(path)?.length;
                state.write_blocks(path, &data, length)
            }
        }
    }

    async fn read_range(&self, path: &HdfsPath, offset: u64, length: u64) -> Result<Bytes> {
        let state = self.state.lock().await;
        let file_length = state.namenode.file(path)?.length;
        if offset >= file_length || length == 0 {
            return Ok(Bytes::new());
        }
        let end = std::cmp::min(file_length, offset.saturating_add(length));

        let mut out = BytesMut::with_capacity((end - offset) as usize);
        for block in state.namenode.blocks_in_range(path, offset, end - offset)? {
            let data = state.read_block(path, &block)?;
            let from = offset.saturating_sub(block.offset) as usize;
            let to = (std::cmp::min(end, block.offset + block.length) - block.offset) as usize;
            out.extend_from_slice(&data[from..to]);
        }
        Ok(out.freeze())
    }

    async fn rename(&self, src: &HdfsPath, dst: &HdfsPath) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.namenode.rename(src, dst))
    }

    async fn delete(&self, path: &HdfsPath, recursive: bool) -> Result<bool> {
        if path.is_root() {
            warn!("refusing to delete the root directory");
            return Ok(false);
        }
        let mut state = self.state.lock().await;
        match state.namenode.delete(path, recursive)? {
            Some(freed) => {
                state.free_blocks(&freed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_file_status(&self, path: &HdfsPath) -> Result<FileStatus> {
        let state = self.state.lock().await;
        state.namenode.status(path)
    }

    async fn list_status(&self, path: &HdfsPath) -> Result<Vec<FileStatus>> {
        let state = self.state.lock().await;
        state.namenode.list(path)
    }

    async fn get_file_block_locations(
        &self,
        path: &HdfsPath,
        offset: u64,
        length: u64,
    ) -> Result<Vec<BlockLocation>> {
        let state = self.state.lock().await;
        let blocks = state.namenode.blocks_in_range(path, offset, length)?;
        Ok(blocks.iter().map(|block| state.to_location(block)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> HdfsPath {
        HdfsPath::parse(s).unwrap()
    }

    fn options(replication: u16, block_size: u64) -> CreateOptions {
        CreateOptions { replication, block_size, ..CreateOptions::default() }
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let cluster = MiniCluster::new(3, "hadoop");
        let data = Bytes::from((0..2500u32).map(|i| i as u8).collect::<Vec<u8>>());
        cluster.create(&p("/a/file"), data.clone(), &options(2, 1024)).await.unwrap();

        let status = cluster.get_file_status(&p("/a/file")).await.unwrap();
        assert_eq!(status.length, 2500);
        assert_eq!(status.replication, 2);
        assert_eq!(status.owner, "hadoop");

        assert_eq!(cluster.read_range(&p("/a/file"), 0, 10_000).await.unwrap(), data);
        assert_eq!(cluster.read_range(&p("/a/file"), 1000, 100).await.unwrap(), data.slice(1000..1100));
        assert!(cluster.read_range(&p("/a/file"), 2500, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replicas_stored_on_datanodes() {
        let cluster = MiniCluster::new(3, "hadoop");
        cluster.create(&p("/f"), Bytes::from(vec![1u8; 3000]), &options(2, 1000)).await.unwrap();
        let total: u64 = cluster.datanode_usage().await.iter().map(|(_, used)| used).sum();
        assert_eq!(total, 6000);

        cluster.delete(&p("/f"), false).await.unwrap();
        let total: u64 = cluster.datanode_usage().await.iter().map(|(_, used)| used).sum();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_block_locations() {
        let cluster = MiniCluster::new(3, "hadoop");
        cluster.create(&p("/f"), Bytes::from(vec![0u8; 2500]), &options(3, 1024)).await.unwrap();

        let blocks = cluster.get_file_block_locations(&p("/f"), 0, 2500).await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[2].offset, 2048);
        assert_eq!(blocks[2].length, 452);
        assert!(blocks.iter().all(|b| b.names.len() == 3));
        assert!(blocks[0].names.contains(&"127.0.0.1:9866".to_string()));

        let middle = cluster.get_file_block_locations(&p("/f"), 1500, 10).await.unwrap();
        assert_eq!(middle.len(), 1);
        assert_eq!(middle[0].offset, 1024);
    }

    #[tokio::test]
    async fn test_append_refills_last_block() {
        let cluster = MiniCluster::new(1, "hadoop");
        cluster.create(&p("/f"), Bytes::from_static(b"hello"), &options(1, 8)).await.unwrap();
        cluster.append(&p("/f"), Bytes::from_static(b", world")).await.unwrap();

        assert_eq!(cluster.read_range(&p("/f"), 0, 100).await.unwrap(), Bytes::from_static(b"hello, world"));
        let blocks = cluster.get_file_block_locations(&p("/f"), 0, 12).await.unwrap();
        let lengths: Vec<u64> = blocks.iter().map(|b| b.length).collect();
        assert_eq!(lengths, vec![8, 4]);
    }

    #[tokio::test]
    async fn test_append_missing_file() {
        let cluster = MiniCluster::new(1, "hadoop");
        let err = cluster.append(&p("/nope"), Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, HdfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_replica_falls_back() {
        let cluster = MiniCluster::new(2, "hadoop");
        cluster.create(&p("/f"), Bytes::from_static(b"payload"), &options(2, 1024)).await.unwrap();

        assert!(cluster.corrupt_replica(&p("/f"), 0, 0).await);
        assert_eq!(cluster.read_range(&p("/f"), 0, 7).await.unwrap(), Bytes::from_static(b"payload"));

        assert!(cluster.corrupt_replica(&p("/f"), 0, 1).await);
        let err = cluster.read_range(&p("/f"), 0, 7).await.unwrap_err();
        assert!(matches!(err, HdfsError::ChecksumMismatch { offset: 0, .. }));
    }

    #[tokio::test]
    async fn test_write_without_datanodes_fails() {
        let cluster = MiniCluster::new(0, "hadoop");
        let err = cluster.create(&p("/f"), Bytes::from_static(b"hello"), &options(1, 1024)).await.unwrap_err();
        assert!(matches!(err, HdfsError::NoReplicas { offset: 0, .. }));

        // The failed block is not recorded.
        let status = cluster.get_file_status(&p("/f")).await.unwrap();
        assert_eq!(status.length, 0);
        assert!(cluster.get_file_block_locations(&p("/f"), 0, 5).await.unwrap().is_empty());

        // An empty file needs no datanodes.
        cluster.create(&p("/empty"), Bytes::new(), &options(1, 1024)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_root_refused() {
        let cluster = MiniCluster::new(1, "hadoop");
        assert!(!cluster.delete(&HdfsPath::root(), true).await.unwrap());
        assert!(cluster.get_file_status(&HdfsPath::root()).await.unwrap().is_dir());
    }
}
