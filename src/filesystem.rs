use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::path::HdfsPath;
use crate::status::{BlockLocation, FileStatus, FsPermission};

/// Parameters of a file creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub overwrite: bool,
    pub replication: u16,
    pub block_size: u64,
    pub permission: FsPermission,
}

impl Default for CreateOptions {
    fn default() -> Self {
        CreateOptions {
            overwrite: true,
            replication: 3,
            block_size: 128 * 1024 * 1024,
            permission: FsPermission::FILE_DEFAULT,
        }
    }
}

/// The primitive operations of a remote filesystem service.
///
/// Implemented by [`crate::webhdfs::WebHdfs`] for a real NameNode and by
/// [`crate::cluster::MiniCluster`] for an in-process one.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a directory and any missing parents. Returns true on success,
    /// including when the directory already exists.
    async fn mkdirs(&self, path: &HdfsPath, permission: FsPermission) -> Result<bool>;

    /// Create a file holding `data`, creating missing parents.
    async fn create(&self, path: &HdfsPath, data: Bytes, options: &CreateOptions) -> Result<()>;

    /// Append `data` to an existing file.
    async fn append(&self, path: &HdfsPath, data: Bytes) -> Result<()>;

    /// Read up to `length` bytes starting at `offset`. Short at end of file.
    async fn read_range(&self, path: &HdfsPath, offset: u64, length: u64) -> Result<Bytes>;

    /// Rename `src` to `dst`. Returns false when the rename is not possible
    /// (missing source, existing destination file, missing destination parent).
    async fn rename(&self, src: &HdfsPath, dst: &HdfsPath) -> Result<bool>;

    /// Delete a path. Returns false if it does not exist.
    async fn delete(&self, path: &HdfsPath, recursive: bool) -> Result<bool>;

    async fn get_file_status(&self, path: &HdfsPath) -> Result<FileStatus>;

    /// Direct children of a directory, or the file itself.
    async fn list_status(&self, path: &HdfsPath) -> Result<Vec<FileStatus>>;

    /// Blocks overlapping `[offset, offset + length)`.
    async fn get_file_block_locations(
        &self,
        path: &HdfsPath,
        offset: u64,
        length: u64,
    ) -> Result<Vec<BlockLocation>>;
}
