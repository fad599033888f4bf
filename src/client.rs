use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Configuration;
use crate::error::{HdfsError, Result};
use crate::filesystem::{CreateOptions, FileSystem};
use crate::local::{sidecar_path, ChecksumWriter, BYTES_PER_CHECKSUM};
use crate::path::HdfsPath;
use crate::status::{BlockLocation, FileStatus, FsPermission, LocatedFileStatus};
use crate::stream::{copy_bytes, ByteSink, FsDataInputStream, FsDataOutputStream};
use crate::webhdfs::WebHdfs;

// Input streams fetch this many buffers per remote read.
const READ_WINDOW_BUFFERS: usize = 16;

/// A connection to one filesystem: its URI, configuration and user.
pub struct Client {
    uri: Url,
    conf: Configuration,
    user: String,
    fs: Arc<dyn FileSystem>,
}

impl Client {
    /// Connect to the NameNode named by `uri` (`hdfs://`, `webhdfs://` or
    /// `swebhdfs://`) as `user`.
    pub fn connect(uri: &str, conf: Configuration, user: &str) -> Result<Client> {
        let parsed = Url::parse(uri)?;
        match parsed.scheme() {
            "hdfs" | "webhdfs" | "swebhdfs" => {}
            other => return Err(HdfsError::UnsupportedScheme(other.to_string())),
        }
        let fs = WebHdfs::new(&parsed, &conf, user)?;
        info!(%uri, namenode = %fs.base_url(), %user, "connected");
        Client::with_filesystem(uri, conf, user, Arc::new(fs))
    }

    /// Use an already constructed filesystem service.
    pub fn with_filesystem(uri: &str, conf: Configuration, user: &str, fs: Arc<dyn FileSystem>) -> Result<Client> {
        // Validate up front so routines fail at set-up, not mid-run.
        conf.replication()?;
        conf.block_size()?;
        conf.buffer_size()?;
        Ok(Client {
            uri: Url::parse(uri)?,
            conf,
            user: user.to_string(),
            fs,
        })
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn configuration(&self) -> &Configuration {
        &self.conf
    }

    /// Release the connection.
    pub fn close(self) {
        info!(uri = %self.uri, "closed");
    }

    /// Accept absolute paths and paths qualified with this client's URI.
    pub fn resolve(&self, path: &str) -> Result<HdfsPath> {
        if !path.contains("://") {
            return HdfsPath::parse(path);
        }
        let root = HdfsPath::root().qualify(&self.uri);
        match path.strip_prefix(root.trim_end_matches('/')) {
            Some("") => Ok(HdfsPath::root()),
            Some(rest) if rest.starts_with('/') => HdfsPath::parse(rest),
            _ => Err(HdfsError::InvalidPath(format!("{path} is not in {}", self.uri))),
        }
    }

    /// The fully qualified form of `path`, as shown in listings.
    pub fn qualify(&self, path: &HdfsPath) -> String {
        path.qualify(&self.uri)
    }

    fn create_options(&self) -> Result<CreateOptions> {
        Ok(CreateOptions {
            overwrite: true,
            replication: self.conf.replication()?,
            block_size: self.conf.block_size()?,
            permission: FsPermission::FILE_DEFAULT,
        })
    }

    pub async fn mkdirs(&self, path: &str) -> Result<bool> {
        let path = self.resolve(path)?;
        debug!(%path, "mkdirs");
        self.fs.mkdirs(&path, FsPermission::DIR_DEFAULT).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let path = self.resolve(path)?;
        match self.fs.get_file_status(&path).await {
            Ok(_) => Ok(true),
            Err(HdfsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn is_directory(&self, path: &str) -> Result<bool> {
        let path = self.resolve(path)?;
        match self.fs.get_file_status(&path).await {
            Ok(status) => Ok(status.is_dir()),
            Err(HdfsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        let path = self.resolve(path)?;
        match self.fs.get_file_status(&path).await {
            Ok(status) => Ok(status.is_file()),
            Err(HdfsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_file_status(&self, path: &str) -> Result<FileStatus> {
        let path = self.resolve(path)?;
        self.fs.get_file_status(&path).await
    }

    /// Open a file for reading.
    pub async fn open(&self, path: &str) -> Result<FsDataInputStream> {
        let path = self.resolve(path)?;
        let status = self.fs.get_file_status(&path).await?;
        if status.is_dir() {
            return Err(HdfsError::IsADirectory(path.to_string()));
        }
        let window = self.conf.buffer_size()? * READ_WINDOW_BUFFERS;
        Ok(FsDataInputStream::new(self.fs.clone(), path, status.length, window))
    }

    /// Create (or overwrite) a file. Nothing is sent until the stream fills
    /// its buffer, is flushed, or is closed.
    pub async fn create(&self, path: &str) -> Result<FsDataOutputStream> {
        let path = self.resolve(path)?;
        debug!(%path, "create");
        Ok(FsDataOutputStream::create(
            self.fs.clone(),
            path,
            self.create_options()?,
            self.conf.write_buffer()?,
        ))
    }

    /// Like [`Client::create`], calling `progress` for every write.
    pub async fn create_with_progress<F>(&self, path: &str, progress: F) -> Result<FsDataOutputStream>
    where
        F: FnMut() + Send + 'static,
    {
        let stream = self.create(path).await?;
        Ok(stream.with_progress(Box::new(progress)))
    }

    /// Open an existing file for appending.
    pub async fn append(&self, path: &str) -> Result<FsDataOutputStream> {
        let path = self.resolve(path)?;
        let status = self.fs.get_file_status(&path).await?;
        if status.is_dir() {
            return Err(HdfsError::IsADirectory(path.to_string()));
        }
        Ok(FsDataOutputStream::append(self.fs.clone(), path, self.conf.write_buffer()?))
    }

    pub async fn rename(&self, src: &str, dst: &str) -> Result<bool> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        debug!(%src, %dst, "rename");
        self.fs.rename(&src, &dst).await
    }

    /// Delete a path. The root directory is never deleted.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<bool> {
        let path = self.resolve(path)?;
        self.delete_path(&path, recursive).await
    }

    async fn delete_path(&self, path: &HdfsPath, recursive: bool) -> Result<bool> {
        if path.is_root() {
            warn!("refusing to delete the root directory");
            return Ok(false);
        }
        debug!(%path, recursive, "delete");
        self.fs.delete(path, recursive).await
    }

    /// Direct children of a directory, or the file itself.
    pub async fn list_status(&self, path: &str) -> Result<Vec<FileStatus>> {
        let path = self.resolve(path)?;
        self.fs.list_status(&path).await
    }

    /// Files (never directories) under `path`, depth first, with their block
    /// locations. Only direct children unless `recursive`.
    pub async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<LocatedFileStatus>> {
        let path = self.resolve(path)?;
        let mut files = vec![];
        let mut stack: Vec<VecDeque<FileStatus>> = vec![self.fs.list_status(&path).await?.into()];

        while let Some(queue) = stack.last_mut() {
            let Some(status) = queue.pop_front() else {
                stack.pop();
                continue;
            };
            if status.is_dir() {
                if recursive {
                    stack.push(self.fs.list_status(&status.path).await?.into());
                }
                continue;
            }
            let block_locations = self.fs.get_file_block_locations(&status.path, 0, status.length).await?;
            files.push(LocatedFileStatus { status, block_locations });
        }
        Ok(files)
    }

    /// Blocks of the file described by `status` overlapping
    /// `[start, start + len)`.
    pub async fn get_file_block_locations(&self, status: &FileStatus, start: u64, len: u64) -> Result<Vec<BlockLocation>> {
        if status.is_dir() || start > status.length {
            return Ok(vec![]);
        }
        self.fs.get_file_block_locations(&status.path, start, len).await
    }

    /// Upload a local file or directory. If `dst` is an existing directory
    /// the source is placed inside it.
    pub async fn copy_from_local_file(&self, src: impl AsRef<Path>, dst: &str) -> Result<()> {
        let src = src.as_ref();
        let metadata = tokio::fs::metadata(src).await?;
        let dst = self.resolve(dst)?;
        let target = match self.fs.get_file_status(&dst).await {
            Ok(status) if status.is_dir() => dst.join(local_name(src)?)?,
            Ok(_) | Err(HdfsError::NotFound(_)) => dst,
            Err(e) => return Err(e),
        };
        info!(src = %src.display(), dst = %target, "copy from local");

        if !metadata.is_dir() {
            return self.upload_file(src, target).await;
        }

        let mut pending = vec![(src.to_path_buf(), target)];
        while let Some((local_dir, remote_dir)) = pending.pop() {
            self.fs.mkdirs(&remote_dir, FsPermission::DIR_DEFAULT).await?;
            let mut entries = vec![];
            let mut read_dir = tokio::fs::read_dir(&local_dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                entries.push(entry.path());
            }
            entries.sort();
            for local in entries {
                let remote = remote_dir.join(local_name(&local)?)?;
                if tokio::fs::metadata(&local).await?.is_dir() {
                    pending.push((local, remote));
                } else {
                    self.upload_file(&local, remote).await?;
                }
            }
        }
        Ok(())
    }

    async fn upload_file(&self, local: &Path, remote: HdfsPath) -> Result<()> {
        let mut input = tokio::fs::File::open(local).await?;
        let mut output = FsDataOutputStream::create(
            self.fs.clone(),
            remote,
            self.create_options()?,
            self.conf.write_buffer()?,
        );
        let copied = copy_bytes(&mut input, &mut output, self.conf.buffer_size()?).await?;
        debug!(path = %output.path(), bytes = copied, "uploaded");
        Ok(())
    }

    /// Download a file or directory. If `dst` is an existing local directory
    /// the source is placed inside it. Unless `use_raw_local`, every file
    /// gets a `.name.crc` checksum sidecar. With `delete_src` the remote
    /// source is removed afterwards.
    pub async fn copy_to_local_file(
        &self,
        delete_src: bool,
        src: &str,
        dst: impl AsRef<Path>,
        use_raw_local: bool,
    ) -> Result<()> {
        let src = self.resolve(src)?;
        let status = self.fs.get_file_status(&src).await?;
        let dst = dst.as_ref();
        let dst_is_dir = tokio::fs::metadata(dst).await.map(|m| m.is_dir()).unwrap_or(false);
        let target = if dst_is_dir && !src.is_root() {
            dst.join(src.name())
        } else {
            dst.to_path_buf()
        };
        info!(%src, dst = %target.display(), "copy to local");

        if status.is_dir() {
            let mut pending = vec![(src.clone(), target)];
            while let Some((remote_dir, local_dir)) = pending.pop() {
                tokio::fs::create_dir_all(&local_dir).await?;
                for child in self.fs.list_status(&remote_dir).await? {
                    let local = local_dir.join(child.path.name());
                    if child.is_dir() {
                        pending.push((child.path, local));
                    } else {
                        self.download_file(&child, local, use_raw_local).await?;
                    }
                }
            }
        } else {
            self.download_file(&status, target, use_raw_local).await?;
        }

        if delete_src {
            self.delete_path(&src, true).await?;
        }
        Ok(())
    }

    async fn download_file(&self, status: &FileStatus, local: PathBuf, use_raw_local: bool) -> Result<()> {
        if let Some(parent) = local.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let window = self.conf.buffer_size()? * READ_WINDOW_BUFFERS;
        let mut input = FsDataInputStream::new(self.fs.clone(), status.path.clone(), status.length, window);
        let mut output = LocalFileSink {
            file: tokio::fs::File::create(&local).await?,
            checksum: (!use_raw_local).then(|| ChecksumWriter::new(BYTES_PER_CHECKSUM)),
            path: local,
        };
        let copied = copy_bytes(&mut input, &mut output, self.conf.buffer_size()?).await?;
        debug!(path = %status.path, bytes = copied, "downloaded");
        Ok(())
    }
}

fn local_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| HdfsError::InvalidPath(path.display().to_string()))
}

/// A local file being written, optionally with a checksum sidecar.
struct LocalFileSink {
    file: tokio::fs::File,
    path: PathBuf,
    checksum: Option<ChecksumWriter>,
}

#[async_trait]
impl ByteSink for LocalFileSink {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).await?;
        if let Some(checksum) = self.checksum.as_mut() {
            checksum.update(data);
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.file.flush().await?;
        if let Some(checksum) = self.checksum.take() {
            if let Some(sidecar) = sidecar_path(&self.path) {
                tokio::fs::write(sidecar, checksum.finish()).await?;
            }
        }
        Ok(())
    }
}
