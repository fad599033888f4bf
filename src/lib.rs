//! A small client for HDFS-style distributed filesystems.
//!
//! [`Client`] is the connection handle. It talks to a remote NameNode over
//! WebHDFS ([`webhdfs::WebHdfs`]) or to an in-process [`cluster::MiniCluster`].
//! [`routines`] holds the demonstration routines built on top of it.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod local;
pub mod logging;
pub mod path;
pub mod routines;
pub mod status;
pub mod stream;
pub mod webhdfs;

pub use crate::client::Client;
pub use crate::cluster::MiniCluster;
pub use crate::config::Configuration;
pub use crate::error::{HdfsError, Result};
pub use crate::filesystem::{CreateOptions, FileSystem};
pub use crate::path::HdfsPath;
pub use crate::status::{BlockLocation, FileStatus, FileType, FsPermission, LocatedFileStatus};
pub use crate::stream::{copy_bytes, FsDataInputStream, FsDataOutputStream};
