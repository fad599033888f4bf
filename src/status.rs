use std::fmt;

use crate::error::{HdfsError, Result};
use crate::path::HdfsPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// Unix-style permission bits (owner/group/other).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsPermission(u16);

impl FsPermission {
    pub const FILE_DEFAULT: FsPermission = FsPermission(0o644);
    pub const DIR_DEFAULT: FsPermission = FsPermission(0o755);

    pub fn new(mode: u16) -> FsPermission {
        FsPermission(mode & 0o777)
    }

    /// Parse an octal mode string such as `"755"` or `"0644"`.
    pub fn from_octal(s: &str) -> Result<FsPermission> {
        let mode = u16::from_str_radix(s, 8).map_err(|_| HdfsError::Config {
            key: "permission".to_string(),
            value: s.to_string(),
        })?;
        if mode > 0o1777 {
            return Err(HdfsError::Config { key: "permission".to_string(), value: s.to_string() });
        }
        Ok(FsPermission::new(mode))
    }

    pub fn mode(&self) -> u16 {
        self.0
    }

    pub fn to_octal(&self) -> String {
        format!("{:o}", self.0)
    }
}

impl fmt::Display for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::with_capacity(9);
        for shift in [6, 3, 0] {
            let bits = (self.0 >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&s)
    }
}

/// Metadata of a single file or directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStatus {
    pub path: HdfsPath,
    pub file_type: FileType,
    /// The length of the file in bytes, 0 for directories.
    pub length: u64,
    pub permission: FsPermission,
    pub owner: String,
    pub group: String,
    /// Replication factor of the file, 0 for directories.
    pub replication: u16,
    pub block_size: u64,
    /// Milliseconds since the epoch.
    pub modification_time: u64,
    pub access_time: u64,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// Where the replicas of one block live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    /// `host:port` of each datanode holding a replica.
    pub names: Vec<String>,
    pub hosts: Vec<String>,
    /// Offset of the block inside the file.
    pub offset: u64,
    pub length: u64,
}

/// A file status together with the locations of its blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFileStatus {
    pub status: FileStatus,
    pub block_locations: Vec<BlockLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_display() {
        assert_eq!(FsPermission::FILE_DEFAULT.to_string(), "rw-r--r--");
        assert_eq!(FsPermission::DIR_DEFAULT.to_string(), "rwxr-xr-x");
        assert_eq!(FsPermission::new(0o000).to_string(), "---------");
        assert_eq!(FsPermission::new(0o777).to_string(), "rwxrwxrwx");
    }

    #[test]
    fn test_permission_from_octal() {
        assert_eq!(FsPermission::from_octal("755").unwrap(), FsPermission::DIR_DEFAULT);
        assert_eq!(FsPermission::from_octal("0644").unwrap(), FsPermission::FILE_DEFAULT);
        // Sticky bit is dropped.
        assert_eq!(FsPermission::from_octal("1777").unwrap().mode(), 0o777);
        assert!(FsPermission::from_octal("rwx").is_err());
        assert!(FsPermission::from_octal("9").is_err());
        assert_eq!(FsPermission::new(0o640).to_octal(), "640");
    }
}
