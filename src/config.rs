//! Client configuration: string properties with Hadoop-style keys.

use std::collections::BTreeMap;
use std::path::Path;

use byte_unit::Byte;
use serde::{Deserialize, Serialize};

use crate::error::{HdfsError, Result};

/// Property names understood by the client.
pub mod keys {
    pub const DEFAULT_FS: &str = "fs.defaultFS";
    pub const REPLICATION: &str = "dfs.replication";
    pub const BLOCK_SIZE: &str = "dfs.blocksize";
    pub const BUFFER_SIZE: &str = "io.file.buffer.size";
    pub const NAMENODE_HTTP_ADDRESS: &str = "dfs.namenode.http-address";
    pub const HTTP_POLICY: &str = "dfs.http.policy";
    pub const CLIENT_WRITE_BUFFER: &str = "dfs.client.write.buffer";
}

/// Built-in property defaults.
pub mod defaults {
    pub const DEFAULT_FS: &str = "hdfs://localhost:8020";
    pub const REPLICATION: &str = "3";
    /// 128 MiB.
    pub const BLOCK_SIZE: &str = "134217728";
    pub const BUFFER_SIZE: &str = "4096";
    pub const NAMENODE_HTTP_PORT: u16 = 9870;
    pub const HTTP_POLICY: &str = "HTTP_ONLY";
    /// Upper bound on data held by an output stream before it is sent: 8 MiB.
    pub const CLIENT_WRITE_BUFFER: &str = "8388608";

    pub fn lookup(key: &str) -> Option<&'static str> {
        match key {
            super::keys::DEFAULT_FS => Some(DEFAULT_FS),
            super::keys::REPLICATION => Some(REPLICATION),
            super::keys::BLOCK_SIZE => Some(BLOCK_SIZE),
            super::keys::BUFFER_SIZE => Some(BUFFER_SIZE),
            super::keys::HTTP_POLICY => Some(HTTP_POLICY),
            super::keys::CLIENT_WRITE_BUFFER => Some(CLIENT_WRITE_BUFFER),
            _ => None,
        }
    }
}

/// Key/value properties. Explicitly set values shadow the defaults table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    properties: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration::default()
    }

    /// Load properties from a JSON object of string values.
    pub fn load(path: impl AsRef<Path>) -> Result<Configuration> {
        let data = std::fs::read(path.as_ref())?;
        let conf: Configuration = serde_json::from_slice(&data)?;
        Ok(conf)
    }

    /// Overlay every property of `other` onto this configuration.
    pub fn merge(&mut self, other: Configuration) {
        self.properties.extend(other.properties);
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn unset(&mut self, key: &str) {
        self.properties.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(|value| value.as_str())
            .or_else(|| defaults::lookup(key))
    }

    /// Explicitly set properties, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn invalid(&self, key: &str) -> HdfsError {
        HdfsError::Config {
            key: key.to_string(),
            value: self.get(key).unwrap_or_default().to_string(),
        }
    }

    /// Size property in bytes; accepts Hadoop suffixes such as `128m`.
    pub fn get_size(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse_size(value).map(Some).ok_or_else(|| self.invalid(key)),
        }
    }

    pub fn replication(&self) -> Result<u16> {
        let value = self.get(keys::REPLICATION).unwrap_or(defaults::REPLICATION);
        match value.trim().parse::<u16>() {
            Ok(replication) if replication > 0 => Ok(replication),
            _ => Err(self.invalid(keys::REPLICATION)),
        }
    }

    pub fn block_size(&self) -> Result<u64> {
        match self.get_size(keys::BLOCK_SIZE)? {
            Some(size) if size > 0 => Ok(size),
            _ => Err(self.invalid(keys::BLOCK_SIZE)),
        }
    }

    pub fn buffer_size(&self) -> Result<usize> {
        match self.get_size(keys::BUFFER_SIZE)? {
            Some(size) if size > 0 => Ok(size as usize),
            _ => Err(self.invalid(keys::BUFFER_SIZE)),
        }
    }

    /// How much an output stream buffers before sending: one block, at most
    /// `dfs.client.write.buffer`.
    pub fn write_buffer(&self) -> Result<usize> {
        let cap = match self.get_size(keys::CLIENT_WRITE_BUFFER)? {
            Some(size) if size > 0 => size,
            _ => return Err(self.invalid(keys::CLIENT_WRITE_BUFFER)),
        };
        Ok(std::cmp::min(self.block_size()?, cap) as usize)
    }

    pub fn https_only(&self) -> bool {
        self.get(keys::HTTP_POLICY)
            .map(|policy| policy.eq_ignore_ascii_case("HTTPS_ONLY"))
            .unwrap_or(false)
    }
}

/// Parse a byte size: plain digits, a Hadoop binary suffix (`k`, `m`, `g`,
/// `t`, `p`, `e`), or any unit string byte-unit understands.
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }

    let (index, suffix) = value.char_indices().last()?;
    let number = &value[..index];
    let unit = match suffix.to_ascii_lowercase() {
        'k' => Some("KiB"),
        'm' => Some("MiB"),
        'g' => Some("GiB"),
        't' => Some("TiB"),
        'p' => Some("PiB"),
        'e' => Some("EiB"),
        _ => None,
    };

    let parsed = match unit {
        Some(unit) => Byte::parse_str(format!("{} {}", number.trim(), unit), false),
        None => Byte::parse_str(value, true),
    };
    parsed.ok().map(|byte| byte.as_u64())
}
