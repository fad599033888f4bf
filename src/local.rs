//! Checksum sidecar files for local copies.
//!
//! A local copy of `name` gets a `.name.crc` file next to it: the magic
//! `crc\0`, the big-endian bytes-per-checksum, then one big-endian CRC32 per
//! chunk of the data.

use std::path::{Path, PathBuf};

const CRC_MAGIC: &[u8; 4] = b"crc\0";
pub const BYTES_PER_CHECKSUM: usize = 512;

/// Accumulates per-chunk CRC32s of a byte stream.
pub struct ChecksumWriter {
    bytes_per_checksum: usize,
    hasher: crc32fast::Hasher,
    pending: usize,
    checksums: Vec<u32>,
}

impl ChecksumWriter {
    pub fn new(bytes_per_checksum: usize) -> ChecksumWriter {
        ChecksumWriter {
            bytes_per_checksum: bytes_per_checksum.max(1),
            hasher: crc32fast::Hasher::new(),
            pending: 0,
            checksums: vec![],
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = std::cmp::min(self.bytes_per_checksum - self.pending, data.len());
            self.hasher.update(&data[..take]);
            self.pending += take;
            data = &data[take..];
            if self.pending == self.bytes_per_checksum {
                let hasher = std::mem::replace(&mut self.hasher, crc32fast::Hasher::new());
                self.checksums.push(hasher.finalize());
                self.pending = 0;
            }
        }
    }

    /// The sidecar file contents.
    pub fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.checksums.push(self.hasher.finalize());
        }
        let mut out = Vec::with_capacity(8 + 4 * self.checksums.len());
        out.extend_from_slice(CRC_MAGIC);
        out.extend_from_slice(&(self.bytes_per_checksum as u32).to_be_bytes());
        for checksum in self.checksums {
            out.extend_from_slice(&checksum.to_be_bytes());
        }
        out
    }
}

/// `dir/file` -> `dir/.file.crc`
pub fn sidecar_path(file: &Path) -> Option<PathBuf> {
    let name = file.file_name()?.to_str()?;
    Some(file.with_file_name(format!(".{name}.crc")))
}

/// Check `data` against sidecar contents.
pub fn verify(sidecar: &[u8], data: &[u8]) -> bool {
    if sidecar.len() < 8 || &sidecar[..4] != CRC_MAGIC {
        return false;
    }
    let bytes_per_checksum = u32::from_be_bytes([sidecar[4], sidecar[5], sidecar[6], sidecar[7]]) as usize;
    let mut writer = ChecksumWriter::new(bytes_per_checksum);
    writer.update(data);
    writer.finish() == sidecar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_chunks() {
        let data = vec![3u8; 1100];
        let mut writer = ChecksumWriter::new(512);
        // Feed in uneven pieces.
        writer.update(&data[..100]);
        writer.update(&data[100..700]);
        writer.update(&data[700..]);
        let sidecar = writer.finish();

        assert_eq!(&sidecar[..4], b"crc\0");
        assert_eq!(&sidecar[4..8], &512u32.to_be_bytes());
        assert_eq!(sidecar.len(), 8 + 3 * 4);
        assert_eq!(&sidecar[8..12], &crc32fast::hash(&data[..512]).to_be_bytes());
        assert_eq!(&sidecar[16..20], &crc32fast::hash(&data[1024..]).to_be_bytes());
        assert!(verify(&sidecar, &data));
        assert!(!verify(&sidecar, &data[1..]));
    }

    #[test]
    fn test_empty_data() {
        let sidecar = ChecksumWriter::new(512).finish();
        assert_eq!(sidecar.len(), 8);
        assert!(verify(&sidecar, b""));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/ustcck/a.txt")).unwrap(),
            PathBuf::from("/tmp/ustcck/.a.txt.crc")
        );
    }
}
