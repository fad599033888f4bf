use bytes::Bytes;
use sha2::Digest;

pub type DatumId = [u8; 32];

pub fn sha256sum(data: &[u8]) -> DatumId {
    let mut hasher = sha2::Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut result = [0u8; 32];
    result.copy_from_slice(digest.as_slice());
    result
}

/// A block of file data that has not been placed on datanodes yet.
pub struct ProtoBlock {
    pub data: Bytes,
    /// Offset of the block inside the file.
    pub offset: u64,
    pub datum_id: DatumId,
    pub checksum: u32,
}

/// Split `data` into blocks of at most `block_size` bytes. The last block
/// is short, never padded.
pub fn data_to_blocks(data: &Bytes, start_offset: u64, block_size: u64) -> Vec<ProtoBlock> {
    let block_size = block_size.max(1) as usize;
    let mut blocks = vec![];
    let mut start = 0;

    while start < data.len() {
        let end = std::cmp::min(start + block_size, data.len());
        let block_data = data.slice(start..end);
        blocks.push(ProtoBlock {
            datum_id: sha256sum(&block_data),
            checksum: crc32fast::hash(&block_data),
            offset: start_offset + start as u64,
            data: block_data,
        });
        start = end;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_to_blocks() {
        let data = Bytes::from(vec![7u8; 2500]);
        let blocks = data_to_blocks(&data, 100, 1024);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset, 100);
        assert_eq!(blocks[1].offset, 1124);
        assert_eq!(blocks[2].data.len(), 452);
        assert_eq!(blocks[2].checksum, crc32fast::hash(&[7u8; 452]));
        assert_eq!(blocks[0].datum_id, blocks[1].datum_id);
    }

    #[test]
    fn test_empty_data_has_no_blocks() {
        assert!(data_to_blocks(&Bytes::new(), 0, 1024).is_empty());
    }
}
