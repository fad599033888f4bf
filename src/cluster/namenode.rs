use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{HdfsError, Result};
use crate::filesystem::CreateOptions;
use crate::path::HdfsPath;
use crate::status::{FileStatus, FileType, FsPermission};

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct Attributes {
    pub permission: FsPermission,
    pub owner: String,
    pub group: String,
    pub modification_time: u64,
    pub access_time: u64,
}

#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub id: u64,
    pub offset: u64,
    pub length: u64,
    pub checksum: u32,
    /// Indices of the datanodes holding a replica.
    pub locations: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct INodeFile {
    pub attributes: Attributes,
    pub replication: u16,
    pub block_size: u64,
    /// The length of the file in bytes.
    pub length: u64,
    /// The blocks that make up the file, in offset order.
    pub blocks: Vec<BlockInfo>,
}

#[derive(Debug, Clone)]
pub enum INode {
    Directory(Attributes),
    File(INodeFile),
}

impl INode {
    fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            INode::Directory(attributes) => attributes,
            INode::File(file) => &mut file.attributes,
        }
    }
}

/// The namespace: every directory and file, keyed by path.
pub struct Namenode {
    file_table: BTreeMap<HdfsPath, INode>,
    owner: String,
    group: String,

    // Block id counter.
    block_counter: u64,

    // Round-robin cursor over datanodes.
    next_datanode: usize,
    num_datanodes: usize,
}

impl Namenode {
    pub fn new(owner: &str, num_datanodes: usize) -> Namenode {
        let mut namenode = Namenode {
            file_table: BTreeMap::new(),
            owner: owner.to_string(),
            group: "supergroup".to_string(),
            block_counter: 0,
            next_datanode: 0,
            num_datanodes,
        };
        let root = INode::Directory(namenode.attributes(FsPermission::DIR_DEFAULT));
        namenode.file_table.insert(HdfsPath::root(), root);
        namenode
    }

    fn attributes(&self, permission: FsPermission) -> Attributes {
        let now = now_millis();
        Attributes {
            permission,
            owner: self.owner.clone(),
            group: self.group.clone(),
            modification_time: now,
            access_time: now,
        }
    }

    pub fn get(&self, path: &HdfsPath) -> Option<&INode> {
        self.file_table.get(path)
    }

    pub fn file(&self, path: &HdfsPath) -> Result<&INodeFile> {
        match self.file_table.get(path) {
            Some(INode::File(file)) => Ok(file),
            Some(INode::Directory(_)) => Err(HdfsError::IsADirectory(path.to_string())),
            None => Err(HdfsError::NotFound(path.to_string())),
        }
    }

    fn file_mut(&mut self, path: &HdfsPath) -> Result<&mut INodeFile> {
        match self.file_table.get_mut(path) {
            Some(INode::File(file)) => Ok(file),
            Some(INode::Directory(_)) => Err(HdfsError::IsADirectory(path.to_string())),
            None => Err(HdfsError::NotFound(path.to_string())),
        }
    }

    pub fn status(&self, path: &HdfsPath) -> Result<FileStatus> {
        let inode = self
            .file_table
            .get(path)
            .ok_or_else(|| HdfsError::NotFound(path.to_string()))?;
        Ok(to_status(path, inode))
    }

    /// Fail if any ancestor of `path` is a file.
    fn check_ancestors(&self, path: &HdfsPath) -> Result<()> {
        for ancestor in path.ancestors() {
            if let Some(INode::File(_)) = self.file_table.get(&ancestor) {
                return Err(HdfsError::ParentNotDirectory(ancestor.to_string()));
            }
        }
        Ok(())
    }

    fn create_parents(&mut self, path: &HdfsPath) {
        for ancestor in path.ancestors() {
            if !self.file_table.contains_key(&ancestor) {
                let attributes = self.attributes(FsPermission::DIR_DEFAULT);
                self.file_table.insert(ancestor, INode::Directory(attributes));
            }
        }
    }

    fn touch_parent(&mut self, path: &HdfsPath) {
        if let Some(parent) = path.parent() {
            if let Some(inode) = self.file_table.get_mut(&parent) {
                inode.attributes_mut().modification_time = now_millis();
            }
        }
    }

    pub fn mkdirs(&mut self, path: &HdfsPath, permission: FsPermission) -> Result<bool> {
        match self.file_table.get(path) {
            Some(INode::Directory(_)) => return Ok(true),
            Some(INode::File(_)) => return Err(HdfsError::AlreadyExists(path.to_string())),
            None => {}
        }
        self.check_ancestors(path)?;
        self.create_parents(path);
        let attributes = self.attributes(permission);
        self.file_table.insert(path.clone(), INode::Directory(attributes));
        self.touch_parent(path);
        Ok(true)
    }

    /// Insert an empty file entry. Returns the blocks of an overwritten file.
    pub fn create_file(&mut self, path: &HdfsPath, options: &CreateOptions) -> Result<Vec<BlockInfo>> {
        let replaced = match self.file_table.get(path) {
            Some(INode::Directory(_)) => return Err(HdfsError::AlreadyExists(path.to_string())),
            Some(INode::File(_)) if !options.overwrite => {
                return Err(HdfsError::AlreadyExists(path.to_string()))
            }
            Some(INode::File(file)) => file.blocks.clone(),
            None => vec![],
        };
        self.check_ancestors(path)?;
        self.create_parents(path);

        let file = INodeFile {
            attributes: self.attributes(options.permission),
            replication: options.replication,
            block_size: options.block_size,
            length: 0,
            blocks: vec![],
        };
        self.file_table.insert(path.clone(), INode::File(file));
        self.touch_parent(path);
        Ok(replaced)
    }

    pub fn allocate_block(&mut self) -> u64 {
        let block_id = self.block_counter;
        self.block_counter += 1;
        block_id
    }

    /// Pick `replication` distinct datanodes (fewer if the cluster is smaller).
    pub fn choose_targets(&mut self, replication: u16) -> Vec<usize> {
        if self.num_datanodes == 0 {
            return vec![];
        }
        let count = std::cmp::min(replication as usize, self.num_datanodes);
        let targets = (0..count)
            .map(|i| (self.next_datanode + i) % self.num_datanodes)
            .collect();
        self.next_datanode = (self.next_datanode + 1) % self.num_datanodes;
        targets
    }

    pub fn add_block(&mut self, path: &HdfsPath, block: BlockInfo) -> Result<()> {
        let file = self.file_mut(path)?;
        file.length = block.offset + block.length;
        file.blocks.push(block);
        file.attributes.modification_time = now_millis();
        Ok(())
    }

    /// Detach the last block of a file if it is not full, so an append can
    /// rewrite it.
    pub fn take_partial_last_block(&mut self, path: &HdfsPath) -> Result<Option<BlockInfo>> {
        let file = self.file_mut(path)?;
        let partial = match file.blocks.last() {
            Some(last) => last.length < file.block_size,
            None => false,
        };
        if !partial {
            return Ok(None);
        }
        let block = file.blocks.pop();
        if let Some(block) = &block {
            file.length = block.offset;
        }
        Ok(block)
    }

    pub fn list(&self, path: &HdfsPath) -> Result<Vec<FileStatus>> {
        match self.file_table.get(path) {
            None => Err(HdfsError::NotFound(path.to_string())),
            Some(inode @ INode::File(_)) => Ok(vec![to_status(path, inode)]),
            Some(INode::Directory(_)) => Ok(self
                .file_table
                .iter()
                .filter(|(child, _)| child.parent().as_ref() == Some(path))
                .map(|(child, inode)| to_status(child, inode))
                .collect()),
        }
    }

    fn has_children(&self, path: &HdfsPath) -> bool {
        self.file_table
            .keys()
            .any(|child| child != path && child.starts_with(path))
    }

    /// Remove a path. `Ok(None)` if it does not exist, otherwise the blocks
    /// that were freed.
    pub fn delete(&mut self, path: &HdfsPath, recursive: bool) -> Result<Option<Vec<BlockInfo>>> {
        if !self.file_table.contains_key(path) {
            return Ok(None);
        }
        if !recursive && self.has_children(path) {
            return Err(HdfsError::DirectoryNotEmpty(path.to_string()));
        }

        let doomed: Vec<HdfsPath> = self
            .file_table
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();

        let mut freed = vec![];
        for p in doomed {
            if let Some(INode::File(file)) = self.file_table.remove(&p) {
                freed.extend(file.blocks);
            }
        }
        self.touch_parent(path);
        Ok(Some(freed))
    }

    pub fn rename(&mut self, src: &HdfsPath, dst: &HdfsPath) -> bool {
        if src.is_root() || !self.file_table.contains_key(src) {
            return false;
        }
        if src == dst {
            return true;
        }

        // Renaming onto an existing directory moves the source inside it.
        let target = match self.file_table.get(dst) {
            Some(INode::Directory(_)) => match dst.join(src.name()) {
                Ok(target) => target,
                Err(_) => return false,
            },
            Some(INode::File(_)) => return false,
            None => dst.clone(),
        };

        if self.file_table.contains_key(&target) || target.starts_with(src) {
            return false;
        }
        match target.parent().and_then(|parent| self.file_table.get(&parent)) {
            Some(INode::Directory(_)) => {}
            _ => return false,
        }

        let moved: Vec<HdfsPath> = self
            .file_table
            .keys()
            .filter(|p| p.starts_with(src))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(inode), Some(new)) = (self.file_table.remove(&old), old.rebase(src, &target)) {
                self.file_table.insert(new, inode);
            }
        }

        self.touch_parent(src);
        self.touch_parent(&target);
        true
    }

    /// Blocks of a file overlapping `[offset, offset + length)`. A zero
    /// length selects the block containing `offset`.
    pub fn blocks_in_range(&self, path: &HdfsPath, offset: u64, length: u64) -> Result<Vec<BlockInfo>> {
        let file = self.file(path)?;
        let end = offset.saturating_add(length.max(1));
        Ok(file
            .blocks
            .iter()
            .filter(|block| block.offset < end && block.offset + block.length > offset)
            .cloned()
            .collect())
    }
}

fn to_status(path: &HdfsPath, inode: &INode) -> FileStatus {
    match inode {
        INode::Directory(attributes) => FileStatus {
            path: path.clone(),
            file_type: FileType::Directory,
            length: 0,
            permission: attributes.permission,
            owner: attributes.owner.clone(),
            group: attributes.group.clone(),
            replication: 0,
            block_size: 0,
            modification_time: attributes.modification_time,
            access_time: 0,
        },
        INode::File(file) => FileStatus {
            path: path.clone(),
            file_type: FileType::File,
            length: file.length,
            permission: file.attributes.permission,
            owner: file.attributes.owner.clone(),
            group: file.attributes.group.clone(),
            replication: file.replication,
            block_size: file.block_size,
            modification_time: file.attributes.modification_time,
            access_time: file.attributes.access_time,
        },
    }
}
