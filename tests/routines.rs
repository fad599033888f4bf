use std::sync::Arc;

use hdfs::config::{keys, Configuration};
use hdfs::{routines, Client, FileStatus, FileSystem, FileType, FsPermission, HdfsError, HdfsPath, MiniCluster};

async fn set_up(conf: Configuration) -> (MiniCluster, Client) {
    let cluster = MiniCluster::new(3, routines::USER);
    let mut out: Vec<u8> = vec![];
    let client = routines::set_up_with(&mut out, cluster.uri(), conf, routines::USER, Arc::new(cluster.clone()))
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "--------setUp---------\n");
    (cluster, client)
}

fn lines(out: Vec<u8>) -> Vec<String> {
    String::from_utf8(out).unwrap().lines().map(|l| l.to_string()).collect()
}

#[tokio::test]
async fn test_mkdir_prints_true() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let mut out = vec![];
    routines::mkdir(&client, &mut out, "/hdfsapi2/test/").await.unwrap();
    routines::mkdir(&client, &mut out, "/hdfsapi2/test/").await.unwrap();
    assert_eq!(lines(out), vec!["true", "true"]);
    assert!(client.is_directory("/hdfsapi2").await.unwrap());
}

#[tokio::test]
async fn test_create_writes_utf_and_text_prints_it() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/hdfsapi2/test/b.text", "hello, ustcck").await.unwrap();

    let status = client.get_file_status("/hdfsapi2/test/b.text").await.unwrap();
    assert_eq!(status.length, 15);
    assert_eq!(status.replication, 1);

    let mut out = vec![];
    routines::text(&client, &mut out, "/hdfsapi2/test/b.text").await.unwrap();
    let mut expected = vec![0x00, 0x0d];
    expected.extend_from_slice(b"hello, ustcck");
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_text_missing_file_propagates() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let mut out = vec![];
    let err = routines::text(&client, &mut out, "/cdh_version.properties").await.unwrap_err();
    assert!(matches!(err, HdfsError::NotFound(_)));
}

#[tokio::test]
async fn test_rename() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/hdfsapi2/test/b.text", "hello, ustcck").await.unwrap();

    let mut out = vec![];
    routines::rename(&client, &mut out, "/hdfsapi2/test/b.text", "/hdfsapi2/test/c.text").await.unwrap();
    routines::rename(&client, &mut out, "/hdfsapi2/test/b.text", "/hdfsapi2/test/c.text").await.unwrap();
    assert_eq!(lines(out), vec!["true", "false"]);
    assert!(client.exists("/hdfsapi2/test/c.text").await.unwrap());
    assert!(!client.exists("/hdfsapi2/test/b.text").await.unwrap());
}

#[tokio::test]
async fn test_copy_from_local_into_directory() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("lenovo.template");
    std::fs::write(&local, b"template").unwrap();

    client.mkdirs("/hdfsapi/test/").await.unwrap();
    routines::copy_from_local_file(&client, &local, "/hdfsapi/test/").await.unwrap();

    let status = client.get_file_status("/hdfsapi/test/lenovo.template").await.unwrap();
    assert_eq!(status.length, 8);
}

#[tokio::test]
async fn test_copy_from_local_directory() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("upload");
    std::fs::create_dir_all(root.join("nested")).unwrap();
    std::fs::write(root.join("a.txt"), b"a").unwrap();
    std::fs::write(root.join("nested/b.txt"), b"bb").unwrap();

    client.copy_from_local_file(&root, "/in").await.unwrap();
    assert_eq!(client.get_file_status("/in/a.txt").await.unwrap().length, 1);
    assert_eq!(client.get_file_status("/in/nested/b.txt").await.unwrap().length, 2);
}

#[tokio::test]
async fn test_copy_big_file_spans_blocks() {
    let mut conf = Configuration::new();
    conf.set(keys::BLOCK_SIZE, "64k");
    let (_cluster, client) = set_up(conf).await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("big.bin");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&local, &data).unwrap();

    let mut progress = vec![];
    routines::copy_from_local_big_file(&client, &mut progress, &local, "/hdfsapi/test/big.bin").await.unwrap();
    // One dot per 4096-byte buffer.
    assert_eq!(String::from_utf8(progress).unwrap(), format!("{}\n", ".".repeat(49)));

    let mut out = vec![];
    routines::get_file_block_locations(&client, &mut out, "/hdfsapi/test/big.bin").await.unwrap();
    let lines = lines(out);
    // 200000 bytes in 64 KiB blocks, one replica each.
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("===0===65536"));
    assert!(lines[3].ends_with("===196608===3392"));
    assert!(lines.iter().all(|l| l.starts_with("127.0.0.1:98")));

    let mut copied = vec![];
    routines::text(&client, &mut copied, "/hdfsapi/test/big.bin").await.unwrap();
    assert_eq!(copied, data);
}

#[tokio::test]
async fn test_copy_big_file_prints_dot_per_buffer() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("small.bin");
    std::fs::write(&local, vec![1u8; 10_000]).unwrap();

    let mut out = vec![];
    routines::copy_from_local_big_file(&client, &mut out, &local, "/small.bin").await.unwrap();
    assert_eq!(out, b"...\n");
    assert_eq!(client.get_file_status("/small.bin").await.unwrap().length, 10_000);

    let empty = dir.path().join("empty.bin");
    std::fs::write(&empty, b"").unwrap();
    let mut out = vec![];
    routines::copy_from_local_big_file(&client, &mut out, &empty, "/empty.bin").await.unwrap();
    assert_eq!(out, b"\n");
    assert!(client.is_file("/empty.bin").await.unwrap());
}

#[tokio::test]
async fn test_copy_to_local_with_and_without_checksum() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let mut stream = client.create("/hdfsapi/test/a.txt").await.unwrap();
    stream.write(b"remote contents").await.unwrap();
    stream.close().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw.txt");
    routines::copy_to_local_file(&client, "/hdfsapi/test/a.txt", &raw).await.unwrap();
    assert_eq!(std::fs::read(&raw).unwrap(), b"remote contents");
    assert!(!dir.path().join(".raw.txt.crc").exists());

    // Into an existing directory, with a checksum sidecar, deleting the source.
    client.copy_to_local_file(true, "/hdfsapi/test/a.txt", dir.path(), false).await.unwrap();
    let copy = dir.path().join("a.txt");
    let sidecar = std::fs::read(dir.path().join(".a.txt.crc")).unwrap();
    assert!(hdfs::local::verify(&sidecar, &std::fs::read(&copy).unwrap()));
    assert!(!client.exists("/hdfsapi/test/a.txt").await.unwrap());
}

#[tokio::test]
async fn test_copy_to_local_directory() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/tree/x", "x").await.unwrap();
    routines::create(&client, "/tree/sub/y", "y").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    client.copy_to_local_file(false, "/tree", dir.path(), true).await.unwrap();
    assert!(dir.path().join("tree/x").is_file());
    assert!(dir.path().join("tree/sub/y").is_file());
}

#[tokio::test]
async fn test_list_files_lines() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    client.mkdirs("/hdfsapi/test/sub").await.unwrap();
    routines::create(&client, "/hdfsapi/test/a.txt", "abc").await.unwrap();

    let mut out = vec![];
    routines::list_files(&client, &mut out, "/hdfsapi/test/").await.unwrap();
    assert_eq!(
        lines(out),
        vec![
            "hdfs://localhost:8020/hdfsapi/test/a.txt\t文件\trw-r--r--\t5\t1",
            "hdfs://localhost:8020/hdfsapi/test/sub\t文件夹\trwxr-xr-x\t0\t0",
        ]
    );
}

#[tokio::test]
async fn test_status_line_labels() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let mut status = FileStatus {
        path: HdfsPath::parse("/hdfsapi/link").unwrap(),
        file_type: FileType::Symlink,
        length: 0,
        permission: FsPermission::new(0o777),
        owner: "hadoop".to_string(),
        group: "supergroup".to_string(),
        replication: 0,
        block_size: 0,
        modification_time: 0,
        access_time: 0,
    };
    assert_eq!(
        routines::status_line(&client, &status),
        "hdfs://localhost:8020/hdfsapi/link\t文件\trwxrwxrwx\t0\t0"
    );
    status.file_type = FileType::Directory;
    assert!(routines::status_line(&client, &status).contains("\t文件夹\t"));
}

#[tokio::test]
async fn test_list_files_recursive_only_files() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/hdfsapi/test/a.txt", "a").await.unwrap();
    routines::create(&client, "/hdfsapi/test/deep/er/b.txt", "b").await.unwrap();
    routines::create(&client, "/hdfsapi/test/z.txt", "z").await.unwrap();
    client.mkdirs("/hdfsapi/test/empty").await.unwrap();

    let located = client.list_files("/hdfsapi/test", true).await.unwrap();
    let paths: Vec<&str> = located.iter().map(|l| l.status.path.as_str()).collect();
    assert_eq!(paths, vec!["/hdfsapi/test/a.txt", "/hdfsapi/test/deep/er/b.txt", "/hdfsapi/test/z.txt"]);
    assert!(located.iter().all(|l| l.block_locations.len() == 1));

    let shallow = client.list_files("/hdfsapi/test", false).await.unwrap();
    assert_eq!(shallow.len(), 2);

    let mut out = vec![];
    routines::list_files_recursive(&client, &mut out, "/hdfsapi/test/").await.unwrap();
    assert_eq!(lines(out).len(), 3);
}

#[tokio::test]
async fn test_delete() {
    let (cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/hdfsapi/test/big.bin", "data").await.unwrap();

    let mut out = vec![];
    routines::delete(&client, &mut out, "/hdfsapi/test/big.bin").await.unwrap();
    routines::delete(&client, &mut out, "/hdfsapi/test/big.bin").await.unwrap();
    assert_eq!(lines(out), vec!["true", "false"]);

    let used: u64 = cluster.datanode_usage().await.iter().map(|(_, u)| u).sum();
    assert_eq!(used, 0);
    assert!(cluster.get_file_status(&HdfsPath::parse("/hdfsapi/test").unwrap()).await.is_ok());
}

#[tokio::test]
async fn test_non_recursive_delete_of_full_directory() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    routines::create(&client, "/d/f", "x").await.unwrap();
    assert!(matches!(client.delete("/d", false).await, Err(HdfsError::DirectoryNotEmpty(_))));
    assert!(client.delete("/d", true).await.unwrap());
}

#[tokio::test]
async fn test_replication_and_tear_down() {
    let (_cluster, client) = set_up(Configuration::new()).await;
    let mut out = vec![];
    routines::test_replication(&client, &mut out).await.unwrap();
    routines::tear_down(&mut out, client).await.unwrap();
    assert_eq!(lines(out), vec!["1", "--------tearDown---------"]);
}
