//! Run every routine, in order, against an in-process cluster.
//!
//! Usage:
//!   cargo run --example basic

use std::sync::Arc;

use byte_unit::{Byte, UnitType};
use hdfs::config::{keys, Configuration};
use hdfs::{logging, routines, MiniCluster};
use tokio::io::{AsyncWriteExt, Stdout};

async fn say(out: &mut Stdout, line: &str) -> std::io::Result<()> {
    out.write_all(format!("{line}\n").as_bytes()).await?;
    out.flush().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_DIRECTIVE);

    // Setup a cluster with 3 datanodes.
    let cluster = MiniCluster::new(3, routines::USER);

    // Small blocks so the big file spans several of them.
    let mut conf = Configuration::new();
    conf.set(keys::BLOCK_SIZE, "1m");

    let mut out = tokio::io::stdout();
    let client = routines::set_up_with(&mut out, cluster.uri(), conf, routines::USER, Arc::new(cluster.clone())).await?;

    // Local files to upload.
    let workdir = std::env::temp_dir().join(format!("hdfs-app-demo-{}", std::process::id()));
    tokio::fs::create_dir_all(&workdir).await?;
    let small = workdir.join("lenovo.template");
    tokio::fs::write(&small, "template contents\n").await?;
    let big = workdir.join("big.bin");
    let big_data: Vec<u8> = (0..3 * 1024 * 1024 + 100).map(|i: u32| (i % 251) as u8).collect();
    tokio::fs::write(&big, &big_data).await?;

    say(&mut out, "mkdir").await?;
    routines::mkdir(&client, &mut out, "/hdfsapi2/test/").await?;

    say(&mut out, "create").await?;
    routines::create(&client, "/hdfsapi2/test/b.text", "hello, ustcck").await?;

    say(&mut out, "text").await?;
    let mut properties = client.create("/cdh_version.properties").await?;
    properties.write(b"version=demo\n").await?;
    properties.close().await?;
    routines::text(&client, &mut out, "/cdh_version.properties").await?;

    say(&mut out, "rename").await?;
    routines::rename(&client, &mut out, "/hdfsapi2/test/b.text", "/hdfsapi2/test/c.text").await?;

    say(&mut out, "copyFromLocalFile").await?;
    routines::mkdir(&client, &mut out, "/hdfsapi/test/").await?;
    routines::copy_from_local_file(&client, &small, "/hdfsapi/test/").await?;

    say(&mut out, "copyFromLocalBigFile").await?;
    routines::copy_from_local_big_file(&client, &mut out, &big, "/hdfsapi/test/big.bin").await?;

    say(&mut out, "copyToLocalFile").await?;
    let local_copy = workdir.join("copy.template");
    routines::copy_to_local_file(&client, "/hdfsapi/test/lenovo.template", &local_copy).await?;
    let copied = tokio::fs::read_to_string(&local_copy).await?;
    say(&mut out, copied.trim_end()).await?;

    say(&mut out, "listFiles").await?;
    routines::list_files(&client, &mut out, "/hdfsapi/test/").await?;

    say(&mut out, "listFilesRecursive").await?;
    routines::list_files_recursive(&client, &mut out, "/").await?;

    say(&mut out, "getFileBlockLocations").await?;
    routines::get_file_block_locations(&client, &mut out, "/hdfsapi/test/big.bin").await?;

    // Disk usage across datanodes.
    for (name, used) in cluster.datanode_usage().await {
        let used = Byte::from_u64(used).get_appropriate_unit(UnitType::Binary);
        say(&mut out, &format!("{name} used: {used:.2}")).await?;
    }

    say(&mut out, "delete").await?;
    routines::delete(&client, &mut out, "/hdfsapi/test/big.bin").await?;

    say(&mut out, "testReplication").await?;
    routines::test_replication(&client, &mut out).await?;

    routines::tear_down(&mut out, client).await?;
    tokio::fs::remove_dir_all(&workdir).await?;
    Ok(())
}
