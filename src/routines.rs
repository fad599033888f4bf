//! The demonstration routines. Each one makes a single client call and
//! prints the result to `out`.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::client::Client;
use crate::config::{keys, Configuration};
use crate::error::{HdfsError, Result};
use crate::filesystem::FileSystem;
use crate::status::{FileStatus, FileType};
use crate::stream::copy_bytes;

pub const HDFS_PATH: &str = "hdfs://hadoop000:8020";
pub const USER: &str = "hadoop";

/// Set up the shared client handle with a replication factor of 1.
pub async fn set_up<W>(out: &mut W, uri: &str, mut conf: Configuration, user: &str) -> Result<Client>
where
    W: AsyncWrite + Unpin + Send,
{
    out.write_all(b"--------setUp---------\n").await?;
    conf.set(keys::REPLICATION, "1");
    Client::connect(uri, conf, user)
}

/// [`set_up`] against a service that is already running in-process.
pub async fn set_up_with<W>(
    out: &mut W,
    uri: &str,
    mut conf: Configuration,
    user: &str,
    fs: Arc<dyn FileSystem>,
) -> Result<Client>
where
    W: AsyncWrite + Unpin + Send,
{
    out.write_all(b"--------setUp---------\n").await?;
    conf.set(keys::REPLICATION, "1");
    Client::with_filesystem(uri, conf, user, fs)
}

pub async fn tear_down<W>(out: &mut W, client: Client) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    client.close();
    out.write_all(b"--------tearDown---------\n").await?;
    out.flush().await?;
    Ok(())
}

pub async fn mkdir<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let result = client.mkdirs(path).await?;
    out.write_all(format!("{result}\n").as_bytes()).await?;
    Ok(())
}

/// Print a file's contents.
pub async fn text<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut input = client.open(path).await?;
    copy_bytes(&mut input, out, 1024).await?;
    Ok(())
}

pub async fn create(client: &Client, path: &str, message: &str) -> Result<()> {
    let mut output = client.create(path).await?;
    output.write_utf(message).await?;
    output.flush().await?;
    output.close().await
}

pub async fn rename<W>(client: &Client, out: &mut W, src: &str, dst: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let result = client.rename(src, dst).await?;
    out.write_all(format!("{result}\n").as_bytes()).await?;
    Ok(())
}

pub async fn copy_from_local_file(client: &Client, src: &Path, dst: &str) -> Result<()> {
    client.copy_from_local_file(src, dst).await
}

/// Upload a large local file, printing a dot to `out` per buffer written.
pub async fn copy_from_local_big_file<W>(client: &Client, out: &mut W, src: &Path, dst: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut input = tokio::fs::File::open(src).await?;
    let (tick, mut ticks) = mpsc::unbounded_channel::<()>();
    let mut output = client
        .create_with_progress(dst, move || {
            // The receiver outlives the stream holding this sender.
            let _ = tick.send(());
        })
        .await?;

    let copy = async move {
        let copied = copy_bytes(&mut input, &mut output, 4096).await;
        // Dropping the stream drops the sender and ends the dots.
        drop(output);
        copied
    };
    let dots = async {
        while ticks.recv().await.is_some() {
            out.write_all(b".").await?;
            out.flush().await?;
        }
        Ok::<(), HdfsError>(())
    };
    let (copied, printed) = tokio::join!(copy, dots);
    copied?;
    printed?;

    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

pub async fn copy_to_local_file(client: &Client, src: &str, dst: &Path) -> Result<()> {
    client.copy_to_local_file(false, src, dst, true).await
}

pub const DIRECTORY_LABEL: &str = "文件夹";
pub const FILE_LABEL: &str = "文件";

/// One listing line: path, kind, permission, length, replication. Symlinks
/// are labelled as files.
pub fn status_line(client: &Client, status: &FileStatus) -> String {
    let kind = match status.file_type {
        FileType::Directory => DIRECTORY_LABEL,
        FileType::File | FileType::Symlink => FILE_LABEL,
    };
    format!(
        "{}\t{}\t{}\t{}\t{}",
        client.qualify(&status.path),
        kind,
        status.permission,
        status.length,
        status.replication
    )
}

pub async fn list_files<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    for status in client.list_status(path).await? {
        out.write_all(format!("{}\n", status_line(client, &status)).as_bytes()).await?;
    }
    Ok(())
}

pub async fn list_files_recursive<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    for located in client.list_files(path, true).await? {
        out.write_all(format!("{}\n", status_line(client, &located.status)).as_bytes()).await?;
    }
    Ok(())
}

/// Print `name===offset===length` for every replica of every block.
pub async fn get_file_block_locations<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let status = client.get_file_status(path).await?;
    let blocks = client.get_file_block_locations(&status, 0, status.length).await?;
    for block in blocks {
        for name in &block.names {
            out.write_all(format!("{}==={}==={}\n", name, block.offset, block.length).as_bytes()).await?;
        }
    }
    Ok(())
}

pub async fn delete<W>(client: &Client, out: &mut W, path: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let result = client.delete(path, true).await?;
    out.write_all(format!("{result}\n").as_bytes()).await?;
    Ok(())
}

pub async fn test_replication<W>(client: &Client, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let replication = client.configuration().get(keys::REPLICATION).unwrap_or("null");
    out.write_all(format!("{replication}\n").as_bytes()).await?;
    Ok(())
}
