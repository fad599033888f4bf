//! Run one demonstration routine against a remote filesystem.
//!
//! Usage:
//!   hdfs-app [--uri hdfs://hadoop000:8020] [--user hadoop] [-D key=value]... <COMMAND>

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hdfs::config::Configuration;
use hdfs::{logging, routines};

#[derive(Parser)]
#[command(name = "hdfs-app", version, about = "Exercise a distributed filesystem client")]
struct Cli {
    /// Filesystem URI.
    #[arg(long, env = "HDFS_URI", default_value = routines::HDFS_PATH)]
    uri: String,

    /// User name to act as.
    #[arg(long, env = "HADOOP_USER_NAME", default_value = routines::USER)]
    user: String,

    /// JSON file of configuration properties.
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Set a configuration property (applied after --conf).
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a directory and its parents.
    Mkdir {
        #[arg(default_value = "/hdfsapi2/test/")]
        path: String,
    },
    /// Print a file.
    Text {
        #[arg(default_value = "/cdh_version.properties")]
        path: String,
    },
    /// Create a file holding one modified-UTF-8 string.
    Create {
        #[arg(default_value = "/hdfsapi2/test/b.text")]
        path: String,
        #[arg(long, default_value = "hello, ustcck")]
        message: String,
    },
    Rename {
        #[arg(default_value = "/hdfsapi2/test/b.text")]
        src: String,
        #[arg(default_value = "/hdfsapi2/test/c.text")]
        dst: String,
    },
    /// Copy a local file into the filesystem.
    Put {
        src: PathBuf,
        #[arg(default_value = "/hdfsapi/test/")]
        dst: String,
    },
    /// Copy a large local file, printing progress.
    PutBig { src: PathBuf, dst: String },
    /// Copy a file out of the filesystem.
    Get {
        src: String,
        dst: PathBuf,
        /// Remove the source after copying.
        #[arg(long)]
        delete_src: bool,
        /// Write a .crc checksum file next to the copy.
        #[arg(long)]
        crc: bool,
    },
    /// List a directory.
    Ls {
        #[arg(default_value = "/hdfsapi/test/")]
        path: String,
    },
    /// List every file under a directory.
    Lsr {
        #[arg(default_value = "/hdfsapi/test/")]
        path: String,
    },
    /// Show where each block of a file is stored.
    Blocks { path: String },
    /// Delete a path recursively.
    Rm { path: String },
    /// Print the configured replication factor.
    Replication,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_DIRECTIVE);
    let cli = Cli::parse();

    let mut conf = match &cli.conf {
        Some(path) => Configuration::load(path)?,
        None => Configuration::new(),
    };
    for (key, value) in &cli.properties {
        conf.set(key, value.clone());
    }

    let mut out = tokio::io::stdout();
    let client = routines::set_up(&mut out, &cli.uri, conf, &cli.user).await?;

    match &cli.command {
        Command::Mkdir { path } => routines::mkdir(&client, &mut out, path).await?,
        Command::Text { path } => routines::text(&client, &mut out, path).await?,
        Command::Create { path, message } => routines::create(&client, path, message).await?,
        Command::Rename { src, dst } => routines::rename(&client, &mut out, src, dst).await?,
        Command::Put { src, dst } => routines::copy_from_local_file(&client, src, dst).await?,
        Command::PutBig { src, dst } => routines::copy_from_local_big_file(&client, &mut out, src, dst).await?,
        Command::Get { src, dst, delete_src, crc } => {
            client.copy_to_local_file(*delete_src, src, dst, !*crc).await?
        }
        Command::Ls { path } => routines::list_files(&client, &mut out, path).await?,
        Command::Lsr { path } => routines::list_files_recursive(&client, &mut out, path).await?,
        Command::Blocks { path } => routines::get_file_block_locations(&client, &mut out, path).await?,
        Command::Rm { path } => routines::delete(&client, &mut out, path).await?,
        Command::Replication => routines::test_replication(&client, &mut out).await?,
    }

    routines::tear_down(&mut out, client).await?;
    Ok(())
}
