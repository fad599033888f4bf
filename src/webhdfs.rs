//! WebHDFS binding: the [`FileSystem`] operations over a NameNode's REST API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, redirect, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{defaults, keys, Configuration};
use crate::error::{HdfsError, Result};
use crate::filesystem::{CreateOptions, FileSystem};
use crate::path::HdfsPath;
use crate::status::{BlockLocation, FileStatus, FileType, FsPermission};

const WEBHDFS_PREFIX: &str = "/webhdfs/v1";

#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum WireFileType {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    file_type: WireFileType,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    permission: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    replication: u16,
    #[serde(default)]
    block_size: u64,
    #[serde(default)]
    modification_time: u64,
    #[serde(default)]
    access_time: u64,
}

impl WireFileStatus {
    fn into_status(self, path: HdfsPath) -> Result<FileStatus> {
        let permission = if self.permission.is_empty() {
            FsPermission::new(0)
        } else {
            FsPermission::from_octal(&self.permission)?
        };
        Ok(FileStatus {
            path,
            file_type: match self.file_type {
                WireFileType::File => FileType::File,
                WireFileType::Directory => FileType::Directory,
                WireFileType::Symlink => FileType::Symlink,
            },
            length: self.length,
            permission,
            owner: self.owner,
            group: self.group,
            replication: self.replication,
            block_size: self.block_size,
            modification_time: self.modification_time,
            access_time: self.access_time,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: WireFileStatus,
}

#[derive(Debug, Deserialize)]
struct FileStatusList {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<WireFileStatus>,
}

#[derive(Debug, Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatusList,
}

#[derive(Debug, Deserialize)]
struct WireBlockLocation {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    hosts: Vec<String>,
    offset: u64,
    length: u64,
}

#[derive(Debug, Deserialize)]
struct BlockLocationList {
    #[serde(rename = "BlockLocation", default)]
    block_location: Vec<WireBlockLocation>,
}

#[derive(Debug, Deserialize)]
struct BlockLocationsResponse {
    #[serde(rename = "BlockLocations")]
    block_locations: BlockLocationList,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    exception: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionResponse {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

/// Map a WebHDFS error response to an [`HdfsError`].
fn remote_error(status: StatusCode, body: &str) -> HdfsError {
    let Ok(response) = serde_json::from_str::<RemoteExceptionResponse>(body) else {
        return HdfsError::Http(status.as_u16());
    };
    let RemoteException { exception, message } = response.remote_exception;
    match exception.as_str() {
        "FileNotFoundException" => HdfsError::NotFound(message),
        "FileAlreadyExistsException" => HdfsError::AlreadyExists(message),
        "ParentNotDirectoryException" => HdfsError::ParentNotDirectory(message),
        "PathIsNotEmptyDirectoryException" => HdfsError::DirectoryNotEmpty(message),
        "AccessControlException" | "SecurityException" => HdfsError::PermissionDenied(message),
        _ => HdfsError::Remote { exception, message },
    }
}

/// The error for a failed response whose body was read as `body`. An
/// unreadable body leaves only the status code.
fn error_from_body<E>(status: StatusCode, body: std::result::Result<String, E>) -> HdfsError {
    match body {
        Ok(body) => remote_error(status, &body),
        Err(_) => HdfsError::Http(status.as_u16()),
    }
}

/// A client for one NameNode's WebHDFS endpoint.
pub struct WebHdfs {
    http: reqwest::Client,
    base: Url,
    user: String,
}

impl WebHdfs {
    /// Resolve the NameNode HTTP address for `uri` and build the client.
    pub fn new(uri: &Url, conf: &Configuration, user: &str) -> Result<WebHdfs> {
        let scheme = if conf.https_only() || uri.scheme() == "swebhdfs" { "https" } else { "http" };
        let authority = match conf.get(keys::NAMENODE_HTTP_ADDRESS) {
            Some(address) => address.to_string(),
            None => {
                let host = uri
                    .host_str()
                    .ok_or_else(|| HdfsError::UnsupportedScheme(uri.to_string()))?;
                // webhdfs:// URIs already name the HTTP port.
                let port = match (uri.scheme(), uri.port()) {
                    ("webhdfs" | "swebhdfs", Some(port)) => port,
                    _ => defaults::NAMENODE_HTTP_PORT,
                };
                format!("{host}:{port}")
            }
        };
        let base = Url::parse(&format!("{scheme}://{authority}{WEBHDFS_PREFIX}"))?;

        // Redirects to datanodes are followed by hand so that request
        // bodies go only to the datanode.
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(WebHdfs { http, base, user: user.to_string() })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of `op` on `path`, including the user name.
    fn op_url(&self, path: &HdfsPath, op: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.base.clone();
        let full_path = if path.is_root() {
            format!("{WEBHDFS_PREFIX}/")
        } else {
            format!("{WEBHDFS_PREFIX}{path}")
        };
        url.set_path(&full_path);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            query.append_pair("user.name", &self.user);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Send a request and turn error statuses into errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }
        Err(error_from_body(status, response.text().await))
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, method: Method, url: Url) -> Result<T> {
        debug!(%method, %url, "webhdfs request");
        let response = self.send(self.http.request(method, url)).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn location(response: &Response) -> Result<Url> {
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                HdfsError::UnexpectedResponse(format!("{} without Location header", response.status()))
            })?;
        Ok(Url::parse(location)?)
    }

    /// The two-step upload: ask the NameNode where to write, then send the
    /// data to the datanode it names.
    async fn upload(&self, method: Method, url: Url, data: Bytes) -> Result<()> {
        debug!(%method, %url, bytes = data.len(), "webhdfs upload");
        let response = self.send(self.http.request(method.clone(), url)).await?;
        if !response.status().is_redirection() {
            return Err(HdfsError::UnexpectedResponse(format!(
                "expected a redirect to a datanode, got {}",
                response.status()
            )));
        }
        let datanode = WebHdfs::location(&response)?;
        debug!(%datanode, "writing to datanode");
        self.send(
            self.http
                .request(method, datanode)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(data),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FileSystem for WebHdfs {
    async fn mkdirs(&self, path: &HdfsPath, permission: FsPermission) -> Result<bool> {
        let url = self.op_url(path, "MKDIRS", &[("permission", permission.to_octal())]);
        let response: BooleanResponse = self.json(Method::PUT, url).await?;
        Ok(response.boolean)
    }

    async fn create(&self, path: &HdfsPath, data: Bytes, options: &CreateOptions) -> Result<()> {
        let url = self.op_url(
            path,
            "CREATE",
            &[
                ("overwrite", options.overwrite.to_string()),
                ("replication", options.replication.to_string()),
                ("blocksize", options.block_size.to_string()),
                ("permission", options.permission.to_octal()),
            ],
        );
        self.upload(Method::PUT, url, data).await
    }

    async fn append(&self, path: &HdfsPath, data: Bytes) -> Result<()> {
        let url = self.op_url(path, "APPEND", &[]);
        self.upload(Method::POST, url, data).await
    }

    async fn read_range(&self, path: &HdfsPath, offset: u64, length: u64) -> Result<Bytes> {
        let url = self.op_url(path, "OPEN", &[("offset", offset.to_string()), ("length", length.to_string())]);
        debug!(%url, "webhdfs open");
        let mut response = self.send(self.http.get(url)).await?;
        if response.status().is_redirection() {
            let datanode = WebHdfs::location(&response)?;
            response = self.send(self.http.get(datanode)).await?;
        }
        Ok(response.bytes().await?)
    }

    async fn rename(&self, src: &HdfsPath, dst: &HdfsPath) -> Result<bool> {
        let url = self.op_url(src, "RENAME", &[("destination", dst.to_string())]);
        let response: BooleanResponse = self.json(Method::PUT, url).await?;
        Ok(response.boolean)
    }

    async fn delete(&self, path: &HdfsPath, recursive: bool) -> Result<bool> {
        let url = self.op_url(path, "DELETE", &[("recursive", recursive.to_string())]);
        let response: BooleanResponse = self.json(Method::DELETE, url).await?;
        Ok(response.boolean)
    }

    async fn get_file_status(&self, path: &HdfsPath) -> Result<FileStatus> {
        let url = self.op_url(path, "GETFILESTATUS", &[]);
        let response: FileStatusResponse = self.json(Method::GET, url).await?;
        response.file_status.into_status(path.clone())
    }

    async fn list_status(&self, path: &HdfsPath) -> Result<Vec<FileStatus>> {
        let url = self.op_url(path, "LISTSTATUS", &[]);
        let response: ListStatusResponse = self.json(Method::GET, url).await?;
        response
            .file_statuses
            .file_status
            .into_iter()
            .map(|wire| {
                // A file lists itself with an empty suffix.
                let child = if wire.path_suffix.is_empty() {
                    path.clone()
                } else {
                    path.join(&wire.path_suffix)?
                };
                wire.into_status(child)
            })
            .collect()
    }

    async fn get_file_block_locations(
        &self,
        path: &HdfsPath,
        offset: u64,
        length: u64,
    ) -> Result<Vec<BlockLocation>> {
        let url = self.op_url(
            path,
            "GETFILEBLOCKLOCATIONS",
            &[("offset", offset.to_string()), ("length", length.to_string())],
        );
        let response: BlockLocationsResponse = self.json(Method::GET, url).await?;
        Ok(response
            .block_locations
            .block_location
            .into_iter()
            .map(|wire| BlockLocation {
                names: wire.names,
                hosts: wire.hosts,
                offset: wire.offset,
                length: wire.length,
            })
            .collect())
    }
}
