use std::fmt;

use url::Url;

use crate::error::{HdfsError, Result};

/// An absolute, normalized path inside the filesystem namespace.
///
/// Always starts with `/`, never ends with one (except the root), and
/// contains no empty, `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HdfsPath(String);

impl HdfsPath {
    pub fn root() -> HdfsPath {
        HdfsPath("/".to_string())
    }

    /// Parse and normalize an absolute path.
    pub fn parse(input: &str) -> Result<HdfsPath> {
        if !input.starts_with('/') {
            return Err(HdfsError::InvalidPath(input.to_string()));
        }

        let mut components: Vec<&str> = vec![];
        for component in input.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    if components.pop().is_none() {
                        return Err(HdfsError::InvalidPath(input.to_string()));
                    }
                }
                c if c.contains(':') => {
                    // HDFS reserves ':' in path names.
                    return Err(HdfsError::InvalidPath(input.to_string()));
                }
                c => components.push(c),
            }
        }

        Ok(HdfsPath(format!("/{}", components.join("/"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The last component, empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => "",
        }
    }

    pub fn parent(&self) -> Option<HdfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(HdfsPath::root()),
            Some(i) => Some(HdfsPath(self.0[..i].to_string())),
            None => None,
        }
    }

    /// Append a relative child (which may itself contain slashes).
    pub fn join(&self, child: &str) -> Result<HdfsPath> {
        if child.starts_with('/') {
            return Err(HdfsError::InvalidPath(child.to_string()));
        }
        HdfsPath::parse(&format!("{}/{}", self.0, child))
    }

    /// True if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &HdfsPath) -> bool {
        if other.is_root() || self == other {
            return true;
        }
        self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'/')
    }

    /// Re-root `self` from `from` onto `to`. `self` must start with `from`.
    pub fn rebase(&self, from: &HdfsPath, to: &HdfsPath) -> Option<HdfsPath> {
        if !self.starts_with(from) {
            return None;
        }
        let rest = if from.is_root() {
            &self.0[1..]
        } else {
            self.0[from.0.len()..].trim_start_matches('/')
        };
        if rest.is_empty() {
            Some(to.clone())
        } else {
            to.join(rest).ok()
        }
    }

    /// The ancestors of this path from the root down, excluding itself.
    pub fn ancestors(&self) -> Vec<HdfsPath> {
        let mut result = vec![];
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            result.push(path);
        }
        result.reverse();
        result
    }

    /// Fully qualified form, e.g. `hdfs://hadoop000:8020/hdfsapi/test`.
    pub fn qualify(&self, uri: &Url) -> String {
        match uri.host_str() {
            Some(host) => match uri.port() {
                Some(port) => format!("{}://{}:{}{}", uri.scheme(), host, port, self.0),
                None => format!("{}://{}{}", uri.scheme(), host, self.0),
            },
            None => format!("{}:{}", uri.scheme(), self.0),
        }
    }
}

impl fmt::Display for HdfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(HdfsPath::parse("/hdfsapi2/test/").unwrap().as_str(), "/hdfsapi2/test");
        assert_eq!(HdfsPath::parse("//a/./b//c").unwrap().as_str(), "/a/b/c");
        assert_eq!(HdfsPath::parse("/a/b/../c").unwrap().as_str(), "/a/c");
        assert!(HdfsPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(HdfsPath::parse("relative/path").is_err());
        assert!(HdfsPath::parse("").is_err());
        assert!(HdfsPath::parse("/..").is_err());
        assert!(HdfsPath::parse("/a:b").is_err());
    }

    #[test]
    fn test_name_and_parent() {
        let path = HdfsPath::parse("/hdfsapi/test/a.txt").unwrap();
        assert_eq!(path.name(), "a.txt");
        assert_eq!(path.parent().unwrap().as_str(), "/hdfsapi/test");
        assert_eq!(HdfsPath::parse("/a").unwrap().parent(), Some(HdfsPath::root()));
        assert_eq!(HdfsPath::root().parent(), None);
        assert_eq!(HdfsPath::root().name(), "");
    }

    #[test]
    fn test_starts_with() {
        let dir = HdfsPath::parse("/a/b").unwrap();
        assert!(HdfsPath::parse("/a/b/c").unwrap().starts_with(&dir));
        assert!(dir.starts_with(&dir));
        assert!(!HdfsPath::parse("/a/bc").unwrap().starts_with(&dir));
        assert!(dir.starts_with(&HdfsPath::root()));
    }

    #[test]
    fn test_rebase() {
        let from = HdfsPath::parse("/a/b").unwrap();
        let to = HdfsPath::parse("/x").unwrap();
        let path = HdfsPath::parse("/a/b/c/d").unwrap();
        assert_eq!(path.rebase(&from, &to).unwrap().as_str(), "/x/c/d");
        assert_eq!(from.rebase(&from, &to).unwrap(), to);
        assert!(HdfsPath::parse("/q").unwrap().rebase(&from, &to).is_none());
    }

    #[test]
    fn test_ancestors() {
        let path = HdfsPath::parse("/a/b/c").unwrap();
        let names: Vec<String> = path.ancestors().iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["/", "/a", "/a/b"]);
    }

    #[test]
    fn test_qualify() {
        let uri = Url::parse("hdfs://hadoop000:8020").unwrap();
        let path = HdfsPath::parse("/hdfsapi/test/a.txt").unwrap();
        assert_eq!(path.qualify(&uri), "hdfs://hadoop000:8020/hdfsapi/test/a.txt");
    }
}
