//! StorageUri - `scheme://bucket/path` addresses in durable object storage

use serde::{Deserialize, Serialize};

use crate::domain::errors::PipelineError;

/// Parsed object-storage address
///
/// A URI whose path is empty or ends with `/` denotes a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageUri {
    scheme: String,
    bucket: String,
    path: String,
}

impl StorageUri {
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| PipelineError::InvalidUri(raw.to_string()))?;
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(PipelineError::InvalidUri(raw.to_string()));
        }
        if bucket.is_empty() || path.split('/').any(|segment| segment == "..") {
            return Err(PipelineError::InvalidUri(raw.to_string()));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object path inside the bucket (no leading slash)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_prefix(&self) -> bool {
        self.path.is_empty() || self.path.ends_with('/')
    }

    /// Append a relative path. `a/` joined with `b/c` gives `a/b/c`.
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_start_matches('/');
        let path = if self.path.is_empty() {
            relative.to_string()
        } else if self.path.ends_with('/') {
            format!("{}{}", self.path, relative)
        } else {
            format!("{}/{}", self.path, relative)
        };
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            path,
        }
    }

    /// Same location, guaranteed to end with `/`
    pub fn as_prefix(&self) -> Self {
        if self.is_prefix() {
            return self.clone();
        }
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            path: format!("{}/", self.path),
        }
    }

    /// Last path segment (empty for prefixes)
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Enclosing prefix: `a/b/c.jsonl` and `a/b/c/` both give `a/b/`
    pub fn parent(&self) -> Self {
        let trimmed = self.path.trim_end_matches('/');
        let path = match trimmed.rfind('/') {
            Some(i) => trimmed[..=i].to_string(),
            None => String::new(),
        };
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            path,
        }
    }

    /// Whether `other` lives under this prefix
    pub fn contains(&self, other: &StorageUri) -> bool {
        self.scheme == other.scheme
            && self.bucket == other.bucket
            && other.path.starts_with(self.as_prefix().path.as_str())
    }
}

impl std::fmt::Display for StorageUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.path)
    }
}

impl std::str::FromStr for StorageUri {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StorageUri {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageUri> for String {
    fn from(uri: StorageUri) -> Self {
        uri.to_string()
    }
}
