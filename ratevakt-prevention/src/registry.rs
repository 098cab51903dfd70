//! Allow/block registry storage.
//!
//! Both files hold one identifier per line. Blank lines and surrounding
//! whitespace are ignored.

use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use ipnetwork::IpNetwork;
use ratevakt_core::SourceId;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn read_ids(path: &Path) -> Result<Vec<SourceId>, io::Error> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(SourceId::from)
        .collect())
}

/// Exact identifiers plus CIDR ranges that are never counted or blocked.
#[derive(Debug, Default, Clone)]
pub struct Whitelist {
    ids: HashSet<SourceId>,
    networks: Vec<IpNetwork>,
}

impl Whitelist {
    pub fn new<I>(ids: I, networks: Vec<IpNetwork>) -> Self
    where
        I: IntoIterator<Item = SourceId>,
    {
        Self {
            ids: ids.into_iter().collect(),
            networks,
        }
    }

    /// Loads exact identifiers from `path`. A missing or unreadable file is
    /// logged and treated as empty.
    pub fn load(path: Option<&Path>, networks: Vec<IpNetwork>) -> Self {
        let ids = match path {
            Some(path) => read_ids(path).unwrap_or_else(|e| {
                warn!("Could not load whitelist {}: {e}", path.display());
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self::new(ids, networks)
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        if self.ids.contains(id) {
            return true;
        }
        if self.networks.is_empty() {
            return false;
        }
        id.ip()
            .is_some_and(|ip| self.networks.iter().any(|net| net.contains(ip)))
    }

    pub fn len(&self) -> usize {
        self.ids.len() + self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.networks.is_empty()
    }
}

/// Append-only file of blocked identifiers.
#[derive(Debug, Clone, Default)]
pub struct BlockedLog {
    path: Option<PathBuf>,
}

impl BlockedLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Keeps blocked state in memory only.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Identifiers blocked by earlier runs. A missing file means none.
    pub fn load(&self) -> Result<HashSet<SourceId>, RegistryError> {
        let Some(path) = &self.path else {
            return Ok(HashSet::new());
        };
        match read_ids(path) {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
            Err(source) => Err(RegistryError::Read {
                path: path.clone(),
                source,
            }),
        }
    }

    pub async fn append(&self, id: &SourceId) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{id}\n").as_bytes()).await?;
        file.flush().await
    }
}
