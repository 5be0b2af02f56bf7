//! `--mount [PREFIX=]KIND:SOURCE` arguments.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use assetfs_vfs::MountTable;

/// Source kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Path,
    Archive,
    Url,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "path" => Ok(SourceKind::Path),
            "archive" => Ok(SourceKind::Archive),
            "url" => Ok(SourceKind::Url),
            other => bail!("unknown mount kind {other:?} (expected path, archive or url)"),
        }
    }
}

/// One parsed `--mount` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountArg {
    pub prefix: Option<String>,
    pub kind: SourceKind,
    pub source: String,
}

impl FromStr for MountArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let colon = s
            .find(':')
            .with_context(|| format!("{s:?} is not of the form [PREFIX=]KIND:SOURCE"))?;
        let (head, source) = (&s[..colon], &s[colon + 1..]);
        let (prefix, kind) = match head.split_once('=') {
            Some((prefix, kind)) => (Some(prefix.to_string()).filter(|p| !p.is_empty()), kind),
            None => (None, head),
        };
        if source.is_empty() {
            bail!("{s:?} has no source");
        }
        Ok(Self {
            prefix,
            kind: kind.parse()?,
            source: source.to_string(),
        })
    }
}

impl fmt::Display for MountArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SourceKind::Path => "path",
            SourceKind::Archive => "archive",
            SourceKind::Url => "url",
        };
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}={kind}:{}", self.source),
            None => write!(f, "{kind}:{}", self.source),
        }
    }
}

impl MountArg {
    /// Register this source on `table`.
    pub fn mount(&self, table: &MountTable) -> Result<()> {
        let prefix = self.prefix.as_deref();
        match self.kind {
            SourceKind::Path => table.add_path(prefix, &self.source),
            SourceKind::Archive => table.add_archive(prefix, &self.source)?,
            SourceKind::Url => table.add_http(prefix, &self.source)?,
        }
        Ok(())
    }
}
