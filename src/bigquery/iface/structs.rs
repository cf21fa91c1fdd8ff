use super::adapters::TableAdapter;
use super::Table;
use crate::bigquery;
use crate::utils::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

pub(super) fn unwrap_table(table: &Arc<dyn Table>) -> Result<Arc<bigquery::Table>> {
    table.as_adapted().cloned().ok_or(Error::AdapterMismatch {
        expected: "bigquery::Table",
    })
}

fn unwrap_optional(table: &Option<Arc<dyn Table>>) -> Result<Option<Arc<bigquery::Table>>> {
    table.as_ref().map(unwrap_table).transpose()
}

pub(super) fn wrap_table(table: Arc<bigquery::Table>) -> Arc<dyn Table> {
    Arc::new(TableAdapter(table))
}

fn table_name(table: &Option<Arc<dyn Table>>) -> Option<String> {
    table.as_ref().map(|t| t.fully_qualified_name())
}

/// [`bigquery::AccessEntry`] with the authorized view as a [`Table`].
#[derive(Clone, Default)]
pub struct AccessEntry {
    pub base: bigquery::AccessEntry,
    pub view: Option<Arc<dyn Table>>,
}

impl AccessEntry {
    pub fn to_concrete(&self) -> Result<bigquery::AccessEntry> {
        Ok(bigquery::AccessEntry {
            view: unwrap_optional(&self.view)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(entry: &bigquery::AccessEntry) -> Self {
        Self {
            base: bigquery::AccessEntry {
                view: None,
                ..entry.clone()
            },
            view: entry.view.clone().map(wrap_table),
        }
    }
}

impl fmt::Debug for AccessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEntry")
            .field("base", &self.base)
            .field("view", &table_name(&self.view))
            .finish()
    }
}

fn entries_to_concrete(entries: &[AccessEntry]) -> Result<Vec<bigquery::AccessEntry>> {
    entries.iter().map(AccessEntry::to_concrete).collect()
}

fn entries_from_concrete(entries: &[bigquery::AccessEntry]) -> Vec<AccessEntry> {
    entries.iter().map(AccessEntry::from_concrete).collect()
}

/// [`bigquery::DatasetMetadata`] whose access list holds shadowed entries.
#[derive(Debug, Clone, Default)]
pub struct DatasetMetadata {
    pub base: bigquery::DatasetMetadata,
    pub access: Vec<AccessEntry>,
}

impl DatasetMetadata {
    pub fn to_concrete(&self) -> Result<bigquery::DatasetMetadata> {
        Ok(bigquery::DatasetMetadata {
            access: entries_to_concrete(&self.access)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(md: &bigquery::DatasetMetadata) -> Self {
        Self {
            base: bigquery::DatasetMetadata {
                access: Vec::new(),
                ..md.clone()
            },
            access: entries_from_concrete(&md.access),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetMetadataToUpdate {
    pub base: bigquery::DatasetMetadataToUpdate,
    /// `None` leaves the access list unchanged.
    pub access: Option<Vec<AccessEntry>>,
}

impl DatasetMetadataToUpdate {
    pub fn to_concrete(&self) -> Result<bigquery::DatasetMetadataToUpdate> {
        Ok(bigquery::DatasetMetadataToUpdate {
            access: self.access.as_deref().map(entries_to_concrete).transpose()?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(update: &bigquery::DatasetMetadataToUpdate) -> Self {
        Self {
            base: bigquery::DatasetMetadataToUpdate {
                access: None,
                ..update.clone()
            },
            access: update.access.as_deref().map(entries_from_concrete),
        }
    }
}

#[derive(Clone, Default)]
pub struct CopyConfig {
    pub base: bigquery::CopyConfig,
    pub srcs: Vec<Arc<dyn Table>>,
    pub dst: Option<Arc<dyn Table>>,
}

impl CopyConfig {
    pub fn to_concrete(&self) -> Result<bigquery::CopyConfig> {
        Ok(bigquery::CopyConfig {
            srcs: self.srcs.iter().map(unwrap_table).collect::<Result<_>>()?,
            dst: unwrap_optional(&self.dst)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(config: &bigquery::CopyConfig) -> Self {
        Self {
            base: bigquery::CopyConfig {
                srcs: Vec::new(),
                dst: None,
                ..config.clone()
            },
            srcs: config.srcs.iter().cloned().map(wrap_table).collect(),
            dst: config.dst.clone().map(wrap_table),
        }
    }
}

impl fmt::Debug for CopyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyConfig")
            .field("base", &self.base)
            .field(
                "srcs",
                &self.srcs.iter().map(|t| t.fully_qualified_name()).collect::<Vec<_>>(),
            )
            .field("dst", &table_name(&self.dst))
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ExtractConfig {
    pub base: bigquery::ExtractConfig,
    pub src: Option<Arc<dyn Table>>,
}

impl ExtractConfig {
    pub fn to_concrete(&self) -> Result<bigquery::ExtractConfig> {
        Ok(bigquery::ExtractConfig {
            src: unwrap_optional(&self.src)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(config: &bigquery::ExtractConfig) -> Self {
        Self {
            base: bigquery::ExtractConfig {
                src: None,
                ..config.clone()
            },
            src: config.src.clone().map(wrap_table),
        }
    }
}

impl fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("base", &self.base)
            .field("src", &table_name(&self.src))
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct LoadConfig {
    pub base: bigquery::LoadConfig,
    pub dst: Option<Arc<dyn Table>>,
}

impl LoadConfig {
    pub fn to_concrete(&self) -> Result<bigquery::LoadConfig> {
        Ok(bigquery::LoadConfig {
            dst: unwrap_optional(&self.dst)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(config: &bigquery::LoadConfig) -> Self {
        Self {
            base: bigquery::LoadConfig {
                dst: None,
                ..config.clone()
            },
            dst: config.dst.clone().map(wrap_table),
        }
    }
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("base", &self.base)
            .field("dst", &table_name(&self.dst))
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct QueryConfig {
    pub base: bigquery::QueryConfig,
    pub dst: Option<Arc<dyn Table>>,
}

impl QueryConfig {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            base: bigquery::QueryConfig {
                q: q.into(),
                ..bigquery::QueryConfig::default()
            },
            dst: None,
        }
    }

    pub fn to_concrete(&self) -> Result<bigquery::QueryConfig> {
        Ok(bigquery::QueryConfig {
            dst: unwrap_optional(&self.dst)?,
            ..self.base.clone()
        })
    }

    pub fn from_concrete(config: &bigquery::QueryConfig) -> Self {
        Self {
            base: bigquery::QueryConfig {
                dst: None,
                ..config.clone()
            },
            dst: config.dst.clone().map(wrap_table),
        }
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("base", &self.base)
            .field("dst", &table_name(&self.dst))
            .finish()
    }
}
