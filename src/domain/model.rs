use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraitType {
    Origin,
    Class,
}

impl TraitType {
    /// 原始資料的種類旗標：0 為起源 (ORIGIN)，其餘一律視為職業 (CLASS)
    pub fn from_flag(flag: u32) -> Self {
        if flag == 0 {
            TraitType::Origin
        } else {
            TraitType::Class
        }
    }
}

impl fmt::Display for TraitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitType::Origin => write!(f, "ORIGIN"),
            TraitType::Class => write!(f, "CLASS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitLevel {
    pub level: u32,
    pub need_number: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trait {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: TraitType,
    pub name: String,
    pub cn_name: String,
    pub description: String,
    pub levels: Vec<TraitLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub name: String,
    pub cost: u32,
    pub image: String,
    pub traits: Vec<Trait>,
    pub skill: Skill,
}

/// A resolved unit that still waits for its image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUnit {
    pub unit: Unit,
    pub art_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub success: bool,
    pub bytes_written: u64,
    pub local_path: PathBuf,
    pub cached: bool,
}

impl DownloadOutcome {
    pub fn fetched(local_path: PathBuf, bytes_written: u64) -> Self {
        Self {
            success: true,
            bytes_written,
            local_path,
            cached: false,
        }
    }

    pub fn cached(local_path: PathBuf) -> Self {
        Self {
            success: true,
            bytes_written: 0,
            local_path,
            cached: true,
        }
    }
}

/// 下載階段的彙總：成功的 unit 與各種計數
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub units: Vec<Unit>,
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PersistedCatalog {
    pub traits_path: PathBuf,
    pub catalog_path: PathBuf,
    pub traits_bytes: usize,
    pub catalog_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub trait_records_processed: usize,
    pub trait_records_skipped: usize,
    pub trait_conflicts: usize,
    pub traits: usize,
    pub origins: usize,
    pub classes: usize,
    pub unit_records_seen: usize,
    pub units_skipped_invalid: usize,
    pub units_skipped_placeholder: usize,
    pub units_resolved: usize,
    pub downloads_fetched: usize,
    pub downloads_cached: usize,
    pub downloads_failed: usize,
    pub units_published: usize,
    pub persisted: Option<PersistedCatalog>,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            "📊 Traits: {} records -> {} traits (ORIGIN {}, CLASS {}), {} skipped, {} identity conflicts",
            self.trait_records_processed,
            self.traits,
            self.origins,
            self.classes,
            self.trait_records_skipped,
            self.trait_conflicts
        );
        tracing::info!(
            "📊 Units: {} seen, {} resolved, {} invalid, {} placeholder",
            self.unit_records_seen,
            self.units_resolved,
            self.units_skipped_invalid,
            self.units_skipped_placeholder
        );
        tracing::info!(
            "📊 Images: {} fetched, {} cached, {} failed -> {} units published",
            self.downloads_fetched,
            self.downloads_cached,
            self.downloads_failed,
            self.units_published
        );
        if let Some(persisted) = &self.persisted {
            tracing::info!(
                "📝 {} ({:.2} KB), {} ({:.2} KB)",
                persisted.traits_path.display(),
                persisted.traits_bytes as f64 / 1024.0,
                persisted.catalog_path.display(),
                persisted.catalog_bytes as f64 / 1024.0
            );
        }
    }
}
