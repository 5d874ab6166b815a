use crate::core::trait_grouper::group_traits;
use crate::core::unit_resolver::UnitResolver;
use crate::core::Pipeline;
use crate::domain::model::{PendingUnit, RunSummary, Trait, TraitType, Unit};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    LoadTraits,
    GroupTraits,
    LoadUnits,
    ResolveUnits,
    DownloadAssets,
    MergeSort,
    Persist,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "IDLE",
            PipelineStage::LoadTraits => "LOAD_TRAITS",
            PipelineStage::GroupTraits => "GROUP_TRAITS",
            PipelineStage::LoadUnits => "LOAD_UNITS",
            PipelineStage::ResolveUnits => "RESOLVE_UNITS",
            PipelineStage::DownloadAssets => "DOWNLOAD_ASSETS",
            PipelineStage::MergeSort => "MERGE_SORT",
            PipelineStage::Persist => "PERSIST",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Output of the pure stages, used by dry runs.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub traits: Vec<Trait>,
    pub pending: Vec<PendingUnit>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpotChecks {
    pub trait_id: Option<u32>,
    pub unit_id: Option<u32>,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
    run_timeout: Option<Duration>,
    spot_checks: SpotChecks,
    stage: Mutex<PipelineStage>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
            run_timeout: None,
            spot_checks: SpotChecks::default(),
            stage: Mutex::new(PipelineStage::Idle),
        }
    }

    /// 整個執行的期限；逾時會放棄進行中的下載且不寫出 catalog
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.run_timeout = Some(limit);
        self
    }

    pub fn with_spot_checks(mut self, spot_checks: SpotChecks) -> Self {
        self.spot_checks = spot_checks;
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, stage: PipelineStage) {
        let previous = {
            let mut current = self.stage.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *current, stage)
        };
        if previous != PipelineStage::Idle && previous != PipelineStage::Failed {
            self.monitor.log_stage(previous);
        }
        tracing::debug!("Stage {} -> {}", previous, stage);
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting catalog build");

        let result = match self.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run_stages()).await {
                Ok(result) => result,
                Err(_) => Err(EtlError::Timeout {
                    stage: self.stage(),
                    limit,
                }),
            },
            None => self.run_stages().await,
        };

        match &result {
            Ok(summary) => {
                self.enter(PipelineStage::Done);
                summary.log();
                self.monitor.log_final_stats();
                tracing::info!("🎉 Catalog build finished in {:?}", self.monitor.elapsed());
            }
            Err(e) => {
                tracing::error!("❌ Catalog build failed during {}: {}", self.stage(), e);
                self.enter(PipelineStage::Failed);
            }
        }

        result
    }

    /// Runs the load, group and resolve stages only. Nothing is fetched or written.
    pub async fn plan(&self) -> Result<RunPlan> {
        let result = self.prepare().await;
        if let Err(e) = &result {
            tracing::error!("❌ Planning failed during {}: {}", self.stage(), e);
            self.enter(PipelineStage::Failed);
        }
        result
    }

    async fn prepare(&self) -> Result<RunPlan> {
        let mut summary = RunSummary::default();

        self.enter(PipelineStage::LoadTraits);
        let raw_traits = self.pipeline.load_traits().await?;
        tracing::info!("📖 Loaded {} raw trait records", raw_traits.records.len());

        self.enter(PipelineStage::GroupTraits);
        let grouping = group_traits(&raw_traits.records);
        summary.trait_records_processed = grouping.processed;
        summary.trait_records_skipped = grouping.skipped + raw_traits.malformed;
        summary.trait_conflicts = grouping.conflicts;
        summary.traits = grouping.traits.len();
        summary.origins = count_kind(&grouping.traits, TraitType::Origin);
        summary.classes = count_kind(&grouping.traits, TraitType::Class);
        tracing::info!(
            "📦 Grouped {} records into {} traits",
            grouping.processed,
            grouping.traits.len()
        );

        self.enter(PipelineStage::LoadUnits);
        let raw_units = self.pipeline.load_units().await?;
        tracing::info!("📖 Loaded {} raw unit records", raw_units.records.len());

        self.enter(PipelineStage::ResolveUnits);
        let resolution = UnitResolver::new(&grouping.traits, self.pipeline.placeholder_markers())
            .resolve(&raw_units.records);
        summary.unit_records_seen = resolution.seen + raw_units.malformed;
        summary.units_skipped_invalid = resolution.skipped_invalid + raw_units.malformed;
        summary.units_skipped_placeholder = resolution.skipped_placeholder;
        summary.units_resolved = resolution.units.len();
        tracing::info!(
            "✅ Resolved {} units ({} skipped as placeholders)",
            resolution.units.len(),
            resolution.skipped_placeholder
        );

        Ok(RunPlan {
            traits: grouping.traits,
            pending: resolution.units,
            summary,
        })
    }

    async fn run_stages(&self) -> Result<RunSummary> {
        let RunPlan {
            traits,
            pending,
            mut summary,
        } = self.prepare().await?;

        self.enter(PipelineStage::DownloadAssets);
        let report = self.pipeline.download_assets(pending).await?;
        summary.downloads_fetched = report.fetched;
        summary.downloads_cached = report.cached;
        summary.downloads_failed = report.failed;

        self.enter(PipelineStage::MergeSort);
        let units = merge_sort(report.units);
        summary.units_published = units.len();
        self.spot_check(&traits, &units);

        self.enter(PipelineStage::Persist);
        summary.persisted = Some(self.pipeline.persist(&traits, &units).await?);

        Ok(summary)
    }

    fn spot_check(&self, traits: &[Trait], units: &[Unit]) {
        if let Some(id) = self.spot_checks.trait_id {
            match traits.binary_search_by_key(&id, |t| t.id) {
                Ok(idx) => {
                    let t = &traits[idx];
                    tracing::info!(
                        "🔍 Trait {} '{}' ({}), {} levels",
                        t.id,
                        t.name,
                        t.kind,
                        t.levels.len()
                    );
                    for level in &t.levels {
                        let preview: String = level.description.chars().take(40).collect();
                        tracing::info!(
                            "   * Level {}: needs {} - {}",
                            level.level,
                            level.need_number,
                            preview
                        );
                    }
                }
                Err(_) => tracing::warn!("⚠️  Spot-check trait {} not found", id),
            }
        }

        if let Some(id) = self.spot_checks.unit_id {
            match units.binary_search_by_key(&id, |u| u.id) {
                Ok(idx) => {
                    let u = &units[idx];
                    tracing::info!(
                        "🔍 Unit {} '{}', cost {}, {} traits, image {}",
                        u.id,
                        u.name,
                        u.cost,
                        u.traits.len(),
                        u.image
                    );
                    for t in &u.traits {
                        tracing::info!("   * {} ({})", t.name, t.kind);
                    }
                }
                Err(_) => tracing::warn!("⚠️  Spot-check unit {} not found in catalog", id),
            }
        }
    }
}

fn count_kind(traits: &[Trait], kind: TraitType) -> usize {
    traits.iter().filter(|t| t.kind == kind).count()
}

/// 只保留有圖片的 unit，依 id 排序
pub fn merge_sort(mut units: Vec<Unit>) -> Vec<Unit> {
    units.retain(|u| !u.image.is_empty());
    units.sort_by_key(|u| u.id);
    units.dedup_by_key(|u| u.id);
    units
}
