use crate::domain::model::{Trait, TraitLevel, TraitType};
use crate::domain::raw::{parse_u32_field, RawTraitRecord};
use crate::utils::error::Result;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TraitGrouping {
    /// Sorted by id; each trait's levels sorted by level.
    pub traits: Vec<Trait>,
    pub processed: usize,
    pub skipped: usize,
    /// Records whose identity fields disagreed with the first record of
    /// their group, plus repeated (id, level) pairs.
    pub conflicts: usize,
}

struct ParsedTraitRecord {
    id: u32,
    kind: TraitType,
    level: TraitLevel,
}

fn parse_record(record: &RawTraitRecord, index: usize) -> Result<ParsedTraitRecord> {
    let label = format!("trait record #{}", index);
    let id = parse_u32_field(&record.check_id, &label, "checkId")?;
    let label = format!("trait {} (record #{})", id, index);
    let flag = parse_u32_field(&record.kind, &label, "type")?;
    let level = parse_u32_field(&record.level, &label, "level")?;
    let need_number = parse_u32_field(&record.num, &label, "num")?;

    Ok(ParsedTraitRecord {
        id,
        kind: TraitType::from_flag(flag),
        level: TraitLevel {
            level,
            need_number,
            description: record.real_desc.clone().unwrap_or_default(),
        },
    })
}

/// 依 checkId 將每個等級一筆的原始記錄合併為 Trait
///
/// The first record seen for an id is authoritative for name, description
/// and kind. Later records with different identity fields still contribute
/// their level and are logged as conflicts. A repeated level keeps the row
/// with the lowest `num`. Malformed records are skipped.
pub fn group_traits(records: &[RawTraitRecord]) -> TraitGrouping {
    let mut groups: BTreeMap<u32, Trait> = BTreeMap::new();
    let mut grouping = TraitGrouping::default();

    for (index, record) in records.iter().enumerate() {
        let parsed = match parse_record(record, index) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("⚠️  {}", e);
                grouping.skipped += 1;
                continue;
            }
        };
        grouping.processed += 1;

        let name = record.name.clone().unwrap_or_default();
        let description = record.prefix.clone().unwrap_or_default();

        let group = groups.entry(parsed.id).or_insert_with(|| Trait {
            id: parsed.id,
            kind: parsed.kind,
            name: name.clone(),
            cn_name: name.clone(),
            description: description.clone(),
            levels: Vec::new(),
        });

        if group.kind != parsed.kind || group.name != name || group.description != description {
            tracing::warn!(
                "⚠️  Trait {} record #{} disagrees with the first record ('{}' {}), keeping the first",
                parsed.id,
                index,
                group.name,
                group.kind
            );
            grouping.conflicts += 1;
        }

        if let Some(existing) = group
            .levels
            .iter_mut()
            .find(|l| l.level == parsed.level.level)
        {
            tracing::warn!(
                "⚠️  Trait {} has a repeated level {}, keeping the lowest num",
                parsed.id,
                parsed.level.level
            );
            grouping.conflicts += 1;
            // 取 (num, 描述) 最小者，結果與記錄順序無關
            if (parsed.level.need_number, &parsed.level.description)
                < (existing.need_number, &existing.description)
            {
                *existing = parsed.level;
            }
            continue;
        }

        group.levels.push(parsed.level);
    }

    grouping.traits = groups
        .into_values()
        .map(|mut t| {
            t.levels.sort_by_key(|l| l.level);
            t
        })
        .collect();

    grouping
}
