use crate::domain::model::{PendingUnit, Skill, Trait, Unit};
use crate::domain::raw::{parse_u32_field, RawUnitRecord};
use crate::utils::error::Result;
use std::collections::{BTreeMap, HashSet};

pub const NO_REFERENCE: &str = "-1";
pub const REFERENCE_DELIMITER: char = '|';

#[derive(Debug, Clone, Default)]
pub struct UnitResolution {
    /// In the order the records appeared in the export.
    pub units: Vec<PendingUnit>,
    pub seen: usize,
    pub skipped_invalid: usize,
    pub skipped_placeholder: usize,
}

pub struct UnitResolver<'a> {
    index: BTreeMap<u32, &'a Trait>,
    placeholder_markers: &'a [String],
}

/// 拆出 `species` / `class` 欄位裡的羈絆 id，`-1` 與空字串代表沒有
pub fn parse_trait_refs(field: Option<&str>) -> Vec<&str> {
    match field.map(str::trim) {
        None | Some("") | Some(NO_REFERENCE) => Vec::new(),
        Some(value) => value
            .split(REFERENCE_DELIMITER)
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != NO_REFERENCE)
            .collect(),
    }
}

/// Removes repeated references while keeping first-seen order.
pub fn dedup_preserving_order<'s>(refs: impl IntoIterator<Item = &'s str>) -> Vec<&'s str> {
    let mut seen = HashSet::new();
    refs.into_iter().filter(|r| seen.insert(*r)).collect()
}

impl<'a> UnitResolver<'a> {
    pub fn new(traits: &'a [Trait], placeholder_markers: &'a [String]) -> Self {
        Self {
            index: traits.iter().map(|t| (t.id, t)).collect(),
            placeholder_markers,
        }
    }

    fn is_placeholder(&self, cost: u32, name: &str) -> bool {
        cost == 0
            && self
                .placeholder_markers
                .iter()
                .any(|marker| !marker.is_empty() && name.contains(marker.as_str()))
    }

    fn resolve_traits(&self, record: &RawUnitRecord) -> Vec<Trait> {
        let refs = parse_trait_refs(record.species.as_deref())
            .into_iter()
            .chain(parse_trait_refs(record.class.as_deref()));

        dedup_preserving_order(refs)
            .into_iter()
            .filter_map(|r| {
                let found = r.parse::<u32>().ok().and_then(|id| self.index.get(&id));
                if found.is_none() {
                    tracing::debug!("Dropping unresolved trait reference '{}'", r);
                }
                found.map(|t| (*t).clone())
            })
            .collect()
    }

    fn resolve_record(&self, record: &RawUnitRecord, index: usize) -> Result<(u32, u32)> {
        let label = format!("unit record #{}", index);
        let id = parse_u32_field(&record.id, &label, "id")?;
        let label = format!("unit {} (record #{})", id, index);
        let cost = parse_u32_field(&record.price, &label, "price")?;
        Ok((id, cost))
    }

    pub fn resolve(&self, records: &[RawUnitRecord]) -> UnitResolution {
        let mut resolution = UnitResolution {
            seen: records.len(),
            ..Default::default()
        };
        let mut seen_ids = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let (id, cost) = match self.resolve_record(record, index) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("⚠️  {}", e);
                    resolution.skipped_invalid += 1;
                    continue;
                }
            };

            let name = record.name.clone().unwrap_or_default();

            // 跳過測試用的木樁假人
            if self.is_placeholder(cost, &name) {
                tracing::debug!("Skipping placeholder unit {} '{}'", id, name);
                resolution.skipped_placeholder += 1;
                continue;
            }

            if !seen_ids.insert(id) {
                tracing::warn!("⚠️  Unit {} appears more than once, keeping the first record", id);
                resolution.skipped_invalid += 1;
                continue;
            }

            resolution.units.push(PendingUnit {
                unit: Unit {
                    id,
                    name,
                    cost,
                    image: String::new(),
                    traits: self.resolve_traits(record),
                    skill: Skill {
                        name: record.skill_name.clone().unwrap_or_default(),
                        description: record.skill_desc.clone().unwrap_or_default(),
                    },
                },
                art_key: record
                    .hero_art
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            });
        }

        resolution
    }
}
