//! Raw export records as they appear in the game-data dumps.
//!
//! Numeric fields are kept as [`serde_json::Value`] because the exports mix
//! JSON numbers and numeric strings; they are parsed by the stage that
//! consumes them so a bad value only costs that one record.

use crate::utils::error::{EtlError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTraitRecord {
    #[serde(rename = "checkId", default)]
    pub check_id: Value,
    #[serde(rename = "type", default)]
    pub kind: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub level: Value,
    #[serde(default)]
    pub num: Value,
    #[serde(rename = "realDesc", default)]
    pub real_desc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUnitRecord {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Value,
    #[serde(rename = "hero_EN", alias = "heroArt", default)]
    pub hero_art: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(rename = "skillName", default)]
    pub skill_name: Option<String>,
    #[serde(rename = "skillDesc", default)]
    pub skill_desc: Option<String>,
}

/// Records decoded from one export file; `malformed` counts entries that
/// were not objects of the expected shape.
#[derive(Debug, Clone, Default)]
pub struct RawBatch<T> {
    pub records: Vec<T>,
    pub malformed: usize,
}

/// 解析匯出檔：頂層物件，或 `{ "data": {...} }` 包裝
pub fn decode_export<T>(bytes: &[u8], path: &Path) -> Result<RawBatch<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let root: Value = serde_json::from_slice(bytes).map_err(|e| EtlError::MalformedInput {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let entries = match root {
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                // "data" 不是物件時當作一般記錄處理
                obj.insert("data".to_string(), other);
                obj
            }
            None => obj,
        },
        _ => {
            return Err(EtlError::MalformedInput {
                path: path.to_path_buf(),
                message: "expected a JSON object at the top level".to_string(),
            })
        }
    };

    let mut batch = RawBatch {
        records: Vec::with_capacity(entries.len()),
        malformed: 0,
    };

    for (key, value) in entries {
        match serde_json::from_value::<T>(value) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!("⚠️  Skipping malformed entry '{}' in {}: {}", key, path.display(), e);
                batch.malformed += 1;
            }
        }
    }

    Ok(batch)
}

/// Parses an integer field that may be a JSON number or a numeric string.
pub fn parse_u32_field(value: &Value, record: &str, field: &str) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| EtlError::ParseError {
        record: record.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    })
}
