//! Record normalization.
//!
//! Turns one raw row (a map of field name to JSON scalar) into a
//! [`SourceRecord`]. Bad field values degrade to absent and are reported;
//! only structurally unreadable rows are rejected.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::ValidationError;
use crate::geo::GeoPoint;
use crate::parcel::{Bin, ParcelId};
use crate::record::SourceRecord;
use crate::report::{DegradeReason, FieldDegradation, Rejection};
use crate::source::{SourceName, SourceRecordId};

/// Upper bound for any text field.
pub const MAX_TEXT_LEN: usize = 4 * 1024;

/// Plausible storey counts, inclusive.
pub const FLOOR_RANGE: (u32, u32) = (1, 180);

const SOURCE_ID: &[&str] = &["source_id", "id"];
const PARCEL_ID: &[&str] = &["parcel_id", "bbl", "BBL"];
const BIN: &[&str] = &["bin", "BIN"];
const LATITUDE: &[&str] = &["latitude", "lat"];
const LONGITUDE: &[&str] = &["longitude", "lng", "lon"];
const GEOMETRY: &[&str] = &["geom", "geometry"];
const YEAR_BUILT: &[&str] = &["year_built", "build_year"];
const NAME: &[&str] = &["name", "building_name", "build_nme"];
const ADDRESS: &[&str] = &["address", "des_addres"];
const ARCHITECT: &[&str] = &["architect", "arch_build"];
const STYLE: &[&str] = &["style", "style_prim"];
const HEIGHT: &[&str] = &["height", "height_arch"];
const FLOOR_COUNT: &[&str] = &["floor_count", "num_floors", "numfloors", "NumFloors"];

fn point_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*POINT\s*\(\s*(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*\)\s*$").expect("static regex")
    })
}

fn circa_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:c\.?|ca\.?|circa)\s*(\d{4})$").expect("static regex"))
}

/// One input record set: rows from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Source every row is attributed to.
    pub source_name: SourceName,
    /// Raw rows, each expected to be a JSON object.
    pub rows: Vec<Value>,
}

impl RecordSet {
    /// Creates a record set.
    #[must_use]
    pub fn new(source_name: impl Into<SourceName>, rows: Vec<Value>) -> Self {
        Self {
            source_name: source_name.into(),
            rows,
        }
    }
}

/// A successfully normalized row.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The normalized record.
    pub record: SourceRecord,
    /// Fields that were dropped while normalizing it.
    pub degradations: Vec<FieldDegradation>,
}

/// Output of normalizing a whole record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSet {
    /// Rows that normalized, in input order.
    pub records: Vec<SourceRecord>,
    /// Rows excluded as unreadable.
    pub rejections: Vec<Rejection>,
    /// Field degradations across all kept rows.
    pub degradations: Vec<FieldDegradation>,
}

/// Raw-row normalizer bound to a configuration.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    config: &'a RegistryConfig,
}

/// Per-row state: the row being read and the degradations found so far.
struct RowReader<'r> {
    fields: &'r Map<String, Value>,
    id: SourceRecordId,
    degradations: Vec<FieldDegradation>,
}

impl<'r> RowReader<'r> {
    fn lookup(&self, aliases: &[&str]) -> Option<&'r Value> {
        aliases
            .iter()
            .filter_map(|a| self.fields.get(*a))
            .find(|v| !v.is_null())
    }

    fn degrade(&mut self, field: &str, raw: &str, reason: DegradeReason) {
        debug!(record = %self.id, field, raw, %reason, "field degraded to absent");
        self.degradations.push(FieldDegradation {
            record: self.id.clone(),
            field: field.to_string(),
            raw: raw.to_string(),
            reason,
        });
    }

    /// Reads a field as trimmed text. Empty text is absent.
    fn text(&self, field: &str, aliases: &[&str]) -> Result<Option<String>, ValidationError> {
        match self.lookup(aliases) {
            None => Ok(None),
            Some(v) => scalar_text(field, v),
        }
    }

    /// Reads a free-text attribute, degrading placeholders and oversized values.
    fn attribute_text(
        &mut self,
        config: &RegistryConfig,
        field: &str,
        aliases: &[&str],
    ) -> Result<Option<String>, ValidationError> {
        let Some(text) = self.text(field, aliases)? else {
            return Ok(None);
        };
        if config.is_placeholder_text(&text) {
            self.degrade(field, &text, DegradeReason::Placeholder);
            return Ok(None);
        }
        if text.len() > MAX_TEXT_LEN {
            let head: String = text.chars().take(64).collect();
            self.degrade(field, &head, DegradeReason::Malformed);
            return Ok(None);
        }
        Ok(Some(text))
    }

    /// Reads a numeric field, degrading text that is not a finite number.
    fn number(&mut self, field: &str, aliases: &[&str]) -> Result<Option<(f64, String)>, ValidationError> {
        let Some(text) = self.text(field, aliases)? else {
            return Ok(None);
        };
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some((n, text))),
            _ => {
                self.degrade(field, &text, DegradeReason::Malformed);
                Ok(None)
            }
        }
    }
}

/// Renders a JSON scalar as trimmed text.
fn scalar_text(field: &str, value: &Value) -> Result<Option<String>, ValidationError> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(ValidationError::UnreadableField {
                field: field.to_string(),
                reason: "expected a scalar value".to_string(),
            })
        }
    };
    Ok(if text.is_empty() { None } else { Some(text) })
}

#[allow(clippy::cast_possible_truncation)]
fn as_integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() < 1e15).then_some(n as i64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<'a> Normalizer<'a> {
    /// Creates a normalizer for the given configuration.
    #[must_use]
    pub const fn new(config: &'a RegistryConfig) -> Self {
        Self { config }
    }

    /// Normalizes one raw row from the named source.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the row is structurally unreadable: not a
    /// field map, missing its identifier, or holding a non-scalar value.
    pub fn normalize(&self, source_name: &SourceName, raw: &Value) -> Result<Normalized, ValidationError> {
        let fields = raw.as_object().ok_or_else(|| ValidationError::NotAnObject {
            found: json_kind(raw).to_string(),
        })?;

        let source_id = SOURCE_ID
            .iter()
            .filter_map(|a| fields.get(*a))
            .find(|v| !v.is_null())
            .map(|v| scalar_text("source_id", v))
            .transpose()?
            .flatten()
            .ok_or_else(|| ValidationError::MissingField {
                field: "source_id".to_string(),
            })?;
        if source_id.len() > MAX_TEXT_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "source_id".to_string(),
                max_length: MAX_TEXT_LEN,
            });
        }

        let id = SourceRecordId::new(source_name.clone(), source_id);
        let priority = self.config.priorities.rank(source_name);
        let mut row = RowReader {
            fields,
            id: id.clone(),
            degradations: Vec::new(),
        };

        let mut record = SourceRecord::new(id, priority);
        record.parcel_id = self.parcel_id(&mut row)?;
        record.bin = self.bin(&mut row)?;
        record.location = self.location(&mut row)?;
        record.year_built = self.year_built(&mut row)?;
        record.name = row.attribute_text(self.config, "name", NAME)?;
        record.address = row.attribute_text(self.config, "address", ADDRESS)?;
        record.architect = row.attribute_text(self.config, "architect", ARCHITECT)?;
        record.style = row.attribute_text(self.config, "style", STYLE)?;
        record.height = self.height(&mut row)?;
        record.floor_count = self.floor_count(&mut row)?;

        Ok(Normalized {
            record,
            degradations: row.degradations,
        })
    }

    /// Normalizes every row of a record set, collecting rejections.
    #[must_use]
    pub fn normalize_set(&self, set: &RecordSet) -> NormalizedSet {
        let mut out = NormalizedSet::default();
        for (row, raw) in set.rows.iter().enumerate() {
            match self.normalize(&set.source_name, raw) {
                Ok(normalized) => {
                    out.records.push(normalized.record);
                    out.degradations.extend(normalized.degradations);
                }
                Err(err) => {
                    let source_id = raw
                        .get("source_id")
                        .or_else(|| raw.get("id"))
                        .and_then(|v| scalar_text("source_id", v).ok().flatten());
                    warn!(source = %set.source_name, row, error = %err, "raw record rejected");
                    out.rejections.push(Rejection::new(set.source_name.clone(), row, source_id, &err));
                }
            }
        }
        out
    }

    fn parcel_id(&self, row: &mut RowReader<'_>) -> Result<Option<ParcelId>, ValidationError> {
        let Some(text) = row.text("parcel_id", PARCEL_ID)? else {
            return Ok(None);
        };
        match ParcelId::parse(&text, &self.config.parcel_format, &self.config.placeholder_parcel_ids) {
            Ok(id) => Ok(Some(id)),
            Err(reason) => {
                row.degrade("parcel_id", &text, reason);
                Ok(None)
            }
        }
    }

    fn bin(&self, row: &mut RowReader<'_>) -> Result<Option<Bin>, ValidationError> {
        let Some(text) = row.text("bin", BIN)? else {
            return Ok(None);
        };
        match Bin::parse(&text, &self.config.placeholder_bins) {
            Ok(bin) => Ok(Some(bin)),
            Err(reason) => {
                row.degrade("bin", &text, reason);
                Ok(None)
            }
        }
    }

    /// Explicit latitude/longitude take precedence over a `POINT(lng lat)` geometry.
    fn location(&self, row: &mut RowReader<'_>) -> Result<Option<GeoPoint>, ValidationError> {
        let lat = row.text("latitude", LATITUDE)?;
        let lng = row.text("longitude", LONGITUDE)?;

        let (lat_text, lng_text) = match (lat, lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            (Some(one), None) | (None, Some(one)) => {
                row.degrade("location", &one, DegradeReason::Incomplete);
                return Ok(None);
            }
            (None, None) => {
                let Some(geom) = row.text("geometry", GEOMETRY)? else {
                    return Ok(None);
                };
                let Some(caps) = point_re().captures(&geom) else {
                    row.degrade("location", &geom, DegradeReason::Malformed);
                    return Ok(None);
                };
                (caps[2].to_string(), caps[1].to_string())
            }
        };

        let raw = format!("{lat_text},{lng_text}");
        let (Ok(lat), Ok(lng)) = (lat_text.parse::<f64>(), lng_text.parse::<f64>()) else {
            row.degrade("location", &raw, DegradeReason::Malformed);
            return Ok(None);
        };
        let Some(point) = GeoPoint::new(lat, lng) else {
            row.degrade("location", &raw, DegradeReason::OutOfRange);
            return Ok(None);
        };
        if !self.config.bounds.contains(&point) {
            row.degrade("location", &raw, DegradeReason::OutOfBounds);
            return Ok(None);
        }
        Ok(Some(point))
    }

    fn year_built(&self, row: &mut RowReader<'_>) -> Result<Option<i32>, ValidationError> {
        let Some(text) = row.text("year_built", YEAR_BUILT)? else {
            return Ok(None);
        };
        let parsed = text
            .parse::<f64>()
            .ok()
            .and_then(as_integral)
            .or_else(|| {
                circa_year_re()
                    .captures(&text)
                    .and_then(|caps| caps[1].parse::<i64>().ok())
            });
        let Some(year) = parsed else {
            row.degrade("year_built", &text, DegradeReason::Malformed);
            return Ok(None);
        };
        match i32::try_from(year) {
            Ok(y) if self.config.year_range.contains(y) => Ok(Some(y)),
            _ => {
                row.degrade("year_built", &text, DegradeReason::OutOfRange);
                Ok(None)
            }
        }
    }

    fn height(&self, row: &mut RowReader<'_>) -> Result<Option<f64>, ValidationError> {
        let Some((height, text)) = row.number("height", HEIGHT)? else {
            return Ok(None);
        };
        if height > 0.0 {
            Ok(Some(height))
        } else {
            row.degrade("height", &text, DegradeReason::OutOfRange);
            Ok(None)
        }
    }

    fn floor_count(&self, row: &mut RowReader<'_>) -> Result<Option<u32>, ValidationError> {
        let Some((floors, text)) = row.number("floor_count", FLOOR_COUNT)? else {
            return Ok(None);
        };
        let Some(floors) = as_integral(floors) else {
            row.degrade("floor_count", &text, DegradeReason::Malformed);
            return Ok(None);
        };
        match u32::try_from(floors) {
            Ok(f) if (FLOOR_RANGE.0..=FLOOR_RANGE.1).contains(&f) => Ok(Some(f)),
            _ => {
                row.degrade("floor_count", &text, DegradeReason::OutOfRange);
                Ok(None)
            }
        }
    }
}
