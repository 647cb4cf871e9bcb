//! Region catalog - era/chamber/event-type to crop rectangle
//!
//! The overlay layout of the broadcast changed over the years, so every detection type carries a
//! list of eras. An era applies from its `min_date` until the next one starts.
//!
//! ```json5
//! {
//!   bill_detection: {
//!     default: { regions: { house_floor: [0.0, 0.8, 1.0, 0.2] } },
//!     "2023": { min_date: "2023-01-01", regions: { house_floor: [0.0, 0.85, 1.0, 0.15] } },
//!   },
//! }
//! ```

mod error;

pub use error::{RegionConfigError, RegionLookupError};

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_ERA: &str = "default";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    BillDetection,
    SpeakerDetection,
}

impl DetectionType {
    pub fn config_key(&self) -> &'static str {
        match self {
            DetectionType::BillDetection => "bill_detection",
            DetectionType::SpeakerDetection => "speaker_detection",
        }
    }

    fn from_config_key(key: &str) -> Option<Self> {
        match key {
            "bill_detection" => Some(DetectionType::BillDetection),
            "speaker_detection" => Some(DetectionType::SpeakerDetection),
            _ => None,
        }
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

impl FromStr for DetectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bill" | "bills" | "bill_detection" => Ok(DetectionType::BillDetection),
            "speaker" | "speakers" | "speaker_detection" => Ok(DetectionType::SpeakerDetection),
            other => Err(format!("unknown detection type: {}", other)),
        }
    }
}

/// Crop rectangle. Units follow the OCR caller's contract (relative by default).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exactly four finite, non-negative numbers; anything else is `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 4 {
            return None;
        }

        let mut coords = [0.0f64; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            let n = item.as_f64()?;
            if !n.is_finite() || n < 0.0 {
                return None;
            }
            *slot = n;
        }

        Some(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RegionEntry {
    Valid(Rectangle),
    Malformed,
}

#[derive(Debug, Clone)]
struct Era {
    name: String,
    min_date: Option<NaiveDate>,
    regions: BTreeMap<String, RegionEntry>,
}

impl Era {
    fn from_value(name: &str, value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let min_date = match object.get("min_date") {
            Some(Value::String(s)) => match NaiveDate::parse_from_str(s, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!("⚠️ RegionCatalog: era '{}' has unreadable min_date '{}': {}", name, s, e);
                    None
                }
            },
            Some(other) => {
                warn!("⚠️ RegionCatalog: era '{}' min_date is not a string: {}", name, other);
                None
            }
            None => None,
        };

        let regions = object
            .get("regions")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(key, coords)| {
                        let entry = match Rectangle::from_value(coords) {
                            Some(rect) => RegionEntry::Valid(rect),
                            None => {
                                debug!("RegionCatalog: era '{}' region '{}' is malformed", name, key);
                                RegionEntry::Malformed
                            }
                        };
                        (key.to_lowercase(), entry)
                    })
                    .collect::<BTreeMap<_, _>>()
            });

        Some(Self {
            name: name.to_string(),
            min_date,
            regions: regions.unwrap_or_default(),
        })
    }

    fn has_regions_block(value: &Value) -> bool {
        value.get("regions").map(Value::is_object).unwrap_or(false)
    }
}

/// Eras of one detection type, dated ones sorted by ascending `min_date`.
#[derive(Debug, Clone, Default)]
struct EraSet {
    dated: Vec<Era>,
    default: Option<Era>,
}

impl EraSet {
    fn from_value(detection_type: &str, value: &Value) -> Result<Self, RegionConfigError> {
        let mut set = EraSet::default();
        let Some(eras) = value.as_object() else {
            warn!("⚠️ RegionCatalog: {} is not an object, ignoring", detection_type);
            return Ok(set);
        };

        for (name, era_value) in eras {
            let Some(era) = Era::from_value(name, era_value) else {
                warn!("⚠️ RegionCatalog: {}.{} is not an object, ignoring", detection_type, name);
                continue;
            };

            if name == DEFAULT_ERA {
                set.default = Some(era.clone());
            }
            if era.min_date.is_some() && Era::has_regions_block(era_value) {
                set.dated.push(era);
            }
        }

        set.dated.sort_by_key(|era| era.min_date);
        for pair in set.dated.windows(2) {
            if pair[0].min_date == pair[1].min_date {
                return Err(RegionConfigError::DuplicateEraDate {
                    detection_type: detection_type.to_string(),
                    date: pair[0]
                        .min_date
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_default(),
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }

        Ok(set)
    }

    /// Latest era whose `min_date` is on or before `date`, else the default era.
    fn select(&self, date: NaiveDate) -> Option<&Era> {
        self.dated
            .iter()
            .rev()
            .find(|era| era.min_date.map(|d| d <= date).unwrap_or(false))
            .or(self.default.as_ref())
    }
}

/// Region lookup key: `subcommittee` shares the committee layout.
pub fn region_key(chamber: &str, event_type: &str) -> String {
    let event = event_type.trim().to_lowercase();
    let event = if event == "subcommittee" {
        "committee".to_string()
    } else {
        event
    };
    format!("{}_{}", chamber.trim().to_lowercase(), event)
}

fn committee_key(chamber: &str) -> String {
    format!("{}_committee", chamber.trim().to_lowercase())
}

/// Read-only region catalog, loaded once per batch.
///
/// ```ignore
/// let catalog = RegionCatalog::from_path("config/chyron_regions.json5")?;
/// let rect = catalog.resolve(DetectionType::BillDetection, "house", "floor", date);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    eras: BTreeMap<DetectionType, EraSet>,
}

impl RegionCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegionConfigError> {
        let path = path.as_ref();
        info!("🗺️ RegionCatalog: loading {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_json5_str(&text)
    }

    pub fn from_json5_str(text: &str) -> Result<Self, RegionConfigError> {
        let root: Value = json5::from_str(text).map_err(|e| RegionConfigError::Parse(e.to_string()))?;
        let object = root.as_object().ok_or(RegionConfigError::NotAnObject)?;

        let mut eras = BTreeMap::new();
        for (key, value) in object {
            match DetectionType::from_config_key(key) {
                Some(detection_type) => {
                    let set = EraSet::from_value(key, value)?;
                    debug!(
                        "RegionCatalog: {} has {} dated era(s), default={}",
                        key,
                        set.dated.len(),
                        set.default.is_some()
                    );
                    eras.insert(detection_type, set);
                }
                None => warn!("⚠️ RegionCatalog: unknown detection type '{}', ignoring", key),
            }
        }

        Ok(Self { eras })
    }

    /// Crop rectangle for the screenshot context, or the reason there is none.
    pub fn lookup(
        &self,
        detection_type: DetectionType,
        chamber: &str,
        event_type: &str,
        date: NaiveDate,
    ) -> Result<Rectangle, RegionLookupError> {
        let key = region_key(chamber, event_type);
        let missing = || RegionLookupError::ConfigurationMissing {
            key: format!("{}/{}", detection_type, key),
        };

        let era = self
            .eras
            .get(&detection_type)
            .and_then(|set| set.select(date))
            .ok_or_else(missing)?;

        let fallback = committee_key(chamber);
        let (used_key, entry) = match era.regions.get(&key) {
            Some(entry) => (&key, entry),
            None => match era.regions.get(&fallback) {
                Some(entry) => (&fallback, entry),
                None => return Err(missing()),
            },
        };

        match entry {
            RegionEntry::Valid(rect) => {
                debug!("RegionCatalog: {} -> era '{}' key '{}'", key, era.name, used_key);
                Ok(*rect)
            }
            RegionEntry::Malformed => Err(RegionLookupError::MalformedRegion {
                key: format!("{}/{}/{}", detection_type, era.name, used_key),
            }),
        }
    }

    pub fn resolve(
        &self,
        detection_type: DetectionType,
        chamber: &str,
        event_type: &str,
        date: NaiveDate,
    ) -> Option<Rectangle> {
        self.lookup(detection_type, chamber, event_type, date).ok()
    }

    pub fn bill_region(&self, chamber: &str, event_type: &str, date: NaiveDate) -> Option<Rectangle> {
        self.resolve(DetectionType::BillDetection, chamber, event_type, date)
    }

    pub fn speaker_region(&self, chamber: &str, event_type: &str, date: NaiveDate) -> Option<Rectangle> {
        self.resolve(DetectionType::SpeakerDetection, chamber, event_type, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        // layouts by era
        bill_detection: {
            default: { regions: { house_floor: [4, 4, 4, 4] } },
            a2018: { min_date: "2018-01-01", regions: { house_floor: [1, 1, 1, 1], house_committee: [0.1, 0.7, 0.8, 0.2] } },
            b2023: { min_date: "2023-01-01", regions: { house_floor: [2, 2, 2, 2], senate_floor: [0, 0.8, 1] } },
        },
        speaker_detection: {
            current: { min_date: "2020-01-01", regions: { senate_floor: [0.0, 0.9, 0.5, 0.1], house_floor: [0, 0, -1, 1] } },
        },
    }"#;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn catalog() -> RegionCatalog {
        RegionCatalog::from_json5_str(CATALOG).unwrap()
    }

    #[test]
    fn test_era_selection() {
        let catalog = catalog();
        let bill = |d: &str| catalog.bill_region("house", "floor", date(d)).unwrap();

        assert_eq!(bill("2020-01-01"), Rectangle::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(bill("2025-01-01"), Rectangle::new(2.0, 2.0, 2.0, 2.0));
        assert_eq!(bill("2010-01-01"), Rectangle::new(4.0, 4.0, 4.0, 4.0));
        // min_date is inclusive
        assert_eq!(bill("2023-01-01"), Rectangle::new(2.0, 2.0, 2.0, 2.0));
        assert_eq!(bill("2022-12-31"), Rectangle::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_committee_fallback() {
        let catalog = catalog();
        let rect = catalog.bill_region("House", "subcommittee", date("2020-06-01"));
        assert_eq!(rect, Some(Rectangle::new(0.1, 0.7, 0.8, 0.2)));

        // unknown event types fall back to committee too
        let rect = catalog.bill_region("house", "caucus", date("2020-06-01"));
        assert_eq!(rect, Some(Rectangle::new(0.1, 0.7, 0.8, 0.2)));
    }

    #[test]
    fn test_missing_region() {
        let catalog = catalog();
        let err = catalog
            .lookup(DetectionType::BillDetection, "senate", "committee", date("2020-06-01"))
            .unwrap_err();
        assert!(matches!(err, RegionLookupError::ConfigurationMissing { .. }));

        // no era applies and there is no default
        assert_eq!(catalog.speaker_region("senate", "floor", date("2019-01-01")), None);
        assert_eq!(RegionCatalog::empty().bill_region("house", "floor", date("2020-01-01")), None);
    }

    #[test]
    fn test_malformed_region() {
        let catalog = catalog();
        let err = catalog
            .lookup(DetectionType::BillDetection, "senate", "floor", date("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, RegionLookupError::MalformedRegion { .. }));

        let err = catalog
            .lookup(DetectionType::SpeakerDetection, "house", "floor", date("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, RegionLookupError::MalformedRegion { .. }));

        assert_eq!(
            catalog.speaker_region("senate", "floor", date("2024-01-01")),
            Some(Rectangle::new(0.0, 0.9, 0.5, 0.1))
        );
    }

    #[test]
    fn test_rectangle_from_value() {
        assert!(Rectangle::from_value(&serde_json::json!([1, 2, 3, 4])).is_some());
        assert!(Rectangle::from_value(&serde_json::json!([1, 2, 3])).is_none());
        assert!(Rectangle::from_value(&serde_json::json!([1, 2, 3, 4, 5])).is_none());
        assert!(Rectangle::from_value(&serde_json::json!([1, "2", 3, 4])).is_none());
        assert!(Rectangle::from_value(&serde_json::json!({"x": 1})).is_none());
    }

    #[test]
    fn test_duplicate_min_date_is_rejected() {
        let text = r#"{ bill_detection: {
            a: { min_date: "2020-01-01", regions: {} },
            b: { min_date: "2020-01-01", regions: {} },
        } }"#;
        let err = RegionCatalog::from_json5_str(text).unwrap_err();
        assert!(matches!(err, RegionConfigError::DuplicateEraDate { .. }));
    }

    #[test]
    fn test_tolerant_loading() {
        let text = r#"{
            bill_detection: {
                broken: "nope",
                bad_date: { min_date: "someday", regions: { house_floor: [1, 1, 1, 1] } },
            },
            unknown_detection: {},
        }"#;
        let catalog = RegionCatalog::from_json5_str(text).unwrap();
        assert_eq!(catalog.bill_region("house", "floor", date("2024-01-01")), None);

        assert!(RegionCatalog::from_json5_str("[1, 2]").is_err());
        assert!(RegionCatalog::from_json5_str("{ not json").is_err());
    }

    #[test]
    fn test_region_key() {
        assert_eq!(region_key("House", "Floor"), "house_floor");
        assert_eq!(region_key("senate", "subcommittee"), "senate_committee");
    }

    #[test]
    fn test_detection_type_from_str() {
        assert_eq!("bill".parse::<DetectionType>().unwrap(), DetectionType::BillDetection);
        assert_eq!("speaker_detection".parse::<DetectionType>().unwrap(), DetectionType::SpeakerDetection);
        assert!("weather".parse::<DetectionType>().is_err());
    }
}
