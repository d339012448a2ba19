//! Food item ("aliment") model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored food item.
///
/// `name` is the externally addressed key; `_id` is assigned by the store and
/// never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aliment {
    pub name: String,
    pub calories: f64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
    pub version: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated: DateTime<Utc>,
    #[serde(rename = "_id", default)]
    pub id: String,
}

/// Validated fields for a new item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAliment {
    pub name: String,
    pub calories: f64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
}

/// Request body for creating or updating an item.
///
/// Every field is optional at the parsing stage so validation can report a
/// domain message instead of a deserializer error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlimentPayload {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

impl AlimentPayload {
    /// The body name, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Convert into a new item when every required field is set.
    ///
    /// Zero counts as unset for the numeric fields, matching what existing
    /// clients have always been told is a missing value.
    pub fn into_new(self) -> Option<NewAliment> {
        let name = self.name.filter(|name| !name.is_empty())?;
        Some(NewAliment {
            name,
            calories: truthy(self.calories)?,
            proteins: truthy(self.proteins)?,
            carbs: truthy(self.carbs)?,
            fats: truthy(self.fats)?,
        })
    }

    /// The partial change this payload describes.
    pub fn changes(&self) -> AlimentChanges {
        AlimentChanges {
            calories: self.calories,
            proteins: self.proteins,
            carbs: self.carbs,
            fats: self.fats,
        }
    }
}

fn truthy(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Fields replaced by an update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlimentChanges {
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

impl AlimentChanges {
    pub fn apply(&self, aliment: &mut Aliment) {
        if let Some(calories) = self.calories {
            aliment.calories = calories;
        }
        if let Some(proteins) = self.proteins {
            aliment.proteins = proteins;
        }
        if let Some(carbs) = self.carbs {
            aliment.carbs = carbs;
        }
        if let Some(fats) = self.fats {
            aliment.fats = fats;
        }
    }
}

/// Payload of the `aliment-deleted` event.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedAliment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> AlimentPayload {
        AlimentPayload {
            name: Some("Apple".into()),
            calories: Some(52.0),
            proteins: Some(0.3),
            carbs: Some(14.0),
            fats: Some(0.2),
        }
    }

    #[test]
    fn test_complete_payload_converts() {
        let new = payload().into_new().unwrap();
        assert_eq!(new.name, "Apple");
        assert_eq!(new.calories, 52.0);
    }

    #[test]
    fn test_zero_and_missing_fields_rejected() {
        let mut p = payload();
        p.fats = Some(0.0);
        assert!(p.into_new().is_none());

        let mut p = payload();
        p.carbs = None;
        assert!(p.into_new().is_none());

        let mut p = payload();
        p.name = Some(String::new());
        assert!(p.into_new().is_none());
    }

    #[test]
    fn test_changes_keep_absent_fields() {
        let mut aliment = Aliment {
            name: "Apple".into(),
            calories: 52.0,
            proteins: 0.3,
            carbs: 14.0,
            fats: 0.2,
            version: 1,
            updated: Utc::now(),
            id: "a".into(),
        };
        AlimentChanges {
            calories: Some(60.0),
            ..Default::default()
        }
        .apply(&mut aliment);
        assert_eq!(aliment.calories, 60.0);
        assert_eq!(aliment.carbs, 14.0);
    }

    #[test]
    fn test_wire_format() {
        let aliment = Aliment {
            name: "Apple".into(),
            calories: 52.0,
            proteins: 0.3,
            carbs: 14.0,
            fats: 0.2,
            version: 1,
            updated: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            id: "abc".into(),
        };
        let json = serde_json::to_value(&aliment).unwrap();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["updated"], 1_700_000_000_123i64);
    }
}
