//! Employee record model
//!
//! [`RawRecord`] mirrors one CSV row as read; [`Employee`] is the same row
//! after every ordinal column has been normalized to an integer code.

use serde::{Deserialize, Serialize};

use crate::normalize::{self, NOT_SPECIFIED};
use crate::{Error, Result};

/// Ordinal and continuous columns, passed through to the feature matrix as numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdinalField {
    CityDevelopmentIndex,
    Experience,
    CompanySize,
    LastNewJob,
    TrainingHours,
    EducationLevel,
}

impl OrdinalField {
    /// Matrix column order
    pub const ALL: [OrdinalField; 6] = [
        OrdinalField::CityDevelopmentIndex,
        OrdinalField::Experience,
        OrdinalField::CompanySize,
        OrdinalField::LastNewJob,
        OrdinalField::TrainingHours,
        OrdinalField::EducationLevel,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            OrdinalField::CityDevelopmentIndex => "city_development_index",
            OrdinalField::Experience => "experience",
            OrdinalField::CompanySize => "company_size",
            OrdinalField::LastNewJob => "last_new_job",
            OrdinalField::TrainingHours => "training_hours",
            OrdinalField::EducationLevel => "education_level",
        }
    }
}

/// Nominal columns, one-hot encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NominalField {
    #[serde(rename = "city")]
    City,
    #[serde(rename = "gender")]
    Gender,
    #[serde(rename = "relevent_experience")]
    RelevantExperience,
    #[serde(rename = "enrolled_university")]
    EnrolledUniversity,
    #[serde(rename = "major_discipline")]
    MajorDiscipline,
    #[serde(rename = "company_type")]
    CompanyType,
}

impl NominalField {
    /// Indicator group order
    pub const ALL: [NominalField; 6] = [
        NominalField::City,
        NominalField::Gender,
        NominalField::RelevantExperience,
        NominalField::EnrolledUniversity,
        NominalField::MajorDiscipline,
        NominalField::CompanyType,
    ];

    /// Column name as spelled in the dataset header
    pub fn column_name(&self) -> &'static str {
        match self {
            NominalField::City => "city",
            NominalField::Gender => "gender",
            NominalField::RelevantExperience => "relevent_experience",
            NominalField::EnrolledUniversity => "enrolled_university",
            NominalField::MajorDiscipline => "major_discipline",
            NominalField::CompanyType => "company_type",
        }
    }
}

/// Dataset header; the label is the last column
pub const CSV_COLUMNS: [&str; 14] = [
    "enrollee_id",
    "city",
    "city_development_index",
    "gender",
    "relevent_experience",
    "enrolled_university",
    "education_level",
    "major_discipline",
    "experience",
    "company_size",
    "company_type",
    "last_new_job",
    "training_hours",
    "target",
];

/// One dataset row, exactly as read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub enrollee_id: Option<String>,
    pub city: Option<String>,
    pub city_development_index: Option<String>,
    pub gender: Option<String>,
    pub relevent_experience: Option<String>,
    pub enrolled_university: Option<String>,
    pub education_level: Option<String>,
    pub major_discipline: Option<String>,
    pub experience: Option<String>,
    pub company_size: Option<String>,
    pub company_type: Option<String>,
    pub last_new_job: Option<String>,
    pub training_hours: Option<String>,
    pub target: Option<String>,
}

/// One normalized employee observation
#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub enrollee_id: u32,
    pub city: i32,
    pub city_development_index: f64,
    pub gender: Option<String>,
    pub relevent_experience: Option<String>,
    pub enrolled_university: Option<String>,
    pub education_level: i32,
    pub major_discipline: Option<String>,
    pub experience: i32,
    pub company_size: i32,
    pub company_type: Option<String>,
    pub last_new_job: i32,
    pub training_hours: f64,
    /// 0 = stayed, 1 = left
    pub target: u8,
}

impl Employee {
    /// Normalize a raw row
    pub fn from_raw(raw: &RawRecord) -> Result<Self> {
        let enrollee_id = required(&raw.enrollee_id, "enrollee_id")?;
        let enrollee_id = enrollee_id.parse::<u32>().map_err(|_| {
            Error::DataFormat(format!("enrollee_id {:?} is not an integer", enrollee_id))
        })?;

        Ok(Self {
            enrollee_id,
            city: normalize::city(required(&raw.city, "city")?)?,
            city_development_index: parse_float(&raw.city_development_index, "city_development_index")?,
            gender: category(&raw.gender),
            relevent_experience: category(&raw.relevent_experience),
            enrolled_university: category(&raw.enrolled_university),
            education_level: normalize::education_level(raw.education_level.as_deref())?,
            major_discipline: category(&raw.major_discipline),
            experience: normalize::experience(raw.experience.as_deref())?,
            company_size: normalize::company_size(raw.company_size.as_deref())?,
            company_type: category(&raw.company_type),
            last_new_job: normalize::last_new_job(raw.last_new_job.as_deref())?,
            training_hours: parse_float(&raw.training_hours, "training_hours")?,
            target: parse_label(&raw.target)?,
        })
    }

    /// Numeric value of an ordinal column
    pub fn ordinal(&self, field: OrdinalField) -> f64 {
        match field {
            OrdinalField::CityDevelopmentIndex => self.city_development_index,
            OrdinalField::Experience => self.experience as f64,
            OrdinalField::CompanySize => self.company_size as f64,
            OrdinalField::LastNewJob => self.last_new_job as f64,
            OrdinalField::TrainingHours => self.training_hours,
            OrdinalField::EducationLevel => self.education_level as f64,
        }
    }

    /// Category level of a nominal column, `not_specified` when missing
    pub fn level(&self, field: NominalField) -> String {
        let value = match field {
            NominalField::City => return self.city.to_string(),
            NominalField::Gender => &self.gender,
            NominalField::RelevantExperience => &self.relevent_experience,
            NominalField::EnrolledUniversity => &self.enrolled_university,
            NominalField::MajorDiscipline => &self.major_discipline,
            NominalField::CompanyType => &self.company_type,
        };
        value.clone().unwrap_or_else(|| NOT_SPECIFIED.to_string())
    }
}

fn required<'a>(value: &'a Option<String>, column: &str) -> Result<&'a str> {
    normalize::present(value.as_deref())
        .ok_or_else(|| Error::DataFormat(format!("{} is missing", column)))
}

fn category(value: &Option<String>) -> Option<String> {
    normalize::present(value.as_deref()).map(str::to_string)
}

fn parse_float(value: &Option<String>, column: &str) -> Result<f64> {
    let raw = required(value, column)?;
    raw.parse::<f64>()
        .map_err(|_| Error::DataFormat(format!("{} {:?} is not a number", column, raw)))
}

fn parse_label(value: &Option<String>) -> Result<u8> {
    let label = parse_float(value, "target")?;
    if label == 0.0 {
        Ok(0)
    } else if label == 1.0 {
        Ok(1)
    } else {
        Err(Error::DataFormat(format!("target must be 0 or 1, got {}", label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row() -> RawRecord {
        RawRecord {
            enrollee_id: Some("8949".to_string()),
            city: Some("city_103".to_string()),
            city_development_index: Some("0.92".to_string()),
            gender: Some("Male".to_string()),
            relevent_experience: Some("Has relevent experience".to_string()),
            enrolled_university: Some("no_enrollment".to_string()),
            education_level: Some("Graduate".to_string()),
            major_discipline: Some("STEM".to_string()),
            experience: Some(">20".to_string()),
            company_size: None,
            company_type: None,
            last_new_job: Some("1".to_string()),
            training_hours: Some("36".to_string()),
            target: Some("1.0".to_string()),
        }
    }

    #[test]
    fn test_from_raw_normalizes_every_column() {
        let employee = Employee::from_raw(&raw_row()).unwrap();
        assert_eq!(employee.enrollee_id, 8949);
        assert_eq!(employee.city, 103);
        assert_eq!(employee.education_level, 2);
        assert_eq!(employee.experience, 21);
        assert_eq!(employee.company_size, -1);
        assert_eq!(employee.company_type, None);
        assert_eq!(employee.last_new_job, 1);
        assert_eq!(employee.training_hours, 36.0);
        assert_eq!(employee.target, 1);
    }

    #[test]
    fn test_missing_category_becomes_sentinel_level() {
        let employee = Employee::from_raw(&raw_row()).unwrap();
        assert_eq!(employee.level(NominalField::CompanyType), NOT_SPECIFIED);
        assert_eq!(employee.level(NominalField::City), "103");
        assert_eq!(employee.level(NominalField::Gender), "Male");
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let mut raw = raw_row();
        raw.target = Some("2".to_string());
        assert!(matches!(Employee::from_raw(&raw), Err(Error::DataFormat(_))));
    }

    #[test]
    fn test_missing_continuous_value_rejected() {
        let mut raw = raw_row();
        raw.training_hours = None;
        assert!(matches!(Employee::from_raw(&raw), Err(Error::DataFormat(_))));
    }
}
