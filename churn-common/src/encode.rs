//! One-hot feature encoding
//!
//! Builds the numeric feature matrix from normalized employees: ordinal
//! columns pass through, nominal columns expand into one indicator column per
//! observed level. Missing nominal values are their own `not_specified`
//! level, so missingness stays visible to the model.
//!
//! The level vocabulary is frozen by [`FeatureEncoder::fit`] and travels with
//! the model artifact.

use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::record::{Employee, NominalField, OrdinalField};
use crate::{Error, Result};

/// Where a matrix column's values come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// Numeric pass-through of an ordinal column
    Ordinal { field: OrdinalField },
    /// 1.0 iff the nominal column equals `level`
    Indicator { field: NominalField, level: String },
}

/// Named matrix column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub source: ColumnSource,
}

impl ColumnSpec {
    pub fn ordinal(field: OrdinalField) -> Self {
        Self {
            name: field.column_name().to_string(),
            source: ColumnSource::Ordinal { field },
        }
    }

    /// Indicator column named `<field>_<level>`
    pub fn indicator(field: NominalField, level: &str) -> Self {
        Self {
            name: format!("{}_{}", field.column_name(), level),
            source: ColumnSource::Indicator {
                field,
                level: level.to_string(),
            },
        }
    }
}

/// Observed levels of one nominal field, in column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLevels {
    pub field: NominalField,
    pub levels: Vec<String>,
}

/// Levels seen at fit time, per nominal field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub fields: Vec<FieldLevels>,
}

impl Vocabulary {
    pub fn levels(&self, field: NominalField) -> &[String] {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.levels.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of indicator columns
    pub fn indicator_count(&self) -> usize {
        self.fields.iter().map(|f| f.levels.len()).sum()
    }
}

/// Dense feature matrix with its column names and label vector
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureMatrix {
    pub columns: Vec<ColumnSpec>,
    pub data: Array2<f64>,
    pub labels: Vec<u8>,
}

impl EncodedFeatureMatrix {
    pub fn new(columns: Vec<ColumnSpec>, data: Array2<f64>, labels: Vec<u8>) -> Result<Self> {
        if data.ncols() != columns.len() {
            return Err(Error::Training(format!(
                "matrix has {} columns but {} names",
                data.ncols(),
                columns.len()
            )));
        }
        if data.nrows() != labels.len() {
            return Err(Error::Training(format!(
                "matrix has {} rows but {} labels",
                data.nrows(),
                labels.len()
            )));
        }
        Ok(Self {
            columns,
            data,
            labels,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keep only the given columns, in the given order
    pub fn select_columns(&self, indices: &[usize]) -> Self {
        Self {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            data: self.data.select(Axis(1), indices),
            labels: self.labels.clone(),
        }
    }

    /// Count of rows per label value, ascending by label
    pub fn class_counts(&self) -> Vec<(u8, usize)> {
        let mut counts: Vec<(u8, usize)> = Vec::new();
        for &label in &self.labels {
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }
        counts.sort_by_key(|(label, _)| *label);
        counts
    }
}

/// One-hot encoder with a frozen level vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    vocabulary: Vocabulary,
}

impl FeatureEncoder {
    /// Rebuild an encoder from a persisted vocabulary
    pub fn from_vocabulary(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Collect the distinct levels of every nominal field
    pub fn fit(employees: &[Employee]) -> Result<Self> {
        if employees.is_empty() {
            return Err(Error::Training("cannot encode an empty dataset".to_string()));
        }

        let fields = NominalField::ALL
            .iter()
            .map(|&field| {
                let distinct: BTreeSet<String> =
                    employees.iter().map(|e| e.level(field)).collect();
                let mut levels: Vec<String> = distinct.into_iter().collect();
                sort_levels(&mut levels);
                debug!("{} has {} levels", field.column_name(), levels.len());
                FieldLevels { field, levels }
            })
            .collect();

        Ok(Self {
            vocabulary: Vocabulary { fields },
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Ordinal columns first, then indicator columns by field then level
    pub fn columns(&self) -> Vec<ColumnSpec> {
        let mut columns: Vec<ColumnSpec> =
            OrdinalField::ALL.iter().map(|&f| ColumnSpec::ordinal(f)).collect();
        for field_levels in &self.vocabulary.fields {
            for level in &field_levels.levels {
                columns.push(ColumnSpec::indicator(field_levels.field, level));
            }
        }
        columns
    }

    /// Encode rows against the frozen vocabulary, preserving row order
    ///
    /// Levels unseen at fit time leave their indicator group all zero.
    pub fn transform(&self, employees: &[Employee]) -> Result<EncodedFeatureMatrix> {
        let columns = self.columns();
        let offset = OrdinalField::ALL.len();
        let positions: HashMap<(NominalField, String), usize> = columns[offset..]
            .iter()
            .enumerate()
            .filter_map(|(i, spec)| match &spec.source {
                ColumnSource::Indicator { field, level } => {
                    Some(((*field, level.clone()), offset + i))
                }
                ColumnSource::Ordinal { .. } => None,
            })
            .collect();

        let mut data = Array2::<f64>::zeros((employees.len(), columns.len()));
        let mut unseen = 0usize;
        for (row, employee) in employees.iter().enumerate() {
            for (col, &field) in OrdinalField::ALL.iter().enumerate() {
                data[[row, col]] = employee.ordinal(field);
            }
            for &field in NominalField::ALL.iter() {
                let key = (field, employee.level(field));
                match positions.get(&key) {
                    Some(&col) => data[[row, col]] = 1.0,
                    None => {
                        unseen += 1;
                        warn!(
                            "Level {:?} of {} was not seen during fit",
                            key.1,
                            field.column_name()
                        );
                    }
                }
            }
        }
        if unseen > 0 {
            warn!("{} cells carried levels outside the frozen vocabulary", unseen);
        }

        let labels = employees.iter().map(|e| e.target).collect();
        EncodedFeatureMatrix::new(columns, data, labels)
    }

    /// Fit the vocabulary and encode the same rows
    pub fn fit_transform(employees: &[Employee]) -> Result<(Self, EncodedFeatureMatrix)> {
        let encoder = Self::fit(employees)?;
        let matrix = encoder.transform(employees)?;
        Ok((encoder, matrix))
    }
}

/// Numeric order when every level is an integer (city codes), byte order otherwise
fn sort_levels(levels: &mut [String]) {
    let all_numeric = levels.iter().all(|l| l.parse::<i64>().is_ok());
    if all_numeric {
        levels.sort_by(|a, b| {
            let a = a.parse::<i64>().unwrap_or_default();
            let b = b.parse::<i64>().unwrap_or_default();
            a.cmp(&b)
        });
    } else {
        levels.sort();
    }
}
