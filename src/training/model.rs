//! Persisted model artifacts
//!
//! A [`ModelArtifact`] bundles a fitted estimator with everything needed to
//! serve it without the training dataset: the ordered input columns and their
//! encoders, the output column, and for classifiers the label vocabulary.

use super::config::{Algorithm, TaskKind};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::random_forest::RandomForest;
use crate::error::{PlatformError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Bumped whenever the encoded layout of [`ModelArtifact`] changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

fn is_text(dtype: &DataType) -> bool {
    dtype == &DataType::String || dtype.is_categorical()
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col.as_materialized_series().f64()?.into_iter().collect())
}

/// How one input column becomes a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoder {
    /// Used as-is; nulls become 0.0
    Numeric,
    /// Ordinal code into the sorted category list; unseen values get `categories.len()`
    Categorical { categories: Vec<String> },
}

/// An input column of the frozen contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputColumn {
    pub name: String,
    pub encoder: ColumnEncoder,
}

impl InputColumn {
    /// Choose the encoder from the column's dtype
    pub fn fit(df: &DataFrame, name: &str) -> Result<Self> {
        let dtype = df.column(name)?.dtype().clone();
        let encoder = if is_text(&dtype) {
            let mut categories: Vec<String> = text_values(df, name)?.into_iter().flatten().collect();
            categories.sort();
            categories.dedup();
            ColumnEncoder::Categorical { categories }
        } else {
            ColumnEncoder::Numeric
        };
        Ok(Self {
            name: name.to_string(),
            encoder,
        })
    }

    fn code_of(categories: &[String], value: &str) -> f64 {
        categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .unwrap_or(categories.len()) as f64
    }

    /// Encode the whole column of a table
    pub fn encode_column(&self, df: &DataFrame) -> Result<Vec<f64>> {
        match &self.encoder {
            ColumnEncoder::Numeric => Ok(float_values(df, &self.name)?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect()),
            ColumnEncoder::Categorical { categories } => Ok(text_values(df, &self.name)?
                .into_iter()
                .map(|v| match v {
                    Some(s) => Self::code_of(categories, &s),
                    None => categories.len() as f64,
                })
                .collect()),
        }
    }

    /// Encode one value taken from a prediction payload
    pub fn encode_value(&self, value: &Value) -> Result<f64> {
        match &self.encoder {
            ColumnEncoder::Numeric => match value {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                PlatformError::MalformedPayload(format!(
                    "column '{}' expects a numeric value, got {}",
                    self.name, value
                ))
            }),
            ColumnEncoder::Categorical { categories } => match value {
                Value::String(s) => Ok(Self::code_of(categories, s)),
                Value::Number(n) => Ok(Self::code_of(categories, &n.to_string())),
                Value::Bool(b) => Ok(Self::code_of(categories, &b.to_string())),
                _ => Err(PlatformError::MalformedPayload(format!(
                    "column '{}' expects a category value, got {}",
                    self.name, value
                ))),
            },
        }
    }
}

/// Original representation of a class label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassLabel {
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ClassLabel {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ClassLabel::Integer(a), ClassLabel::Integer(b)) => a.cmp(b),
            (ClassLabel::Number(a), ClassLabel::Number(b)) => a.total_cmp(b),
            (ClassLabel::Text(a), ClassLabel::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ClassLabel::Integer(_) => 0,
            ClassLabel::Number(_) => 1,
            ClassLabel::Text(_) => 2,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ClassLabel::Integer(v) => Value::from(*v),
            ClassLabel::Number(v) => Value::from(*v),
            ClassLabel::Text(v) => Value::from(v.clone()),
        }
    }
}

/// Sorted class vocabulary of a classification target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<ClassLabel>,
}

impl LabelEncoder {
    /// Learn the vocabulary of `name` and return the class index of every row
    pub fn fit_transform(df: &DataFrame, name: &str) -> Result<(Self, Vec<usize>)> {
        let col = df.column(name)?;
        let null_err = || PlatformError::Schema(format!("output column '{}' contains null values", name));
        let dtype = col.dtype().clone();

        let labels: Vec<ClassLabel> = if is_text(&dtype) {
            text_values(df, name)?
                .into_iter()
                .map(|v| v.map(ClassLabel::Text).ok_or_else(null_err))
                .collect::<Result<_>>()?
        } else if dtype.is_integer() || dtype == DataType::Boolean {
            let cast = col.cast(&DataType::Int64)?;
            cast.as_materialized_series()
                .i64()?
                .into_iter()
                .map(|v| v.map(ClassLabel::Integer).ok_or_else(null_err))
                .collect::<Result<_>>()?
        } else if dtype.is_float() {
            float_values(df, name)?
                .into_iter()
                .map(|v| v.map(ClassLabel::Number).ok_or_else(null_err))
                .collect::<Result<_>>()?
        } else {
            return Err(PlatformError::Schema(format!(
                "output column '{}' has unsupported type {}",
                name, dtype
            )));
        };

        let mut classes = labels.clone();
        classes.sort_by(|a, b| a.compare(b));
        classes.dedup_by(|a, b| a.compare(b) == Ordering::Equal);

        let codes = labels
            .iter()
            .map(|label| classes.binary_search_by(|c| c.compare(label)).unwrap_or(0))
            .collect();
        Ok((Self { classes }, codes))
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn decode(&self, class_index: usize) -> Value {
        self.classes
            .get(class_index)
            .map(ClassLabel::to_json)
            .unwrap_or(Value::Null)
    }
}

/// Numeric regression target; nulls and text are rejected
pub fn regression_target(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let dtype = df.column(name)?.dtype().clone();
    if is_text(&dtype) {
        return Err(PlatformError::Schema(format!(
            "regression target '{}' must be numeric, found {}",
            name, dtype
        )));
    }
    float_values(df, name)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| PlatformError::Schema(format!("output column '{}' contains null values", name)))
        })
        .collect()
}

/// A fitted estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
    LinearRegression(LinearRegression),
}

impl FittedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::LogisticRegression(m) => m.predict(x),
            FittedModel::LinearRegression(m) => m.predict(x),
        }
    }
}

/// Self-describing persisted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub algorithm: Algorithm,
    pub task: TaskKind,
    pub inputs: Vec<InputColumn>,
    pub output_column: String,
    /// Present for classifiers
    pub labels: Option<LabelEncoder>,
    pub model: FittedModel,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn new(
        algorithm: Algorithm,
        inputs: Vec<InputColumn>,
        output_column: String,
        labels: Option<LabelEncoder>,
        model: FittedModel,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            algorithm,
            task: algorithm.task(),
            inputs,
            output_column,
            labels,
            model,
            trained_at: Utc::now(),
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|c| c.name.clone()).collect()
    }

    /// Feature matrix of a table with the input columns in contract order
    pub fn encode_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        encode_frame(&self.inputs, df)
    }

    /// Feature matrix of payload rows already projected in contract order
    pub fn encode_rows(&self, rows: &[Vec<&Value>]) -> Result<Array2<f64>> {
        let n_cols = self.inputs.len();
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(PlatformError::ShapeError {
                    expected: format!("{} input values", n_cols),
                    actual: format!("{} input values", row.len()),
                });
            }
            for (column, value) in self.inputs.iter().zip(row.iter()) {
                data.push(column.encode_value(value)?);
            }
        }
        Ok(Array2::from_shape_vec((rows.len(), n_cols), data)?)
    }

    /// Map raw estimator output to portable values (class labels or numbers)
    pub fn decode(&self, raw: &Array1<f64>) -> Vec<Value> {
        match &self.labels {
            Some(labels) => raw.iter().map(|&v| labels.decode(v as usize)).collect(),
            None => raw.iter().map(|&v| Value::from(v)).collect(),
        }
    }

    /// Encode, predict and decode payload rows
    pub fn predict_rows(&self, rows: &[Vec<&Value>]) -> Result<Vec<Value>> {
        let x = self.encode_rows(rows)?;
        let raw = self
            .model
            .predict(&x)
            .map_err(|e| PlatformError::Inference(e.to_string()))?;
        Ok(self.decode(&raw))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = bincode::deserialize(bytes)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PlatformError::Serialization(format!(
                "unsupported artifact format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }
}

/// Column-major encode of `inputs` into a row-major matrix
pub fn encode_frame(inputs: &[InputColumn], df: &DataFrame) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = inputs
        .iter()
        .map(|c| c.encode_column(df))
        .collect::<Result<_>>()?;
    Ok(Array2::from_shape_fn((df.height(), inputs.len()), |(r, c)| col_data[c][r]))
}
