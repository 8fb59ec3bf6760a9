//! Prediction payload parsing and validation

use crate::error::{PlatformError, Result};
use serde_json::{Map, Value};

/// Records of a `{"data": <record> | [<record>, ...]}` request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionPayload {
    records: Vec<Map<String, Value>>,
    single: bool,
}

impl PredictionPayload {
    /// Parse a full request body
    pub fn from_body(body: &Value) -> Result<Self> {
        let data = body.get("data").ok_or_else(|| {
            PlatformError::MalformedPayload("Invalid request format. Expected {'data': ...}".to_string())
        })?;
        Self::from_data(data)
    }

    /// Parse the value under `data`
    pub fn from_data(data: &Value) -> Result<Self> {
        match data {
            Value::Object(record) => Ok(Self {
                records: vec![record.clone()],
                single: true,
            }),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(PlatformError::MalformedPayload("data list is empty".to_string()));
                }
                let records = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Object(record) => Ok(record.clone()),
                        _ => Err(PlatformError::MalformedPayload(format!(
                            "record {} is not an object",
                            i
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    records,
                    single: false,
                })
            }
            _ => Err(PlatformError::MalformedPayload(
                "Data must be dict or list of dicts".to_string(),
            )),
        }
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Declared columns absent from at least one record, in declared order
    pub fn missing_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| self.records.iter().any(|r| !r.contains_key(c.as_str())))
            .cloned()
            .collect()
    }

    /// Fail the whole payload when any record lacks a declared column
    pub fn validate(&self, columns: &[String]) -> Result<()> {
        let missing = self.missing_columns(columns);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::MissingColumns(missing))
        }
    }

    /// Values of the declared columns in declared order; extra fields are dropped
    pub fn project(&self, columns: &[String]) -> Result<Vec<Vec<&Value>>> {
        self.validate(columns)?;
        Ok(self
            .records
            .iter()
            .map(|r| columns.iter().filter_map(|c| r.get(c.as_str())).collect())
            .collect())
    }

    /// Single payloads yield one value, list payloads a list in input order
    pub fn shape(&self, mut predictions: Vec<Value>) -> PredictionOutput {
        if self.single && predictions.len() == 1 {
            PredictionOutput::Single(predictions.remove(0))
        } else {
            PredictionOutput::Batch(predictions)
        }
    }
}

/// Prediction result matching the payload's shape
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutput {
    Single(Value),
    Batch(Vec<Value>),
}

impl PredictionOutput {
    /// Insert as `prediction` or `predictions` into a response object
    pub fn write_into(self, body: &mut Map<String, Value>) {
        match self {
            PredictionOutput::Single(v) => {
                body.insert("prediction".to_string(), v);
            }
            PredictionOutput::Batch(vs) => {
                body.insert("predictions".to_string(), Value::Array(vs));
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PredictionOutput::Single(_) => 1,
            PredictionOutput::Batch(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_record() {
        let payload = PredictionPayload::from_body(&json!({"data": {"x1": 1.0, "x2": 2.0}})).unwrap();
        assert!(payload.is_single());
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_missing_data_key() {
        let err = PredictionPayload::from_body(&json!({"rows": []})).unwrap_err();
        assert!(matches!(err, PlatformError::MalformedPayload(_)));
    }

    #[test]
    fn test_rejects_scalars_and_empty_lists() {
        assert!(PredictionPayload::from_data(&json!(3)).is_err());
        assert!(PredictionPayload::from_data(&json!([])).is_err());
        assert!(PredictionPayload::from_data(&json!([{"a": 1}, 2])).is_err());
    }

    #[test]
    fn test_missing_columns_across_records() {
        let payload = PredictionPayload::from_data(&json!([
            {"x1": 1.0, "x2": 2.0, "x3": 0.0},
            {"x1": 1.0},
            {"x3": 1.0, "x2": 2.0}
        ]))
        .unwrap();
        assert_eq!(payload.missing_columns(&cols(&["x1", "x2", "x3"])), cols(&["x1", "x2", "x3"]));

        let err = payload.validate(&cols(&["x2"])).unwrap_err();
        match err {
            PlatformError::MissingColumns(missing) => assert_eq!(missing, cols(&["x2"])),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_project_orders_and_drops_extra() {
        let payload = PredictionPayload::from_data(&json!({"b": 2, "extra": "x", "a": 1})).unwrap();
        let rows = payload.project(&cols(&["a", "b"])).unwrap();
        assert_eq!(rows, vec![vec![&json!(1), &json!(2)]]);
    }

    #[test]
    fn test_shape() {
        let single = PredictionPayload::from_data(&json!({"a": 1})).unwrap();
        assert_eq!(single.shape(vec![json!(5)]), PredictionOutput::Single(json!(5)));

        let batch = PredictionPayload::from_data(&json!([{"a": 1}])).unwrap();
        let mut body = Map::new();
        batch.shape(vec![json!(5)]).write_into(&mut body);
        assert_eq!(Value::Object(body), json!({"predictions": [5]}));
    }
}
