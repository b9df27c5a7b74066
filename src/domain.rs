use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RequestError;

pub const STATUS_NEW: &str = "New";
pub const STATUS_WAITING: &str = "Waiting";
pub const STATUS_ASSIGNED: &str = "Assigned";
pub const STATUS_DONE: &str = "Done";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_UNKNOWN: &str = "Unknown";

pub const REQUEST_STATUSES: [&str; 5] = [
    STATUS_NEW,
    STATUS_WAITING,
    STATUS_ASSIGNED,
    STATUS_DONE,
    STATUS_FAILED,
];

pub const REQUEST_ATTRIBUTES: [&str; 10] = [
    "Status",
    "RequestName",
    "RequestID",
    "Setup",
    "Owner",
    "OwnerGroup",
    "SourceComponent",
    "CreationTime",
    "LastUpdate",
    "JobID",
];

pub const SUB_REQUEST_ATTRIBUTES: [&str; 9] = [
    "Status",
    "SubRequestID",
    "Operation",
    "CreationTime",
    "Catalogue",
    "TargetSE",
    "LastUpdate",
    "ExecutionOrder",
    "Error",
];

/// Dynamic field value carried by file/dataset records and forward-compatible
/// sub-request attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(text) => write!(f, "{text}"),
            Value::List(_) | Value::Map(_) => {
                let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{rendered}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Flat request-level attributes; the ten names in [`REQUEST_ATTRIBUTES`] are
/// the only legal field names at this level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RequestAttributes {
    pub status: String,
    pub request_name: String,
    #[serde(rename = "RequestID")]
    pub request_id: String,
    pub setup: String,
    pub owner: String,
    pub owner_group: String,
    pub source_component: String,
    pub creation_time: String,
    pub last_update: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
}

impl Default for RequestAttributes {
    fn default() -> Self {
        Self {
            status: STATUS_UNKNOWN.to_string(),
            request_name: STATUS_UNKNOWN.to_string(),
            request_id: STATUS_UNKNOWN.to_string(),
            setup: STATUS_UNKNOWN.to_string(),
            owner: STATUS_UNKNOWN.to_string(),
            owner_group: STATUS_UNKNOWN.to_string(),
            source_component: STATUS_UNKNOWN.to_string(),
            creation_time: STATUS_UNKNOWN.to_string(),
            last_update: STATUS_UNKNOWN.to_string(),
            job_id: STATUS_UNKNOWN.to_string(),
        }
    }
}

impl RequestAttributes {
    pub fn get(&self, name: &str) -> Result<&str, RequestError> {
        let value = match name {
            "Status" => &self.status,
            "RequestName" => &self.request_name,
            "RequestID" => &self.request_id,
            "Setup" => &self.setup,
            "Owner" => &self.owner,
            "OwnerGroup" => &self.owner_group,
            "SourceComponent" => &self.source_component,
            "CreationTime" => &self.creation_time,
            "LastUpdate" => &self.last_update,
            "JobID" => &self.job_id,
            other => return Err(RequestError::UnknownAttribute(other.to_string())),
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), RequestError> {
        let value = value.into();
        match name {
            "Status" => self.status = value,
            "RequestName" => self.request_name = value,
            "RequestID" => self.request_id = value,
            "Setup" => self.setup = value,
            "Owner" => self.owner = value,
            "OwnerGroup" => self.owner_group = value,
            "SourceComponent" => self.source_component = value,
            "CreationTime" => self.creation_time = value,
            "LastUpdate" => self.last_update = value,
            "JobID" => self.job_id = value,
            other => return Err(RequestError::UnknownAttribute(other.to_string())),
        }
        Ok(())
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for name in REQUEST_ATTRIBUTES {
            if let Ok(value) = self.get(name) {
                map.insert(name.to_string(), value.to_string());
            }
        }
        map
    }
}

/// Fixed sub-request attributes plus an open extension map for
/// forward-compatible fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SubRequestAttributes {
    pub status: String,
    #[serde(rename = "SubRequestID")]
    pub sub_request_id: String,
    pub operation: String,
    pub creation_time: String,
    pub catalogue: String,
    #[serde(rename = "TargetSE")]
    pub target_se: String,
    pub last_update: String,
    pub execution_order: i64,
    pub error: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SubRequestAttributes {
    fn default() -> Self {
        Self {
            status: STATUS_WAITING.to_string(),
            sub_request_id: String::new(),
            operation: String::new(),
            creation_time: String::new(),
            catalogue: String::new(),
            target_se: String::new(),
            last_update: String::new(),
            execution_order: 0,
            error: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl SubRequestAttributes {
    pub(crate) fn initiate_defaults() -> Self {
        Self {
            sub_request_id: make_guid(),
            ..Self::default()
        }
    }

    pub(crate) fn add_defaults() -> Self {
        Self {
            sub_request_id: make_guid(),
            creation_time: utc_timestamp(),
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, RequestError> {
        let value = match name {
            "Status" => Value::Text(self.status.clone()),
            "SubRequestID" => Value::Text(self.sub_request_id.clone()),
            "Operation" => Value::Text(self.operation.clone()),
            "CreationTime" => Value::Text(self.creation_time.clone()),
            "Catalogue" => Value::Text(self.catalogue.clone()),
            "TargetSE" => Value::Text(self.target_se.clone()),
            "LastUpdate" => Value::Text(self.last_update.clone()),
            "ExecutionOrder" => Value::Int(self.execution_order),
            "Error" => Value::Text(self.error.clone()),
            other => {
                return self
                    .extra
                    .get(other)
                    .cloned()
                    .ok_or_else(|| RequestError::UnknownAttribute(other.to_string()));
            }
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        match name {
            "Status" => self.status = value.to_string(),
            "SubRequestID" => self.sub_request_id = value.to_string(),
            "Operation" => self.operation = value.to_string(),
            "CreationTime" => self.creation_time = value.to_string(),
            "Catalogue" => self.catalogue = value.to_string(),
            "TargetSE" => self.target_se = value.to_string(),
            "LastUpdate" => self.last_update = value.to_string(),
            // Malformed ordering values fall back to the default rather than fail.
            "ExecutionOrder" => self.execution_order = value.as_int().unwrap_or(0),
            "Error" => self.error = value.to_string(),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    pub fn merge(&mut self, attributes: &BTreeMap<String, Value>) {
        for (name, value) in attributes {
            self.set(name, value.clone());
        }
    }

    pub fn to_value_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for name in SUB_REQUEST_ATTRIBUTES {
            if let Ok(value) = self.get(name) {
                map.insert(name.to_string(), value);
            }
        }
        for (name, value) in &self.extra {
            map.insert(name.clone(), value.clone());
        }
        map
    }
}

/// Open field map for one managed file; `LFN` is the identity key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRecord {
    pub fields: BTreeMap<String, Value>,
}

impl FileRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lfn(lfn: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.set("LFN", Value::Text(lfn.into()));
        record
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn lfn(&self) -> Option<&str> {
        self.fields.get("LFN").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.get("Status").and_then(Value::as_str)
    }

    pub(crate) fn homogenized(&self) -> FileRecord {
        let mut fields = BTreeMap::new();
        fields.insert("Status".to_string(), Value::Text(STATUS_WAITING.to_string()));
        fields.insert("FileID".to_string(), Value::Text(make_guid()));
        fields.insert("Attempt".to_string(), Value::Int(1));
        fields.extend(self.fields.clone());
        FileRecord { fields }
    }
}

/// Open field map for one dataset; `Handle` is the identity key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetRecord {
    pub fields: BTreeMap<String, Value>,
}

impl DatasetRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.set("Handle", Value::Text(handle.into()));
        record
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn handle(&self) -> Option<&str> {
        self.fields.get("Handle").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.get("Status").and_then(Value::as_str)
    }

    pub(crate) fn homogenized(&self) -> DatasetRecord {
        let mut fields = BTreeMap::new();
        fields.insert("Status".to_string(), Value::Text(STATUS_WAITING.to_string()));
        fields.extend(self.fields.clone());
        DatasetRecord { fields }
    }
}

/// One typed operation batch: attributes plus the ordered files and datasets
/// it acts on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubRequestRecord {
    pub attributes: SubRequestAttributes,
    pub files: Vec<FileRecord>,
    pub datasets: Vec<DatasetRecord>,
}

impl SubRequestRecord {
    pub fn to_spec(&self) -> SubRequestSpec {
        SubRequestSpec {
            attributes: self.attributes.to_value_map(),
            files: self.files.clone(),
            datasets: self.datasets.clone(),
        }
    }
}

/// Caller-supplied payload for adding a sub-request; the wire parser produces
/// the same shape so both construction paths share one defaulting pass.
#[derive(Debug, Clone, Default)]
pub struct SubRequestSpec {
    pub attributes: BTreeMap<String, Value>,
    pub files: Vec<FileRecord>,
    pub datasets: Vec<DatasetRecord>,
}

impl SubRequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn file(mut self, file: FileRecord) -> Self {
        self.files.push(file);
        self
    }

    pub fn dataset(mut self, dataset: DatasetRecord) -> Self {
        self.datasets.push(dataset);
        self
    }
}

pub(crate) fn make_guid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

pub(crate) fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn request_attributes_allow_list() {
        let mut attributes = RequestAttributes::default();
        attributes.set("RequestName", "test-request").unwrap();
        assert_eq!(attributes.get("RequestName").unwrap(), "test-request");

        let err = attributes.get("Color").unwrap_err();
        assert_matches!(err, RequestError::UnknownAttribute(_));
        let err = attributes.set("Color", "blue").unwrap_err();
        assert_matches!(err, RequestError::UnknownAttribute(_));
    }

    #[test]
    fn request_attributes_default_to_unknown() {
        let attributes = RequestAttributes::default();
        for name in REQUEST_ATTRIBUTES {
            assert_eq!(attributes.get(name).unwrap(), STATUS_UNKNOWN);
        }
    }

    #[test]
    fn sub_request_attributes_coerce_execution_order() {
        let mut attributes = SubRequestAttributes::default();
        attributes.set("ExecutionOrder", Value::Text("3".to_string()));
        assert_eq!(attributes.execution_order, 3);
        attributes.set("ExecutionOrder", Value::Text("not-a-number".to_string()));
        assert_eq!(attributes.execution_order, 0);
        attributes.set("ExecutionOrder", Value::Int(7));
        assert_eq!(attributes.execution_order, 7);
    }

    #[test]
    fn sub_request_attributes_keep_unknown_names() {
        let mut attributes = SubRequestAttributes::default();
        attributes.set("TransferProtocol", Value::Text("gsiftp".to_string()));
        assert_eq!(
            attributes.get("TransferProtocol").unwrap(),
            Value::Text("gsiftp".to_string())
        );
        assert_matches!(
            attributes.get("NeverSet"),
            Err(RequestError::UnknownAttribute(_))
        );
    }

    #[test]
    fn file_homogenization_keeps_supplied_fields() {
        let mut file = FileRecord::with_lfn("/grid/data/run42.raw");
        file.set("Status", Value::Text(STATUS_DONE.to_string()));
        let homogenized = file.homogenized();
        assert_eq!(homogenized.status(), Some(STATUS_DONE));
        assert_eq!(homogenized.lfn(), Some("/grid/data/run42.raw"));
        assert_eq!(homogenized.get("Attempt"), Some(&Value::Int(1)));
        assert!(homogenized.get("FileID").is_some());
    }

    #[test]
    fn value_leaf_rendering() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Text("abc".to_string()).to_string(), "abc");
    }

    #[test]
    fn guid_shape() {
        let guid = make_guid();
        assert_eq!(guid.len(), 36);
        assert_eq!(guid, guid.to_uppercase());
    }
}
