use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    DatasetRecord, FileRecord, SubRequestAttributes, SubRequestRecord, SubRequestSpec, Value,
};
use crate::error::RequestError;

/// Owns every sub-request of a request, grouped by type name and ordered by
/// insertion within each type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubRequestStore {
    by_type: BTreeMap<String, Vec<SubRequestRecord>>,
}

impl SubRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initiate(&mut self, rtype: &str) -> usize {
        let records = self.by_type.entry(rtype.to_string()).or_default();
        records.push(SubRequestRecord {
            attributes: SubRequestAttributes::initiate_defaults(),
            files: Vec::new(),
            datasets: Vec::new(),
        });
        records.len() - 1
    }

    pub fn add(&mut self, rtype: &str, spec: SubRequestSpec) -> usize {
        let index = self.initiate(rtype);
        let mut attributes = SubRequestAttributes::add_defaults();
        attributes.merge(&spec.attributes);
        if let Some(records) = self.by_type.get_mut(rtype)
            && let Some(record) = records.get_mut(index)
        {
            record.attributes = attributes;
            record
                .files
                .extend(spec.files.iter().map(FileRecord::homogenized));
            record
                .datasets
                .extend(spec.datasets.iter().map(DatasetRecord::homogenized));
        }
        index
    }

    pub fn get(&self, ind: usize, rtype: &str) -> Result<&SubRequestRecord, RequestError> {
        self.records(rtype)?
            .get(ind)
            .ok_or_else(|| out_of_range(ind, rtype))
    }

    pub fn remove(&mut self, ind: usize, rtype: &str) -> Result<SubRequestRecord, RequestError> {
        let records = self
            .by_type
            .get_mut(rtype)
            .ok_or_else(|| RequestError::UnknownType(rtype.to_string()))?;
        if ind >= records.len() {
            return Err(out_of_range(ind, rtype));
        }
        Ok(records.remove(ind))
    }

    pub fn count(&self, rtype: &str) -> usize {
        self.by_type.get(rtype).map(Vec::len).unwrap_or(0)
    }

    pub fn types(&self) -> Vec<String> {
        self.by_type.keys().cloned().collect()
    }

    pub fn attributes(
        &self,
        ind: usize,
        rtype: &str,
    ) -> Result<&SubRequestAttributes, RequestError> {
        Ok(&self.get(ind, rtype)?.attributes)
    }

    pub fn set_attributes(
        &mut self,
        ind: usize,
        rtype: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<(), RequestError> {
        self.record_mut(ind, rtype)?.attributes.merge(attributes);
        Ok(())
    }

    pub fn attribute(&self, ind: usize, rtype: &str, name: &str) -> Result<Value, RequestError> {
        self.get(ind, rtype)?.attributes.get(name)
    }

    pub fn set_attribute(
        &mut self,
        ind: usize,
        rtype: &str,
        name: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        self.record_mut(ind, rtype)?.attributes.set(name, value);
        Ok(())
    }

    pub fn set_status(&mut self, ind: usize, rtype: &str, status: &str) -> Result<(), RequestError> {
        self.record_mut(ind, rtype)?.attributes.status = status.to_string();
        Ok(())
    }

    pub fn files(&self, ind: usize, rtype: &str) -> Result<&[FileRecord], RequestError> {
        Ok(&self.get(ind, rtype)?.files)
    }

    pub fn file_count(&self, ind: usize, rtype: &str) -> Result<usize, RequestError> {
        Ok(self.get(ind, rtype)?.files.len())
    }

    /// Appends, never replaces: repeated calls accumulate files.
    pub fn set_files(
        &mut self,
        ind: usize,
        rtype: &str,
        files: Vec<FileRecord>,
    ) -> Result<(), RequestError> {
        self.record_mut(ind, rtype)?.files.extend(files);
        Ok(())
    }

    pub fn file_field(
        &self,
        ind: usize,
        rtype: &str,
        lfn: &str,
        field: &str,
    ) -> Result<Value, RequestError> {
        let file = self
            .get(ind, rtype)?
            .files
            .iter()
            .find(|file| file.lfn() == Some(lfn))
            .ok_or_else(|| RequestError::FileNotFound(lfn.to_string()))?;
        file.get(field)
            .cloned()
            .ok_or_else(|| RequestError::FieldNotFound(field.to_string()))
    }

    pub fn set_file_field(
        &mut self,
        ind: usize,
        rtype: &str,
        lfn: &str,
        field: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        let file = self
            .record_mut(ind, rtype)?
            .files
            .iter_mut()
            .find(|file| file.lfn() == Some(lfn))
            .ok_or_else(|| RequestError::FileNotFound(lfn.to_string()))?;
        file.set(field, value);
        Ok(())
    }

    pub fn datasets(&self, ind: usize, rtype: &str) -> Result<&[DatasetRecord], RequestError> {
        Ok(&self.get(ind, rtype)?.datasets)
    }

    pub fn dataset_count(&self, ind: usize, rtype: &str) -> Result<usize, RequestError> {
        Ok(self.get(ind, rtype)?.datasets.len())
    }

    /// Appends, never replaces: repeated calls accumulate datasets.
    pub fn set_datasets(
        &mut self,
        ind: usize,
        rtype: &str,
        datasets: Vec<DatasetRecord>,
    ) -> Result<(), RequestError> {
        self.record_mut(ind, rtype)?.datasets.extend(datasets);
        Ok(())
    }

    pub fn dataset_field(
        &self,
        ind: usize,
        rtype: &str,
        handle: &str,
        field: &str,
    ) -> Result<Value, RequestError> {
        let dataset = self
            .get(ind, rtype)?
            .datasets
            .iter()
            .find(|dataset| dataset.handle() == Some(handle))
            .ok_or_else(|| RequestError::DatasetNotFound(handle.to_string()))?;
        dataset
            .get(field)
            .cloned()
            .ok_or_else(|| RequestError::FieldNotFound(field.to_string()))
    }

    pub fn set_dataset_field(
        &mut self,
        ind: usize,
        rtype: &str,
        handle: &str,
        field: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        let dataset = self
            .record_mut(ind, rtype)?
            .datasets
            .iter_mut()
            .find(|dataset| dataset.handle() == Some(handle))
            .ok_or_else(|| RequestError::DatasetNotFound(handle.to_string()))?;
        dataset.set(field, value);
        Ok(())
    }

    /// Absorbs every sub-request of `other`, re-homogenized through the same
    /// defaulting pass as a fresh `add`.
    pub fn merge(&mut self, other: &SubRequestStore) {
        for (rtype, records) in &other.by_type {
            for record in records {
                self.add(rtype, record.to_spec());
            }
        }
    }

    fn records(&self, rtype: &str) -> Result<&Vec<SubRequestRecord>, RequestError> {
        self.by_type
            .get(rtype)
            .ok_or_else(|| RequestError::UnknownType(rtype.to_string()))
    }

    fn record_mut(
        &mut self,
        ind: usize,
        rtype: &str,
    ) -> Result<&mut SubRequestRecord, RequestError> {
        self.by_type
            .get_mut(rtype)
            .ok_or_else(|| RequestError::UnknownType(rtype.to_string()))?
            .get_mut(ind)
            .ok_or_else(|| out_of_range(ind, rtype))
    }
}

fn out_of_range(ind: usize, rtype: &str) -> RequestError {
    RequestError::IndexOutOfRange {
        rtype: rtype.to_string(),
        index: ind,
    }
}
