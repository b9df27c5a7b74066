use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Serialize;

use crate::digest;
use crate::domain::{
    DatasetRecord, FileRecord, RequestAttributes, STATUS_NEW, SubRequestAttributes,
    SubRequestRecord, SubRequestSpec, Value, utc_timestamp,
};
use crate::error::RequestError;
use crate::identity::IdentitySource;
use crate::status;
use crate::store::SubRequestStore;
use crate::wire;

/// The work item handed between data-management agents: flat attributes plus
/// every typed sub-request, with serialization and status roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    attributes: RequestAttributes,
    sub_requests: SubRequestStore,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        let attributes = RequestAttributes {
            status: STATUS_NEW.to_string(),
            creation_time: utc_timestamp(),
            ..RequestAttributes::default()
        };
        Self {
            attributes,
            sub_requests: SubRequestStore::new(),
        }
    }

    pub fn with_identity(source: &dyn IdentitySource) -> Self {
        let mut request = Self::new();
        if let Some(identity) = source.resolve() {
            request.attributes.owner = identity.owner;
            if let Some(group) = identity.group {
                request.attributes.owner_group = group;
            }
            if let Some(setup) = identity.setup {
                request.attributes.setup = setup;
            }
        }
        request
    }

    /// Reconstructs a request from wire text, or from the file `source` names
    /// when such a file exists.
    pub fn parse(source: &str) -> Result<Self, RequestError> {
        let (attributes, sub_requests) = wire::load(source)?;
        Ok(Self {
            attributes,
            sub_requests,
        })
    }

    pub fn attribute(&self, name: &str) -> Result<String, RequestError> {
        self.attributes.get(name).map(str::to_string)
    }

    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), RequestError> {
        self.attributes.set(name, value)
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes.to_map()
    }

    pub fn set_attributes(&mut self, map: &BTreeMap<String, String>) -> Result<(), RequestError> {
        for (name, value) in map {
            self.attributes.set(name, value.clone())?;
        }
        Ok(())
    }

    pub fn set_last_update_now(&mut self) {
        self.attributes.last_update = utc_timestamp();
    }

    pub fn initiate_sub_request(&mut self, rtype: &str) -> usize {
        self.sub_requests.initiate(rtype)
    }

    pub fn add_sub_request(&mut self, rtype: &str, spec: SubRequestSpec) -> usize {
        self.sub_requests.add(rtype, spec)
    }

    pub fn sub_request(&self, ind: usize, rtype: &str) -> Result<&SubRequestRecord, RequestError> {
        self.sub_requests.get(ind, rtype)
    }

    pub fn remove_sub_request(
        &mut self,
        ind: usize,
        rtype: &str,
    ) -> Result<SubRequestRecord, RequestError> {
        self.sub_requests.remove(ind, rtype)
    }

    pub fn sub_request_types(&self) -> Vec<String> {
        self.sub_requests.types()
    }

    pub fn num_sub_requests(&self, rtype: &str) -> usize {
        self.sub_requests.count(rtype)
    }

    pub fn sub_request_attributes(
        &self,
        ind: usize,
        rtype: &str,
    ) -> Result<&SubRequestAttributes, RequestError> {
        self.sub_requests.attributes(ind, rtype)
    }

    pub fn set_sub_request_attributes(
        &mut self,
        ind: usize,
        rtype: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_attributes(ind, rtype, attributes)
    }

    pub fn sub_request_attribute(
        &self,
        ind: usize,
        rtype: &str,
        name: &str,
    ) -> Result<Value, RequestError> {
        self.sub_requests.attribute(ind, rtype, name)
    }

    pub fn set_sub_request_attribute(
        &mut self,
        ind: usize,
        rtype: &str,
        name: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_attribute(ind, rtype, name, value)
    }

    pub fn set_sub_request_status(
        &mut self,
        ind: usize,
        rtype: &str,
        status: &str,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_status(ind, rtype, status)
    }

    pub fn sub_request_files(
        &self,
        ind: usize,
        rtype: &str,
    ) -> Result<&[FileRecord], RequestError> {
        self.sub_requests.files(ind, rtype)
    }

    pub fn num_sub_request_files(&self, ind: usize, rtype: &str) -> Result<usize, RequestError> {
        self.sub_requests.file_count(ind, rtype)
    }

    pub fn set_sub_request_files(
        &mut self,
        ind: usize,
        rtype: &str,
        files: Vec<FileRecord>,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_files(ind, rtype, files)
    }

    pub fn file_field(
        &self,
        ind: usize,
        rtype: &str,
        lfn: &str,
        field: &str,
    ) -> Result<Value, RequestError> {
        self.sub_requests.file_field(ind, rtype, lfn, field)
    }

    pub fn set_file_field(
        &mut self,
        ind: usize,
        rtype: &str,
        lfn: &str,
        field: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_file_field(ind, rtype, lfn, field, value)
    }

    pub fn sub_request_datasets(
        &self,
        ind: usize,
        rtype: &str,
    ) -> Result<&[DatasetRecord], RequestError> {
        self.sub_requests.datasets(ind, rtype)
    }

    pub fn num_sub_request_datasets(&self, ind: usize, rtype: &str) -> Result<usize, RequestError> {
        self.sub_requests.dataset_count(ind, rtype)
    }

    pub fn set_sub_request_datasets(
        &mut self,
        ind: usize,
        rtype: &str,
        datasets: Vec<DatasetRecord>,
    ) -> Result<(), RequestError> {
        self.sub_requests.set_datasets(ind, rtype, datasets)
    }

    pub fn dataset_field(
        &self,
        ind: usize,
        rtype: &str,
        handle: &str,
        field: &str,
    ) -> Result<Value, RequestError> {
        self.sub_requests.dataset_field(ind, rtype, handle, field)
    }

    pub fn set_dataset_field(
        &mut self,
        ind: usize,
        rtype: &str,
        handle: &str,
        field: &str,
        value: Value,
    ) -> Result<(), RequestError> {
        self.sub_requests
            .set_dataset_field(ind, rtype, handle, field, value)
    }

    pub fn is_sub_request_empty(&self, ind: usize, rtype: &str) -> Result<bool, RequestError> {
        status::is_sub_request_empty(&self.sub_requests, ind, rtype)
    }

    pub fn is_type_empty(&self, rtype: &str) -> Result<bool, RequestError> {
        status::is_type_empty(&self.sub_requests, rtype)
    }

    pub fn is_empty(&self) -> Result<bool, RequestError> {
        status::is_request_empty(&self.sub_requests)
    }

    pub fn is_sub_request_done(&self, ind: usize, rtype: &str) -> Result<bool, RequestError> {
        status::is_sub_request_done(&self.sub_requests, ind, rtype)
    }

    pub fn is_type_done(&self, rtype: &str) -> Result<bool, RequestError> {
        status::is_type_done(&self.sub_requests, rtype)
    }

    pub fn is_done(&self) -> Result<bool, RequestError> {
        status::is_request_done(&self.sub_requests)
    }

    /// Absorbs every sub-request of `other`; `other` is left unmodified.
    pub fn merge(&mut self, other: &Request) {
        self.sub_requests.merge(&other.sub_requests);
    }

    pub fn to_wire(&self, selection: Option<&str>) -> Result<String, RequestError> {
        wire::serialize(&self.attributes, &self.sub_requests, selection)
    }

    pub fn write_to_path(&self, path: &Utf8Path) -> Result<(), RequestError> {
        let text = self.to_wire(None)?;
        wire::write_to_path(&text, path)
    }

    pub fn digest(&self) -> String {
        digest::digest(&self.sub_requests)
    }

    pub fn sub_requests(&self) -> &SubRequestStore {
        &self.sub_requests
    }
}
