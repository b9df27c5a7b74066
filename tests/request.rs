use std::collections::{BTreeMap, HashSet};

use assert_matches::assert_matches;

use datareq::domain::{
    DatasetRecord, FileRecord, STATUS_NEW, STATUS_UNKNOWN, SubRequestSpec, Value,
};
use datareq::error::RequestError;
use datareq::identity::{Identity, StaticIdentitySource};
use datareq::request::Request;

fn transfer_spec() -> SubRequestSpec {
    SubRequestSpec::new()
        .attribute("Operation", "replicateAndRegister")
        .attribute("TargetSE", "CERN-disk")
        .attribute("Catalogue", "FileCatalog")
        .attribute("ExecutionOrder", 1i64)
        .attribute("TransferProtocol", "gsiftp")
        .file(FileRecord::with_lfn("/grid/prod/run42/raw_0001.dat"))
        .file(FileRecord::with_lfn("/grid/prod/run42/raw_0002.dat"))
        .dataset(DatasetRecord::with_handle("prod/run42/raw"))
}

#[test]
fn new_request_defaults() {
    let request = Request::new();
    assert_eq!(request.attribute("Status").unwrap(), STATUS_NEW);
    assert_eq!(request.attribute("Owner").unwrap(), STATUS_UNKNOWN);
    assert!(!request.attribute("CreationTime").unwrap().is_empty());
    assert!(request.sub_request_types().is_empty());
}

#[test]
fn identity_stamps_owner_fields() {
    let source = StaticIdentitySource::new(Identity {
        owner: "/O=Grid/CN=Data Manager".to_string(),
        group: Some("prod".to_string()),
        setup: Some("Production".to_string()),
    });
    let request = Request::with_identity(&source);
    assert_eq!(request.attribute("Owner").unwrap(), "/O=Grid/CN=Data Manager");
    assert_eq!(request.attribute("OwnerGroup").unwrap(), "prod");
    assert_eq!(request.attribute("Setup").unwrap(), "Production");
}

#[test]
fn round_trip_preserves_every_level() {
    let mut request = Request::new();
    request.set_attribute("RequestName", "prod-000123").unwrap();
    request.set_attribute("RequestID", "123").unwrap();
    request.set_attribute("JobID", "9042").unwrap();
    request.add_sub_request("transfer", transfer_spec());
    request.add_sub_request(
        "removal",
        SubRequestSpec::new()
            .attribute("Operation", "physicalRemoval")
            .file(FileRecord::with_lfn("/grid/prod/run41/old.dat")),
    );

    let text = request.to_wire(None).unwrap();
    let parsed = Request::parse(&text).unwrap();

    assert_eq!(parsed.attributes(), request.attributes());
    assert_eq!(parsed.sub_request_types(), request.sub_request_types());
    for rtype in request.sub_request_types() {
        assert_eq!(
            parsed.num_sub_requests(&rtype),
            request.num_sub_requests(&rtype)
        );
        for ind in 0..request.num_sub_requests(&rtype) {
            assert_eq!(
                parsed.sub_request(ind, &rtype).unwrap(),
                request.sub_request(ind, &rtype).unwrap()
            );
        }
    }
}

#[test]
fn sub_request_ids_are_unique() {
    let mut request = Request::new();
    let mut seen = HashSet::new();
    for _ in 0..16 {
        request.add_sub_request("transfer", SubRequestSpec::new());
        request.initiate_sub_request("register");
    }
    for rtype in request.sub_request_types() {
        for ind in 0..request.num_sub_requests(&rtype) {
            let id = request
                .sub_request(ind, &rtype)
                .unwrap()
                .attributes
                .sub_request_id
                .clone();
            assert!(!id.is_empty());
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 32);
}

#[test]
fn set_files_accumulates() {
    let mut request = Request::new();
    request.initiate_sub_request("removal");
    request
        .set_sub_request_files(0, "removal", vec![FileRecord::with_lfn("/grid/a")])
        .unwrap();
    request
        .set_sub_request_files(
            0,
            "removal",
            vec![
                FileRecord::with_lfn("/grid/b"),
                FileRecord::with_lfn("/grid/c"),
            ],
        )
        .unwrap();
    assert_eq!(request.num_sub_request_files(0, "removal").unwrap(), 3);
}

#[test]
fn merge_is_additive_and_leaves_source_intact() {
    let mut absorbed = Request::new();
    absorbed.add_sub_request(
        "removal",
        SubRequestSpec::new().attribute("Operation", "physicalRemoval"),
    );
    let absorbed_id = absorbed
        .sub_request(0, "removal")
        .unwrap()
        .attributes
        .sub_request_id
        .clone();

    let mut request = Request::new();
    request.add_sub_request("removal", SubRequestSpec::new());
    request.merge(&absorbed);

    assert_eq!(request.num_sub_requests("removal"), 2);
    assert_eq!(
        request
            .sub_request(1, "removal")
            .unwrap()
            .attributes
            .sub_request_id,
        absorbed_id
    );
    assert_eq!(absorbed.num_sub_requests("removal"), 1);
}

#[test]
fn bounds_errors_through_the_facade() {
    let mut request = Request::new();
    request.add_sub_request("transfer", SubRequestSpec::new());
    request.add_sub_request("transfer", SubRequestSpec::new());

    assert_matches!(
        request.sub_request(5, "transfer"),
        Err(RequestError::IndexOutOfRange { index: 5, .. })
    );
    assert_matches!(
        request.sub_request(0, "bogus"),
        Err(RequestError::UnknownType(_))
    );
    assert_matches!(
        request.is_sub_request_empty(2, "transfer"),
        Err(RequestError::IndexOutOfRange { .. })
    );
}

#[test]
fn request_attribute_allow_list() {
    let mut request = Request::new();
    let mut updates = BTreeMap::new();
    updates.insert("SourceComponent".to_string(), "TransferAgent".to_string());
    request.set_attributes(&updates).unwrap();
    assert_eq!(
        request.attribute("SourceComponent").unwrap(),
        "TransferAgent"
    );

    let mut bad = BTreeMap::new();
    bad.insert("Color".to_string(), "blue".to_string());
    assert_matches!(
        request.set_attributes(&bad),
        Err(RequestError::UnknownAttribute(_))
    );
}

#[test]
fn arbitrary_sub_request_attributes_survive_round_trip() {
    let mut request = Request::new();
    request.add_sub_request("transfer", transfer_spec());
    assert_eq!(
        request
            .sub_request_attribute(0, "transfer", "TransferProtocol")
            .unwrap(),
        Value::Text("gsiftp".to_string())
    );

    let text = request.to_wire(None).unwrap();
    let parsed = Request::parse(&text).unwrap();
    assert_eq!(
        parsed
            .sub_request_attribute(0, "transfer", "TransferProtocol")
            .unwrap(),
        Value::Text("gsiftp".to_string())
    );
}

#[test]
fn file_status_flow_drives_aggregation() {
    let mut request = Request::new();
    request.add_sub_request("transfer", transfer_spec());
    assert!(!request.is_empty().unwrap());
    assert!(!request.is_done().unwrap());

    request
        .set_file_field(
            0,
            "transfer",
            "/grid/prod/run42/raw_0001.dat",
            "Status",
            Value::from("Done"),
        )
        .unwrap();
    request
        .set_file_field(
            0,
            "transfer",
            "/grid/prod/run42/raw_0002.dat",
            "Status",
            Value::from("Failed"),
        )
        .unwrap();
    // The dataset is still Waiting, so pending work remains.
    assert!(!request.is_empty().unwrap());
    assert!(!request.is_done().unwrap());

    request
        .set_dataset_field(
            0,
            "transfer",
            "prod/run42/raw",
            "Status",
            Value::from("Done"),
        )
        .unwrap();
    assert!(request.is_empty().unwrap());
    assert!(request.is_done().unwrap());
}
