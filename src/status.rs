//! Aggregation predicates over a [`SubRequestStore`].
//!
//! `empty` means "no Waiting items remain"; `done` means "fully resolved".
//! The two are deliberately not complements: a sub-request whose last file
//! just failed is empty of pending work without being done.

use tracing::warn;

use crate::domain::{STATUS_DONE, STATUS_FAILED, STATUS_WAITING};
use crate::error::RequestError;
use crate::store::SubRequestStore;

pub fn is_sub_request_empty(
    store: &SubRequestStore,
    ind: usize,
    rtype: &str,
) -> Result<bool, RequestError> {
    let record = store.get(ind, rtype)?;
    if record.attributes.status == STATUS_DONE {
        return Ok(true);
    }
    for file in &record.files {
        match file.status() {
            Some(status) if status == STATUS_WAITING => return Ok(false),
            Some(_) => {}
            None => warn!(
                rtype,
                index = ind,
                lfn = file.lfn().unwrap_or_default(),
                "file record has no Status field"
            ),
        }
    }
    for dataset in &record.datasets {
        match dataset.status() {
            Some(status) if status == STATUS_WAITING => return Ok(false),
            Some(_) => {}
            None => warn!(
                rtype,
                index = ind,
                handle = dataset.handle().unwrap_or_default(),
                "dataset record has no Status field"
            ),
        }
    }
    Ok(true)
}

pub fn is_type_empty(store: &SubRequestStore, rtype: &str) -> Result<bool, RequestError> {
    for ind in 0..store.count(rtype) {
        if !is_sub_request_empty(store, ind, rtype)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn is_request_empty(store: &SubRequestStore) -> Result<bool, RequestError> {
    for rtype in store.types() {
        if !is_type_empty(store, &rtype)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn is_sub_request_done(
    store: &SubRequestStore,
    ind: usize,
    rtype: &str,
) -> Result<bool, RequestError> {
    let record = store.get(ind, rtype)?;
    if record.attributes.status == STATUS_DONE {
        return Ok(true);
    }
    for file in &record.files {
        match file.status() {
            Some(status) if status == STATUS_DONE || status == STATUS_FAILED => {}
            Some(_) => return Ok(false),
            None => {
                warn!(
                    rtype,
                    index = ind,
                    lfn = file.lfn().unwrap_or_default(),
                    "file record has no Status field"
                );
                return Ok(false);
            }
        }
    }
    for dataset in &record.datasets {
        match dataset.status() {
            Some(status) if status == STATUS_DONE => {}
            Some(_) => return Ok(false),
            None => {
                warn!(
                    rtype,
                    index = ind,
                    handle = dataset.handle().unwrap_or_default(),
                    "dataset record has no Status field"
                );
                return Ok(false);
            }
        }
    }
    // A record that never carried any content cannot be resolved by its
    // files; only an explicit Done status finishes it.
    Ok(!(record.files.is_empty() && record.datasets.is_empty()))
}

pub fn is_type_done(store: &SubRequestStore, rtype: &str) -> Result<bool, RequestError> {
    for ind in 0..store.count(rtype) {
        if !is_sub_request_done(store, ind, rtype)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn is_request_done(store: &SubRequestStore) -> Result<bool, RequestError> {
    for rtype in store.types() {
        if !is_type_done(store, &rtype)? {
            return Ok(false);
        }
    }
    Ok(true)
}
