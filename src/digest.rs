use crate::store::SubRequestStore;

/// One colon-joined line per sub-request, in type-then-insertion order:
/// `type:operation:status:order[:target_se][:catalogue][:first_file]`.
pub fn digest(store: &SubRequestStore) -> String {
    let mut lines = Vec::new();
    for rtype in store.types() {
        for ind in 0..store.count(&rtype) {
            let Ok(record) = store.get(ind, &rtype) else {
                continue;
            };
            let attributes = &record.attributes;
            let mut parts = vec![
                rtype.clone(),
                attributes.operation.clone(),
                attributes.status.clone(),
                attributes.execution_order.to_string(),
            ];
            if !attributes.target_se.is_empty() {
                parts.push(attributes.target_se.clone());
            }
            if !attributes.catalogue.is_empty() {
                parts.push(attributes.catalogue.clone());
            }
            if let Some(first) = record.files.first() {
                let mut name = base_name(first.lfn().unwrap_or_default()).to_string();
                if record.files.len() > 1 {
                    name.push_str(&format!(",...<{} files>", record.files.len()));
                }
                parts.push(name);
            }
            lines.push(parts.join(":"));
        }
    }
    lines.join("\n")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileRecord, SubRequestSpec};

    #[test]
    fn digest_line_field_order() {
        let mut store = SubRequestStore::new();
        store.add(
            "transfer",
            SubRequestSpec::new()
                .attribute("Operation", "replicate")
                .attribute("TargetSE", "SE1")
                .file(FileRecord::with_lfn("/a/b/c.dat")),
        );
        assert_eq!(digest(&store), "transfer:replicate:Waiting:0:SE1:c.dat");
    }

    #[test]
    fn digest_marks_multi_file_sub_requests() {
        let mut store = SubRequestStore::new();
        store.add(
            "removal",
            SubRequestSpec::new()
                .attribute("Operation", "physicalRemoval")
                .attribute("Catalogue", "FileCatalog")
                .file(FileRecord::with_lfn("/grid/data/one.raw"))
                .file(FileRecord::with_lfn("/grid/data/two.raw"))
                .file(FileRecord::with_lfn("/grid/data/three.raw")),
        );
        assert_eq!(
            digest(&store),
            "removal:physicalRemoval:Waiting:0:FileCatalog:one.raw,...<3 files>"
        );
    }

    #[test]
    fn digest_joins_lines_per_sub_request() {
        let mut store = SubRequestStore::new();
        store.add(
            "register",
            SubRequestSpec::new().attribute("Operation", "registerFile"),
        );
        store.add(
            "register",
            SubRequestSpec::new().attribute("Operation", "registerReplica"),
        );
        assert_eq!(
            digest(&store),
            "register:registerFile:Waiting:0\nregister:registerReplica:Waiting:0"
        );
    }
}
