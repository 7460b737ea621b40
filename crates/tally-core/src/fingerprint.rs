use crate::reconcile::table::JobTables;
use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Content digest of a job's tables. Two runs that record the same builds
/// and statuses produce the same fingerprint.
pub fn table_fingerprint(tables: &JobTables) -> String {
    let mut parts = Vec::new();

    let builds = tables.cases.builds_newest_first();
    parts.push(format!(
        "builds={}",
        builds
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    ));
    for row in tables.cases.rows() {
        let results = builds
            .iter()
            .map(|b| row.status(*b).as_str())
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("case={}:{}", row.case_id, results));
    }
    for b in tables.builds.rows() {
        parts.push(format!(
            "build={}|{}|{}|{}|{}|{}|{}|{}|{}",
            b.build, b.date, b.release, b.enclosure, b.rack, b.pass, b.fail, b.skip, b.passrate
        ));
    }

    sha256_hex(&parts.join("\n"))
}
