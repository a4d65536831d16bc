//! Fleet-wide scan for vhosts whose default_queue_type metadata holds the
//! literal string "undefined", and the corrective metadata update.
//!
//! The literal comes in through metadata-merge calls or definitions import
//! that serialize an absent value as text instead of omitting the field. We
//! do not fix that pathway here, only the stored symptom.

use crate::ctl::{self, VhostRecord};
use crate::report::{GREEN, NC, RED};

/// The corrupted value the broker ends up comparing queue arguments against.
pub const BROKEN_VALUE: &str = "undefined";

/// What broken vhosts are set to. Matches the pre-default-queue-type behavior
/// those vhosts were getting before the corruption.
pub const REPAIR_VALUE: &str = "classic";

/// A vhost needs repair only when the literal is stored. Absent metadata is a
/// valid state and must be left untouched.
pub fn needs_repair(record: &VhostRecord) -> bool {
    record.default_queue_type.as_deref() == Some(BROKEN_VALUE)
}

pub fn plan_repairs(records: &[VhostRecord]) -> Vec<&VhostRecord> {
    records.iter().filter(|r| needs_repair(r)).collect()
}

/// Scan every vhost and repair the broken ones. Returns how many were fixed.
/// Running it a second time finds nothing to fix, since [`REPAIR_VALUE`] no
/// longer matches the trigger condition.
pub async fn repair_all() -> anyhow::Result<usize> {
    println!("Checking vhosts for default_queue_type set to literal '{BROKEN_VALUE}'...");
    println!();

    let records = ctl::list_vhosts().await?;
    println!();

    let mut fixed = 0;
    for record in &records {
        if needs_repair(record) {
            println!(
                "{RED}Found problematic metadata: vhost '{}' has default_queue_type = '{BROKEN_VALUE}'{NC}",
                record.name
            );
            ctl::update_vhost_metadata(&record.name, REPAIR_VALUE).await?;
            fixed += 1;
        } else {
            let shown = record.default_queue_type.as_deref().unwrap_or("not_set");
            println!(
                "{GREEN}ok: vhost '{}' has default_queue_type = '{shown}'{NC}",
                record.name
            );
        }
    }

    println!();
    if fixed > 0 {
        println!("Fixed {fixed} vhost(s).");
    } else {
        println!("All vhosts are OK.");
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctl::parse_vhost_listing;

    #[test]
    fn plan_targets_only_the_literal() {
        let records = parse_vhost_listing(
            r#"[{"name":"v1","default_queue_type":"undefined"},{"name":"v2","default_queue_type":"classic"}]"#,
        )
        .unwrap();
        let plan = plan_repairs(&records);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "v1");
    }

    #[test]
    fn absent_metadata_is_left_alone() {
        let records = parse_vhost_listing(r#"[{"name":"v1"},{"name":"v2","default_queue_type":"quorum"}]"#).unwrap();
        assert!(plan_repairs(&records).is_empty());
    }

    #[test]
    fn repair_is_idempotent() {
        let mut records = parse_vhost_listing(
            r#"[{"name":"v1","default_queue_type":"undefined"},{"name":"v2","default_queue_type":"undefined"},{"name":"v3"}]"#,
        )
        .unwrap();
        let first: Vec<String> = plan_repairs(&records).iter().map(|r| r.name.clone()).collect();
        assert_eq!(first, ["v1", "v2"]);

        // what update_vhost_metadata leaves behind
        for record in &mut records {
            if needs_repair(record) {
                record.default_queue_type = Some(REPAIR_VALUE.to_string());
            }
        }
        assert!(plan_repairs(&records).is_empty());
        // untouched records unchanged
        assert_eq!(records[2].default_queue_type, None);
    }
}
