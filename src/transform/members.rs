use crate::api::model::{ApiMember, ApiMembersPage};
use crate::logging::{log, LogLevel};
use crate::model::member::{MemberRecord, MemberStatus, MemberTable};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlattenReport {
    pub fetched: usize,
    pub duplicates: usize,
    pub unknown_status: BTreeMap<String, usize>,
    pub invalid_open_rate: usize,
}

/// Flattens every page into a single member table. Rows whose status is not
/// one of the four list statuses are dropped, as are repeated ids.
pub fn build_member_table(pages: Vec<ApiMembersPage>) -> (MemberTable, FlattenReport) {
    let mut report = FlattenReport::default();
    let mut records = Vec::with_capacity(pages.iter().map(|p| p.members.len()).sum());

    for member in pages.into_iter().flat_map(|p| p.members) {
        report.fetched += 1;
        match flatten_member(member, &mut report) {
            Some(record) => records.push(record),
            None => continue,
        }
    }

    let (table, duplicates) = MemberTable::from_records(records);
    report.duplicates = duplicates;

    if report.duplicates > 0 {
        log(
            LogLevel::Warning,
            &format!(
                "Dropped {} duplicate member row(s); the list changed while paging.",
                report.duplicates
            ),
        );
    }
    if !report.unknown_status.is_empty() {
        let summary: Vec<String> = report
            .unknown_status
            .iter()
            .map(|(status, n)| format!("{}={}", status, n))
            .collect();
        log(
            LogLevel::Warning,
            &format!("Ignoring members with unsupported status: {}", summary.join(", ")),
        );
    }
    if report.invalid_open_rate > 0 {
        log(
            LogLevel::Warning,
            &format!(
                "{} member(s) reported an open rate outside [0, 1]; treated as undefined.",
                report.invalid_open_rate
            ),
        );
    }

    (table, report)
}

fn flatten_member(member: ApiMember, report: &mut FlattenReport) -> Option<MemberRecord> {
    let status = match member.status.parse::<MemberStatus>() {
        Ok(status) => status,
        Err(other) => {
            let key = if other.is_empty() { "<missing>".to_string() } else { other };
            *report.unknown_status.entry(key).or_default() += 1;
            return None;
        }
    };

    let avg_open_rate = match member.stats.avg_open_rate {
        Some(rate) if (0.0..=1.0).contains(&rate) => Some(rate),
        Some(_) => {
            report.invalid_open_rate += 1;
            None
        }
        None => None,
    };

    Some(MemberRecord {
        id: member.id,
        status,
        timestamp_opt: member.timestamp_opt,
        timestamp_signup: member.timestamp_signup,
        avg_open_rate,
        avg_click_rate: member.stats.avg_click_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> ApiMembersPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn flattens_pages_in_any_order() {
        let a = page(r#"{"members": [{"id": "1", "status": "subscribed", "stats": {"avg_open_rate": 0.3}}]}"#);
        let b = page(r#"{"members": [{"id": "2", "status": "pending", "stats": {}}]}"#);
        let (table, report) = build_member_table(vec![b, a]);
        assert_eq!(table.len(), 2);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.duplicates, 0);
        let ids: Vec<&str> = table.rows().iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"1") && ids.contains(&"2"));
    }

    #[test]
    fn drops_unknown_statuses_and_duplicates() {
        let p = page(
            r#"{"members": [
                {"id": "1", "status": "subscribed"},
                {"id": "2", "status": "archived"},
                {"id": "1", "status": "subscribed"},
                {"id": "3"}
            ]}"#,
        );
        let (table, report) = build_member_table(vec![p]);
        assert_eq!(table.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.unknown_status.get("archived"), Some(&1));
        assert_eq!(report.unknown_status.get("<missing>"), Some(&1));
    }

    #[test]
    fn out_of_range_open_rate_is_undefined() {
        let p = page(r#"{"members": [{"id": "1", "status": "subscribed", "stats": {"avg_open_rate": 42}}]}"#);
        let (table, report) = build_member_table(vec![p]);
        assert_eq!(table.rows()[0].avg_open_rate, None);
        assert_eq!(report.invalid_open_rate, 1);
    }
}
