//! Deciding which listed cases need their detail modal opened.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{CaseRecord, Identity};

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Already refreshed today; stored detail is carried over.
    pub reused: Vec<CaseRecord>,
    /// Need a full detail extraction.
    pub pending: Vec<CaseRecord>,
}

/// Splits `scraped` into reused and pending cases.
///
/// With `recipient_mode` off, a case whose stored copy was refreshed on
/// `today` keeps that copy's dossiers and recipients. With it on, every case
/// is pending. Anything not in the reusable set is pending, whether it was
/// never stored or its stored copy is stale.
pub fn diff(
    scraped: Vec<CaseRecord>,
    persisted: &[CaseRecord],
    today: NaiveDate,
    recipient_mode: bool,
) -> Reconciliation {
    let reusable: BTreeMap<&Identity, &CaseRecord> = if recipient_mode {
        BTreeMap::new()
    } else {
        persisted
            .iter()
            .filter(|stored| refreshed_on(stored, today))
            .map(|stored| (&stored.identity, stored))
            .collect()
    };

    let mut out = Reconciliation::default();
    for case in scraped {
        match reusable.get(&case.identity) {
            Some(stored) => out.reused.push(carry_over(case, stored)),
            None => out.pending.push(case),
        }
    }
    out
}

fn refreshed_on(stored: &CaseRecord, today: NaiveDate) -> bool {
    stored
        .updated_at
        .is_some_and(|at| at.date_naive() == today)
}

fn carry_over(mut case: CaseRecord, stored: &CaseRecord) -> CaseRecord {
    case.uuid = stored.uuid;
    case.dossiers = stored.dossiers.clone();
    case.recipients = stored.recipients.clone();
    case.created_at = stored.created_at;
    case.updated_at = stored.updated_at;
    for user in &stored.users {
        case.add_user(user);
    }
    case
}

/// After a reload, gives each still-pending case the action descriptor from
/// the fresh listing. Cases the listing no longer shows are returned apart.
pub fn refresh_pending(
    pending: impl IntoIterator<Item = CaseRecord>,
    fresh: &[CaseRecord],
) -> (Vec<CaseRecord>, Vec<CaseRecord>) {
    let by_identity: BTreeMap<&Identity, &CaseRecord> =
        fresh.iter().map(|case| (&case.identity, case)).collect();

    let mut refreshed = Vec::new();
    let mut gone = Vec::new();
    for mut case in pending {
        match by_identity.get(&case.identity) {
            Some(listed) => {
                case.detail = listed.detail.clone();
                refreshed.push(case);
            }
            None => gone.push(case),
        }
    }
    (refreshed, gone)
}
