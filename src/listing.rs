use tracing::{debug, info};

use crate::auth::{show_daily_status, validate_session, SessionState};
use crate::browser::{self, Visibility};
use crate::model::CaseRecord;
use crate::parse::{self, parse_off_thread, ListTable};
use crate::portal::{self, HEADER, HEADER_ROW, LIST_BODY, LIST_LOADER, LIST_ROWS, PAGER, PAGER_TOTAL};
use crate::retry::retry;
use crate::session::Session;
use crate::{Error, Result};

/// Rows shorter than this are the pager, not a case.
const MIN_CASE_CELLS: usize = 5;

/// Every case the list shows for one report date.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub titles: Vec<String>,
    pub declared_total: usize,
    pub pages: usize,
    pub cases: Vec<CaseRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub declared_total: usize,
    pub pages: usize,
}

/// Opens the entry URL and gets to the filtered case list.
/// Bad credentials fail at once; anything else is retried.
pub async fn load_principal_page(session: &Session<'_>) -> Result<()> {
    let session = *session;
    retry(session.policy(), "load principal page", move |attempt| async move {
        info!(attempt, "loading PJUD principal page");
        if let Err(err) = load_once(&session).await {
            session.screenshot().await;
            return Err(err);
        }
        Ok(())
    })
    .await
}

async fn load_once(session: &Session<'_>) -> Result<()> {
    session.browser.goto(&session.config.target_url).await?;
    show_daily_status(session).await?;
    session.wait(LIST_ROWS, Visibility::Attached).await
}

/// Reads every page of the list and checks the haul against the total the
/// portal declares.
pub async fn crawl_listing(session: &Session<'_>) -> Result<Listing> {
    session.wait(LIST_ROWS, Visibility::Attached).await?;
    let first = read_table(session).await?;
    if first.row_count() <= 1 {
        info!(date = %session.report_date, "no cases listed");
        return Ok(Listing::default());
    }

    let titles = discover_column_titles(session).await?;
    let PageCount { declared_total, pages } = compute_page_count(session).await?;
    info!(pages, declared_total, "cases listed");

    let mut cases = Vec::with_capacity(declared_total);
    cases.extend(crawl_page(session, &titles, 1).await?);
    info!("pagina: 1 de: {pages}");

    let mut page = 1;
    while page < pages && cases.len() < declared_total {
        page += 1;
        cases.extend(page_forward(session, &titles, page).await?);
        info!("pagina: {page} de: {pages}");
    }

    verify_complete(declared_total, cases.len())?;
    Ok(Listing {
        titles,
        declared_total,
        pages,
        cases,
    })
}

/// Case-list column titles; see [`parse::header_titles`].
pub async fn discover_column_titles(session: &Session<'_>) -> Result<Vec<String>> {
    session.wait(HEADER_ROW, Visibility::Visible).await?;
    let html = browser::evaluate_text(session.browser, &portal::table_html(HEADER))
        .await?
        .ok_or_else(|| Error::MissingElement(HEADER.into()))?;
    parse_off_thread(html, parse::header_titles).await
}

pub async fn compute_page_count(session: &Session<'_>) -> Result<PageCount> {
    session.wait(PAGER_TOTAL, Visibility::Attached).await?;
    let table = read_table(session).await?;
    let declared_total = table
        .declared_total
        .ok_or_else(|| Error::MissingElement(PAGER_TOTAL.into()))?;
    Ok(PageCount {
        declared_total,
        pages: page_count(declared_total, session.config.page_size),
    })
}

/// The portal's own arithmetic: one page more than whole pages.
pub fn page_count(declared_total: usize, page_size: usize) -> usize {
    declared_total / page_size.max(1) + 1
}

pub fn verify_complete(declared: usize, extracted: usize) -> Result<()> {
    if declared != extracted {
        return Err(Error::ExtractionCountMismatch { declared, extracted });
    }
    Ok(())
}

/// Extracts the rows currently shown as page `page`.
pub async fn crawl_page(session: &Session<'_>, titles: &[String], page: usize) -> Result<Vec<CaseRecord>> {
    let session = *session;
    retry(session.policy(), "crawl page", move |attempt| async move {
        if attempt > 1 {
            session.screenshot().await;
            if validate_session(&session).await? == SessionState::Restored && page > 1 {
                debug!(page, "session restored, paging back");
                trigger_page(&session, page).await?;
            }
        }
        session.settle(LIST_LOADER).await;
        session.wait(LIST_ROWS, Visibility::Attached).await?;
        let table = read_table(&session).await?;
        rows_to_cases(&session, titles, table.rows)
    })
    .await
}

/// Moves the pager to `next` and extracts it once the pager agrees it is
/// showing that page.
pub async fn page_forward(session: &Session<'_>, titles: &[String], next: usize) -> Result<Vec<CaseRecord>> {
    trigger_page(session, next).await?;

    let session = *session;
    let page_size = session.config.page_size;
    retry(session.policy(), "verify page", move |attempt| async move {
        if attempt > 1 && validate_session(&session).await? == SessionState::Restored {
            trigger_page(&session, next).await?;
        }
        session.wait(LIST_ROWS, Visibility::Attached).await?;
        session.wait(PAGER_TOTAL, Visibility::Attached).await?;
        let table = read_table(&session).await?;
        if !page_is_loaded(&table, next, page_size) {
            return Err(Error::PageMismatch {
                expected: next,
                found: table.active_page,
            });
        }
        crawl_page(&session, titles, next).await
    })
    .await
}

/// Whether `table` can be trusted as page `expected`. Without an active
/// marker only a short table (the last page) is accepted.
pub fn page_is_loaded(table: &ListTable, expected: usize, page_size: usize) -> bool {
    if table.row_count() <= 1 {
        return false;
    }
    match table.active_page {
        Some(active) => active == expected,
        None => table.row_count() < page_size,
    }
}

async fn trigger_page(session: &Session<'_>, page: usize) -> Result<()> {
    session.wait(PAGER, Visibility::Attached).await?;
    session.browser.evaluate(&portal::go_to_page(page)).await?;
    session.pause().await;
    Ok(())
}

async fn read_table(session: &Session<'_>) -> Result<ListTable> {
    let html = browser::evaluate_text(session.browser, &portal::table_html(LIST_BODY))
        .await?
        .ok_or_else(|| Error::MissingElement(LIST_BODY.into()))?;
    parse_off_thread(html, parse::list_table).await
}

fn rows_to_cases(session: &Session<'_>, titles: &[String], mut rows: Vec<Vec<String>>) -> Result<Vec<CaseRecord>> {
    if rows.last().is_some_and(|row| row.len() < MIN_CASE_CELLS) {
        rows.pop();
    }
    rows.into_iter()
        .map(|cells| CaseRecord::from_row(titles, cells, session.report_date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize, active: Option<usize>) -> ListTable {
        ListTable {
            rows: vec![vec![String::new(); 5]; rows],
            declared_total: Some(40),
            active_page: active,
        }
    }

    #[test]
    fn page_count_is_whole_pages_plus_one() {
        assert_eq!(page_count(3, 15), 1);
        assert_eq!(page_count(17, 15), 2);
        assert_eq!(page_count(30, 15), 3);
    }

    #[test]
    fn page_is_trusted_only_when_pager_agrees() {
        assert!(page_is_loaded(&table(16, Some(2)), 2, 15));
        assert!(!page_is_loaded(&table(16, Some(1)), 2, 15));
    }

    #[test]
    fn missing_marker_is_only_accepted_on_a_short_table() {
        assert!(page_is_loaded(&table(4, None), 3, 15));
        assert!(!page_is_loaded(&table(16, None), 3, 15));
        assert!(!page_is_loaded(&table(1, None), 3, 15));
    }

    #[test]
    fn count_mismatch_is_an_error() {
        assert!(verify_complete(17, 17).is_ok());
        assert!(matches!(
            verify_complete(17, 15),
            Err(Error::ExtractionCountMismatch { declared: 17, extracted: 15 })
        ));
    }
}
