use std::collections::VecDeque;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::auth::{show_daily_status, validate_session};
use crate::browser::{Browser, Visibility};
use crate::dates::target_dates;
use crate::detail::{DetailExtractor, DetailOutcome};
use crate::fetch::DocumentFetcher;
use crate::listing::{crawl_listing, load_principal_page, Listing};
use crate::model::{CaseRecord, CrawlRequest};
use crate::portal::{LIST_ROWS, LOGOUT};
use crate::reconcile::{diff, refresh_pending, Reconciliation};
use crate::session::Session;
use crate::store::{CaseStore, DocumentStore};
use crate::{info_time, CrawlConfig, Error, Result};

/// Owns one browser session for the length of a request and sequences the
/// crawl over it.
pub struct Crawler<'a> {
    browser: &'a dyn Browser,
    config: &'a CrawlConfig,
    cases: &'a dyn CaseStore,
    documents: &'a dyn DocumentStore,
    fetcher: &'a dyn DocumentFetcher,
    /// Day the request is made on; drives date derivation and freshness.
    today: NaiveDate,
}

/// Result of the detail pass over one date's pending cases.
#[derive(Debug, Default)]
struct DetailPass {
    extracted: Vec<CaseRecord>,
    /// Pending cases that dropped out of the list before they were opened.
    remainder: Vec<CaseRecord>,
}

impl<'a> Crawler<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        config: &'a CrawlConfig,
        cases: &'a dyn CaseStore,
        documents: &'a dyn DocumentStore,
        fetcher: &'a dyn DocumentFetcher,
    ) -> Self {
        Self {
            browser,
            config,
            cases,
            documents,
            fetcher,
            today: Local::now().date_naive(),
        }
    }

    /// Crawls as if the request were made on `today`.
    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Crawls `request` and releases the browser whatever the outcome.
    pub async fn run(&self, request: &CrawlRequest) -> Result<Vec<CaseRecord>> {
        let res = self.crawl(request).await;

        if let Err(err) = &res {
            warn!(error = %err, kind = ?err.kind(), "crawl failed");
            crate::browser::capture(self.browser, &self.config.screenshot_path).await;
        }
        self.logout().await;
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "couldn't close browser");
        }
        res
    }

    /// Every requested date in order, sanitized for the caller.
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CaseRecord>> {
        request.validate()?;
        let dates = target_dates(request.fecha.as_deref(), self.today)?;

        let start_time = Local::now();
        info_time!("iniciando proceso carga estado diario usuario: {}", request.credentials.user);

        let mut results = Vec::new();
        for date in dates {
            let session = Session::new(self.browser, self.config, &request.credentials, date);
            let cases = self.crawl_date(&session, request.receptor).await?;
            info_time!(start_time, "{} causas para {}", cases.len(), date);
            results.extend(cases);
        }

        info_time!(start_time, "Finished crawl: {} causas", results.len());
        Ok(results.iter().map(CaseRecord::sanitized).collect())
    }

    async fn crawl_date(&self, session: &Session<'_>, receptor: bool) -> Result<Vec<CaseRecord>> {
        info!(date = %session.report_date, "iniciando carga principal");
        load_principal_page(session).await?;

        let listing = crawl_listing(session).await?;
        if listing.cases.is_empty() {
            return Ok(Vec::new());
        }

        let (listed, persisted) = self.record_listing(session, listing.cases).await?;
        let Reconciliation { reused, pending } =
            diff(listed, &persisted, self.today, receptor);
        info!(reused = reused.len(), pending = pending.len(), "reconciled with store");

        let DetailPass { extracted, remainder } = self.extract_pending(session, pending, receptor).await?;

        Ok(reused.into_iter().chain(extracted).chain(remainder).collect())
    }

    /// Upserts the listed rows, folding in what the store already knows about
    /// each case. Returns the merged rows and the stored copies found.
    async fn record_listing(
        &self,
        session: &Session<'_>,
        listed: Vec<CaseRecord>,
    ) -> Result<(Vec<CaseRecord>, Vec<CaseRecord>)> {
        let user = &session.credentials.user;
        let mut merged = Vec::with_capacity(listed.len());
        let mut persisted = Vec::new();

        for mut case in listed {
            if let Some(stored) = self.cases.find_by_identity(&case.identity).await? {
                case.uuid = stored.uuid;
                case.users = stored.users.clone();
                case.dossiers = stored.dossiers.clone();
                case.recipients = stored.recipients.clone();
                case.created_at = stored.created_at;
                case.updated_at = stored.updated_at;
                persisted.push(stored);
            }
            case.add_user(user);
            merged.push(case);
        }

        self.cases.bulk_upsert(&merged).await?;
        Ok((merged, persisted))
    }

    async fn extract_pending(
        &self,
        session: &Session<'_>,
        pending: Vec<CaseRecord>,
        receptor: bool,
    ) -> Result<DetailPass> {
        let extractor = DetailExtractor::new(*session, self.fetcher, self.documents, receptor);
        let total = pending.len();
        let mut queue: VecDeque<CaseRecord> = pending.into();
        let mut pass = DetailPass::default();
        let mut reloads = 0;

        while let Some(case) = queue.pop_front() {
            validate_session(session).await?;
            info!("procesando causa {} de {total}: {}", pass.extracted.len() + 1, case.identity);

            match extractor.extract(&case).await? {
                DetailOutcome::Done(record) => {
                    self.cases.bulk_upsert(std::slice::from_ref(&record)).await?;
                    pass.extracted.push(record);
                }
                DetailOutcome::Unavailable => {
                    return Err(Error::CaseUnavailable(case.identity.to_string()));
                }
                DetailOutcome::Expired => {
                    reloads += 1;
                    if reloads > self.config.max_reloads {
                        return Err(Error::Exhausted {
                            operation: "resume after expired link",
                            attempts: reloads,
                            source: Box::new(Error::LinkExpired),
                        });
                    }
                    warn!(case = %case.identity, reloads, "detail link expired, reloading list");
                    queue.push_front(case);

                    let listing = self.reload_listing(session).await?;
                    let (refreshed, gone) = refresh_pending(queue.drain(..), &listing.cases);
                    if !gone.is_empty() {
                        warn!(count = gone.len(), "cases left the list before extraction");
                    }
                    queue.extend(refreshed);
                    pass.remainder.extend(gone);
                }
            }
        }
        Ok(pass)
    }

    /// Reloads the page, re-applies the date filter and lists the cases
    /// again without touching the store.
    async fn reload_listing(&self, session: &Session<'_>) -> Result<Listing> {
        self.browser.reload().await?;
        show_daily_status(session).await?;
        session.wait(LIST_ROWS, Visibility::Attached).await?;
        crawl_listing(session).await
    }

    /// Best-effort portal logout; skipped when already logged out.
    async fn logout(&self) {
        let logged_out = match self.browser.current_url().await {
            Ok(url) => url == self.config.target_url,
            Err(_) => true,
        };
        if logged_out {
            return;
        }
        if let Err(err) = self.browser.evaluate(LOGOUT).await {
            warn!(error = %err, "couldn't log out");
        }
    }
}
