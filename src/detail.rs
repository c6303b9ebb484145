//! Per-case detail modal: open, recipients, dossiers, close.

use std::collections::BTreeMap;

use chrono::Local;
use reqwest::Url;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::validate_session;
use crate::browser::{self, Visibility};
use crate::fetch::DocumentFetcher;
use crate::model::{
    CaseRecord, CellValue, DocumentRef, DossierView, RecipientEntry, DOCUMENT_COLUMN,
};
use crate::parse::{self, parse_off_thread, TabTable};
use crate::portal::{
    self, BANNER, CASE_UNAVAILABLE_BANNER, DETAIL_MODAL, DOSSIER_SELECT, LINK_EXPIRED_BANNER,
    MODAL_CLOSE, MODAL_CONTENT, MODAL_LOADER, RECIPIENTS_EMPTY, RECIPIENTS_ICON, RECIPIENT_CLOSE,
    RECIPIENT_MODAL, RECIPIENT_ROWS,
};
use crate::session::Session;
use crate::store::DocumentStore;
use crate::{Error, Result};

#[derive(Debug)]
pub enum DetailOutcome {
    Done(CaseRecord),
    /// The listing's links went stale; reload the list and resume.
    Expired,
    /// The portal no longer has this case.
    Unavailable,
}

/// What the modal showed after invoking a case's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModalState {
    Ready,
    Expired,
    Unavailable,
}

pub struct DetailExtractor<'a> {
    session: Session<'a>,
    fetcher: &'a dyn DocumentFetcher,
    documents: &'a dyn DocumentStore,
    with_recipients: bool,
}

impl<'a> DetailExtractor<'a> {
    pub fn new(
        session: Session<'a>,
        fetcher: &'a dyn DocumentFetcher,
        documents: &'a dyn DocumentStore,
        with_recipients: bool,
    ) -> Self {
        Self {
            session,
            fetcher,
            documents,
            with_recipients,
        }
    }

    /// Runs the modal for `case`, recovering the session between faults.
    /// On success the case's stored documents are replaced by the ones just
    /// downloaded.
    pub async fn extract(&self, case: &CaseRecord) -> Result<DetailOutcome> {
        let action = case
            .detail
            .as_deref()
            .ok_or_else(|| Error::Validation(format!("case {} has no detail action", case.identity)))?;

        let max_faults = self.session.config.max_attempts;
        let mut faults = 0;
        loop {
            match self.attempt(case, action).await {
                Ok(Attempt::Extracted(record, documents)) => {
                    self.documents.bulk_delete_by_identity(&record.identity).await?;
                    self.documents.bulk_upsert(&documents).await?;
                    return Ok(DetailOutcome::Done(record));
                }
                Ok(Attempt::Expired) => return Ok(DetailOutcome::Expired),
                Ok(Attempt::Unavailable) => return Ok(DetailOutcome::Unavailable),
                Err(err) if !err.is_retryable() => {
                    self.session.screenshot().await;
                    return Err(err);
                }
                Err(err) => {
                    self.session.screenshot().await;
                    faults += 1;
                    if faults > max_faults {
                        return Err(Error::Exhausted {
                            operation: "open case detail",
                            attempts: faults,
                            source: Box::new(err),
                        });
                    }
                    warn!(case = %case.identity, fault = faults, error = %err, "detail failed, recovering session");
                    if let Err(err) = validate_session(&self.session).await {
                        if !err.is_retryable() {
                            return Err(err);
                        }
                        debug!(error = %err, "session recovery failed");
                    }
                }
            }
        }
    }

    async fn attempt(&self, case: &CaseRecord, action: &str) -> Result<Attempt> {
        match self.open(action).await? {
            ModalState::Ready => {}
            ModalState::Expired => return Ok(Attempt::Expired),
            ModalState::Unavailable => return Ok(Attempt::Unavailable),
        }

        let recipients = if self.with_recipients {
            Some(self.recipients().await?)
        } else {
            None
        };
        let (dossiers, documents) = self.dossiers(case).await?;

        if self.with_recipients {
            self.session.pause().await;
        }
        self.session.wait(MODAL_CLOSE, Visibility::Visible).await?;
        self.session.browser.click(MODAL_CLOSE).await?;

        let mut record = case.clone();
        record.detail = None;
        record.report_date = self.session.report_date;
        record.dossiers = dossiers;
        if recipients.is_some() {
            record.recipients = recipients;
        }
        record.updated_at = Some(Local::now());
        Ok(Attempt::Extracted(record, documents))
    }

    async fn open(&self, action: &str) -> Result<ModalState> {
        let session = &self.session;
        session.browser.evaluate(action).await?;
        session.settle_hidden(MODAL_LOADER).await;

        let Err(err) = session.wait(MODAL_CONTENT, Visibility::Visible).await else {
            return Ok(ModalState::Ready);
        };

        for _ in 0..session.config.max_attempts {
            if let Some(state) = self.probe_banner().await? {
                return Ok(state);
            }
            session.pause().await;
        }
        Err(err)
    }

    async fn probe_banner(&self) -> Result<Option<ModalState>> {
        let session = &self.session;
        if session
            .wait_within(BANNER, Visibility::Attached, session.config.banner_timeout())
            .await
            .is_err()
        {
            return Ok(None);
        }
        let text = browser::evaluate_text(session.browser, &portal::text_content(BANNER)).await?;
        Ok(match text.as_deref().map(str::trim) {
            Some(LINK_EXPIRED_BANNER) => Some(ModalState::Expired),
            Some(CASE_UNAVAILABLE_BANNER) => Some(ModalState::Unavailable),
            _ => None,
        })
    }

    async fn recipients(&self) -> Result<Vec<RecipientEntry>> {
        let session = &self.session;
        session.pause().await;
        session.wait(RECIPIENTS_ICON, Visibility::Visible).await?;
        session.browser.click(RECIPIENTS_ICON).await?;
        session.pause().await;

        let entries = self.read_recipients().await?;

        session.pause().await;
        session.wait(RECIPIENT_CLOSE, Visibility::Visible).await?;
        session.browser.click(RECIPIENT_CLOSE).await?;
        session.pause().await;
        Ok(entries)
    }

    async fn read_recipients(&self) -> Result<Vec<RecipientEntry>> {
        let session = &self.session;
        let timeout = session.config.recipients_timeout();
        session.settle_hidden(MODAL_LOADER).await;

        if session
            .wait_within(RECIPIENTS_EMPTY, Visibility::Visible, timeout)
            .await
            .is_ok()
        {
            return Ok(Vec::new());
        }
        session.wait_within(RECIPIENT_ROWS, Visibility::Visible, timeout).await?;
        let html = self.snapshot(RECIPIENT_MODAL).await?;
        parse_off_thread(html, parse::recipients).await
    }

    /// Walks every dossier option and returns the views with the documents
    /// they reference.
    async fn dossiers(&self, case: &CaseRecord) -> Result<(Vec<DossierView>, Vec<DocumentRef>)> {
        let session = &self.session;
        session.wait(DETAIL_MODAL, Visibility::Visible).await?;
        let options = parse_off_thread(self.snapshot(DETAIL_MODAL).await?, parse::dossier_options).await?;

        let mut views = Vec::with_capacity(options.len().max(1));
        let mut documents = Vec::new();
        for i in 0..options.len().max(1) {
            let option = options.get(i);
            if let Some(option) = option.filter(|_| options.len() > 1) {
                debug!(dossier = %option.label, "selecting dossier");
                session.wait(DOSSIER_SELECT, Visibility::Visible).await?;
                session.browser.select_option(DOSSIER_SELECT, &option.value).await?;
                session.settle_hidden(MODAL_LOADER).await;
            }

            session.wait(MODAL_CONTENT, Visibility::Visible).await?;
            let tabs = parse_off_thread(self.snapshot(DETAIL_MODAL).await?, parse::tab_tables).await?;

            let mut data = BTreeMap::new();
            for tab in tabs {
                let rows = self.tab_rows(case, &tab, &mut documents).await?;
                data.insert(tab.id, rows);
            }
            views.push(DossierView {
                label: option.map(|o| o.label.clone()),
                data,
            });
        }
        Ok((views, documents))
    }

    async fn tab_rows(
        &self,
        case: &CaseRecord,
        tab: &TabTable,
        documents: &mut Vec<DocumentRef>,
    ) -> Result<Vec<BTreeMap<String, CellValue>>> {
        let mut rows = Vec::with_capacity(tab.rows.len());
        for cells in &tab.rows {
            let mut row = BTreeMap::new();
            for (title, cell) in tab.titles.iter().zip(cells) {
                let value = if title == DOCUMENT_COLUMN {
                    let mut links = Vec::with_capacity(cell.documents.len());
                    for href in &cell.documents {
                        let doc = self.download(case, href).await?;
                        links.push(doc.link());
                        documents.push(doc);
                    }
                    CellValue::Documents(links)
                } else {
                    CellValue::Text(cell.text.clone())
                };
                row.insert(title.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn download(&self, case: &CaseRecord, href: &str) -> Result<DocumentRef> {
        let url = document_url(&self.session.config.portal_url, href)?;
        debug!(%url, "downloading document");
        let fetched = self.fetcher.fetch(&url).await?;
        let user = self.session.credentials.user.clone();

        Ok(DocumentRef {
            uuid: Uuid::new_v4(),
            url,
            content_type: fetched.content_type,
            base64: fetched.base64,
            identity: case.identity.clone(),
            users: vec![user.clone()],
            user,
            created_at: None,
            updated_at: Local::now(),
        })
    }

    async fn snapshot(&self, selector: &str) -> Result<String> {
        browser::evaluate_text(self.session.browser, &portal::outer_html(selector))
            .await?
            .ok_or_else(|| Error::MissingElement(selector.into()))
    }
}

enum Attempt {
    Extracted(CaseRecord, Vec<DocumentRef>),
    Expired,
    Unavailable,
}

/// Resolves a document form's target against the portal root.
pub fn document_url(portal_url: &str, href: &str) -> Result<String> {
    let fail = |reason: String| Error::UploadFetch {
        url: href.to_owned(),
        reason,
    };
    let base = Url::parse(portal_url).map_err(|e| fail(e.to_string()))?;
    let url = base.join(href).map_err(|e| fail(e.to_string()))?;
    Ok(url.into())
}
