//! In-process stand-in for the PJUD portal.
//!
//! `FakePortal` renders the same markup the real pages show for the
//! selectors and scripts the crawler uses, and records what was done to it.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use estado_diario::browser::{Browser, Visibility};
use estado_diario::fetch::{DocumentFetcher, FetchedDocument};
use estado_diario::portal::{self, *};
use estado_diario::{Error, Result, TARGET_URL};

pub const HOME_URL: &str = "https://oficinajudicialvirtual.pjud.cl/indexN.php";
pub const PASSWORD: &str = "x";
pub const BAD_CREDENTIALS: &str = "Usuario o clave incorrectas.";

#[derive(Debug, Clone)]
pub struct FakeDossier {
    pub label: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FakeCase {
    pub role: String,
    pub court: String,
    pub caption: String,
    pub filed_on: String,
    pub dossiers: Vec<FakeDossier>,
    pub recipients: Vec<String>,
}

impl FakeCase {
    pub fn new(n: usize) -> Self {
        Self {
            role: format!("C-{n}-2022"),
            court: "1º Juzgado Civil de Santiago".into(),
            caption: format!("DEMANDANTE {n} / DEMANDADO {n}"),
            filed_on: "30/12/2022".into(),
            dossiers: vec![FakeDossier {
                label: "1 - Principal".into(),
                documents: vec![format!("doc-{n}-a")],
            }],
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PortalState {
    url: String,
    logged_in: bool,
    on_list: bool,
    dialog: Option<String>,
    typed_date: Option<String>,
    typed_password: Option<String>,
    filter: String,
    page: usize,
    requested_page: Option<usize>,
    generation: usize,
    modal: Option<usize>,
    dossier: usize,
    recipients_open: bool,
    banner: Option<String>,

    pub cases: BTreeMap<String, Vec<FakeCase>>,
    pub declared_override: Option<usize>,
    /// List snapshots still served from the old page after `pagina(n, 3)`.
    pub pager_lag: usize,
    lag_left: usize,
    /// How many more times each role's link reports as expired.
    pub expirations: BTreeMap<String, usize>,
    pub unavailable: BTreeSet<String>,

    pub opened: Vec<String>,
    pub submits: usize,
    pub searches: usize,
    pub reloads: usize,
    pub logouts: usize,
    pub screenshots: usize,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct FakePortal {
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    /// A portal listing `count` cases for `date`.
    pub fn with_cases(date: &str, count: usize) -> Self {
        let portal = Self::default();
        portal
            .state()
            .cases
            .insert(date.into(), (1..=count).map(FakeCase::new).collect());
        portal
    }

    pub fn state(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap()
    }

    pub fn case_mut<R>(&self, date: &str, role: &str, f: impl FnOnce(&mut FakeCase) -> R) -> R {
        let mut state = self.state();
        let case = state
            .cases
            .get_mut(date)
            .and_then(|cases| cases.iter_mut().find(|c| c.role == role))
            .expect("no such fake case");
        f(case)
    }

    pub fn opened(&self) -> Vec<String> {
        self.state().opened.clone()
    }
}

impl PortalState {
    fn listed(&self) -> &[FakeCase] {
        self.cases.get(&self.filter).map(Vec::as_slice).unwrap_or_default()
    }

    fn open_case(&self) -> Option<&FakeCase> {
        self.modal.and_then(|i| self.listed().get(i))
    }

    fn shows(&self, selector: &str) -> bool {
        let has_cases = !self.listed().is_empty();
        match selector {
            LIST_LOADER | MODAL_LOADER => false,
            LOGIN_MENU_BUTTON | LOGIN_TAB | RUT_INPUT | PASSWORD_INPUT | LOGIN_SUBMIT => !self.logged_in,
            SIDEBAR_MENU | DAILY_STATUS_MENU | DATE_INPUT | SEARCH_BUTTON => self.logged_in,
            LIST_ROWS | HEADER_ROW => self.logged_in && self.on_list,
            PAGER | PAGER_TOTAL => self.logged_in && self.on_list && has_cases,
            BANNER => self.banner.is_some(),
            DETAIL_MODAL | MODAL_CONTENT | MODAL_CLOSE | DOSSIER_SELECT | RECIPIENTS_ICON => {
                self.modal.is_some()
            }
            RECIPIENT_CLOSE => self.recipients_open,
            RECIPIENTS_EMPTY => {
                self.recipients_open && self.open_case().is_some_and(|c| c.recipients.is_empty())
            }
            RECIPIENT_ROWS => {
                self.recipients_open && self.open_case().is_some_and(|c| !c.recipients.is_empty())
            }
            _ => true,
        }
    }

    fn list_html(&self) -> String {
        let cases = self.listed();
        let mut body = String::new();
        if cases.is_empty() {
            body.push_str("<tr><td>No se encontraron causas</td></tr>");
        } else {
            let start = (self.page - 1) * 15;
            for (i, case) in cases.iter().enumerate().skip(start).take(15) {
                body.push_str(&format!(
                    r#"<tr><td><a href="" onclick="detalleCausaCivil('g{}-{}');"><i class="fa fa-search"></i></a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                    self.generation, i, case.role, case.filed_on, case.caption, case.court
                ));
            }
            let pages = cases.len().div_ceil(15);
            let mut pager = String::new();
            for p in 1..=pages {
                if p == self.page {
                    pager.push_str(&format!(r#"<li class="page-item active"><span class="page-link">{p}</span></li>"#));
                } else {
                    pager.push_str(&format!(r#"<li class="page-item"><a class="page-link" onclick="pagina({p}, 3);">{p}</a></li>"#));
                }
            }
            let declared = self.declared_override.unwrap_or(cases.len());
            body.push_str(&format!(
                r#"<tr><td colspan="5"><nav><ul class="pagination">{pager}</ul><div>Total de causas: <b>{declared}</b></div></nav></td></tr>"#
            ));
        }
        format!(
            r#"<table class="table"><thead id="thTableEstDiaCivil"><tr><th>Det.</th><th>Rol</th><th>Fecha</th><th>Caratulado</th><th>Tribunal</th></tr></thead><tbody id="verDetalleEstDiaCivil">{body}</tbody></table>"#
        )
    }

    fn modal_html(&self, case: &FakeCase) -> String {
        let options: String = case
            .dossiers
            .iter()
            .enumerate()
            .map(|(i, d)| format!(r#"<option value="{}">{}</option>"#, i + 1, d.label))
            .collect();
        let rows: String = case.dossiers[self.dossier]
            .documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    r#"<tr><td>{}</td><td><form action="ADIR_871/civil/documentos/docuS.php" method="post"><input type="hidden" name="dtaDoc" value="{doc}"></form></td><td>Resolución</td></tr>"#,
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<div id="modalDetalleEstDiaCivil" class="modal"><div class="modal-dialog"><div class="modal-content"><div class="modal-body"><select class="form-control">{options}</select><div class="tab-content"><div class="tab-pane active" id="historiaCiv"><table><thead><tr><th>Folio</th><th>Doc.</th><th>Trámite</th></tr></thead><tbody>{rows}</tbody></table></div><div class="tab-pane" id="litigantesCiv"><table><thead><tr><th>Participante</th><th>Nombre</th></tr></thead><tbody><tr><td>DTE.</td><td>{}</td></tr></tbody></table></div></div></div></div></div></div>"#,
            case.caption
        )
    }

    fn recipients_html(&self, case: &FakeCase) -> String {
        let rows: String = case
            .recipients
            .iter()
            .map(|name| format!("<tr><td>{name}</td><td>Notificado</td></tr>"))
            .collect();
        format!(
            r#"<div id="modalReceptorCivil"><div><div><div class="modal-body"><div><div><div><table><thead><tr><th>Receptor</th><th>Estado</th></tr></thead><tbody>{rows}</tbody></table></div></div></div></div></div></div></div>"#
        )
    }

    /// Applies a requested page once the lag has been served.
    fn advance_pager(&mut self) {
        let Some(page) = self.requested_page else {
            return;
        };
        if self.lag_left == 0 {
            self.page = page;
            self.requested_page = None;
        } else {
            self.lag_left -= 1;
        }
    }

    fn take_expiration(&mut self, role: &str) -> bool {
        match self.expirations.get_mut(role) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn invoke_detail(&mut self, action: &str) {
        self.banner = None;
        let token = action
            .trim_start_matches("detalleCausaCivil('g")
            .trim_end_matches("');");
        let (generation, index) = token.split_once('-').expect("malformed detail action");
        let generation: usize = generation.parse().unwrap();
        let index: usize = index.parse().unwrap();

        let Some(role) = self.listed().get(index).map(|c| c.role.clone()) else {
            self.banner = Some(CASE_UNAVAILABLE_BANNER.into());
            return;
        };
        if generation != self.generation || self.take_expiration(&role) {
            self.banner = Some(LINK_EXPIRED_BANNER.into());
        } else if self.unavailable.contains(&role) {
            self.banner = Some(CASE_UNAVAILABLE_BANNER.into());
        } else {
            self.modal = Some(index);
            self.dossier = 0;
            self.opened.push(role);
        }
    }
}

#[async_trait]
impl Browser for FakePortal {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state();
        state.url = if url == TARGET_URL && state.logged_in {
            HOME_URL.into()
        } else {
            url.into()
        };
        state.on_list = false;
        state.filter.clear();
        state.modal = None;
        state.banner = None;
        state.page = 1;
        state.requested_page = None;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn reload(&self) -> Result<()> {
        let mut state = self.state();
        state.reloads += 1;
        state.generation += 1;
        state.requested_page = None;
        state.on_list = false;
        state.filter.clear();
        state.modal = None;
        state.banner = None;
        state.page = 1;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, visibility: Visibility, timeout: Duration) -> Result<()> {
        let shown = self.state().shows(selector);
        let satisfied = match visibility {
            Visibility::Attached | Visibility::Visible => shown,
            Visibility::Hidden => !shown,
        };
        if satisfied {
            Ok(())
        } else {
            Err(Error::Timeout {
                selector: selector.into(),
                timeout,
            })
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.state();
        if script == portal::table_html(LIST_BODY) {
            if !state.on_list {
                return Ok(Value::Null);
            }
            let html = state.list_html();
            state.advance_pager();
            return Ok(html.into());
        }
        if script == portal::table_html(HEADER) {
            return Ok(if state.on_list { state.list_html().into() } else { Value::Null });
        }
        if script == portal::outer_html(DETAIL_MODAL) {
            return Ok(state.open_case().map_or(Value::Null, |c| state.modal_html(c).into()));
        }
        if script == portal::outer_html(RECIPIENT_MODAL) {
            return Ok(state.open_case().map_or(Value::Null, |c| state.recipients_html(c).into()));
        }
        if script == portal::text_content(BANNER) {
            return Ok(state.banner.clone().map_or(Value::Null, Value::from));
        }
        if script == portal::attribute(DATE_INPUT, "value") {
            return Ok(state.filter.clone().into());
        }
        if script == portal::clear_value(DATE_INPUT) {
            state.typed_date = None;
            return Ok(Value::Null);
        }
        if script == LOGOUT {
            state.logouts += 1;
            state.logged_in = false;
            state.on_list = false;
            state.url = TARGET_URL.into();
            return Ok(Value::Null);
        }
        if let Some(args) = script.strip_prefix("pagina(") {
            let page = args.split(',').next().unwrap().trim();
            state.requested_page = Some(page.parse().unwrap());
            state.lag_left = state.pager_lag;
            state.advance_pager();
            return Ok(Value::Null);
        }
        if script.starts_with("detalleCausaCivil(") {
            state.invoke_detail(script);
            return Ok(Value::Null);
        }
        Ok(Value::Null)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.state();
        match selector {
            LOGIN_SUBMIT => {
                state.submits += 1;
                if state.typed_password.as_deref() == Some(PASSWORD) {
                    state.logged_in = true;
                    state.url = HOME_URL.into();
                } else {
                    state.dialog = Some(BAD_CREDENTIALS.into());
                }
            }
            DAILY_STATUS_MENU => {
                state.on_list = true;
                state.page = 1;
            }
            SEARCH_BUTTON => {
                state.searches += 1;
                state.filter = state.typed_date.clone().unwrap_or_default();
                state.page = 1;
            }
            MODAL_CLOSE => state.modal = None,
            RECIPIENTS_ICON => state.recipients_open = true,
            RECIPIENT_CLOSE => state.recipients_open = false,
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.state();
        match selector {
            DATE_INPUT => state.typed_date = Some(text.into()),
            PASSWORD_INPUT => state.typed_password = Some(text.into()),
            _ => {}
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        assert_eq!(selector, DOSSIER_SELECT);
        self.state().dossier = value.parse::<usize>().unwrap() - 1;
        Ok(())
    }

    async fn press_escape(&self) -> Result<()> {
        Ok(())
    }

    async fn dialog_message(&self) -> Result<Option<String>> {
        Ok(self.state().dialog.clone())
    }

    async fn accept_dialog(&self) -> Result<()> {
        self.state().dialog = None;
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> Result<()> {
        self.state().screenshots += 1;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}

/// Wraps a [`FakePortal`] and fails chosen calls a set number of times
/// with a timeout, the way a slow or flaky page does.
#[derive(Clone, Default)]
pub struct FaultyBrowser {
    pub portal: FakePortal,
    goto_failures: Arc<Mutex<usize>>,
    wait_failures: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl FaultyBrowser {
    pub fn new(portal: FakePortal) -> Self {
        Self {
            portal,
            ..Self::default()
        }
    }

    pub fn fail_goto(self, times: usize) -> Self {
        *self.goto_failures.lock().unwrap() = times;
        self
    }

    /// Makes the next `times` waits on `selector` time out.
    pub fn fail_wait(self, selector: &str, times: usize) -> Self {
        self.wait_failures.lock().unwrap().insert(selector.into(), times);
        self
    }

    fn timeout(selector: &str) -> Error {
        Error::Timeout {
            selector: selector.into(),
            timeout: Duration::from_millis(50),
        }
    }

    fn take(counter: &mut usize) -> bool {
        if *counter == 0 {
            return false;
        }
        *counter -= 1;
        true
    }
}

#[async_trait]
impl Browser for FaultyBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        if Self::take(&mut self.goto_failures.lock().unwrap()) {
            return Err(Self::timeout(url));
        }
        self.portal.goto(url).await
    }

    async fn current_url(&self) -> Result<String> {
        self.portal.current_url().await
    }

    async fn reload(&self) -> Result<()> {
        self.portal.reload().await
    }

    async fn wait_for(&self, selector: &str, visibility: Visibility, timeout: Duration) -> Result<()> {
        let failing = self
            .wait_failures
            .lock()
            .unwrap()
            .get_mut(selector)
            .is_some_and(Self::take);
        if failing {
            return Err(Self::timeout(selector));
        }
        self.portal.wait_for(selector, visibility, timeout).await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.portal.evaluate(script).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.portal.click(selector).await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.portal.type_text(selector, text).await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.portal.select_option(selector, value).await
    }

    async fn press_escape(&self) -> Result<()> {
        self.portal.press_escape().await
    }

    async fn dialog_message(&self) -> Result<Option<String>> {
        self.portal.dialog_message().await
    }

    async fn accept_dialog(&self) -> Result<()> {
        self.portal.accept_dialog().await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.portal.screenshot(path).await
    }

    async fn close(&self) -> Result<()> {
        self.portal.close().await
    }
}

/// Serves every document as a tiny PDF; URLs containing "broken" fail.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    pub fetched: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        if url.contains("broken") {
            return Err(Error::UploadFetch {
                url: url.into(),
                reason: "HTTP status server error (500 Internal Server Error)".into(),
            });
        }
        self.fetched.lock().unwrap().push(url.into());
        Ok(FetchedDocument {
            content_type: "application/pdf".into(),
            base64: "JVBERi0xLjQK".into(),
        })
    }
}
