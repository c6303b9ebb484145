//! Records exchanged between the crawler, the stores and the caller.
//!
//! Field names on the wire follow the portal's own column titles
//! (`Rol`, `Tribunal`, `Caratulado`, ...), so a listed row and a stored case
//! serialize to the same shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates::ReportDate;
use crate::{Error, Result};

pub const DETAIL_COLUMN: &str = "Detalle";
pub const ROLE_COLUMN: &str = "Rol";
pub const COURT_COLUMN: &str = "Tribunal";
pub const CAPTION_COLUMN: &str = "Caratulado";
pub const DATE_COLUMN: &str = "Fecha";
pub const DOCUMENT_COLUMN: &str = "Doc.";

/// (Rol, Tribunal, Caratulado): the upsert key of a case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "Rol")]
    pub role: String,
    #[serde(rename = "Tribunal")]
    pub court: String,
    #[serde(rename = "Caratulado")]
    pub caption: String,
}

impl Identity {
    pub fn new(role: impl Into<String>, court: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            court: court.into(),
            caption: caption.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {} | {}", self.role, self.court, self.caption)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub uuid: Uuid,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "Fecha", default, skip_serializing_if = "Option::is_none")]
    pub filed_on: Option<String>,
    #[serde(rename = "FechaEstDia")]
    pub report_date: ReportDate,
    /// Remaining portal columns, keyed by their header text.
    #[serde(flatten)]
    pub columns: BTreeMap<String, String>,
    /// JavaScript action that reopens this case's detail modal.
    #[serde(rename = "Detalle", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "cuadernos", default)]
    pub dossiers: Vec<DossierView>,
    #[serde(rename = "receptores", default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<RecipientEntry>>,
    #[serde(rename = "usuarios", default)]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Local>>,
    /// When the detail modal was last extracted. `None` for listed-only rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Local>>,
}

impl CaseRecord {
    /// Builds a listed case from one table row zipped with the header titles.
    pub fn from_row(titles: &[String], cells: Vec<String>, report_date: ReportDate) -> Result<Self> {
        let mut columns: BTreeMap<String, String> = titles.iter().cloned().zip(cells).collect();
        let mut take = |title: &str| columns.remove(title);

        let role = take(ROLE_COLUMN).ok_or_else(|| Error::Parse(format!("row without {ROLE_COLUMN}")))?;
        let court = take(COURT_COLUMN).unwrap_or_default();
        let caption = take(CAPTION_COLUMN).unwrap_or_default();
        let filed_on = take(DATE_COLUMN);
        let detail = take(DETAIL_COLUMN);

        Ok(Self {
            uuid: Uuid::new_v4(),
            identity: Identity::new(role, court, caption),
            filed_on,
            report_date,
            columns,
            detail,
            dossiers: Vec::new(),
            recipients: None,
            users: Vec::new(),
            created_at: None,
            updated_at: None,
        })
    }

    /// Appends `user` unless already present. Never removes anyone.
    pub fn add_user(&mut self, user: &str) {
        if !self.users.iter().any(|u| u == user) {
            self.users.push(user.to_owned());
        }
    }

    /// Copy safe to hand back to callers: no action descriptor.
    pub fn sanitized(&self) -> Self {
        Self {
            detail: None,
            ..self.clone()
        }
    }
}

/// One dossier ("cuaderno") of a case as shown in the detail modal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DossierView {
    #[serde(rename = "cuaderno", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Tab pane id → rows of that tab's table.
    pub data: BTreeMap<String, Vec<BTreeMap<String, CellValue>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Documents(Vec<DocumentLink>),
}

/// What a case row keeps of a downloaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub uuid: Uuid,
    pub url: String,
}

/// A downloaded document, stored apart from its case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub uuid: Uuid,
    pub url: String,
    #[serde(rename = "contentype")]
    pub content_type: String,
    pub base64: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "usuario")]
    pub user: String,
    #[serde(rename = "usuarios", default)]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Local>>,
    pub updated_at: DateTime<Local>,
}

impl DocumentRef {
    pub fn link(&self) -> DocumentLink {
        DocumentLink {
            uuid: self.uuid,
            url: self.url.clone(),
        }
    }
}

/// A notification party; titles are whatever the portal's table shows.
pub type RecipientEntry = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "usuario")]
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// `dd/mm/yyyy`; derived from today when absent.
    #[serde(default)]
    pub fecha: Option<String>,
    /// Also extract notification recipients.
    #[serde(default)]
    pub receptor: bool,
}

impl CrawlRequest {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials {
                user: user.into(),
                password: password.into(),
            },
            fecha: None,
            receptor: false,
        }
    }

    pub fn with_date(mut self, fecha: impl Into<String>) -> Self {
        self.fecha = Some(fecha.into());
        self
    }

    pub fn with_recipients(mut self, receptor: bool) -> Self {
        self.receptor = receptor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.user.trim().is_empty() {
            return Err(Error::Validation("nombre de usuario es obligatorio".into()));
        }
        if self.credentials.password.is_empty() {
            return Err(Error::Validation("contraseña es obligatorio".into()));
        }
        Ok(())
    }
}
