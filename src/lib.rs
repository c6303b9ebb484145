//! PJUD "estado diario" crawler.
//!
//! Logs in to the judicial virtual office, reads the daily status list for
//! the requested dates, opens each case's detail modal and reconciles the
//! results against what earlier runs stored.

mod macros;

pub mod auth;
pub mod browser;
mod config;
pub mod dates;
pub mod detail;
mod error;
pub mod fetch;
pub mod listing;
pub mod model;
pub mod parse;
pub mod portal;
pub mod process;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod store;

pub use config::CrawlConfig;
pub use error::{Error, ErrorKind, ErrorReport, Result};

/// Cases per list page.
const PAGE_SIZE: usize = 15;
pub const PORTAL_URL: &str = "https://oficinajudicialvirtual.pjud.cl/";
/// Landing page with the login form.
pub const TARGET_URL: &str = "https://oficinajudicialvirtual.pjud.cl/home/index.php";
const DATE_FORMAT: &str = "%d/%m/%Y";
