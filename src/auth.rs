use std::time::Duration;

use tracing::{debug, info};

use crate::browser::Visibility;
use crate::portal::{
    self, DAILY_STATUS_MENU, DATE_INPUT, LIST_LOADER, LOGIN_MENU_BUTTON, LOGIN_SUBMIT, LOGIN_TAB,
    PASSWORD_INPUT, RUT_INPUT, SEARCH_BUTTON, SIDEBAR_MENU,
};
use crate::retry::retry;
use crate::session::Session;
use crate::{browser, Error, Result};

const DIALOG_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Already logged in; nothing was touched.
    Active,
    /// Logged in again and brought back to the filtered case list.
    Restored,
}

/// First thing to resolve after submitting credentials.
#[derive(Debug, PartialEq, Eq)]
enum LoginSignal {
    Completed,
    Dialog(String),
}

/// Makes sure the page is logged in and showing the daily status list for
/// the session's report date.
pub async fn validate_session(session: &Session<'_>) -> Result<SessionState> {
    if !session.on_login_page().await? {
        return Ok(SessionState::Active);
    }

    info!(user = %session.credentials.user, "logging in to PJUD");
    login(session).await?;
    debug!("opening daily status");
    open_daily_status(session).await?;
    debug!(date = %session.report_date, "filtering daily status");
    apply_date_filter(session).await?;
    Ok(SessionState::Restored)
}

/// Brings the page to the daily status list filtered on the session's date.
/// A live session is navigated and filtered again, since it may still be
/// showing another date.
pub async fn show_daily_status(session: &Session<'_>) -> Result<SessionState> {
    let state = validate_session(session).await?;
    if state == SessionState::Active {
        open_daily_status(session).await?;
        apply_date_filter(session).await?;
    }
    Ok(state)
}

/// Drives the "Clave Poder Judicial" login form. Any native dialog raised
/// after submitting means the portal rejected the credentials.
pub async fn login(session: &Session<'_>) -> Result<()> {
    let browser = session.browser;

    session.pause().await;
    browser.press_escape().await?;
    session.pause().await;

    session.wait(LOGIN_MENU_BUTTON, Visibility::Attached).await?;
    browser.click(LOGIN_MENU_BUTTON).await?;
    session.wait(LOGIN_TAB, Visibility::Attached).await?;
    browser.click(LOGIN_TAB).await?;
    tokio::time::sleep(session.config.delay() * 2).await;

    session.wait(RUT_INPUT, Visibility::Attached).await?;
    browser.type_text(RUT_INPUT, &session.credentials.user).await?;
    session.wait(PASSWORD_INPUT, Visibility::Attached).await?;
    browser.type_text(PASSWORD_INPUT, &session.credentials.password).await?;

    session.wait(LOGIN_SUBMIT, Visibility::Attached).await?;
    browser.click(LOGIN_SUBMIT).await?;

    match await_login(session).await? {
        LoginSignal::Completed => Ok(()),
        LoginSignal::Dialog(message) => {
            if let Err(err) = browser.accept_dialog().await {
                debug!(error = %err, "couldn't dismiss login dialog");
            }
            Err(Error::Auth(message))
        }
    }
}

/// Races the settle delay against a native dialog. The dialog always wins,
/// including one that shows up just as the delay runs out.
async fn await_login(session: &Session<'_>) -> Result<LoginSignal> {
    let browser = session.browser;
    let dialog = async {
        loop {
            if let Some(message) = browser.dialog_message().await? {
                return Ok::<_, Error>(message);
            }
            tokio::time::sleep(DIALOG_POLL).await;
        }
    };

    let signal = tokio::select! {
        biased;
        message = dialog => LoginSignal::Dialog(message?),
        _ = tokio::time::sleep(session.config.login_settle()) => LoginSignal::Completed,
    };

    if signal == LoginSignal::Completed {
        if let Some(message) = browser.dialog_message().await? {
            return Ok(LoginSignal::Dialog(message));
        }
    }
    Ok(signal)
}

/// Sidebar → "Estado Diario" → civil tab.
pub async fn open_daily_status(session: &Session<'_>) -> Result<()> {
    let session = *session;
    retry(session.policy(), "open daily status", move |_| async move {
        session.wait(SIDEBAR_MENU, Visibility::Attached).await?;
        session.browser.click(SIDEBAR_MENU).await?;
        session.wait(DAILY_STATUS_MENU, Visibility::Attached).await?;
        session.browser.click(DAILY_STATUS_MENU).await?;
        session.settle(LIST_LOADER).await;
        Ok(())
    })
    .await
}

/// Points the date filter at the session's report date unless it already is.
pub async fn apply_date_filter(session: &Session<'_>) -> Result<()> {
    let browser = session.browser;
    let wanted = session.report_date.to_string();

    session.wait(DATE_INPUT, Visibility::Attached).await?;
    let current = browser::evaluate_text(browser, &portal::attribute(DATE_INPUT, "value")).await?;

    if current.as_deref() != Some(wanted.as_str()) {
        browser.evaluate(&portal::clear_value(DATE_INPUT)).await?;
        session.settle(LIST_LOADER).await;
        session.wait(SEARCH_BUTTON, Visibility::Visible).await?;
        browser.click(SEARCH_BUTTON).await?;
        session.settle(LIST_LOADER).await;

        session.wait(DATE_INPUT, Visibility::Visible).await?;
        browser.type_text(DATE_INPUT, &wanted).await?;
        session.settle(LIST_LOADER).await;
        session.wait(SEARCH_BUTTON, Visibility::Visible).await?;
        browser.click(SEARCH_BUTTON).await?;
    }

    session.settle(LIST_LOADER).await;
    Ok(())
}
