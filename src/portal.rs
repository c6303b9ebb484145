//! Markup the crawler depends on. The portal exposes no stable ids for most
//! of these, so each selector mirrors the DOM path as rendered.

// Login
pub const LOGIN_MENU_BUTTON: &str = "#page-wrapper > section.banner > div > div.container.hidden-xs > div > div:nth-child(1) > div > button:nth-child(1)";
pub const LOGIN_TAB: &str = "#btnSegClave";
pub const RUT_INPUT: &str = "#rut";
pub const PASSWORD_INPUT: &str = "#password";
pub const LOGIN_SUBMIT: &str = "#btnSegundaClaveIngresar";

// Menu and date filter
pub const SIDEBAR_MENU: &str = "#sidebar > ul > li:nth-child(4) > a";
pub const DAILY_STATUS_MENU: &str = "#nuevocolapsador > li:nth-child(3) > a";
pub const LIST_LOADER: &str = "#loadPreEstDiaCivil";
pub const DATE_INPUT: &str = "#fechaEstDiaCiv";
pub const SEARCH_BUTTON: &str = "#btnConsultaEstDiaCivil";

// Case list
pub const HEADER: &str = "#thTableEstDiaCivil";
pub const HEADER_ROW: &str = "#thTableEstDiaCivil > tr";
pub const LIST_BODY: &str = "#verDetalleEstDiaCivil";
pub const LIST_ROWS: &str = "#verDetalleEstDiaCivil > tr";
pub const PAGER: &str = "#verDetalleEstDiaCivil > tr:last-child > td > nav > ul";
pub const PAGER_TOTAL: &str = "#verDetalleEstDiaCivil > tr:last-child > td > nav > div > b";

// Detail modal
pub const MODAL_LOADER: &str = ".imgLoad";
pub const DETAIL_MODAL: &str = "#modalDetalleEstDiaCivil";
pub const MODAL_CONTENT: &str = "#modalDetalleEstDiaCivil .tab-content table tr";
pub const DOSSIER_SELECT: &str = "#modalDetalleEstDiaCivil select";
pub const MODAL_CLOSE: &str = "#modalDetalleEstDiaCivil > div > div > div.modal-footer > button";
pub const BANNER: &str = "body > div.sweet-alert.showSweetAlert.visible > p";

// Recipients modal
pub const RECIPIENTS_ICON: &str = "#modalDetalleEstDiaCivil > div > div > div.modal-body > div > div:nth-child(2) > table > tbody > tr > td:nth-child(2) > a > i";
pub const RECIPIENT_MODAL: &str = "#modalReceptorCivil";
pub const RECIPIENTS_EMPTY: &str = "#modalReceptorCivil > div > div > div.modal-body > div > div > div > center > div";
pub const RECIPIENT_ROWS: &str = "#modalReceptorCivil > div > div > div.modal-body > div > div > div > table > tbody > tr";
pub const RECIPIENT_CLOSE: &str = "#modalReceptorCivil > div > div > div.modal-footer > button";

pub const LINK_EXPIRED_BANNER: &str = "El vinculo ha expirado, por favor consulte nuevamente.";
pub const CASE_UNAVAILABLE_BANNER: &str = "Causa No Disponible.";

pub const LOGOUT: &str = "salir();";

/// Escapes `selector` as a JavaScript string literal.
fn literal(selector: &str) -> String {
    serde_json::Value::from(selector).to_string()
}

pub fn outer_html(selector: &str) -> String {
    format!(
        "const el = document.querySelector({}); return el ? el.outerHTML : null;",
        literal(selector)
    )
}

/// Markup of the `<table>` enclosing `selector`, so row fragments parse.
pub fn table_html(selector: &str) -> String {
    format!(
        "const el = document.querySelector({}); const t = el ? el.closest('table') : null; return t ? t.outerHTML : null;",
        literal(selector)
    )
}

pub fn text_content(selector: &str) -> String {
    format!(
        "const el = document.querySelector({}); return el ? el.textContent : null;",
        literal(selector)
    )
}

pub fn attribute(selector: &str, name: &str) -> String {
    format!(
        "const el = document.querySelector({}); return el ? el.getAttribute({}) : null;",
        literal(selector),
        literal(name)
    )
}

pub fn clear_value(selector: &str) -> String {
    format!(
        "const el = document.querySelector({}); if (el) {{ el.value = ''; }} return null;",
        literal(selector)
    )
}

/// The portal's own pager callback.
pub fn go_to_page(page: usize) -> String {
    format!("pagina({page}, 3);")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted_for_javascript() {
        assert_eq!(
            text_content(BANNER),
            r#"const el = document.querySelector("body > div.sweet-alert.showSweetAlert.visible > p"); return el ? el.textContent : null;"#
        );
        assert_eq!(go_to_page(2), "pagina(2, 3);");
    }
}
