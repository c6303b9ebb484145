use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;

use crate::model::{RecipientEntry, DETAIL_COLUMN};
use crate::{Error, Result};

/// Snapshot of the case-list table as rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTable {
    /// Cell texts per `<tr>`, pager row included.
    pub rows: Vec<Vec<String>>,
    /// Server-reported number of cases, read from the pager row.
    pub declared_total: Option<usize>,
    /// Page number the pager marks as active.
    pub active_page: Option<usize>,
}

impl ListTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DossierOption {
    pub label: String,
    pub value: String,
}

/// One `.tab-pane` of the detail modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabTable {
    pub id: String,
    pub titles: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    /// `action?name=value` of every document form inside the cell.
    pub documents: Vec<String>,
}

/// Runs a parser on the blocking pool; `Html` is not `Send`.
pub(crate) async fn parse_off_thread<T, F>(html: String, parser: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&str) -> Result<T> + Send + 'static,
{
    spawn_blocking(move || parser(&html)).await?
}

/// Parses the table containing `#verDetalleEstDiaCivil`.
pub fn list_table(html: &str) -> Result<ListTable> {
    let doc = Html::parse_fragment(html);
    let row_selector = create_selector("#verDetalleEstDiaCivil > tr")?;
    let cell_selector = create_selector("td")?;
    let link_selector = create_selector("a")?;
    let total_selector = create_selector("td > nav > div > b")?;
    let active_selector = create_selector("td > nav > ul > li.page-item.active > span")?;

    let trs: Vec<ElementRef> = doc.select(&row_selector).collect();
    let rows = trs
        .iter()
        .map(|tr| {
            tr.select(&cell_selector)
                .map(|td| match td.select(&link_selector).next() {
                    Some(link) => link.value().attr("onclick").unwrap_or_default().to_owned(),
                    None => inner_text(td),
                })
                .collect()
        })
        .collect();

    let mut table = ListTable {
        rows,
        ..ListTable::default()
    };
    // A lone row is the "no results" notice, not a pager.
    if trs.len() > 1 {
        if let Some(pager) = trs.last() {
            table.declared_total = first_number(pager, &total_selector);
            table.active_page = first_number(pager, &active_selector);
        }
    }
    Ok(table)
}

/// Column titles of `#thTableEstDiaCivil`. The first header cell is the
/// detail link column and is always named [`DETAIL_COLUMN`].
pub fn header_titles(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_fragment(html);
    let th_selector = create_selector("#thTableEstDiaCivil > tr > th")?;

    let cells: Vec<String> = doc.select(&th_selector).map(inner_text).collect();
    if cells.len() <= 1 {
        return Ok(Vec::new());
    }
    let mut titles = Vec::with_capacity(cells.len());
    titles.push(DETAIL_COLUMN.to_owned());
    titles.extend(cells.into_iter().skip(1));
    Ok(titles)
}

pub fn dossier_options(html: &str) -> Result<Vec<DossierOption>> {
    let doc = Html::parse_fragment(html);
    let option_selector = create_selector("select option")?;

    Ok(doc
        .select(&option_selector)
        .map(|option| DossierOption {
            label: option.inner_html().trim().to_owned(),
            value: option.value().attr("value").unwrap_or_default().to_owned(),
        })
        .collect())
}

pub fn tab_tables(html: &str) -> Result<Vec<TabTable>> {
    let doc = Html::parse_fragment(html);
    let pane_selector = create_selector(".modal-content .modal-body .tab-content .tab-pane")?;
    let head_selector = create_selector("table thead tr")?;
    let th_selector = create_selector("th")?;
    let body_selector = create_selector("table tbody tr")?;
    let td_selector = create_selector("td")?;
    let form_selector = create_selector("form")?;
    let input_selector = create_selector("input")?;

    let mut tabs = Vec::new();
    for pane in doc.select(&pane_selector) {
        let titles = pane
            .select(&head_selector)
            .next()
            .map(|tr| tr.select(&th_selector).map(text_content).collect())
            .unwrap_or_default();

        let rows = pane
            .select(&body_selector)
            .map(|tr| {
                tr.select(&td_selector)
                    .map(|td| RawCell {
                        text: text_content(td),
                        documents: td
                            .select(&form_selector)
                            .filter_map(|form| {
                                let action = form.value().attr("action")?;
                                let input = form.select(&input_selector).next()?;
                                let name = input.value().attr("name").unwrap_or_default();
                                let value = input.value().attr("value").unwrap_or_default();
                                Some(format!("{action}?{name}={value}"))
                            })
                            .collect(),
                    })
                    .collect()
            })
            .collect();

        tabs.push(TabTable {
            id: pane.value().attr("id").unwrap_or_default().to_owned(),
            titles,
            rows,
        });
    }
    Ok(tabs)
}

/// Rows of the recipients table keyed by its header titles. Rows with at
/// most one field carry no party and are dropped.
pub fn recipients(html: &str) -> Result<Vec<RecipientEntry>> {
    let doc = Html::parse_fragment(html);
    let th_selector = create_selector(".modal-body table > thead > tr > th")?;
    let row_selector = create_selector(".modal-body table > tbody > tr")?;
    let td_selector = create_selector("td")?;

    let titles: Vec<String> = doc.select(&th_selector).map(inner_text).collect();
    Ok(doc
        .select(&row_selector)
        .map(|tr| {
            titles
                .iter()
                .cloned()
                .zip(tr.select(&td_selector).map(inner_text))
                .collect::<RecipientEntry>()
        })
        .filter(|entry| entry.len() > 1)
        .collect())
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::Parse(format!("invalid selector: {sel_str}")))
}

/// Text with whitespace runs collapsed, close to what `innerText` shows.
fn inner_text(el: ElementRef) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn text_content(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_owned()
}

fn first_number(el: &ElementRef, selector: &Selector) -> Option<usize> {
    el.select(selector)
        .next()
        .and_then(|found| text_content(found).parse().ok())
}
