//! Rendered-page access.
//!
//! The browser/session machinery is an external collaborator; the pipeline
//! only consumes its `navigate`/`evaluate` capability, modeled here as the
//! `PageDriver` trait returning a page pre-digested into structured data
//! (tables and links). `HttpPageDriver` is the default implementation for
//! sources that render server-side; a browser-backed driver plugs in behind
//! the same trait.

use scraper::{ElementRef, Html, Selector};

use super::PipelineError;

/// A results page reduced to the structures discovery cares about.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub url: String,
    pub tables: Vec<PageTable>,
    pub links: Vec<PageLink>,
}

/// A table-like element: header texts plus cell rows.
#[derive(Debug, Clone, Default)]
pub struct PageTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PageTable {
    /// Full text of a row, for date and identifier scans.
    pub fn row_text(row: &[String]) -> String {
        row.join(" | ")
    }
}

/// A hyperlink with its visible text.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

/// Navigation capability consumed from the external session collaborator.
pub trait PageDriver {
    fn navigate(&self, url: &str) -> Result<RenderedPage, PipelineError>;
}

/// Driver for server-rendered pages: plain HTTP GET + HTML digestion.
pub struct HttpPageDriver {
    client: reqwest::blocking::Client,
}

impl HttpPageDriver {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl PageDriver for HttpPageDriver {
    fn navigate(&self, url: &str) -> Result<RenderedPage, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| PipelineError::Navigation(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Navigation(format!(
                "{url}: status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .map_err(|e| PipelineError::Navigation(format!("{url}: {e}")))?;

        Ok(digest_html(&body, url))
    }
}

/// Reduce an HTML document to tables and links.
pub fn digest_html(html: &str, url: &str) -> RenderedPage {
    let document = Html::parse_document(html);

    // Static selectors; parse failure would be a programming error.
    let table_sel = Selector::parse("table").expect("table selector");
    let tr_sel = Selector::parse("tr").expect("tr selector");
    let cell_sel = Selector::parse("th, td").expect("cell selector");
    let link_sel = Selector::parse("a[href]").expect("link selector");

    let mut tables = Vec::new();
    for table in document.select(&table_sel) {
        let mut rows_iter = table.select(&tr_sel);

        let headers = match rows_iter.next() {
            Some(first) => cell_texts(first, &cell_sel),
            None => continue,
        };

        let rows: Vec<Vec<String>> = rows_iter
            .map(|tr| cell_texts(tr, &cell_sel))
            .filter(|cells| !cells.is_empty())
            .collect();

        tables.push(PageTable { headers, rows });
    }

    let links = document
        .select(&link_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?.to_string();
            let text = element_text(a);
            Some(PageLink { href, text })
        })
        .collect();

    RenderedPage {
        url: url.to_string(),
        tables,
        links,
    }
}

fn cell_texts(row: ElementRef<'_>, cell_sel: &Selector) -> Vec<String> {
    row.select(cell_sel).map(element_text).collect()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
        <table>
          <tr><th>No.</th><th>Sentencia</th><th>Fecha Publicación</th></tr>
          <tr><td>1</td><td>T-100/25</td><td>04/09/2025</td></tr>
          <tr><td>2</td><td>C-042/25</td><td>03/09/2025</td></tr>
        </table>
        <a href="/sentencias/2025/t-100-25.rtf">T-100/25</a>
        <a href="/relatoria">Relatoría</a>
        </body></html>
    "#;

    #[test]
    fn digest_extracts_headers_and_rows() {
        let page = digest_html(SAMPLE, "https://example.test/buscador");
        assert_eq!(page.tables.len(), 1);
        let table = &page.tables[0];
        assert_eq!(table.headers, vec!["No.", "Sentencia", "Fecha Publicación"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "T-100/25");
    }

    #[test]
    fn digest_extracts_links() {
        let page = digest_html(SAMPLE, "https://example.test/buscador");
        assert_eq!(page.links.len(), 2);
        assert!(page.links[0].href.ends_with("t-100-25.rtf"));
        assert_eq!(page.links[0].text, "T-100/25");
    }

    #[test]
    fn nested_markup_text_is_flattened() {
        let html = r#"<table><tr><th><span>Fecha</span> <b>Sentencia</b></th></tr>
                      <tr><td>  4 de  septiembre  de 2025 </td></tr></table>"#;
        let page = digest_html(html, "u");
        assert_eq!(page.tables[0].headers[0], "Fecha Sentencia");
        assert_eq!(page.tables[0].rows[0][0], "4 de septiembre de 2025");
    }

    #[test]
    fn empty_document_digests_cleanly() {
        let page = digest_html("<html><body></body></html>", "u");
        assert!(page.tables.is_empty());
        assert!(page.links.is_empty());
    }

    #[test]
    fn row_text_joins_cells() {
        let row = vec!["1".to_string(), "T-100/25".to_string()];
        assert_eq!(PageTable::row_text(&row), "1 | T-100/25");
    }
}
