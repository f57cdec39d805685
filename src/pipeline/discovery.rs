//! Source discovery: turn a rendered results page into candidate documents.
//!
//! Two paths, tried in order:
//! 1. Table path: score every table by how many expected column-name
//!    fragments its headers contain, accept the first scoring well enough,
//!    and read rows through a fuzzy column index map (the source reorders
//!    and renames columns without notice).
//! 2. Link-scan fallback, only when no table qualifies: scan hyperlinks
//!    for the sentence-id pattern and backfill publication dates from an
//!    id-to-date map harvested from whatever tables the page does have.
//!
//! Row rejections are logged, never raised: discovery is best-effort.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;

use crate::config::ExtractorConfig;

use super::identifier;
use super::page::{PageTable, RenderedPage};
use super::types::{DiscoveryMethod, DocumentReference};
use super::window::{window_match, TargetDate};

/// Header fragments expected of the results table (accent-insensitive).
const EXPECTED_COLUMNS: [&str; 7] = [
    "numero",
    "sentencia",
    "expediente",
    "fecha",
    "publicacion",
    "magistrado",
    "sala",
];

/// Minimum fragments a table must match to be accepted.
const MIN_COLUMN_SCORE: usize = 4;

/// A date-shaped cell value, used when the mapped date column is empty.
fn date_shaped_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2} de [a-záéíóú]+ de \d{4}",
        )
        .expect("date shape regex")
    })
}

/// Column index map built from fuzzy header matching, never positions.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    number: Option<usize>,
    date: Option<usize>,
    magistrado: Option<usize>,
    expediente: Option<usize>,
}

pub struct SourceDiscovery<'a> {
    config: &'a ExtractorConfig,
}

impl<'a> SourceDiscovery<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self { config }
    }

    /// Discover up to `limit` candidates on the page, preserving encounter
    /// order. Falls back to link scanning only when no table qualifies.
    pub fn discover(
        &self,
        page: &RenderedPage,
        window: &[TargetDate],
        limit: usize,
    ) -> Vec<DocumentReference> {
        if limit == 0 || window.is_empty() {
            return Vec::new();
        }

        for (i, table) in page.tables.iter().enumerate() {
            let score = score_table(table);
            if score < MIN_COLUMN_SCORE {
                tracing::debug!(table = i, score, "Table below column score threshold");
                continue;
            }

            tracing::info!(table = i, score, "Results table accepted");
            // An accepted table is authoritative even when it has zero
            // in-window rows; an empty day is a valid outcome.
            return self.scan_table(table, page, window, limit);
        }

        tracing::info!("No qualifying table, falling back to link scan");
        self.scan_links(page, window, limit)
    }

    fn scan_table(
        &self,
        table: &PageTable,
        page: &RenderedPage,
        window: &[TargetDate],
        limit: usize,
    ) -> Vec<DocumentReference> {
        let map = column_map(table);
        let mut out = Vec::new();

        for (row_idx, row) in table.rows.iter().take(self.config.max_rows_per_table).enumerate() {
            if out.len() >= limit {
                break;
            }

            let date_cell = map
                .date
                .and_then(|i| row.get(i))
                .map(String::as_str)
                .unwrap_or("");
            let date_text = if date_cell.trim().is_empty() {
                // Empty mapped cell: scan every cell for a date-shaped value.
                row.iter()
                    .find(|cell| date_shaped_regex().is_match(cell))
                    .map(String::as_str)
                    .unwrap_or("")
            } else {
                date_cell
            };

            let Some(target) = window_match(window, date_text) else {
                tracing::debug!(row = row_idx, date = %date_text, "Row rejected: date outside window");
                continue;
            };

            let number_source = match map.number.and_then(|i| row.get(i)) {
                Some(cell) => cell.clone(),
                // No mapped number column: scan the row, minus the
                // expediente cell, whose docket codes look like sentence ids.
                None => row
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| map.expediente != Some(*i))
                    .map(|(_, c)| c.as_str())
                    .collect::<Vec<_>>()
                    .join(" | "),
            };
            let Some(canonical) = identifier::find_in_text(&number_source) else {
                tracing::debug!(row = row_idx, "Row rejected: no document number");
                continue;
            };

            let magistrado = map
                .magistrado
                .and_then(|i| row.get(i))
                .map(String::as_str)
                .filter(|m| !m.trim().is_empty());

            out.push(self.build_reference(
                canonical,
                target,
                magistrado,
                &page.url,
                DiscoveryMethod::Table,
            ));
        }

        out
    }

    fn scan_links(
        &self,
        page: &RenderedPage,
        window: &[TargetDate],
        limit: usize,
    ) -> Vec<DocumentReference> {
        let date_map = harvest_date_map(page, window);
        let mut out = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        for link in &page.links {
            if out.len() >= limit {
                break;
            }

            let Some(canonical) = identifier::find_in_text(&link.text)
                .or_else(|| identifier::find_in_text(&link.href))
            else {
                continue;
            };
            if seen.contains(&canonical) {
                continue;
            }

            // Fallback candidates must still carry a window-matching date;
            // undated links widen recall beyond the filter contract.
            let Some(target) = date_map.get(&canonical).copied() else {
                tracing::debug!(id = %canonical, "Link rejected: no window-matching date");
                continue;
            };

            seen.push(canonical.clone());
            out.push(self.build_reference(
                canonical,
                target,
                None,
                &page.url,
                DiscoveryMethod::LinkScan,
            ));
        }

        out
    }

    fn build_reference(
        &self,
        canonical: String,
        target: &TargetDate,
        magistrado: Option<&str>,
        source_page: &str,
        method: DiscoveryMethod,
    ) -> DocumentReference {
        let year = target.date.year();
        let mut title = format!(
            "Sentencia {canonical} de la Corte Constitucional ({})",
            target.label
        );
        if let Some(mp) = magistrado {
            title.push_str(&format!(", M.P. {}", mp.trim()));
        }

        tracing::info!(id = %canonical, method = %method, date = %target.date, "Candidate discovered");

        DocumentReference {
            canonical_url: self.config.document_url(&canonical, year),
            html_url: self.config.html_url(&canonical, year),
            identifier: canonical,
            title,
            source_page: source_page.to_string(),
            discovery_method: method,
            publication_date: Some(target.date),
        }
    }
}

/// Score a table by how many expected header fragments it contains.
fn score_table(table: &PageTable) -> usize {
    let joined = fold_for_match(&table.headers.join(" "));
    EXPECTED_COLUMNS
        .iter()
        .filter(|fragment| joined.contains(*fragment))
        .count()
}

/// Build the column index map by fuzzy header matching.
fn column_map(table: &PageTable) -> ColumnMap {
    let mut map = ColumnMap::default();

    for (i, header) in table.headers.iter().enumerate() {
        let folded = fold_for_match(header);
        if map.number.is_none() && (folded.contains("sentencia") || folded.contains("numero")) {
            map.number = Some(i);
        }
        // Prefer the publication date over any other date column.
        if folded.contains("publicacion") {
            map.date = Some(i);
        } else if map.date.is_none() && folded.contains("fecha") {
            map.date = Some(i);
        }
        if map.magistrado.is_none() && folded.contains("magistrado") {
            map.magistrado = Some(i);
        }
        if map.expediente.is_none() && folded.contains("expediente") {
            map.expediente = Some(i);
        }
    }

    map
}

/// Harvest an id-to-date map from every table on the page, window-filtered.
/// Used to backfill dates for link-scan candidates.
fn harvest_date_map<'w>(
    page: &RenderedPage,
    window: &'w [TargetDate],
) -> HashMap<String, &'w TargetDate> {
    let mut map = HashMap::new();

    for table in &page.tables {
        for row in &table.rows {
            let row_text = PageTable::row_text(row);
            let Some(canonical) = identifier::find_in_text(&row_text) else {
                continue;
            };
            let Some(target) = window_match(window, &row_text) else {
                continue;
            };
            map.entry(canonical).or_insert(target);
        }
    }

    map
}

/// Lowercase and strip diacritics for accent-insensitive matching.
fn fold_for_match(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::window::resolve_window;
    use chrono::NaiveDate;

    fn window_for(date: NaiveDate) -> Vec<TargetDate> {
        resolve_window(date, 2, 30)
    }

    fn full_table() -> PageTable {
        PageTable {
            headers: vec![
                "No.".into(),
                "Número de Sentencia".into(),
                "Expediente".into(),
                "Tipo".into(),
                "Fecha Sentencia".into(),
                "Fecha de Publicación".into(),
                "Magistrado Ponente".into(),
            ],
            rows: vec![
                vec![
                    "1".into(),
                    "T-100/25".into(),
                    "T-10.123".into(),
                    "Tutela".into(),
                    "20/08/2025".into(),
                    "04/09/2025".into(),
                    "Jorge Enrique Ibáñez Najar".into(),
                ],
                vec![
                    "2".into(),
                    "C-042/25".into(),
                    "D-15.479".into(),
                    "Constitucionalidad".into(),
                    "10/07/2025".into(),
                    "15/07/2025".into(),
                    "Paola Andrea Meneses".into(),
                ],
            ],
        }
    }

    fn page_with(tables: Vec<PageTable>) -> RenderedPage {
        RenderedPage {
            url: "https://example.test/buscador".into(),
            tables,
            links: vec![],
        }
    }

    #[test]
    fn seven_column_table_scores_high() {
        assert!(score_table(&full_table()) >= MIN_COLUMN_SCORE);
    }

    #[test]
    fn accent_insensitive_header_matching() {
        let table = PageTable {
            headers: vec!["NÚMERO".into(), "PUBLICACIÓN".into(), "SALA".into(), "EXPEDIENTE".into()],
            rows: vec![],
        };
        assert_eq!(score_table(&table), 4);
    }

    #[test]
    fn unrelated_table_scores_low() {
        let table = PageTable {
            headers: vec!["Nombre".into(), "Cargo".into(), "Teléfono".into()],
            rows: vec![],
        };
        assert!(score_table(&table) < MIN_COLUMN_SCORE);
    }

    #[test]
    fn column_map_prefers_publication_date() {
        let map = column_map(&full_table());
        assert_eq!(map.number, Some(1));
        assert_eq!(map.date, Some(5)); // "Fecha de Publicación", not "Fecha Sentencia"
        assert_eq!(map.magistrado, Some(6));
        assert_eq!(map.expediente, Some(2));
    }

    #[test]
    fn in_window_row_yields_one_reference() {
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());
        let page = page_with(vec![full_table()]);

        let refs = discovery.discover(&page, &window, 10);

        // Second row (15/07/2025) is outside the window and excluded.
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "T-100-25");
        assert!(refs[0].canonical_url.ends_with("/t-100-25.rtf"), "got {}", refs[0].canonical_url);
        assert_eq!(refs[0].discovery_method, DiscoveryMethod::Table);
        assert_eq!(
            refs[0].publication_date,
            NaiveDate::from_ymd_opt(2025, 9, 4)
        );
    }

    #[test]
    fn limit_stops_collection_in_encounter_order() {
        let mut table = full_table();
        table.rows[1][5] = "04/09/2025".into(); // both rows in-window
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let refs = discovery.discover(&page_with(vec![table]), &window, 1);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "T-100-25");
    }

    #[test]
    fn empty_date_cell_falls_back_to_row_scan() {
        let mut table = full_table();
        table.rows[0][5] = "".into();
        table.rows[0][3] = "Publicada el 4 de septiembre de 2025".into();
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let refs = discovery.discover(&page_with(vec![table]), &window, 10);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "T-100-25");
    }

    #[test]
    fn capitalized_month_found_by_fallback_scan() {
        let mut table = full_table();
        table.rows[0][5] = "".into();
        table.rows[0][3] = "Publicada el 4 de Septiembre de 2025".into();
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let refs = discovery.discover(&page_with(vec![table]), &window, 10);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "T-100-25");
    }

    #[test]
    fn row_without_number_rejected() {
        let mut table = full_table();
        table.rows[0][1] = "".into();
        table.rows[0][2] = "".into(); // no expediente to latch onto either
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let refs = discovery.discover(&page_with(vec![table]), &window, 10);
        assert!(refs.is_empty());
    }

    #[test]
    fn link_fallback_backfills_dates_from_tables() {
        // The qualifying columns are absent, so the table is rejected, but
        // its rows still feed the id-to-date map for the link scan.
        let weak_table = PageTable {
            headers: vec!["Documento".into(), "Detalle".into()],
            rows: vec![vec!["SU-315/25".into(), "publicada 04/09/2025".into()]],
        };
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let page = RenderedPage {
            url: "https://example.test/buscador".into(),
            tables: vec![weak_table],
            links: vec![
                crate::pipeline::page::PageLink {
                    href: "/sentencias/2025/su315-25.rtf".into(),
                    text: "SU-315/25".into(),
                },
                crate::pipeline::page::PageLink {
                    href: "/relatoria/2025/T-999-25.htm".into(),
                    text: "T-999/25".into(), // no date anywhere → rejected
                },
            ],
        };

        let refs = discovery.discover(&page, &window, 10);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "SU-315-25");
        assert_eq!(refs[0].discovery_method, DiscoveryMethod::LinkScan);
        assert!(refs[0].canonical_url.ends_with("/su315-25.rtf"));
    }

    #[test]
    fn link_fallback_deduplicates() {
        let weak_table = PageTable {
            headers: vec!["Documento".into()],
            rows: vec![vec!["T-200/25 del 04/09/2025".into()]],
        };
        let link = crate::pipeline::page::PageLink {
            href: "/sentencias/2025/t-200-25.rtf".into(),
            text: "T-200/25".into(),
        };
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let window = window_for(NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());

        let page = RenderedPage {
            url: "u".into(),
            tables: vec![weak_table],
            links: vec![link.clone(), link],
        };

        let refs = discovery.discover(&page, &window, 10);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn empty_window_discovers_nothing() {
        let config = ExtractorConfig::default();
        let discovery = SourceDiscovery::new(&config);
        let refs = discovery.discover(&page_with(vec![full_table()]), &[], 10);
        assert!(refs.is_empty());
    }
}
