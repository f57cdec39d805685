//! Business-day target window resolution.
//!
//! The court publishes on business days, but its pages render dates in
//! several formats ("4 de septiembre de 2025", "04/09/2025", "04-09-2025",
//! ISO). Each target date therefore carries every representation so that
//! discovery can match by substring against whatever the source shows.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Spanish month names, indexed by `month() - 1`.
const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// A business day the run is filtering for, with all its string forms.
#[derive(Debug, Clone)]
pub struct TargetDate {
    pub date: NaiveDate,
    /// Human-readable label, e.g. "4 de septiembre de 2025".
    pub label: String,
    /// Every representation used for substring matching.
    pub variants: Vec<String>,
}

impl TargetDate {
    pub fn new(date: NaiveDate) -> Self {
        let month_name = SPANISH_MONTHS[date.month0() as usize];
        let label = format!("{} de {} de {}", date.day(), month_name, date.year());

        let variants = vec![
            date.format("%d/%m/%Y").to_string(),
            date.format("%d-%m-%Y").to_string(),
            label.clone(),
            label.replace(" de ", "/"),
            date.format("%Y-%m-%d").to_string(),
        ];

        Self { date, label, variants }
    }

    /// Case-insensitive substring match of any representation.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.variants.iter().any(|v| haystack.contains(&v.to_lowercase()))
    }
}

/// Collect up to `count` business days walking backward from `reference`
/// (inclusive), scanning at most `max_lookback` calendar days.
///
/// The result is descending by construction. A partial or empty list is a
/// valid outcome; exhausting the lookback never blocks or errors.
pub fn resolve_window(reference: NaiveDate, count: usize, max_lookback: usize) -> Vec<TargetDate> {
    let mut targets = Vec::with_capacity(count);
    let mut current = reference;
    let mut scanned = 0;

    while targets.len() < count && scanned < max_lookback {
        if is_business_day(current) {
            targets.push(TargetDate::new(current));
        }
        current -= Duration::days(1);
        scanned += 1;
    }

    targets
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// True if any target in the window matches the text.
pub fn window_match<'a>(window: &'a [TargetDate], text: &str) -> Option<&'a TargetDate> {
    window.iter().find(|t| t.matches(text))
}
