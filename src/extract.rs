//! Field extraction from instrument detail pages.
//!
//! Pulls the ticker, NAV, as-of date, and yield-to-worst out of the raw
//! page content and normalizes them into primitive values. Extraction is
//! pure and synchronous: the same input text always yields the same output.
//!
//! NAV and YTM are parsed as exact decimals rather than binary floats so
//! the later fixed-point scaling never picks up float rounding artifacts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::debug;

use crate::types::OracleError;

// ---------------------------------------------------------------------------
// Page structure
// ---------------------------------------------------------------------------

const TICKER_SELECTOR: &str = "p.identifier";
const DATE_SELECTOR: &str = "span.header-nav-label";
const NAV_SELECTOR: &str = "span.header-nav-data";
const YTM_SELECTOR: &str = "div.col-yieldToWorst span.data";
/// Legal disclaimer interstitial, when present, links through to the real
/// detail page here.
const DISCLAIMER_SELECTOR: &str = "div.cta a";

/// Caption width on the as-of label, e.g. `"As of date"`.
const AS_OF_CAPTION_LEN: usize = 10;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d %b %Y", "%b %d, %Y", "%d/%m/%Y"];

// ---------------------------------------------------------------------------
// Extracted fields
// ---------------------------------------------------------------------------

/// Raw fields pulled off a page, normalized but not yet validated.
/// The validator turns these into an `Observation`.
#[derive(Debug, Clone)]
pub struct ExtractedFields {
    pub ticker: String,
    /// Epoch seconds at midnight UTC of the parsed calendar day.
    pub as_of_date: i64,
    pub nav: Decimal,
    /// Fraction, already divided by 100.
    pub ytm: Decimal,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct FieldExtractor {
    ticker: Selector,
    date: Selector,
    nav: Selector,
    ytm: Selector,
    disclaimer: Selector,
}

impl FieldExtractor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            ticker: selector(TICKER_SELECTOR)?,
            date: selector(DATE_SELECTOR)?,
            nav: selector(NAV_SELECTOR)?,
            ytm: selector(YTM_SELECTOR)?,
            disclaimer: selector(DISCLAIMER_SELECTOR)?,
        })
    }

    /// The disclaimer redirect target, when the page is an interstitial.
    pub fn disclaimer_target(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.disclaimer)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    }

    /// Extract and normalize all fields, or fail on the first field that is
    /// absent or unparseable.
    pub fn extract(&self, html: &str) -> Result<ExtractedFields, OracleError> {
        let doc = Html::parse_document(html);

        let ticker = text_of(&doc, &self.ticker, "ticker")?;
        let date_raw = text_of(&doc, &self.date, "as_of_date")?;
        let nav_raw = text_of(&doc, &self.nav, "nav")?;
        let ytm_raw = text_of(&doc, &self.ytm, "ytm")?;

        debug!(%ticker, %date_raw, %nav_raw, %ytm_raw, "Raw fields extracted");

        Ok(ExtractedFields {
            ticker,
            as_of_date: parse_as_of_date(&date_raw)?,
            nav: parse_nav(&nav_raw)?,
            ytm: parse_ytm(&ytm_raw)?,
        })
    }
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector `{css}`: {e}"))
}

/// Trimmed text of the first match, or an extraction error when the
/// selector yields nothing.
fn text_of(doc: &Html, sel: &Selector, field: &'static str) -> Result<String, OracleError> {
    doc.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(OracleError::Extraction {
            field,
            message: "selector matched nothing or empty text".to_string(),
        })
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// Slice from the first ASCII digit onward, keeping a sign glued to that
/// digit. Strips currency codes and captions of any width (`GBP 100.23`,
/// `GBP100.23`, and `GBP -1.23` all keep their value).
fn numeric_tail(raw: &str) -> &str {
    match raw.find(|c: char| c.is_ascii_digit()) {
        Some(i) => {
            let start = raw[..i]
                .chars()
                .next_back()
                .filter(|c| *c == '-' || *c == '+')
                .map(|c| i - c.len_utf8())
                .unwrap_or(i);
            &raw[start..]
        }
        None => "",
    }
}

/// NAV: currency-code prefix stripped, parsed as an exact decimal.
pub(crate) fn parse_nav(raw: &str) -> Result<Decimal, OracleError> {
    numeric_tail(raw.trim())
        .parse::<Decimal>()
        .map_err(|e| OracleError::Extraction {
            field: "nav",
            message: format!("`{raw}`: {e}"),
        })
}

/// Yield-to-worst: trailing percent symbol stripped, divided by 100 to a
/// fraction.
pub(crate) fn parse_ytm(raw: &str) -> Result<Decimal, OracleError> {
    let body = raw.trim().trim_end_matches('%').trim_end();
    body.parse::<Decimal>()
        .map(|v| v / Decimal::ONE_HUNDRED)
        .map_err(|e| OracleError::Extraction {
            field: "ytm",
            message: format!("`{raw}`: {e}"),
        })
}

/// As-of date: caption prefix stripped, parsed as a calendar date/time and
/// reduced to midnight UTC of that day regardless of any time component.
pub(crate) fn parse_as_of_date(raw: &str) -> Result<i64, OracleError> {
    let trimmed = raw.trim();
    let after_caption = trimmed
        .get(AS_OF_CAPTION_LEN..)
        .unwrap_or("")
        .trim_start_matches([':', ' ']);

    parse_calendar_day(after_caption)
        .or_else(|| parse_calendar_day(numeric_tail(trimmed)))
        .map(|day| day.and_time(NaiveTime::MIN).and_utc().timestamp())
        .ok_or_else(|| OracleError::Extraction {
            field: "as_of_date",
            message: format!("unparseable date `{raw}`"),
        })
}

fn parse_calendar_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
