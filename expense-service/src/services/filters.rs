//! Query-string driven range filters for transaction listings.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use mongodb::bson::{doc, Bson, Document};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::error::ServiceError;
use crate::models::Transaction;

static DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

const BAD_DATE_FORMAT: &str = "Query parameters are not in the format 'YYYY-MM-DD'";

/// Filtering query parameters accepted by the user transaction listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    #[serde(rename = "upTo")]
    pub up_to: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Inclusive range; an absent bound is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<T> {
    pub gte: Option<T>,
    pub lte: Option<T>,
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self {
            gte: None,
            lte: None,
        }
    }
}

pub type DateFilter = Range<DateTime<Utc>>;
pub type AmountFilter = Range<f64>;

impl<T: PartialOrd> Range<T> {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.gte.as_ref().map_or(true, |lo| value >= lo)
            && self.lte.as_ref().map_or(true, |hi| value <= hi)
    }
}

impl<T: Clone + Into<Bson>> Range<T> {
    /// `{"$gte": .., "$lte": ..}` with only the present bounds, or `None`
    /// when the range is unconstrained.
    pub fn to_document(&self) -> Option<Document> {
        let mut doc = Document::new();
        if let Some(lo) = &self.gte {
            doc.insert("$gte", lo.clone());
        }
        if let Some(hi) = &self.lte {
            doc.insert("$lte", hi.clone());
        }
        (!doc.is_empty()).then_some(doc)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_day(raw: &str) -> Result<NaiveDate, ServiceError> {
    if !DAY_RE.is_match(raw) {
        return Err(ServiceError::validation(BAD_DATE_FORMAT));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ServiceError::validation(BAD_DATE_FORMAT))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::default()))
}

fn end_of(day: NaiveDate) -> DateTime<Utc> {
    let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
    Utc.from_utc_datetime(&day.and_time(last_ms))
}

/// Builds the date range from `date`, `from` and `upTo` (`YYYY-MM-DD`, UTC).
///
/// `date` selects one whole day and cannot be combined with the other two.
/// Bounds are not checked against each other.
pub fn build_date_filter(params: &TransactionQuery) -> Result<DateFilter, ServiceError> {
    let date = present(&params.date);
    let from = present(&params.from);
    let up_to = present(&params.up_to);

    if date.is_some() && (from.is_some() || up_to.is_some()) {
        return Err(ServiceError::validation(
            "cannot include 'date' with 'from' or 'upTo'",
        ));
    }

    if let Some(day) = date {
        let day = parse_day(day)?;
        return Ok(Range {
            gte: Some(start_of(day)),
            lte: Some(end_of(day)),
        });
    }

    Ok(Range {
        gte: from.map(parse_day).transpose()?.map(start_of),
        lte: up_to.map(parse_day).transpose()?.map(end_of),
    })
}

fn parse_amount(raw: &str) -> Result<f64, ServiceError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| ServiceError::validation("A parameter is not a numerical value"))
}

/// Builds the amount range from `min` and `max`. No ordering check.
pub fn build_amount_filter(params: &TransactionQuery) -> Result<AmountFilter, ServiceError> {
    Ok(Range {
        gte: present(&params.min).map(parse_amount).transpose()?,
        lte: present(&params.max).map(parse_amount).transpose()?,
    })
}

/// Selection applied to transaction listings; empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub usernames: Option<Vec<String>>,
    pub category: Option<String>,
    pub date: DateFilter,
    pub amount: AmountFilter,
}

impl TransactionFilter {
    pub fn for_user(username: &str) -> Self {
        Self {
            usernames: Some(vec![username.to_string()]),
            ..Default::default()
        }
    }

    pub fn for_users(usernames: Vec<String>) -> Self {
        Self {
            usernames: Some(usernames),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.usernames
            .as_ref()
            .map_or(true, |names| names.contains(&tx.username))
            && self
                .category
                .as_ref()
                .map_or(true, |c| *c == tx.category_type)
            && self.date.contains(&tx.date)
            && self.amount.contains(&tx.amount)
    }

    /// Mongo `$match` document for this selection.
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(names) = &self.usernames {
            filter.insert("username", doc! { "$in": names.clone() });
        }
        if let Some(category) = &self.category {
            filter.insert("type", category.clone());
        }
        if let Some(range) = self.date.to_document() {
            filter.insert("date", range);
        }
        if let Some(range) = self.amount.to_document() {
            filter.insert("amount", range);
        }
        filter
    }
}
