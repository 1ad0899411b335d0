//! Invoice query construction for the QuickBooks query language.
//!
//! Conditions are built from allow-listed field/operator pairs with typed
//! literals, so user-supplied text can only ever appear inside an escaped
//! string literal.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::types::Invoice;
use crate::error::{DeskError, Result};

pub const DEFAULT_MAX_RESULTS: u32 = 50;
pub const MAX_RESULTS_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InvoiceField {
    Id,
    DocNumber,
    CustomerRef,
    TotalAmt,
    Balance,
    TxnDate,
    DueDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Date,
}

impl InvoiceField {
    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::DocNumber | Self::CustomerRef => FieldKind::Text,
            Self::TotalAmt | Self::Balance => FieldKind::Number,
            Self::TxnDate | Self::DueDate => FieldKind::Date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    TextList(Vec<String>),
    Number(f64),
    Date(NaiveDate),
}

impl Literal {
    fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) | Self::TextList(_) => FieldKind::Text,
            Self::Number(_) => FieldKind::Number,
            Self::Date(_) => FieldKind::Date,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "'{}'", escape_text(text)),
            Self::TextList(items) => {
                let quoted: Vec<String> = items
                    .iter()
                    .map(|item| format!("'{}'", escape_text(item)))
                    .collect();
                write!(f, "({})", quoted.join(", "))
            }
            Self::Number(n) => write!(f, "'{n}'"),
            Self::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// A single validated `field op literal` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: InvoiceField,
    op: Operator,
    value: Literal,
}

impl Condition {
    pub fn new(field: InvoiceField, op: Operator, value: Literal) -> Result<Self> {
        let kind = field.kind();
        if value.kind() != kind {
            return Err(DeskError::Validation(format!(
                "{field} cannot be compared with {value}"
            )));
        }
        match (&value, op) {
            (Literal::TextList(items), Operator::In) if !items.is_empty() => {}
            (Literal::TextList(_), Operator::In) => {
                return Err(DeskError::Validation(format!("{field} IN needs at least one value")));
            }
            (Literal::TextList(_), _) | (_, Operator::In) => {
                return Err(DeskError::Validation(format!(
                    "{field} IN takes a list of values"
                )));
            }
            (_, op) if kind == FieldKind::Text && op != Operator::Eq => {
                return Err(DeskError::Validation(format!(
                    "{field} only supports equality"
                )));
            }
            _ => {}
        }
        if let Literal::Number(n) = value {
            if !n.is_finite() {
                return Err(DeskError::Validation(format!("{field} needs a finite number")));
            }
        }
        Ok(Self { field, op, value })
    }

    /// `CustomerRef = id` for one id, `CustomerRef IN (...)` for several.
    pub fn customer_in(ids: &[String]) -> Result<Self> {
        match ids {
            [id] => Self::new(InvoiceField::CustomerRef, Operator::Eq, Literal::Text(id.clone())),
            _ => Self::new(InvoiceField::CustomerRef, Operator::In, Literal::TextList(ids.to_vec())),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.as_str(), self.value)
    }
}

/// `SELECT * FROM Invoice ...` builder.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceQuery {
    conditions: Vec<Condition>,
    max_results: u32,
    start_position: Option<u32>,
}

impl Default for InvoiceQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceQuery {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            start_position: None,
        }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn max_results(mut self, n: u32) -> Self {
        self.max_results = n.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    /// 1-based offset, as QuickBooks expects.
    pub fn start_position(mut self, position: u32) -> Self {
        self.start_position = Some(position.max(1));
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT * FROM Invoice");
        if !self.conditions.is_empty() {
            let joined = self
                .conditions
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(" WHERE ");
            sql.push_str(&joined);
        }
        sql.push_str(&format!(
            " ORDER BY {} DESC MAXRESULTS {}",
            InvoiceField::TxnDate,
            self.max_results
        ));
        if let Some(pos) = self.start_position {
            sql.push_str(&format!(" STARTPOSITION {pos}"));
        }
        sql
    }
}

/// Status filter accepted by list/search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    All,
    Paid,
    Unpaid,
    Overdue,
}

/// Recognized invoice filter keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusFilter>,
    /// Case-insensitive substring of the customer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl InvoiceFilter {
    pub fn with_status(status: StatusFilter) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Trimmed customer-name needle, if one was given.
    pub fn customer_needle(&self) -> Option<&str> {
        self.customer
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
    }

    /// Translate into a server-side query.
    ///
    /// A customer name cannot be matched by the invoice query itself; callers
    /// resolve it to customer ids and add [`Condition::customer_in`].
    pub fn to_query(&self, today: NaiveDate) -> Result<InvoiceQuery> {
        let mut query = InvoiceQuery::new();
        match self.status {
            Some(StatusFilter::Paid) => {
                query = query.and(Condition::new(InvoiceField::Balance, Operator::Eq, Literal::Number(0.0))?);
            }
            Some(StatusFilter::Unpaid) => {
                query = query.and(Condition::new(InvoiceField::Balance, Operator::Gt, Literal::Number(0.0))?);
            }
            Some(StatusFilter::Overdue) => {
                // Due instant is midnight UTC, so an invoice due today is already overdue.
                query = query
                    .and(Condition::new(InvoiceField::Balance, Operator::Gt, Literal::Number(0.0))?)
                    .and(Condition::new(InvoiceField::DueDate, Operator::Le, Literal::Date(today))?);
            }
            Some(StatusFilter::All) | None => {}
        }
        if let Some(ref id) = self.customer_id {
            query = query.and(Condition::new(
                InvoiceField::CustomerRef,
                Operator::Eq,
                Literal::Text(id.clone()),
            )?);
        }
        if let Some(min) = self.min_amount {
            query = query.and(Condition::new(InvoiceField::TotalAmt, Operator::Ge, Literal::Number(min))?);
        }
        if let Some(max) = self.max_amount {
            query = query.and(Condition::new(InvoiceField::TotalAmt, Operator::Le, Literal::Number(max))?);
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(DeskError::Validation(format!(
                    "minAmount {min} is greater than maxAmount {max}"
                )));
            }
        }
        if let Some(start) = self.start_date {
            query = query.and(Condition::new(InvoiceField::TxnDate, Operator::Ge, Literal::Date(start))?);
        }
        if let Some(end) = self.end_date {
            query = query.and(Condition::new(InvoiceField::TxnDate, Operator::Le, Literal::Date(end))?);
        }
        query = query.max_results(self.limit.unwrap_or(DEFAULT_MAX_RESULTS));
        if let Some(offset) = self.offset {
            query = query.start_position(offset.saturating_add(1));
        }
        Ok(query)
    }

    /// Client-side predicate equivalent to the server-side query.
    pub fn matches(&self, invoice: &Invoice, now: DateTime<Utc>) -> bool {
        let status_ok = match self.status {
            Some(StatusFilter::Paid) => invoice.balance <= 0.0,
            Some(StatusFilter::Unpaid) => invoice.balance > 0.0,
            Some(StatusFilter::Overdue) => {
                invoice.status_at(now) == super::types::InvoiceStatus::Overdue
            }
            Some(StatusFilter::All) | None => true,
        };
        let customer_ok = match self.customer_needle() {
            Some(needle) => invoice
                .customer_name()
                .is_some_and(|name| name.to_lowercase().contains(&needle.to_lowercase())),
            None => true,
        };
        let customer_id_ok = match self.customer_id {
            Some(ref id) => invoice.customer_ref.as_ref().is_some_and(|c| &c.value == id),
            None => true,
        };
        let min_ok = self.min_amount.map_or(true, |min| invoice.total_amt >= min);
        let max_ok = self.max_amount.map_or(true, |max| invoice.total_amt <= max);
        let start_ok = match (self.start_date, invoice.txn_date) {
            (Some(start), Some(date)) => date >= start,
            (Some(_), None) => false,
            _ => true,
        };
        let end_ok = match (self.end_date, invoice.txn_date) {
            (Some(end), Some(date)) => date <= end,
            (Some(_), None) => false,
            _ => true,
        };
        status_ok && customer_ok && customer_id_ok && min_ok && max_ok && start_ok && end_ok
    }

    /// Short human label used by the UI slider header.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(status.to_string());
        }
        if let Some(ref customer) = self.customer {
            parts.push(format!("customer:{customer}"));
        }
        if self.min_amount.is_some() || self.max_amount.is_some() {
            parts.push("amount".to_string());
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            parts.push("date".to_string());
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(",")
        }
    }
}

/// Query for a single invoice by its document number.
pub fn by_doc_number(doc_number: &str) -> Result<String> {
    let trimmed = doc_number.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        return Err(DeskError::Validation("invoice number is required".into()));
    }
    let query = InvoiceQuery::new()
        .and(Condition::new(
            InvoiceField::DocNumber,
            Operator::Eq,
            Literal::Text(trimmed.to_string()),
        )?)
        .max_results(1);
    Ok(query.to_sql())
}

/// Customers whose display name contains `needle`.
pub fn customers_matching(needle: &str) -> String {
    format!(
        "SELECT * FROM Customer WHERE DisplayName LIKE '%{}%' MAXRESULTS {MAX_RESULTS_LIMIT}",
        escape_text(needle.trim())
    )
}

/// Query for a customer by exact display name.
pub fn customer_by_name(name: &str) -> String {
    format!(
        "SELECT * FROM Customer WHERE DisplayName = {} MAXRESULTS 1",
        Literal::Text(name.trim().to_string())
    )
}
