//! Invoice operations seam shared by HTTP handlers and chat tools.

use async_trait::async_trait;
use chrono::Utc;

use super::query::{InvoiceFilter, MAX_RESULTS_LIMIT};
use super::types::{Customer, DashboardSummary, Invoice, NewInvoice};
use crate::error::{DeskError, Result};

/// Invoice operations against the accounting backend.
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    async fn query_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>>;

    async fn invoice_by_id(&self, id: &str) -> Result<Invoice>;

    async fn invoice_by_number(&self, doc_number: &str) -> Result<Invoice>;

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice>;

    /// Sparse update; `changes` uses QuickBooks field names.
    async fn update_invoice(&self, id: &str, changes: &serde_json::Value) -> Result<Invoice>;

    /// Void: keeps the record, zeroes the amounts.
    async fn void_invoice(&self, id: &str) -> Result<Invoice>;

    /// Permanently delete the record.
    async fn delete_invoice(&self, id: &str) -> Result<()>;

    /// Email the invoice through QuickBooks, optionally to an override address.
    async fn send_invoice(&self, id: &str, email: Option<&str>) -> Result<Invoice>;

    async fn customers(&self, limit: u32) -> Result<Vec<Customer>>;

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>>;

    /// Company profile of the connected realm.
    async fn company_info(&self) -> Result<serde_json::Value> {
        Err(DeskError::NotFound("company info".into()))
    }

    /// Aggregate totals over the company's invoices and customers.
    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let all = InvoiceFilter {
            limit: Some(MAX_RESULTS_LIMIT),
            ..Default::default()
        };
        let (invoices, customers) =
            tokio::try_join!(self.query_invoices(&all), self.customers(MAX_RESULTS_LIMIT))?;
        let mut summary = DashboardSummary::from_invoices(&invoices, Utc::now());
        summary.customer_count = customers.len();
        Ok(summary)
    }
}

/// Void and delete are only allowed while no payment has been applied.
pub fn ensure_no_payments(invoice: &Invoice) -> Result<()> {
    if invoice.is_unpaid_in_full() {
        Ok(())
    } else {
        Err(DeskError::InvoiceHasPayments {
            id: invoice.id.clone(),
            balance: invoice.balance,
            total: invoice.total_amt,
        })
    }
}

/// QuickBooks entity ids are non-empty ASCII alphanumerics; anything else is
/// rejected before it can reach a request path.
pub fn validate_entity_id(id: &str) -> Result<&str> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DeskError::Validation(format!("invalid invoice id '{id}'")));
    }
    Ok(id)
}

/// Accepts `name@host.tld`-shaped addresses.
pub fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !trimmed.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DeskError::Validation(format!("invalid email address '{trimmed}'")))
    }
}
