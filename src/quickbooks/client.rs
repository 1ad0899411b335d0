//! Authenticated QuickBooks Online REST client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::gateway::{ensure_no_payments, validate_email, validate_entity_id, InvoiceGateway};
use super::query::{self, Condition, InvoiceFilter, MAX_RESULTS_LIMIT};
use super::types::{Customer, DashboardSummary, Invoice, NewInvoice};
use crate::auth::{Credential, TokenManager};
use crate::error::{DeskError, Result};
use crate::provider::http::{bearer_headers, shared_client};

const STALE_OBJECT_CODE: &str = "5010";
const OBJECT_NOT_FOUND_CODE: &str = "610";

/// QuickBooks Online API client bound to the connected company.
pub struct QuickBooksClient {
    tokens: Arc<TokenManager>,
    base_url: String,
    minor_version: u32,
}

impl QuickBooksClient {
    pub fn new(tokens: Arc<TokenManager>, base_url: impl Into<String>, minor_version: u32) -> Self {
        Self {
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            minor_version,
        }
    }

    fn company_url(&self, credential: &Credential, path: &str) -> String {
        format!(
            "{}/v3/company/{}/{}",
            self.base_url, credential.realm_id, path
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let credential = self.tokens.valid_credential().await?;
        let minor = self.minor_version.to_string();
        let resp = shared_client()
            .get(self.company_url(&credential, path))
            .headers(bearer_headers(&credential.access_token))
            .query(params)
            .query(&[("minorversion", minor.as_str())])
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let credential = self.tokens.valid_credential().await?;
        let minor = self.minor_version.to_string();
        let mut request = shared_client()
            .post(self.company_url(&credential, path))
            .headers(bearer_headers(&credential.access_token))
            .query(params)
            .query(&[("minorversion", minor.as_str())]);
        request = match body {
            Some(body) => request.json(body),
            None => request.header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
        };
        decode(request.send().await?).await
    }

    /// Run a query-language statement and return the named entity rows.
    pub async fn run_query<T: DeserializeOwned>(&self, sql: &str, entity: &str) -> Result<Vec<T>> {
        debug!(query = sql, "QuickBooks query");
        let envelope: QueryEnvelope = self.get_json("query", &[("query", sql)]).await?;
        match envelope.query_response.get(entity) {
            Some(rows) => Ok(serde_json::from_value(rows.clone())?),
            None => Ok(Vec::new()),
        }
    }

    async fn customer_ids_matching(&self, needle: &str) -> Result<Vec<String>> {
        let customers: Vec<Customer> = self
            .run_query(&query::customers_matching(needle), "Customer")
            .await?;
        Ok(customers.into_iter().map(|c| c.id).collect())
    }

    async fn mutate(&self, invoice: &Invoice, operation: &str) -> Result<InvoiceEnvelope> {
        let sync_token = invoice.sync_token.clone().ok_or_else(|| {
            DeskError::quickbooks(200, format!("invoice {} has no SyncToken", invoice.id))
        })?;
        let body = serde_json::json!({ "Id": invoice.id, "SyncToken": sync_token });
        self.post_json("invoice", &[("operation", operation)], Some(&body))
            .await
    }
}

#[async_trait]
impl InvoiceGateway for QuickBooksClient {
    async fn query_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        let now = Utc::now();
        let mut query = filter.to_query(now.date_naive())?;
        if let Some(needle) = filter.customer_needle() {
            let ids = self.customer_ids_matching(needle).await?;
            if ids.is_empty() {
                debug!(customer = needle, "no customer matches invoice filter");
                return Ok(Vec::new());
            }
            query = query.and(Condition::customer_in(&ids)?);
        }
        let sql = query.to_sql();
        let invoices: Vec<Invoice> = self.run_query(&sql, "Invoice").await?;
        Ok(invoices
            .into_iter()
            .filter(|inv| filter.matches(inv, now))
            .collect())
    }

    async fn invoice_by_id(&self, id: &str) -> Result<Invoice> {
        let id = validate_entity_id(id)?;
        let envelope: InvoiceEnvelope = self.get_json(&format!("invoice/{id}"), &[]).await?;
        Ok(envelope.invoice)
    }

    async fn invoice_by_number(&self, doc_number: &str) -> Result<Invoice> {
        let sql = query::by_doc_number(doc_number)?;
        let mut rows: Vec<Invoice> = self.run_query(&sql, "Invoice").await?;
        if rows.is_empty() {
            return Err(DeskError::NotFound(format!("invoice number {doc_number}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice> {
        invoice.validate().map_err(DeskError::Validation)?;
        if let Some(ref email) = invoice.email {
            validate_email(email)?;
        }
        let envelope: InvoiceEnvelope = self
            .post_json("invoice", &[], Some(&invoice.to_payload()))
            .await?;
        info!(invoice_id = %envelope.invoice.id, customer_id = %invoice.customer_id, "invoice created");
        Ok(envelope.invoice)
    }

    async fn update_invoice(&self, id: &str, changes: &serde_json::Value) -> Result<Invoice> {
        let Some(fields) = changes.as_object() else {
            return Err(DeskError::Validation("update body must be an object".into()));
        };
        let current = self.invoice_by_id(id).await?;
        let mut body = serde_json::Map::new();
        for (key, value) in fields {
            if key != "Id" && key != "SyncToken" && key != "sparse" {
                body.insert(key.clone(), value.clone());
            }
        }
        body.insert("Id".into(), current.id.clone().into());
        body.insert(
            "SyncToken".into(),
            current.sync_token.clone().unwrap_or_default().into(),
        );
        body.insert("sparse".into(), true.into());
        let envelope: InvoiceEnvelope = self
            .post_json("invoice", &[], Some(&serde_json::Value::Object(body)))
            .await?;
        info!(invoice_id = %id, "invoice updated");
        Ok(envelope.invoice)
    }

    async fn void_invoice(&self, id: &str) -> Result<Invoice> {
        let current = self.invoice_by_id(id).await?;
        ensure_no_payments(&current)?;
        let envelope = self.mutate(&current, "void").await?;
        info!(invoice_id = %id, "invoice voided");
        Ok(envelope.invoice)
    }

    async fn delete_invoice(&self, id: &str) -> Result<()> {
        let current = self.invoice_by_id(id).await?;
        ensure_no_payments(&current)?;
        self.mutate(&current, "delete").await?;
        info!(invoice_id = %id, "invoice permanently deleted");
        Ok(())
    }

    async fn send_invoice(&self, id: &str, email: Option<&str>) -> Result<Invoice> {
        let id = validate_entity_id(id)?;
        let mut params = Vec::new();
        if let Some(email) = email {
            validate_email(email)?;
            params.push(("sendTo", email.trim()));
        }
        let envelope: InvoiceEnvelope = self
            .post_json(&format!("invoice/{id}/send"), &params, None)
            .await?;
        info!(invoice_id = %id, "invoice emailed");
        Ok(envelope.invoice)
    }

    async fn customers(&self, limit: u32) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT * FROM Customer ORDER BY DisplayName ASC MAXRESULTS {}",
            limit.clamp(1, MAX_RESULTS_LIMIT)
        );
        self.run_query(&sql, "Customer").await
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        let mut rows: Vec<Customer> = self
            .run_query(&query::customer_by_name(name), "Customer")
            .await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    async fn company_info(&self) -> Result<serde_json::Value> {
        let credential = self.tokens.valid_credential().await?;
        let path = format!("companyinfo/{}", credential.realm_id);
        let mut body: serde_json::Value = self.get_json(&path, &[]).await?;
        if let Some(info) = body.get_mut("CompanyInfo") {
            return Ok(info.take());
        }
        Ok(body)
    }

    /// Invoices, customers, items and payments are fetched as one parallel batch.
    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let invoice_sql = format!("SELECT * FROM Invoice MAXRESULTS {MAX_RESULTS_LIMIT}");
        let customer_sql = format!("SELECT * FROM Customer MAXRESULTS {MAX_RESULTS_LIMIT}");
        let item_sql = format!("SELECT * FROM Item MAXRESULTS {MAX_RESULTS_LIMIT}");
        let payment_sql = format!("SELECT * FROM Payment MAXRESULTS {MAX_RESULTS_LIMIT}");
        let (invoices, customers, items, payments) = tokio::try_join!(
            self.run_query::<Invoice>(&invoice_sql, "Invoice"),
            self.run_query::<serde_json::Value>(&customer_sql, "Customer"),
            self.run_query::<serde_json::Value>(&item_sql, "Item"),
            self.run_query::<serde_json::Value>(&payment_sql, "Payment"),
        )?;
        let mut summary = DashboardSummary::from_invoices(&invoices, Utc::now());
        summary.customer_count = customers.len();
        summary.item_count = items.len();
        summary.payment_count = payments.len();
        summary.payments_received = payments
            .iter()
            .filter_map(|p| p.get("TotalAmt").and_then(|v| v.as_f64()))
            .sum();
        Ok(summary)
    }
}

#[derive(Deserialize)]
struct QueryEnvelope {
    #[serde(rename = "QueryResponse", default)]
    query_response: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct InvoiceEnvelope {
    #[serde(rename = "Invoice")]
    invoice: Invoice,
}

#[derive(Debug, Deserialize)]
struct FaultEnvelope {
    #[serde(rename = "Fault")]
    fault: Fault,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(rename = "Error", default)]
    errors: Vec<FaultError>,
}

#[derive(Debug, Deserialize)]
struct FaultError {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Detail", default)]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if (200..300).contains(&status) {
        // Faults can arrive with a 2xx status too.
        if let Ok(envelope) = serde_json::from_str::<FaultEnvelope>(&text) {
            return Err(fault_to_error(status, envelope, &text));
        }
        return Ok(serde_json::from_str(&text)?);
    }
    if status == 401 {
        warn!("QuickBooks rejected the access token");
        return Err(DeskError::NotAuthenticated);
    }
    match serde_json::from_str::<FaultEnvelope>(&text) {
        Ok(envelope) => Err(fault_to_error(status, envelope, &text)),
        Err(_) => Err(DeskError::quickbooks(status, text)),
    }
}

fn fault_to_error(status: u16, envelope: FaultEnvelope, raw: &str) -> DeskError {
    let first = envelope.fault.errors.first();
    let message = first
        .map(|e| match e.detail {
            Some(ref detail) if !detail.is_empty() => format!("{}: {detail}", e.message),
            _ => e.message.clone(),
        })
        .unwrap_or_else(|| "unknown fault".to_string());
    match first.and_then(|e| e.code.as_deref()) {
        Some(STALE_OBJECT_CODE) => DeskError::ConcurrencyConflict(message),
        Some(OBJECT_NOT_FOUND_CODE) => DeskError::NotFound(message),
        _ => DeskError::Upstream {
            service: "QuickBooks",
            status,
            message,
            details: serde_json::from_str(raw).ok(),
        },
    }
}
