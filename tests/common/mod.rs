//! Shared test helpers: scripted model provider, fixture gateway and invoices.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::stream::BoxStream;
use serde_json::{json, Value};

use invoicedesk::auth::Credential;
use invoicedesk::error::{DeskError, Result};
use invoicedesk::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use invoicedesk::quickbooks::{
    ensure_no_payments, Customer, Invoice, InvoiceFilter, InvoiceGateway, NewInvoice,
};
use invoicedesk::types::*;

/// Provider that replays queued responses and records every request.
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    stream_chunks: Mutex<Vec<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a plain text answer.
    pub fn queue_response(&self, text: &str) {
        self.responses.lock().unwrap().push_back(ProviderResponse {
            text: text.to_string(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        });
    }

    /// Queue a response asking for one tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, args: Value) {
        self.responses.lock().unwrap().push_back(ProviderResponse {
            tool_calls: vec![AgentToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        });
    }

    /// Chunks returned by the next `stream_text` call.
    pub fn set_stream(&self, chunks: &[&str]) {
        *self.stream_chunks.lock().unwrap() = chunks.iter().map(|c| c.to_string()).collect();
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| ProviderResponse {
            text: "Mock response".to_string(),
            ..Default::default()
        }))
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks: Vec<Result<TextStreamDelta>> = self
            .stream_chunks
            .lock()
            .unwrap()
            .drain(..)
            .map(|c| Ok(TextStreamDelta::text(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// In-memory gateway over a fixed invoice set. Counts mutations.
pub struct FixtureGateway {
    invoices: Mutex<Vec<Invoice>>,
    customers: Vec<Customer>,
    mutations: AtomicUsize,
}

impl FixtureGateway {
    pub fn new(invoices: Vec<Invoice>) -> Arc<Self> {
        Arc::new(Self {
            invoices: Mutex::new(invoices),
            customers: vec![customer("7", "Acme Corp")],
            mutations: AtomicUsize::new(0),
        })
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn find(&self, id: &str) -> Result<Invoice> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("invoice {id}")))
    }
}

#[async_trait]
impl InvoiceGateway for FixtureGateway {
    async fn query_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        let now = Utc::now();
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.matches(i, now))
            .cloned()
            .collect())
    }

    async fn invoice_by_id(&self, id: &str) -> Result<Invoice> {
        self.find(id)
    }

    async fn invoice_by_number(&self, doc_number: &str) -> Result<Invoice> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.doc_number.as_deref() == Some(doc_number))
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("invoice number {doc_number}")))
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice> {
        invoice.validate().map_err(DeskError::Validation)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let total: f64 = invoice.lines.iter().map(|l| l.amount).sum();
        let mut invoices = self.invoices.lock().unwrap();
        let n = invoices.len();
        let created = invoice_with(&(100 + n).to_string(), &(2000 + n).to_string(), total, total, 30);
        invoices.push(created.clone());
        Ok(created)
    }

    async fn update_invoice(&self, id: &str, _changes: &Value) -> Result<Invoice> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.find(id)
    }

    async fn void_invoice(&self, id: &str) -> Result<Invoice> {
        let mut invoice = self.find(id)?;
        ensure_no_payments(&invoice)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        invoice.total_amt = 0.0;
        invoice.balance = 0.0;
        Ok(invoice)
    }

    async fn delete_invoice(&self, id: &str) -> Result<()> {
        let invoice = self.find(id)?;
        ensure_no_payments(&invoice)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.invoices.lock().unwrap().retain(|i| i.id != id);
        Ok(())
    }

    async fn send_invoice(&self, id: &str, _email: Option<&str>) -> Result<Invoice> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.find(id)
    }

    async fn customers(&self, limit: u32) -> Result<Vec<Customer>> {
        Ok(self.customers.iter().take(limit as usize).cloned().collect())
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .iter()
            .find(|c| c.display_name.eq_ignore_ascii_case(name))
            .cloned())
    }
}

/// Invoice due `due_in_days` from today (negative for past due).
pub fn invoice_with(id: &str, doc: &str, total: f64, balance: f64, due_in_days: i64) -> Invoice {
    let due = (Utc::now() + Duration::days(due_in_days)).date_naive();
    serde_json::from_value(json!({
        "Id": id,
        "SyncToken": "0",
        "DocNumber": doc,
        "CustomerRef": { "value": "7", "name": "Acme Corp" },
        "TotalAmt": total,
        "Balance": balance,
        "DueDate": due.to_string(),
        "BillEmail": { "Address": "billing@acme.test" },
    }))
    .unwrap()
}

/// 1037 unpaid, 1038 paid, 1039 overdue, 1040 partially paid.
pub fn sample_invoices() -> Vec<Invoice> {
    vec![
        invoice_with("1", "1037", 150.0, 150.0, 10),
        invoice_with("2", "1038", 80.0, 0.0, -5),
        invoice_with("3", "1039", 200.0, 200.0, -3),
        invoice_with("4", "1040", 300.0, 100.0, 12),
    ]
}

pub fn customer(id: &str, name: &str) -> Customer {
    serde_json::from_value(json!({ "Id": id, "DisplayName": name })).unwrap()
}

pub fn credential_expiring_in(minutes: i64) -> Credential {
    Credential {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        realm_id: "9130".to_string(),
        expires_at: Utc::now() + Duration::minutes(minutes),
        refresh_expires_at: Some(Utc::now() + Duration::days(100)),
    }
}
