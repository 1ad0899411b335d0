//! Invoice, customer and dashboard routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::Result;
use crate::quickbooks::{DashboardSummary, Invoice, InvoiceFilter, NewInvoice};

const DEFAULT_CUSTOMER_LIMIT: u32 = 100;

/// Invoice JSON with the derived status alongside.
fn with_status(invoice: Invoice) -> Value {
    let status = invoice.status_at(Utc::now());
    json!({ "Invoice": invoice, "status": status })
}

pub async fn list(State(state): State<AppState>, Query(filter): Query<InvoiceFilter>) -> Result<Json<Value>> {
    let invoices = state.gateway.query_invoices(&filter).await?;
    let count = invoices.len();
    Ok(Json(json!({
        "QueryResponse": { "Invoice": invoices, "totalCount": count }
    })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    Ok(Json(with_status(state.gateway.invoice_by_id(&id).await?)))
}

pub async fn by_number(State(state): State<AppState>, Path(doc_number): Path<String>) -> Result<Json<Value>> {
    Ok(Json(with_status(state.gateway.invoice_by_number(&doc_number).await?)))
}

pub async fn create(
    State(state): State<AppState>,
    Json(invoice): Json<NewInvoice>,
) -> Result<(StatusCode, Json<Value>)> {
    let created = state.gateway.create_invoice(&invoice).await?;
    Ok((StatusCode::CREATED, Json(with_status(created))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> Result<Json<Value>> {
    Ok(Json(with_status(state.gateway.update_invoice(&id, &changes).await?)))
}

pub async fn void(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let voided = state.gateway.void_invoice(&id).await?;
    Ok(Json(json!({ "voided": true, "Invoice": voided })))
}

pub async fn permanent_delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.gateway.delete_invoice(&id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    email: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<SendRequest>>,
) -> Result<Json<Value>> {
    let email = body.and_then(|Json(b)| b.email).filter(|e| !e.trim().is_empty());
    let sent = state.gateway.send_invoice(&id, email.as_deref()).await?;
    Ok(Json(json!({ "sent": true, "Invoice": sent })))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    limit: Option<u32>,
}

pub async fn customers(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Result<Json<Value>> {
    let customers = state
        .gateway
        .customers(params.limit.unwrap_or(DEFAULT_CUSTOMER_LIMIT))
        .await?;
    Ok(Json(json!({ "QueryResponse": { "Customer": customers } })))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardSummary>> {
    Ok(Json(state.gateway.dashboard_summary().await?))
}

pub async fn company(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.gateway.company_info().await?))
}
