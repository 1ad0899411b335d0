//! Invoice tools offered to the chat model.
//!
//! Each tool is a thin handler over [`InvoiceGateway`]; business rules such as
//! the no-payments precondition on void/delete live in the gateway, not here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::arguments::ToolArguments;
use super::tool::{AgentTool, Tool, ToolRegistry};
use super::types::{AgentToolParameters, ParameterBuilder, ToolOutput, UiDirective};
use crate::error::{DeskError, Result};
use crate::quickbooks::{validate_email, Invoice, InvoiceFilter, InvoiceGateway, NewInvoice, NewLine};

pub const SEARCH_INVOICES: &str = "search_invoices";
pub const SHOW_INVOICE_LIST: &str = "show_invoice_list";
pub const GET_INVOICE_BY_NUMBER: &str = "get_invoice_by_number";
pub const CREATE_INVOICE: &str = "create_invoice";
pub const VOID_INVOICE: &str = "void_invoice";
pub const DELETE_INVOICE: &str = "delete_invoice";
pub const EMAIL_INVOICE: &str = "email_invoice";

const STATUS_VALUES: &[&str] = &["all", "paid", "unpaid", "overdue"];

/// Registry holding every invoice tool.
pub fn invoice_registry(gateway: Arc<dyn InvoiceGateway>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(search_invoices_tool(gateway.clone()))
        .register(show_invoice_list_tool(gateway.clone()))
        .register(get_invoice_by_number_tool(gateway.clone()))
        .register(create_invoice_tool(gateway.clone()))
        .register(void_invoice_tool(gateway.clone()))
        .register(delete_invoice_tool(gateway.clone()))
        .register(email_invoice_tool(gateway));
    registry
}

fn filter_parameters() -> AgentToolParameters {
    AgentToolParameters::object()
        .string_enum("status", "Payment status to filter by", STATUS_VALUES, false)
        .string("customer", "Part of the customer's name", false)
        .number("minAmount", "Minimum invoice total", false)
        .number("maxAmount", "Maximum invoice total", false)
        .string("startDate", "Earliest transaction date, YYYY-MM-DD", false)
        .string("endDate", "Latest transaction date, YYYY-MM-DD", false)
        .integer("limit", "Maximum number of invoices to return", false)
        .build()
}

/// Parameters for tools that act on one existing invoice.
fn target_parameters(extra: impl FnOnce(ParameterBuilder) -> ParameterBuilder) -> AgentToolParameters {
    extra(
        AgentToolParameters::object()
            .string("docNumber", "Invoice number as shown to the user, e.g. 1037", false)
            .string("invoiceId", "Internal QuickBooks invoice id", false),
    )
    .build()
}

/// Search invoices and return them to the model without changing the UI.
pub fn search_invoices_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        SEARCH_INVOICES,
        "Search invoices by status, customer, amount or date. Use for questions about invoices \
         that do not ask to display them.",
        filter_parameters(),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let filter: InvoiceFilter = args.deserialize()?;
                let invoices = gateway.query_invoices(&filter).await?;
                Ok(ToolOutput::json(list_result(&filter, &invoices, Utc::now())))
            }
        },
    ))
}

/// Search invoices and open the slider over the results.
pub fn show_invoice_list_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        SHOW_INVOICE_LIST,
        "Display a filtered list of invoices in the invoice slider. Use when the user asks to \
         show, list or open several invoices.",
        filter_parameters(),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let filter: InvoiceFilter = args.deserialize()?;
                let invoices = gateway.query_invoices(&filter).await?;
                let result = list_result(&filter, &invoices, Utc::now());
                Ok(ToolOutput::json(result).with_directive(UiDirective::OpenSlider {
                    filter: filter.label(),
                    invoices,
                }))
            }
        },
    ))
}

pub fn get_invoice_by_number_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        GET_INVOICE_BY_NUMBER,
        "Fetch one invoice by its invoice number and show it in the detail view.",
        AgentToolParameters::object()
            .string("docNumber", "Invoice number, e.g. 1037", true)
            .build(),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let invoice = gateway.invoice_by_number(args.get_str("docNumber")?).await?;
                Ok(show(invoice, json!({})))
            }
        },
    ))
}

pub fn create_invoice_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    let line_schema = json!({
        "type": "object",
        "properties": {
            "amount": { "type": "number" },
            "description": { "type": "string" },
        },
        "required": ["amount"],
    });
    Arc::new(AgentTool::new(
        CREATE_INVOICE,
        "Create an invoice for an existing customer. Give either a single amount or a list of lines.",
        AgentToolParameters::object()
            .string("customerName", "Customer display name", false)
            .string("customerId", "QuickBooks customer id", false)
            .number("amount", "Total for a single-line invoice", false)
            .string("description", "Description for a single-line invoice", false)
            .array("lines", "Invoice lines", line_schema, false)
            .string("dueDate", "Due date, YYYY-MM-DD", false)
            .string("email", "Billing email address", false)
            .build(),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let invoice = new_invoice_from_args(gateway.as_ref(), &args).await?;
                let created = gateway.create_invoice(&invoice).await?;
                Ok(show(created, json!({ "created": true })))
            }
        },
    ))
}

pub fn void_invoice_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        VOID_INVOICE,
        "Void an invoice that has no payments applied. The record is kept with zero amounts.",
        target_parameters(|b| b),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let id = resolve_invoice_id(gateway.as_ref(), &args).await?;
                let voided = gateway.void_invoice(&id).await?;
                Ok(show(voided, json!({ "voided": true })))
            }
        },
    ))
}

pub fn delete_invoice_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        DELETE_INVOICE,
        "Permanently delete an invoice that has no payments applied. Only when the user \
         explicitly asks to delete rather than void.",
        target_parameters(|b| b),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let id = resolve_invoice_id(gateway.as_ref(), &args).await?;
                gateway.delete_invoice(&id).await?;
                Ok(ToolOutput::json(json!({ "deleted": true, "id": id })))
            }
        },
    ))
}

pub fn email_invoice_tool(gateway: Arc<dyn InvoiceGateway>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        EMAIL_INVOICE,
        "Email an invoice to the customer through QuickBooks, optionally to a different address.",
        target_parameters(|b| b.string("email", "Recipient address override", false)),
        move |args| {
            let gateway = gateway.clone();
            async move {
                let email = args.get_opt_str("email");
                if let Some(address) = email {
                    validate_email(address)?;
                }
                let id = resolve_invoice_id(gateway.as_ref(), &args).await?;
                let sent = gateway.send_invoice(&id, email).await?;
                let recipient = email.map(str::to_string).or_else(|| sent.email().map(str::to_string));
                Ok(show(sent, json!({ "sent": true, "to": recipient })))
            }
        },
    ))
}

/// Compact invoice view handed back to the model.
pub fn invoice_summary(invoice: &Invoice, now: DateTime<Utc>) -> Value {
    json!({
        "id": invoice.id,
        "docNumber": invoice.doc_number,
        "customer": invoice.customer_name(),
        "total": invoice.total_amt,
        "balance": invoice.balance,
        "dueDate": invoice.due_date,
        "status": invoice.status_at(now),
    })
}

fn list_result(filter: &InvoiceFilter, invoices: &[Invoice], now: DateTime<Utc>) -> Value {
    let total_balance: f64 = invoices.iter().map(|i| i.balance).sum();
    json!({
        "filter": filter.label(),
        "count": invoices.len(),
        "totalBalance": (total_balance * 100.0).round() / 100.0,
        "invoices": invoices.iter().map(|i| invoice_summary(i, now)).collect::<Vec<_>>(),
    })
}

fn show(invoice: Invoice, extra: Value) -> ToolOutput {
    let mut result = invoice_summary(&invoice, Utc::now());
    if let (Some(obj), Value::Object(extra)) = (result.as_object_mut(), extra) {
        obj.extend(extra);
    }
    ToolOutput::json(result).with_directive(UiDirective::ShowInvoice {
        invoice: Box::new(invoice),
    })
}

async fn resolve_invoice_id(gateway: &dyn InvoiceGateway, args: &ToolArguments) -> Result<String> {
    if let Some(id) = args.get_opt_str("invoiceId") {
        return Ok(id.to_string());
    }
    match args.get_opt_str("docNumber") {
        Some(number) => Ok(gateway.invoice_by_number(number).await?.id),
        None => Err(DeskError::Validation(
            "either 'docNumber' or 'invoiceId' is required".into(),
        )),
    }
}

async fn new_invoice_from_args(gateway: &dyn InvoiceGateway, args: &ToolArguments) -> Result<NewInvoice> {
    let customer_id = match (args.get_opt_str("customerId"), args.get_opt_str("customerName")) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => gateway
            .find_customer_by_name(name)
            .await?
            .map(|c| c.id)
            .ok_or_else(|| DeskError::NotFound(format!("customer '{name}'")))?,
        (None, None) => {
            return Err(DeskError::Validation(
                "either 'customerName' or 'customerId' is required".into(),
            ))
        }
    };

    let lines: Vec<NewLine> = match args.raw().get("lines").filter(|l| l.is_array()) {
        Some(lines) => serde_json::from_value(lines.clone())
            .map_err(|e| DeskError::Validation(format!("invalid lines: {e}")))?,
        None => match args.get_opt_f64("amount") {
            Some(amount) => vec![NewLine {
                amount,
                description: args.get_opt_str("description").map(str::to_string),
                item_id: None,
            }],
            None => return Err(DeskError::Validation("an amount or lines are required".into())),
        },
    };

    let due_date = args
        .get_opt_str("dueDate")
        .map(|d| {
            d.parse()
                .map_err(|_| DeskError::Validation(format!("invalid dueDate '{d}', expected YYYY-MM-DD")))
        })
        .transpose()?;

    let invoice = NewInvoice {
        customer_id,
        lines,
        due_date,
        email: args.get_opt_str("email").map(str::to_string),
        doc_number: None,
    };
    invoice.validate().map_err(DeskError::Validation)?;
    Ok(invoice)
}
