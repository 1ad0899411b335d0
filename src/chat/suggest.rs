//! Follow-up suggestions derived from what a chat turn did.

use crate::tools::invoice::{CREATE_INVOICE, DELETE_INVOICE, EMAIL_INVOICE, VOID_INVOICE};
use crate::tools::UiDirective;

const MAX_SUGGESTIONS: usize = 3;

const DEFAULTS: &[&str] = &[
    "Show all unpaid invoices",
    "Show overdue invoices",
    "Create a new invoice",
];

/// Suggest next actions given the tools that ran and the directives they produced.
pub fn suggestions(tools_run: &[String], directives: &[UiDirective]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !out.contains(&s) {
            out.push(s);
        }
    };

    for directive in directives.iter().rev() {
        match directive {
            UiDirective::OpenSlider { filter, invoices } => {
                if invoices.is_empty() {
                    push("Show all invoices".into());
                } else if filter.contains("unpaid") || filter.contains("overdue") {
                    push("Email reminders for these invoices".into());
                    push("What is the total outstanding?".into());
                } else {
                    push("Which of these are overdue?".into());
                }
            }
            UiDirective::ShowInvoice { invoice } => {
                let label = invoice
                    .doc_number
                    .as_deref()
                    .map(|n| format!("invoice #{n}"))
                    .unwrap_or_else(|| "this invoice".into());
                if invoice.balance > 0.0 {
                    push(format!("Email {label} to the customer"));
                }
                if invoice.is_unpaid_in_full() && invoice.total_amt > 0.0 {
                    push(format!("Void {label}"));
                }
                push("Show other invoices for this customer".into());
            }
        }
    }

    if tools_run.iter().any(|t| t == CREATE_INVOICE) {
        push("Create another invoice".into());
    }
    if tools_run.iter().any(|t| t == VOID_INVOICE || t == DELETE_INVOICE || t == EMAIL_INVOICE) {
        push("Show all unpaid invoices".into());
    }
    for default in DEFAULTS {
        push((*default).to_string());
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}
