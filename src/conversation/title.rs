//! Session titles derived from the first user message.

use std::sync::OnceLock;

use regex::Regex;

const MAX_PREFIX_CHARS: usize = 30;

static INVOICE_NUMBER: OnceLock<Option<Regex>> = OnceLock::new();

/// Keyword rules, checked in order. Every keyword in a rule must appear.
const RULES: &[(&[&str], &str)] = &[
    (&["email", "invoice"], "Email Invoices"),
    (&["send", "invoice"], "Email Invoices"),
    (&["create", "invoice"], "Create Invoice"),
    (&["new", "invoice"], "Create Invoice"),
    (&["void"], "Void Invoices"),
    (&["delete", "invoice"], "Delete Invoices"),
    (&["overdue"], "Overdue Invoices"),
    (&["unpaid"], "Unpaid Invoices"),
    (&["paid"], "Paid Invoices"),
    (&["summary"], "Account Summary"),
    (&["dashboard"], "Account Summary"),
    (&["customer"], "Customer Questions"),
];

/// Derive a short title from a user message.
pub fn derive_title(message: &str) -> String {
    let lower = message.to_lowercase();
    for (keywords, title) in RULES {
        if keywords.iter().all(|k| lower.contains(k)) {
            return (*title).to_string();
        }
    }
    let number_re = INVOICE_NUMBER
        .get_or_init(|| Regex::new(r"(?i)invoice\s*#?\s*(\d+)").ok())
        .as_ref();
    if let Some(caps) = number_re.and_then(|re| re.captures(message)) {
        return format!("Invoice #{}", &caps[1]);
    }
    truncated_prefix(message)
}

fn truncated_prefix(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return super::types::DEFAULT_TITLE.to_string();
    }
    if collapsed.chars().count() <= MAX_PREFIX_CHARS {
        return collapsed;
    }
    let prefix: String = collapsed.chars().take(MAX_PREFIX_CHARS).collect();
    format!("{}...", prefix.trim_end())
}
