//! Invoice numbers mentioned in free text.
//!
//! Only a hint for UI selection: structured tool results always take precedence.

use std::sync::OnceLock;

use regex::Regex;

static INVOICE_REF: OnceLock<Option<Regex>> = OnceLock::new();

fn invoice_ref() -> Option<&'static Regex> {
    INVOICE_REF
        .get_or_init(|| Regex::new(r"(?i)\binvoices?\s*(?:no\.?|number)?\s*#?\s*(\d+)").ok())
        .as_ref()
}

/// Distinct invoice numbers in order of first mention.
pub fn invoice_numbers(text: &str) -> Vec<String> {
    let Some(re) = invoice_ref() else {
        return Vec::new();
    };
    let mut found: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let number = caps[1].to_string();
        if !found.contains(&number) {
            found.push(number);
        }
    }
    found
}

/// The invoice number when exactly one distinct number is mentioned.
pub fn single_invoice_number(text: &str) -> Option<String> {
    let mut numbers = invoice_numbers(text);
    if numbers.len() == 1 {
        numbers.pop()
    } else {
        None
    }
}
