//! QuickBooks entity shapes (read-through; never persisted locally).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// `{value, name}` reference to another QuickBooks entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(rename = "Address")]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Line {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_item_line_detail: Option<serde_json::Value>,
}

/// Invoice as returned by the QuickBooks API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Invoice {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_ref: Option<Reference>,
    #[serde(default)]
    pub total_amt: f64,
    #[serde(default)]
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub line: Vec<Line>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_email: Option<EmailAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_status: Option<String>,
}

/// Derived invoice status; computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
    Overdue,
}

impl InvoiceStatus {
    /// `paid` when nothing is owed, `overdue` when owed past the due instant, else `unpaid`.
    pub fn derive(balance: f64, due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        if balance <= 0.0 {
            return Self::Paid;
        }
        match due_at {
            Some(due) if due < now => Self::Overdue,
            _ => Self::Unpaid,
        }
    }
}

impl Invoice {
    /// Due date as an instant (midnight UTC of the due day).
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> InvoiceStatus {
        InvoiceStatus::derive(self.balance, self.due_at(), now)
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status_at(Utc::now())
    }

    /// True when no payment has been applied yet.
    pub fn is_unpaid_in_full(&self) -> bool {
        (self.balance - self.total_amt).abs() < 0.005
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_ref.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        self.bill_email.as_ref().map(|e| e.address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_email_addr: Option<EmailAddress>,
    #[serde(default)]
    pub balance: f64,
}

/// One line of a new invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLine {
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// Product/service id; QuickBooks' default service item when absent.
    #[serde(default)]
    pub item_id: Option<String>,
}

/// Request to create an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub customer_id: String,
    pub lines: Vec<NewLine>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub doc_number: Option<String>,
}

impl NewInvoice {
    pub fn validate(&self) -> Result<(), String> {
        if self.customer_id.trim().is_empty() {
            return Err("customerId is required".into());
        }
        if self.lines.is_empty() {
            return Err("at least one line is required".into());
        }
        if let Some(bad) = self.lines.iter().find(|l| !(l.amount.is_finite() && l.amount > 0.0)) {
            return Err(format!("line amount must be positive, got {}", bad.amount));
        }
        Ok(())
    }

    /// QuickBooks API payload.
    pub fn to_payload(&self) -> serde_json::Value {
        let lines: Vec<serde_json::Value> = self
            .lines
            .iter()
            .map(|l| {
                serde_json::json!({
                    "Amount": l.amount,
                    "Description": l.description,
                    "DetailType": "SalesItemLineDetail",
                    "SalesItemLineDetail": {
                        "ItemRef": { "value": l.item_id.as_deref().unwrap_or("1") }
                    }
                })
            })
            .collect();
        let mut payload = serde_json::json!({
            "CustomerRef": { "value": self.customer_id },
            "Line": lines,
        });
        if let Some(obj) = payload.as_object_mut() {
            if let Some(due) = self.due_date {
                obj.insert("DueDate".into(), due.to_string().into());
            }
            if let Some(ref email) = self.email {
                obj.insert("BillEmail".into(), serde_json::json!({ "Address": email }));
            }
            if let Some(ref number) = self.doc_number {
                obj.insert("DocNumber".into(), number.clone().into());
            }
        }
        payload
    }
}

/// Totals shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub invoice_count: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub overdue_count: usize,
    pub outstanding_balance: f64,
    pub overdue_balance: f64,
    pub customer_count: usize,
    pub item_count: usize,
    pub payment_count: usize,
    pub payments_received: f64,
}

impl DashboardSummary {
    pub fn from_invoices(invoices: &[Invoice], now: DateTime<Utc>) -> Self {
        let mut summary = Self {
            invoice_count: invoices.len(),
            ..Default::default()
        };
        for inv in invoices {
            match inv.status_at(now) {
                InvoiceStatus::Paid => summary.paid_count += 1,
                InvoiceStatus::Unpaid => {
                    summary.unpaid_count += 1;
                    summary.outstanding_balance += inv.balance;
                }
                InvoiceStatus::Overdue => {
                    summary.overdue_count += 1;
                    summary.outstanding_balance += inv.balance;
                    summary.overdue_balance += inv.balance;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zero_balance_is_paid_even_when_past_due() {
        let now = Utc::now();
        assert_eq!(
            InvoiceStatus::derive(0.0, Some(now - Duration::days(3)), now),
            InvoiceStatus::Paid
        );
        assert_eq!(InvoiceStatus::derive(-5.0, None, now), InvoiceStatus::Paid);
    }

    #[test]
    fn status_boundaries() {
        let now = Utc::now();
        let past = Some(now - Duration::seconds(1));
        let future = Some(now + Duration::seconds(1));
        assert_eq!(InvoiceStatus::derive(0.01, past, now), InvoiceStatus::Overdue);
        assert_eq!(InvoiceStatus::derive(0.01, future, now), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::derive(0.0, past, now), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::derive(0.01, None, now), InvoiceStatus::Unpaid);
    }

    #[test]
    fn invoice_deserializes_from_api_shape() {
        let inv: Invoice = serde_json::from_value(serde_json::json!({
            "Id": "130",
            "SyncToken": "2",
            "DocNumber": "1037",
            "CustomerRef": { "value": "58", "name": "Cool Cars" },
            "TotalAmt": 200.0,
            "Balance": 50.0,
            "TxnDate": "2024-05-01",
            "DueDate": "2024-05-31",
            "Line": [{ "Amount": 200.0, "DetailType": "SalesItemLineDetail" }],
            "BillEmail": { "Address": "cars@example.com" },
            "domain": "QBO"
        }))
        .unwrap();
        assert_eq!(inv.doc_number.as_deref(), Some("1037"));
        assert_eq!(inv.customer_name(), Some("Cool Cars"));
        assert_eq!(inv.email(), Some("cars@example.com"));
        assert!(!inv.is_unpaid_in_full());
        let due = inv.due_at().unwrap();
        assert_eq!(due.to_rfc3339(), "2024-05-31T00:00:00+00:00");
    }

    #[test]
    fn new_invoice_payload_uses_api_field_names() {
        let invoice = NewInvoice::builder()
            .customer_id("58".to_string())
            .lines(vec![NewLine {
                amount: 120.0,
                description: Some("Consulting".into()),
                item_id: None,
            }])
            .email("a@example.com".to_string())
            .build();
        let payload = invoice.to_payload();
        assert_eq!(payload["CustomerRef"]["value"], "58");
        assert_eq!(payload["Line"][0]["Amount"], 120.0);
        assert_eq!(payload["Line"][0]["SalesItemLineDetail"]["ItemRef"]["value"], "1");
        assert_eq!(payload["BillEmail"]["Address"], "a@example.com");
        assert!(payload.get("DueDate").is_none());
    }

    #[test]
    fn new_invoice_validation() {
        let mut invoice = NewInvoice::builder()
            .customer_id("58".to_string())
            .lines(vec![])
            .build();
        assert!(invoice.validate().is_err());
        invoice.lines.push(NewLine { amount: -1.0, description: None, item_id: None });
        assert!(invoice.validate().unwrap_err().contains("positive"));
        invoice.lines[0].amount = 10.0;
        assert!(invoice.validate().is_ok());
    }

    #[test]
    fn summary_buckets_by_status() {
        let now = Utc::now();
        let mk = |balance: f64, due: Option<NaiveDate>| Invoice {
            id: "1".into(),
            sync_token: None,
            doc_number: None,
            customer_ref: None,
            total_amt: 100.0,
            balance,
            txn_date: None,
            due_date: due,
            line: vec![],
            bill_email: None,
            email_status: None,
        };
        let past = (now - Duration::days(10)).date_naive();
        let future = (now + Duration::days(10)).date_naive();
        let summary = DashboardSummary::from_invoices(
            &[mk(0.0, Some(past)), mk(40.0, Some(past)), mk(60.0, Some(future))],
            now,
        );
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.unpaid_count, 1);
        assert_eq!(summary.outstanding_balance, 100.0);
        assert_eq!(summary.overdue_balance, 40.0);
    }
}
