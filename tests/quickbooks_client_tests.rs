//! QuickBooks gateway against a mocked accounting API.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use invoicedesk::auth::{
    CredentialStore, GrantedTokens, InMemoryCredentialStore, TokenGrant, TokenManager,
};
use invoicedesk::auth::AuthError;
use invoicedesk::error::DeskError;
use invoicedesk::quickbooks::{InvoiceFilter, InvoiceGateway, QuickBooksClient, StatusFilter};

use common::credential_expiring_in;

const COMPANY: &str = "/v3/company/9130";

/// Grant that must never be used; the stored token is fresh.
struct NoRefresh;

#[async_trait::async_trait]
impl TokenGrant for NoRefresh {
    async fn refresh(&self, _refresh_token: &str) -> Result<GrantedTokens, AuthError> {
        Err(AuthError::InvalidGrant("unexpected refresh".into()))
    }
}

fn client(server: &MockServer) -> QuickBooksClient {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.save(&credential_expiring_in(60)).unwrap();
    let tokens = Arc::new(TokenManager::new(store, Arc::new(NoRefresh)));
    QuickBooksClient::new(tokens, server.uri(), 75)
}

fn sent_query(request: &Request) -> String {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn query_mentions(fragment: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |request: &Request| sent_query(request).contains(fragment)
}

fn invoice_json(id: &str, doc: &str, total: f64, balance: f64) -> serde_json::Value {
    json!({
        "Id": id,
        "SyncToken": "3",
        "DocNumber": doc,
        "CustomerRef": { "value": "7", "name": "Acme Corp" },
        "TotalAmt": total,
        "Balance": balance,
        "DueDate": "2099-01-31",
    })
}

#[tokio::test]
async fn unpaid_filter_returns_only_open_balances() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .and(header("Authorization", "Bearer access-1"))
        .and(query_param("minorversion", "75"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {
                "Invoice": [
                    invoice_json("1", "1001", 100.0, 0.0),
                    invoice_json("2", "1002", 50.0, 50.0),
                    invoice_json("3", "1003", 75.0, 0.0),
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoices = client(&server)
        .query_invoices(&InvoiceFilter::with_status(StatusFilter::Unpaid))
        .await
        .unwrap();

    let ids: Vec<&str> = invoices.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(query.starts_with("SELECT * FROM Invoice WHERE Balance > '0'"), "{query}");
}

#[tokio::test]
async fn empty_query_response_is_an_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "QueryResponse": {} })))
        .mount(&server)
        .await;

    let invoices = client(&server).query_invoices(&InvoiceFilter::default()).await.unwrap();
    assert!(invoices.is_empty());
}

#[tokio::test]
async fn void_with_payments_never_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/invoice/4")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Invoice": invoice_json("4", "1040", 300.0, 100.0) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{COMPANY}/invoice")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.void_invoice("4").await.unwrap_err();
    match err {
        DeskError::InvoiceHasPayments { ref id, balance, total } => {
            assert_eq!(id, "4");
            assert_eq!(balance, 100.0);
            assert_eq!(total, 300.0);
        }
        ref other => panic!("expected InvoiceHasPayments, got {other:?}"),
    }
    assert_eq!(err.http_status(), 400);

    assert!(matches!(
        client.delete_invoice("4").await,
        Err(DeskError::InvoiceHasPayments { .. })
    ));
}

#[tokio::test]
async fn void_sends_current_sync_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/invoice/1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Invoice": invoice_json("1", "1037", 150.0, 150.0) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{COMPANY}/invoice")))
        .and(query_param("operation", "void"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Invoice": { "Id": "1", "SyncToken": "4", "DocNumber": "1037", "TotalAmt": 0.0, "Balance": 0.0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let voided = client(&server).void_invoice("1").await.unwrap();
    assert_eq!(voided.total_amt, 0.0);

    let requests = server.received_requests().await.unwrap();
    let post = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body, json!({ "Id": "1", "SyncToken": "3" }));
}

#[tokio::test]
async fn stale_sync_token_surfaces_as_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/invoice/1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Invoice": invoice_json("1", "1037", 150.0, 150.0) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{COMPANY}/invoice")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Fault": {
                "Error": [{
                    "Message": "Stale Object Error",
                    "Detail": "You and another user were working on the same thing.",
                    "code": "5010"
                }],
                "type": "ValidationFault"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).void_invoice("1").await.unwrap_err();
    assert!(matches!(err, DeskError::ConcurrencyConflict(_)));
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn rejected_access_token_is_not_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .respond_with(ResponseTemplate::new(401).set_body_string("AuthenticationFailed"))
        .mount(&server)
        .await;

    let err = client(&server)
        .query_invoices(&InvoiceFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::NotAuthenticated));
    assert!(err.requires_reauthentication());
}

#[tokio::test]
async fn unknown_invoice_number_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "QueryResponse": {} })))
        .mount(&server)
        .await;

    let err = client(&server).invoice_by_number("9999").await.unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));
}

#[tokio::test]
async fn send_passes_recipient_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{COMPANY}/invoice/1/send")))
        .and(query_param("sendTo", "ap@acme.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Invoice": invoice_json("1", "1037", 150.0, 150.0)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let sent = client.send_invoice("1", Some("ap@acme.test")).await.unwrap();
    assert_eq!(sent.doc_number.as_deref(), Some("1037"));

    assert!(matches!(
        client.send_invoice("1", Some("not-an-email")).await,
        Err(DeskError::Validation(_))
    ));
}

#[tokio::test]
async fn customer_name_filter_is_resolved_before_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .and(query_mentions("FROM Customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {
                "Customer": [
                    { "Id": "12", "DisplayName": "Zed Co" },
                    { "Id": "31", "DisplayName": "Zed Co West" }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .and(query_mentions("FROM Invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueryResponse": {
                "Invoice": [{
                    "Id": "9",
                    "DocNumber": "1201",
                    "CustomerRef": { "value": "12", "name": "Zed Co" },
                    "TotalAmt": 40.0,
                    "Balance": 40.0
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let filter = InvoiceFilter {
        customer: Some("Zed Co".into()),
        limit: Some(5),
        ..Default::default()
    };
    let invoices = client(&server).query_invoices(&filter).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].id, "9");

    let requests = server.received_requests().await.unwrap();
    let customer_sql = sent_query(&requests[0]);
    assert!(customer_sql.contains("DisplayName LIKE '%Zed Co%'"), "{customer_sql}");
    let invoice_sql = sent_query(&requests[1]);
    assert_eq!(
        invoice_sql,
        "SELECT * FROM Invoice WHERE CustomerRef IN ('12', '31') ORDER BY TxnDate DESC MAXRESULTS 5"
    );
}

#[tokio::test]
async fn unknown_customer_skips_the_invoice_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .and(query_mentions("FROM Customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "QueryResponse": {} })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{COMPANY}/query")))
        .and(query_mentions("FROM Invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "QueryResponse": {} })))
        .expect(0)
        .mount(&server)
        .await;

    let filter = InvoiceFilter {
        customer: Some("Nobody".into()),
        ..Default::default()
    };
    assert!(client(&server).query_invoices(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn send_rejects_ids_that_are_not_plain_alphanumerics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .send_invoice("../../9999/customer/5", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
