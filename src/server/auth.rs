//! OAuth connect/callback/logout and connection status.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::auth::ConnectionStatus;
use crate::error::{DeskError, Result};

pub async fn connect(State(state): State<AppState>) -> Result<Redirect> {
    let url = state.oauth.authorize_url()?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    code: Option<String>,
    realm_id: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    if let Some(error) = params.error {
        warn!(%error, "authorization declined");
        return status_page(StatusCode::BAD_REQUEST, "Connection failed", &format!("QuickBooks returned: {error}"));
    }
    let (Some(code), Some(realm_id), Some(oauth_state)) = (params.code, params.realm_id, params.state) else {
        return status_page(
            StatusCode::BAD_REQUEST,
            "Connection failed",
            "The callback is missing code, realmId or state.",
        );
    };

    let result = async {
        let credential = state.oauth.exchange_code(&code, &realm_id, &oauth_state).await?;
        state.tokens.connect(&credential)?;
        Ok::<_, DeskError>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(realm_id = %realm_id, "authorization completed");
            status_page(
                StatusCode::OK,
                "Connected to QuickBooks",
                "You can close this window and return to the invoice assistant.",
            )
        }
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
            status_page(status, "Connection failed", &e.to_string())
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<ConnectionStatus>> {
    if let Some(previous) = state.tokens.disconnect()? {
        state.oauth.revoke(&previous.refresh_token).await;
    }
    Ok(Json(state.tokens.status()?))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<ConnectionStatus>> {
    Ok(Json(state.tokens.status()?))
}

fn status_page(status: StatusCode, title: &str, message: &str) -> Response {
    let html = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;text-align:center;margin-top:4rem\">\
         <h1>{title}</h1><p>{message}</p>\
         <script>if (window.opener) {{ window.opener.postMessage('quickbooks-auth', '*'); }}</script>\
         </body></html>",
        title = escape_html(title),
        message = escape_html(message),
    );
    (status, Html(html)).into_response()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_escaped() {
        assert_eq!(escape_html("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
    }
}
