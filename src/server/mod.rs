//! HTTP surface: OAuth, invoice, chat and conversation routes.

mod auth;
mod chat;
mod conversations;
mod error;
mod invoices;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::auth::{InMemoryCredentialStore, QuickBooksOAuth, TokenManager};
use crate::chat::ChatDispatcher;
use crate::config::DeskConfig;
use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::provider::create_provider;
use crate::quickbooks::{InvoiceGateway, QuickBooksClient};
use crate::tools::invoice_registry;

/// Shared handles behind every route.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub oauth: Arc<QuickBooksOAuth>,
    pub gateway: Arc<dyn InvoiceGateway>,
    pub chat: Arc<ChatDispatcher>,
    pub conversations: Arc<ConversationStore>,
}

impl AppState {
    /// Wire the production components from configuration.
    pub async fn from_config(config: &DeskConfig) -> Result<Self> {
        let mut oauth = QuickBooksOAuth::new(config.oauth());
        if let Some(ref url) = config.quickbooks.authorize_url {
            oauth = oauth.with_authorize_url(url.clone());
        }
        if let Some(ref url) = config.quickbooks.token_url {
            oauth = oauth.with_token_url(url.clone());
        }
        if let Some(ref url) = config.quickbooks.revoke_url {
            oauth = oauth.with_revoke_url(url.clone());
        }
        let oauth = Arc::new(oauth);

        let tokens = Arc::new(TokenManager::new(
            Arc::new(InMemoryCredentialStore::new()),
            oauth.clone(),
        ));
        let gateway: Arc<dyn InvoiceGateway> = Arc::new(QuickBooksClient::new(
            tokens.clone(),
            config.quickbooks.api_base_url.clone(),
            config.quickbooks.minor_version,
        ));
        let conversations = Arc::new(ConversationStore::open(config.conversations_path.clone()).await?);
        let provider = create_provider(&config.llm)?;
        let chat = Arc::new(ChatDispatcher::new(
            provider,
            invoice_registry(gateway.clone()),
            conversations.clone(),
        ));

        Ok(Self {
            tokens,
            oauth,
            gateway,
            chat,
            conversations,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/quickbooks", get(auth::connect))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .route("/api/status", get(auth::status))
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route(
            "/api/invoices/:id",
            get(invoices::get).patch(invoices::update).delete(invoices::void),
        )
        .route("/api/invoices/:id/permanent-delete", delete(invoices::permanent_delete))
        .route("/api/invoices/:id/send", post(invoices::send))
        .route("/invoice/number/:docNumber", get(invoices::by_number))
        .route("/api/customers", get(invoices::customers))
        .route("/api/dashboard/summary", get(invoices::dashboard))
        .route("/api/company", get(invoices::company))
        .route("/api/ai/chat", post(chat::chat))
        .route("/api/ai/chat/stream", post(chat::chat_stream))
        .route("/api/conversations", get(conversations::list).post(conversations::create))
        .route("/api/conversations/current", get(conversations::current))
        .route(
            "/api/conversations/:id",
            get(conversations::get)
                .delete(conversations::delete)
                .patch(conversations::rename),
        )
        .route("/api/conversations/:id/switch", post(conversations::switch))
        .route("/api/conversations/:id/clear", post(conversations::clear))
        .route("/api/conversations/:id/context", get(conversations::context))
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "invoicedesk listening");
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}
