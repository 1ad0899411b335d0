//! Configuration loaded from the environment (`.env` honoured).

use std::fmt;
use std::path::PathBuf;

use strum::{Display, EnumString};

use crate::auth::OAuthConfig;
use crate::error::{DeskError, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
const DEFAULT_MINOR_VERSION: u32 = 75;

/// QuickBooks Online environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum QuickBooksEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl QuickBooksEnvironment {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox-quickbooks.api.intuit.com",
            Self::Production => "https://quickbooks.api.intuit.com",
        }
    }
}

/// LLM backend speaking the Chat Completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Together,
}

impl LlmProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Together => "https://api.together.xyz/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        }
    }
}

#[derive(Clone)]
pub struct QuickBooksSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub environment: QuickBooksEnvironment,
    pub api_base_url: String,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub revoke_url: Option<String>,
    pub minor_version: u32,
}

#[derive(Clone)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Process configuration.
#[derive(Clone)]
pub struct DeskConfig {
    pub quickbooks: QuickBooksSettings,
    pub llm: LlmSettings,
    pub session_secret: String,
    pub conversations_path: PathBuf,
    pub bind: String,
}

impl fmt::Debug for DeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeskConfig")
            .field("client_id", &self.quickbooks.client_id)
            .field("environment", &self.quickbooks.environment)
            .field("api_base_url", &self.quickbooks.api_base_url)
            .field("llm_provider", &self.llm.provider)
            .field("llm_model", &self.llm.model)
            .field("llm_api_key", &self.llm.api_key.as_ref().map(|_| ".."))
            .field("conversations_path", &self.conversations_path)
            .field("bind", &self.bind)
            .finish()
    }
}

impl DeskConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("QUICKBOOKS_ENVIRONMENT") {
            Some(raw) => raw.parse::<QuickBooksEnvironment>().map_err(|_| {
                DeskError::Configuration(format!(
                    "QUICKBOOKS_ENVIRONMENT must be sandbox or production, got '{raw}'"
                ))
            })?,
            None => QuickBooksEnvironment::default(),
        };
        let minor_version = match get("QUICKBOOKS_MINOR_VERSION") {
            Some(raw) => raw.parse().map_err(|_| {
                DeskError::Configuration(format!("invalid QUICKBOOKS_MINOR_VERSION '{raw}'"))
            })?,
            None => DEFAULT_MINOR_VERSION,
        };
        let quickbooks = QuickBooksSettings {
            client_id: get("QUICKBOOKS_CLIENT_ID").unwrap_or_default(),
            client_secret: get("QUICKBOOKS_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: get("QUICKBOOKS_REDIRECT_URI").unwrap_or_default(),
            environment,
            api_base_url: get("QUICKBOOKS_BASE_URL")
                .unwrap_or_else(|| environment.api_base_url().to_string()),
            authorize_url: get("QUICKBOOKS_AUTH_URL"),
            token_url: get("QUICKBOOKS_TOKEN_URL"),
            revoke_url: get("QUICKBOOKS_REVOKE_URL"),
            minor_version,
        };

        let provider = match get("LLM_PROVIDER") {
            Some(raw) => raw.parse::<LlmProviderKind>().map_err(|_| {
                DeskError::Configuration(format!("unknown LLM_PROVIDER '{raw}'"))
            })?,
            None if get("OPENAI_API_KEY").is_none() && get("TOGETHER_API_KEY").is_some() => {
                LlmProviderKind::Together
            }
            None => LlmProviderKind::default(),
        };
        let (api_key, base_url) = match provider {
            LlmProviderKind::OpenAi => (get("OPENAI_API_KEY"), get("OPENAI_BASE_URL")),
            LlmProviderKind::Together => (get("TOGETHER_API_KEY"), get("TOGETHER_BASE_URL")),
        };
        let llm = LlmSettings {
            provider,
            api_key,
            base_url: base_url.unwrap_or_else(|| provider.default_base_url().to_string()),
            model: get("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
        };

        Ok(Self {
            quickbooks,
            llm,
            session_secret: get("SESSION_SECRET").unwrap_or_default(),
            conversations_path: get("CONVERSATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_conversations_path),
            bind: get("INVOICEDESK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
        })
    }

    pub fn oauth(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.quickbooks.client_id.clone(),
            client_secret: self.quickbooks.client_secret.clone(),
            redirect_uri: self.quickbooks.redirect_uri.clone(),
            state_secret: self.session_secret.clone(),
        }
    }
}

fn default_conversations_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "invoicedesk")
        .map(|dirs| dirs.data_dir().join("conversations.json"))
        .unwrap_or_else(|| PathBuf::from("conversations.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DeskConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeskConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_sandbox_and_openai() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.quickbooks.environment, QuickBooksEnvironment::Sandbox);
        assert_eq!(
            cfg.quickbooks.api_base_url,
            "https://sandbox-quickbooks.api.intuit.com"
        );
        assert_eq!(cfg.llm.provider, LlmProviderKind::OpenAi);
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.quickbooks.minor_version, DEFAULT_MINOR_VERSION);
    }

    #[test]
    fn oauth_endpoints_can_be_overridden() {
        let cfg = config(&[
            ("QUICKBOOKS_TOKEN_URL", "http://127.0.0.1:9000/token"),
            ("QUICKBOOKS_REVOKE_URL", "http://127.0.0.1:9000/revoke"),
        ])
        .unwrap();
        assert_eq!(cfg.quickbooks.token_url.as_deref(), Some("http://127.0.0.1:9000/token"));
        assert_eq!(cfg.quickbooks.revoke_url.as_deref(), Some("http://127.0.0.1:9000/revoke"));
        assert!(cfg.quickbooks.authorize_url.is_none());
    }

    #[test]
    fn production_environment_selects_production_api() {
        let cfg = config(&[("QUICKBOOKS_ENVIRONMENT", "Production")]).unwrap();
        assert_eq!(cfg.quickbooks.api_base_url, "https://quickbooks.api.intuit.com");
    }

    #[test]
    fn invalid_environment_is_rejected() {
        let err = config(&[("QUICKBOOKS_ENVIRONMENT", "staging")]).unwrap_err();
        assert!(matches!(err, DeskError::Configuration(_)));
    }

    #[test]
    fn together_key_alone_selects_together() {
        let cfg = config(&[("TOGETHER_API_KEY", "tg-key")]).unwrap();
        assert_eq!(cfg.llm.provider, LlmProviderKind::Together);
        assert_eq!(cfg.llm.api_key.as_deref(), Some("tg-key"));
        assert_eq!(cfg.llm.base_url, "https://api.together.xyz/v1");
    }

    #[test]
    fn explicit_overrides_win() {
        let cfg = config(&[
            ("QUICKBOOKS_BASE_URL", "http://127.0.0.1:9000"),
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_MODEL", "gpt-4o"),
            ("CONVERSATIONS_PATH", "/tmp/conv.json"),
        ])
        .unwrap();
        assert_eq!(cfg.quickbooks.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.conversations_path, PathBuf::from("/tmp/conv.json"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = config(&[("OPENAI_API_KEY", "sk-secret"), ("QUICKBOOKS_CLIENT_SECRET", "qb-secret")]).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("qb-secret"));
    }
}
