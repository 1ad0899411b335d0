//! Chat turn orchestration: model tool calls, UI selection and conversation recording.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::extract::single_invoice_number;
use super::prompt::system_prompt;
use super::suggest::suggestions;
use crate::conversation::{AssistantTurn, ConversationStore, ToolCallRecord, DEFAULT_CONTEXT_LIMIT};
use crate::error::{DeskError, Result};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::quickbooks::Invoice;
use crate::tools::{ToolRegistry, UiDirective};
use crate::types::{AgentToolCall, GenerationSettings, ModelMessage, Usage};

/// Upper bound on model/tool round trips in one turn.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// What the UI should focus after a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    /// Filtered list in the slider.
    Slider { filter: String, invoices: Vec<Invoice> },
    /// One invoice returned by a tool.
    Invoice { invoice: Box<Invoice> },
    /// A single invoice number mentioned in the reply text.
    InvoiceNumber {
        #[serde(rename = "docNumber")]
        doc_number: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    pub session_id: String,
}

/// Pick the UI selection for a turn.
///
/// A slider wins over everything. Otherwise a single invoice from a tool is
/// selected; several distinct invoices select nothing. Only when no tool
/// produced a directive is the reply text scanned for one invoice number.
pub fn resolve_selection(directives: &[UiDirective], reply: &str) -> Option<Selection> {
    if let Some((filter, invoices)) = directives.iter().rev().find_map(|d| match d {
        UiDirective::OpenSlider { filter, invoices } => Some((filter, invoices)),
        UiDirective::ShowInvoice { .. } => None,
    }) {
        return Some(Selection::Slider {
            filter: filter.clone(),
            invoices: invoices.clone(),
        });
    }

    let shown: Vec<&Invoice> = directives
        .iter()
        .filter_map(|d| match d {
            UiDirective::ShowInvoice { invoice } => Some(invoice.as_ref()),
            UiDirective::OpenSlider { .. } => None,
        })
        .collect();
    if let Some(first) = shown.first() {
        return shown
            .iter()
            .all(|i| i.id == first.id)
            .then(|| Selection::Invoice {
                invoice: Box::new((*first).clone()),
            });
    }

    single_invoice_number(reply).map(|doc_number| Selection::InvoiceNumber { doc_number })
}

/// Streamed turn not yet written to the conversation store.
struct PendingTurn {
    conversations: Arc<ConversationStore>,
    message: String,
    session_id: Option<String>,
    turn: Option<AssistantTurn>,
}

impl PendingTurn {
    fn push_text(&mut self, text: &str) {
        if let Some(turn) = self.turn.as_mut() {
            turn.content.push_str(text);
        }
    }

    async fn record(&mut self) -> Result<()> {
        match self.turn.take() {
            Some(turn) => {
                self.conversations
                    .append_exchange(&self.message, turn, self.session_id.as_deref())
                    .await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        let Some(turn) = self.turn.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("streamed chat turn dropped outside a runtime; not recorded");
            return;
        };
        let conversations = self.conversations.clone();
        let message = std::mem::take(&mut self.message);
        let session_id = self.session_id.take();
        handle.spawn(async move {
            info!(tools = turn.tool_calls.len(), "recording interrupted chat stream");
            if let Err(e) = conversations
                .append_exchange(&message, turn, session_id.as_deref())
                .await
            {
                warn!(error = %e, "failed to record interrupted chat turn");
            }
        });
    }
}

/// Outcome of the tool phase of a turn.
struct ToolPhase {
    messages: Vec<ModelMessage>,
    /// Text of the last model response.
    text: String,
    records: Vec<ToolCallRecord>,
    directives: Vec<UiDirective>,
    usage: Usage,
}

pub struct ChatDispatcher {
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    conversations: Arc<ConversationStore>,
    settings: GenerationSettings,
}

impl ChatDispatcher {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: ToolRegistry,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            provider,
            tools,
            conversations,
            settings: GenerationSettings {
                temperature: Some(0.2),
                ..Default::default()
            },
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    /// Run one chat turn and record it in the session.
    pub async fn handle(&self, message: &str, session_id: Option<&str>) -> Result<ChatReply> {
        let message = require_message(message)?;
        let messages = self.opening_messages(message, session_id).await?;
        let phase = self.run_tools(messages, true).await?;

        let selection = resolve_selection(&phase.directives, &phase.text);
        let tools_run: Vec<String> = phase.records.iter().map(|r| r.name.clone()).collect();
        let suggestions = suggestions(&tools_run, &phase.directives);

        let session_id = self
            .conversations
            .append_exchange(
                message,
                AssistantTurn {
                    content: phase.text.clone(),
                    tool_calls: phase.records.clone(),
                },
                session_id,
            )
            .await?;
        info!(
            session_id = %session_id,
            tools = phase.records.len(),
            selection = selection.is_some(),
            total_tokens = phase.usage.total_tokens,
            "chat turn complete"
        );

        Ok(ChatReply {
            response: phase.text,
            tool_calls: phase.records,
            suggestions,
            selection,
            session_id,
        })
    }

    /// Run the tool rounds, then stream the final answer as text chunks.
    ///
    /// The answer is requested again as a stream once the model stops asking
    /// for tools. The exchange is recorded when the stream completes; a stream
    /// dropped early records the partial answer with the tool calls that ran.
    pub async fn stream(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let message = require_message(message)?.to_string();
        let messages = self.opening_messages(&message, session_id).await?;
        let phase = self.run_tools(messages, false).await?;

        let request = ProviderRequest {
            messages: phase.messages,
            settings: self.settings.clone(),
            tools: None,
        };
        let mut deltas = self.provider.stream_text(&request).await?;
        let mut pending = PendingTurn {
            conversations: self.conversations.clone(),
            message,
            session_id: session_id.map(str::to_string),
            turn: Some(AssistantTurn {
                content: String::new(),
                tool_calls: phase.records,
            }),
        };

        let stream = async_stream::stream! {
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(delta) => {
                        if delta.text.is_empty() {
                            continue;
                        }
                        pending.push_text(&delta.text);
                        yield Ok(delta.text);
                    }
                    Err(e) => {
                        warn!(error = %e, "chat stream aborted");
                        yield Err(e);
                        return;
                    }
                }
            }
            if let Err(e) = pending.record().await {
                warn!(error = %e, "failed to record streamed chat turn");
                yield Err(e);
            }
        };
        Ok(Box::pin(stream))
    }

    async fn opening_messages(&self, message: &str, session_id: Option<&str>) -> Result<Vec<ModelMessage>> {
        let context = self
            .conversations
            .context_window(session_id, DEFAULT_CONTEXT_LIMIT)
            .await?;
        Ok(vec![
            ModelMessage::system(system_prompt(Utc::now().date_naive(), &context)),
            ModelMessage::user(message),
        ])
    }

    /// Let the model call tools until it answers without any, or the round limit is hit.
    ///
    /// With `keep_final` false the settling response is not appended to the
    /// message list, so a follow-up request can regenerate it.
    async fn run_tools(&self, mut messages: Vec<ModelMessage>, keep_final: bool) -> Result<ToolPhase> {
        let definitions: Option<Vec<ToolDefinition>> =
            (!self.tools.is_empty()).then(|| self.tools.definitions());
        let mut records = Vec::new();
        let mut directives = Vec::new();
        let mut text = String::new();
        let mut usage = Usage::default();

        for round in 0..MAX_TOOL_ROUNDS {
            let request = ProviderRequest {
                messages: messages.clone(),
                settings: self.settings.clone(),
                tools: definitions.clone(),
            };
            debug!(round, "requesting model response");
            let response = self.provider.generate_text(&request).await?;
            usage.merge(&response.usage);
            text = response.text.clone();

            if response.tool_calls.is_empty() {
                if keep_final {
                    messages.push(ModelMessage::assistant(response.text));
                }
                return Ok(ToolPhase {
                    messages,
                    text,
                    records,
                    directives,
                    usage,
                });
            }

            messages.push(ModelMessage::assistant_tool_calls(&response.text, &response.tool_calls));
            for call in &response.tool_calls {
                let (result, is_error) = self.execute(call, &mut directives).await;
                records.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: result.clone(),
                });
                messages.push(ModelMessage::tool_result(call.id.clone(), result, is_error));
            }
        }

        warn!(rounds = MAX_TOOL_ROUNDS, "tool round limit reached");
        Ok(ToolPhase {
            messages,
            text,
            records,
            directives,
            usage,
        })
    }

    /// Run one tool call. Failures become error results the model can explain.
    async fn execute(&self, call: &AgentToolCall, directives: &mut Vec<UiDirective>) -> (serde_json::Value, bool) {
        match self.tools.execute(&call.name, &call.arguments).await {
            Ok(output) => {
                if let Some(directive) = output.directive {
                    directives.push(directive);
                }
                (output.result, false)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                let mut body = json!({ "error": e.to_string(), "category": e.category() });
                if let Some(details) = e.details() {
                    body["details"] = details;
                }
                (body, true)
            }
        }
    }
}

impl std::fmt::Debug for ChatDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDispatcher")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("tools", &self.tools)
            .finish()
    }
}

fn require_message(message: &str) -> Result<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        Err(DeskError::Validation("message is required".into()))
    } else {
        Ok(trimmed)
    }
}
