// Chat orchestration
// Combines conversation memory, retrieval, and the remote chat model. The
// context-injection policy lives here: retrieved fragments ride along as a
// transient system message for one call and are never written to memory.


use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::Result;
use crate::chat::{ArkChatClient, ChatBackend, ChatMessage, ContentPart, ImageUrl};
use crate::config::Config;
use crate::embeddings::{ArkEmbeddingClient, Embedder};
use crate::memory::MemoryStore;
use crate::rag::{self, RagStatus, ReindexSummary, RetrievedContext};

const CONTEXT_INSTRUCTION: &str = "You are a retrieval-augmented assistant. Answer strictly \
from the document fragments below. If the answer is not in them, say you are not sure \
instead of making something up.";

const RAG_QUERY_SYSTEM: &str = "You are a retrieval-augmented Q&A assistant. Answer strictly \
from the provided document fragments; if they do not contain the answer, say so plainly \
rather than inventing one.";

const NO_MATCHING_FRAGMENTS: &str = "(no matching fragments)";

/// The backend's front door: owns the remote clients and the conversation
/// memory, and applies the context-injection policy for every chat variant.
pub struct RagService {
    config: Config,
    chat: Arc<dyn ChatBackend>,
    embedder: Arc<dyn Embedder>,
    memory: MemoryStore,
}

impl RagService {
    #[inline]
    pub fn new(config: Config) -> Self {
        let chat = Arc::new(ArkChatClient::new(&config));
        let embedder = Arc::new(ArkEmbeddingClient::new(&config));
        Self::with_backends(config, chat, embedder)
    }

    /// Construction seam for tests and alternative backends.
    #[inline]
    pub fn with_backends(
        config: Config,
        chat: Arc<dyn ChatBackend>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let memory = MemoryStore::new(config.system_prompt.clone());
        Self {
            config,
            chat,
            embedder,
            memory,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Text chat with optional retrieval augmentation. The per-request
    /// override wins over the configured default.
    #[inline]
    pub fn chat_text(
        &self,
        message: &str,
        memory_id: Option<&str>,
        use_rag: Option<bool>,
    ) -> Result<String> {
        let history = self.memory.history(memory_id);
        let rag_enabled = use_rag.unwrap_or(self.config.rag_enabled_for_chat);

        // Retrieval runs against the new user message only, and a retrieval
        // failure must never take plain chat down with it.
        let contexts = if rag_enabled {
            match rag::retrieve(self.embedder.as_ref(), &self.config, message) {
                Ok(contexts) => contexts,
                Err(err) => {
                    warn!("Retrieval failed, continuing without context: {err}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let user = ChatMessage::user(message);
        let mut working = history;
        if !contexts.is_empty() {
            working.push(context_message(&contexts));
        }
        working.push(user.clone());

        let reply = self.chat.complete(&working)?;

        self.memory.append(memory_id, user);
        self.memory.append(memory_id, ChatMessage::assistant(&reply));
        Ok(reply)
    }

    /// Vision chat: multimodal content blocks, no retrieval injection.
    #[inline]
    pub fn chat_vision(
        &self,
        prompt: &str,
        image_urls: &[String],
        memory_id: Option<&str>,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(image_urls.len() + 1);
        if !prompt.is_empty() {
            parts.push(ContentPart::Text {
                text: prompt.to_string(),
            });
        }
        for url in image_urls {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            });
        }

        let user = ChatMessage::user_parts(parts);
        let mut working = self.memory.history(memory_id);
        working.push(user.clone());

        let reply = self.chat.complete(&working)?;

        self.memory.append(memory_id, user);
        self.memory.append(memory_id, ChatMessage::assistant(&reply));
        Ok(reply)
    }

    /// Schema-constrained chat. Memory is message-based, so the decoded
    /// value is serialized back to text before persisting.
    #[inline]
    pub fn chat_structured(
        &self,
        message: &str,
        schema: &Value,
        name: Option<&str>,
        memory_id: Option<&str>,
    ) -> Result<Value> {
        let user = ChatMessage::user(message);
        let mut working = self.memory.history(memory_id);
        working.push(user.clone());

        let data = self
            .chat
            .complete_structured(&working, name.unwrap_or("structured_output"), schema)?;

        self.memory.append(memory_id, user);
        self.memory
            .append(memory_id, ChatMessage::assistant(data.to_string()));
        Ok(data)
    }

    /// One-shot retrieve-and-answer. Unlike the chat path this surfaces
    /// retrieval failures and leaves conversation memory untouched.
    #[inline]
    pub fn rag_query(&self, question: &str) -> Result<(String, Vec<RetrievedContext>)> {
        let contexts = rag::retrieve(self.embedder.as_ref(), &self.config, question)?;

        let context_block = if contexts.is_empty() {
            NO_MATCHING_FRAGMENTS.to_string()
        } else {
            format_contexts(&contexts)
        };
        let prompt = format!(
            "Retrieved document fragments:\n\n{context_block}\n\nQuestion: {question}\n\
             Answer from the documents, citing fragment numbers where helpful."
        );

        let reply = self
            .chat
            .complete(&[ChatMessage::system(RAG_QUERY_SYSTEM), ChatMessage::user(prompt)])?;
        Ok((reply, contexts))
    }

    #[inline]
    pub fn reindex(&self) -> Result<ReindexSummary> {
        rag::reindex(self.embedder.as_ref(), &self.config)
    }

    #[inline]
    pub fn status(&self) -> RagStatus {
        rag::status(&self.config)
    }
}

/// The transient system message injected for a single model call.
fn context_message(contexts: &[RetrievedContext]) -> ChatMessage {
    ChatMessage::system(format!(
        "{CONTEXT_INSTRUCTION}\n\n{}",
        format_contexts(contexts)
    ))
}

fn format_contexts(contexts: &[RetrievedContext]) -> String {
    let mut block = String::new();
    for (index, context) in contexts.iter().enumerate() {
        if index > 0 {
            block.push_str("\n\n");
        }
        let _ = write!(
            block,
            "[{}] (source: {})\n{}",
            index + 1,
            context.metadata.doc_name,
            context.text.trim()
        );
    }
    block
}
