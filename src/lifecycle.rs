//! Artifact panel state for one (tenant, conversation) slot.
//!
//! DESIGN
//! ======
//! The panel is Empty (`artifact() == None`) or Active. The newest
//! assistant message carrying a parseable artifact activates it; the id of
//! the last message detection processed is remembered so the same message
//! never rebuilds over edits or over an explicitly opened artifact. Edits
//! stay in memory until `persist_current` or `close_panel`.
//!
//! Switching identity drops in-memory state for the old slot and restores
//! whatever the new slot has saved. There is no migration or merge.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::{ReactArtifact, build_artifact, parse_react_artifact};
use crate::storage::{StorageBackend, StorageKey, load_artifact, save_artifact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    /// A tool approval prompt; never an artifact source.
    ApprovalRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
}

impl ChatMessage {
    fn may_carry_artifact(&self) -> bool {
        self.role == MessageRole::Assistant && self.kind == MessageKind::Text && !self.content.trim().is_empty()
    }
}

pub struct ArtifactPanel {
    storage: Arc<dyn StorageBackend>,
    key: Option<StorageKey>,
    artifact: Option<ReactArtifact>,
    /// Last persisted form, the target of `reset_to_saved`.
    saved: Option<ReactArtifact>,
    /// Newest qualifying message automatic detection has handled. Only
    /// `sync_messages` and `set_identity` move it.
    last_processed_message_id: Option<String>,
}

impl ArtifactPanel {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage, key: None, artifact: None, saved: None, last_processed_message_id: None }
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&ReactArtifact> {
        self.artifact.as_ref()
    }

    #[must_use]
    pub fn saved(&self) -> Option<&ReactArtifact> {
        self.saved.as_ref()
    }

    #[must_use]
    pub fn key(&self) -> Option<&StorageKey> {
        self.key.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.artifact.is_some()
    }

    /// Point the panel at a (tenant, conversation) slot. A changed slot
    /// discards unsaved edits and restores the slot's saved artifact.
    pub fn set_identity(&mut self, tenant: Option<&str>, conversation: Option<&str>) {
        let key = StorageKey::new(tenant, conversation);
        if self.key.as_ref() == Some(&key) {
            return;
        }
        let restored = load_artifact(self.storage.as_ref(), &key);
        debug!(key = %key, restored = restored.is_some(), "artifact panel identity changed");
        self.last_processed_message_id = restored.as_ref().map(|a| a.source_message_id.clone());
        self.saved = restored.clone();
        self.artifact = restored;
        self.key = Some(key);
    }

    /// Build from the newest qualifying assistant message unless that
    /// message already produced the current artifact. Returns whether a
    /// new artifact was built.
    pub fn sync_messages(&mut self, messages: &[ChatMessage]) -> bool {
        let newest = messages
            .iter()
            .rev()
            .filter(|m| m.may_carry_artifact())
            .find_map(|m| parse_react_artifact(&m.content).map(|candidate| (m, candidate)));
        let Some((message, candidate)) = newest else {
            return false;
        };
        if self.last_processed_message_id.as_deref() == Some(message.id.as_str()) {
            return false;
        }

        let artifact = build_artifact(&message.id, candidate);
        debug!(message_id = %message.id, artifact_id = %artifact.id, "artifact built from message");
        self.last_processed_message_id = Some(message.id.clone());
        self.artifact = Some(artifact);
        self.persist_current();
        true
    }

    /// Replace the code of the active artifact. Not persisted.
    pub fn update_code(&mut self, code: impl Into<String>) {
        if let Some(artifact) = self.artifact.as_mut() {
            artifact.set_code(code);
        }
    }

    /// Save the active artifact and make it the reset baseline.
    pub fn persist_current(&mut self) {
        let Some(artifact) = self.artifact.as_ref() else {
            return;
        };
        if let Some(key) = &self.key {
            save_artifact(self.storage.as_ref(), key, artifact);
        }
        self.saved = Some(artifact.clone());
    }

    /// Restore the code last saved for the active artifact. No-op when
    /// nothing was saved for it.
    pub fn reset_to_saved(&mut self) {
        let (Some(artifact), Some(saved)) = (self.artifact.as_mut(), self.saved.as_ref()) else {
            return;
        };
        if artifact.id == saved.id {
            artifact.set_code(saved.code.clone());
        }
    }

    /// Persist (when a slot is set) and empty the panel.
    pub fn close_panel(&mut self) {
        if self.key.is_some() {
            self.persist_current();
        }
        if let Some(artifact) = self.artifact.take() {
            debug!(artifact_id = %artifact.id, "artifact panel closed");
        }
    }

    /// Open the artifact in `content` explicitly. Leaves the panel alone
    /// when the content holds none. Returns whether it opened. Detection
    /// state is untouched, so a later sync over the same messages keeps
    /// the opened artifact.
    pub fn open_from_message(&mut self, message_id: &str, content: &str) -> bool {
        let Some(candidate) = parse_react_artifact(content) else {
            return false;
        };
        let artifact = build_artifact(message_id, candidate);
        debug!(message_id, artifact_id = %artifact.id, "artifact opened from message");
        self.artifact = Some(artifact);
        true
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
