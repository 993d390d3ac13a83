//! Process-wide injection point asking the host UI to approve dangerous
//! tool executions.
//!
//! Mirrors the teacher's `Hook`/`HookAction` shape (`_ref_hook.rs`'s
//! `PreToolUse`/`Halt`/`SkipTool` variants) but generalized for the spec's
//! batch-confirmation contract: one request covers every dangerous action
//! in a tool-execution batch (§4.5 I3), and the handler answers with a
//! single verdict instead of per-call hook actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tiny_agent_types::ConfirmError;

/// One dangerous action awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationAction {
    /// The tool's registered name.
    pub tool: String,
    /// The arguments the model supplied.
    pub args: serde_json::Value,
    /// The human-readable danger prompt (from `Tool::dangerous`).
    pub description: String,
}

/// A batch of dangerous actions submitted for a single confirmation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// Every dangerous call in the current tool-execution batch, in input order.
    pub actions: Vec<ConfirmationAction>,
}

/// The host UI's verdict on a [`ConfirmationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfirmationResult {
    /// Every action in the batch is approved.
    Approve,
    /// Every action in the batch is denied.
    Deny,
    /// Only the action at `selected_index` is approved; the rest are denied.
    Partial {
        /// Index into [`ConfirmationRequest::actions`] of the sole approved call.
        selected_index: usize,
    },
}

impl ConfirmationResult {
    /// Whether the action at `index` is approved under this verdict.
    #[must_use]
    pub fn approves(&self, index: usize) -> bool {
        match self {
            Self::Approve => true,
            Self::Deny => false,
            Self::Partial { selected_index } => *selected_index == index,
        }
    }
}

/// A handler the host UI installs to answer confirmation requests.
#[async_trait::async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// Present `request` to the user and return their verdict.
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResult;
}

/// Process-wide broker. Holds at most one installed handler plus the
/// session-wide `approve_all`/`deny_all` toggles that short-circuit it
/// (set by `--allow-all`/`-y` or an interactive "approve all" choice).
#[derive(Clone, Default)]
pub struct ConfirmationBroker {
    handler: Option<Arc<dyn ConfirmationHandler>>,
    approve_all: Arc<AtomicBool>,
    deny_all: Arc<AtomicBool>,
}

impl ConfirmationBroker {
    /// A broker with no installed handler — every request is denied unless
    /// a session-wide toggle is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker wrapping `handler`.
    #[must_use]
    pub fn with_handler(handler: Arc<dyn ConfirmationHandler>) -> Self {
        Self {
            handler: Some(handler),
            approve_all: Arc::new(AtomicBool::new(false)),
            deny_all: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the session-wide "approve all" toggle (`--allow-all`/`-y`, or an
    /// interactive "approve all remaining" choice).
    pub fn set_approve_all(&self, value: bool) {
        self.approve_all.store(value, Ordering::SeqCst);
    }

    /// Set the session-wide "deny all" toggle.
    pub fn set_deny_all(&self, value: bool) {
        self.deny_all.store(value, Ordering::SeqCst);
    }

    /// Ask for confirmation of `request`. Session-wide toggles short-circuit
    /// the installed handler; absent both, an uninstalled handler is an
    /// error the caller should treat as a deny (the spec's default posture
    /// for a broker nobody configured).
    pub async fn confirm(
        &self,
        request: ConfirmationRequest,
    ) -> Result<ConfirmationResult, ConfirmError> {
        if self.approve_all.load(Ordering::SeqCst) {
            return Ok(ConfirmationResult::Approve);
        }
        if self.deny_all.load(Ordering::SeqCst) {
            return Ok(ConfirmationResult::Deny);
        }
        match &self.handler {
            Some(handler) => Ok(handler.confirm(request).await),
            None => Err(ConfirmError::NoHandler),
        }
    }

    /// Whether a handler is installed (used by the Tool Registry to decide
    /// whether dangerous calls can be confirmed at all, vs. auto-denied).
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.handler.is_some()
            || self.approve_all.load(Ordering::SeqCst)
            || self.deny_all.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FixedHandler(ConfirmationResult, AtomicUsize);

    #[async_trait::async_trait]
    impl ConfirmationHandler for FixedHandler {
        async fn confirm(&self, _request: ConfirmationRequest) -> ConfirmationResult {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
        }
    }

    fn action(tool: &str) -> ConfirmationAction {
        ConfirmationAction {
            tool: tool.to_string(),
            args: serde_json::json!({}),
            description: format!("Execute {tool}"),
        }
    }

    #[tokio::test]
    async fn no_handler_installed_errors() {
        let broker = ConfirmationBroker::new();
        let result = broker
            .confirm(ConfirmationRequest {
                actions: vec![action("bash")],
            })
            .await;
        assert!(matches!(result, Err(ConfirmError::NoHandler)));
    }

    #[tokio::test]
    async fn approve_all_short_circuits_handler() {
        let handler = Arc::new(FixedHandler(ConfirmationResult::Deny, AtomicUsize::new(0)));
        let broker = ConfirmationBroker::with_handler(handler.clone());
        broker.set_approve_all(true);
        let result = broker
            .confirm(ConfirmationRequest {
                actions: vec![action("bash")],
            })
            .await
            .unwrap();
        assert_eq!(result, ConfirmationResult::Approve);
        assert_eq!(handler.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deny_all_short_circuits_handler() {
        let handler = Arc::new(FixedHandler(ConfirmationResult::Approve, AtomicUsize::new(0)));
        let broker = ConfirmationBroker::with_handler(handler.clone());
        broker.set_deny_all(true);
        let result = broker
            .confirm(ConfirmationRequest {
                actions: vec![action("bash")],
            })
            .await
            .unwrap();
        assert_eq!(result, ConfirmationResult::Deny);
        assert_eq!(handler.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_is_consulted_by_default() {
        let handler = Arc::new(FixedHandler(
            ConfirmationResult::Partial { selected_index: 1 },
            AtomicUsize::new(0),
        ));
        let broker = ConfirmationBroker::with_handler(handler.clone());
        let result = broker
            .confirm(ConfirmationRequest {
                actions: vec![action("write_file"), action("bash")],
            })
            .await
            .unwrap();
        assert_eq!(result, ConfirmationResult::Partial { selected_index: 1 });
        assert_eq!(handler.1.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn partial_approves_only_selected_index() {
        let result = ConfirmationResult::Partial { selected_index: 2 };
        assert!(!result.approves(0));
        assert!(!result.approves(1));
        assert!(result.approves(2));
    }
}
