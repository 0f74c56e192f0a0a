// src/engine/execution.rs
//
// Execute flow: Idle -> Preparing -> AwaitingSignature -> Confirming -> Succeeded | Failed.
// Transitions are plain functions on `ExecutionState`; `TransactionExecutor`
// drives them against the AI service and a wallet.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai::{
    client::AiSource,
    models::{AiResponse, ExecutionIntent},
};
use crate::blockchain::{
    models::Address,
    signer::{SignRequest, SignerError, TransactionSigner, TxReceipt},
};

/// Unsigned transaction proposed by the AI service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDescriptor {
    pub to: Address,
    /// Wei, decimal or `0x`-hex as the AI sent it.
    pub value: String,
    pub data: String,
}

impl TransactionDescriptor {
    /// Action data arrives JSON-encoded inside a string; some deployments send
    /// the object directly.
    pub fn from_action_data(data: &Value) -> Option<Self> {
        let object = match data {
            Value::String(encoded) => serde_json::from_str::<Value>(encoded).ok()?,
            Value::Object(_) => data.clone(),
            _ => return None,
        };
        let to = Address::parse(object.get("to")?.as_str()?)?;
        let value = match object.get("value") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0".to_string(),
        };
        let data = object
            .get("data")
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("0x")
            .to_string();
        Some(Self { to, value, data })
    }

    pub fn sign_request(&self, chain_id: u64) -> SignRequest {
        SignRequest {
            to: self.to.clone(),
            value: self.value.clone(),
            data: self.data.clone(),
            chain_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UserRejected,
    InsufficientBalance,
    InvalidRecipient,
    NetworkError,
    GasEstimationFailed,
    NoActionableTransaction,
    Unknown,
}

impl FailureReason {
    /// Best-effort classification of a wallet or node error message.
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        // Transport failures mention the RPC method (often a gas call), so they go first.
        if ["network error", "connection", "timed out", "timeout"].iter().any(|k| m.contains(k)) {
            FailureReason::NetworkError
        } else if ["reject", "denied", "cancel"].iter().any(|k| m.contains(k)) {
            FailureReason::UserRejected
        } else if m.contains("insufficient") {
            FailureReason::InsufficientBalance
        } else if m.contains("recipient") || m.contains("invalid address") {
            FailureReason::InvalidRecipient
        } else if m.contains("gas") {
            FailureReason::GasEstimationFailed
        } else {
            FailureReason::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::UserRejected => "rejected in wallet",
            FailureReason::InsufficientBalance => "insufficient balance",
            FailureReason::InvalidRecipient => "invalid recipient",
            FailureReason::NetworkError => "network error",
            FailureReason::GasEstimationFailed => "gas estimation failed",
            FailureReason::NoActionableTransaction => "no actionable transaction",
            FailureReason::Unknown => "unknown error",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            FailureReason::UserRejected => "Approve the request in your wallet, or send a new command.",
            FailureReason::InsufficientBalance => "Top up your CHZ balance to cover the amount plus gas, then try again.",
            FailureReason::InvalidRecipient => "Verify the recipient address (0x followed by 40 hex characters) and try again.",
            FailureReason::NetworkError => "Check your connection or reconnect your wallet, then try again.",
            FailureReason::GasEstimationFailed => "The transaction would likely revert. Check the amount and the contract, then try again.",
            FailureReason::NoActionableTransaction => "Rephrase the command with an explicit amount and recipient, for example \"send 1 CHZ to 0x...\".",
            FailureReason::Unknown => "Reconnect your wallet and try again. If it keeps failing, look the transaction up on the explorer.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionFailure {
    pub reason: FailureReason,
    pub detail: String,
    /// The AI response that produced no transaction, kept for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl ExecutionFailure {
    fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            raw_response: None,
        }
    }

    fn from_signer(err: SignerError) -> Self {
        let reason = match &err {
            SignerError::Rejected(_) => FailureReason::UserRejected,
            SignerError::Timeout(_) | SignerError::Network(_) => FailureReason::NetworkError,
            SignerError::Failed(message) => FailureReason::classify(message),
        };
        Self::new(reason, err.to_string())
    }

    /// User-facing text: what failed, the next step, and the raw AI response if any.
    pub fn message(&self) -> String {
        let mut out = format!(
            "❌ Transaction failed ({}): {}\n\nNext step: {}",
            self.reason.label(),
            self.detail,
            self.reason.remediation()
        );
        if let Some(raw) = &self.raw_response {
            let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
            out.push_str(&format!("\n\nRaw AI response:\n```json\n{}\n```", pretty));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Preparing,
    AwaitingSignature { transaction: TransactionDescriptor },
    Confirming { tx_hash: String },
    Succeeded { tx_hash: String, block_number: Option<String> },
    Failed { failure: ExecutionFailure },
}

impl ExecutionState {
    fn failed(failure: ExecutionFailure) -> Self {
        ExecutionState::Failed { failure }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Preparing => "preparing",
            ExecutionState::AwaitingSignature { .. } => "awaiting_signature",
            ExecutionState::Confirming { .. } => "confirming",
            ExecutionState::Succeeded { .. } => "succeeded",
            ExecutionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Succeeded { .. } | ExecutionState::Failed { .. })
    }

    pub fn status_message(&self) -> String {
        match self {
            ExecutionState::Idle => "Ready.".to_string(),
            ExecutionState::Preparing => "⏳ Preparing transaction...".to_string(),
            ExecutionState::AwaitingSignature { transaction } => format!(
                "✍️ Awaiting wallet approval: send {} wei to {}",
                transaction.value, transaction.to
            ),
            ExecutionState::Confirming { tx_hash } => format!("⏳ Waiting for confirmation of {}", tx_hash),
            ExecutionState::Succeeded { tx_hash, .. } => format!("✅ Transaction confirmed: {}", tx_hash),
            ExecutionState::Failed { failure } => failure.message(),
        }
    }

    /// Idle -> Preparing.
    pub fn begin(self) -> Self {
        match self {
            ExecutionState::Idle => ExecutionState::Preparing,
            other => other,
        }
    }

    /// Preparing -> AwaitingSignature | Failed. `None` means the AI service
    /// could not be reached.
    pub fn on_ai_response(self, response: Option<&AiResponse>) -> Self {
        if self != ExecutionState::Preparing {
            return self;
        }
        let Some(response) = response else {
            return Self::failed(ExecutionFailure::new(
                FailureReason::NetworkError,
                "the AI service did not respond",
            ));
        };
        match response
            .sign_transaction_action()
            .and_then(|action| TransactionDescriptor::from_action_data(&action.data))
        {
            Some(transaction) => ExecutionState::AwaitingSignature { transaction },
            None => {
                let detail = response
                    .message
                    .clone()
                    .unwrap_or_else(|| "the AI response contained no transaction to sign".to_string());
                Self::failed(ExecutionFailure {
                    reason: FailureReason::NoActionableTransaction,
                    detail,
                    raw_response: Some(response.raw.clone()),
                })
            }
        }
    }

    /// AwaitingSignature -> Confirming | Failed.
    pub fn on_submitted(self, result: Result<String, SignerError>) -> Self {
        match self {
            ExecutionState::AwaitingSignature { .. } => match result {
                Ok(tx_hash) => ExecutionState::Confirming { tx_hash },
                Err(e) => Self::failed(ExecutionFailure::from_signer(e)),
            },
            other => other,
        }
    }

    /// Confirming -> Succeeded | Failed.
    pub fn on_receipt(self, result: Result<TxReceipt, SignerError>) -> Self {
        match self {
            ExecutionState::Confirming { tx_hash } => match result {
                Ok(receipt) if receipt.success => ExecutionState::Succeeded {
                    tx_hash,
                    block_number: receipt.block_number,
                },
                Ok(_) => Self::failed(ExecutionFailure::new(
                    FailureReason::Unknown,
                    format!("transaction {} reverted on chain", tx_hash),
                )),
                Err(e) => Self::failed(ExecutionFailure::from_signer(e)),
            },
            other => other,
        }
    }
}

/// Progress event for callers rendering the flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionUpdate {
    pub state: &'static str,
    pub message: String,
}

/// Drives [`ExecutionState`] against the AI service and a wallet.
#[derive(Clone)]
pub struct TransactionExecutor {
    ai: Arc<dyn AiSource>,
    updates: Option<UnboundedSender<ExecutionUpdate>>,
}

impl TransactionExecutor {
    pub fn new(ai: Arc<dyn AiSource>) -> Self {
        Self { ai, updates: None }
    }

    pub fn with_updates(mut self, updates: UnboundedSender<ExecutionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    fn emit(&self, state: &ExecutionState) {
        debug!(state = state.name(), "Execution transition");
        if let Some(tx) = &self.updates {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(ExecutionUpdate {
                state: state.name(),
                message: state.status_message(),
            });
        }
    }

    /// Idle -> Preparing -> AwaitingSignature (or Failed). For callers whose
    /// user signs in their own wallet.
    pub async fn prepare(&self, intent: &ExecutionIntent) -> ExecutionState {
        let state = ExecutionState::Idle.begin();
        self.emit(&state);

        let response = self.ai.execute_command(intent).await;
        let state = state.on_ai_response(response.as_ref());
        match &state {
            ExecutionState::Failed { failure } => {
                warn!(reason = ?failure.reason, "Execute command produced no transaction")
            }
            _ => info!(signer = %intent.signer_address, "Transaction prepared"),
        }
        self.emit(&state);
        state
    }

    /// AwaitingSignature -> Confirming -> Succeeded | Failed. Cancelling
    /// `cancel` while the wallet is pending resolves to a user rejection.
    pub async fn complete(
        &self,
        state: ExecutionState,
        chain_id: u64,
        signer: &dyn TransactionSigner,
        cancel: &CancellationToken,
    ) -> ExecutionState {
        let request = match &state {
            ExecutionState::AwaitingSignature { transaction } => transaction.sign_request(chain_id),
            _ => return state,
        };

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SignerError::Rejected("cancelled by user".into())),
            result = signer.sign_and_send(&request) => result,
        };
        let state = state.on_submitted(submitted);
        self.emit(&state);

        let tx_hash = match &state {
            ExecutionState::Confirming { tx_hash } => tx_hash.clone(),
            _ => return state,
        };

        let receipt = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SignerError::Rejected("cancelled by user".into())),
            result = signer.wait_for_receipt(&tx_hash, chain_id) => result,
        };
        let state = state.on_receipt(receipt);
        match &state {
            ExecutionState::Succeeded { tx_hash, .. } => info!(tx_hash = %tx_hash, "Transaction confirmed"),
            ExecutionState::Failed { failure } => warn!(reason = ?failure.reason, detail = %failure.detail, "Transaction failed"),
            _ => {}
        }
        self.emit(&state);
        state
    }

    /// The whole flow in one call.
    pub async fn execute(
        &self,
        intent: &ExecutionIntent,
        signer: &dyn TransactionSigner,
        cancel: &CancellationToken,
    ) -> ExecutionState {
        let state = self.prepare(intent).await;
        self.complete(state, intent.chain_id, signer, cancel).await
    }
}
