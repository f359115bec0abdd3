//! Wallet error taxonomy.
//!
//! Every failure that can cross the provider boundary is expressed as a
//! `WalletError`. None of them is fatal: the state machine catches them
//! at the transition boundary and stays in a well-defined state.

use thiserror::Error;

/// EIP-1193 provider error code for "User Rejected Request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors surfaced by the provider port and the numeric converter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined a permission prompt. Expected and non-fatal.
    #[error("user rejected the request (code {code}): {message}")]
    UserRejected {
        /// Provider-defined rejection code.
        code: i64,
        /// Provider message.
        message: String,
    },

    /// Any other provider rejection (RPC, network, internal).
    #[error("provider error{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Provider {
        /// JSON-RPC error code, when the provider supplied one.
        code: Option<i64>,
        /// Provider message.
        message: String,
    },

    /// Malformed base-unit amount returned by the provider.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A response whose shape does not match the method's contract.
    #[error("invalid response to {method}: {reason}")]
    InvalidResponse {
        /// JSON-RPC method name.
        method: &'static str,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The provider does not implement an optional capability.
    #[error("provider does not support {0}")]
    Unsupported(&'static str),

    /// No provider was detected for this session.
    #[error("no wallet provider detected")]
    NoProvider,
}

impl WalletError {
    /// Build an error from a provider `{ code, message }` rejection.
    ///
    /// Code 4001 is the only code treated as a user rejection.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == USER_REJECTED_CODE {
            Self::UserRejected { code, message }
        } else {
            Self::Provider {
                code: Some(code),
                message,
            }
        }
    }

    /// Build a provider error with no code (transport failures).
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            code: None,
            message: message.into(),
        }
    }

    /// Whether the user declined the request.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected { .. })
    }

    /// Whether this failure propagates as a provider error.
    ///
    /// Malformed amounts and responses are provider failures for
    /// propagation purposes.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::InvalidAmount(_) | Self::InvalidResponse { .. }
        )
    }
}
