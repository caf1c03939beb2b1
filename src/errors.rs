use crate::units::UnitsError;

/// Failure at the chain boundary. Raw transport / wallet errors are classified
/// into these variants by the adapter and never travel further as text blobs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("chain unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected by user")]
    UserRejected,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("receipt not retrievable: {0}")]
    ReceiptNotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed chain data: {0}")]
    Decode(String),
}

impl ChainError {
    /// Map a raw RPC or wallet error message onto the taxonomy.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected the request")
            || lower.contains("code 4001")
        {
            ChainError::UserRejected
        } else if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds(message)
        } else if is_receipt_lookup_failure(&lower) {
            ChainError::ReceiptNotFound(message)
        } else if lower.contains("revert") {
            ChainError::Reverted(message)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ChainError::Timeout(message)
        } else {
            ChainError::Unavailable(message)
        }
    }

    /// True when a receipt lookup failed without saying anything about the
    /// transaction itself.
    pub fn is_receipt_unavailable(&self) -> bool {
        matches!(self, ChainError::ReceiptNotFound(_))
    }
}

fn is_receipt_lookup_failure(lower: &str) -> bool {
    lower.contains("no matching receipt")
        || lower.contains("receipt not found")
        || lower.contains("could not find transaction receipt")
        || (lower.contains("receipt") && lower.contains("corrupt"))
        || (lower.contains("cannot be found") && (lower.contains("receipt") || lower.contains("transaction")))
}

impl From<UnitsError> for ChainError {
    fn from(e: UnitsError) -> Self {
        ChainError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_user_rejection() {
        assert_eq!(
            ChainError::classify("MetaMask Tx Signature: User denied transaction signature."),
            ChainError::UserRejected
        );
        assert_eq!(
            ChainError::classify("server returned an error response: error code 4001: rejected"),
            ChainError::UserRejected
        );
    }

    #[test]
    fn test_classify_receipt_failures() {
        for msg in [
            "No matching receipt found for 0xabc",
            "Transaction receipt not found",
            "could not find transaction receipt",
            "receipt data corrupted",
            "Transaction with hash 0xabc cannot be found",
        ] {
            assert!(ChainError::classify(msg).is_receipt_unavailable(), "{msg}");
        }
    }

    #[test]
    fn test_classify_unrelated_lookup_is_not_receipt_failure() {
        for msg in ["header for hash 0xabc cannot be found", "block 123 cannot be found"] {
            assert!(matches!(ChainError::classify(msg), ChainError::Unavailable(_)), "{msg}");
        }
    }

    #[test]
    fn test_classify_funds_and_reverts() {
        assert!(matches!(
            ChainError::classify("insufficient funds for gas * price + value"),
            ChainError::InsufficientFunds(_)
        ));
        assert!(matches!(
            ChainError::classify("execution reverted: Insufficient contract balance"),
            ChainError::Reverted(_)
        ));
    }

    #[test]
    fn test_classify_defaults_to_unavailable() {
        assert!(matches!(
            ChainError::classify("connection refused"),
            ChainError::Unavailable(_)
        ));
        assert!(matches!(
            ChainError::classify("request timed out"),
            ChainError::Timeout(_)
        ));
    }
}
