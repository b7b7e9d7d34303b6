use crate::ReceiverType;

/// Broad failure category, for callers that only care which side is at fault.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested capability has no usable factory.
    Resolution,
    /// The caller broke an API contract. Never recoverable at runtime.
    ContractViolation,
    /// The receiver does not implement the requested operation.
    Unsupported,
    /// A speculation guard was checked after it had been invalidated.
    Invalidated,
}

/// Malformed registration tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("capability `{capability}` is registered more than once")]
    DuplicateCapability { capability: &'static str },
    #[error(
        "capability `{capability}` has more than one export for receiver `{receiver}`"
    )]
    DuplicateExport {
        capability: &'static str,
        receiver: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("no factory registered for capability `{capability}`")]
    Unregistered { capability: &'static str },
    #[error("capability registry is malformed: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("node `{kind}` is already adopted")]
    AlreadyAdopted { kind: &'static str },
    #[error("adopting node `{kind}` would create a cycle")]
    Cycle { kind: &'static str },
    #[error("dispatch limit {limit} is out of range (maximum {max})")]
    LimitOutOfRange { limit: usize, max: usize },
    #[error(
        "cached `{capability}` node for `{expected}` does not accept receiver `{receiver}`"
    )]
    NotAccepted {
        capability: &'static str,
        expected: &'static str,
        receiver: &'static str,
    },
    #[error("invalid dispatch settings: {0}")]
    InvalidSettings(&'static str),
    #[error("dispatch settings are already installed")]
    SettingsInstalled,
}

/// Returned by capability operations a receiver does not implement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{capability}::{message}` is not supported by receiver `{receiver}`")]
pub struct UnsupportedMessage {
    pub capability: &'static str,
    pub message: &'static str,
    pub receiver: &'static str,
}

impl UnsupportedMessage {
    #[must_use]
    pub fn new(
        capability: &'static str,
        message: &'static str,
        receiver: ReceiverType,
    ) -> Self {
        Self {
            capability,
            message,
            receiver: receiver.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guard `{name}` is invalid")]
pub struct Invalidated {
    pub name: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedMessage),
    #[error(transparent)]
    Invalidated(#[from] Invalidated),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::Contract(_) => ErrorKind::ContractViolation,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Invalidated(_) => ErrorKind::Invalidated,
        }
    }

    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ContractViolation)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_distinguishable() {
        let err: Error =
            ContractViolation::LimitOutOfRange { limit: 99, max: 64 }.into();
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert!(err.is_contract_violation());
        assert_eq!(
            err.to_string(),
            "dispatch limit 99 is out of range (maximum 64)"
        );

        let err: Error = ResolutionError::Unregistered {
            capability: "Counter",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn unsupported_message_names_the_receiver() {
        let err = UnsupportedMessage::new(
            "Counter",
            "increment",
            ReceiverType::of::<String>(),
        );
        let message = err.to_string();
        assert!(message.starts_with("`Counter::increment` is not supported"));
        assert!(message.contains("String"), "{message}");
    }
}
