// Simulated business collaborators
// Decision: Collaborators are explicit trait objects passed to operations, never globals

pub mod email;
pub mod order;

pub use email::{EmailService, SimulatedEmailService};
pub use order::{Order, OrderDetail, OrderService, SimulatedOrderService};

use taskforge_executor::TaskError;
use thiserror::Error;

/// Failures raised by the business collaborators
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Insufficient stock for product ID: {product_id}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Machine-readable error type
    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// Transient failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

impl From<ServiceError> for TaskError {
    fn from(err: ServiceError) -> Self {
        let error = if err.is_transient() {
            TaskError::retryable(err.to_string())
        } else {
            TaskError::non_retryable(err.to_string())
        };
        error.with_type(err.error_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_is_not_retryable() {
        let error: TaskError = ServiceError::InsufficientStock {
            product_id: "PROD1001".into(),
            requested: 500,
            available: 100,
        }
        .into();

        assert!(!error.retryable);
        assert_eq!(error.error_type.as_deref(), Some("INSUFFICIENT_STOCK"));
        assert_eq!(error.message, "Insufficient stock for product ID: PROD1001");
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let error: TaskError = ServiceError::Unavailable("smtp relay down".into()).into();
        assert!(error.retryable);
    }
}
