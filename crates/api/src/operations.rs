// Operations registered with the dispatcher
//
// Each operation unpacks its positional arguments, calls a collaborator and
// logs through a dedicated recovery handler once it gives up.

use std::sync::Arc;

use serde_json::Value;
use taskforge_executor::{
    recovery_fn, Args, Dispatcher, RecoveryHandler, RetryPolicy, TaskError, TerminalFailure,
};
use tracing::{error, info};

use crate::services::{EmailService, OrderService};

pub const SEND_EMAIL: &str = "send_email";
pub const UPDATE_STOCK: &str = "update_stock";
pub const ORDER_CONFIRMATION: &str = "order_confirmation";

/// Register every operation the HTTP layer submits
pub fn register(
    dispatcher: &mut Dispatcher,
    email: Arc<dyn EmailService>,
    orders: Arc<dyn OrderService>,
    policy: &RetryPolicy,
) {
    dispatcher.register(SEND_EMAIL, policy.clone(), send_email_recovery(), move |args| {
        let email = Arc::clone(&email);
        async move {
            let address = string_arg(&args, 0, "email")?;
            let message = string_arg(&args, 1, "message")?;
            let subject = string_arg(&args, 2, "subject")?;

            info!(operation = SEND_EMAIL, "Started asynchronous task");
            email.send_email(&address, &message, &subject).await?;
            Ok::<(), TaskError>(())
        }
    });

    let stock_orders = Arc::clone(&orders);
    dispatcher.register(UPDATE_STOCK, policy.clone(), order_recovery("update stock"), move |args| {
        let orders = Arc::clone(&stock_orders);
        async move {
            let order_id = string_arg(&args, 0, "order_id")?;

            info!(operation = UPDATE_STOCK, %order_id, "Started asynchronous task");
            orders.update_stock_by_order_id(&order_id).await?;
            Ok::<(), TaskError>(())
        }
    });

    dispatcher.register(
        ORDER_CONFIRMATION,
        policy.clone(),
        order_recovery("confirm order"),
        move |args| {
            let orders = Arc::clone(&orders);
            async move {
                let order_id = string_arg(&args, 0, "order_id")?;

                info!(operation = ORDER_CONFIRMATION, %order_id, "Started asynchronous task");
                orders.order_confirmation(&order_id).await?;
                Ok::<(), TaskError>(())
            }
        },
    );
}

fn send_email_recovery() -> Arc<dyn RecoveryHandler> {
    Arc::new(recovery_fn(|failure: TerminalFailure| async move {
        let email = failure.args.first().and_then(Value::as_str).unwrap_or("<unknown>");
        error!(
            email,
            cause = %failure.cause,
            error = %failure.error,
            "Failed to send email after {} attempts. Email: {}",
            failure.attempts,
            email
        );
        Ok::<(), anyhow::Error>(())
    }))
}

fn order_recovery(action: &'static str) -> Arc<dyn RecoveryHandler> {
    Arc::new(recovery_fn(move |failure: TerminalFailure| async move {
        let order_id = failure.args.first().and_then(Value::as_str).unwrap_or("<unknown>");
        error!(
            %order_id,
            cause = %failure.cause,
            error = %failure.error,
            "Failed to {} after {} attempts. Order ID: {}",
            action,
            failure.attempts,
            order_id
        );
        Ok::<(), anyhow::Error>(())
    }))
}

/// Positional string argument; a missing or mistyped one is never retried
fn string_arg(args: &Args, index: usize, name: &str) -> Result<String, TaskError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            TaskError::non_retryable(format!("missing string argument '{name}' at {index}"))
                .with_type("INVALID_ARGUMENT")
        })
}
