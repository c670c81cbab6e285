// Order collaborator
// Decision: Amounts are integer minor units (cents) to avoid float rounding

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{EmailService, ServiceError};

/// Stock every simulated product starts with
pub const INITIAL_STOCK: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub product_id: String,
    pub product_name: String,
    pub product_price_cents: i64,
    pub quantity: u32,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_price_cents: i64,
}

impl OrderDetail {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        product_price_cents: i64,
        quantity: u32,
        discount_cents: i64,
    ) -> Self {
        let subtotal_cents = product_price_cents * i64::from(quantity);
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            product_price_cents,
            quantity,
            subtotal_cents,
            discount_cents,
            total_price_cents: subtotal_cents - discount_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub order_id: String,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub total_cents: i64,
    pub currency: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub details: Vec<OrderDetail>,
}

impl Order {
    /// Fixed sample order used by the simulation
    pub fn sample(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            order_date: Utc::now(),
            status: "PENDING".to_string(),
            total_cents: 19_999,
            currency: "IDR".to_string(),
            customer_id: "CUST1001".to_string(),
            customer_name: "Agus Yulianto".to_string(),
            customer_email: "agus_yulianto@example.com".to_string(),
            shipping_address: "Jl. Melati V No. 8, Solo, Jawa Tengah, Indonesia".to_string(),
            details: vec![OrderDetail::new("PROD1001", "Product A", 9_999, 2, 1_000)],
        }
    }

    /// Body of the confirmation email
    pub fn confirmation_message(&self) -> String {
        format!(
            "Dear {},\n\n\
             Thank you for your order. Your order has been confirmed and is being processed.\n\n\
             Order ID: {}\n\
             Order Date: {}\n\
             Total Amount: {} {}\n\n\
             We will notify you once your order has been shipped.\n\n\
             Thank you for shopping with us!\n\n\
             Best regards,\n\
             The Store Team",
            self.customer_name,
            self.order_id,
            self.order_date.to_rfc3339(),
            format_amount(self.total_cents),
            self.currency
        )
    }
}

/// Render minor units as a decimal amount ("199.99")
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn update_stock(&self, product_id: &str, quantity: u32) -> Result<(), ServiceError>;

    async fn update_stock_by_order_id(&self, order_id: &str) -> Result<(), ServiceError>;

    async fn order_confirmation(&self, order_id: &str) -> Result<(), ServiceError>;
}

/// In-memory order service with simulated latency
pub struct SimulatedOrderService {
    email: Arc<dyn EmailService>,
    latency: Duration,
    stock: u32,
}

impl SimulatedOrderService {
    pub fn new(email: Arc<dyn EmailService>, latency: Duration) -> Self {
        Self {
            email,
            latency,
            stock: INITIAL_STOCK,
        }
    }

    /// Override the available stock
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    fn order(&self, order_id: &str) -> Order {
        Order::sample(order_id)
    }
}

#[async_trait]
impl OrderService for SimulatedOrderService {
    async fn update_stock(&self, product_id: &str, quantity: u32) -> Result<(), ServiceError> {
        info!(%product_id, quantity, "Updating stock for product ID: {}", product_id);

        if self.stock < quantity {
            return Err(ServiceError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: self.stock,
            });
        }

        tokio::time::sleep(self.latency).await;
        info!(%product_id, remaining = self.stock - quantity, "Finished updating stock");
        Ok(())
    }

    async fn update_stock_by_order_id(&self, order_id: &str) -> Result<(), ServiceError> {
        info!(%order_id, "Updating stock for order ID: {}", order_id);

        let order = self.order(order_id);
        for detail in &order.details {
            self.update_stock(&detail.product_id, detail.quantity).await?;
        }

        info!(%order_id, items = order.details.len(), "Finished updating stock for order");
        Ok(())
    }

    async fn order_confirmation(&self, order_id: &str) -> Result<(), ServiceError> {
        info!(%order_id, "Sending order confirmation email for order ID: {}", order_id);

        let order = self.order(order_id);
        let subject = format!("Order Confirmation: {}", order.order_id);
        self.email
            .send_email(&order.customer_email, &order.confirmation_message(), &subject)
            .await?;

        info!(%order_id, "Finished sending order confirmation email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String, String)>>);

    #[async_trait]
    impl EmailService for Outbox {
        async fn send_email(
            &self,
            email: &str,
            message: &str,
            subject: &str,
        ) -> Result<(), ServiceError> {
            self.0
                .lock()
                .push((email.into(), message.into(), subject.into()));
            Ok(())
        }
    }

    #[test]
    fn test_sample_order_totals() {
        let order = Order::sample("ORD-1");
        let detail = &order.details[0];

        assert_eq!(detail.product_id, "PROD1001");
        assert_eq!(detail.quantity, 2);
        assert_eq!(detail.subtotal_cents, 19_998);
        assert_eq!(detail.total_price_cents, 18_998);
        assert_eq!(format_amount(order.total_cents), "199.99");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(-1_050), "-10.50");
    }

    #[tokio::test]
    async fn test_insufficient_stock() {
        let service = SimulatedOrderService::new(Arc::new(Outbox::default()), Duration::ZERO)
            .with_stock(1);

        let err = service.update_stock_by_order_id("ORD-1").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InsufficientStock { requested: 2, available: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_confirmation_email_sent_to_customer() {
        let outbox = Arc::new(Outbox::default());
        let service = SimulatedOrderService::new(outbox.clone(), Duration::ZERO);

        service.order_confirmation("ORD-77").await.unwrap();

        let sent = outbox.0.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "agus_yulianto@example.com");
        assert!(sent[0].1.contains("Order ID: ORD-77"));
        assert!(sent[0].1.contains("Total Amount: 199.99 IDR"));
        assert_eq!(sent[0].2, "Order Confirmation: ORD-77");
    }
}
