use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the order/payment lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A new order was persisted from a captured payment
    OrderCreated(Uuid),
    /// A payment capture was confirmed (created or already-existing order)
    PaymentCaptured {
        order_id: Uuid,
        payment_ref: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    RefundRequested(Uuid),
    RefundProcessed {
        order_id: Uuid,
        refund_ref: String,
    },
    AddressDefaultChanged {
        owner_id: String,
        address_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains lifecycle events. Consumers beyond structured logging (mail,
/// analytics) would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::PaymentCaptured {
                order_id,
                payment_ref,
            } => {
                info!(order_id = %order_id, payment_ref = %payment_ref, "Payment captured");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status changed"
                );
            }
            Event::RefundRequested(order_id) => {
                info!(order_id = %order_id, "Refund requested");
            }
            Event::RefundProcessed {
                order_id,
                refund_ref,
            } => {
                info!(order_id = %order_id, refund_ref = %refund_ref, "Refund processed");
            }
            Event::AddressDefaultChanged {
                owner_id,
                address_id,
            } => {
                info!(owner_id = %owner_id, address_id = %address_id, "Default address changed");
            }
        }
    }
}
