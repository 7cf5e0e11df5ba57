use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted after a ledger-mutating transaction commits.
/// Delivery is best-effort and never affects the transactional outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PurchaseReceived {
        purchase_id: i64,
        invoice_total: rust_decimal::Decimal,
    },
    PurchaseCancelled {
        purchase_id: i64,
    },
    DispatchCreated {
        dispatch_id: i64,
        code: String,
        total_quantity: i32,
    },
    AdjustmentApplied {
        adjustment_id: i64,
        kind: String,
    },
    AdjustmentReversed {
        adjustment_id: i64,
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

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!("event dropped ({:?}): {}", event, e);
        }
    }
}

/// Background consumer; currently logs each event. Webhooks or a message
/// queue would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out.
        sender
            .send_or_log(Event::PurchaseCancelled { purchase_id: 1 })
            .await;
    }
}
