use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after state changes commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
        item_count: usize,
    },
    CatalogImported {
        inserted: usize,
        updated: usize,
        failed: usize,
    },
    ProductActivationChanged {
        product_id: Uuid,
        sku: String,
        active: bool,
    },
    SettingsUpdated {
        vat_rate: Decimal,
        min_order_amount: Option<Decimal>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::CatalogImported { .. } => "catalog_imported",
            Event::ProductActivationChanged { .. } => "product_activation_changed",
            Event::SettingsUpdated { .. } => "settings_updated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender and the receiving end for [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends without surfacing failures; the state change already committed.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Audit record written for every processed event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry<'a> {
    pub event: &'static str,
    pub recorded_at: DateTime<Utc>,
    pub payload: &'a Event,
}

/// Consumes the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let entry = AuditEntry {
            event: event.name(),
            recorded_at: Utc::now(),
            payload: &event,
        };
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "wholesale_api::audit", event = entry.event, "{}", json),
            Err(e) => warn!(event = entry.event, error = %e, "failed to serialise audit entry"),
        }
    }

    info!("Event processing loop stopped");
}
