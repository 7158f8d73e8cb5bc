use crate::{
    documents::{
        document_filename, render_order_document, render_order_email, render_order_table,
        table_filename, DOCUMENT_CONTENT_TYPE,
    },
    entities::settings,
    errors::ServiceError,
    notifications::{Attachment, Notification, Notifier},
    services::orders::OrderDetails,
    storage::FileStorage,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What the post-commit phase produced. Failures are warnings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub document_path: Option<String>,
    pub table_path: Option<String>,
    pub warnings: Vec<String>,
}

/// Renders and stores the order files, then notifies the business and buyer.
#[derive(Clone)]
pub struct OrderDispatcher {
    storage: FileStorage,
    notifier: Arc<dyn Notifier>,
    font: Option<Arc<Vec<u8>>>,
}

impl OrderDispatcher {
    pub fn new(storage: FileStorage, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            font: None,
        }
    }

    /// Embeds `font` (TrueType) in rendered order documents.
    pub fn with_font(mut self, font: Option<Arc<Vec<u8>>>) -> Self {
        self.font = font;
        self
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn render_document(
        &self,
        details: &OrderDetails,
        settings: &settings::Model,
    ) -> Result<Vec<u8>, ServiceError> {
        render_order_document(details, settings, self.font.as_deref().map(Vec::as_slice))
    }

    #[instrument(skip_all, fields(order_number = %details.order.order_number))]
    pub async fn dispatch(
        &self,
        details: &OrderDetails,
        settings: &settings::Model,
    ) -> DispatchOutcome {
        let order_number = &details.order.order_number;
        let mut outcome = DispatchOutcome::default();

        let document = match self.render_document(details, settings) {
            Ok(document) => {
                match self
                    .storage
                    .put(&document_filename(order_number), &document)
                    .await
                {
                    Ok(path) => outcome.document_path = Some(path),
                    Err(e) => {
                        warn!(error = %e, "Failed to store order document");
                        outcome.warnings.push("order document could not be saved".to_string());
                    }
                }
                Some(document)
            }
            Err(e) => {
                warn!(error = %e, "Failed to render order document");
                outcome
                    .warnings
                    .push("order document could not be generated".to_string());
                None
            }
        };

        match render_order_table(details) {
            Ok(table) => match self.storage.put(&table_filename(order_number), &table).await {
                Ok(path) => outcome.table_path = Some(path),
                Err(e) => {
                    warn!(error = %e, "Failed to store order export");
                    outcome.warnings.push("order export could not be saved".to_string());
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to render order export");
                outcome.warnings.push("order export could not be generated".to_string());
            }
        }

        let notification = Notification {
            to: vec![settings.business_email.clone()],
            cc: vec![details.order.email.clone()],
            subject: format!(
                "New order #{} - {}",
                order_number, details.order.retailer_name
            ),
            html_body: render_order_email(details, settings),
            attachments: document
                .map(|content| Attachment {
                    filename: document_filename(order_number),
                    content_type: DOCUMENT_CONTENT_TYPE.to_string(),
                    content,
                })
                .into_iter()
                .collect(),
        };

        match self.notifier.dispatch(&notification).await {
            Ok(()) => info!("Order notification sent"),
            Err(e) => {
                warn!(error = %e, "Order notification failed");
                outcome
                    .warnings
                    .push("order notification could not be sent; it may be delayed".to_string());
            }
        }

        outcome
    }
}
