use crate::{
    db::DbPool,
    entities::settings::{self, Entity as SettingsEntity, SETTINGS_KEY},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

/// Values used to create the settings row the first time it is read.
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub vat_rate: Decimal,
    pub business_email: String,
}

/// Partial update. Absent fields are left alone; an explicit `null` clears
/// the nullable ones.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    #[validate(custom = "validate_rate")]
    #[schema(value_type = Option<String>, example = "0.17")]
    pub vat_rate: Option<Decimal>,

    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, example = "1000")]
    pub min_order_amount: Option<Option<Decimal>>,

    #[validate(email(message = "invalid email address"))]
    pub business_email: Option<String>,

    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub logo_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub terms_html: Option<Option<String>>,
}

fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if rate.is_sign_negative() || *rate > Decimal::ONE {
        let mut err = ValidationError::new("vat_rate");
        err.message = Some("must be between 0 and 1".into());
        return Err(err);
    }
    Ok(())
}

impl SettingsPatch {
    fn check(&self) -> Result<(), ServiceError> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if let Some(Some(min)) = self.min_order_amount {
            if min.is_sign_negative() {
                let mut err = ValidationError::new("min_order_amount");
                err.message = Some("must not be negative".into());
                errors.add("min_order_amount", err);
            }
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vat_rate.is_none()
            && self.min_order_amount.is_none()
            && self.business_email.is_none()
            && self.logo_url.is_none()
            && self.terms_html.is_none()
    }
}

/// Store-wide settings kept in a single row.
#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    defaults: SettingsDefaults,
}

impl SettingsService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        defaults: SettingsDefaults,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            defaults,
        }
    }

    /// Returns the settings, creating the row from defaults on first access.
    #[instrument(skip(self))]
    pub async fn get_settings(&self) -> Result<settings::Model, ServiceError> {
        let db = &*self.db_pool;

        if let Some(existing) = SettingsEntity::find_by_id(SETTINGS_KEY.to_string())
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load settings");
                ServiceError::DatabaseError(e)
            })?
        {
            return Ok(existing);
        }

        let row = settings::ActiveModel {
            id: Set(SETTINGS_KEY.to_string()),
            vat_rate: Set(self.defaults.vat_rate),
            min_order_amount: Set(None),
            business_email: Set(self.defaults.business_email.clone()),
            logo_url: Set(None),
            terms_html: Set(None),
            ..Default::default()
        };

        match row.insert(db).await {
            Ok(created) => {
                info!(vat_rate = %created.vat_rate, "Created default settings");
                Ok(created)
            }
            Err(insert_err) => {
                // Another request may have created the row first.
                warn!(error = %insert_err, "Settings insert failed, re-reading");
                SettingsEntity::find_by_id(SETTINGS_KEY.to_string())
                    .one(db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or(ServiceError::DatabaseError(insert_err))
            }
        }
    }

    /// Applies a partial update.
    #[instrument(skip(self, patch))]
    pub async fn update_settings(
        &self,
        patch: SettingsPatch,
    ) -> Result<settings::Model, ServiceError> {
        patch.check()?;

        let current = self.get_settings().await?;
        if patch.is_empty() {
            return Ok(current);
        }

        let mut active = current.into_active_model();
        if let Some(rate) = patch.vat_rate {
            active.vat_rate = Set(rate);
        }
        if let Some(min) = patch.min_order_amount {
            active.min_order_amount = Set(min);
        }
        if let Some(email) = patch.business_email {
            active.business_email = Set(email.trim().to_string());
        }
        if let Some(logo) = patch.logo_url {
            active.logo_url = Set(logo);
        }
        if let Some(terms) = patch.terms_html {
            active.terms_html = Set(terms);
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to update settings");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            vat_rate = %updated.vat_rate,
            min_order_amount = ?updated.min_order_amount,
            "Settings updated"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SettingsUpdated {
                    vat_rate: updated.vat_rate,
                    min_order_amount: updated.min_order_amount,
                })
                .await;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: SettingsPatch = serde_json::from_str(r#"{"vat_rate": "0.18"}"#).unwrap();
        assert_eq!(absent.vat_rate, Some(dec!(0.18)));
        assert_eq!(absent.min_order_amount, None);

        let cleared: SettingsPatch = serde_json::from_str(r#"{"min_order_amount": null}"#).unwrap();
        assert_eq!(cleared.min_order_amount, Some(None));

        let set: SettingsPatch = serde_json::from_str(r#"{"min_order_amount": 500}"#).unwrap();
        assert_eq!(set.min_order_amount, Some(Some(dec!(500))));
    }

    #[test]
    fn patch_rejects_out_of_range_values() {
        let patch = SettingsPatch {
            vat_rate: Some(dec!(1.2)),
            min_order_amount: Some(Some(dec!(-1))),
            business_email: Some("not-an-email".into()),
            ..Default::default()
        };
        match patch.check() {
            Err(ServiceError::ValidationError(msg)) => {
                assert!(msg.contains("vat_rate"));
                assert!(msg.contains("min_order_amount"));
                assert!(msg.contains("business_email"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"currency": "ILS"}"#).is_err());
    }
}
