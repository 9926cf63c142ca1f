use std::collections::HashMap;

use anyhow::Result;
use thiserror::Error;
use uuid::Uuid;

use super::database::Database;
use crate::config::{Config, ACCESS_KEY_KEY, DEVICE_ID_KEY, KEY_CLAIMS_KEY};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access key is not recognised")]
    InvalidKey,

    #[error("Access key is already in use on another device")]
    ClaimedElsewhere,
}

/// Per-run state that identifies this device and what it may do.
///
/// Built once at startup by [`SessionContext::init`] and handed to the
/// controller; nothing here lives in process-wide statics.
#[derive(Debug, Clone)]
pub struct SessionContext {
    db: Database,
    credential: Option<String>,
    device_id: String,
    allowed_keys: Vec<String>,
    access_key: Option<String>,
    /// access key -> device id that claimed it
    claims: HashMap<String, String>,
}

impl SessionContext {
    pub async fn init(db: Database, config: &Config) -> Result<Self> {
        let stored_id = match db.get(DEVICE_ID_KEY).await? {
            Some(json) => match serde_json::from_str::<String>(&json) {
                Ok(id) if !id.is_empty() => Some(id),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Replacing corrupt device identifier: {}", e);
                    None
                }
            },
            None => None,
        };
        let device_id = match stored_id {
            Some(id) => id,
            None => {
                let id = derive_device_id();
                db.set(DEVICE_ID_KEY, &serde_json::to_string(&id)?).await?;
                tracing::info!(device_id = %id, "Derived new device identifier");
                id
            }
        };

        let claims = match db.get(KEY_CLAIMS_KEY).await? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupt access key claims: {}", e);
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        let access_key = db
            .get(ACCESS_KEY_KEY)
            .await?
            .and_then(|json| serde_json::from_str::<String>(&json).ok());

        let mut ctx = Self {
            db,
            credential: config.api_key.clone(),
            device_id,
            allowed_keys: config.access_keys.clone(),
            access_key: None,
            claims,
        };

        // A remembered key only counts while it is still valid for this device.
        if let Some(key) = access_key {
            if ctx.check_claim(&key).is_ok() {
                ctx.access_key = Some(key);
            } else {
                tracing::warn!("Stored access key is no longer valid, clearing it");
                ctx.db.remove(ACCESS_KEY_KEY).await?;
            }
        }

        Ok(ctx)
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }

    pub fn gating_enabled(&self) -> bool {
        !self.allowed_keys.is_empty()
    }

    /// Whether sends are allowed: gating is off or a valid key is held.
    pub fn is_unlocked(&self) -> bool {
        !self.gating_enabled() || self.access_key.is_some()
    }

    fn check_claim(&self, key: &str) -> Result<(), AccessError> {
        if !self.allowed_keys.iter().any(|k| k == key) {
            return Err(AccessError::InvalidKey);
        }
        match self.claims.get(key) {
            Some(owner) if owner != &self.device_id => Err(AccessError::ClaimedElsewhere),
            _ => Ok(()),
        }
    }

    /// Validate `key` and record that this device uses it.
    pub async fn claim_access_key(&mut self, key: &str) -> Result<(), AccessError> {
        let key = key.trim();
        self.check_claim(key)?;

        self.claims.insert(key.to_string(), self.device_id.clone());
        self.access_key = Some(key.to_string());
        self.persist_access().await;
        Ok(())
    }

    /// Forget the held access key. Claims are kept so the key stays bound to
    /// this device.
    pub async fn teardown(&mut self) {
        self.access_key = None;
        if let Err(e) = self.db.remove(ACCESS_KEY_KEY).await {
            tracing::error!("Failed to clear access key: {}", e);
        }
    }

    async fn persist_access(&self) {
        if let Err(e) = self.write_access().await {
            tracing::error!("Failed to persist access key: {}", e);
        }
    }

    async fn write_access(&self) -> Result<()> {
        if let Some(key) = &self.access_key {
            self.db
                .set(ACCESS_KEY_KEY, &serde_json::to_string(key)?)
                .await?;
        }
        self.db
            .set(KEY_CLAIMS_KEY, &serde_json::to_string(&self.claims)?)
            .await
    }
}

fn derive_device_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "device".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..12])
}
