//! In-memory store used by tests and local development.
//!
//! Mirrors the semantics of the Postgres store, including the single-statement
//! guarantees: pending/active exclusivity on enrollment restart and the
//! compare-and-promote guard.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    NewTrustedDevice, RegisterDeviceOutcome, SecondFactorProfile, StoreError, TwoFactorStore,
};

#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<Uuid, SecondFactorProfile>>,
    devices: RwLock<HashMap<(Uuid, String), super::TrustedDevice>>,
    failing: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a backend error, to exercise the
    /// fail-closed paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store set to fail".to_string()));
        }
        Ok(())
    }

    /// Snapshot a profile row for assertions.
    pub async fn profile(&self, user_id: Uuid) -> Option<SecondFactorProfile> {
        self.profiles.read().await.get(&user_id).cloned()
    }

    /// Number of device rows held for a user.
    pub async fn device_count(&self, user_id: Uuid) -> usize {
        self.devices
            .read()
            .await
            .keys()
            .filter(|(id, _)| *id == user_id)
            .count()
    }
}

#[async_trait]
impl TwoFactorStore for MemoryStore {
    async fn create_profile(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.check_failing()?;
        let mut profiles = self.profiles.write().await;
        profiles.entry(user_id).or_insert_with(|| SecondFactorProfile {
            user_id,
            email: email.to_string(),
            name: name.to_string(),
            two_factor_enabled: false,
            totp_secret: None,
            pending_totp_secret: None,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn find_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SecondFactorProfile>, StoreError> {
        self.check_failing()?;
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn set_pending_secret(
        &self,
        user_id: Uuid,
        email: &str,
        secret: &str,
    ) -> Result<(), StoreError> {
        self.check_failing()?;
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id).or_insert_with(|| SecondFactorProfile {
            user_id,
            email: email.to_string(),
            name: String::new(),
            two_factor_enabled: false,
            totp_secret: None,
            pending_totp_secret: None,
            created_at: Utc::now(),
        });
        profile.pending_totp_secret = Some(secret.to_string());
        profile.totp_secret = None;
        profile.two_factor_enabled = false;
        Ok(())
    }

    async fn promote_pending_secret(
        &self,
        user_id: Uuid,
        expected_secret: &str,
    ) -> Result<bool, StoreError> {
        self.check_failing()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(&user_id) else {
            return Ok(false);
        };
        if profile.pending_totp_secret.as_deref() != Some(expected_secret) {
            return Ok(false);
        }
        profile.totp_secret = profile.pending_totp_secret.take();
        profile.two_factor_enabled = true;
        Ok(true)
    }

    async fn clear_second_factor(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.check_failing()?;
        let mut profiles = self.profiles.write().await;
        if let Some(profile) = profiles.get_mut(&user_id) {
            profile.totp_secret = None;
            profile.pending_totp_secret = None;
            profile.two_factor_enabled = false;
        }
        Ok(())
    }

    async fn register_device(
        &self,
        user_id: Uuid,
        device: NewTrustedDevice<'_>,
    ) -> Result<RegisterDeviceOutcome, StoreError> {
        self.check_failing()?;
        let mut devices = self.devices.write().await;
        let key = (user_id, device.device_id.to_string());
        if devices.contains_key(&key) {
            return Ok(RegisterDeviceOutcome::AlreadyRegistered);
        }
        devices.insert(
            key,
            super::TrustedDevice {
                user_id,
                device_id: device.device_id.to_string(),
                device_model: device.device_model.to_string(),
                device_platform: device.device_platform.to_string(),
                registered_at: Utc::now(),
            },
        );
        Ok(RegisterDeviceOutcome::Registered)
    }

    async fn revoke_device(&self, user_id: Uuid, device_id: &str) -> Result<(), StoreError> {
        self.check_failing()?;
        self.devices
            .write()
            .await
            .remove(&(user_id, device_id.to_string()));
        Ok(())
    }

    async fn device_registered(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<bool, StoreError> {
        self.check_failing()?;
        Ok(self
            .devices
            .read()
            .await
            .contains_key(&(user_id, device_id.to_string())))
    }
}
