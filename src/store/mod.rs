//! App Store workflows
//!
//! `AppStore` is the caller-facing surface. Every operation re-derives where
//! the UI currently is by querying it, so each one can be re-run safely after
//! a failure. One `AppStore` must only be driven by one caller at a time.
//!
//! ```rust,ignore
//! use storefront_pilot::{config::StoreConfig, store::AppStore};
//!
//! let store = AppStore::from_platform(StoreConfig::from_env())?;
//! store.sign_in("user@example.com", &password).await?;
//! store.install("Xcode", Duration::from_secs(3600)).await?;
//! ```

pub mod auth;
pub mod labels;
pub mod navigation;
pub mod purchase;
pub mod session;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::desktop::locator::Locator;
use crate::desktop::platform::{check_accessibility_permissions, create_provider, AccessibilityProvider};
use crate::desktop::process::{controlling_application, ProcessProbe, SystemProcessProbe};
use crate::desktop::wait::Waiter;
use crate::error::Result;

pub use purchase::InstallOutcome;
pub use session::Session;

pub struct AppStore {
    provider: Arc<dyn AccessibilityProvider>,
    probe: Arc<dyn ProcessProbe>,
    waiter: Waiter,
    config: StoreConfig,
}

impl AppStore {
    pub fn new(
        provider: Arc<dyn AccessibilityProvider>,
        probe: Arc<dyn ProcessProbe>,
        config: StoreConfig,
    ) -> Self {
        let waiter = Waiter::new(Locator::new(provider.clone()), config.poll_interval);
        Self {
            provider,
            probe,
            waiter,
            config,
        }
    }

    /// Wire up the native accessibility provider and process probe
    pub fn from_platform(config: StoreConfig) -> Result<Self> {
        if !check_accessibility_permissions()? {
            tracing::warn!(
                "Accessibility access is not granted; allow \"{}\" under Privacy & Security > Accessibility",
                controlling_application()
            );
        }
        let provider: Arc<dyn AccessibilityProvider> = Arc::from(create_provider()?);
        Ok(Self::new(provider, Arc::new(SystemProcessProbe::new()), config))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn locator(&self) -> &Locator {
        self.waiter.locator()
    }

    /// Whether the storefront process is running (no accessibility needed)
    pub async fn running(&self) -> Result<bool> {
        Ok(self.probe.is_running(&self.config.bundle_id).await?)
    }

    /// Quit the storefront; a no-op when it is not running
    pub async fn quit(&self) -> Result<()> {
        session::terminate(self.probe.as_ref(), &self.config.bundle_id).await
    }

    /// Attach to (launching if needed) a ready storefront window
    pub async fn session(&self) -> Result<Session> {
        session::acquire(
            self.provider.as_ref(),
            self.probe.as_ref(),
            &self.waiter,
            &self.config,
        )
        .await
    }
}
