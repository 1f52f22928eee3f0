//! Purchase checks, version lookup and installs.
//!
//! Install is `NotPurchased -> error`, `Purchased & installed -> done`,
//! `Purchased & not installed -> press -> poll until the button flips`.
//! Nothing is retried beyond the polling; a timeout ends the call.

use std::time::Duration;

use serde::Serialize;

use super::labels::{
    app_page_task, installation_task, version_task, APP_PAGE_BUTTON_PATTERN, INSTALLED_BUTTON_PATTERN,
    INSTALL_DONE_PATTERN, PURCHASED_BUTTON_PATTERN, VERSION_LABEL, VERSION_VALUE_PATTERN,
};
use super::navigation::button_matching;
use super::{AppStore, Session};
use crate::desktop::types::{Attribute, ElementHandle, ElementKind, Matcher, SearchSpec};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    /// Nothing pressed; the app was already on disk
    AlreadyInstalled,
    /// Install button pressed and completion observed
    Installed,
}

impl AppStore {
    /// Whether the signed-in account owns `name`
    ///
    /// Answered from the detail page when it is showing, otherwise from the
    /// Purchases list (which needs a signed-in user).
    pub async fn purchased(&self, name: &str) -> Result<bool> {
        let session = self.session().await?;
        self.purchased_in(&session, name).await
    }

    async fn purchased_in(&self, session: &Session, name: &str) -> Result<bool> {
        if let Some(page) = self.current_app_page(session, name).await? {
            return self
                .locator()
                .exists(&page, &button_matching(PURCHASED_BUTTON_PATTERN)?)
                .await;
        }
        Ok(self.purchase_link_in(session, name).await?.is_some())
    }

    /// Whether the detail page says "Open," (strictly installed)
    pub async fn app_installed(&self, name: &str) -> Result<bool> {
        let session = self.session().await?;
        self.app_installed_in(&session, name).await
    }

    async fn app_installed_in(&self, session: &Session, name: &str) -> Result<bool> {
        let page = self.app_page_in(session, name).await?;
        self.locator()
            .exists(&page, &button_matching(INSTALLED_BUTTON_PATTERN)?)
            .await
    }

    /// Version shown next to the "Version: " label on the detail page
    pub async fn latest_version(&self, name: &str) -> Result<String> {
        let session = self.session().await?;
        let page = self.app_page_in(&session, name).await?;

        let label_spec = SearchSpec::new(ElementKind::StaticText).value(VERSION_LABEL);
        let label = self
            .waiter
            .wait_for(&page, &label_spec, self.config.timeout)
            .await?
            .or_timeout(version_task(name))?;
        let container = self
            .provider
            .parent(&label)
            .await?
            .ok_or_else(|| AppError::Timeout(version_task(name)))?;

        let value_spec = SearchSpec::new(ElementKind::StaticText)
            .with(Attribute::Value, Matcher::pattern(VERSION_VALUE_PATTERN)?);
        let value = self
            .waiter
            .wait_for(&container, &value_spec, self.config.timeout)
            .await?
            .or_timeout(version_task(name))?;

        let version = self
            .locator()
            .read(&value, Attribute::Value)
            .await?
            .ok_or_else(|| AppError::Timeout(version_task(name)))?;
        Ok(version.trim().to_string())
    }

    /// Install `name`, waiting up to `timeout` for it to finish
    pub async fn install(&self, name: &str, timeout: Duration) -> Result<InstallOutcome> {
        let session = self.session().await?;

        if !self.purchased_in(&session, name).await? {
            return Err(AppError::AppNotPurchased(name.to_string()));
        }
        if self.app_installed_in(&session, name).await? {
            tracing::info!("'{}' is already installed", name);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let page = self.app_page_in(&session, name).await?;
        let button = self
            .locator()
            .find(&page, &button_matching(APP_PAGE_BUTTON_PATTERN)?)
            .await?
            .ok_or_else(|| AppError::Timeout(app_page_task(name)))?;
        tracing::info!("Installing '{}'", name);
        self.provider.press(&button).await?;

        self.wait_for_install_in(&session, name, timeout).await?;
        tracing::info!("'{}' installed", name);
        Ok(InstallOutcome::Installed)
    }

    /// `install` with the configured install budget
    pub async fn install_default(&self, name: &str) -> Result<InstallOutcome> {
        self.install(name, self.config.install_timeout).await
    }

    /// Wait until the detail page's button reads "Installed," or "Open,"
    pub async fn wait_for_install(&self, name: &str, timeout: Duration) -> Result<bool> {
        let session = self.session().await?;
        self.wait_for_install_in(&session, name, timeout).await
    }

    async fn wait_for_install_in(
        &self,
        session: &Session,
        name: &str,
        timeout: Duration,
    ) -> Result<bool> {
        let done = button_matching(INSTALL_DONE_PATTERN)?;
        let done = &done;
        self.waiter
            .until(timeout, move || self.install_done(session, name, done))
            .await?
            .or_timeout(installation_task(name))?;
        Ok(true)
    }

    /// Re-resolves the page on every poll; it can re-render mid-install
    async fn install_done(
        &self,
        session: &Session,
        name: &str,
        done: &SearchSpec,
    ) -> Result<Option<ElementHandle>> {
        match self.current_app_page(session, name).await? {
            Some(page) => self.locator().find(&page, done).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::testing::StoreFixture;

    #[tokio::test(start_paused = true)]
    async fn test_purchased_from_list() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Some App", "1.0");
        let store = fixture.store();

        assert!(store.purchased("Some App").await.unwrap());
        assert!(!store.purchased("Missing App").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchased_from_list_needs_sign_in() {
        let fixture = StoreFixture::new();
        let err = fixture.store().purchased("Some App").await.unwrap_err();
        assert!(matches!(err, AppError::UserNotSignedIn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_installed_label_is_not_strictly_installed() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .showing_page("Some App", "Installed, Some App");
        let store = fixture.store();

        assert!(store.purchased("Some App").await.unwrap());
        assert!(!store.app_installed("Some App").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_version() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Some App", "1.2.3");
        let store = fixture.store();

        assert_eq!(store.latest_version("Some App").await.unwrap(), "1.2.3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_install_stops_polling_once_done() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .showing_page("Some App", "Open, Some App");
        let store = fixture.store();

        let before = fixture.desktop.find_calls();
        assert!(store
            .wait_for_install("Some App", std::time::Duration::from_secs(60))
            .await
            .unwrap());
        let used = fixture.desktop.find_calls() - before;

        // session attach plus a single successful poll
        assert!(used <= 6, "polled {} times", used);
    }
}
