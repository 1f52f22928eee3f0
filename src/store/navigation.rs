//! Idempotent "make sure we are on page X" operations.
//!
//! Location is never tracked; each operation looks at the UI first and only
//! navigates when it is not already where it needs to be.

use super::labels::{
    app_page_task, APP_PAGE_BUTTON_PATTERN, PURCHASES_LANDMARK, PURCHASES_MENU_ITEM,
    PURCHASES_TASK, SIGN_IN_BUTTON, SIGN_IN_MENU_ITEM, SIGN_IN_SHEET_TASK, STORE_MENU,
};
use super::{AppStore, Session};
use crate::desktop::types::{Attribute, ElementHandle, ElementKind, Matcher, SearchSpec};
use crate::error::{AppError, Result};

pub(crate) fn web_area() -> SearchSpec {
    SearchSpec::new(ElementKind::WebArea)
}

pub(crate) fn app_page(name: &str) -> SearchSpec {
    web_area().description(name)
}

pub(crate) fn purchases_table() -> SearchSpec {
    SearchSpec::new(ElementKind::Table).description(PURCHASES_LANDMARK)
}

pub(crate) fn sign_in_button() -> SearchSpec {
    SearchSpec::new(ElementKind::Button).title(SIGN_IN_BUTTON)
}

pub(crate) fn button_matching(pattern: &str) -> Result<SearchSpec> {
    Ok(SearchSpec::new(ElementKind::Button).with(Attribute::Description, Matcher::pattern(pattern)?))
}

impl AppStore {
    /// Web area of `name`'s detail page, if that page is showing
    pub(crate) async fn current_app_page(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Option<ElementHandle>> {
        self.locator().find(&session.window, &app_page(name)).await
    }

    /// Title of whatever page the main window shows
    pub async fn current_page(&self) -> Result<Option<String>> {
        let session = self.session().await?;
        self.locator()
            .find_attribute(&session.window, &web_area(), Attribute::Description)
            .await
    }

    /// Open `name`'s detail page through the Purchases list unless it is
    /// already showing. Fails with `AppNotPurchased` when the list has no row
    /// for it.
    pub async fn ensure_app_page(&self, name: &str) -> Result<Session> {
        let session = self.session().await?;
        self.app_page_in(&session, name).await?;
        Ok(session)
    }

    /// Returns the detail page's web area
    pub(crate) async fn app_page_in(&self, session: &Session, name: &str) -> Result<ElementHandle> {
        if let Some(page) = self.current_app_page(session, name).await? {
            tracing::debug!("Already on the '{}' app page", name);
            return Ok(page);
        }

        let link = self
            .purchase_link_in(session, name)
            .await?
            .ok_or_else(|| AppError::AppNotPurchased(name.to_string()))?;
        tracing::info!("Opening the '{}' app page", name);
        self.provider.press(&link).await?;

        let page = self
            .waiter
            .wait_for(&session.window, &app_page(name), self.config.timeout)
            .await?
            .or_timeout(app_page_task(name))?;
        self.waiter
            .wait_for(&page, &button_matching(APP_PAGE_BUTTON_PATTERN)?, self.config.timeout)
            .await?
            .or_timeout(app_page_task(name))?;
        Ok(page)
    }

    /// Link in `name`'s Purchases row, navigating to the list if needed
    pub(crate) async fn purchase_link_in(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Option<ElementHandle>> {
        let table = self.purchases_list_in(session).await?;
        let row_link = SearchSpec::new(ElementKind::Link).title(name);
        self.locator().find(&table, &row_link).await
    }

    /// Show the Purchases list; requires a signed-in user
    pub async fn ensure_purchases_list(&self) -> Result<Session> {
        let session = self.session().await?;
        self.purchases_list_in(&session).await?;
        Ok(session)
    }

    /// Returns the purchases table
    pub(crate) async fn purchases_list_in(&self, session: &Session) -> Result<ElementHandle> {
        if !self.signed_in_in(session).await? {
            return Err(AppError::UserNotSignedIn);
        }

        let table = purchases_table();
        if let Some(found) = self.locator().find(&session.window, &table).await? {
            tracing::debug!("Already on the Purchases list");
            return Ok(found);
        }

        tracing::info!("Selecting {} > {}", STORE_MENU, PURCHASES_MENU_ITEM);
        self.provider
            .select_menu_item(&session.app, &[STORE_MENU, PURCHASES_MENU_ITEM])
            .await?;
        self.waiter
            .wait_for(&session.window, &table, self.config.timeout)
            .await?
            .or_timeout(PURCHASES_TASK)
    }

    /// Open the sign-in sheet unless it is already up
    pub async fn ensure_sign_in_sheet(&self) -> Result<Session> {
        let session = self.session().await?;
        self.sign_in_sheet_in(&session).await?;
        Ok(session)
    }

    /// Returns the sheet's Sign In button
    pub(crate) async fn sign_in_sheet_in(&self, session: &Session) -> Result<ElementHandle> {
        if let Some(button) = self.locator().find(&session.window, &sign_in_button()).await? {
            tracing::debug!("Sign In sheet already open");
            return Ok(button);
        }

        tracing::info!("Selecting {} > {}", STORE_MENU, SIGN_IN_MENU_ITEM);
        self.provider
            .select_menu_item(&session.app, &[STORE_MENU, SIGN_IN_MENU_ITEM])
            .await?;
        self.waiter
            .wait_for(&session.window, &sign_in_button(), self.config.timeout)
            .await?
            .or_timeout(SIGN_IN_SHEET_TASK)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::testing::{RecordedAction, StoreFixture};

    #[tokio::test(start_paused = true)]
    async fn test_app_page_short_circuits_when_showing() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .installed("Some App", "1.2.3")
            .showing_app_page("Some App");
        let store = fixture.store();

        store.ensure_app_page("Some App").await.unwrap();

        assert!(fixture.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_page_navigates_through_purchases() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Some App", "1.2.3");
        let store = fixture.store();

        store.ensure_app_page("Some App").await.unwrap();

        assert_eq!(store.current_page().await.unwrap().as_deref(), Some("Some App"));
        let actions = fixture.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            RecordedAction::SelectMenu(vec!["Store".to_string(), "Purchases".to_string()])
        );
        assert!(matches!(actions[1], RecordedAction::Press(_)));

        // second call finds the page already there
        store.ensure_app_page("Some App").await.unwrap();
        assert_eq!(fixture.actions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_page_for_unpurchased_app() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Other App", "2.0");
        let store = fixture.store();

        let err = store.ensure_app_page("Some App").await.unwrap_err();
        assert!(matches!(err, AppError::AppNotPurchased(ref name) if name == "Some App"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_page_that_never_renders_times_out() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Some App", "1.0")
            .app_pages_never_load();
        let store = fixture.store();

        let err = store.ensure_app_page("Some App").await.unwrap_err();

        assert!(matches!(err, AppError::Timeout(ref task) if task == "'Some App' app page"));
        assert_eq!(fixture.pressed(), vec!["Some App".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchases_list_requires_sign_in() {
        let fixture = StoreFixture::new();
        let store = fixture.store();

        let err = store.ensure_purchases_list().await.unwrap_err();
        assert!(matches!(err, AppError::UserNotSignedIn));
        assert!(fixture.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchases_list_is_idempotent() {
        let fixture = StoreFixture::new().signed_in_as("someone@example.com");
        let store = fixture.store();

        store.ensure_purchases_list().await.unwrap();
        store.ensure_purchases_list().await.unwrap();

        assert_eq!(fixture.menu_selections(), vec![vec!["Store", "Purchases"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchases_list_timeout() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchases_never_load();
        let store = fixture.store();

        let err = store.ensure_purchases_list().await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(ref task) if task == "Purchases list"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_sheet_opens_once() {
        let fixture = StoreFixture::new();
        let store = fixture.store();

        store.ensure_sign_in_sheet().await.unwrap();
        store.ensure_sign_in_sheet().await.unwrap();

        assert_eq!(fixture.menu_selections(), vec![vec!["Store", "Sign In…"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_sheet_that_never_opens_times_out() {
        let fixture = StoreFixture::new().sign_in_sheet_never_opens();
        let store = fixture.store();

        let err = store.ensure_sign_in_sheet().await.unwrap_err();

        assert!(matches!(err, AppError::Timeout(ref task) if task == "Sign In window"));
        assert_eq!(fixture.menu_selections(), vec![vec!["Store", "Sign In…"]]);
    }
}
