//! Sign-in state, sign in and sign out.
//!
//! Credentials only ever go into the sheet's text fields. Nothing here logs
//! or keeps them.

use super::labels::{
    account_from_title, ACCOUNT_ITEM_PATTERN, APPLE_ID_FIELD, PASSWORD_FIELD, SIGN_IN_SHEET_TASK,
    SIGN_IN_TASK, SIGN_OUT_MENU_ITEM, STORE_MENU,
};
use super::{AppStore, Session};
use crate::desktop::types::{Attribute, ElementHandle, ElementKind, Matcher, SearchSpec};
use crate::error::{AppError, Result};

fn store_menu() -> SearchSpec {
    SearchSpec::new(ElementKind::MenuBarItem).title(STORE_MENU)
}

fn sign_out_item() -> SearchSpec {
    SearchSpec::new(ElementKind::MenuItem).title(SIGN_OUT_MENU_ITEM)
}

impl AppStore {
    async fn store_menu_in(&self, session: &Session) -> Result<Option<ElementHandle>> {
        self.locator().find(&session.app, &store_menu()).await
    }

    /// True iff the Store menu offers "Sign Out". Single look, no waiting.
    pub async fn signed_in(&self) -> Result<bool> {
        let session = self.session().await?;
        self.signed_in_in(&session).await
    }

    pub(crate) async fn signed_in_in(&self, session: &Session) -> Result<bool> {
        match self.store_menu_in(session).await? {
            Some(menu) => self.locator().exists(&menu, &sign_out_item()).await,
            None => Ok(false),
        }
    }

    /// Apple ID of the signed-in account, read from "View My Account (...)"
    pub async fn current_user(&self) -> Result<Option<String>> {
        let session = self.session().await?;
        self.current_user_in(&session).await
    }

    pub(crate) async fn current_user_in(&self, session: &Session) -> Result<Option<String>> {
        if !self.signed_in_in(session).await? {
            return Ok(None);
        }
        let Some(menu) = self.store_menu_in(session).await? else {
            return Ok(None);
        };
        let account_item = SearchSpec::new(ElementKind::MenuItem)
            .with(Attribute::Title, Matcher::pattern(ACCOUNT_ITEM_PATTERN)?);
        let title = self
            .locator()
            .find_attribute(&menu, &account_item, Attribute::Title)
            .await?;
        Ok(title.as_deref().and_then(account_from_title))
    }

    /// Sign out if anyone is signed in. Does not wait for the menu to update.
    pub async fn sign_out(&self) -> Result<()> {
        let session = self.session().await?;
        self.sign_out_in(&session).await
    }

    async fn sign_out_in(&self, session: &Session) -> Result<()> {
        if !self.signed_in_in(session).await? {
            tracing::debug!("Nobody is signed in");
            return Ok(());
        }
        tracing::info!("Selecting {} > {}", STORE_MENU, SIGN_OUT_MENU_ITEM);
        self.provider
            .select_menu_item(&session.app, &[STORE_MENU, SIGN_OUT_MENU_ITEM])
            .await?;
        Ok(())
    }

    /// Sign in as `username`, replacing any other signed-in account.
    /// A no-op when `username` is already signed in.
    ///
    /// Empty credentials are rejected before the storefront is touched; an
    /// empty account can never be the signed-in one.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::CredentialsIncomplete);
        }

        let session = self.session().await?;
        if self.current_user_in(&session).await?.as_deref() == Some(username) {
            tracing::debug!("Requested account is already signed in");
            return Ok(());
        }

        self.sign_out_in(&session).await?;
        let button = self.sign_in_sheet_in(&session).await?;

        let apple_id = SearchSpec::new(ElementKind::TextField).description(APPLE_ID_FIELD);
        let field = self
            .waiter
            .wait_for(&session.window, &apple_id, self.config.timeout)
            .await?
            .or_timeout(SIGN_IN_SHEET_TASK)?;
        self.provider.set_value(&field, username).await?;

        let password_spec = SearchSpec::new(ElementKind::SecureTextField).description(PASSWORD_FIELD);
        let field = self
            .waiter
            .wait_for(&session.window, &password_spec, self.config.timeout)
            .await?
            .or_timeout(SIGN_IN_SHEET_TASK)?;
        self.provider.set_value(&field, password).await?;

        tracing::info!("Submitting the Sign In sheet");
        self.provider.press(&button).await?;

        let menu = self
            .waiter
            .wait_for(&session.app, &store_menu(), self.config.timeout)
            .await?
            .or_timeout(SIGN_IN_TASK)?;
        self.waiter
            .wait_for(&menu, &sign_out_item(), self.config.timeout)
            .await?
            .or_timeout(SIGN_IN_TASK)?;

        tracing::info!("Signed in");
        Ok(())
    }
}
