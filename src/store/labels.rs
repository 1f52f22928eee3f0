//! Titles, descriptions and patterns the storefront UI exposes.

/// Menu bar item holding account and purchase actions
pub const STORE_MENU: &str = "Store";
pub const SIGN_IN_MENU_ITEM: &str = "Sign In…";
pub const SIGN_OUT_MENU_ITEM: &str = "Sign Out";
pub const PURCHASES_MENU_ITEM: &str = "Purchases";

/// Account item title is `View My Account (<apple id>)`
pub const ACCOUNT_ITEM_PREFIX: &str = "View My Account (";
pub const ACCOUNT_ITEM_PATTERN: &str = r"^View My Account \(";

/// Description of the purchases table, also the web area title of that page
pub const PURCHASES_LANDMARK: &str = "Purchases";

pub const SIGN_IN_BUTTON: &str = "Sign In";
pub const APPLE_ID_FIELD: &str = "Apple ID";
pub const PASSWORD_FIELD: &str = "Password";

/// Detail-page action button once the page has rendered
pub const APP_PAGE_BUTTON_PATTERN: &str = "^(Install,|Download,|Installed,|Open,)";
/// Any of these means the current account owns the app
pub const PURCHASED_BUTTON_PATTERN: &str = "^(Open,|Install,|Installed,|Download,)";
/// Strict "already on disk" signal checked before pressing anything
pub const INSTALLED_BUTTON_PATTERN: &str = "^Open,";
/// Completion label differs by OS version
pub const INSTALL_DONE_PATTERN: &str = "^(Installed,|Open,)";

pub const VERSION_LABEL: &str = "Version: ";
pub const VERSION_VALUE_PATTERN: &str = r"^[0-9]";

/// Task names used in timeout errors
pub const STORE_TASK: &str = "App Store";
pub const PURCHASES_TASK: &str = "Purchases list";
pub const SIGN_IN_SHEET_TASK: &str = "Sign In window";
pub const SIGN_IN_TASK: &str = "sign in";

pub fn app_page_task(name: &str) -> String {
    format!("'{}' app page", name)
}

pub fn installation_task(name: &str) -> String {
    format!("'{}' installation", name)
}

pub fn version_task(name: &str) -> String {
    format!("'{}' version", name)
}

/// Extract the Apple ID from the account menu item title
pub fn account_from_title(title: &str) -> Option<String> {
    let rest = title.strip_prefix(ACCOUNT_ITEM_PREFIX)?;
    let end = rest.rfind(')')?;
    let account = rest[..end].trim();
    if account.is_empty() {
        None
    } else {
        Some(account.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_account_from_title() {
        assert_eq!(
            account_from_title("View My Account (someone@example.com)").as_deref(),
            Some("someone@example.com")
        );
        assert_eq!(account_from_title("View My Account ()"), None);
        assert_eq!(account_from_title("View My Account"), None);
        assert_eq!(account_from_title("Sign Out"), None);
    }

    #[test]
    fn test_installed_is_stricter_than_done() {
        let installed = Regex::new(INSTALLED_BUTTON_PATTERN).unwrap();
        let done = Regex::new(INSTALL_DONE_PATTERN).unwrap();

        assert!(installed.is_match("Open, Some App"));
        assert!(!installed.is_match("Installed, Some App"));
        assert!(done.is_match("Installed, Some App"));
        assert!(done.is_match("Open, Some App"));
        assert!(!done.is_match("Install, Some App"));
    }

    #[test]
    fn test_patterns_compile() {
        for pattern in [
            ACCOUNT_ITEM_PATTERN,
            APP_PAGE_BUTTON_PATTERN,
            PURCHASED_BUTTON_PATTERN,
            INSTALLED_BUTTON_PATTERN,
            INSTALL_DONE_PATTERN,
            VERSION_VALUE_PATTERN,
        ] {
            assert!(Regex::new(pattern).is_ok(), "{}", pattern);
        }
    }
}
