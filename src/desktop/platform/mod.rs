use anyhow::Result;
use async_trait::async_trait;

use super::types::{Attribute, ElementHandle, SearchSpec};

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
mod registry;

/// Platform-specific accessibility provider trait
/// Abstracts the OS accessibility API behind the handful of capabilities the
/// storefront workflows need: search, attribute reads, press, set, menus.
#[async_trait]
pub trait AccessibilityProvider: Send + Sync {
    /// Resolve the application element for a running process
    async fn application(&self, pid: u32) -> Result<Option<ElementHandle>>;

    /// Launch (or bring forward) the application with this bundle identifier
    async fn launch(&self, bundle_id: &str) -> Result<()>;

    /// First descendant of `ancestor` matching `spec`, or `None`.
    /// Single-shot: never retries and never fails because nothing matched.
    async fn find(&self, ancestor: &ElementHandle, spec: &SearchSpec)
        -> Result<Option<ElementHandle>>;

    /// Read a textual attribute; `None` when unset or the element is gone
    async fn attribute(&self, element: &ElementHandle, attribute: Attribute)
        -> Result<Option<String>>;

    /// Parent of an element, if it still has one
    async fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>>;

    /// Perform the element's default action (AXPress)
    async fn press(&self, element: &ElementHandle) -> Result<()>;

    /// Assign the value of an editable element
    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()>;

    /// Select a menu item by its title path, e.g. `["Store", "Sign Out"]`
    async fn select_menu_item(&self, app: &ElementHandle, path: &[&str]) -> Result<()>;
}

/// Create the platform-specific accessibility provider
pub fn create_provider() -> Result<Box<dyn AccessibilityProvider>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacOSAccessibility::new()?))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!(
            "Unsupported platform for accessibility: the App Store only exists on macOS"
        ))
    }
}

/// Check if accessibility features are available and enabled
pub fn check_accessibility_permissions() -> Result<bool> {
    #[cfg(target_os = "macos")]
    {
        // macOS requires explicit accessibility permissions
        macos::check_accessibility_permissions()
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(false)
    }
}
