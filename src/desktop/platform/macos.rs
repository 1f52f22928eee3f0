#![cfg(target_os = "macos")]

use std::collections::VecDeque;

use accessibility::{AXAttribute, AXUIElement, AXUIElementAttributes};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_foundation::base::TCFType;
use core_foundation::string::CFString;
use super::registry::HandleRegistry;
use super::AccessibilityProvider;
use crate::desktop::types::{Attribute, ElementHandle, ElementKind, SearchSpec};

/// Upper bound on nodes visited by a single search
const MAX_VISITED: usize = 20_000;

/// AXUIElement wrapper that can live in the registry; equality is CFEqual
#[derive(Clone, PartialEq)]
struct AxElement(AXUIElement);

// SAFETY: AXUIElementRef is a CFType; the AX API may be called from any thread
// and the core drives one element at a time.
unsafe impl Send for AxElement {}
unsafe impl Sync for AxElement {}

/// macOS Accessibility API provider
///
/// Uses the macOS Accessibility API (AX) to search and drive UI elements.
/// Requires accessibility permissions to be granted to the controlling application.
pub struct MacOSAccessibility {
    /// Emptied whenever an application is (re)attached
    registry: HandleRegistry<AxElement>,
}

impl MacOSAccessibility {
    pub fn new() -> Result<Self> {
        if !check_accessibility_permissions()? {
            tracing::debug!("Accessibility permissions not granted; element lookups will come back empty");
        }

        Ok(Self {
            registry: HandleRegistry::new(),
        })
    }

    fn register(&self, element: AXUIElement) -> ElementHandle {
        self.registry.register(AxElement(element))
    }

    fn resolve(&self, handle: &ElementHandle) -> Option<AXUIElement> {
        self.registry.resolve(handle).map(|element| element.0)
    }

    fn resolve_or_err(&self, handle: &ElementHandle) -> Result<AXUIElement> {
        self.resolve(handle)
            .ok_or_else(|| anyhow!("Unknown element handle: {}", handle))
    }

    fn read(element: &AXUIElement, attribute: Attribute) -> Option<String> {
        let text = match attribute {
            Attribute::Title => element.title().ok().map(|s| s.to_string()),
            Attribute::Description => element.description().ok().map(|s| s.to_string()),
            Attribute::Value => element
                .value()
                .ok()
                .and_then(|value| value.downcast::<CFString>())
                .map(|s| s.to_string()),
        };
        text.filter(|s| !s.is_empty())
    }

    fn is_match(element: &AXUIElement, spec: &SearchSpec) -> bool {
        let Ok(role) = element.role() else {
            return false;
        };
        let subrole = element.subrole().ok().map(|s| s.to_string());
        let kind_matches = spec.kind.matches_role(&role.to_string(), subrole.as_deref());
        spec.matches(kind_matches, |attribute| Self::read(element, attribute))
    }

    /// Breadth-first search below `root` (the root itself is not a candidate)
    fn search(root: &AXUIElement, spec: &SearchSpec) -> Option<AXUIElement> {
        let mut queue: VecDeque<AXUIElement> = VecDeque::new();
        queue.push_back(root.clone());
        let mut visited = 0usize;

        while let Some(node) = queue.pop_front() {
            let Ok(children) = node.children() else {
                continue;
            };
            for child in children.iter() {
                let child: AXUIElement = (*child).clone();
                visited += 1;
                if Self::is_match(&child, spec) {
                    return Some(child);
                }
                if visited >= MAX_VISITED {
                    tracing::warn!("Search for {} stopped after {} nodes", spec, visited);
                    return None;
                }
                queue.push_back(child);
            }
        }
        None
    }

    fn child_titled(parent: &AXUIElement, kind: ElementKind, title: &str) -> Option<AXUIElement> {
        Self::search(parent, &SearchSpec::new(kind).title(title))
    }
}

#[async_trait]
impl AccessibilityProvider for MacOSAccessibility {
    async fn application(&self, pid: u32) -> Result<Option<ElementHandle>> {
        let app = AXUIElement::application(pid as i32);
        // A pid that is not (yet) an AX application has no role
        if app.role().is_err() {
            return Ok(None);
        }
        // Handles never outlive the session that attached them
        self.registry.clear();
        Ok(Some(self.register(app)))
    }

    async fn launch(&self, bundle_id: &str) -> Result<()> {
        let status = tokio::process::Command::new("open")
            .arg("-b")
            .arg(bundle_id)
            .status()
            .await
            .map_err(|e| anyhow!("Failed to launch {}: {}", bundle_id, e))?;
        if !status.success() {
            return Err(anyhow!("open -b {} exited with {}", bundle_id, status));
        }
        Ok(())
    }

    async fn find(
        &self,
        ancestor: &ElementHandle,
        spec: &SearchSpec,
    ) -> Result<Option<ElementHandle>> {
        // A stale ancestor is reported as absence, same as a missing element
        let Some(root) = self.resolve(ancestor) else {
            return Ok(None);
        };
        Ok(Self::search(&root, spec).map(|element| self.register(element)))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        attribute: Attribute,
    ) -> Result<Option<String>> {
        Ok(self
            .resolve(element)
            .and_then(|element| Self::read(&element, attribute)))
    }

    async fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        let Some(element) = self.resolve(element) else {
            return Ok(None);
        };
        Ok(element.parent().ok().map(|parent| self.register(parent)))
    }

    async fn press(&self, element: &ElementHandle) -> Result<()> {
        let element = self.resolve_or_err(element)?;
        element
            .perform_action(&CFString::from_static_string("AXPress"))
            .map_err(|e| anyhow!("AXPress failed: {:?}", e))
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let element = self.resolve_or_err(element)?;
        element
            .set_attribute(&AXAttribute::value(), CFString::new(value).as_CFType())
            .map_err(|e| anyhow!("Failed to set AXValue: {:?}", e))
    }

    async fn select_menu_item(&self, app: &ElementHandle, path: &[&str]) -> Result<()> {
        let app = self.resolve_or_err(app)?;
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| anyhow!("Empty menu path"))?;

        let mut current = Self::child_titled(&app, ElementKind::MenuBarItem, first)
            .ok_or_else(|| anyhow!("Menu bar item not found: {}", first))?;
        current
            .perform_action(&CFString::from_static_string("AXPress"))
            .map_err(|e| anyhow!("Failed to open menu {}: {:?}", first, e))?;

        for title in rest {
            current = Self::child_titled(&current, ElementKind::MenuItem, title)
                .ok_or_else(|| anyhow!("Menu item not found: {}", path.join(" > ")))?;
            current
                .perform_action(&CFString::from_static_string("AXPress"))
                .map_err(|e| anyhow!("Failed to select {}: {:?}", title, e))?;
        }
        Ok(())
    }
}

/// Check if accessibility permissions are granted
///
/// On macOS, applications need explicit user permission to use accessibility APIs.
/// The permission belongs to the controlling application (Terminal, sshd, ...),
/// not to this binary.
pub fn check_accessibility_permissions() -> Result<bool> {
    // SAFETY: AXIsProcessTrusted takes no arguments and only reads TCC state
    Ok(unsafe { accessibility_sys::AXIsProcessTrusted() })
}
