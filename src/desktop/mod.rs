//! Desktop automation module
//!
//! Native accessibility access reduced to what storefront workflows need.
//!
//! ## Architecture
//!
//! - `AccessibilityProvider` - Platform abstraction over the AX API
//! - `Locator` - Single-shot element lookup relative to an ancestor
//! - `Waiter` - Bounded polling on top of the locator
//! - `ProcessProbe` - Running instances and termination by bundle identifier
//!
//! ## Supported Platforms
//!
//! - **macOS**: Accessibility API (AX)
//!
//! Everywhere else `create_provider` fails; the process probe still answers.

pub mod locator;
pub mod platform;
pub mod process;
pub mod types;
pub mod wait;

// Re-export main types
pub use locator::Locator;
pub use platform::{check_accessibility_permissions, create_provider, AccessibilityProvider};
pub use process::{controlling_application, ProcessProbe, SystemProcessProbe};
pub use types::{Attribute, ElementHandle, ElementId, ElementKind, Matcher, SearchSpec};
pub use wait::{WaitOutcome, Waiter};
