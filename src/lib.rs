//! Drives the Mac App Store through its accessibility tree.
//!
//! `store::AppStore` is the entry point; `desktop` holds the accessibility
//! plumbing it is built on and `testing` an in-memory storefront for tests.

pub mod config;
pub mod desktop;
pub mod error;
pub mod store;
pub mod testing;

pub use config::StoreConfig;
pub use error::{AppError, Result};
pub use store::{AppStore, InstallOutcome, Session};
