use serde::Serialize;
use tokio::time::Instant;

use super::labels::STORE_TASK;
use crate::config::StoreConfig;
use crate::desktop::platform::AccessibilityProvider;
use crate::desktop::process::ProcessProbe;
use crate::desktop::types::{ElementHandle, ElementKind, SearchSpec};
use crate::desktop::wait::{deadline_after, Waiter};
use crate::error::Result;

/// Live handle on a ready storefront window
///
/// If the process is killed externally the handles go stale; that shows up
/// as elements not being found, never as a separate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub bundle_id: String,
    pub pid: u32,
    pub app: ElementHandle,
    pub window: ElementHandle,
}

/// Attach to the storefront, launching it first when it is not running,
/// and wait until the window, web content and toolbar have all loaded.
pub async fn acquire(
    provider: &dyn AccessibilityProvider,
    probe: &dyn ProcessProbe,
    waiter: &Waiter,
    config: &StoreConfig,
) -> Result<Session> {
    let bundle_id = config.bundle_id.as_str();
    let deadline = deadline_after(config.timeout);

    if !probe.is_running(bundle_id).await? {
        tracing::info!("{} is not running, launching it", bundle_id);
        provider.launch(bundle_id).await?;
    }

    let (pid, app) = waiter
        .until(config.timeout, move || attach(provider, probe, bundle_id))
        .await?
        .or_timeout(STORE_TASK)?;

    let remaining = || deadline.saturating_duration_since(Instant::now());

    let window = waiter
        .wait_for(&app, &SearchSpec::new(ElementKind::StandardWindow), remaining())
        .await?
        .or_timeout(STORE_TASK)?;

    // Partial loads are common; all landmarks must be present
    for landmark in [ElementKind::WebArea, ElementKind::Toolbar] {
        waiter
            .wait_for(&window, &SearchSpec::new(landmark), remaining())
            .await?
            .or_timeout(STORE_TASK)?;
    }

    tracing::debug!("Attached to {} (pid {})", bundle_id, pid);
    Ok(Session {
        bundle_id: bundle_id.to_string(),
        pid,
        app,
        window,
    })
}

async fn attach(
    provider: &dyn AccessibilityProvider,
    probe: &dyn ProcessProbe,
    bundle_id: &str,
) -> Result<Option<(u32, ElementHandle)>> {
    let Some(pid) = probe.running_instances(bundle_id).await?.into_iter().next() else {
        return Ok(None);
    };
    Ok(provider.application(pid).await?.map(|app| (pid, app)))
}

/// Ask the storefront to quit. Checked through the process probe so it works
/// without accessibility access.
pub async fn terminate(probe: &dyn ProcessProbe, bundle_id: &str) -> Result<()> {
    if !probe.is_running(bundle_id).await? {
        tracing::debug!("{} is not running, nothing to quit", bundle_id);
        return Ok(());
    }
    tracing::info!("Quitting {}", bundle_id);
    probe.terminate(bundle_id).await?;
    Ok(())
}
