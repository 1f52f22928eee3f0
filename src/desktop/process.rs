//! Process-level probes that do not go through the accessibility tree.
//!
//! Usable before accessibility access has been granted: running-instance
//! lookup by bundle identifier, termination, and resolving which
//! application ultimately launched us.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

/// Reported when the controlling application cannot be resolved
pub const UNKNOWN_CONTROLLER: &str = "Terminal";

/// Process table queries keyed by bundle identifier
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Pids of running instances of the bundle
    async fn running_instances(&self, bundle_id: &str) -> Result<Vec<u32>>;

    /// Ask every running instance to exit
    async fn terminate(&self, bundle_id: &str) -> Result<()>;

    async fn is_running(&self, bundle_id: &str) -> Result<bool> {
        Ok(!self.running_instances(bundle_id).await?.is_empty())
    }
}

/// `ProcessProbe` backed by System Events (bundle lookup) and sysinfo (signals)
pub struct SystemProcessProbe {
    sys: Mutex<System>,
}

impl SystemProcessProbe {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn running_instances(&self, bundle_id: &str) -> Result<Vec<u32>> {
        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "tell application \"System Events\" to get unix id of every process whose bundle identifier is \"{}\"",
                bundle_id.replace('"', "")
            );
            let output = tokio::process::Command::new("osascript")
                .arg("-e")
                .arg(script)
                .output()
                .await
                .map_err(|e| anyhow!("Failed to run osascript: {}", e))?;

            if !output.status.success() {
                return Err(anyhow!(
                    "System Events lookup for {} failed: {}",
                    bundle_id,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
            Ok(parse_pid_list(&String::from_utf8_lossy(&output.stdout)))
        }

        #[cfg(not(target_os = "macos"))]
        {
            tracing::debug!("No bundle lookup on this platform; {} is not running", bundle_id);
            Ok(Vec::new())
        }
    }

    async fn terminate(&self, bundle_id: &str) -> Result<()> {
        let pids = self.running_instances(bundle_id).await?;
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| anyhow!("Process table lock poisoned: {}", e))?;
        sys.refresh_processes(ProcessesToUpdate::All, true);

        for pid in pids {
            let Some(process) = sys.process(Pid::from_u32(pid)) else {
                continue;
            };
            let sent = process.kill_with(Signal::Term).unwrap_or_else(|| process.kill());
            tracing::info!("Sent terminate to {} (pid {}): {}", bundle_id, pid, sent);
        }
        Ok(())
    }
}

/// Parse System Events output such as `"412, 977"` into pids
pub fn parse_pid_list(output: &str) -> Vec<u32> {
    output
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .collect()
}

/// Walk parents from `start` to the ancestor whose parent is init (pid 1)
/// and return that ancestor's name. `lookup` yields `(parent_pid, name)`.
pub fn nearest_init_child<F>(start: u32, mut lookup: F) -> Option<String>
where
    F: FnMut(u32) -> Option<(Option<u32>, String)>,
{
    let mut pid = start;
    // Bounded walk; a cycle in a broken process table must not hang us
    for _ in 0..64 {
        let (parent, name) = lookup(pid)?;
        match parent {
            Some(1) => return Some(name),
            Some(parent) if parent != pid && parent != 0 => pid = parent,
            _ => return None,
        }
    }
    None
}

/// Name of the application that owns this process tree (Terminal, iTerm2,
/// sshd, ...). This is the app that needs accessibility access.
pub fn controlling_application() -> String {
    let Ok(current) = sysinfo::get_current_pid() else {
        return UNKNOWN_CONTROLLER.to_string();
    };
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    nearest_init_child(current.as_u32(), |pid| {
        let process = sys.process(Pid::from_u32(pid))?;
        Some((
            process.parent().map(|p| p.as_u32()),
            process.name().to_string_lossy().to_string(),
        ))
    })
    .unwrap_or_else(|| UNKNOWN_CONTROLLER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn table() -> HashMap<u32, (Option<u32>, String)> {
        HashMap::from([
            (900, (Some(850), "storefront-pilot".to_string())),
            (850, (Some(700), "zsh".to_string())),
            (700, (Some(1), "iTerm2".to_string())),
            (1, (Some(0), "launchd".to_string())),
        ])
    }

    #[test]
    fn test_parse_pid_list() {
        assert_eq!(parse_pid_list("412, 977\n"), vec![412, 977]);
        assert_eq!(parse_pid_list("412"), vec![412]);
        assert!(parse_pid_list("").is_empty());
        assert!(parse_pid_list("\n").is_empty());
    }

    #[test]
    fn test_nearest_init_child_walks_to_launchd_child() {
        let table = table();
        let name = nearest_init_child(900, |pid| table.get(&pid).cloned());
        assert_eq!(name.as_deref(), Some("iTerm2"));
    }

    #[test]
    fn test_nearest_init_child_missing_entry() {
        let mut table = table();
        table.remove(&850);
        assert_eq!(nearest_init_child(900, |pid| table.get(&pid).cloned()), None);
    }

    #[test]
    fn test_nearest_init_child_rejects_cycles() {
        let table: HashMap<u32, (Option<u32>, String)> = HashMap::from([
            (10, (Some(11), "a".to_string())),
            (11, (Some(10), "b".to_string())),
        ]);
        assert_eq!(nearest_init_child(10, |pid| table.get(&pid).cloned()), None);
    }

    #[test]
    fn test_controlling_application_never_empty() {
        assert!(!controlling_application().is_empty());
    }
}
