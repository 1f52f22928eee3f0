//! Testing infrastructure.
//!
//! In-memory stand-ins for the accessibility provider and the process probe,
//! so workflows can be driven without a real storefront:
//! - [`FakeDesktop`]: an accessibility tree with scripted reactions to presses,
//!   menu selections and launches, plus changes that land after N lookups
//! - [`FakeProcesses`]: a process table keyed by bundle identifier
//! - [`StoreFixture`]: both of the above pre-built to look like the App Store
//!
//! # Example
//!
//! ```ignore
//! use storefront_pilot::testing::StoreFixture;
//!
//! #[tokio::test(start_paused = true)]
//! async fn installs() {
//!     let fixture = StoreFixture::new()
//!         .signed_in_as("someone@example.com")
//!         .purchased("Some App", "1.0");
//!     fixture.store().install_default("Some App").await.unwrap();
//!     assert!(fixture.is_installed("Some App"));
//! }
//! ```

mod fixture;

pub use fixture::{StoreFixture, FIXTURE_PID};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::desktop::platform::AccessibilityProvider;
use crate::desktop::process::ProcessProbe;
use crate::desktop::types::{Attribute, ElementHandle, ElementId, ElementKind, SearchSpec};

/// Scripted change applied to the tree
pub type Reaction = Arc<dyn Fn(&mut FakeTree) + Send + Sync>;

/// Poisoning only means another test thread panicked; keep going with the data
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Attributes of a fake element
#[derive(Debug, Clone)]
pub struct FakeNode {
    pub kind: ElementKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
}

impl FakeNode {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            value: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn get(&self, attribute: Attribute) -> Option<String> {
        match attribute {
            Attribute::Title => self.title.clone(),
            Attribute::Description => self.description.clone(),
            Attribute::Value => self.value.clone(),
        }
    }

    fn set(&mut self, attribute: Attribute, value: Option<String>) {
        match attribute {
            Attribute::Title => self.title = value,
            Attribute::Description => self.description = value,
            Attribute::Value => self.value = value,
        }
    }
}

/// State-changing calls made against the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Launch(String),
    Press(ElementId),
    SetValue(ElementId, String),
    SelectMenu(Vec<String>),
}

struct Entry {
    node: FakeNode,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// The mutable tree behind [`FakeDesktop`]
///
/// Removed elements stay readable through their ids but are detached, so
/// searches from or through them come back empty, like stale AX handles.
#[derive(Default)]
pub struct FakeTree {
    entries: HashMap<ElementId, Entry>,
    applications: HashMap<u32, ElementId>,
    next_id: u64,
    reactions: HashMap<ElementId, Reaction>,
    scheduled: Vec<(usize, Reaction)>,
    launch_reaction: Option<Reaction>,
    actions: Vec<RecordedAction>,
    find_calls: usize,
}

impl FakeTree {
    fn insert(&mut self, parent: Option<&str>, node: FakeNode) -> ElementId {
        self.next_id += 1;
        let id = format!("e{}", self.next_id);
        self.entries.insert(
            id.clone(),
            Entry {
                node,
                parent: parent.map(str::to_string),
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(p)) {
            parent.children.push(id.clone());
        }
        id
    }

    pub fn add_application(&mut self, pid: u32) -> ElementId {
        let id = self.insert(None, FakeNode::new(ElementKind::Application));
        self.applications.insert(pid, id.clone());
        id
    }

    /// Detach an application, as if its process had died
    pub fn remove_application(&mut self, pid: u32) {
        self.applications.remove(&pid);
    }

    /// Re-register an existing application element under `pid`
    pub fn attach_application(&mut self, pid: u32, id: &str) {
        self.applications.insert(pid, id.to_string());
    }

    pub fn add_child(&mut self, parent: &str, node: FakeNode) -> ElementId {
        self.insert(Some(parent), node)
    }

    pub fn remove(&mut self, id: &str) {
        let parent = self.entries.get_mut(id).and_then(|entry| entry.parent.take());
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|child| child != id);
        }
    }

    pub fn clear_children(&mut self, id: &str) {
        let children = self
            .entries
            .get_mut(id)
            .map(|entry| std::mem::take(&mut entry.children))
            .unwrap_or_default();
        for child in children {
            if let Some(entry) = self.entries.get_mut(&child) {
                entry.parent = None;
            }
        }
    }

    pub fn attribute(&self, id: &str, attribute: Attribute) -> Option<String> {
        self.entries.get(id).and_then(|entry| entry.node.get(attribute))
    }

    pub fn set_attribute(&mut self, id: &str, attribute: Attribute, value: Option<&str>) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.node.set(attribute, value.map(str::to_string));
        }
    }

    pub fn parent(&self, id: &str) -> Option<ElementId> {
        self.entries.get(id).and_then(|entry| entry.parent.clone())
    }

    /// Run `reaction` when `id` is pressed or selected
    pub fn on_press<F>(&mut self, id: &str, reaction: F)
    where
        F: Fn(&mut FakeTree) + Send + Sync + 'static,
    {
        self.reactions.insert(id.to_string(), Arc::new(reaction));
    }

    /// Apply `change` just before lookup number `finds + 1` from now
    pub fn after_finds<F>(&mut self, finds: usize, change: F)
    where
        F: Fn(&mut FakeTree) + Send + Sync + 'static,
    {
        self.scheduled.push((finds, Arc::new(change)));
    }

    fn is_attached(&self, id: &str) -> bool {
        let mut current = id.to_string();
        for _ in 0..self.entries.len() + 1 {
            if self.applications.values().any(|app| *app == current) {
                return true;
            }
            match self.parent(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Breadth-first search below `ancestor`, same order as the AX adapter
    pub fn search(&self, ancestor: &str, spec: &SearchSpec) -> Option<ElementId> {
        if !self.is_attached(ancestor) {
            return None;
        }
        let mut queue: VecDeque<&str> = VecDeque::from([ancestor]);
        while let Some(id) = queue.pop_front() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            for child_id in &entry.children {
                let Some(child) = self.entries.get(child_id) else {
                    continue;
                };
                let kind = child.node.kind;
                let kind_matches = spec.kind.matches_role(kind.ax_role(), kind.ax_subrole());
                if spec.matches(kind_matches, |attribute| child.node.get(attribute)) {
                    return Some(child_id.clone());
                }
                queue.push_back(child_id);
            }
        }
        None
    }

    fn run_scheduled(&mut self) {
        let scheduled = std::mem::take(&mut self.scheduled);
        let mut pending = Vec::new();
        for (remaining, change) in scheduled {
            if remaining == 0 {
                change(self);
            } else {
                pending.push((remaining - 1, change));
            }
        }
        self.scheduled.extend(pending);
    }

    fn react(&mut self, id: &str) {
        if let Some(reaction) = self.reactions.get(id).cloned() {
            reaction(self);
        }
    }
}

/// In-memory [`AccessibilityProvider`]
#[derive(Default)]
pub struct FakeDesktop {
    tree: Mutex<FakeTree>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&mut FakeTree) -> R) -> R {
        f(&mut lock(&self.tree))
    }

    pub fn add_application(&self, pid: u32) -> ElementHandle {
        ElementHandle::new(self.with_tree(|tree| tree.add_application(pid)))
    }

    pub fn add_child(&self, parent: &ElementHandle, node: FakeNode) -> ElementHandle {
        ElementHandle::new(self.with_tree(|tree| tree.add_child(parent.id(), node)))
    }

    pub fn remove(&self, element: &ElementHandle) {
        self.with_tree(|tree| tree.remove(element.id()));
    }

    pub fn set_attribute(&self, element: &ElementHandle, attribute: Attribute, value: Option<&str>) {
        self.with_tree(|tree| tree.set_attribute(element.id(), attribute, value));
    }

    pub fn on_press<F>(&self, element: &ElementHandle, reaction: F)
    where
        F: Fn(&mut FakeTree) + Send + Sync + 'static,
    {
        self.with_tree(|tree| tree.on_press(element.id(), reaction));
    }

    pub fn after_finds<F>(&self, finds: usize, change: F)
    where
        F: Fn(&mut FakeTree) + Send + Sync + 'static,
    {
        self.with_tree(|tree| tree.after_finds(finds, change));
    }

    pub fn on_launch<F>(&self, reaction: F)
    where
        F: Fn(&mut FakeTree) + Send + Sync + 'static,
    {
        self.with_tree(|tree| tree.launch_reaction = Some(Arc::new(reaction)));
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.with_tree(|tree| tree.actions.clone())
    }

    pub fn clear_actions(&self) {
        self.with_tree(|tree| tree.actions.clear());
    }

    /// Number of `find` calls served so far
    pub fn find_calls(&self) -> usize {
        self.with_tree(|tree| tree.find_calls)
    }
}

#[async_trait]
impl AccessibilityProvider for FakeDesktop {
    async fn application(&self, pid: u32) -> Result<Option<ElementHandle>> {
        Ok(self.with_tree(|tree| tree.applications.get(&pid).cloned().map(ElementHandle::new)))
    }

    async fn launch(&self, bundle_id: &str) -> Result<()> {
        self.with_tree(|tree| {
            tree.actions.push(RecordedAction::Launch(bundle_id.to_string()));
            if let Some(reaction) = tree.launch_reaction.clone() {
                reaction(tree);
            }
        });
        Ok(())
    }

    async fn find(
        &self,
        ancestor: &ElementHandle,
        spec: &SearchSpec,
    ) -> Result<Option<ElementHandle>> {
        Ok(self.with_tree(|tree| {
            tree.find_calls += 1;
            tree.run_scheduled();
            tree.search(ancestor.id(), spec).map(ElementHandle::new)
        }))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        attribute: Attribute,
    ) -> Result<Option<String>> {
        Ok(self.with_tree(|tree| tree.attribute(element.id(), attribute)))
    }

    async fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        Ok(self.with_tree(|tree| tree.parent(element.id()).map(ElementHandle::new)))
    }

    async fn press(&self, element: &ElementHandle) -> Result<()> {
        self.with_tree(|tree| {
            if !tree.is_attached(element.id()) {
                return Err(anyhow!("Cannot press detached element {}", element));
            }
            tree.actions.push(RecordedAction::Press(element.id().to_string()));
            tree.react(element.id());
            Ok(())
        })
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        self.with_tree(|tree| {
            if !tree.is_attached(element.id()) {
                return Err(anyhow!("Cannot set value on detached element {}", element));
            }
            tree.actions.push(RecordedAction::SetValue(
                element.id().to_string(),
                value.to_string(),
            ));
            tree.set_attribute(element.id(), Attribute::Value, Some(value));
            Ok(())
        })
    }

    async fn select_menu_item(&self, app: &ElementHandle, path: &[&str]) -> Result<()> {
        self.with_tree(|tree| {
            tree.actions.push(RecordedAction::SelectMenu(
                path.iter().map(|s| s.to_string()).collect(),
            ));

            let (first, rest) = path
                .split_first()
                .ok_or_else(|| anyhow!("Empty menu path"))?;
            let mut current = tree
                .search(app.id(), &SearchSpec::new(ElementKind::MenuBarItem).title(*first))
                .ok_or_else(|| anyhow!("Menu bar item not found: {}", first))?;
            for title in rest {
                current = tree
                    .search(&current, &SearchSpec::new(ElementKind::MenuItem).title(*title))
                    .ok_or_else(|| anyhow!("Menu item not found: {}", path.join(" > ")))?;
            }
            tree.react(&current);
            Ok(())
        })
    }
}

/// In-memory [`ProcessProbe`]
#[derive(Default)]
pub struct FakeProcesses {
    instances: Mutex<HashMap<String, Vec<u32>>>,
    terminated: Mutex<Vec<String>>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, bundle_id: &str, pids: &[u32]) {
        lock(&self.instances).insert(bundle_id.to_string(), pids.to_vec());
    }

    /// Bundles `terminate` was called for while running
    pub fn terminated(&self) -> Vec<String> {
        lock(&self.terminated).clone()
    }
}

#[async_trait]
impl ProcessProbe for FakeProcesses {
    async fn running_instances(&self, bundle_id: &str) -> Result<Vec<u32>> {
        Ok(lock(&self.instances).get(bundle_id).cloned().unwrap_or_default())
    }

    async fn terminate(&self, bundle_id: &str) -> Result<()> {
        lock(&self.instances).remove(bundle_id);
        lock(&self.terminated).push(bundle_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_removed_subtree_is_unreachable() {
        let desktop = FakeDesktop::new();
        let app = desktop.add_application(1);
        let sheet = desktop.add_child(&app, FakeNode::new(ElementKind::Sheet));
        let button = desktop.add_child(&sheet, FakeNode::new(ElementKind::Button).title("Sign In"));

        let spec = SearchSpec::new(ElementKind::Button).title("Sign In");
        assert_eq!(desktop.find(&app, &spec).await.unwrap(), Some(button.clone()));

        desktop.remove(&sheet);
        assert_eq!(desktop.find(&app, &spec).await.unwrap(), None);
        assert_eq!(desktop.find(&sheet, &spec).await.unwrap(), None);
        // attributes of stale handles stay readable
        assert_eq!(
            desktop.attribute(&button, Attribute::Title).await.unwrap().as_deref(),
            Some("Sign In")
        );
        assert!(desktop.press(&button).await.is_err());
    }

    #[tokio::test]
    async fn test_menu_selection_runs_reaction() {
        let desktop = FakeDesktop::new();
        let app = desktop.add_application(1);
        let menu = desktop.add_child(&app, FakeNode::new(ElementKind::MenuBarItem).title("Store"));
        let item = desktop.add_child(&menu, FakeNode::new(ElementKind::MenuItem).title("Purchases"));
        let app_id = app.id().to_string();
        desktop.on_press(&item, move |tree| {
            tree.add_child(&app_id, FakeNode::new(ElementKind::Table).description("Purchases"));
        });

        desktop.select_menu_item(&app, &["Store", "Purchases"]).await.unwrap();

        let table = SearchSpec::new(ElementKind::Table).description("Purchases");
        assert!(desktop.find(&app, &table).await.unwrap().is_some());
        assert!(desktop.select_menu_item(&app, &["Store", "Nope"]).await.is_err());
    }

    #[tokio::test]
    async fn test_dead_application_is_not_searchable() {
        let desktop = FakeDesktop::new();
        let app = desktop.add_application(9);
        desktop.add_child(&app, FakeNode::new(ElementKind::StandardWindow));
        desktop.with_tree(|tree| tree.remove_application(9));

        assert_eq!(desktop.application(9).await.unwrap(), None);
        let window = SearchSpec::new(ElementKind::StandardWindow);
        assert_eq!(desktop.find(&app, &window).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fake_processes() {
        let processes = FakeProcesses::new();
        assert!(!processes.is_running("com.example").await.unwrap());
        processes.set_running("com.example", &[3, 4]);
        assert_eq!(processes.running_instances("com.example").await.unwrap(), vec![3, 4]);
        processes.terminate("com.example").await.unwrap();
        assert!(!processes.is_running("com.example").await.unwrap());
    }
}
