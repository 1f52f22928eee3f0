//! A fake storefront laid out the way the real one exposes itself over
//! accessibility: a Store menu, one standard window with a toolbar and a web
//! area, a sign-in sheet, the Purchases table and app detail pages.

use std::sync::{Arc, Mutex};

use super::{lock, FakeDesktop, FakeNode, FakeProcesses, FakeTree, RecordedAction};
use crate::config::StoreConfig;
use crate::desktop::types::{Attribute, ElementId, ElementKind, SearchSpec};
use crate::store::labels::{
    ACCOUNT_ITEM_PREFIX, APPLE_ID_FIELD, PASSWORD_FIELD, PURCHASES_LANDMARK, PURCHASES_MENU_ITEM,
    SIGN_IN_BUTTON, SIGN_IN_MENU_ITEM, SIGN_OUT_MENU_ITEM, STORE_MENU, VERSION_LABEL,
};
use crate::store::AppStore;

pub const FIXTURE_PID: u32 = 4242;

const INITIAL_PAGE: &str = "Discover";

#[derive(Debug, Clone)]
struct CatalogApp {
    name: String,
    version: String,
    installed: bool,
}

struct FixtureState {
    user: Option<String>,
    catalog: Vec<CatalogApp>,
    purchases_load: bool,
    app_pages_load: bool,
    sign_in_sheet_opens: bool,
    sign_in_completes: bool,
    /// Lookups between pressing Install and the button flipping; `None` never flips
    install_finds: Option<usize>,
    completion_label: String,
}

struct Ids {
    app: ElementId,
    store_menu: ElementId,
    window: ElementId,
    web_area: ElementId,
}

struct Shared {
    ids: Ids,
    state: Mutex<FixtureState>,
}

/// Storefront look-alike wired to a [`FakeDesktop`] and [`FakeProcesses`]
///
/// Starts running, signed out, on the Discover page, with nothing purchased.
pub struct StoreFixture {
    pub desktop: Arc<FakeDesktop>,
    pub processes: Arc<FakeProcesses>,
    config: StoreConfig,
    shared: Arc<Shared>,
}

impl StoreFixture {
    pub fn new() -> Self {
        let config = StoreConfig::default();
        let desktop = Arc::new(FakeDesktop::new());
        let processes = Arc::new(FakeProcesses::new());
        processes.set_running(&config.bundle_id, &[FIXTURE_PID]);

        let ids = desktop.with_tree(|tree| {
            let app = tree.add_application(FIXTURE_PID);
            let store_menu =
                tree.add_child(&app, FakeNode::new(ElementKind::MenuBarItem).title(STORE_MENU));
            let window = tree.add_child(
                &app,
                FakeNode::new(ElementKind::StandardWindow).title("App Store"),
            );
            tree.add_child(&window, FakeNode::new(ElementKind::Toolbar));
            let web_area = tree.add_child(
                &window,
                FakeNode::new(ElementKind::WebArea).description(INITIAL_PAGE),
            );
            Ids {
                app,
                store_menu,
                window,
                web_area,
            }
        });

        let fixture = Self {
            desktop,
            processes,
            config,
            shared: Arc::new(Shared {
                ids,
                state: Mutex::new(FixtureState {
                    user: None,
                    catalog: Vec::new(),
                    purchases_load: true,
                    app_pages_load: true,
                    sign_in_sheet_opens: true,
                    sign_in_completes: true,
                    install_finds: Some(3),
                    completion_label: "Open".to_string(),
                }),
            }),
        };
        fixture.render(render_menu);
        fixture
    }

    fn render(&self, f: fn(&mut FakeTree, &Arc<Shared>)) {
        self.desktop.with_tree(|tree| f(tree, &self.shared));
    }

    fn update(&self, f: impl FnOnce(&mut FixtureState)) {
        f(&mut lock(&self.shared.state));
    }

    pub fn signed_in_as(self, user: &str) -> Self {
        self.update(|state| state.user = Some(user.to_string()));
        self.render(render_menu);
        self
    }

    /// Owned but not installed
    pub fn purchased(self, name: &str, version: &str) -> Self {
        self.add_to_catalog(name, version, false)
    }

    /// Owned and already on disk
    pub fn installed(self, name: &str, version: &str) -> Self {
        self.add_to_catalog(name, version, true)
    }

    fn add_to_catalog(self, name: &str, version: &str, installed: bool) -> Self {
        self.update(|state| {
            state.catalog.push(CatalogApp {
                name: name.to_string(),
                version: version.to_string(),
                installed,
            })
        });
        self
    }

    /// Put a catalog app's detail page in the main window
    pub fn showing_app_page(self, name: &str) -> Self {
        self.desktop
            .with_tree(|tree| render_app_page(tree, &self.shared, name));
        self
    }

    /// Put an arbitrary detail page in the main window; its button does nothing
    pub fn showing_page(self, name: &str, button_description: &str) -> Self {
        let web_area = self.shared.ids.web_area.clone();
        self.desktop
            .with_tree(|tree| render_page(tree, &web_area, name, button_description, "1.0"));
        self
    }

    pub fn showing_purchases(self) -> Self {
        self.render(render_purchases);
        self
    }

    /// Store > Purchases is selectable but the table never renders
    pub fn purchases_never_load(self) -> Self {
        self.update(|state| state.purchases_load = false);
        self
    }

    /// Purchases rows are pressable but no detail page ever renders
    pub fn app_pages_never_load(self) -> Self {
        self.update(|state| state.app_pages_load = false);
        self
    }

    /// Store > Sign In… is selectable but the sheet never appears
    pub fn sign_in_sheet_never_opens(self) -> Self {
        self.update(|state| state.sign_in_sheet_opens = false);
        self
    }

    /// The sheet accepts credentials but the account menu never updates
    pub fn sign_in_never_completes(self) -> Self {
        self.update(|state| state.sign_in_completes = false);
        self
    }

    /// The install button flips `finds` lookups after it is pressed
    pub fn install_takes(self, finds: usize) -> Self {
        self.update(|state| state.install_finds = Some(finds));
        self
    }

    pub fn install_never_completes(self) -> Self {
        self.update(|state| state.install_finds = None);
        self
    }

    /// Label the button shows once an install finishes, e.g. "Installed"
    pub fn install_completes_as(self, label: &str) -> Self {
        self.update(|state| state.completion_label = label.to_string());
        self
    }

    /// Storefront is not running; launching it brings the same UI back
    pub fn not_running(self) -> Self {
        let bundle_id = self.config.bundle_id.clone();
        self.processes.set_running(&bundle_id, &[]);
        self.desktop
            .with_tree(|tree| tree.remove_application(FIXTURE_PID));

        let processes = self.processes.clone();
        let app = self.shared.ids.app.clone();
        self.desktop.on_launch(move |tree| {
            tree.attach_application(FIXTURE_PID, &app);
            processes.set_running(&bundle_id, &[FIXTURE_PID]);
        });
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> AppStore {
        self.store_with(self.config.clone())
    }

    pub fn store_with(&self, config: StoreConfig) -> AppStore {
        AppStore::new(self.desktop.clone(), self.processes.clone(), config)
    }

    /// Account the fake storefront considers signed in
    pub fn user(&self) -> Option<String> {
        lock(&self.shared.state).user.clone()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        lock(&self.shared.state)
            .catalog
            .iter()
            .any(|app| app.name == name && app.installed)
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.desktop.actions()
    }

    pub fn menu_selections(&self) -> Vec<Vec<String>> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::SelectMenu(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// `(field description, value)` for every text entry, in order
    pub fn field_writes(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::SetValue(id, value) => Some((id, value)),
                _ => None,
            })
            .map(|(id, value)| {
                let label = self
                    .desktop
                    .with_tree(|tree| tree.attribute(&id, Attribute::Description))
                    .unwrap_or_default();
                (label, value)
            })
            .collect()
    }

    /// Description (or title) of every pressed element, in order
    pub fn pressed(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::Press(id) => Some(id),
                _ => None,
            })
            .map(|id| {
                self.desktop.with_tree(|tree| {
                    tree.attribute(&id, Attribute::Description)
                        .or_else(|| tree.attribute(&id, Attribute::Title))
                        .unwrap_or_default()
                })
            })
            .collect()
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn menu_item(title: &str) -> FakeNode {
    FakeNode::new(ElementKind::MenuItem).title(title)
}

fn render_menu(tree: &mut FakeTree, shared: &Arc<Shared>) {
    let menu = shared.ids.store_menu.clone();
    let user = lock(&shared.state).user.clone();
    tree.clear_children(&menu);

    match user {
        Some(user) => {
            tree.add_child(&menu, menu_item(&format!("{}{})", ACCOUNT_ITEM_PREFIX, user)));
            let sign_out = tree.add_child(&menu, menu_item(SIGN_OUT_MENU_ITEM));
            let shared = shared.clone();
            tree.on_press(&sign_out, move |tree| {
                lock(&shared.state).user = None;
                render_menu(tree, &shared);
            });
        }
        None => {
            let sign_in = tree.add_child(&menu, menu_item(SIGN_IN_MENU_ITEM));
            let shared = shared.clone();
            tree.on_press(&sign_in, move |tree| {
                let opens = lock(&shared.state).sign_in_sheet_opens;
                if opens {
                    render_sign_in_sheet(tree, &shared);
                }
            });
        }
    }

    let purchases = tree.add_child(&menu, menu_item(PURCHASES_MENU_ITEM));
    let shared = shared.clone();
    tree.on_press(&purchases, move |tree| {
        let loads = lock(&shared.state).purchases_load;
        if loads {
            render_purchases(tree, &shared);
        }
    });
}

fn render_sign_in_sheet(tree: &mut FakeTree, shared: &Arc<Shared>) {
    let window = shared.ids.window.clone();
    if tree.search(&window, &SearchSpec::new(ElementKind::Sheet)).is_some() {
        return;
    }

    let sheet = tree.add_child(&window, FakeNode::new(ElementKind::Sheet));
    let apple_id = tree.add_child(
        &sheet,
        FakeNode::new(ElementKind::TextField).description(APPLE_ID_FIELD),
    );
    tree.add_child(
        &sheet,
        FakeNode::new(ElementKind::SecureTextField).description(PASSWORD_FIELD),
    );
    let button = tree.add_child(&sheet, FakeNode::new(ElementKind::Button).title(SIGN_IN_BUTTON));

    let shared = shared.clone();
    tree.on_press(&button, move |tree| {
        let completes = lock(&shared.state).sign_in_completes;
        if !completes {
            return;
        }
        let user = tree
            .attribute(&apple_id, Attribute::Value)
            .filter(|user| !user.is_empty());
        tree.remove(&sheet);
        lock(&shared.state).user = user;
        render_menu(tree, &shared);
    });
}

fn render_purchases(tree: &mut FakeTree, shared: &Arc<Shared>) {
    let web_area = shared.ids.web_area.clone();
    let catalog = lock(&shared.state).catalog.clone();

    tree.clear_children(&web_area);
    tree.set_attribute(&web_area, Attribute::Description, Some(PURCHASES_LANDMARK));
    let table = tree.add_child(
        &web_area,
        FakeNode::new(ElementKind::Table).description(PURCHASES_LANDMARK),
    );

    for app in catalog {
        let row = tree.add_child(&table, FakeNode::new(ElementKind::Row));
        let link = tree.add_child(&row, FakeNode::new(ElementKind::Link).title(&app.name));
        let shared = shared.clone();
        tree.on_press(&link, move |tree| {
            let loads = lock(&shared.state).app_pages_load;
            if loads {
                render_app_page(tree, &shared, &app.name);
            }
        });
    }
}

/// Replace the web area's content with a detail page; returns the action button
fn render_page(
    tree: &mut FakeTree,
    web_area: &str,
    name: &str,
    button_description: &str,
    version: &str,
) -> ElementId {
    tree.clear_children(web_area);
    tree.set_attribute(web_area, Attribute::Description, Some(name));
    let button = tree.add_child(
        web_area,
        FakeNode::new(ElementKind::Button).description(button_description),
    );
    let info = tree.add_child(web_area, FakeNode::new(ElementKind::Group));
    tree.add_child(&info, FakeNode::new(ElementKind::StaticText).value(VERSION_LABEL));
    tree.add_child(&info, FakeNode::new(ElementKind::StaticText).value(version));
    button
}

fn render_app_page(tree: &mut FakeTree, shared: &Arc<Shared>, name: &str) {
    let Some(app) = lock(&shared.state)
        .catalog
        .iter()
        .find(|app| app.name == name)
        .cloned()
    else {
        return;
    };

    let action = if app.installed { "Open" } else { "Install" };
    let button = render_page(
        tree,
        &shared.ids.web_area,
        name,
        &format!("{}, {}", action, name),
        &app.version,
    );
    if !app.installed {
        let shared = shared.clone();
        let pressed = button.clone();
        tree.on_press(&button, move |tree| start_install(tree, &shared, &app.name, &pressed));
    }
}

fn start_install(tree: &mut FakeTree, shared: &Arc<Shared>, name: &str, button: &str) {
    tree.set_attribute(
        button,
        Attribute::Description,
        Some(format!("Installing, {}", name).as_str()),
    );

    let (finds, label) = {
        let state = lock(&shared.state);
        (state.install_finds, state.completion_label.clone())
    };
    let Some(finds) = finds else {
        return;
    };

    let shared = shared.clone();
    let name = name.to_string();
    let button = button.to_string();
    tree.after_finds(finds, move |tree| {
        tree.set_attribute(
            &button,
            Attribute::Description,
            Some(format!("{}, {}", label, name).as_str()),
        );
        if let Some(app) = lock(&shared.state)
            .catalog
            .iter_mut()
            .find(|app| app.name == name)
        {
            app.installed = true;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::platform::AccessibilityProvider;
    use crate::desktop::types::ElementHandle;

    #[tokio::test]
    async fn test_purchases_menu_renders_rows() {
        let fixture = StoreFixture::new()
            .signed_in_as("someone@example.com")
            .purchased("Some App", "1.0");
        let app = ElementHandle::new(fixture.shared.ids.app.clone());

        fixture
            .desktop
            .select_menu_item(&app, &[STORE_MENU, PURCHASES_MENU_ITEM])
            .await
            .unwrap();

        let link = SearchSpec::new(ElementKind::Link).title("Some App");
        assert!(fixture.desktop.find(&app, &link).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_signed_out_menu_offers_sign_in() {
        let fixture = StoreFixture::new();
        let app = ElementHandle::new(fixture.shared.ids.app.clone());

        let sign_in = SearchSpec::new(ElementKind::MenuItem).title(SIGN_IN_MENU_ITEM);
        let sign_out = SearchSpec::new(ElementKind::MenuItem).title(SIGN_OUT_MENU_ITEM);
        assert!(fixture.desktop.find(&app, &sign_in).await.unwrap().is_some());
        assert!(fixture.desktop.find(&app, &sign_out).await.unwrap().is_none());
    }
}
