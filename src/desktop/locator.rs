//! Element locator
//!
//! Single-shot lookups against the live accessibility tree. Absence is a
//! normal result (`Ok(None)`); only provider failures are errors.

use std::sync::Arc;

use super::platform::AccessibilityProvider;
use super::types::{Attribute, ElementHandle, SearchSpec};
use crate::error::Result;

#[derive(Clone)]
pub struct Locator {
    provider: Arc<dyn AccessibilityProvider>,
}

impl Locator {
    pub fn new(provider: Arc<dyn AccessibilityProvider>) -> Self {
        Self { provider }
    }

    /// First element below `ancestor` matching `spec`
    pub async fn find(
        &self,
        ancestor: &ElementHandle,
        spec: &SearchSpec,
    ) -> Result<Option<ElementHandle>> {
        let found = self.provider.find(ancestor, spec).await?;
        tracing::trace!(
            "find {} under {} -> {}",
            spec,
            ancestor,
            found.as_ref().map_or("none".to_string(), ToString::to_string)
        );
        Ok(found)
    }

    /// Whether anything below `ancestor` matches `spec` right now
    pub async fn exists(&self, ancestor: &ElementHandle, spec: &SearchSpec) -> Result<bool> {
        Ok(self.find(ancestor, spec).await?.is_some())
    }

    pub async fn read(
        &self,
        element: &ElementHandle,
        attribute: Attribute,
    ) -> Result<Option<String>> {
        Ok(self.provider.attribute(element, attribute).await?)
    }

    /// Find an element and read one of its attributes; absent if either is missing
    pub async fn find_attribute(
        &self,
        ancestor: &ElementHandle,
        spec: &SearchSpec,
        attribute: Attribute,
    ) -> Result<Option<String>> {
        match self.find(ancestor, spec).await? {
            Some(element) => self.read(&element, attribute).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::types::ElementKind;
    use crate::testing::{FakeDesktop, FakeNode};

    #[tokio::test]
    async fn test_absent_element_is_not_an_error() {
        let desktop = Arc::new(FakeDesktop::new());
        let app = desktop.add_application(42);
        let locator = Locator::new(desktop.clone());

        let spec = SearchSpec::new(ElementKind::Button).title("Sign In");
        assert_eq!(locator.find(&app, &spec).await.unwrap(), None);
        assert!(!locator.exists(&app, &spec).await.unwrap());
        assert_eq!(
            locator.find_attribute(&app, &spec, Attribute::Title).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_find_attribute_reads_from_live_tree() {
        let desktop = Arc::new(FakeDesktop::new());
        let app = desktop.add_application(42);
        let button = desktop.add_child(
            &app,
            FakeNode::new(ElementKind::Button).description("Install, Some App"),
        );
        let locator = Locator::new(desktop.clone());
        let spec = SearchSpec::new(ElementKind::Button);

        assert_eq!(
            locator
                .find_attribute(&app, &spec, Attribute::Description)
                .await
                .unwrap()
                .as_deref(),
            Some("Install, Some App")
        );

        desktop.set_attribute(&button, Attribute::Description, Some("Open, Some App"));
        assert_eq!(
            locator
                .find_attribute(&app, &spec, Attribute::Description)
                .await
                .unwrap()
                .as_deref(),
            Some("Open, Some App")
        );
    }
}
