//! Typed shortcuts for common page operations.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::script;

use super::{Bridge, Result};

/// What a query reports about a matched element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,

    #[serde(default)]
    pub text_content: Option<String>,

    #[serde(default, rename = "innerHTML")]
    pub inner_html: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub class_list: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Bridge {
    /// The current document title.
    ///
    /// # Errors
    ///
    /// As [`Bridge::run`], or [`super::BridgeError::Decode`] if the result
    /// isn't a string.
    pub fn page_title(&self, timeout: Duration) -> Result<String> {
        let value = self.run(&script::page_title(), timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// The current page URL.
    ///
    /// # Errors
    ///
    /// As [`Bridge::page_title`].
    pub fn page_url(&self, timeout: Duration) -> Result<String> {
        let value = self.run(&script::page_url(), timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Describes the first element matching `selector`, if any.
    ///
    /// # Errors
    ///
    /// As [`Bridge::run`], or a decode error for an unexpected shape.
    pub fn query_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ElementInfo>> {
        let value = self.run(&script::query_selector(selector), timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Clicks the first element matching `selector`. Returns whether one
    /// was found.
    ///
    /// # Errors
    ///
    /// As [`Bridge::run`], or a decode error for a non-boolean result.
    pub fn click(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let value = self.run(&script::click(selector), timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sets the value of the first element matching `selector` and fires
    /// `input` and `change`. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// As [`Bridge::click`].
    pub fn set_value(&self, selector: &str, value: &str, timeout: Duration) -> Result<bool> {
        let result = self.run(&script::set_value(selector, value), timeout)?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::bridge::BridgeError;
    use crate::bridge::tests::{spawn_executor, test_bridge};
    use crate::model::Outcome;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn page_title_decodes_string() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |c| {
            assert_eq!(c.code, "document.title");
            Outcome::Completed(json!("Dashboard"))
        });

        assert_eq!(bridge.page_title(TIMEOUT).unwrap(), "Dashboard");
        executor.join().unwrap();
    }

    #[test]
    fn page_url_rejects_non_string() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |_| Outcome::Completed(json!(7)));

        let err = bridge.page_url(TIMEOUT).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
        executor.join().unwrap();
    }

    #[test]
    fn query_selector_decodes_element() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |c| {
            assert!(c.code.contains(r#""selector":"h1.title""#));
            Outcome::Completed(json!({
                "tagName": "H1",
                "textContent": "Welcome",
                "innerHTML": "Welcome",
                "id": "hero",
                "className": "title big",
                "classList": ["title", "big"],
                "attributes": { "id": "hero", "class": "title big" }
            }))
        });

        let element = bridge.query_selector("h1.title", TIMEOUT).unwrap().unwrap();

        assert_eq!(element.tag_name, "H1");
        assert_eq!(element.text_content.as_deref(), Some("Welcome"));
        assert_eq!(element.class_list, ["title", "big"]);
        assert_eq!(element.attributes["id"], "hero");
        executor.join().unwrap();
    }

    #[test]
    fn query_selector_missing_element_is_none() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |_| Outcome::Completed(json!(null)));

        assert!(bridge.query_selector("#nope", TIMEOUT).unwrap().is_none());
        executor.join().unwrap();
    }

    #[test]
    fn click_reports_found() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |_| Outcome::Completed(json!(false)));

        assert!(!bridge.click("button.missing", TIMEOUT).unwrap());
        executor.join().unwrap();
    }

    #[test]
    fn set_value_passes_value_as_data() {
        let (_dir, bridge) = test_bridge();
        let executor = spawn_executor(bridge.store(), |c| {
            assert!(c.code.contains(r#""value":"it's \"quoted\"""#));
            Outcome::Completed(json!(true))
        });

        assert!(bridge.set_value("input[name='q']", r#"it's "quoted""#, TIMEOUT).unwrap());
        executor.join().unwrap();
    }
}
