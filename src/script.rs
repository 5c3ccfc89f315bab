//! Script text for common page operations.
//!
//! Caller-supplied values never become code. Each builder wraps its body
//! in an arrow function and passes the values as one JSON object literal
//! argument, so a selector full of quotes is still just a string:
//!
//! ```text
//! (({ selector }) => { ... })({"selector":"a[title='x']"})
//! ```

use serde_json::{Value, json};

/// Evaluates to `document.title`.
#[must_use]
pub fn page_title() -> String {
    "document.title".to_string()
}

/// Evaluates to the page URL.
#[must_use]
pub fn page_url() -> String {
    "window.location.href".to_string()
}

/// Evaluates to a description of the first element matching `selector`,
/// or `null`.
#[must_use]
pub fn query_selector(selector: &str) -> String {
    invoke(
        "{ selector }",
        r"
  const el = document.querySelector(selector);
  if (!el) return null;
  return {
    tagName: el.tagName,
    textContent: el.textContent,
    innerHTML: el.innerHTML,
    id: el.id,
    className: typeof el.className === 'string' ? el.className : '',
    classList: Array.from(el.classList),
    attributes: Array.from(el.attributes).reduce((acc, attr) => {
      acc[attr.name] = attr.value;
      return acc;
    }, {}),
  };
",
        &json!({ "selector": selector }),
    )
}

/// Clicks the first element matching `selector`; evaluates to whether one
/// was found.
#[must_use]
pub fn click(selector: &str) -> String {
    invoke(
        "{ selector }",
        r"
  const el = document.querySelector(selector);
  if (!el) return false;
  el.click();
  return true;
",
        &json!({ "selector": selector }),
    )
}

/// Assigns `value` to the first element matching `selector` and fires
/// bubbling `input` and `change` events; evaluates to whether one was
/// found.
#[must_use]
pub fn set_value(selector: &str, value: &str) -> String {
    invoke(
        "{ selector, value }",
        r"
  const el = document.querySelector(selector);
  if (!el) return false;
  el.value = value;
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return true;
",
        &json!({ "selector": selector, "value": value }),
    )
}

/// `((params) => { body })(args)` with `args` rendered as a literal.
fn invoke(params: &str, body: &str, args: &Value) -> String {
    format!("(({params}) => {{{body}}})({})", literal(args))
}

/// JSON text is a valid script literal except for the two line
/// separators older engines reject inside strings.
fn literal(value: &Value) -> String {
    value
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
