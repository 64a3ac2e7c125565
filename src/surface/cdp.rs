//! Browser backend: attaches to a running Chromium over the DevTools protocol.
//!
//! Queries and interactions are evaluated as small scripts built from the
//! [SelectorMap]; the core never sees markup.

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::selectors::{SelectorMap, split_chain};
use super::{Action, ActionOutput, PageSurface, Target};
use crate::error::{PortalError, SurfaceError};
use crate::types::RowSnapshot;

/// Resolves a shadow-piercing selector chain to all matching elements.
const RESOLVE_JS: &str = r#"
const resolveAll = (chain, root) => {
  let scopes = [root || document];
  let matches = [];
  chain.forEach((sel, i) => {
    matches = scopes.flatMap((s) => Array.from(s.querySelectorAll(sel)));
    if (i < chain.length - 1) {
      scopes = matches.map((m) => m.shadowRoot).filter(Boolean);
    }
  });
  return matches;
};
const textOf = (el) => ((el.innerText ?? el.value ?? el.textContent) || '').trim();
"#;

/// A page of an already-running browser, attached through its debugging endpoint.
pub struct CdpSurface {
  browser: Option<Browser>,
  page: Option<Page>,
  handler: Option<JoinHandle<()>>,
  selectors: SelectorMap,
}

/// Asks the debugging endpoint (`http://host:port`) for its websocket URL.
async fn discover_ws_url(endpoint: &str) -> Result<String, PortalError> {
  let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
  let response = reqwest::get(&url)
    .await
    .map_err(|e| PortalError::Connect(format!("{url}: {e}")))?;
  let body: Value = response
    .json()
    .await
    .map_err(|e| PortalError::Connect(format!("{url}: {e}")))?;
  body["webSocketDebuggerUrl"]
    .as_str()
    .map(String::from)
    .ok_or_else(|| PortalError::Connect(format!("{url}: no webSocketDebuggerUrl")))
}

fn cdp_err(e: impl std::fmt::Display) -> SurfaceError {
  SurfaceError::Protocol(e.to_string())
}

impl CdpSurface {
  /// Attaches to the browser behind `endpoint` and picks the first regular
  /// page; opens `start_url` in a new page when there is none.
  #[instrument(level = "trace", skip(selectors))]
  pub async fn attach(
    endpoint: &str,
    start_url: &str,
    selectors: SelectorMap,
  ) -> Result<Self, PortalError> {
    let ws_url = discover_ws_url(endpoint).await?;
    info!(ws_url = %ws_url, "devtools endpoint discovered");
    let (mut browser, mut handler) = Browser::connect(ws_url)
      .await
      .map_err(|e| PortalError::Connect(e.to_string()))?;
    let handler = tokio::spawn(async move {
      while let Some(event) = handler.next().await {
        if event.is_err() {
          break;
        }
      }
    });

    if let Err(e) = browser.fetch_targets().await {
      warn!(error = %e, "could not list existing targets");
    }
    let pages = browser.pages().await.map_err(|e| PortalError::Connect(e.to_string()))?;
    let mut chosen = None;
    for page in pages {
      let url = page.url().await.ok().flatten().unwrap_or_default();
      if !url.starts_with("chrome://") && !url.starts_with("devtools://") {
        chosen = Some(page);
        break;
      }
    }
    let page = match chosen {
      Some(p) => p,
      None => {
        warn!("no usable open page, opening a new one");
        browser
          .new_page(start_url)
          .await
          .map_err(|e| PortalError::Connect(e.to_string()))?
      }
    };
    if let Err(e) = page.bring_to_front().await {
      warn!(error = %e, "could not bring page to front");
    }
    info!("attached to browser page");

    Ok(Self {
      browser: Some(browser),
      page: Some(page),
      handler: Some(handler),
      selectors,
    })
  }

  fn page(&self) -> Result<&Page, SurfaceError> {
    self.page.as_ref().ok_or(SurfaceError::Closed)
  }

  async fn eval(&self, body: String) -> Result<Value, SurfaceError> {
    let script = format!("(() => {{ {RESOLVE_JS}\n{body} }})()");
    self
      .page()?
      .evaluate(script)
      .await
      .map_err(cdp_err)?
      .into_value::<Value>()
      .map_err(cdp_err)
  }

  fn chain_json(&self, target: &Target) -> Result<(String, bool), SurfaceError> {
    let control = self.selectors.control(&target.name)?;
    Ok((json!(control.chain()).to_string(), control.force()))
  }

  async fn on_element(&self, target: &Target, body: &str) -> Result<Value, SurfaceError> {
    let (chain, force) = self.chain_json(target)?;
    let script = format!(
      "const el = resolveAll({chain})[{index}];\n\
       if (!el) return {{ missing: true }};\n\
       const force = {force};\n\
       {body}",
      index = target.position(),
    );
    let out = self.eval(script).await?;
    if out.get("missing").and_then(Value::as_bool) == Some(true) {
      return Err(SurfaceError::NotFound(target.to_string()));
    }
    Ok(out)
  }
}

#[async_trait]
impl PageSurface for CdpSurface {
  async fn navigate(&mut self, url: &str) -> Result<(), SurfaceError> {
    self.page()?.goto(url).await.map_err(cdp_err)?;
    Ok(())
  }

  async fn query(&mut self, table: &str) -> Result<Vec<RowSnapshot>, SurfaceError> {
    let spec = self.selectors.table(table)?;
    let rows = json!(split_chain(&spec.row)).to_string();
    let fields = serde_json::to_string(&spec.fields).map_err(cdp_err)?;
    let script = format!(
      "const fields = {fields};\n\
       return resolveAll({rows}).map((row) => {{\n\
         const out = {{}};\n\
         for (const [name, f] of Object.entries(fields)) {{\n\
           const els = f.css ? Array.from(row.querySelectorAll(f.css)) : [row];\n\
           const vals = els.map((el) =>\n\
             f.attribute ? (el.getAttribute(f.attribute) || '') : textOf(el));\n\
           const picked = f.all ? vals.join(' | ') : (vals[0] ?? '');\n\
           if (picked) out[name] = picked;\n\
         }}\n\
         return out;\n\
       }});"
    );
    let value = self.eval(script).await?;
    serde_json::from_value(value).map_err(cdp_err)
  }

  async fn is_present(&mut self, target: &Target) -> Result<bool, SurfaceError> {
    let (chain, _) = self.chain_json(target)?;
    let script = format!("return resolveAll({chain}).length > {};", target.position());
    Ok(self.eval(script).await?.as_bool().unwrap_or(false))
  }

  async fn interact(&mut self, action: &Action) -> Result<ActionOutput, SurfaceError> {
    match action {
      Action::Click { target } => {
        self
          .on_element(
            target,
            "if (force) el.removeAttribute('disabled');\n\
             el.scrollIntoView({ block: 'center' });\n\
             el.click();\n\
             return {};",
          )
          .await?;
        Ok(ActionOutput::Done)
      }
      Action::DoubleClick { target } => {
        self
          .on_element(
            target,
            "el.scrollIntoView({ block: 'center' });\n\
             el.dispatchEvent(new MouseEvent('dblclick', { bubbles: true, composed: true }));\n\
             return {};",
          )
          .await?;
        Ok(ActionOutput::Done)
      }
      Action::Fill { target, value } => {
        let body = format!(
          "el.focus();\n\
           el.value = {value};\n\
           el.dispatchEvent(new Event('input', {{ bubbles: true, composed: true }}));\n\
           el.dispatchEvent(new Event('change', {{ bubbles: true, composed: true }}));\n\
           return {{}};",
          value = json!(value),
        );
        self.on_element(target, &body).await?;
        Ok(ActionOutput::Done)
      }
      Action::Check { target } => {
        self
          .on_element(target, "if (!el.checked) el.click();\nreturn {};")
          .await?;
        Ok(ActionOutput::Done)
      }
      Action::SelectOption { target, position } => {
        let indexed = Target::nth(target.name.clone(), *position);
        let out = self
          .on_element(&indexed, "const text = textOf(el);\nel.click();\nreturn { text };")
          .await?;
        Ok(ActionOutput::Text(
          out["text"].as_str().unwrap_or_default().to_string(),
        ))
      }
      Action::ReadText { target } => {
        let out = self
          .on_element(target, "return { text: textOf(el) };")
          .await?;
        Ok(ActionOutput::Text(
          out["text"].as_str().unwrap_or_default().to_string(),
        ))
      }
    }
  }

  async fn close(&mut self) -> Result<(), SurfaceError> {
    // Detach only; the browser belongs to the operator and stays open.
    self.page = None;
    self.browser = None;
    if let Some(handler) = self.handler.take() {
      handler.abort();
    }
    Ok(())
  }
}
