//! Scripted in-memory surface: a dry-run backend driven by a JSON script.
//!
//! A script describes the paginated result listing and the detail pages a run
//! will visit. Every successful interaction is recorded so a run can be
//! inspected afterwards through a [ReplayProbe].

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Action, ActionOutput, PageSurface, Target};
use crate::error::{PortalError, SurfaceError};
use crate::types::RowSnapshot;

fn default_results_table() -> String {
  "results".to_string()
}

fn default_next_control() -> String {
  "next_page".to_string()
}

/// One detail page of a replay script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayPage {
  /// Controls on the page; a name listed n times has n instances.
  pub controls: Vec<String>,
  pub tables: HashMap<String, Vec<RowSnapshot>>,
  /// Option lists, by logical name, in display order.
  pub options: HashMap<String, Vec<String>>,
  /// Readable texts keyed by `name` or `name[i]`.
  pub texts: HashMap<String, String>,
  /// Controls whose interactions never complete.
  pub hang: Vec<String>,
  /// Controls whose first interaction fails as if not yet rendered.
  pub flaky: Vec<String>,
  /// Control name → URL loaded after clicking it. `{name}` placeholders are
  /// replaced by the last value filled into that field.
  pub on_click: HashMap<String, String>,
}

/// Whole replay script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayScript {
  #[serde(default = "default_results_table")]
  pub results_table: String,
  #[serde(default = "default_next_control")]
  pub next_control: String,
  /// Result listing pages, in paging order.
  #[serde(default)]
  pub result_pages: Vec<Vec<RowSnapshot>>,
  /// 0-based result pages that fail to render.
  #[serde(default)]
  pub broken_pages: Vec<usize>,
  /// Detail pages by URL.
  #[serde(default)]
  pub pages: HashMap<String, ReplayPage>,
}

impl Default for ReplayScript {
  fn default() -> Self {
    Self {
      results_table: default_results_table(),
      next_control: default_next_control(),
      result_pages: Vec::new(),
      broken_pages: Vec::new(),
      pages: HashMap::new(),
    }
  }
}

impl ReplayScript {
  /// Loads a script from a JSON file.
  pub fn load(path: &Path) -> Result<Self, PortalError> {
    let bytes = std::fs::read(path).map_err(|e| PortalError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}

#[derive(Debug, Default)]
struct ReplayState {
  current_url: String,
  result_page: usize,
  filled: HashMap<String, String>,
  actions: Vec<Action>,
  visited: Vec<String>,
  tripped: HashSet<String>,
  closed: bool,
}

/// Scripted [PageSurface].
pub struct ReplaySurface {
  script: Arc<ReplayScript>,
  state: Arc<Mutex<ReplayState>>,
}

/// Read-only view of a [ReplaySurface]'s history, usable after the surface
/// has been handed to a driver.
#[derive(Clone)]
pub struct ReplayProbe {
  state: Arc<Mutex<ReplayState>>,
}

fn lock(state: &Mutex<ReplayState>) -> MutexGuard<'_, ReplayState> {
  state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReplayProbe {
  /// Interactions performed, in order.
  pub fn actions(&self) -> Vec<Action> {
    lock(&self.state).actions.clone()
  }

  /// URLs navigated to (explicitly or via clicks), in order.
  pub fn visited(&self) -> Vec<String> {
    lock(&self.state).visited.clone()
  }

  /// Last value filled into `target`.
  pub fn filled(&self, target: &Target) -> Option<String> {
    lock(&self.state).filled.get(&target.to_string()).cloned()
  }

  pub fn is_closed(&self) -> bool {
    lock(&self.state).closed
  }

  /// 0-based index of the result page currently shown.
  pub fn result_page(&self) -> usize {
    lock(&self.state).result_page
  }
}

enum Step {
  Ready(ActionOutput),
  Hang,
}

impl ReplaySurface {
  pub fn new(script: ReplayScript) -> Self {
    Self {
      script: Arc::new(script),
      state: Arc::new(Mutex::new(ReplayState::default())),
    }
  }

  pub fn probe(&self) -> ReplayProbe {
    ReplayProbe {
      state: Arc::clone(&self.state),
    }
  }

  fn page<'a>(script: &'a ReplayScript, state: &ReplayState) -> Option<&'a ReplayPage> {
    script.pages.get(&state.current_url)
  }

  fn present(script: &ReplayScript, state: &ReplayState, target: &Target) -> bool {
    if target.name == script.next_control {
      return state.result_page + 1 < script.result_pages.len();
    }
    let Some(page) = Self::page(script, state) else {
      return false;
    };
    let instances = page.controls.iter().filter(|c| **c == target.name).count();
    instances > target.position()
      || page.options.contains_key(&target.name)
      || page.texts.contains_key(&target.name)
      || page.texts.contains_key(&target.to_string())
  }

  fn render_url(template: &str, filled: &HashMap<String, String>) -> String {
    let mut url = template.to_string();
    for (name, value) in filled {
      url = url.replace(&format!("{{{name}}}"), value);
    }
    url
  }

  fn step(&self, action: &Action) -> Result<Step, SurfaceError> {
    let script = &self.script;
    let mut state = lock(&self.state);
    if state.closed {
      return Err(SurfaceError::Closed);
    }
    let target = action.target();
    if let Some(page) = Self::page(script, &state)
      && page.hang.contains(&target.name)
    {
      return Ok(Step::Hang);
    }
    if let Some(page) = Self::page(script, &state)
      && page.flaky.contains(&target.name)
      && state.tripped.insert(target.name.clone())
    {
      return Err(SurfaceError::NotFound(format!("{target} (not rendered yet)")));
    }

    let is_next = target.name == script.next_control;
    if !is_next && !Self::present(script, &state, target) {
      return Err(SurfaceError::NotFound(target.to_string()));
    }

    let output = match action {
      Action::Click { .. } | Action::DoubleClick { .. } | Action::Check { .. } => {
        if is_next {
          if state.result_page + 1 >= script.result_pages.len() {
            return Err(SurfaceError::NotFound(target.to_string()));
          }
          state.result_page += 1;
        } else if let Some(template) =
          Self::page(script, &state).and_then(|p| p.on_click.get(&target.name))
        {
          let url = Self::render_url(template, &state.filled);
          debug!(url = %url, "replay: click navigates");
          state.visited.push(url.clone());
          state.current_url = url;
        }
        ActionOutput::Done
      }
      Action::Fill { value, .. } => {
        state.filled.insert(target.name.clone(), value.clone());
        state.filled.insert(target.to_string(), value.clone());
        ActionOutput::Done
      }
      Action::SelectOption { position, .. } => {
        let option = Self::page(script, &state)
          .and_then(|p| p.options.get(&target.name))
          .and_then(|opts| opts.get(*position))
          .cloned()
          .ok_or_else(|| SurfaceError::NotFound(format!("{target} option {position}")))?;
        ActionOutput::Text(option)
      }
      Action::ReadText { .. } => {
        let page = Self::page(script, &state);
        let text = page
          .and_then(|p| p.texts.get(&target.to_string()).or_else(|| p.texts.get(&target.name)))
          .cloned()
          .or_else(|| state.filled.get(&target.to_string()).cloned())
          .ok_or_else(|| SurfaceError::NotFound(target.to_string()))?;
        ActionOutput::Text(text)
      }
    };
    state.actions.push(action.clone());
    Ok(Step::Ready(output))
  }
}

#[async_trait]
impl PageSurface for ReplaySurface {
  async fn navigate(&mut self, url: &str) -> Result<(), SurfaceError> {
    let mut state = lock(&self.state);
    if state.closed {
      return Err(SurfaceError::Closed);
    }
    state.current_url = url.to_string();
    state.visited.push(url.to_string());
    Ok(())
  }

  async fn query(&mut self, table: &str) -> Result<Vec<RowSnapshot>, SurfaceError> {
    let state = lock(&self.state);
    if state.closed {
      return Err(SurfaceError::Closed);
    }
    let script = &self.script;
    if table == script.results_table {
      if script.broken_pages.contains(&state.result_page) {
        return Err(SurfaceError::Protocol(format!(
          "result page {} failed to render",
          state.result_page + 1
        )));
      }
      return Ok(
        script
          .result_pages
          .get(state.result_page)
          .cloned()
          .unwrap_or_default(),
      );
    }
    Ok(
      Self::page(script, &state)
        .and_then(|p| p.tables.get(table))
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn is_present(&mut self, target: &Target) -> Result<bool, SurfaceError> {
    let state = lock(&self.state);
    if state.closed {
      return Err(SurfaceError::Closed);
    }
    Ok(Self::present(&self.script, &state, target))
  }

  async fn interact(&mut self, action: &Action) -> Result<ActionOutput, SurfaceError> {
    match self.step(action)? {
      Step::Ready(out) => Ok(out),
      Step::Hang => {
        std::future::pending::<()>().await;
        Ok(ActionOutput::Done)
      }
    }
  }

  async fn close(&mut self) -> Result<(), SurfaceError> {
    lock(&self.state).closed = true;
    Ok(())
  }
}
