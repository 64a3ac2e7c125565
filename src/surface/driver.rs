//! Bounded-wait wrapper around a [PageSurface].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Action, ActionOutput, PageSurface, Target};
use crate::error::SurfaceError;
use crate::types::RowSnapshot;

/// Upper bounds for every kind of surface call, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
  pub navigation_ms: u64,
  /// How long a control may take to appear before a step fails.
  pub element_wait_ms: u64,
  pub action_ms: u64,
  /// Presence polling interval inside [Driver::wait_for].
  pub poll_ms: u64,
  /// Pause after paging or submitting so the page can re-render.
  pub settle_ms: u64,
}

impl Default for Timeouts {
  fn default() -> Self {
    Self {
      navigation_ms: 30_000,
      element_wait_ms: 20_000,
      action_ms: 5_000,
      poll_ms: 250,
      settle_ms: 3_000,
    }
  }
}

impl Timeouts {
  fn navigation(&self) -> Duration {
    Duration::from_millis(self.navigation_ms)
  }

  fn element_wait(&self) -> Duration {
    Duration::from_millis(self.element_wait_ms)
  }

  fn action(&self) -> Duration {
    Duration::from_millis(self.action_ms)
  }

  fn poll(&self) -> Duration {
    Duration::from_millis(self.poll_ms.max(1))
  }

  pub fn settle(&self) -> Duration {
    Duration::from_millis(self.settle_ms)
  }
}

/// Owns the single page surface of a run and bounds every call on it.
pub struct Driver {
  surface: Box<dyn PageSurface>,
  timeouts: Timeouts,
}

async fn bounded<T>(
  limit: Duration,
  what: impl FnOnce() -> String,
  fut: impl Future<Output = Result<T, SurfaceError>>,
) -> Result<T, SurfaceError> {
  match tokio::time::timeout(limit, fut).await {
    Ok(r) => r,
    Err(_) => Err(SurfaceError::Timeout {
      what: what(),
      elapsed: limit,
    }),
  }
}

impl Driver {
  pub fn new(surface: Box<dyn PageSurface>, timeouts: Timeouts) -> Self {
    Self { surface, timeouts }
  }

  pub fn timeouts(&self) -> &Timeouts {
    &self.timeouts
  }

  #[instrument(level = "trace", skip(self))]
  pub async fn navigate(&mut self, url: &str) -> Result<(), SurfaceError> {
    let limit = self.timeouts.navigation();
    bounded(limit, || format!("navigation to {url}"), self.surface.navigate(url)).await
  }

  #[instrument(level = "trace", skip(self))]
  pub async fn rows(&mut self, table: &str) -> Result<Vec<RowSnapshot>, SurfaceError> {
    let limit = self.timeouts.element_wait();
    bounded(limit, || format!("table {table}"), self.surface.query(table)).await
  }

  /// Single bounded presence check, no polling.
  pub async fn is_present(&mut self, target: &Target) -> Result<bool, SurfaceError> {
    let limit = self.timeouts.action();
    bounded(limit, || format!("presence of {target}"), self.surface.is_present(target)).await
  }

  /// Polls until `target` is present or the element wait elapses.
  #[instrument(level = "trace", skip(self))]
  pub async fn wait_for(&mut self, target: &Target) -> Result<(), SurfaceError> {
    let limit = self.timeouts.element_wait();
    let poll = self.timeouts.poll();
    let surface = &mut self.surface;
    bounded(limit, || format!("{target} to appear"), async {
      loop {
        if surface.is_present(target).await? {
          return Ok(());
        }
        tokio::time::sleep(poll).await;
      }
    })
    .await
  }

  #[instrument(level = "trace", skip(self), fields(kind = action.kind()))]
  pub async fn interact(&mut self, action: &Action) -> Result<ActionOutput, SurfaceError> {
    let limit = self.timeouts.action();
    let out = bounded(
      limit,
      || format!("{} on {}", action.kind(), action.target()),
      self.surface.interact(action),
    )
    .await?;
    debug!(kind = action.kind(), target = %action.target(), "interaction done");
    Ok(out)
  }

  pub async fn click(&mut self, target: Target) -> Result<(), SurfaceError> {
    self.interact(&Action::Click { target }).await.map(|_| ())
  }

  pub async fn double_click(&mut self, target: Target) -> Result<(), SurfaceError> {
    self.interact(&Action::DoubleClick { target }).await.map(|_| ())
  }

  pub async fn fill(
    &mut self,
    target: Target,
    value: impl Into<String>,
  ) -> Result<(), SurfaceError> {
    let value = value.into();
    self.interact(&Action::Fill { target, value }).await.map(|_| ())
  }

  pub async fn check(&mut self, target: Target) -> Result<(), SurfaceError> {
    self.interact(&Action::Check { target }).await.map(|_| ())
  }

  /// Chooses the option at `position`; returns its text.
  pub async fn select_option(
    &mut self,
    target: Target,
    position: usize,
  ) -> Result<String, SurfaceError> {
    let name = target.to_string();
    self
      .interact(&Action::SelectOption { target, position })
      .await?
      .into_text()
      .ok_or_else(|| SurfaceError::Protocol(format!("select on {name} returned no text")))
  }

  pub async fn read_text(&mut self, target: Target) -> Result<String, SurfaceError> {
    let name = target.to_string();
    self
      .interact(&Action::ReadText { target })
      .await?
      .into_text()
      .ok_or_else(|| SurfaceError::Protocol(format!("read on {name} returned no text")))
  }

  /// Waits for the page to re-render after paging or submitting.
  pub async fn settle(&mut self) {
    let pause = self.timeouts.settle();
    if !pause.is_zero() {
      tokio::time::sleep(pause).await;
    }
  }

  /// Releases the surface, bounded like a navigation.
  pub async fn release(mut self) -> Result<(), SurfaceError> {
    let limit = self.timeouts.navigation();
    bounded(limit, || "surface release".to_string(), self.surface.close()).await
  }
}
