//! Submission workflow states and their transition table.

use std::fmt;

use serde::Serialize;

/// Position of one record in the submission workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
  Start,
  Step2,
  Step3,
  FillFields,
  Step4,
  Submit,
  Submitted,
  Failed,
}

/// Forward transitions. Every non-terminal state has exactly one successor;
/// any state may additionally drop to `Failed`.
const TRANSITIONS: &[(WorkflowState, WorkflowState)] = &[
  (WorkflowState::Start, WorkflowState::Step2),
  (WorkflowState::Step2, WorkflowState::Step3),
  (WorkflowState::Step3, WorkflowState::FillFields),
  (WorkflowState::FillFields, WorkflowState::Step4),
  (WorkflowState::Step4, WorkflowState::Submit),
  (WorkflowState::Submit, WorkflowState::Submitted),
];

/// Logical name of the "continue" control that leaves each step state.
const STEP_CONTROLS: &[(WorkflowState, &str)] = &[
  (WorkflowState::Step2, "continue_step_2"),
  (WorkflowState::Step3, "continue_step_3"),
  (WorkflowState::Step4, "continue_step_4"),
];

impl WorkflowState {
  /// Successor in the transition table; `None` for terminal states.
  pub fn next(self) -> Option<WorkflowState> {
    TRANSITIONS
      .iter()
      .find(|(from, _)| *from == self)
      .map(|(_, to)| *to)
  }

  /// Control that must be located and clicked to complete this step, if this
  /// is a step state.
  pub fn continue_control(self) -> Option<&'static str> {
    STEP_CONTROLS
      .iter()
      .find(|(state, _)| *state == self)
      .map(|(_, name)| *name)
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, WorkflowState::Submitted | WorkflowState::Failed)
  }
}

impl fmt::Display for WorkflowState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      WorkflowState::Start => "start",
      WorkflowState::Step2 => "step_2",
      WorkflowState::Step3 => "step_3",
      WorkflowState::FillFields => "fill_fields",
      WorkflowState::Step4 => "step_4",
      WorkflowState::Submit => "submit",
      WorkflowState::Submitted => "submitted",
      WorkflowState::Failed => "failed",
    };
    f.write_str(s)
  }
}

/// Monotonic cursor over [WorkflowState]: it only moves along the transition
/// table or to `Failed`, never backwards.
#[derive(Debug, Clone)]
pub struct StepMachine {
  state: WorkflowState,
  visited: Vec<WorkflowState>,
}

impl StepMachine {
  pub fn new() -> Self {
    Self {
      state: WorkflowState::Start,
      visited: vec![WorkflowState::Start],
    }
  }

  pub fn state(&self) -> WorkflowState {
    self.state
  }

  /// States entered so far, in order.
  pub fn visited(&self) -> &[WorkflowState] {
    &self.visited
  }

  /// Moves to the successor state. Returns the new state, or `None` when the
  /// machine is already terminal.
  pub fn advance(&mut self) -> Option<WorkflowState> {
    let next = self.state.next()?;
    self.state = next;
    self.visited.push(next);
    Some(next)
  }

  /// Terminates at `Failed`. Idempotent once terminal.
  pub fn fail(&mut self) {
    if !self.state.is_terminal() {
      self.state = WorkflowState::Failed;
      self.visited.push(WorkflowState::Failed);
    }
  }
}

impl Default for StepMachine {
  fn default() -> Self {
    Self::new()
  }
}
