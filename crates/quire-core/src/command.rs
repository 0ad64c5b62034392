//! Reversible commands and the bounded undo/redo stack.
//!
//! ## Learning: The Command Pattern
//!
//! Every committed edit is a value that knows how to apply itself and how
//! to reverse itself:
//! - Edits become first-class values that can be stored and replayed
//! - Undo is just calling the inverse of the most recent value
//! - Plugins contribute their own edits without the core knowing them
//!
//! ## Learning: VecDeque
//!
//! The undo stack is a `VecDeque` because the bound evicts from the front
//! (oldest) while undo pops from the back (newest).

use std::cell::RefCell;
use std::collections::VecDeque;

use quire_document::Document;

use crate::event::{EventBus, EventName, EventPayload};
use crate::guard::guarded;
use crate::surface::EditableSurface;

/// Default maximum undo depth.
pub const DEFAULT_MAX_STACK_SIZE: usize = 100;

/// A reversible edit.
///
/// `undo` right after `execute` must restore the observable document
/// state. The stack trusts this and never verifies it.
pub trait Command {
    /// Short name used in logs.
    fn label(&self) -> &str {
        "command"
    }

    /// Whether a forward mutation exists.
    fn can_execute(&self) -> bool {
        true
    }

    /// Whether an inverse mutation exists.
    fn can_undo(&self) -> bool {
        true
    }

    /// Applies the edit.
    fn execute(&mut self, doc: &mut Document) -> anyhow::Result<()>;

    /// Reverses the edit.
    fn undo(&mut self, doc: &mut Document) -> anyhow::Result<()>;
}

/// A boxed document mutation.
pub type Mutation = Box<dyn FnMut(&mut Document) -> anyhow::Result<()>>;

/// A command built from closures.
///
/// A missing closure makes the matching capability check return false.
pub struct FnCommand {
    label: String,
    forward: Option<Mutation>,
    inverse: Option<Mutation>,
}

impl FnCommand {
    /// A command with both directions.
    pub fn new<F, U>(label: impl Into<String>, forward: F, inverse: U) -> Self
    where
        F: FnMut(&mut Document) -> anyhow::Result<()> + 'static,
        U: FnMut(&mut Document) -> anyhow::Result<()> + 'static,
    {
        Self::from_parts(label, Some(Box::new(forward)), Some(Box::new(inverse)))
    }

    /// A command that can't be undone.
    pub fn forward_only<F>(label: impl Into<String>, forward: F) -> Self
    where
        F: FnMut(&mut Document) -> anyhow::Result<()> + 'static,
    {
        Self::from_parts(label, Some(Box::new(forward)), None)
    }

    /// A command from optional closures.
    pub fn from_parts(
        label: impl Into<String>,
        forward: Option<Mutation>,
        inverse: Option<Mutation>,
    ) -> Self {
        Self {
            label: label.into(),
            forward,
            inverse,
        }
    }
}

impl Command for FnCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_execute(&self) -> bool {
        self.forward.is_some()
    }

    fn can_undo(&self) -> bool {
        self.inverse.is_some()
    }

    fn execute(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        match &mut self.forward {
            Some(forward) => forward(doc),
            None => anyhow::bail!("'{}' has no forward mutation", self.label),
        }
    }

    fn undo(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        match &mut self.inverse {
            Some(inverse) => inverse(doc),
            None => anyhow::bail!("'{}' has no inverse mutation", self.label),
        }
    }
}

impl std::fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("label", &self.label)
            .field("forward", &self.forward.is_some())
            .field("inverse", &self.inverse.is_some())
            .finish()
    }
}

/// What a stack operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOutcome {
    /// The document changed and the command moved between stacks
    Applied,
    /// Nothing to undo or redo
    Empty,
    /// The command was refused before touching state
    Rejected,
    /// The command failed or had no inverse and was discarded
    Dropped,
}

/// Executes commands and keeps bounded undo/redo history.
///
/// All methods take `&self` so that commands and event subscribers can
/// reach the stack again while it is running. No internal borrow is held
/// across command code or event delivery.
pub struct CommandStack {
    undo_stack: RefCell<VecDeque<Box<dyn Command>>>,
    redo_stack: RefCell<Vec<Box<dyn Command>>>,
    max_stack_size: usize,
    surface: EditableSurface,
    events: EventBus,
}

impl CommandStack {
    /// Creates a stack bound to a surface and an event bus.
    pub fn new(surface: EditableSurface, events: EventBus, max_stack_size: usize) -> Self {
        Self {
            undo_stack: RefCell::new(VecDeque::new()),
            redo_stack: RefCell::new(Vec::new()),
            max_stack_size: max_stack_size.max(1),
            surface,
            events,
        }
    }

    /// Runs a new command and records it.
    pub fn execute(&self, mut command: Box<dyn Command>) -> StackOutcome {
        if !command.can_execute() {
            tracing::error!(command = command.label(), "Command has no forward mutation");
            return StackOutcome::Rejected;
        }

        if !self.apply(command.as_mut(), Direction::Forward) {
            return StackOutcome::Rejected;
        }

        self.redo_stack.borrow_mut().clear();
        self.push_undo(command);
        self.notify();
        StackOutcome::Applied
    }

    /// Reverses the most recent command.
    pub fn undo(&self) -> StackOutcome {
        let popped = self.undo_stack.borrow_mut().pop_back();
        let Some(mut command) = popped else {
            tracing::debug!("Nothing to undo");
            return StackOutcome::Empty;
        };

        if !command.can_undo() {
            tracing::warn!(command = command.label(), "Command has no inverse; dropped");
            return StackOutcome::Dropped;
        }

        if !self.apply(command.as_mut(), Direction::Backward) {
            return StackOutcome::Dropped;
        }

        self.redo_stack.borrow_mut().push(command);
        self.notify();
        StackOutcome::Applied
    }

    /// Re-applies the most recently undone command.
    pub fn redo(&self) -> StackOutcome {
        let popped = self.redo_stack.borrow_mut().pop();
        let Some(mut command) = popped else {
            tracing::debug!("Nothing to redo");
            return StackOutcome::Empty;
        };

        if !self.apply(command.as_mut(), Direction::Forward) {
            return StackOutcome::Dropped;
        }

        self.push_undo(command);
        self.notify();
        StackOutcome::Applied
    }

    // ==================== Queries ====================

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.borrow().is_empty()
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.borrow().is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.borrow().len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.borrow().len()
    }

    /// Label of the command `undo` would reverse.
    pub fn next_undo_label(&self) -> Option<String> {
        self.undo_stack
            .borrow()
            .back()
            .map(|c| c.label().to_string())
    }

    pub fn max_stack_size(&self) -> usize {
        self.max_stack_size
    }

    /// Drops all history.
    pub fn clear(&self) {
        let undone = std::mem::take(&mut *self.undo_stack.borrow_mut());
        let redone = std::mem::take(&mut *self.redo_stack.borrow_mut());
        // Commands may own closures with their own drop logic
        drop(undone);
        drop(redone);
    }

    // ==================== Internals ====================

    fn apply(&self, command: &mut dyn Command, direction: Direction) -> bool {
        let label = command.label().to_string();
        let applied = self.surface.edit(|doc| {
            guarded(format_args!("{} of '{}'", direction.as_str(), label), || {
                match direction {
                    Direction::Forward => command.execute(doc),
                    Direction::Backward => command.undo(doc),
                }
            })
        });
        applied.is_some()
    }

    fn push_undo(&self, command: Box<dyn Command>) {
        let evicted = {
            let mut stack = self.undo_stack.borrow_mut();
            stack.push_back(command);
            if stack.len() > self.max_stack_size {
                stack.pop_front()
            } else {
                None
            }
        };
        if let Some(old) = evicted {
            tracing::debug!(command = old.label(), "Evicted oldest undo step");
        }
    }

    fn notify(&self) {
        self.events.trigger(EventName::Change, &EventPayload::None);
        self.events
            .trigger(EventName::SelectionChange, &EventPayload::None);
    }
}

impl std::fmt::Debug for CommandStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStack")
            .field("undo_depth", &self.undo_depth())
            .field("redo_depth", &self.redo_depth())
            .field("max_stack_size", &self.max_stack_size)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "execute",
            Direction::Backward => "undo",
        }
    }
}
