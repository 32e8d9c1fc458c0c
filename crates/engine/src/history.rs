/// Undo/Redo history of cell mutations

use std::collections::VecDeque;

use crate::address::Address;
use crate::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SetValue,
    SetFormula,
    Clear,
}

impl CommandKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::SetValue => "Set value",
            CommandKind::SetFormula => "Set formula",
            CommandKind::Clear => "Clear",
        }
    }
}

/// A committed mutation: the whole cell before and after, so that undo
/// and redo restore it verbatim (formula text, AST and therefore edges).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub address: Address,
    pub before: Cell,
    pub after: Cell,
}

#[derive(Debug, Default)]
pub struct History {
    undo_stack: VecDeque<Command>,
    redo_stack: Vec<Command>,
    /// `None` keeps every command.
    max_entries: Option<usize>,
}

impl History {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries,
        }
    }

    /// Record a newly executed command. Clears the redo stack.
    pub fn record(&mut self, command: Command) {
        self.push_undo(command);
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, command: Command) {
        self.undo_stack.push_back(command);

        if let Some(max) = self.max_entries {
            while self.undo_stack.len() > max {
                self.undo_stack.pop_front();
            }
        }
    }

    /// The command `undo` would revert.
    pub fn peek_undo(&self) -> Option<&Command> {
        self.undo_stack.back()
    }

    /// The command `redo` would reapply.
    pub fn peek_redo(&self) -> Option<&Command> {
        self.redo_stack.last()
    }

    /// Move the newest command onto the redo stack and return it.
    pub fn undo(&mut self) -> Option<Command> {
        let command = self.undo_stack.pop_back()?;
        self.redo_stack.push(command.clone());
        Some(command)
    }

    /// Move the newest undone command back onto the undo stack and return it.
    pub fn redo(&mut self) -> Option<Command> {
        let command = self.redo_stack.pop()?;
        self.push_undo(command.clone());
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::value::RawValue;

    fn set(n: f64, before: f64) -> Command {
        Command {
            kind: CommandKind::SetValue,
            address: Address::new(0, 0),
            before: Cell::Value(RawValue::Number(before)),
            after: Cell::Value(RawValue::Number(n)),
        }
    }

    #[test]
    fn test_undo_redo_order() {
        let mut history = History::new(None);
        history.record(set(1.0, 0.0));
        history.record(set(2.0, 1.0));

        assert_eq!(history.undo(), Some(set(2.0, 1.0)));
        assert_eq!(history.undo(), Some(set(1.0, 0.0)));
        assert_eq!(history.undo(), None);
        assert!(history.can_redo());

        assert_eq!(history.redo(), Some(set(1.0, 0.0)));
        assert_eq!(history.peek_undo(), Some(&set(1.0, 0.0)));
        assert_eq!(history.peek_redo(), Some(&set(2.0, 1.0)));
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new(None);
        history.record(set(1.0, 0.0));
        history.undo();
        assert!(history.can_redo());
        history.record(set(5.0, 0.0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(Some(2));
        for i in 1..=5 {
            history.record(set(i as f64, (i - 1) as f64));
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.undo(), Some(set(5.0, 4.0)));
        assert_eq!(history.undo(), Some(set(4.0, 3.0)));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut history = History::default();
        for i in 0..1000 {
            history.record(set(i as f64, 0.0));
        }
        assert_eq!(history.undo_len(), 1000);
        history.clear();
        assert!(!history.can_undo());
    }
}
