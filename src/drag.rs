//! Spreadsheet-style drag selection over the page table.
//!
//! The controller only sees row indices and a few pointer facts, so it can
//! be driven by any input layer (or a test). Selection is materialised once,
//! on pointer-up: the pre-drag state of the first row in the dragged range
//! decides whether the whole range becomes selected or deselected.
//!
//! A drag is tied to the row revision it started on. If the rows are
//! replaced or shifted before pointer-up, the indices no longer name the
//! rows the user dragged over and the drag is abandoned.

use crate::store::Selection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

impl Modifiers {
    pub fn ctrl_or_meta(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Element under the pointer. Checkboxes and links handle their own clicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerTarget {
    #[default]
    Row,
    Checkbox,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub anchor_index: usize,
    pub current_index: usize,
    pub baseline: Selection,
    pub rows_revision: u64,
}

impl DragSession {
    pub fn range(&self) -> (usize, usize) {
        (
            self.anchor_index.min(self.current_index),
            self.anchor_index.max(self.current_index),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// What the caller has to do after feeding an event to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "effect", content = "selection")]
pub enum DragEffect {
    None,
    /// A drag began; native text selection should be suppressed.
    Started,
    /// Write this selection to the store.
    Commit(Selection),
    /// The drag was abandoned; restore text selection, keep the baseline.
    Aborted,
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// True while native text selection must stay disabled.
    pub fn suppresses_text_selection(&self) -> bool {
        self.is_dragging()
    }

    /// Rows currently covered by the drag, for highlighting.
    pub fn drag_range(&self) -> Option<(usize, usize)> {
        match &self.state {
            DragState::Dragging(session) => Some(session.range()),
            DragState::Idle => None,
        }
    }

    pub fn in_drag_range(&self, row_index: usize) -> bool {
        self.drag_range()
            .map(|(start, end)| row_index >= start && row_index <= end)
            .unwrap_or(false)
    }

    pub fn pointer_down(
        &mut self,
        row_index: usize,
        target: PointerTarget,
        modifiers: Modifiers,
        current: &Selection,
        rows_revision: u64,
    ) -> DragEffect {
        if target != PointerTarget::Row {
            return DragEffect::None;
        }

        if modifiers.ctrl_or_meta() {
            let mut next = current.clone();
            let selected = current.get(&row_index).copied().unwrap_or(false);
            next.insert(row_index, !selected);
            return DragEffect::Commit(next);
        }

        self.state = DragState::Dragging(DragSession {
            anchor_index: row_index,
            current_index: row_index,
            baseline: current.clone(),
            rows_revision,
        });
        DragEffect::Started
    }

    /// Track the row under the pointer. Nothing is written until commit.
    pub fn pointer_enter(&mut self, row_index: usize) -> DragEffect {
        if let DragState::Dragging(session) = &mut self.state {
            session.current_index = row_index;
        }
        DragEffect::None
    }

    /// Finish the drag anywhere in the document. `row_count` is the number
    /// of rows currently rendered; indices past it are ignored.
    pub fn pointer_up(&mut self, row_count: usize, rows_revision: u64) -> DragEffect {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) if session.rows_revision != rows_revision => {
                log::debug!(
                    "drag: rows changed under the drag (revision {} -> {}), abandoning",
                    session.rows_revision,
                    rows_revision
                );
                DragEffect::Aborted
            }
            DragState::Dragging(session) => DragEffect::Commit(commit_range(&session, row_count)),
            DragState::Idle => DragEffect::None,
        }
    }

    pub fn escape(&mut self) -> DragEffect {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(_) => DragEffect::Aborted,
            DragState::Idle => DragEffect::None,
        }
    }
}

/// Apply the range toggle of `session` on top of its baseline.
pub fn commit_range(session: &DragSession, row_count: usize) -> Selection {
    let (start, end) = session.range();
    let should_select = if start < row_count {
        !session.baseline.get(&start).copied().unwrap_or(false)
    } else {
        true
    };

    let mut next = session.baseline.clone();
    for index in (start..=end).take_while(|index| *index < row_count) {
        next.insert(index, should_select);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(controller: &mut DragController, from: usize, to: usize, baseline: &Selection) -> Selection {
        controller.pointer_down(from, PointerTarget::Row, Modifiers::default(), baseline, 0);
        controller.pointer_enter(to);
        match controller.pointer_up(10, 0) {
            DragEffect::Commit(selection) => selection,
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn range_direction_comes_from_first_row() {
        let baseline = Selection::from([(0, false), (1, false), (2, true)]);
        let mut controller = DragController::new();
        let result = drag(&mut controller, 0, 2, &baseline);
        assert_eq!(result, Selection::from([(0, true), (1, true), (2, true)]));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn selected_first_row_deselects_the_range() {
        let baseline = Selection::from([(1, true), (2, false), (3, true), (6, true)]);
        let mut controller = DragController::new();
        let result = drag(&mut controller, 1, 3, &baseline);
        assert_eq!(
            result,
            Selection::from([(1, false), (2, false), (3, false), (6, true)])
        );
    }

    #[test]
    fn drag_direction_does_not_matter() {
        let baseline = Selection::from([(3, true), (4, false)]);
        let mut controller = DragController::new();
        let down = drag(&mut controller, 2, 5, &baseline);
        let up = drag(&mut controller, 5, 2, &baseline);
        assert_eq!(down, up);
    }

    #[test]
    fn only_last_pointer_position_counts() {
        let baseline = Selection::new();
        let mut controller = DragController::new();
        controller.pointer_down(1, PointerTarget::Row, Modifiers::default(), &baseline, 0);
        controller.pointer_enter(6);
        controller.pointer_enter(4);
        controller.pointer_enter(2);
        assert_eq!(controller.drag_range(), Some((1, 2)));
        assert!(controller.in_drag_range(2));
        assert!(!controller.in_drag_range(3));
        let effect = controller.pointer_up(10, 0);
        assert_eq!(effect, DragEffect::Commit(Selection::from([(1, true), (2, true)])));
    }

    #[test]
    fn escape_discards_the_drag() {
        let baseline = Selection::from([(0, true)]);
        let mut controller = DragController::new();
        assert_eq!(
            controller.pointer_down(2, PointerTarget::Row, Modifiers::default(), &baseline, 0),
            DragEffect::Started
        );
        assert!(controller.suppresses_text_selection());
        controller.pointer_enter(5);
        assert_eq!(controller.escape(), DragEffect::Aborted);
        assert!(!controller.suppresses_text_selection());
        assert_eq!(controller.pointer_up(10, 0), DragEffect::None);
    }

    #[test]
    fn replaced_rows_abandon_the_drag() {
        let baseline = Selection::from([(0, true)]);
        let mut controller = DragController::new();
        controller.pointer_down(1, PointerTarget::Row, Modifiers::default(), &baseline, 3);
        controller.pointer_enter(4);
        assert_eq!(controller.pointer_up(10, 4), DragEffect::Aborted);
        assert!(!controller.is_dragging());
        assert_eq!(controller.pointer_up(10, 4), DragEffect::None);
    }

    #[test]
    fn ctrl_click_toggles_single_row_without_dragging() {
        let baseline = Selection::from([(1, true)]);
        let mut controller = DragController::new();
        let modifiers = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let effect = controller.pointer_down(1, PointerTarget::Row, modifiers, &baseline, 0);
        assert_eq!(effect, DragEffect::Commit(Selection::from([(1, false)])));
        assert!(!controller.is_dragging());

        let meta = Modifiers {
            meta: true,
            ..Modifiers::default()
        };
        let effect = controller.pointer_down(3, PointerTarget::Row, meta, &baseline, 0);
        assert_eq!(effect, DragEffect::Commit(Selection::from([(1, true), (3, true)])));
    }

    #[test]
    fn checkbox_and_link_targets_are_ignored() {
        let mut controller = DragController::new();
        let selection = Selection::new();
        assert_eq!(
            controller.pointer_down(0, PointerTarget::Checkbox, Modifiers::default(), &selection, 0),
            DragEffect::None
        );
        assert_eq!(
            controller.pointer_down(0, PointerTarget::Link, Modifiers::default(), &selection, 0),
            DragEffect::None
        );
        assert!(!controller.is_dragging());
    }

    #[test]
    fn rows_past_the_table_are_skipped() {
        let session = DragSession {
            anchor_index: 1,
            current_index: 8,
            baseline: Selection::new(),
            rows_revision: 0,
        };
        assert_eq!(commit_range(&session, 3), Selection::from([(1, true), (2, true)]));
        assert_eq!(commit_range(&session, 0), Selection::new());
    }

    #[test]
    fn pointer_up_without_drag_does_nothing() {
        let mut controller = DragController::new();
        assert_eq!(controller.pointer_up(5, 0), DragEffect::None);
        assert_eq!(controller.pointer_enter(2), DragEffect::None);
        assert_eq!(controller.escape(), DragEffect::None);
    }
}
