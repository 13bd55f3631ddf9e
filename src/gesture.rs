//! Pointer and touch gestures as small state machines, independent of any
//! rendering. Each surface consumes raw coordinates and reports only the
//! resulting intent.

use serde::{Deserialize, Serialize};

/// Leftward travel (px) past which a released swipe reveals the actions.
pub const SWIPE_OPEN_THRESHOLD: f64 = -50.0;
/// Offset (px) the task row rests at while its actions are revealed.
pub const SWIPE_REVEAL_OFFSET: f64 = -140.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SwipeState {
    Idle,
    Tracking { start_x: f64, current_x: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeIntent {
    Reveal,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeSurface {
    state: SwipeState,
}

impl Default for SwipeSurface {
    fn default() -> Self {
        Self {
            state: SwipeState::Idle,
        }
    }
}

impl SwipeSurface {
    pub fn start(&mut self, x: f64) {
        self.state = SwipeState::Tracking {
            start_x: x,
            current_x: x,
        };
    }

    /// Returns the row offset to display. Only leftward travel moves the row.
    pub fn move_to(&mut self, x: f64) -> f64 {
        match &mut self.state {
            SwipeState::Tracking { start_x, current_x } => {
                *current_x = x;
                (x - *start_x).clamp(SWIPE_REVEAL_OFFSET, 0.0)
            }
            SwipeState::Idle => 0.0,
        }
    }

    pub fn release(&mut self) -> SwipeIntent {
        let intent = match self.state {
            SwipeState::Tracking { start_x, current_x }
                if current_x - start_x < SWIPE_OPEN_THRESHOLD =>
            {
                SwipeIntent::Reveal
            }
            _ => SwipeIntent::Close,
        };
        self.state = SwipeState::Idle;
        intent
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SwipeState::Tracking { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardBounds {
    pub top: f64,
    pub bottom: f64,
}

impl CardBounds {
    pub fn contains(&self, y: f64) -> bool {
        y >= self.top && y <= self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Dragging { from: usize, over: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DragOutcome {
    Reorder { from: usize, to: usize },
    Cancelled,
}

/// Reordering of project cards, by mouse drag-and-drop or by touch on the
/// drag handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSurface {
    state: DragState,
}

impl Default for DragSurface {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
        }
    }
}

impl DragSurface {
    pub fn start(&mut self, from: usize) {
        self.state = DragState::Dragging { from, over: None };
    }

    /// Tracks the card under the pointer, skipping the card being dragged.
    pub fn move_to(&mut self, y: f64, cards: &[CardBounds]) -> Option<usize> {
        let DragState::Dragging { from, over } = &mut self.state else {
            return None;
        };
        *over = card_at(*from, y, cards);
        *over
    }

    /// Touch release: reorders only when released inside another card.
    pub fn release_at(&mut self, y: f64, cards: &[CardBounds]) -> DragOutcome {
        let outcome = match self.state {
            DragState::Dragging { from, .. } => match card_at(from, y, cards) {
                Some(to) => DragOutcome::Reorder { from, to },
                None => DragOutcome::Cancelled,
            },
            DragState::Idle => DragOutcome::Cancelled,
        };
        self.state = DragState::Idle;
        outcome
    }

    /// Mouse drop onto a card by index.
    pub fn drop_on(&mut self, to: usize) -> DragOutcome {
        let outcome = match self.state {
            DragState::Dragging { from, .. } if from != to => DragOutcome::Reorder { from, to },
            _ => DragOutcome::Cancelled,
        };
        self.state = DragState::Idle;
        outcome
    }

    pub fn hovered(&self) -> Option<usize> {
        match self.state {
            DragState::Dragging { over, .. } => over,
            DragState::Idle => None,
        }
    }
}

fn card_at(from: usize, y: f64, cards: &[CardBounds]) -> Option<usize> {
    cards
        .iter()
        .enumerate()
        .find(|(index, card)| *index != from && card.contains(y))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards() -> Vec<CardBounds> {
        vec![
            CardBounds { top: 0.0, bottom: 100.0 },
            CardBounds { top: 110.0, bottom: 210.0 },
            CardBounds { top: 220.0, bottom: 320.0 },
        ]
    }

    #[test]
    fn swipe_past_threshold_reveals_actions() {
        let mut surface = SwipeSurface::default();
        surface.start(300.0);
        assert_eq!(surface.move_to(240.0), -60.0);
        assert_eq!(surface.release(), SwipeIntent::Reveal);
        assert!(!surface.is_tracking());
    }

    #[test]
    fn short_or_rightward_swipe_closes() {
        let mut surface = SwipeSurface::default();
        surface.start(300.0);
        surface.move_to(260.0);
        assert_eq!(surface.release(), SwipeIntent::Close);

        surface.start(300.0);
        assert_eq!(surface.move_to(380.0), 0.0);
        assert_eq!(surface.release(), SwipeIntent::Close);
    }

    #[test]
    fn swipe_offset_is_clamped() {
        let mut surface = SwipeSurface::default();
        surface.start(400.0);
        assert_eq!(surface.move_to(0.0), SWIPE_REVEAL_OFFSET);
    }

    #[test]
    fn release_without_start_closes() {
        assert_eq!(SwipeSurface::default().release(), SwipeIntent::Close);
    }

    #[test]
    fn touch_release_inside_other_card_reorders() {
        let mut surface = DragSurface::default();
        surface.start(2);
        assert_eq!(surface.move_to(50.0, &cards()), Some(0));
        assert_eq!(surface.hovered(), Some(0));
        assert_eq!(
            surface.release_at(50.0, &cards()),
            DragOutcome::Reorder { from: 2, to: 0 }
        );
        assert_eq!(surface.hovered(), None);
    }

    #[test]
    fn touch_release_on_own_card_or_gap_cancels() {
        let mut surface = DragSurface::default();
        surface.start(1);
        assert_eq!(surface.release_at(150.0, &cards()), DragOutcome::Cancelled);

        surface.start(1);
        assert_eq!(surface.release_at(105.0, &cards()), DragOutcome::Cancelled);
    }

    #[test]
    fn mouse_drop_on_same_card_cancels() {
        let mut surface = DragSurface::default();
        surface.start(1);
        assert_eq!(surface.drop_on(1), DragOutcome::Cancelled);

        surface.start(0);
        assert_eq!(surface.drop_on(2), DragOutcome::Reorder { from: 0, to: 2 });
        assert_eq!(surface.drop_on(1), DragOutcome::Cancelled);
    }
}
