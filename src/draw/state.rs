use crate::draw::model::{Point, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Drawing,
    Restoring,
}

pub fn can_transition(from: SessionPhase, to: SessionPhase) -> bool {
    matches!(
        (from, to),
        (SessionPhase::Idle, SessionPhase::Drawing)
            | (SessionPhase::Drawing, SessionPhase::Idle)
            | (SessionPhase::Idle, SessionPhase::Restoring)
            | (SessionPhase::Restoring, SessionPhase::Idle)
    ) || from == to
}

/// In-flight pointer gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gesture {
    pub tool: Tool,
    pub anchor: Point,
    pub last: Point,
    /// Brush path including the anchor; empty for shape tools.
    pub path: Vec<Point>,
    /// Set when a fade wash has covered the path since it was last painted.
    pub washed: bool,
}

impl Gesture {
    pub fn begin(tool: Tool, anchor: Point) -> Self {
        let path = if tool == Tool::Brush {
            vec![anchor]
        } else {
            Vec::new()
        };
        Self {
            tool,
            anchor,
            last: anchor,
            path,
            washed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Drawing(Gesture),
    Restoring,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Drawing(_) => SessionPhase::Drawing,
            SessionState::Restoring => SessionPhase::Restoring,
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, SessionState::Drawing(_))
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self, SessionState::Restoring)
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        match self {
            SessionState::Drawing(gesture) => Some(gesture),
            _ => None,
        }
    }

    pub fn gesture_mut(&mut self) -> Option<&mut Gesture> {
        match self {
            SessionState::Drawing(gesture) => Some(gesture),
            _ => None,
        }
    }

    /// Moves to `next` when the transition is legal; returns the previous state.
    pub fn transition(&mut self, next: SessionState) -> Option<SessionState> {
        if !can_transition(self.phase(), next.phase()) {
            tracing::debug!(from = ?self.phase(), to = ?next.phase(), "session transition rejected");
            return None;
        }
        Some(std::mem::replace(self, next))
    }
}

#[cfg(test)]
mod tests {
    use super::{can_transition, Gesture, SessionPhase, SessionState};
    use crate::draw::model::Tool;

    #[test]
    fn drawing_and_restoring_do_not_overlap() {
        assert!(can_transition(SessionPhase::Idle, SessionPhase::Drawing));
        assert!(can_transition(SessionPhase::Idle, SessionPhase::Restoring));
        assert!(!can_transition(SessionPhase::Drawing, SessionPhase::Restoring));
        assert!(!can_transition(SessionPhase::Restoring, SessionPhase::Drawing));
    }

    #[test]
    fn transition_returns_previous_gesture() {
        let mut state = SessionState::Idle;
        state
            .transition(SessionState::Drawing(Gesture::begin(Tool::Line, (3, 4))))
            .expect("idle to drawing");

        assert!(state.transition(SessionState::Restoring).is_none());
        let previous = state.transition(SessionState::Idle).expect("drawing to idle");
        assert_eq!(previous.gesture().map(|g| g.anchor), Some((3, 4)));
        assert!(!state.is_drawing());
    }

    #[test]
    fn only_brush_gestures_carry_a_path() {
        assert_eq!(Gesture::begin(Tool::Brush, (1, 1)).path, vec![(1, 1)]);
        assert!(Gesture::begin(Tool::Circle, (1, 1)).path.is_empty());
    }
}
