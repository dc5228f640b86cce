//! In-memory surface that keeps a log of what was drawn.

use async_trait::async_trait;
use tracing::trace;

use crate::command::DrawOp;
use crate::surface::{DrawingSurface, SurfaceError, SurfaceState};

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    state: SurfaceState,
    history: Vec<DrawOp>,
    path_len: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: SurfaceState::default(),
            history: Vec::new(),
            path_len: 0,
        }
    }

    /// Every operation applied so far, oldest first.
    pub fn history(&self) -> &[DrawOp] {
        &self.history
    }

    /// Number of segments in the current path.
    pub fn path_len(&self) -> usize {
        self.path_len
    }

    /// Forget the drawing log and path. State is kept.
    pub fn clear(&mut self) {
        self.history.clear();
        self.path_len = 0;
    }
}

#[async_trait]
impl DrawingSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn state(&self) -> &SurfaceState {
        &self.state
    }

    async fn apply(&mut self, op: &DrawOp) -> Result<(), SurfaceError> {
        match op {
            DrawOp::Arc(p) if p.radius < 0.0 => {
                return Err(SurfaceError::IndexSize(format!(
                    "the radius provided ({}) is negative",
                    p.radius
                )));
            }
            DrawOp::ArcTo(p) if p.radius < 0.0 => {
                return Err(SurfaceError::IndexSize(format!(
                    "the radius provided ({}) is negative",
                    p.radius
                )));
            }
            DrawOp::BeginPath => self.path_len = 0,
            DrawOp::MoveTo(_)
            | DrawOp::LineTo(_)
            | DrawOp::Arc(_)
            | DrawOp::ArcTo(_)
            | DrawOp::QuadraticCurveTo(_)
            | DrawOp::BezierCurveTo(_)
            | DrawOp::Rect(_)
            | DrawOp::ClosePath => self.path_len += 1,
            _ => self.state.assign(op),
        }

        trace!(op = op.kind().name(), "Applied");
        self.history.push(op.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DrawKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_in_order() {
        let mut surface = RecordingSurface::new(800, 600);
        assert_eq!(surface.size(), (800, 600));

        for (kind, params) in [
            (DrawKind::BeginPath, json!({})),
            (DrawKind::MoveTo, json!({"x": 0, "y": 0})),
            (DrawKind::LineTo, json!({"x": 10, "y": 10})),
            (DrawKind::Stroke, json!({})),
        ] {
            surface.apply(&kind.decode(params).unwrap()).await.unwrap();
        }

        let kinds: Vec<_> = surface.history().iter().map(|op| op.kind()).collect();
        assert_eq!(
            kinds,
            vec![DrawKind::BeginPath, DrawKind::MoveTo, DrawKind::LineTo, DrawKind::Stroke]
        );
        assert_eq!(surface.path_len(), 2);
    }

    #[tokio::test]
    async fn test_negative_radius_is_rejected() {
        let mut surface = RecordingSurface::new(10, 10);
        let op = DrawKind::Arc
            .decode(json!({"x": 0, "y": 0, "radius": -1, "startAngle": 0, "endAngle": 1}))
            .unwrap();
        let err = surface.apply(&op).await.unwrap_err();
        assert!(matches!(err, SurfaceError::IndexSize(_)));
        assert!(surface.history().is_empty());
    }

    #[tokio::test]
    async fn test_state_setters_update_state() {
        let mut surface = RecordingSurface::new(10, 10);
        let op = DrawKind::SetStrokeStyle.decode(json!({"color": "#ff0000"})).unwrap();
        surface.apply(&op).await.unwrap();
        assert_eq!(surface.state().stroke_style, "#ff0000");

        surface.clear();
        assert!(surface.history().is_empty());
        assert_eq!(surface.state().stroke_style, "#ff0000");
    }
}
