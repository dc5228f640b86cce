//! The drawing context every primitive is applied to.

use async_trait::async_trait;
use thiserror::Error;

use crate::command::DrawOp;

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// A dimension argument was out of range, e.g. a negative radius.
    #[error("index size error: {0}")]
    IndexSize(String),

    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse a keyword. Matching is exact, as on a 2D canvas.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

keyword_enum!(LineCap {
    Butt => "butt",
    Round => "round",
    Square => "square",
});

keyword_enum!(LineJoin {
    Round => "round",
    Bevel => "bevel",
    Miter => "miter",
});

keyword_enum!(TextAlign {
    Start => "start",
    End => "end",
    Left => "left",
    Right => "right",
    Center => "center",
});

keyword_enum!(TextBaseline {
    Top => "top",
    Hanging => "hanging",
    Middle => "middle",
    Alphabetic => "alphabetic",
    Ideographic => "ideographic",
    Bottom => "bottom",
});

keyword_enum!(Direction {
    Ltr => "ltr",
    Rtl => "rtl",
    Inherit => "inherit",
});

/// Drawing state carried between primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    pub fill_style: String,
    pub stroke_style: String,
    pub global_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    pub shadow_blur: f64,
    pub shadow_color: String,
    pub font: String,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub direction: Direction,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            fill_style: "#000000".into(),
            stroke_style: "#000000".into(),
            global_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            shadow_blur: 0.0,
            shadow_color: "rgba(0, 0, 0, 0)".into(),
            font: "10px sans-serif".into(),
            text_align: TextAlign::Start,
            text_baseline: TextBaseline::Alphabetic,
            direction: Direction::Inherit,
        }
    }
}

impl SurfaceState {
    /// Apply a state assignment. Values a 2D canvas would reject leave the
    /// previous value in place. Non-state operations are ignored.
    pub fn assign(&mut self, op: &DrawOp) {
        match op {
            DrawOp::SetFillStyle(p) if !p.color.is_empty() => self.fill_style = p.color.clone(),
            DrawOp::SetStrokeStyle(p) if !p.color.is_empty() => {
                self.stroke_style = p.color.clone()
            }
            DrawOp::SetShadowColor(p) if !p.color.is_empty() => {
                self.shadow_color = p.color.clone()
            }
            DrawOp::SetGlobalAlpha(p) if (0.0..=1.0).contains(&p.alpha) => {
                self.global_alpha = p.alpha
            }
            DrawOp::SetLineWidth(p) if positive(p.width) => self.line_width = p.width,
            DrawOp::SetMiterLimit(p) if positive(p.limit) => self.miter_limit = p.limit,
            DrawOp::SetLineCap(p) => {
                if let Some(cap) = LineCap::parse(&p.cap) {
                    self.line_cap = cap;
                }
            }
            DrawOp::SetLineJoin(p) => {
                if let Some(join) = LineJoin::parse(&p.join) {
                    self.line_join = join;
                }
            }
            DrawOp::SetShadowOffsetX(p) if p.offset_x.is_finite() => {
                self.shadow_offset_x = p.offset_x
            }
            DrawOp::SetShadowOffsetY(p) if p.offset_y.is_finite() => {
                self.shadow_offset_y = p.offset_y
            }
            DrawOp::SetShadowBlur(p) if p.blur.is_finite() && p.blur >= 0.0 => {
                self.shadow_blur = p.blur
            }
            DrawOp::SetFont(p) if !p.font.trim().is_empty() => self.font = p.font.clone(),
            DrawOp::SetTextAlign(p) => {
                if let Some(align) = TextAlign::parse(&p.align) {
                    self.text_align = align;
                }
            }
            DrawOp::SetTextBaseline(p) => {
                if let Some(baseline) = TextBaseline::parse(&p.baseline) {
                    self.text_baseline = baseline;
                }
            }
            DrawOp::SetTextDirection(p) => {
                if let Some(direction) = Direction::parse(&p.direction) {
                    self.direction = direction;
                }
            }
            _ => {}
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// A 2D drawing context owned by one dispatcher.
#[async_trait]
pub trait DrawingSurface: Send {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Current drawing state.
    fn state(&self) -> &SurfaceState;

    /// Perform one primitive.
    async fn apply(&mut self, op: &DrawOp) -> Result<(), SurfaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        AlphaParams, ColorParams, LineCapParams, LineJoinParams, LineWidthParams,
        MiterLimitParams, ShadowBlurParams, TextAlignParams,
    };

    #[test]
    fn test_defaults() {
        let state = SurfaceState::default();
        assert_eq!(state.fill_style, "#000000");
        assert_eq!(state.line_cap.as_str(), "butt");
        assert_eq!(state.line_join.as_str(), "miter");
        assert_eq!(state.miter_limit, 10.0);
        assert_eq!(state.font, "10px sans-serif");
        assert_eq!(state.direction, Direction::Inherit);
    }

    #[test]
    fn test_valid_assignments() {
        let mut state = SurfaceState::default();
        state.assign(&DrawOp::SetFillStyle(ColorParams { color: "red".into() }));
        state.assign(&DrawOp::SetGlobalAlpha(AlphaParams { alpha: 0.5 }));
        state.assign(&DrawOp::SetLineWidth(LineWidthParams { width: 3.0 }));
        state.assign(&DrawOp::SetLineJoin(LineJoinParams { join: "bevel".into() }));
        state.assign(&DrawOp::SetTextAlign(TextAlignParams { align: "center".into() }));

        assert_eq!(state.fill_style, "red");
        assert_eq!(state.global_alpha, 0.5);
        assert_eq!(state.line_width, 3.0);
        assert_eq!(state.line_join, LineJoin::Bevel);
        assert_eq!(state.text_align, TextAlign::Center);
    }

    #[test]
    fn test_invalid_assignments_keep_previous_value() {
        let mut state = SurfaceState::default();
        state.assign(&DrawOp::SetGlobalAlpha(AlphaParams { alpha: 1.5 }));
        state.assign(&DrawOp::SetLineWidth(LineWidthParams { width: 0.0 }));
        state.assign(&DrawOp::SetMiterLimit(MiterLimitParams { limit: f64::INFINITY }));
        state.assign(&DrawOp::SetLineCap(LineCapParams { cap: "ROUND".into() }));
        state.assign(&DrawOp::SetShadowBlur(ShadowBlurParams { blur: -1.0 }));

        assert_eq!(state, SurfaceState::default());
    }

    #[test]
    fn test_keyword_parse() {
        assert_eq!(LineCap::parse("square"), Some(LineCap::Square));
        assert_eq!(TextBaseline::parse("middle"), Some(TextBaseline::Middle));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
