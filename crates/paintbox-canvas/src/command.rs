//! Drawing primitives callable by the peer, with typed parameters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::surface::SurfaceState;

/// Params did not match the shape a primitive declares.
#[derive(Debug, Error)]
#[error("invalid params for {command}: {source}")]
pub struct ParamsError {
    pub command: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// The closed set of drawing primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawKind {
    FillRect,
    StrokeRect,
    ClearRect,
    BeginPath,
    ClosePath,
    Stroke,
    Fill,
    MoveTo,
    LineTo,
    Arc,
    ArcTo,
    QuadraticCurveTo,
    BezierCurveTo,
    Rect,
    SetFillStyle,
    SetStrokeStyle,
    SetGlobalAlpha,
    SetLineWidth,
    SetLineCap,
    SetLineJoin,
    SetMiterLimit,
    SetShadowOffsetX,
    SetShadowOffsetY,
    SetShadowBlur,
    SetShadowColor,
    FillText,
    StrokeText,
    SetFont,
    SetTextAlign,
    SetTextBaseline,
    SetTextDirection,
}

impl DrawKind {
    pub const ALL: [DrawKind; 31] = [
        Self::FillRect,
        Self::StrokeRect,
        Self::ClearRect,
        Self::BeginPath,
        Self::ClosePath,
        Self::Stroke,
        Self::Fill,
        Self::MoveTo,
        Self::LineTo,
        Self::Arc,
        Self::ArcTo,
        Self::QuadraticCurveTo,
        Self::BezierCurveTo,
        Self::Rect,
        Self::SetFillStyle,
        Self::SetStrokeStyle,
        Self::SetGlobalAlpha,
        Self::SetLineWidth,
        Self::SetLineCap,
        Self::SetLineJoin,
        Self::SetMiterLimit,
        Self::SetShadowOffsetX,
        Self::SetShadowOffsetY,
        Self::SetShadowBlur,
        Self::SetShadowColor,
        Self::FillText,
        Self::StrokeText,
        Self::SetFont,
        Self::SetTextAlign,
        Self::SetTextBaseline,
        Self::SetTextDirection,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::FillRect => "fillRect",
            Self::StrokeRect => "strokeRect",
            Self::ClearRect => "clearRect",
            Self::BeginPath => "beginPath",
            Self::ClosePath => "closePath",
            Self::Stroke => "stroke",
            Self::Fill => "fill",
            Self::MoveTo => "moveTo",
            Self::LineTo => "lineTo",
            Self::Arc => "arc",
            Self::ArcTo => "arcTo",
            Self::QuadraticCurveTo => "quadraticCurveTo",
            Self::BezierCurveTo => "bezierCurveTo",
            Self::Rect => "rect",
            Self::SetFillStyle => "setFillStyle",
            Self::SetStrokeStyle => "setStrokeStyle",
            Self::SetGlobalAlpha => "setGlobalAlpha",
            Self::SetLineWidth => "setLineWidth",
            Self::SetLineCap => "setLineCap",
            Self::SetLineJoin => "setLineJoin",
            Self::SetMiterLimit => "setMiterLimit",
            Self::SetShadowOffsetX => "setShadowOffsetX",
            Self::SetShadowOffsetY => "setShadowOffsetY",
            Self::SetShadowBlur => "setShadowBlur",
            Self::SetShadowColor => "setShadowColor",
            Self::FillText => "fillText",
            Self::StrokeText => "strokeText",
            Self::SetFont => "setFont",
            Self::SetTextAlign => "setTextAlign",
            Self::SetTextBaseline => "setTextBaseline",
            Self::SetTextDirection => "setTextDirection",
        }
    }

    /// Decode `params` into the typed operation. Primitives without
    /// parameters ignore whatever was sent.
    pub fn decode(self, params: Value) -> Result<DrawOp, ParamsError> {
        let command = self.name();
        let err = |source| ParamsError { command, source };

        Ok(match self {
            Self::FillRect => DrawOp::FillRect(from(params).map_err(err)?),
            Self::StrokeRect => DrawOp::StrokeRect(from(params).map_err(err)?),
            Self::ClearRect => DrawOp::ClearRect(from(params).map_err(err)?),
            Self::BeginPath => DrawOp::BeginPath,
            Self::ClosePath => DrawOp::ClosePath,
            Self::Stroke => DrawOp::Stroke,
            Self::Fill => DrawOp::Fill,
            Self::MoveTo => DrawOp::MoveTo(from(params).map_err(err)?),
            Self::LineTo => DrawOp::LineTo(from(params).map_err(err)?),
            Self::Arc => DrawOp::Arc(from(params).map_err(err)?),
            Self::ArcTo => DrawOp::ArcTo(from(params).map_err(err)?),
            Self::QuadraticCurveTo => DrawOp::QuadraticCurveTo(from(params).map_err(err)?),
            Self::BezierCurveTo => DrawOp::BezierCurveTo(from(params).map_err(err)?),
            Self::Rect => DrawOp::Rect(from(params).map_err(err)?),
            Self::SetFillStyle => DrawOp::SetFillStyle(from(params).map_err(err)?),
            Self::SetStrokeStyle => DrawOp::SetStrokeStyle(from(params).map_err(err)?),
            Self::SetGlobalAlpha => DrawOp::SetGlobalAlpha(from(params).map_err(err)?),
            Self::SetLineWidth => DrawOp::SetLineWidth(from(params).map_err(err)?),
            Self::SetLineCap => DrawOp::SetLineCap(from(params).map_err(err)?),
            Self::SetLineJoin => DrawOp::SetLineJoin(from(params).map_err(err)?),
            Self::SetMiterLimit => DrawOp::SetMiterLimit(from(params).map_err(err)?),
            Self::SetShadowOffsetX => DrawOp::SetShadowOffsetX(from(params).map_err(err)?),
            Self::SetShadowOffsetY => DrawOp::SetShadowOffsetY(from(params).map_err(err)?),
            Self::SetShadowBlur => DrawOp::SetShadowBlur(from(params).map_err(err)?),
            Self::SetShadowColor => DrawOp::SetShadowColor(from(params).map_err(err)?),
            Self::FillText => DrawOp::FillText(from(params).map_err(err)?),
            Self::StrokeText => DrawOp::StrokeText(from(params).map_err(err)?),
            Self::SetFont => DrawOp::SetFont(from(params).map_err(err)?),
            Self::SetTextAlign => DrawOp::SetTextAlign(from(params).map_err(err)?),
            Self::SetTextBaseline => DrawOp::SetTextBaseline(from(params).map_err(err)?),
            Self::SetTextDirection => DrawOp::SetTextDirection(from(params).map_err(err)?),
        })
    }
}

fn from<T: DeserializeOwned>(params: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(params)
}

/// A number as the peer expects to see it echoed: integral values without a
/// fractional part, non-finite values as `null`.
pub fn number(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectParams {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointParams {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcParams {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterclockwise: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcToParams {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticParams {
    pub cp1x: f64,
    pub cp1y: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierParams {
    pub cp1x: f64,
    pub cp1y: f64,
    pub cp2x: f64,
    pub cp2y: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaParams {
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineWidthParams {
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCapParams {
    pub cap: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineJoinParams {
    pub join: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiterLimitParams {
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowOffsetXParams {
    pub offset_x: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowOffsetYParams {
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowBlurParams {
    pub blur: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontParams {
    pub font: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAlignParams {
    pub align: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBaselineParams {
    pub baseline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionParams {
    pub direction: String,
}

/// One decoded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect(RectParams),
    StrokeRect(RectParams),
    ClearRect(RectParams),
    BeginPath,
    ClosePath,
    Stroke,
    Fill,
    MoveTo(PointParams),
    LineTo(PointParams),
    Arc(ArcParams),
    ArcTo(ArcToParams),
    QuadraticCurveTo(QuadraticParams),
    BezierCurveTo(BezierParams),
    Rect(RectParams),
    SetFillStyle(ColorParams),
    SetStrokeStyle(ColorParams),
    SetGlobalAlpha(AlphaParams),
    SetLineWidth(LineWidthParams),
    SetLineCap(LineCapParams),
    SetLineJoin(LineJoinParams),
    SetMiterLimit(MiterLimitParams),
    SetShadowOffsetX(ShadowOffsetXParams),
    SetShadowOffsetY(ShadowOffsetYParams),
    SetShadowBlur(ShadowBlurParams),
    SetShadowColor(ColorParams),
    FillText(TextParams),
    StrokeText(TextParams),
    SetFont(FontParams),
    SetTextAlign(TextAlignParams),
    SetTextBaseline(TextBaselineParams),
    SetTextDirection(DirectionParams),
}

impl DrawOp {
    pub fn kind(&self) -> DrawKind {
        match self {
            Self::FillRect(_) => DrawKind::FillRect,
            Self::StrokeRect(_) => DrawKind::StrokeRect,
            Self::ClearRect(_) => DrawKind::ClearRect,
            Self::BeginPath => DrawKind::BeginPath,
            Self::ClosePath => DrawKind::ClosePath,
            Self::Stroke => DrawKind::Stroke,
            Self::Fill => DrawKind::Fill,
            Self::MoveTo(_) => DrawKind::MoveTo,
            Self::LineTo(_) => DrawKind::LineTo,
            Self::Arc(_) => DrawKind::Arc,
            Self::ArcTo(_) => DrawKind::ArcTo,
            Self::QuadraticCurveTo(_) => DrawKind::QuadraticCurveTo,
            Self::BezierCurveTo(_) => DrawKind::BezierCurveTo,
            Self::Rect(_) => DrawKind::Rect,
            Self::SetFillStyle(_) => DrawKind::SetFillStyle,
            Self::SetStrokeStyle(_) => DrawKind::SetStrokeStyle,
            Self::SetGlobalAlpha(_) => DrawKind::SetGlobalAlpha,
            Self::SetLineWidth(_) => DrawKind::SetLineWidth,
            Self::SetLineCap(_) => DrawKind::SetLineCap,
            Self::SetLineJoin(_) => DrawKind::SetLineJoin,
            Self::SetMiterLimit(_) => DrawKind::SetMiterLimit,
            Self::SetShadowOffsetX(_) => DrawKind::SetShadowOffsetX,
            Self::SetShadowOffsetY(_) => DrawKind::SetShadowOffsetY,
            Self::SetShadowBlur(_) => DrawKind::SetShadowBlur,
            Self::SetShadowColor(_) => DrawKind::SetShadowColor,
            Self::FillText(_) => DrawKind::FillText,
            Self::StrokeText(_) => DrawKind::StrokeText,
            Self::SetFont(_) => DrawKind::SetFont,
            Self::SetTextAlign(_) => DrawKind::SetTextAlign,
            Self::SetTextBaseline(_) => DrawKind::SetTextBaseline,
            Self::SetTextDirection(_) => DrawKind::SetTextDirection,
        }
    }

    /// Success output for this operation, echoing the consumed fields.
    ///
    /// Line width, cap, join and miter limit report the surface's effective
    /// value after the assignment, so a rejected value shows the old one.
    pub fn echo(&self, state: &SurfaceState) -> Value {
        let mut out = Map::new();
        out.insert("success".into(), Value::Bool(true));
        let mut put = |key: &str, value: Value| {
            out.insert(key.to_string(), value);
        };

        match self {
            Self::FillRect(p) | Self::StrokeRect(p) | Self::ClearRect(p) | Self::Rect(p) => {
                put("x", number(p.x));
                put("y", number(p.y));
                put("width", number(p.width));
                put("height", number(p.height));
            }
            Self::BeginPath | Self::ClosePath | Self::Stroke | Self::Fill => {}
            Self::MoveTo(p) | Self::LineTo(p) => {
                put("x", number(p.x));
                put("y", number(p.y));
            }
            Self::Arc(p) => {
                put("x", number(p.x));
                put("y", number(p.y));
                put("radius", number(p.radius));
                put("startAngle", number(p.start_angle));
                put("endAngle", number(p.end_angle));
                if let Some(ccw) = p.counterclockwise {
                    put("counterclockwise", Value::Bool(ccw));
                }
            }
            Self::ArcTo(p) => {
                put("x1", number(p.x1));
                put("y1", number(p.y1));
                put("x2", number(p.x2));
                put("y2", number(p.y2));
                put("radius", number(p.radius));
            }
            Self::QuadraticCurveTo(p) => {
                put("cp1x", number(p.cp1x));
                put("cp1y", number(p.cp1y));
                put("x", number(p.x));
                put("y", number(p.y));
            }
            Self::BezierCurveTo(p) => {
                put("cp1x", number(p.cp1x));
                put("cp1y", number(p.cp1y));
                put("cp2x", number(p.cp2x));
                put("cp2y", number(p.cp2y));
                put("x", number(p.x));
                put("y", number(p.y));
            }
            Self::SetFillStyle(p) | Self::SetStrokeStyle(p) | Self::SetShadowColor(p) => {
                put("color", Value::String(p.color.clone()));
            }
            Self::SetGlobalAlpha(p) => put("alpha", number(p.alpha)),
            Self::SetLineWidth(_) => put("width", number(state.line_width)),
            Self::SetLineCap(_) => put("lineCap", state.line_cap.as_str().into()),
            Self::SetLineJoin(_) => put("lineJoin", state.line_join.as_str().into()),
            Self::SetMiterLimit(_) => put("miterLimit", number(state.miter_limit)),
            Self::SetShadowOffsetX(p) => put("offsetX", number(p.offset_x)),
            Self::SetShadowOffsetY(p) => put("offsetY", number(p.offset_y)),
            Self::SetShadowBlur(p) => put("blur", number(p.blur)),
            Self::FillText(p) | Self::StrokeText(p) => {
                put("text", Value::String(p.text.clone()));
                put("x", number(p.x));
                put("y", number(p.y));
            }
            Self::SetFont(p) => put("font", Value::String(p.font.clone())),
            Self::SetTextAlign(p) => put("align", Value::String(p.align.clone())),
            Self::SetTextBaseline(p) => put("baseline", Value::String(p.baseline.clone())),
            Self::SetTextDirection(p) => put("direction", Value::String(p.direction.clone())),
        }

        Value::Object(out)
    }
}
