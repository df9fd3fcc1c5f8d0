use crate::{Color, Rect, Vec2};

/// Renderable scene: a flat list of draw commands in world coordinates.
///
/// This is everything a 2D host needs to draw a frame: filled and stroked
/// rounded rectangles, lines, text runs and a clip stack.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub clear_color: Color,
    pub nodes: Vec<SceneNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    Rect {
        rect: Rect,
        color: Color,
        radius: f32,
    },
    Border {
        rect: Rect,
        color: Color,
        width: f32,
        radius: f32,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: Color,
        width: f32,
    },
    /// Text centered inside `rect`.
    Text {
        rect: Rect,
        text: String,
        color: Color,
        size: f32,
    },
    PushClip {
        rect: Rect,
        radius: f32,
    },
    PopClip,
}

impl SceneNode {
    pub fn translated(&self, by: Vec2) -> SceneNode {
        match self {
            SceneNode::Rect { rect, color, radius } => SceneNode::Rect {
                rect: rect.translate(by),
                color: *color,
                radius: *radius,
            },
            SceneNode::Border {
                rect,
                color,
                width,
                radius,
            } => SceneNode::Border {
                rect: rect.translate(by),
                color: *color,
                width: *width,
                radius: *radius,
            },
            SceneNode::Line {
                from,
                to,
                color,
                width,
            } => SceneNode::Line {
                from: *from + by,
                to: *to + by,
                color: *color,
                width: *width,
            },
            SceneNode::Text {
                rect,
                text,
                color,
                size,
            } => SceneNode::Text {
                rect: rect.translate(by),
                text: text.clone(),
                color: *color,
                size: *size,
            },
            SceneNode::PushClip { rect, radius } => SceneNode::PushClip {
                rect: rect.translate(by),
                radius: *radius,
            },
            SceneNode::PopClip => SceneNode::PopClip,
        }
    }

    /// Area covered by the command, if it draws anything.
    pub fn extent(&self) -> Option<Rect> {
        match self {
            SceneNode::Rect { rect, .. } | SceneNode::Text { rect, .. } => Some(*rect),
            SceneNode::Border { rect, width, .. } => {
                let hw = width * 0.5;
                Some(Rect::new(rect.x - hw, rect.y - hw, rect.w + *width, rect.h + *width))
            }
            SceneNode::Line { from, to, width, .. } => {
                let hw = width * 0.5;
                let x = from.x.min(to.x) - hw;
                let y = from.y.min(to.y) - hw;
                Some(Rect::new(
                    x,
                    y,
                    (from.x - to.x).abs() + *width,
                    (from.y - to.y).abs() + *width,
                ))
            }
            SceneNode::PushClip { .. } | SceneNode::PopClip => None,
        }
    }
}
