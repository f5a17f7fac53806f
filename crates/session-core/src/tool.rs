//! Tool selection and the pointer routing it implies
//!
//! Exactly one tool is active at a time. Every selection recomputes the input
//! eligibility of every page's layers, so no page is ever left with a stale
//! mix from an earlier tool.

use crate::annotation::StampImage;
use crate::error::{SessionError, SessionResult};
use crate::page::{InputEligibility, OverlayMode, PageLayerSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    /// Drag existing annotations
    #[default]
    Cursor,
    /// Create and drag text boxes
    Text,
    /// Ink on the freehand layer
    Draw,
    /// Place the armed stamp image once
    Stamp,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Cursor, Tool::Text, Tool::Draw, Tool::Stamp];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Cursor => "cursor",
            Tool::Text => "text",
            Tool::Draw => "draw",
            Tool::Stamp => "stamp",
        }
    }

    /// Layer input eligibility while this tool is active
    pub fn input_eligibility(self) -> InputEligibility {
        match self {
            Tool::Cursor => InputEligibility { freehand: false, overlay: OverlayMode::DragOnly },
            Tool::Text | Tool::Stamp => {
                InputEligibility { freehand: false, overlay: OverlayMode::Create }
            }
            Tool::Draw => InputEligibility { freehand: true, overlay: OverlayMode::Disabled },
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cursor" | "select" => Ok(Tool::Cursor),
            "text" => Ok(Tool::Text),
            "draw" | "pen" => Ok(Tool::Draw),
            "stamp" | "image" => Ok(Tool::Stamp),
            _ => Err(SessionError::UnknownTool(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolStateMachine {
    active: Tool,
    pending_stamp: Option<StampImage>,
}

impl ToolStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Tool {
        self.active
    }

    pub fn pending_stamp(&self) -> Option<&StampImage> {
        self.pending_stamp.as_ref()
    }

    /// Activate `tool`. Selecting [`Tool::Stamp`] needs an armed image;
    /// switching to any other tool disarms it.
    pub fn select(&mut self, tool: Tool, pages: &mut [PageLayerSet]) -> SessionResult<()> {
        if tool == Tool::Stamp && self.pending_stamp.is_none() {
            return Err(SessionError::NoStampArmed);
        }
        if tool != Tool::Stamp {
            self.pending_stamp = None;
        }
        self.active = tool;
        self.apply_to(pages);
        tracing::debug!(tool = %tool, "tool selected");
        Ok(())
    }

    /// Arm a stamp for one placement and switch to [`Tool::Stamp`]
    pub fn arm_stamp(&mut self, image: StampImage, pages: &mut [PageLayerSet]) {
        let (width, height) = image.dimensions();
        self.pending_stamp = Some(image);
        self.active = Tool::Stamp;
        self.apply_to(pages);
        tracing::debug!(width, height, "stamp armed");
    }

    /// Hand out the armed stamp and revert to [`Tool::Cursor`]
    pub fn stamp_placed(&mut self, pages: &mut [PageLayerSet]) -> Option<StampImage> {
        let image = self.pending_stamp.take()?;
        self.active = Tool::Cursor;
        self.apply_to(pages);
        Some(image)
    }

    /// Recompute eligibility for every page from the active tool
    pub fn apply_to(&self, pages: &mut [PageLayerSet]) {
        let input = self.active.input_eligibility();
        for page in pages {
            page.set_input(input);
        }
    }
}
