use anyhow::{bail, Context, Result};
use doc_model::{FontFamily, Rgb};
use pdf_engine::PdfDecoder;
use serde::Deserialize;
use session_core::{
    Brush, PointerOutcome, Session, SessionController, StampImage, Tool, ViewportPoint,
};
use std::fs;
use std::path::{Path, PathBuf};

/// A recorded sequence of editor actions
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SelectTool { tool: String },
    Click { page: u32, x: f32, y: f32 },
    Type { text: String },
    Stroke { page: u32, points: Vec<[f32; 2]> },
    Drag { page: u32, from: [f32; 2], to: [f32; 2] },
    Stamp { image: PathBuf },
    Delete { page: u32, x: f32, y: f32 },
    SetScale { scale: f32 },
    SetFontSize { size: f32 },
    SetFontColor { color: Rgb },
    SetFont { family: String },
    SetBrush { color: Option<Rgb>, size: Option<f32> },
}

impl Script {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse script {}", path.display()))
    }
}

fn point([x, y]: [f32; 2]) -> ViewportPoint {
    ViewportPoint::new(x, y)
}

/// Replays `script` against the loaded session. Relative stamp paths resolve
/// against `base_dir`.
pub fn replay<D>(
    script: &Script,
    controller: &mut SessionController,
    decoder: &D,
    base_dir: &Path,
) -> Result<()>
where
    D: PdfDecoder + ?Sized,
{
    for (step, action) in script.actions.iter().enumerate() {
        apply(action, controller, decoder, base_dir)
            .with_context(|| format!("script step {} failed", step + 1))?;
    }
    Ok(())
}

fn apply<D>(
    action: &Action,
    controller: &mut SessionController,
    decoder: &D,
    base_dir: &Path,
) -> Result<()>
where
    D: PdfDecoder + ?Sized,
{
    if let Action::SetScale { scale } = action {
        controller.change_scale(decoder, *scale)?;
        return Ok(());
    }

    let session = controller.require_session()?;
    tracing::debug!(?action, "applying script action");
    match action {
        Action::SelectTool { tool } => session.select_tool(tool.parse::<Tool>()?)?,
        Action::Click { page, x, y } => {
            session.pointer_down(*page, ViewportPoint::new(*x, *y))?;
            session.pointer_up();
        }
        Action::Type { text } => session.edit_text(text.as_str())?,
        Action::Stroke { page, points } => stroke(session, *page, points)?,
        Action::Drag { page, from, to } => {
            session.pointer_down(*page, point(*from))?;
            session.pointer_move(point(*to))?;
            session.pointer_up();
        }
        Action::Stamp { image } => {
            let path = if image.is_absolute() { image.clone() } else { base_dir.join(image) };
            let bytes = fs::read(&path)
                .with_context(|| format!("failed to read stamp image {}", path.display()))?;
            session.arm_stamp(StampImage::from_bytes(bytes)?);
        }
        Action::Delete { page, x, y } => {
            let Some(id) = session.annotations().hit_test(*page, ViewportPoint::new(*x, *y))
            else {
                bail!("no annotation at ({x}, {y}) on page {page}");
            };
            session.delete_annotation(id)?;
        }
        Action::SetFontSize { size } => session.set_font_size(*size)?,
        Action::SetFontColor { color } => session.set_font_color(*color),
        Action::SetFont { family } => session.set_font_family(family.parse::<FontFamily>()?),
        Action::SetBrush { color, size } => {
            let current = session.style().brush;
            session.set_brush(Brush {
                color: color.unwrap_or(current.color),
                size: size.unwrap_or(current.size),
            })?;
        }
        Action::SetScale { .. } => {}
    }
    Ok(())
}

fn stroke(session: &mut Session, page: u32, points: &[[f32; 2]]) -> Result<()> {
    if session.tool() != Tool::Draw {
        bail!("stroke needs the draw tool; the active tool is {}", session.tool());
    }
    if points.is_empty() {
        bail!("stroke needs at least one point");
    }
    let samples: Vec<ViewportPoint> = points.iter().copied().map(point).collect();
    match session.apply_stroke(page, &samples)? {
        PointerOutcome::Inked => Ok(()),
        _ => bail!("stroke must start on page {page}"),
    }
}
