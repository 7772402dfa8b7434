//! Pixel grab over a virtual-screen region, stitched across monitors.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use xcap::Monitor;

use crate::error::CaptureError;
use crate::selection::BoundingBox;

/// Source of screen pixels.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self, bbox: BoundingBox) -> Result<RgbaImage, CaptureError>;
}

/// Monitor geometry in logical virtual-screen coordinates, the space the
/// overlay reports selections in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorRect {
    /// Geometry as xcap reports it. macOS already reports logical points;
    /// elsewhere the values are device pixels and are divided by `scale`.
    fn from_device(x: i32, y: i32, width: u32, height: u32, scale: f32) -> Self {
        if cfg!(target_os = "macos") || scale.is_nan() || scale <= 1.0 {
            return Self { x, y, width, height };
        }
        let s = f64::from(scale);
        Self {
            x: (f64::from(x) / s).round() as i32,
            y: (f64::from(y) / s).round() as i32,
            width: (f64::from(width) / s).round() as u32,
            height: (f64::from(height) / s).round() as u32,
        }
    }

    /// Part of `bbox` that falls on this monitor.
    fn intersect(&self, bbox: &BoundingBox) -> Option<BoundingBox> {
        let x1 = bbox.x1.max(self.x);
        let y1 = bbox.y1.max(self.y);
        let x2 = bbox.x2.min(self.x + self.width as i32);
        let y2 = bbox.y2.min(self.y + self.height as i32);
        (x1 < x2 && y1 < y2).then_some(BoundingBox { x1, y1, x2, y2 })
    }
}

/// Grabs through `xcap`, capturing only the monitors the region touches.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapGrabber;

impl ScreenGrabber for XcapGrabber {
    fn grab(&self, bbox: BoundingBox) -> Result<RgbaImage, CaptureError> {
        if bbox.width() == 0 || bbox.height() == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        let monitors = Monitor::all().map_err(|e| CaptureError::Monitors(e.to_string()))?;
        let mut shots = Vec::new();

        for monitor in monitors {
            let name = monitor.name().unwrap_or_else(|_| "unknown".into());
            let rect = monitor_rect(&monitor).map_err(|reason| CaptureError::Grab {
                name: name.clone(),
                reason,
            })?;
            if rect.intersect(&bbox).is_none() {
                continue;
            }

            let image = monitor.capture_image().map_err(|e| CaptureError::Grab {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            log::debug!("Captured monitor {name} at {rect:?}");
            shots.push((rect, image));
        }

        compose(bbox, shots)
    }
}

fn monitor_rect(monitor: &Monitor) -> Result<MonitorRect, String> {
    Ok(MonitorRect::from_device(
        monitor.x().map_err(|e| e.to_string())?,
        monitor.y().map_err(|e| e.to_string())?,
        monitor.width().map_err(|e| e.to_string())?,
        monitor.height().map_err(|e| e.to_string())?,
        monitor.scale_factor().map_err(|e| e.to_string())?,
    ))
}

/// Device pixels per logical unit, measured from the captured image.
fn pixel_scale(rect: &MonitorRect, shot: &RgbaImage) -> f64 {
    if rect.width == 0 {
        return 1.0;
    }
    f64::from(shot.width()) / f64::from(rect.width)
}

fn scale_len(len: u32, scale: f64) -> u32 {
    ((f64::from(len) * scale).round() as u32).max(1)
}

fn scale_offset(offset: i32, scale: f64) -> i64 {
    (f64::from(offset) * scale).round() as i64
}

/// Paste the parts of each monitor image that fall inside `bbox` onto one
/// canvas. The canvas uses the densest pixel scale among the covered
/// monitors; pieces from lower-density monitors are resized up to it. Areas
/// no monitor covers stay transparent.
fn compose<I>(bbox: BoundingBox, shots: I) -> Result<RgbaImage, CaptureError>
where
    I: IntoIterator<Item = (MonitorRect, RgbaImage)>,
{
    let covered: Vec<(MonitorRect, BoundingBox, RgbaImage)> = shots
        .into_iter()
        .filter_map(|(rect, shot)| rect.intersect(&bbox).map(|part| (rect, part, shot)))
        .collect();
    if covered.is_empty() {
        return Err(CaptureError::NoMonitor {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
        });
    }

    let scale = covered
        .iter()
        .map(|(rect, _, shot)| pixel_scale(rect, shot))
        .fold(f64::MIN_POSITIVE, f64::max);
    let mut canvas = RgbaImage::new(scale_len(bbox.width(), scale), scale_len(bbox.height(), scale));

    for (rect, part, shot) in covered {
        let shot_scale = pixel_scale(&rect, &shot);
        let src_x = (scale_offset(part.x1 - rect.x, shot_scale).max(0) as u32).min(shot.width());
        let src_y = (scale_offset(part.y1 - rect.y, shot_scale).max(0) as u32).min(shot.height());
        let src_w = scale_len(part.width(), shot_scale).min(shot.width() - src_x);
        let src_h = scale_len(part.height(), shot_scale).min(shot.height() - src_y);
        if src_w == 0 || src_h == 0 {
            continue;
        }

        let mut piece = imageops::crop_imm(&shot, src_x, src_y, src_w, src_h).to_image();
        let target = (scale_len(part.width(), scale), scale_len(part.height(), scale));
        if piece.dimensions() != target {
            piece = imageops::resize(&piece, target.0, target.1, FilterType::Triangle);
        }
        imageops::replace(
            &mut canvas,
            &piece,
            scale_offset(part.x1 - bbox.x1, scale),
            scale_offset(part.y1 - bbox.y1, scale),
        );
    }

    Ok(canvas)
}
