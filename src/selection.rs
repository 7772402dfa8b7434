//! Region-selection geometry.
//!
//! One overlay window covers each monitor and works in local coordinates
//! (origin at the top-left of that monitor). Releases are translated by the
//! monitor's own origin into virtual-screen coordinates. Everything here is
//! independent of GTK so the drag rules can be exercised without a display.

use std::fmt;

/// Selections smaller than this in either axis are treated as accidental clicks.
pub const MIN_SELECTION_PX: i32 = 5;

/// Rectangle in virtual-screen coordinates: one monitor, or the union of
/// all of them. `left`/`top` may be negative when a monitor sits left of or
/// above the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualScreenRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl VirtualScreenRect {
    /// Union of monitor geometries given as `(x, y, width, height)`.
    pub fn union<I>(monitors: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i32, i32, i32, i32)>,
    {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for (x, y, w, h) in monitors {
            if w <= 0 || h <= 0 {
                continue;
            }
            let (l, t, r, b) = (x, y, x + w, y + h);
            bounds = Some(match bounds {
                None => (l, t, r, b),
                Some((bl, bt, br, bb)) => (bl.min(l), bt.min(t), br.max(r), bb.max(b)),
            });
        }
        bounds.map(|(l, t, r, b)| Self {
            left: l,
            top: t,
            width: r - l,
            height: b - t,
        })
    }
}

/// Absolute virtual-screen region with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {}) [{}x{}]",
            self.x1,
            self.y1,
            self.x2,
            self.y2,
            self.width(),
            self.height()
        )
    }
}

/// Why a selection ended without a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    TooSmall,
    Canceled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::TooSmall => write!(f, "Selection too small."),
            CancelReason::Canceled => write!(f, "Selection canceled."),
        }
    }
}

/// Rubber-band state of one drag gesture, in local coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionDrag {
    anchor: Option<(i32, i32)>,
    current: (i32, i32),
}

impl SelectionDrag {
    pub fn press(&mut self, x: i32, y: i32) {
        self.anchor = Some((x, y));
        self.current = (x, y);
    }

    /// Track the pointer. Ignored until a press has anchored the rectangle.
    pub fn motion(&mut self, x: i32, y: i32) {
        if self.anchor.is_some() {
            self.current = (x, y);
        }
    }

    /// Rectangle to draw as `(x, y, width, height)`.
    pub fn rect(&self) -> Option<(i32, i32, i32, i32)> {
        let (ax, ay) = self.anchor?;
        let (cx, cy) = self.current;
        Some((ax.min(cx), ay.min(cy), (ax - cx).abs(), (ay - cy).abs()))
    }

    /// Finish the gesture at `(x, y)` and translate by the origin of `area`,
    /// the region the overlay window covers, into absolute coordinates.
    /// A release without a press counts as a zero-size selection.
    pub fn release(
        &mut self,
        x: i32,
        y: i32,
        area: &VirtualScreenRect,
    ) -> Result<BoundingBox, CancelReason> {
        let (ax, ay) = self.anchor.take().unwrap_or((x, y));
        self.current = (x, y);

        let (x1, x2) = (ax.min(x), ax.max(x));
        let (y1, y2) = (ay.min(y), ay.max(y));

        if x2 - x1 < MIN_SELECTION_PX || y2 - y1 < MIN_SELECTION_PX {
            return Err(CancelReason::TooSmall);
        }

        Ok(BoundingBox {
            x1: x1 + area.left,
            y1: y1 + area.top,
            x2: x2 + area.left,
            y2: y2 + area.top,
        })
    }
}

type CompleteFn = Box<dyn FnOnce(BoundingBox)>;
type CancelFn = Box<dyn FnOnce(CancelReason)>;

/// Completion/cancellation pair shared by all overlay windows of one
/// selection. Whichever fires first consumes both, so exactly one callback
/// runs, exactly once.
pub struct SelectionCallbacks {
    inner: Option<(CompleteFn, CancelFn)>,
}

impl SelectionCallbacks {
    pub fn new<C, X>(on_complete: C, on_cancel: X) -> Self
    where
        C: FnOnce(BoundingBox) + 'static,
        X: FnOnce(CancelReason) + 'static,
    {
        Self {
            inner: Some((Box::new(on_complete), Box::new(on_cancel))),
        }
    }

    /// Split off the completion callback, dropping the cancel side.
    pub fn take_complete(&mut self) -> Option<CompleteFn> {
        self.inner.take().map(|(complete, _)| complete)
    }

    pub fn cancel(&mut self, reason: CancelReason) {
        if let Some((_, cancel)) = self.inner.take() {
            cancel(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PRIMARY: VirtualScreenRect = VirtualScreenRect {
        left: 0,
        top: 0,
        width: 1920,
        height: 1080,
    };

    fn drag(from: (i32, i32), to: (i32, i32), area: &VirtualScreenRect) -> Result<BoundingBox, CancelReason> {
        let mut d = SelectionDrag::default();
        d.press(from.0, from.1);
        d.motion((from.0 + to.0) / 2, (from.1 + to.1) / 2);
        d.release(to.0, to.1, area)
    }

    /// Route a release result the way the overlay does.
    fn settle(callbacks: &mut SelectionCallbacks, result: Result<BoundingBox, CancelReason>) {
        match result {
            Ok(bbox) => {
                if let Some(complete) = callbacks.take_complete() {
                    complete(bbox);
                }
            }
            Err(reason) => callbacks.cancel(reason),
        }
    }

    #[test]
    fn tiny_drag_is_too_small() {
        assert_eq!(drag((100, 100), (103, 101), &PRIMARY), Err(CancelReason::TooSmall));
    }

    #[test]
    fn small_in_one_axis_is_too_small() {
        assert_eq!(drag((0, 0), (400, 4), &PRIMARY), Err(CancelReason::TooSmall));
        assert_eq!(drag((0, 0), (4, 400), &PRIMARY), Err(CancelReason::TooSmall));
    }

    #[test]
    fn exactly_minimum_extent_is_accepted() {
        let bbox = drag((10, 10), (15, 15), &PRIMARY).unwrap();
        assert_eq!((bbox.width(), bbox.height()), (5, 5));
    }

    #[test]
    fn drag_normalizes_corners() {
        let expected = BoundingBox { x1: 50, y1: 50, x2: 250, y2: 300 };
        assert_eq!(drag((50, 50), (250, 300), &PRIMARY), Ok(expected));
        assert_eq!(drag((250, 300), (50, 50), &PRIMARY), Ok(expected));
        assert_eq!(drag((250, 50), (50, 300), &PRIMARY), Ok(expected));
    }

    #[test]
    fn translates_by_negative_origin() {
        let left_monitor = VirtualScreenRect { left: -1280, top: -200, width: 1280, height: 1024 };
        let bbox = drag((300, 40), (100, 500), &left_monitor).unwrap();
        assert_eq!(bbox, BoundingBox { x1: -1180, y1: -160, x2: -980, y2: 300 });
    }

    #[test]
    fn each_monitor_translates_by_its_own_origin() {
        let monitors = [
            VirtualScreenRect { left: 0, top: 0, width: 1920, height: 1080 },
            VirtualScreenRect { left: 1920, top: 0, width: 1920, height: 1080 },
        ];
        let union = VirtualScreenRect::union(
            monitors.iter().map(|m| (m.left, m.top, m.width, m.height)),
        )
        .unwrap();
        assert_eq!(union.left, 0);

        // Same local drag on the second monitor lands on the second monitor.
        let on_second = drag((10, 10), (300, 200), &monitors[1]).unwrap();
        assert_eq!(on_second, BoundingBox { x1: 1930, y1: 10, x2: 2220, y2: 200 });
        let on_first = drag((10, 10), (300, 200), &monitors[0]).unwrap();
        assert_eq!(on_first, BoundingBox { x1: 10, y1: 10, x2: 300, y2: 200 });
    }

    #[test]
    fn drag_past_monitor_edge_keeps_absolute_position() {
        let right = VirtualScreenRect { left: 1920, top: 0, width: 1920, height: 1080 };
        // Pointer grab keeps reporting relative to the pressed window.
        let bbox = drag((20, 20), (-120, 80), &right).unwrap();
        assert_eq!(bbox, BoundingBox { x1: 1800, y1: 20, x2: 1940, y2: 80 });
    }

    #[test]
    fn release_without_press_is_too_small() {
        let mut d = SelectionDrag::default();
        d.motion(500, 500);
        assert_eq!(d.rect(), None);
        assert_eq!(d.release(500, 500, &PRIMARY), Err(CancelReason::TooSmall));
    }

    #[test]
    fn rect_tracks_pointer() {
        let mut d = SelectionDrag::default();
        d.press(200, 200);
        d.motion(150, 260);
        assert_eq!(d.rect(), Some((150, 200, 50, 60)));
    }

    #[test]
    fn union_covers_all_monitors() {
        let rect = VirtualScreenRect::union([(0, 0, 1920, 1080), (-1280, -200, 1280, 1024), (1920, 0, 2560, 1440)]);
        assert_eq!(
            rect,
            Some(VirtualScreenRect { left: -1280, top: -200, width: 5760, height: 1640 })
        );
        assert_eq!(VirtualScreenRect::union(std::iter::empty()), None);
    }

    #[test]
    fn cancel_messages() {
        assert_eq!(CancelReason::TooSmall.to_string(), "Selection too small.");
        assert_eq!(CancelReason::Canceled.to_string(), "Selection canceled.");
    }

    #[test]
    fn callbacks_fire_exactly_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let mut callbacks = SelectionCallbacks::new(
            move |bbox: BoundingBox| a.borrow_mut().push(format!("complete {}", bbox.x1)),
            move |reason: CancelReason| b.borrow_mut().push(format!("cancel {reason}")),
        );

        settle(&mut callbacks, Ok(BoundingBox { x1: 1, y1: 2, x2: 30, y2: 40 }));
        callbacks.cancel(CancelReason::Canceled);
        settle(&mut callbacks, Err(CancelReason::TooSmall));

        assert!(callbacks.take_complete().is_none());
        assert_eq!(*log.borrow(), vec!["complete 1".to_string()]);
    }

    #[test]
    fn too_small_never_completes() {
        let completed = Rc::new(RefCell::new(false));
        let canceled = Rc::new(RefCell::new(None));
        let (c, x) = (completed.clone(), canceled.clone());
        let mut callbacks = SelectionCallbacks::new(
            move |_| *c.borrow_mut() = true,
            move |reason| *x.borrow_mut() = Some(reason),
        );

        settle(&mut callbacks, drag((100, 100), (103, 101), &PRIMARY));
        assert!(callbacks.take_complete().is_none());

        assert!(!*completed.borrow());
        assert_eq!(*canceled.borrow(), Some(CancelReason::TooSmall));
    }
}
