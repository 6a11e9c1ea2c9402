// SPDX-License-Identifier: GPL-3.0-only

//! The cursor and interactive-grab state machine (§4.4).
//!
//! This is the *logical* cursor model: position, mode, grab record, and
//! image bookkeeping. Loading cursor theme images and turning them into
//! render elements is `crate::backend::render::cursor`; this module is
//! the state the input pipeline drives and the render pipeline reads.

use std::cell::{Cell, RefCell};

use bitflags::bitflags;
use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::shell::view::{View, WeakView};
use crate::utils::coordinates::GlobalPointF64;

bitflags! {
    /// Which edges of the view are being dragged during a resize.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeEdge: u32 {
        const TOP    = 0b0001;
        const BOTTOM = 0b0010;
        const LEFT   = 0b0100;
        const RIGHT  = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Passthrough,
    Move,
    Resize,
}

pub struct GrabRecord {
    pub view: WeakView,
    pub original_cursor_xy: Point<f64, Logical>,
    pub original_view_geo: Rectangle<i32, Logical>,
    pub resize_edges: ResizeEdge,
}

/// The singleton cursor state described in §3: logical pointer position,
/// the compositor- and client-requested images, the fallback default, the
/// software-cursor lock used by the mousegrabber protocol, and the
/// interactive grab record.
pub struct Cursor {
    position: Cell<Point<f64, Logical>>,
    mode: Cell<CursorMode>,
    grab: RefCell<Option<GrabRecord>>,
    compositor_image: RefCell<Option<String>>,
    client_image: RefCell<Option<smithay::reexports::wayland_server::protocol::wl_surface::WlSurface>>,
    default_image: RefCell<String>,
    lock_software_cursors: Cell<bool>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            // Start off-screen so nothing renders a cursor until the
            // first motion event places it over a real output.
            position: Cell::new(Point::from((-1.0, -1.0))),
            mode: Cell::new(CursorMode::Passthrough),
            grab: RefCell::new(None),
            compositor_image: RefCell::new(None),
            client_image: RefCell::new(None),
            default_image: RefCell::new("default".to_string()),
            lock_software_cursors: Cell::new(false),
        }
    }
}

impl Cursor {
    pub fn position(&self) -> Point<f64, Logical> {
        self.position.get()
    }

    pub fn position_typed(&self) -> GlobalPointF64 {
        GlobalPointF64(self.position.get())
    }

    pub fn set_position(&self, position: Point<f64, Logical>) {
        self.position.set(position);
    }

    pub fn mode(&self) -> CursorMode {
        self.mode.get()
    }

    pub fn lock_software_cursors(&self) -> bool {
        self.lock_software_cursors.get()
    }

    pub fn set_lock_software_cursors(&self, lock: bool) {
        self.lock_software_cursors.set(lock);
    }

    /// The compositor-requested named image, if any. The full §4.4
    /// priority chain (compositor override, then client surface, then
    /// default) is assembled by the render pipeline's
    /// `cursor_image_status`, which falls through to [`Self::client_image`]
    /// and [`Self::default_image`] when this is `None`.
    pub fn effective_image_name(&self) -> Option<String> {
        self.compositor_image.borrow().clone()
    }

    pub fn set_compositor_image(&self, name: Option<String>) {
        *self.compositor_image.borrow_mut() = name;
    }

    pub fn client_image(
        &self,
    ) -> Option<smithay::reexports::wayland_server::protocol::wl_surface::WlSurface> {
        self.client_image.borrow().clone()
    }

    pub fn set_client_image(
        &self,
        image: Option<smithay::reexports::wayland_server::protocol::wl_surface::WlSurface>,
    ) {
        *self.client_image.borrow_mut() = image;
    }

    pub fn default_image(&self) -> String {
        self.default_image.borrow().clone()
    }

    pub fn set_default_image(&self, name: String) {
        *self.default_image.borrow_mut() = name;
    }

    /// Revert to the default cursor image, clearing any client request.
    /// Used in `Passthrough` when no surface is under the pointer (§4.4).
    pub fn revert_to_default(&self) {
        self.client_image.borrow_mut().take();
        let default = self.default_image();
        *self.compositor_image.borrow_mut() = Some(default);
    }

    pub fn start_move(&self, view: &View, cursor_xy: Point<f64, Logical>) {
        *self.grab.borrow_mut() = Some(GrabRecord {
            view: view.downgrade(),
            original_cursor_xy: cursor_xy,
            original_view_geo: view.current(),
            resize_edges: ResizeEdge::empty(),
        });
        self.mode.set(CursorMode::Move);
    }

    pub fn start_resize(&self, view: &View, cursor_xy: Point<f64, Logical>, edges: ResizeEdge) {
        *self.grab.borrow_mut() = Some(GrabRecord {
            view: view.downgrade(),
            original_cursor_xy: cursor_xy,
            original_view_geo: view.current(),
            resize_edges: edges,
        });
        self.mode.set(CursorMode::Resize);
    }

    /// Which edges the in-progress resize grab is dragging, or empty if no
    /// resize grab is active.
    pub fn grab_resize_edges(&self) -> ResizeEdge {
        self.grab
            .borrow()
            .as_ref()
            .map(|g| g.resize_edges)
            .unwrap_or(ResizeEdge::empty())
    }

    pub fn end_grab(&self) {
        self.grab.borrow_mut().take();
        self.mode.set(CursorMode::Passthrough);
    }

    /// Returns the live grabbed view, ending the grab (and returning to
    /// Passthrough) if it has been destroyed since the grab began.
    pub fn live_grabbed_view(&self) -> Option<View> {
        let view = {
            let grab = self.grab.borrow();
            grab.as_ref().and_then(|g| g.view.upgrade())
        };
        match view {
            Some(rc) => {
                let view = View::from_rc(rc);
                if smithay::utils::IsAlive::alive(&view) {
                    Some(view)
                } else {
                    self.end_grab();
                    None
                }
            }
            None => {
                if self.mode.get() != CursorMode::Passthrough {
                    self.end_grab();
                }
                None
            }
        }
    }

    /// New view geometry for a `Move` grab: position tracks the cursor
    /// delta from the grab's origin (§4.4).
    pub fn move_delta(&self, cursor_xy: Point<f64, Logical>) -> Option<Point<i32, Logical>> {
        let grab = self.grab.borrow();
        let grab = grab.as_ref()?;
        let delta = cursor_xy - grab.original_cursor_xy;
        Some(Point::from((
            grab.original_view_geo.loc.x + delta.x.round() as i32,
            grab.original_view_geo.loc.y + delta.y.round() as i32,
        )))
    }

    /// New view geometry for a `Resize` grab. Top/left edges shift the
    /// anchored corner and shrink the opposite dimension; right/bottom
    /// edges just grow. Degenerate (<1px) dimensions snap the anchored
    /// corner onto the shrunken rectangle so the view never inverts.
    pub fn resize_rect(&self, cursor_xy: Point<f64, Logical>) -> Option<Rectangle<i32, Logical>> {
        let grab = self.grab.borrow();
        let grab = grab.as_ref()?;
        let delta = cursor_xy - grab.original_cursor_xy;
        let orig = grab.original_view_geo;
        let edges = grab.resize_edges;

        let mut x = orig.loc.x;
        let mut y = orig.loc.y;
        let mut w = orig.size.w;
        let mut h = orig.size.h;

        if edges.contains(ResizeEdge::LEFT) {
            let dx = delta.x.round() as i32;
            x += dx;
            w -= dx;
        } else if edges.contains(ResizeEdge::RIGHT) {
            w += delta.x.round() as i32;
        }

        if edges.contains(ResizeEdge::TOP) {
            let dy = delta.y.round() as i32;
            y += dy;
            h -= dy;
        } else if edges.contains(ResizeEdge::BOTTOM) {
            h += delta.y.round() as i32;
        }

        if w < 1 {
            if edges.contains(ResizeEdge::LEFT) {
                x = orig.loc.x + orig.size.w - 1;
            }
            w = 1;
        }
        if h < 1 {
            if edges.contains(ResizeEdge::TOP) {
                y = orig.loc.y + orig.size.h - 1;
            }
            h = 1;
        }

        Some(Rectangle::new(Point::from((x, y)), Size::from((w, h))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_with_grab(
        original_cursor_xy: Point<f64, Logical>,
        original_view_geo: Rectangle<i32, Logical>,
        resize_edges: ResizeEdge,
    ) -> Cursor {
        let cursor = Cursor::default();
        *cursor.grab.borrow_mut() = Some(GrabRecord {
            view: WeakView::default(),
            original_cursor_xy,
            original_view_geo,
            resize_edges,
        });
        cursor
    }

    /// S1: view at (100,100) 400x300, grab origin (120,110). Motion to
    /// (520,410) moves the view to (500,400).
    #[test]
    fn move_delta_tracks_cursor_from_grab_origin() {
        let cursor = cursor_with_grab(
            Point::from((120.0, 110.0)),
            Rectangle::new(Point::from((100, 100)), Size::from((400, 300))),
            ResizeEdge::empty(),
        );
        cursor.mode.set(CursorMode::Move);

        let new_loc = cursor.move_delta(Point::from((520.0, 410.0))).unwrap();
        assert_eq!(new_loc, Point::from((500, 400)));
    }

    /// S2: view at (200,200) 400x300, resize from TOP|LEFT, grab origin at
    /// (200,200). Motion to (250,230) shrinks to 350x270 while keeping the
    /// bottom-right corner fixed at (600,500).
    #[test]
    fn resize_from_top_left_keeps_opposite_corner_fixed() {
        let cursor = cursor_with_grab(
            Point::from((200.0, 200.0)),
            Rectangle::new(Point::from((200, 200)), Size::from((400, 300))),
            ResizeEdge::TOP | ResizeEdge::LEFT,
        );
        cursor.mode.set(CursorMode::Resize);

        let rect = cursor.resize_rect(Point::from((250.0, 230.0))).unwrap();
        assert_eq!(rect, Rectangle::new(Point::from((250, 230)), Size::from((350, 270))));
        assert_eq!(rect.loc.x + rect.size.w, 600);
        assert_eq!(rect.loc.y + rect.size.h, 500);
    }

    /// Shrinking past 1px on either axis snaps the anchored corner onto
    /// the clamped rectangle instead of inverting.
    #[test]
    fn resize_past_zero_snaps_instead_of_inverting() {
        let cursor = cursor_with_grab(
            Point::from((0.0, 0.0)),
            Rectangle::new(Point::from((0, 0)), Size::from((100, 100))),
            ResizeEdge::RIGHT | ResizeEdge::BOTTOM,
        );
        cursor.mode.set(CursorMode::Resize);

        let rect = cursor.resize_rect(Point::from((-200.0, -200.0))).unwrap();
        assert_eq!(rect.size, Size::from((1, 1)));
        assert_eq!(rect.loc, Point::from((0, 0)));
    }

    #[test]
    fn end_grab_returns_to_passthrough() {
        let cursor = cursor_with_grab(
            Point::from((0.0, 0.0)),
            Rectangle::new(Point::from((0, 0)), Size::from((100, 100))),
            ResizeEdge::empty(),
        );
        cursor.mode.set(CursorMode::Move);
        cursor.end_grab();
        assert_eq!(cursor.mode(), CursorMode::Passthrough);
        assert!(cursor.grab.borrow().is_none());
    }
}
