// SPDX-License-Identifier: GPL-3.0-only

//! The composited application surface and its role-tagged dispatch.
//!
//! `View.role` is a tagged union over the two toplevel shell variants this
//! compositor accepts (the native xdg-shell toplevel and an X11-bridge
//! stand-in for Xwayland windows). Every role answers the same five
//! questions — `surface_at`, `main_surface`, `for_each_sub_surface`,
//! `set_activated`, `set_size` — and the view routes through the tag
//! rather than matching on role at every call site.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::utils::{IsAlive, Logical, Point, Rectangle, Serial};
use smithay::wayland::compositor::with_surface_tree_upward;
use smithay::wayland::shell::xdg::ToplevelSurface;

use crate::shell::cursor::ResizeEdge;
use crate::weak::WeakHandle;

/// Which shell protocol produced this view.
pub enum ViewRole {
    /// A toplevel created through `xdg_shell`.
    Xdg(ToplevelSurface),
    /// A window bridged in from Xwayland. No process/session wiring is
    /// implemented here; this variant exists so the role dispatch below
    /// stays exhaustive the way the design calls for, and so a real
    /// Xwayland integration has a slot to land in later.
    X11(X11Bridge),
}

/// Minimal placeholder for an X11-bridged window. A real implementation
/// would hold an `smithay::xwayland::X11Surface`; wiring up Xwayland's
/// process lifecycle and the X11 window manager protocol is a backend
/// concern out of scope here.
pub struct X11Bridge {
    pub surface: WlSurface,
    pub override_redirect: bool,
}

pub struct ViewInner {
    pub role: ViewRole,
    mapped: Cell<bool>,
    current: Cell<Rectangle<i32, Logical>>,
    pending: Cell<Rectangle<i32, Logical>>,
    pending_serial: Cell<Option<Serial>>,
    is_pending: Cell<bool>,
    /// Which edges the outstanding pending geometry was dragged from, so
    /// the commit-time alignment in §4.1 knows which corner to keep fixed.
    resize_edges: Cell<ResizeEdge>,
    /// The rectangle to restore on `unset_fullscreen`.
    saved_rect: Cell<Option<Rectangle<i32, Logical>>>,
    pub app_id: RefCell<Option<String>>,
    pub title: RefCell<Option<String>>,
}

/// A composited application surface, regardless of which shell created it.
///
/// Cheap to clone (an `Rc` bump); liveness is determined by whether the
/// underlying role's surface is still alive, following the same
/// `IsAlive`/`alive()` convention used throughout smithay.
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

pub type WeakView = WeakHandle<ViewInner>;

impl View {
    pub fn new_xdg(toplevel: ToplevelSurface) -> Self {
        View(Rc::new(ViewInner {
            role: ViewRole::Xdg(toplevel),
            mapped: Cell::new(false),
            current: Cell::new(Rectangle::from_size((0, 0).into())),
            pending: Cell::new(Rectangle::from_size((0, 0).into())),
            pending_serial: Cell::new(None),
            is_pending: Cell::new(false),
            resize_edges: Cell::new(ResizeEdge::empty()),
            saved_rect: Cell::new(None),
            app_id: RefCell::new(None),
            title: RefCell::new(None),
        }))
    }

    pub fn new_x11(surface: WlSurface, override_redirect: bool) -> Self {
        View(Rc::new(ViewInner {
            role: ViewRole::X11(X11Bridge { surface, override_redirect }),
            mapped: Cell::new(false),
            current: Cell::new(Rectangle::from_size((0, 0).into())),
            pending: Cell::new(Rectangle::from_size((0, 0).into())),
            pending_serial: Cell::new(None),
            is_pending: Cell::new(false),
            resize_edges: Cell::new(ResizeEdge::empty()),
            saved_rect: Cell::new(None),
            app_id: RefCell::new(None),
            title: RefCell::new(None),
        }))
    }

    pub fn downgrade(&self) -> WeakView {
        WeakHandle::from(&self.0)
    }

    pub fn from_rc(inner: Rc<ViewInner>) -> Self {
        View(inner)
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn mapped(&self) -> bool {
        self.0.mapped.get()
    }

    pub fn set_mapped(&self, mapped: bool) {
        self.0.mapped.set(mapped);
    }

    pub fn current(&self) -> Rectangle<i32, Logical> {
        self.0.current.get()
    }

    pub fn set_current(&self, rect: Rectangle<i32, Logical>) {
        self.0.current.set(rect);
    }

    pub fn pending(&self) -> Rectangle<i32, Logical> {
        self.0.pending.get()
    }

    pub fn set_pending(&self, rect: Rectangle<i32, Logical>) {
        self.0.pending.set(rect);
    }

    pub fn pending_serial(&self) -> Option<Serial> {
        self.0.pending_serial.get()
    }

    pub fn set_pending_serial(&self, serial: Option<Serial>) {
        self.0.pending_serial.set(serial);
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_pending.get()
    }

    pub fn set_is_pending(&self, pending: bool) {
        self.0.is_pending.set(pending);
    }

    pub fn resize_edges(&self) -> ResizeEdge {
        self.0.resize_edges.get()
    }

    pub fn set_resize_edges(&self, edges: ResizeEdge) {
        self.0.resize_edges.set(edges);
    }

    pub fn saved_rect(&self) -> Option<Rectangle<i32, Logical>> {
        self.0.saved_rect.get()
    }

    pub fn set_saved_rect(&self, rect: Option<Rectangle<i32, Logical>>) {
        self.0.saved_rect.set(rect);
    }

    /// The role-specific root surface used for protocol dispatch
    /// (`wl_surface.enter`, frame callbacks, etc).
    pub fn main_surface(&self) -> &WlSurface {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => toplevel.wl_surface(),
            ViewRole::X11(bridge) => &bridge.surface,
        }
    }

    /// Hit-test this view (including its sub-surface tree) at a point
    /// relative to the view's origin. Returns the hit surface and the
    /// point translated into that surface's local coordinates.
    pub fn surface_at(&self, point: Point<f64, Logical>) -> Option<(WlSurface, Point<f64, Logical>)> {
        let root = self.main_surface().clone();
        let mut result = None;
        with_surface_tree_upward(
            &root,
            Point::from((0, 0)),
            |_, _, location: &Point<i32, Logical>| {
                smithay::wayland::compositor::TraversalAction::DoChildren(*location)
            },
            |surface, states, location: &Point<i32, Logical>| {
                if result.is_some() {
                    return;
                }
                let size = smithay::backend::renderer::utils::with_renderer_surface_state(states, |state| {
                    state.surface_size()
                })
                .flatten();
                if let Some(size) = size {
                    let offset = location.to_f64();
                    let local = point - offset;
                    if local.x >= 0.0
                        && local.y >= 0.0
                        && local.x < size.w as f64
                        && local.y < size.h as f64
                    {
                        result = Some((surface.clone(), local));
                    }
                }
            },
            |_, _, _| true,
        );
        result
    }

    pub fn for_each_sub_surface(&self, mut f: impl FnMut(&WlSurface, Point<i32, Logical>)) {
        let root = self.main_surface().clone();
        with_surface_tree_upward(
            &root,
            Point::from((0, 0)),
            |_, _, location: &Point<i32, Logical>| {
                smithay::wayland::compositor::TraversalAction::DoChildren(*location)
            },
            |surface, _, location: &Point<i32, Logical>| {
                f(surface, *location);
            },
            |_, _, _| true,
        );
    }

    /// Deactivate/activate this view's toplevel decoration state. No-op
    /// for an override-redirect X11 bridge window.
    pub fn set_activated(&self, activated: bool) {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => {
                toplevel.with_pending_state(|state| {
                    if activated {
                        state.states.set(smithay::wayland::shell::xdg::ToplevelState::Activated);
                    } else {
                        state.states.unset(smithay::wayland::shell::xdg::ToplevelState::Activated);
                    }
                });
                if toplevel.is_initial_configure_sent() {
                    toplevel.send_configure();
                }
            }
            ViewRole::X11(_) => {}
        }
    }

    /// Request a new size from the client. Returns the configure serial
    /// for shells that track one (xdg-shell); `None` for shells that
    /// don't (the X11 bridge), per the geometry negotiation in §4.1.
    pub fn set_size(&self, size: smithay::utils::Size<i32, Logical>) -> Option<Serial> {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => {
                toplevel.with_pending_state(|state| {
                    state.size = Some(size);
                });
                Some(toplevel.send_configure())
            }
            ViewRole::X11(_) => None,
        }
    }

    pub fn get_size(&self) -> Option<smithay::utils::Size<i32, Logical>> {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => toplevel
                .current_state()
                .size
                .filter(|s| s.w > 0 && s.h > 0),
            ViewRole::X11(_) => None,
        }
    }

    pub fn send_close(&self) {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => toplevel.send_close(),
            ViewRole::X11(_) => {}
        }
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl IsAlive for View {
    fn alive(&self) -> bool {
        match &self.0.role {
            ViewRole::Xdg(toplevel) => toplevel.alive(),
            ViewRole::X11(bridge) => bridge.surface.alive(),
        }
    }
}
