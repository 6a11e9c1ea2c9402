// SPDX-License-Identifier: GPL-3.0-only

//! The layer-shell arranger (§4.3): a from-scratch two-pass layout that
//! walks the four per-output layer lists, first letting exclusive-zone
//! claimants reserve edge space, then fitting every remaining surface
//! (including those claimants) into whatever usable area is left.
//!
//! smithay ships `layer_map_for_output`/`LayerMap::arrange` with
//! equivalent behavior, but the surface describes a specific two-pass
//! algorithm (table of anchor combinations, explicit exclusive-zone
//! accounting) as part of the subsystem under test, so it is implemented
//! directly here rather than delegated to the built-in helper.

use std::cell::Cell;

use smithay::output::Output;
use smithay::utils::{Logical, Point, Rectangle, Size};
use smithay::wayland::shell::wlr_layer::{
    Anchor, ExclusiveZone, KeyboardInteractivity, LayerSurface as WlrLayerSurface,
};

use super::output::{Layer, OutputState, LAYERS_ARRANGE_ORDER};

pub struct LayerSurface {
    pub surface: WlrLayerSurface,
    pub namespace: String,
    geo: Cell<Rectangle<i32, Logical>>,
}

impl LayerSurface {
    pub fn new(surface: WlrLayerSurface, namespace: String) -> Self {
        Self {
            surface,
            namespace,
            geo: Cell::new(Rectangle::from_size((0, 0).into())),
        }
    }

    pub fn geo(&self) -> Rectangle<i32, Logical> {
        self.geo.get()
    }

    pub fn layer(&self) -> Layer {
        match self.surface.cached_state().layer {
            smithay::wayland::shell::wlr_layer::Layer::Background => Layer::Background,
            smithay::wayland::shell::wlr_layer::Layer::Bottom => Layer::Bottom,
            smithay::wayland::shell::wlr_layer::Layer::Top => Layer::Top,
            smithay::wayland::shell::wlr_layer::Layer::Overlay => Layer::Overlay,
        }
    }

    pub fn keyboard_interactive(&self) -> bool {
        !matches!(
            self.surface.cached_state().keyboard_interactivity,
            KeyboardInteractivity::None
        )
    }
}

/// Compute `geo` for every layer surface on `output` and shrink the
/// output's usable area accordingly. Returns `true` if any surface's
/// geometry changed (callers use this to decide whether to re-run
/// regular-view layout, even though this compositor has no tiling policy
/// of its own to re-run).
pub fn arrange_layers(output: &Output) -> bool {
    OutputState::install(output);
    let state = OutputState::get(output);

    let bounds = Rectangle::from_size(
        output
            .current_mode()
            .map(|m| m.size)
            .unwrap_or_default()
            .to_logical(1),
    );

    let mut usable = bounds;
    let mut changed = false;

    // Pass 1: exclusive-zone-claiming surfaces compute their geometry and
    // shrink `usable`.
    for layer in LAYERS_ARRANGE_ORDER {
        for surface in state.layer_list(layer).borrow().iter() {
            let cached = surface.surface.cached_state();
            if !claims_exclusive_zone(&cached.exclusive_zone) {
                continue;
            }
            let rect = compute_rect(bounds, &cached);
            if close_if_degenerate(surface, rect) {
                continue;
            }
            if surface.geo.get() != rect {
                changed = true;
            }
            surface.geo.set(rect);
            surface.surface.send_configure();

            if let ExclusiveZone::Exclusive(px) = cached.exclusive_zone {
                usable = shrink_by_exclusive_zone(usable, cached.anchor, px as i32);
            }
        }
    }

    // Pass 2: every remaining (non-claiming) surface is laid out against
    // the now-final usable area.
    for layer in LAYERS_ARRANGE_ORDER {
        for surface in state.layer_list(layer).borrow().iter() {
            let cached = surface.surface.cached_state();
            if claims_exclusive_zone(&cached.exclusive_zone) {
                continue;
            }
            let rect = compute_rect(usable, &cached);
            if close_if_degenerate(surface, rect) {
                continue;
            }
            if surface.geo.get() != rect {
                changed = true;
            }
            surface.geo.set(rect);
            surface.surface.send_configure();
        }
    }

    *state.usable_area.borrow_mut() = usable;

    changed
}

fn claims_exclusive_zone(zone: &ExclusiveZone) -> bool {
    matches!(zone, ExclusiveZone::Exclusive(px) if *px > 0)
}

/// Surfaces with a non-positive computed size are closed rather than
/// rendered (§4.3).
fn close_if_degenerate(surface: &LayerSurface, rect: Rectangle<i32, Logical>) -> bool {
    if rect.size.w <= 0 || rect.size.h <= 0 {
        tracing::warn!(
            namespace = %surface.namespace,
            ?rect,
            "layer surface computed non-positive geometry, closing"
        );
        surface.surface.send_close();
        true
    } else {
        false
    }
}

/// The four-sided margin of a layer surface, lifted out of smithay's cached
/// protocol state so the anchor/margin geometry math below is a pure
/// function of plain data and can be exercised directly in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margin {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

fn compute_rect(
    bounds: Rectangle<i32, Logical>,
    cached: &smithay::wayland::shell::wlr_layer::LayerSurfaceCachedState,
) -> Rectangle<i32, Logical> {
    let margin = Margin {
        left: cached.margin.left,
        right: cached.margin.right,
        top: cached.margin.top,
        bottom: cached.margin.bottom,
    };
    layout_rect(bounds, cached.anchor, margin, cached.size)
}

/// Pure anchor/margin layout per §4.3's table: compute a rectangle from an
/// anchor mask and desired size within `bounds`, then apply margins.
fn layout_rect(
    bounds: Rectangle<i32, Logical>,
    anchor: Anchor,
    margin: Margin,
    desired: Size<i32, Logical>,
) -> Rectangle<i32, Logical> {
    let horiz_both = anchor.contains(Anchor::LEFT) && anchor.contains(Anchor::RIGHT);
    let vert_both = anchor.contains(Anchor::TOP) && anchor.contains(Anchor::BOTTOM);

    let (x, width) = if horiz_both && desired.w == 0 {
        (bounds.loc.x, bounds.size.w)
    } else if anchor.contains(Anchor::LEFT) && !anchor.contains(Anchor::RIGHT) {
        (bounds.loc.x, if desired.w > 0 { desired.w } else { bounds.size.w })
    } else if anchor.contains(Anchor::RIGHT) && !anchor.contains(Anchor::LEFT) {
        let w = if desired.w > 0 { desired.w } else { bounds.size.w };
        (bounds.loc.x + bounds.size.w - w, w)
    } else {
        let w = if desired.w > 0 { desired.w } else { bounds.size.w };
        (bounds.loc.x + (bounds.size.w - w) / 2, w)
    };

    let (y, height) = if vert_both && desired.h == 0 {
        (bounds.loc.y, bounds.size.h)
    } else if anchor.contains(Anchor::TOP) && !anchor.contains(Anchor::BOTTOM) {
        (bounds.loc.y, if desired.h > 0 { desired.h } else { bounds.size.h })
    } else if anchor.contains(Anchor::BOTTOM) && !anchor.contains(Anchor::TOP) {
        let h = if desired.h > 0 { desired.h } else { bounds.size.h };
        (bounds.loc.y + bounds.size.h - h, h)
    } else {
        let h = if desired.h > 0 { desired.h } else { bounds.size.h };
        (bounds.loc.y + (bounds.size.h - h) / 2, h)
    };

    let mut rect = Rectangle::new(Point::from((x, y)), Size::from((width, height)));

    // Margins: on an axis with both anchors, both margins shrink the
    // rectangle; with a single anchor, only that side's margin shifts it.
    if horiz_both {
        rect.loc.x += margin.left;
        rect.size.w -= margin.left + margin.right;
    } else if anchor.contains(Anchor::LEFT) {
        rect.loc.x += margin.left;
    } else if anchor.contains(Anchor::RIGHT) {
        rect.loc.x -= margin.right;
    }

    if vert_both {
        rect.loc.y += margin.top;
        rect.size.h -= margin.top + margin.bottom;
    } else if anchor.contains(Anchor::TOP) {
        rect.loc.y += margin.top;
    } else if anchor.contains(Anchor::BOTTOM) {
        rect.loc.y -= margin.bottom;
    }

    rect
}

fn shrink_by_exclusive_zone(
    usable: Rectangle<i32, Logical>,
    anchor: Anchor,
    px: i32,
) -> Rectangle<i32, Logical> {
    // The anchored edge an exclusive zone reserves against is whichever of
    // the two axes is anchored to exactly one side (e.g. a full-width bar
    // anchored TOP|LEFT|RIGHT reserves against TOP, its one asymmetric
    // anchor; LEFT+RIGHT together just span the width and claim no edge).
    // An axis anchored to both or neither sides claims no edge.
    let vertical_edge = if anchor.contains(Anchor::TOP) != anchor.contains(Anchor::BOTTOM) {
        if anchor.contains(Anchor::TOP) {
            Some(Anchor::TOP)
        } else {
            Some(Anchor::BOTTOM)
        }
    } else {
        None
    };
    let horizontal_edge = if anchor.contains(Anchor::LEFT) != anchor.contains(Anchor::RIGHT) {
        if anchor.contains(Anchor::LEFT) {
            Some(Anchor::LEFT)
        } else {
            Some(Anchor::RIGHT)
        }
    } else {
        None
    };
    let single_edge = vertical_edge.or(horizontal_edge);

    match single_edge {
        Some(Anchor::TOP) => Rectangle::new(
            Point::from((usable.loc.x, usable.loc.y + px)),
            Size::from((usable.size.w, usable.size.h - px)),
        ),
        Some(Anchor::BOTTOM) => Rectangle::new(
            usable.loc,
            Size::from((usable.size.w, usable.size.h - px)),
        ),
        Some(Anchor::LEFT) => Rectangle::new(
            Point::from((usable.loc.x + px, usable.loc.y)),
            Size::from((usable.size.w - px, usable.size.h)),
        ),
        Some(Anchor::RIGHT) => Rectangle::new(
            usable.loc,
            Size::from((usable.size.w - px, usable.size.h)),
        ),
        // An anchor combination spanning more than one edge (or none) does
        // not have a single side to reserve against; leave usable area
        // untouched rather than guess.
        _ => usable,
    }
}

/// After arrangement, the topmost surface in {overlay, top} with
/// keyboard-interactive set should capture keyboard focus (§4.3).
pub fn topmost_keyboard_interactive(output: &Output) -> Option<LayerSurface>
where
{
    let state = OutputState::get(output);
    for layer in [Layer::Overlay, Layer::Top] {
        if let Some(surface) = state
            .layer_list(layer)
            .borrow()
            .iter()
            .rev()
            .find(|s| s.keyboard_interactive())
        {
            return Some(LayerSurface {
                surface: surface.surface.clone(),
                namespace: surface.namespace.clone(),
                geo: Cell::new(surface.geo.get()),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S3: an 800x600 output, a bar anchored TOP|LEFT|RIGHT with desired
    /// height 30 and exclusive-zone 30 spans the full width at the top;
    /// a non-exclusive bottom-anchored surface with desired size 800x0
    /// then fills the remaining usable area.
    #[test]
    fn exclusive_bar_then_filling_surface() {
        let bounds = Rectangle::new(Point::from((0, 0)), Size::from((800, 600)));

        let bar_anchor = Anchor::TOP | Anchor::LEFT | Anchor::RIGHT;
        let bar_rect = layout_rect(bounds, bar_anchor, Margin::default(), Size::from((0, 30)));
        assert_eq!(bar_rect, Rectangle::new(Point::from((0, 0)), Size::from((800, 30))));

        let usable = shrink_by_exclusive_zone(bounds, bar_anchor, 30);
        assert_eq!(usable, Rectangle::new(Point::from((0, 30)), Size::from((800, 570))));

        let fill_anchor = Anchor::TOP | Anchor::LEFT | Anchor::RIGHT | Anchor::BOTTOM;
        let fill_rect = layout_rect(usable, fill_anchor, Margin::default(), Size::from((800, 0)));
        assert_eq!(fill_rect, usable);
    }

    #[test]
    fn single_anchor_left_aligned_desired_size() {
        let bounds = Rectangle::new(Point::from((0, 0)), Size::from((800, 600)));
        let rect = layout_rect(bounds, Anchor::LEFT, Margin::default(), Size::from((200, 100)));
        assert_eq!(rect, Rectangle::new(Point::from((0, 0)), Size::from((200, 100))));
    }

    #[test]
    fn no_anchor_centers() {
        let bounds = Rectangle::new(Point::from((0, 0)), Size::from((800, 600)));
        let rect = layout_rect(bounds, Anchor::empty(), Margin::default(), Size::from((200, 100)));
        assert_eq!(rect.loc, Point::from((300, 250)));
        assert_eq!(rect.size, Size::from((200, 100)));
    }

    #[test]
    fn margin_on_both_anchored_axis_shrinks_both_sides() {
        let bounds = Rectangle::new(Point::from((0, 0)), Size::from((800, 600)));
        let margin = Margin { left: 10, right: 20, top: 0, bottom: 0 };
        let rect = layout_rect(
            bounds,
            Anchor::LEFT | Anchor::RIGHT,
            margin,
            Size::from((0, 100)),
        );
        assert_eq!(rect.loc.x, 10);
        assert_eq!(rect.size.w, 800 - 10 - 20);
    }

    #[test]
    fn exclusive_zone_with_ambiguous_anchor_leaves_usable_untouched() {
        let bounds = Rectangle::new(Point::from((0, 0)), Size::from((800, 600)));
        let usable = shrink_by_exclusive_zone(bounds, Anchor::LEFT | Anchor::RIGHT, 30);
        assert_eq!(usable, bounds);
    }
}
