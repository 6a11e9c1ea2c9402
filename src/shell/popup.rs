// SPDX-License-Identifier: GPL-3.0-only

use smithay::{
    desktop::{get_popup_toplevel_coords, PopupKind},
    output::Output,
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Point, Rectangle, Size},
    wayland::shell::xdg::PopupSurface,
};

use super::output::{OutputState, LAYERS_BACK_TO_FRONT};
use super::Shell;
use crate::utils::coordinates::{GlobalPoint, GlobalRect, OutputRelativePoint};

impl Shell {
    /// The global-space location of whatever `parent` is: either a mapped
    /// view's main surface, or (per the layer-shell supplement) a layer
    /// surface's own arranged geometry on whichever output it's on.
    fn parent_location(&self, parent: &WlSurface) -> Option<(GlobalPoint, Option<Output>)> {
        if let Some(view) = self.views.borrow().iter().find(|v| v.main_surface() == parent).cloned() {
            let loc = GlobalPoint(view.current().loc);
            let output = self.output_at(loc.to_f64());
            return Some((loc, output));
        }

        for output in self.outputs.borrow().iter() {
            OutputState::install(output);
            let state = OutputState::get(output);
            for layer in LAYERS_BACK_TO_FRONT {
                if let Some(layer_surface) = state
                    .layer_list(layer)
                    .borrow()
                    .iter()
                    .find(|ls| ls.surface.wl_surface() == parent)
                {
                    let output_loc = GlobalPoint(output.current_location());
                    let loc = OutputRelativePoint(layer_surface.geo().loc).to_global(output_loc);
                    return Some((loc, Some(output.clone())));
                }
            }
        }

        None
    }

    /// Adjusts a popup's position so its unconstrained geometry fits
    /// within the output its parent (a view or, per the layer-shell
    /// supplement, a layer surface) is on.
    pub fn unconstrain_popup(&self, surface: &PopupSurface) {
        let Some(parent) = surface.get_parent_surface() else {
            tracing::warn!("popup has no parent surface");
            return;
        };

        let Some((window_loc, output)) = self.parent_location(&parent) else {
            tracing::warn!("could not find view or layer surface for popup parent");
            return;
        };

        let output_rect = output
            .as_ref()
            .and_then(|o| self.output_geometry(o))
            .unwrap_or_else(|| GlobalRect::new(GlobalPoint::new(0, 0), Size::from((1920, 1080))));

        let relative_rect = Rectangle::new(
            Point::from((
                output_rect.0.loc.x - window_loc.0.x,
                output_rect.0.loc.y - window_loc.0.y,
            )),
            output_rect.0.size,
        );

        let popup_offset = get_popup_toplevel_coords(&PopupKind::Xdg(surface.clone()));
        let mut adjusted_rect = relative_rect;
        adjusted_rect.loc -= popup_offset;

        let geometry = surface.with_pending_state(|state| {
            state.positioner.get_unconstrained_geometry(adjusted_rect)
        });

        surface.with_pending_state(|state| {
            state.geometry = geometry;
        });

        tracing::debug!(?geometry, bounds = ?adjusted_rect, "unconstrained popup geometry");
    }
}
