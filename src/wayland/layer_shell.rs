// SPDX-License-Identifier: GPL-3.0-only

//! wlr-layer-shell glue: new/destroyed surfaces are filed into the
//! per-output layer lists owned by [`crate::shell::output::OutputState`]
//! and laid out by [`crate::shell::layer::arrange_layers`] (§4.3), rather
//! than through smithay's own `layer_map_for_output` helper.

use smithay::{
    delegate_layer_shell,
    desktop::PopupKind,
    output::Output,
    reexports::wayland_server::protocol::wl_output::WlOutput,
    utils::SERIAL_COUNTER,
    wayland::shell::{
        wlr_layer::{
            Layer, LayerSurface as WlrLayerSurface, WlrLayerShellHandler, WlrLayerShellState,
        },
        xdg::PopupSurface,
    },
};
use tracing::{debug, info};

use crate::shell::layer::{arrange_layers, topmost_keyboard_interactive, LayerSurface};
use crate::shell::output::{Layer as ShellLayer, OutputState, LAYERS_BACK_TO_FRONT};
use crate::State;

fn shell_layer(layer: Layer) -> ShellLayer {
    match layer {
        Layer::Background => ShellLayer::Background,
        Layer::Bottom => ShellLayer::Bottom,
        Layer::Top => ShellLayer::Top,
        Layer::Overlay => ShellLayer::Overlay,
    }
}

impl WlrLayerShellHandler for State {
    fn shell_state(&mut self) -> &mut WlrLayerShellState {
        &mut self.layer_shell_state
    }

    fn new_layer_surface(
        &mut self,
        surface: WlrLayerSurface,
        wl_output: Option<WlOutput>,
        layer: Layer,
        namespace: String,
    ) {
        let output = wl_output
            .as_ref()
            .and_then(Output::from_resource)
            .or_else(|| self.shell.active_output.get())
            .or_else(|| self.shell.outputs.borrow().first().cloned());

        let Some(output) = output else {
            debug!("no output available for layer surface {}", namespace);
            return;
        };

        info!(
            "new layer surface {} on {:?} (output {})",
            namespace,
            layer,
            output.name()
        );

        OutputState::install(&output);
        OutputState::get(&output)
            .layer_list(shell_layer(layer))
            .borrow_mut()
            .push(LayerSurface::new(surface, namespace));

        arrange_layers(&output);
        self.refresh_layer_keyboard_focus(&output);
        self.backend.schedule_render(&output);
    }

    fn layer_destroyed(&mut self, surface: WlrLayerSurface) {
        let outputs: Vec<Output> = self.shell.outputs.borrow().iter().cloned().collect();
        for output in outputs {
            let state = OutputState::get(&output);
            let mut removed = false;
            for layer in LAYERS_BACK_TO_FRONT {
                let list = state.layer_list(layer);
                let before = list.borrow().len();
                list.borrow_mut().retain(|ls| ls.surface != surface);
                if list.borrow().len() != before {
                    removed = true;
                }
            }
            if removed {
                info!("layer surface destroyed on output {}", output.name());
                arrange_layers(&output);
                self.refresh_layer_keyboard_focus(&output);
                self.backend.schedule_render(&output);
                return;
            }
        }
    }

    fn new_popup(&mut self, _parent: WlrLayerSurface, popup: PopupSurface) {
        self.shell.unconstrain_popup(&popup);

        if let Err(err) = popup.send_configure() {
            tracing::warn!(?err, "failed to configure layer-shell popup");
        } else if let Err(err) = self.popups.track_popup(PopupKind::from(popup)) {
            tracing::warn!(?err, "failed to track layer-shell popup");
        }
    }
}

impl State {
    /// After arranging an output's layers, hand keyboard focus to the
    /// topmost keyboard-interactive overlay/top surface, if any (§4.3).
    pub(crate) fn refresh_layer_keyboard_focus(&mut self, output: &Output) {
        let Some(layer) = topmost_keyboard_interactive(output) else {
            return;
        };
        let Some(keyboard) = self.seat.get_keyboard() else {
            return;
        };
        self.seat_focus.set_focused_view(None);
        let serial = SERIAL_COUNTER.next_serial();
        keyboard.set_focus(self, Some(layer.surface.wl_surface().clone()), serial);
    }
}

delegate_layer_shell!(State);
