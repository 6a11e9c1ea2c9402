// SPDX-License-Identifier: GPL-3.0-only

//! Per-output state: the damage tracker, the four ordered layer lists, and
//! the usable-area rectangle the layer arranger shrinks as surfaces claim
//! exclusive zones.

use std::cell::RefCell;

use smithay::backend::renderer::damage::OutputDamageTracker;
use smithay::output::{Output, WeakOutput};
use smithay::utils::{Logical, Rectangle};

use super::layer::LayerSurface;

/// The four stacking layers of the wlr-layer-shell protocol, in paint
/// order from back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Bottom,
    Top,
    Overlay,
}

pub const LAYERS_BACK_TO_FRONT: [Layer; 4] =
    [Layer::Background, Layer::Bottom, Layer::Top, Layer::Overlay];

pub const LAYERS_ARRANGE_ORDER: [Layer; 4] =
    [Layer::Overlay, Layer::Top, Layer::Bottom, Layer::Background];

/// Per-output compositor state, stored in the `smithay::output::Output`'s
/// user data map and looked up with [`OutputState::get`].
pub struct OutputState {
    pub damage_tracker: RefCell<OutputDamageTracker>,
    pub background: RefCell<Vec<LayerSurface>>,
    pub bottom: RefCell<Vec<LayerSurface>>,
    pub top: RefCell<Vec<LayerSurface>>,
    pub overlay: RefCell<Vec<LayerSurface>>,
    /// The area left over after layer surfaces with a nonzero exclusive
    /// zone have claimed their edges.
    pub usable_area: RefCell<Rectangle<i32, Logical>>,
}

impl OutputState {
    pub fn install(output: &Output) {
        if output.user_data().get::<OutputState>().is_some() {
            return;
        }
        let tracker = OutputDamageTracker::from_output(output);
        let geometry = Rectangle::from_size(
            output
                .current_mode()
                .map(|m| m.size)
                .unwrap_or_default()
                .to_logical(1),
        );
        output.user_data().insert_if_missing(|| OutputState {
            damage_tracker: RefCell::new(tracker),
            background: RefCell::new(Vec::new()),
            bottom: RefCell::new(Vec::new()),
            top: RefCell::new(Vec::new()),
            overlay: RefCell::new(Vec::new()),
            usable_area: RefCell::new(geometry),
        });
    }

    pub fn get(output: &Output) -> &OutputState {
        output
            .user_data()
            .get::<OutputState>()
            .expect("OutputState::install was not called for this output")
    }

    pub fn layer_list(&self, layer: Layer) -> &RefCell<Vec<LayerSurface>> {
        match layer {
            Layer::Background => &self.background,
            Layer::Bottom => &self.bottom,
            Layer::Top => &self.top,
            Layer::Overlay => &self.overlay,
        }
    }

    pub fn for_each_layer(&self, mut f: impl FnMut(Layer, &LayerSurface)) {
        for layer in LAYERS_BACK_TO_FRONT {
            for surface in self.layer_list(layer).borrow().iter() {
                f(layer, surface);
            }
        }
    }
}

/// The server's "most recently contained the cursor" output, a weak
/// reference re-evaluated on every passthrough motion event (§4.4).
#[derive(Default, Clone)]
pub struct ActiveOutput(RefCell<Option<WeakOutput>>);

impl ActiveOutput {
    pub fn get(&self) -> Option<Output> {
        self.0.borrow().as_ref().and_then(WeakOutput::upgrade)
    }

    pub fn set(&self, output: Option<&Output>) {
        *self.0.borrow_mut() = output.map(Output::downgrade);
    }

    /// Drop the active-output reference if it points at `output`, called
    /// on output unplug.
    pub fn clear_if(&self, output: &Output) {
        let mut slot = self.0.borrow_mut();
        if slot.as_ref().and_then(WeakOutput::upgrade).as_ref() == Some(output) {
            *slot = None;
        }
    }
}
