// SPDX-License-Identifier: GPL-3.0-only

pub mod cursor;
pub mod element;

use smithay::backend::{
    allocator::{
        dmabuf::{AnyError, Dmabuf, DmabufAllocator},
        gbm::GbmAllocator,
        Allocator,
    },
    drm::DrmNode,
    renderer::{
        glow::GlowRenderer,
        multigpu::{ApiDevice, GraphicsApi},
    },
};
use std::{
    cell::Cell,
    collections::HashMap,
    os::unix::prelude::AsFd,
    sync::atomic::{AtomicBool, Ordering},
};

/// A simplified GraphicsApi for GBM/GLES rendering
pub struct GbmGlowBackend<A: AsFd + 'static> {
    devices: HashMap<DrmNode, (GbmAllocator<A>, Cell<Option<GlowRenderer>>)>,
    needs_enumeration: AtomicBool,
}

impl<A: AsFd + 'static> std::fmt::Debug for GbmGlowBackend<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbmGlowBackend")
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .field("needs_enumeration", &self.needs_enumeration)
            .finish()
    }
}

impl<A: AsFd + 'static> Default for GbmGlowBackend<A> {
    fn default() -> Self {
        Self {
            devices: HashMap::new(),
            needs_enumeration: AtomicBool::new(true),
        }
    }
}

impl<A: AsFd + Clone + Send + 'static> GbmGlowBackend<A> {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            needs_enumeration: AtomicBool::new(false),
        }
    }

    pub fn add_node(&mut self, node: DrmNode, gbm: GbmAllocator<A>, renderer: GlowRenderer) {
        if self.devices.contains_key(&node) {
            return;
        }

        self.devices.insert(node, (gbm, Cell::new(Some(renderer))));
        self.needs_enumeration.store(true, Ordering::SeqCst);
    }

    pub fn remove_node(&mut self, node: &DrmNode) {
        if self.devices.remove(node).is_some() {
            self.needs_enumeration.store(true, Ordering::SeqCst);
        }
    }
}

/// Error type for the GbmGlowBackend
#[derive(Debug, thiserror::Error)]
pub enum GbmGlowError {
    #[error("Failed to allocate buffer")]
    #[allow(dead_code)] // may be used when allocation fails
    Allocation,
    #[error("Rendering error: {0}")]
    Render(#[from] smithay::backend::renderer::gles::GlesError),
}

impl<A: AsFd + Clone + 'static> GraphicsApi for GbmGlowBackend<A> {
    type Device = GbmGlowDevice;
    type Error = GbmGlowError;

    fn enumerate(&self, list: &mut Vec<Self::Device>) -> Result<(), Self::Error> {
        self.needs_enumeration.store(false, Ordering::SeqCst);

        // remove old devices
        list.retain(|device| {
            self.devices
                .keys()
                .any(|node| device.node.dev_id() == node.dev_id())
        });

        // add new devices
        for (node, (allocator, renderer)) in &self.devices {
            if list.iter().any(|d| d.node.dev_id() == node.dev_id()) {
                continue;
            }

            if let Some(renderer) = renderer.take() {
                // take ownership from the Cell
                list.push(GbmGlowDevice {
                    node: *node,
                    renderer,
                    allocator: Box::new(DmabufAllocator(allocator.clone())),
                });
            }
        }

        Ok(())
    }

    fn needs_enumeration(&self) -> bool {
        self.needs_enumeration.load(Ordering::Acquire)
    }

    fn identifier() -> &'static str {
        "gbm_glow"
    }
}

/// Device for the GbmGlowBackend
pub struct GbmGlowDevice {
    node: DrmNode,
    renderer: GlowRenderer,
    allocator: Box<dyn Allocator<Buffer = Dmabuf, Error = AnyError>>,
}

impl std::fmt::Debug for GbmGlowDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbmGlowDevice")
            .field("node", &self.node)
            .field("renderer", &"GlowRenderer")
            .field("allocator", &"GbmAllocator")
            .finish()
    }
}

impl ApiDevice for GbmGlowDevice {
    type Renderer = GlowRenderer;

    fn renderer(&self) -> &Self::Renderer {
        &self.renderer
    }

    fn renderer_mut(&mut self) -> &mut Self::Renderer {
        &mut self.renderer
    }

    fn allocator(&mut self) -> &mut dyn Allocator<Buffer = Dmabuf, Error = AnyError> {
        &mut *self.allocator
    }

    fn node(&self) -> &DrmNode {
        &self.node
    }
}

use smithay::backend::{
    drm::DrmDeviceFd,
    renderer::multigpu::{Error as MultiError, MultiFrame, MultiRenderer},
};

/// Type aliases for multi-GPU rendering
pub type GlMultiRenderer<'a> =
    MultiRenderer<'a, 'a, GbmGlowBackend<DrmDeviceFd>, GbmGlowBackend<DrmDeviceFd>>;
#[allow(dead_code)] // kept for symmetry with GlMultiRenderer/GlMultiError; no caller needs a named frame type yet
pub type GlMultiFrame<'a, 'frame, 'buffer> =
    MultiFrame<'a, 'a, 'frame, 'buffer, GbmGlowBackend<DrmDeviceFd>, GbmGlowBackend<DrmDeviceFd>>;
pub type GlMultiError = MultiError<GbmGlowBackend<DrmDeviceFd>, GbmGlowBackend<DrmDeviceFd>>;

/// Clear color behind everything else.
pub const CLEAR_COLOR: smithay::backend::renderer::Color32F =
    smithay::backend::renderer::Color32F::new(0.3, 0.0, 0.2, 1.0); // dark pink

/// `-d`: yellow clear, so a frame with no real damage is still obviously
/// visible as having been repainted.
pub const DEBUG_CLEAR_COLOR: smithay::backend::renderer::Color32F =
    smithay::backend::renderer::Color32F::new(1.0, 1.0, 0.0, 1.0);

fn cursor_image_status(shell: &crate::shell::Shell) -> smithay::input::pointer::CursorImageStatus {
    use smithay::input::pointer::{CursorIcon, CursorImageStatus};
    use std::str::FromStr;

    if let Some(name) = shell.cursor.effective_image_name() {
        let icon = CursorIcon::from_str(&name).unwrap_or(CursorIcon::Default);
        CursorImageStatus::Named(icon)
    } else if let Some(surface) = shell.cursor.client_image() {
        CursorImageStatus::Surface(surface)
    } else {
        CursorImageStatus::Named(CursorIcon::Default)
    }
}

/// Collect every element a single output's frame needs, in the strict
/// layer order §4.9 specifies, front-to-back: cursor, overlay, top, views
/// (topmost first), bottom, background. In debug mode a full-output
/// damage element is appended so every frame paints regardless of what
/// actually changed.
pub fn output_elements<R>(
    renderer: &mut R,
    state: &crate::State,
    output: &smithay::output::Output,
) -> Vec<element::CosmicElement<R>>
where
    R: element::AsGlowRenderer
        + smithay::backend::renderer::Renderer
        + smithay::backend::renderer::ImportAll
        + smithay::backend::renderer::ImportMem,
    R::TextureId: Send + Clone + 'static,
{
    use crate::shell::output::{Layer, OutputState};
    use element::CosmicElement;
    use smithay::backend::renderer::element::{surface::render_elements_from_surface_tree, Kind};
    use smithay::utils::{Clock, Monotonic, Rectangle, Scale};

    let shell = &state.shell;
    let Some(output_geo) = shell.output_geometry(output) else {
        return Vec::new();
    };
    let output_rect = output_geo.as_rectangle();
    let scale = Scale::from(output.current_scale().fractional_scale());

    let mut elements: Vec<CosmicElement<R>> = Vec::new();

    if shell.active_output.get().as_ref() == Some(output) {
        let local = shell.cursor.position() - output_rect.loc.to_f64();
        let status = cursor_image_status(shell);
        let millis = Clock::<Monotonic>::new().now().as_millis() as u32;
        let mut cursor_state = state.cursor_render_state.borrow_mut();
        for (elem, _hotspot) in
            cursor::draw_cursor(renderer, &mut cursor_state, &status, local, scale, millis)
        {
            elements.push(CosmicElement::Cursor(elem));
        }
    }

    let output_state = OutputState::get(output);
    let surface_elements = |surface: &smithay::reexports::wayland_server::protocol::wl_surface::WlSurface,
                            loc: smithay::utils::Point<i32, smithay::utils::Physical>,
                            renderer: &mut R| {
        render_elements_from_surface_tree(renderer, surface, loc, scale, 1.0, Kind::Unspecified)
            .into_iter()
            .map(CosmicElement::Surface)
    };

    for layer in [Layer::Overlay, Layer::Top] {
        for surf in output_state.layer_list(layer).borrow().iter() {
            let loc = (surf.geo().loc - output_rect.loc).to_physical_precise_round(scale);
            elements.extend(surface_elements(surf.surface.wl_surface(), loc, renderer));
        }
    }

    for view in shell.views.borrow().iter() {
        if !view.mapped() {
            continue;
        }
        let view_rect = view.current();
        if output_rect.intersection(view_rect).is_none() {
            continue;
        }
        let loc = (view_rect.loc - output_rect.loc).to_physical_precise_round(scale);
        elements.extend(surface_elements(view.main_surface(), loc, renderer));
    }

    for layer in [Layer::Bottom, Layer::Background] {
        for surf in output_state.layer_list(layer).borrow().iter() {
            let loc = (surf.geo().loc - output_rect.loc).to_physical_precise_round(scale);
            elements.extend(surface_elements(surf.surface.wl_surface(), loc, renderer));
        }
    }

    if shell.debug_render {
        let size = output_rect.size.to_physical_precise_round(scale);
        elements.push(CosmicElement::Damage(element::DamageElement::new(
            (0, 0).into(),
            Rectangle::from_size(size),
        )));
    }

    elements
}
