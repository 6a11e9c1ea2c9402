// SPDX-License-Identifier: GPL-3.0-only

//! A single CRTC's render target (§4.9): the DRM/GBM output compositor
//! plus the "does this output owe a frame" bookkeeping that damage calls
//! and vblank completions drive.
//!
//! Unlike the per-output render thread this module started from, redraws
//! here run synchronously on the single compositor thread (§5): scheduling
//! a render just flips a flag, and the main loop's dispatch callback
//! drains every pending surface once per iteration.

use smithay::{
    backend::{
        allocator::gbm::GbmAllocator,
        drm::{compositor::FrameFlags, exporter::gbm::GbmFramebufferExporter, output::DrmOutput, DrmDeviceFd},
        renderer::{element::RenderElementStates, ImportAll, ImportMem, Renderer},
    },
    desktop::utils::send_frames_surface_tree,
    output::Output,
    utils::Clock,
};
use tracing::warn;

use crate::backend::render::element::{AsGlowRenderer, CosmicElement, FromGlesError};
use crate::State;

/// No per-frame user data round-trips through the compositor: this
/// compositor never registered the presentation-time global, so there is
/// nothing for `frame_submitted` to hand back to a client.
pub type GbmDrmOutput = DrmOutput<GbmAllocator<DrmDeviceFd>, GbmFramebufferExporter<DrmDeviceFd>, (), DrmDeviceFd>;

/// One output's render target.
pub struct Surface {
    pub output: Output,
    compositor: GbmDrmOutput,
    /// Damage is outstanding and no frame is currently queued at the
    /// kernel; the next `redraw` call should render and submit one.
    pending: bool,
    /// A frame was submitted and the kernel hasn't signalled its vblank
    /// yet; redraws are deferred until `frame_submitted` clears this, so
    /// a slow output can't pile up queued frames (§4.9 step 8).
    waiting_for_vblank: bool,
}

impl Surface {
    pub fn new(output: Output, compositor: GbmDrmOutput) -> Self {
        // every output starts dirty so its first frame paints without
        // waiting for a damage source.
        Self { output, compositor, pending: true, waiting_for_vblank: false }
    }

    pub fn schedule_render(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending && !self.waiting_for_vblank
    }

    /// Render and queue one frame if damage is outstanding and the
    /// previous frame has already been acknowledged (§4.9 steps 1-7:
    /// collect elements in strict layer order, hand them to the damage
    /// tracker, submit if anything actually changed).
    pub fn redraw<R>(&mut self, renderer: &mut R, state: &State) -> anyhow::Result<()>
    where
        R: AsGlowRenderer + Renderer + ImportAll + ImportMem,
        R::TextureId: Send + Clone + 'static,
        R::Error: FromGlesError,
    {
        if !self.is_pending() {
            return Ok(());
        }

        let elements: Vec<CosmicElement<R>> =
            crate::backend::render::output_elements(renderer, state, &self.output);

        let clear = if state.shell.debug_render {
            crate::backend::render::DEBUG_CLEAR_COLOR
        } else {
            crate::backend::render::CLEAR_COLOR
        };

        let result = self
            .compositor
            .render_frame(renderer, &elements, clear, FrameFlags::DEFAULT)
            .map_err(|err| anyhow::anyhow!("failed to render frame: {err:?}"))?;

        self.pending = false;

        if result.is_empty {
            return Ok(());
        }

        match self.compositor.queue_frame(()) {
            Ok(()) => {
                self.waiting_for_vblank = true;
                self.send_frame_callbacks(&state.shell, &result.states);
            }
            Err(err) => {
                warn!(output = %self.output.name(), ?err, "failed to queue frame");
            }
        }

        Ok(())
    }

    /// The kernel has presented the previously queued frame (§4.9 step
    /// 8): free the swapchain slot so the next `redraw` can submit again.
    pub fn frame_submitted(&mut self) {
        self.waiting_for_vblank = false;
        if let Err(err) = self.compositor.frame_submitted() {
            warn!(output = %self.output.name(), ?err, "frame_submitted failed");
        }
    }

    /// Tell every surface on this output it can draw its next frame, now
    /// that a buffer of theirs has actually reached the screen.
    fn send_frame_callbacks(&self, shell: &crate::shell::Shell, _states: &RenderElementStates) {
        let clock = Clock::<smithay::utils::Monotonic>::new();
        let now = clock.now();
        let output = &self.output;

        for view in shell.views.borrow().iter() {
            if !view.mapped() {
                continue;
            }
            send_frames_surface_tree(view.main_surface(), output, now, None, |_, _| {
                Some(output.clone())
            });
        }

        crate::shell::output::OutputState::get(output).for_each_layer(|_, layer| {
            send_frames_surface_tree(layer.surface.wl_surface(), output, now, None, |_, _| {
                Some(output.clone())
            });
        });
    }
}
