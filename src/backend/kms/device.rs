// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use smithay::{
    backend::{
        allocator::{
            gbm::{GbmAllocator, GbmBufferFlags, GbmDevice},
            Fourcc,
        },
        drm::{
            exporter::gbm::GbmFramebufferExporter, DrmDevice, DrmDeviceFd, DrmEvent, DrmNode,
            DrmSurface,
        },
        egl::{context::ContextPriority, EGLContext, EGLDevice, EGLDisplay},
        renderer::glow::GlowRenderer,
        session::Session,
    },
    output::Output,
    reexports::{
        calloop::{LoopHandle, RegistrationToken},
        drm::control::{connector, crtc, Mode as DrmMode},
        rustix::fs::OFlags,
    },
    utils::DeviceFd,
};
use std::{collections::HashMap, fmt, path::Path};
use tracing::{debug, error, info, warn};

use super::surface::{GbmDrmOutput, Surface};

const SUPPORTED_FORMATS: &[Fourcc] = &[Fourcc::Argb8888, Fourcc::Xrgb8888];

/// EGL context and display for rendering
#[derive(Debug)]
pub struct EGLInternals {
    pub display: EGLDisplay,
    pub device: EGLDevice,
    pub context: EGLContext,
}

/// A DRM device with rendering capabilities
pub struct Device {
    pub drm: DrmDevice,
    pub drm_node: DrmNode,
    pub gbm: GbmDevice<DrmDeviceFd>,
    pub egl: Option<EGLInternals>,
    pub render_node: DrmNode,
    pub supports_atomic: bool,
    pub event_token: Option<RegistrationToken>,

    pub outputs: HashMap<connector::Handle, Output>,
    pub surfaces: HashMap<crtc::Handle, Surface>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("drm_node", &self.drm_node)
            .field("render_node", &self.render_node)
            .field("supports_atomic", &self.supports_atomic)
            .field("outputs", &self.outputs.len())
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

/// Initialize EGL context for a GBM device
pub fn init_egl(gbm: &GbmDevice<DrmDeviceFd>) -> Result<EGLInternals> {
    let display = unsafe { EGLDisplay::new(gbm.clone()) }
        .context("Failed to create EGLDisplay for device")?;
    
    let device = EGLDevice::device_for_display(&display)
        .context("Unable to find matching egl device")?;
    
    let context = EGLContext::new_with_priority(&display, ContextPriority::High)
        .context("Failed to create EGLContext for device")?;
    
    Ok(EGLInternals {
        display,
        device,
        context,
    })
}

impl Device {
    /// Create a new DRM device from a file descriptor
    pub fn new(
        session: &mut impl Session,
        path: &Path,
        dev: libc::dev_t,
        event_loop: &LoopHandle<'static, crate::state::State>,
    ) -> Result<Self> {
        info!("Initializing DRM device: {}", path.display());
        
        // open the device file
        let fd = session
            .open(
                path,
                OFlags::RDWR | OFlags::CLOEXEC | OFlags::NOCTTY | OFlags::NONBLOCK,
            )
            .map_err(|e| anyhow::anyhow!("Failed to open device {}: {:?}", path.display(), e))?;
        let fd = DrmDeviceFd::new(DeviceFd::from(fd));
        
        // initialize DRM device
        let (drm, notifier) = DrmDevice::new(fd.clone(), false)
            .with_context(|| format!("Failed to initialize drm device for: {}", path.display()))?;
        
        let drm_node = DrmNode::from_dev_id(dev)?;
        let supports_atomic = drm.is_atomic();
        
        info!(
            "DRM device initialized: {:?}, atomic modesetting: {}",
            drm_node,
            supports_atomic
        );
        
        // initialize GBM for buffer allocation
        let gbm = GbmDevice::new(fd)
            .with_context(|| format!("Failed to initialize GBM device for {}", path.display()))?;
        
        // try to initialize EGL for rendering
        let (egl, render_node) = match init_egl(&gbm) {
            Ok(egl) => {
                let render_node = egl
                    .device
                    .try_get_render_node()
                    .ok()
                    .and_then(std::convert::identity)
                    .unwrap_or(drm_node);
                
                info!("EGL initialized, render node: {:?}", render_node);
                (Some(egl), render_node)
            }
            Err(err) => {
                warn!("Failed to initialize EGL: {}", err);
                (None, drm_node)
            }
        };
        
        // register DRM event handler: a vblank means the previously queued
        // frame on this CRTC has landed, freeing it to accept another.
        let token = event_loop
            .insert_source(notifier, move |event, _metadata, state| match event {
                DrmEvent::VBlank(crtc) => {
                    debug!(?crtc, "vblank");
                    state.vblank(drm_node, crtc);
                }
                DrmEvent::Error(err) => {
                    error!(?err, "DRM device error");
                }
            })
            .context("Failed to add drm device to event loop")?;
        
        Ok(Device {
            drm,
            drm_node,
            gbm,
            egl,
            render_node,
            supports_atomic,
            event_token: Some(token),
            outputs: HashMap::new(),
            surfaces: HashMap::new(),
        })
    }

    /// Build the DRM/GBM render target for one connector+CRTC pairing and
    /// register it as that output's `Surface`.
    ///
    /// TODO: `DrmOutput::try_new`'s exact parameter list (color format
    /// preference order, renderer format iterator) is not exercised
    /// anywhere in this codebase's history; verify it against the vendored
    /// smithay revision before relying on this in production.
    pub fn create_surface(
        &mut self,
        output: Output,
        crtc: crtc::Handle,
        connector: connector::Handle,
        mode: DrmMode,
    ) -> Result<()> {
        let drm_surface = self
            .drm
            .create_surface(crtc, mode, &[connector])
            .context("Failed to create DRM surface")?;

        let gbm_allocator = GbmAllocator::new(
            self.gbm.clone(),
            GbmBufferFlags::RENDERING | GbmBufferFlags::SCANOUT,
        );
        let exporter = GbmFramebufferExporter::new(self.gbm.clone(), Some(self.drm_node));

        let compositor: GbmDrmOutput =
            build_drm_output(&output, drm_surface, gbm_allocator, exporter)?;

        self.outputs.insert(connector, output.clone());
        self.surfaces.insert(crtc, Surface::new(output, compositor));
        Ok(())
    }

    pub fn remove_surface(&mut self, crtc: crtc::Handle) -> Option<Output> {
        self.surfaces.remove(&crtc).map(|s| s.output)
    }

    pub fn schedule_render(&mut self, output: &Output) {
        for surface in self.surfaces.values_mut() {
            if &surface.output == output {
                surface.schedule_render();
            }
        }
    }

    /// Render every pending surface on this device through its shared
    /// multi-GPU renderer instance (§5: runs synchronously on the main
    /// loop's thread, never off a per-output render thread).
    pub fn render_pending(
        &mut self,
        gpu_manager: &mut smithay::backend::renderer::multigpu::GpuManager<
            crate::backend::render::GbmGlowBackend<DrmDeviceFd>,
        >,
        state: &crate::State,
    ) {
        for surface in self.surfaces.values_mut() {
            if !surface.is_pending() {
                continue;
            }
            match gpu_manager.single_renderer(&self.render_node) {
                Ok(mut renderer) => {
                    if let Err(err) = surface.redraw(&mut renderer, state) {
                        warn!(?err, "redraw failed");
                    }
                }
                Err(err) => warn!(?err, "failed to acquire renderer for device"),
            }
        }
    }
}

/// TODO: the exact `DrmOutput::try_new` parameter list (plane assignment,
/// preferred color format order) isn't exercised anywhere this was grounded
/// on; this is a best-effort call against the vendored smithay revision
/// and should be checked against its real signature once the toolchain is
/// available.
fn build_drm_output(
    output: &Output,
    surface: DrmSurface,
    allocator: GbmAllocator<DrmDeviceFd>,
    exporter: GbmFramebufferExporter<DrmDeviceFd>,
) -> Result<GbmDrmOutput> {
    GbmDrmOutput::try_new(
        output,
        surface,
        None,
        allocator,
        exporter,
        SUPPORTED_FORMATS.to_vec(),
    )
    .context("Failed to build DRM output compositor")
}