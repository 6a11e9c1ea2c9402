// SPDX-License-Identifier: GPL-3.0-only

pub mod kms;
pub mod render;

use crate::state::{BackendData, State};
use anyhow::{Context, Result};
use kms::{drm_helpers, Device};
use smithay::{
    backend::drm::DrmNode,
    output::{Mode as OutputMode, Output, PhysicalProperties, Subpixel},
    reexports::{
        calloop::EventLoop,
        drm::control::{connector, Device as ControlDevice},
        wayland_server::DisplayHandle,
    },
};
use tracing::{info, warn};

/// Initialize the backend based on environment.
pub fn init_backend(
    dh: &DisplayHandle,
    event_loop: &mut EventLoop<'static, State>,
    state: &mut State,
) -> Result<()> {
    // only the KMS backend is supported
    kms::init_backend(dh, event_loop, state)
}

impl State {
    /// A new DRM device showed up on udev (§4.10): open it, bring up EGL,
    /// and enumerate whatever is already plugged into it.
    pub fn device_added(&mut self, dev: libc::dev_t, path: std::path::PathBuf, dh: &DisplayHandle) -> Result<()> {
        let BackendData::Kms(kms) = &mut self.backend else {
            anyhow::bail!("device added before KMS backend was initialized");
        };

        let mut device = Device::new(&mut kms.session, &path, dev, &self.loop_handle)
            .with_context(|| format!("failed to initialize device {}", path.display()))?;

        if let Some(renderer) = egl_renderer(&device)? {
            let allocator = smithay::backend::allocator::gbm::GbmAllocator::new(
                device.gbm.clone(),
                smithay::backend::allocator::gbm::GbmBufferFlags::RENDERING
                    | smithay::backend::allocator::gbm::GbmBufferFlags::SCANOUT,
            );
            kms.gpu_manager
                .as_mut()
                .add_node(device.render_node, allocator, renderer);
        }

        if kms.primary_gpu.is_none() {
            let nodes = [device.render_node];
            kms.primary_gpu = drm_helpers::find_primary_gpu(&nodes).or(Some(device.render_node));
            *kms.primary_node.write().unwrap() = kms.primary_gpu;
        }

        self.connect_all(&mut device, dh)?;
        kms.drm_devices.insert(device.drm_node, device);

        Ok(())
    }

    /// udev reported a change on an already-known device: re-run connector
    /// discovery so newly plugged/unplugged heads are picked up without a
    /// full device re-init.
    pub fn device_changed(&mut self, dev_id: libc::dev_t) -> Result<()> {
        let BackendData::Kms(kms) = &mut self.backend else {
            return Ok(());
        };
        let Ok(node) = DrmNode::from_dev_id(dev_id) else {
            return Ok(());
        };
        let Some(mut device) = kms.drm_devices.shift_remove(&node) else {
            return Ok(());
        };

        let dh = self.display_handle.clone();
        let result = self.connect_all(&mut device, &dh);

        if let BackendData::Kms(kms) = &mut self.backend {
            kms.drm_devices.insert(node, device);
        }
        result
    }

    /// udev reported a device disappeared entirely: tear down every output
    /// it was driving and drop it from the render backend.
    pub fn device_removed(&mut self, dev_id: libc::dev_t, dh: &DisplayHandle) -> Result<()> {
        let BackendData::Kms(kms) = &mut self.backend else {
            return Ok(());
        };
        let Ok(node) = DrmNode::from_dev_id(dev_id) else {
            return Ok(());
        };
        let Some(device) = kms.drm_devices.shift_remove(&node) else {
            return Ok(());
        };

        let removed_outputs: Vec<Output> = device.outputs.values().cloned().collect();
        for output in &removed_outputs {
            self.shell.remove_output(output);
            output.remove_global::<State>(dh);
        }
        self.output_configuration_state.remove_heads(removed_outputs.iter());
        self.output_configuration_state.update();

        kms.gpu_manager.as_mut().remove_node(&device.render_node);
        if kms.primary_gpu == Some(device.render_node) {
            kms.primary_gpu = kms.drm_devices.values().next().map(|d| d.render_node);
            *kms.primary_node.write().unwrap() = kms.primary_gpu;
        }

        info!(?node, "removed DRM device");
        Ok(())
    }

    /// Match every connected connector to a CRTC and make sure each has a
    /// `Surface`; drop surfaces for connectors that went away.
    fn connect_all(&mut self, device: &mut Device, dh: &DisplayHandle) -> Result<()> {
        let assignment = drm_helpers::display_configuration(&mut device.drm, device.supports_atomic)
            .context("failed to read display configuration")?;

        let mut live_connectors = std::collections::HashSet::new();

        for (conn_handle, crtc) in assignment {
            let Some(crtc) = crtc else { continue };
            live_connectors.insert(conn_handle);

            if device.outputs.contains_key(&conn_handle) {
                continue;
            }

            let conn_info = match device.drm.get_connector(conn_handle, false) {
                Ok(info) => info,
                Err(err) => {
                    warn!(?err, "failed to query connector info");
                    continue;
                }
            };
            let Some(mode) = conn_info.modes().first().copied() else {
                continue;
            };

            let output = make_output(&device.drm_node, &conn_info, mode);
            output.create_global::<State>(dh);

            if let Err(err) = device.create_surface(output.clone(), crtc, conn_handle, mode) {
                warn!(?err, "failed to create surface for connector");
                continue;
            }

            self.shell.add_output(output.clone());
            self.output_configuration_state.add_heads(std::iter::once(&output));
            info!(?conn_handle, "connected output");
        }

        let stale: Vec<connector::Handle> = device
            .outputs
            .keys()
            .filter(|h| !live_connectors.contains(h))
            .copied()
            .collect();
        for conn_handle in stale {
            if let Some(output) = device.outputs.remove(&conn_handle) {
                let crtc = device
                    .surfaces
                    .iter()
                    .find(|(_, s)| s.output == output)
                    .map(|(c, _)| *c);
                if let Some(crtc) = crtc {
                    device.remove_surface(crtc);
                }
                self.shell.remove_output(&output);
                self.output_configuration_state.remove_heads(std::iter::once(&output));
                output.remove_global::<State>(dh);
            }
        }

        self.output_configuration_state.update();

        Ok(())
    }
}

fn make_output(
    drm_node: &DrmNode,
    conn_info: &connector::Info,
    mode: smithay::reexports::drm::control::Mode,
) -> Output {
    let (w, h) = conn_info.size().unwrap_or((0, 0));
    let interface = format!("{:?}-{}", conn_info.interface(), conn_info.interface_id());

    let output = Output::new(
        interface,
        PhysicalProperties {
            size: (w as i32, h as i32).into(),
            subpixel: Subpixel::Unknown,
            make: "woven".into(),
            model: format!("{:?}", drm_node),
        },
    );

    let refresh = mode.vrefresh() as i32 * 1000;
    let output_mode = OutputMode {
        size: (mode.size().0 as i32, mode.size().1 as i32).into(),
        refresh,
    };
    output.change_current_state(Some(output_mode), None, None, None);
    output.set_preferred(output_mode);
    output
}

/// Build a renderer sharing this device's EGL context, if it has one.
fn egl_renderer(device: &Device) -> Result<Option<smithay::backend::renderer::glow::GlowRenderer>> {
    let Some(egl) = &device.egl else {
        return Ok(None);
    };
    let context = smithay::backend::egl::EGLContext::new_with_priority(
        &egl.display,
        smithay::backend::egl::context::ContextPriority::High,
    )
    .context("failed to create EGL context for renderer")?;
    let renderer = unsafe { smithay::backend::renderer::glow::GlowRenderer::new(context) }
        .context("failed to create glow renderer")?;
    Ok(Some(renderer))
}
