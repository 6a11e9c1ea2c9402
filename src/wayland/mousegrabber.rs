// SPDX-License-Identifier: GPL-3.0-only

//! Wire-protocol glue for `mousegrabber_v1` (§4.8/§6), following the same
//! hand-rolled `GlobalDispatch`/`Dispatch` pattern the teacher uses for
//! `zwlr_output_manager_v1` in `wayland::output_configuration`.

use smithay::reexports::wayland_server::backend::{ClientId, GlobalId};
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use woven_protocols::server::mousegrabber_v1::mousegrabber_v1::{self, Mousegrabber};

use crate::mousegrabber::MouseGrabber;
use crate::State;

pub struct MousegrabberGlobalData {
    filter: Box<dyn for<'a> Fn(&'a Client) -> bool + Send + Sync>,
}

pub struct MousegrabberState {
    mousegrabber: MouseGrabber,
    _global: GlobalId,
}

impl MousegrabberState {
    pub fn new<F>(dh: &DisplayHandle, client_filter: F) -> Self
    where
        F: for<'a> Fn(&'a Client) -> bool + Clone + Send + Sync + 'static,
    {
        let global = dh.create_global::<State, Mousegrabber, _>(
            1,
            MousegrabberGlobalData { filter: Box::new(client_filter) },
        );
        Self { mousegrabber: MouseGrabber::default(), _global: global }
    }

    pub fn grabber(&self) -> &MouseGrabber {
        &self.mousegrabber
    }
}

impl GlobalDispatch<Mousegrabber, MousegrabberGlobalData, State> for MousegrabberState {
    fn bind(
        _state: &mut State,
        _dh: &DisplayHandle,
        _client: &Client,
        resource: New<Mousegrabber>,
        _global_data: &MousegrabberGlobalData,
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &MousegrabberGlobalData) -> bool {
        (global_data.filter)(&client)
    }
}

impl Dispatch<Mousegrabber, (), State> for MousegrabberState {
    fn request(
        state: &mut State,
        client: &Client,
        obj: &Mousegrabber,
        request: mousegrabber_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        let grabber = state.mousegrabber_state.grabber();
        match request {
            mousegrabber_v1::Request::Grab { cursor_name } => {
                if grabber.is_grabbed() {
                    obj.post_error(mousegrabber_v1::Error::AlreadyGrabbed, "mousegrabber already held");
                    return;
                }
                let previous = state.shell.cursor.effective_image_name();
                if grabber.grab(obj.clone(), previous) {
                    state.shell.cursor.set_compositor_image(Some(cursor_name));
                    state.shell.cursor.set_lock_software_cursors(true);
                    tracing::info!(client = ?client.id(), "mousegrabber grab acquired");
                }
            }
            mousegrabber_v1::Request::Release => {
                match grabber.release_for(client) {
                    Some(previous) => {
                        state.shell.cursor.set_compositor_image(previous);
                        state.shell.cursor.set_lock_software_cursors(false);
                        tracing::info!(client = ?client.id(), "mousegrabber grab released");
                    }
                    None => {
                        obj.post_error(mousegrabber_v1::Error::NotGrabbed, "mousegrabber not held by this client");
                    }
                }
            }
            mousegrabber_v1::Request::Destroy => {
                // handled in `destroyed` below; a client-initiated destroy
                // also releases the grab if this client held it, per the
                // protocol description.
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut State, client: ClientId, _obj: &Mousegrabber, _data: &()) {
        let grabber = state.mousegrabber_state.grabber();
        if let Some(client) = state.display_handle.get_client(client).ok() {
            if let Some(previous) = grabber.release_for(&client) {
                state.shell.cursor.set_compositor_image(previous);
                state.shell.cursor.set_lock_software_cursors(false);
            }
        }
    }
}

#[macro_export]
macro_rules! delegate_mousegrabber {
    ($ty:ty) => {
        smithay::reexports::wayland_server::delegate_global_dispatch!($ty: [
            woven_protocols::server::mousegrabber_v1::mousegrabber_v1::Mousegrabber: $crate::wayland::mousegrabber::MousegrabberGlobalData
        ] => $crate::wayland::mousegrabber::MousegrabberState);
        smithay::reexports::wayland_server::delegate_dispatch!($ty: [
            woven_protocols::server::mousegrabber_v1::mousegrabber_v1::Mousegrabber: ()
        ] => $crate::wayland::mousegrabber::MousegrabberState);
    };
}
