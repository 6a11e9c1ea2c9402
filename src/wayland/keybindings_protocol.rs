// SPDX-License-Identifier: GPL-3.0-only

//! Wire-protocol glue for `keybindings_v1` (§4.7/§6), following the same
//! hand-rolled `GlobalDispatch`/`Dispatch` pattern the teacher uses for
//! `zwlr_output_manager_v1` in `wayland::output_configuration`.

use smithay::reexports::wayland_server::backend::{ClientId, GlobalId};
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use woven_protocols::server::keybindings_v1::keybindings_v1::{self, Keybindings};

use crate::input::keybindings::KeybindingFilter;
use crate::State;

pub struct KeybindingsGlobalData {
    filter: Box<dyn for<'a> Fn(&'a Client) -> bool + Send + Sync>,
}

pub struct KeybindingsProtocolState {
    _global: GlobalId,
}

impl KeybindingsProtocolState {
    pub fn new<F>(dh: &DisplayHandle, client_filter: F) -> Self
    where
        F: for<'a> Fn(&'a Client) -> bool + Clone + Send + Sync + 'static,
    {
        let global = dh.create_global::<State, Keybindings, _>(
            1,
            KeybindingsGlobalData { filter: Box::new(client_filter) },
        );
        Self { _global: global }
    }
}

impl GlobalDispatch<Keybindings, KeybindingsGlobalData, State> for KeybindingsProtocolState {
    fn bind(
        _state: &mut State,
        _dh: &DisplayHandle,
        _client: &Client,
        resource: New<Keybindings>,
        _global_data: &KeybindingsGlobalData,
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &KeybindingsGlobalData) -> bool {
        (global_data.filter)(&client)
    }
}

impl Dispatch<Keybindings, (), State> for KeybindingsProtocolState {
    fn request(
        state: &mut State,
        client: &Client,
        obj: &Keybindings,
        request: keybindings_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        let filter: &KeybindingFilter = &state.keybinding_filter;

        // The filter's owner is implicitly whichever client first calls a
        // mutating request; bind it lazily here rather than through a
        // separate request, mirroring how the protocol description frames
        // ownership as "claimed", not "bound".
        if filter.owner_client().is_none() {
            filter.bind(obj.clone());
        }

        if !filter.is_owner(client) {
            obj.post_error(keybindings_v1::Error::NotBound, "keybindings filter owned by another client");
            return;
        }

        match request {
            keybindings_v1::Request::RegisterKey { keycode, modifiers } => {
                filter.register(keycode, modifiers);
            }
            keybindings_v1::Request::ClearKeys => {
                filter.clear_all();
            }
            keybindings_v1::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut State, client: ClientId, _obj: &Keybindings, _data: &()) {
        if let Ok(client) = state.display_handle.get_client(client) {
            state.keybinding_filter.unbind(&client);
        }
    }
}

#[macro_export]
macro_rules! delegate_keybindings {
    ($ty:ty) => {
        smithay::reexports::wayland_server::delegate_global_dispatch!($ty: [
            woven_protocols::server::keybindings_v1::keybindings_v1::Keybindings: $crate::wayland::keybindings_protocol::KeybindingsGlobalData
        ] => $crate::wayland::keybindings_protocol::KeybindingsProtocolState);
        smithay::reexports::wayland_server::delegate_dispatch!($ty: [
            woven_protocols::server::keybindings_v1::keybindings_v1::Keybindings: ()
        ] => $crate::wayland::keybindings_protocol::KeybindingsProtocolState);
    };
}
