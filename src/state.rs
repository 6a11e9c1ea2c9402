// SPDX-License-Identifier: GPL-3.0-only

use std::cell::RefCell;

use crate::backend::kms::KmsState;
use crate::backend::render::cursor::CursorStateInner;
use crate::input::keybindings::KeybindingFilter;
use crate::seat::SeatFocus;
use crate::shell::Shell;
use crate::wayland::keybindings_protocol::KeybindingsProtocolState;
use crate::wayland::mousegrabber::MousegrabberState;
use crate::wayland::output_configuration::{
    ModeConfiguration, OutputConfiguration, OutputConfigurationHandler, OutputConfigurationState,
};

use smithay::{
    backend::input::InputEvent,
    desktop::PopupManager,
    input::{Seat, SeatState},
    output::{Mode, Output},
    reexports::{
        calloop::{LoopHandle, LoopSignal},
        wayland_server::{Display, DisplayHandle},
    },
    utils::Scale,
    wayland::{
        compositor::CompositorState,
        selection::{
            data_device::DataDeviceState, primary_selection::PrimarySelectionState,
        },
        shell::{wlr_layer::WlrLayerShellState, xdg::XdgShellState},
        shm::ShmState,
        xdg_activation::XdgActivationState,
    },
};

/// Backend data enum
pub enum BackendData {
    Uninitialized,
    Kms(KmsState),
    // we could add other backends later
}

impl BackendData {
    /// Forward to the active backend's render scheduler. A no-op before
    /// the backend has finished initializing.
    pub fn schedule_render(&mut self, output: &smithay::output::Output) {
        if let BackendData::Kms(kms) = self {
            kms.schedule_render(output);
        }
    }

    /// Render every output with outstanding damage (§4.9, §5): called once
    /// per event loop iteration, never from inside a callback already
    /// holding `state.backend` borrowed.
    pub fn render_pending(&mut self, state: &State) {
        if let BackendData::Kms(kms) = self {
            kms.render_pending(state);
        }
    }
}

/// The main compositor state: every protocol handler's per-client and
/// per-global bookkeeping, plus the view/cursor/output model in `shell`.
pub struct State {
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, State>,
    pub loop_signal: LoopSignal,
    pub should_stop: bool,
    pub socket_name: String,
    pub backend: BackendData,
    session_active: bool,
    /// Loaded xcursor theme and per-renderer texture cache, reused across
    /// frames so the theme isn't reparsed every redraw.
    pub cursor_render_state: RefCell<CursorStateInner>,

    pub shell: Shell,
    pub seat: Seat<State>,
    pub seat_focus: SeatFocus,
    pub popups: PopupManager,

    pub keybinding_filter: KeybindingFilter,
    pub keybindings_protocol_state: KeybindingsProtocolState,
    pub mousegrabber_state: MousegrabberState,

    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub layer_shell_state: WlrLayerShellState,
    pub seat_state: SeatState<State>,
    pub shm_state: ShmState,
    pub data_device_state: DataDeviceState,
    pub primary_selection_state: PrimarySelectionState,
    pub xdg_activation_state: XdgActivationState,
    pub output_configuration_state: OutputConfigurationState,
}

#[allow(dead_code)]
impl State {
    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }
}

impl State {
    pub fn new(
        display: &Display<State>,
        socket_name: String,
        loop_handle: LoopHandle<'static, State>,
        loop_signal: LoopSignal,
    ) -> Self {
        let display_handle = display.handle();

        let compositor_state = CompositorState::new::<State>(&display_handle);
        let xdg_shell_state = XdgShellState::new::<State>(&display_handle);
        let layer_shell_state = WlrLayerShellState::new::<State>(&display_handle);
        let mut seat_state = SeatState::new();
        let shm_state = ShmState::new::<State>(&display_handle, Vec::new());
        let data_device_state = DataDeviceState::new::<State>(&display_handle);
        let primary_selection_state = PrimarySelectionState::new::<State>(&display_handle);
        let xdg_activation_state = XdgActivationState::new::<State>(&display_handle);
        let output_configuration_state =
            OutputConfigurationState::new(&display_handle, |_client| true);

        let mut seat: Seat<State> = seat_state.new_wl_seat(&display_handle, "seat0");
        seat.add_keyboard(Default::default(), 200, 25)
            .expect("failed to add keyboard to seat");
        seat.add_pointer();

        let keybinding_filter = KeybindingFilter::default();
        let keybindings_protocol_state =
            KeybindingsProtocolState::new(&display_handle, |_client| true);
        let mousegrabber_state = MousegrabberState::new(&display_handle, |_client| true);

        Self {
            display_handle,
            loop_handle,
            loop_signal,
            should_stop: false,
            socket_name,
            backend: BackendData::Uninitialized,
            session_active: false,
            cursor_render_state: RefCell::new(CursorStateInner::default()),

            shell: Shell::new(std::env::var("WOVEN_DEBUG_RENDER").is_ok()),
            seat,
            seat_focus: SeatFocus::default(),
            popups: PopupManager::default(),

            keybinding_filter,
            keybindings_protocol_state,
            mousegrabber_state,

            compositor_state,
            xdg_shell_state,
            layer_shell_state,
            seat_state,
            shm_state,
            data_device_state,
            primary_selection_state,
            xdg_activation_state,
            output_configuration_state,
        }
    }

    /// Draw every output with outstanding damage (§5: the single compositor
    /// thread does this once per event loop iteration, never off a render
    /// thread). `backend` is swapped out so its render pass can borrow the
    /// rest of `State` immutably.
    pub fn render_pending_outputs(&mut self) {
        let mut backend = std::mem::replace(&mut self.backend, BackendData::Uninitialized);
        backend.render_pending(self);
        self.backend = backend;
    }

    pub fn session_active(&mut self, active: bool) {
        self.session_active = active;
        if active {
            // resume operations
            if let BackendData::Kms(kms) = &mut self.backend {
                if let Err(err) = kms.libinput.resume() {
                    tracing::error!(?err, "Failed to resume libinput context");
                }
            }
        } else {
            // pause operations
            if let BackendData::Kms(kms) = &self.backend {
                kms.libinput.suspend();
            }
        }
    }

    pub fn process_input_event<B: smithay::backend::input::InputBackend>(
        &mut self,
        event: InputEvent<B>,
    )
    where
        <B as smithay::backend::input::InputBackend>::Device: 'static,
    {
        self.process_input_event_impl(event);
    }
}

impl OutputConfigurationHandler for State {
    fn output_configuration_state(&mut self) -> &mut OutputConfigurationState {
        &mut self.output_configuration_state
    }

    /// A requested mode must already be one the output itself advertises;
    /// there's no real modesetting hardware behind a `Custom` mode to
    /// validate against, so those are accepted on faith.
    fn test_configuration(&mut self, configs: Vec<(Output, OutputConfiguration)>) -> bool {
        configs.iter().all(|(output, conf)| match conf {
            OutputConfiguration::Enabled {
                mode: Some(ModeConfiguration::Mode(mode)),
                ..
            } => output.modes().contains(mode),
            _ => true,
        })
    }

    fn apply_configuration(&mut self, configs: Vec<(Output, OutputConfiguration)>) -> bool {
        if !self.test_configuration(configs.clone()) {
            return false;
        }

        for (output, conf) in &configs {
            match conf {
                OutputConfiguration::Enabled {
                    mode,
                    position,
                    transform,
                    scale,
                    ..
                } => {
                    let new_mode = match mode {
                        Some(ModeConfiguration::Mode(mode)) => Some(*mode),
                        Some(ModeConfiguration::Custom { size, refresh }) => Some(Mode {
                            size: *size,
                            refresh: refresh.unwrap_or_else(|| {
                                output.current_mode().map(|m| m.refresh).unwrap_or(60_000)
                            }),
                        }),
                        None => output.current_mode(),
                    };
                    output.change_current_state(
                        new_mode,
                        *transform,
                        scale.map(Scale::Fractional),
                        *position,
                    );
                    self.backend.schedule_render(output);
                }
                OutputConfiguration::Disabled => {
                    // Actually powering down the connector is a backend
                    // concern this compositor doesn't implement; the head
                    // stays enabled but unused until unplugged.
                }
            }
        }

        self.output_configuration_state().update();
        true
    }
}
