// SPDX-License-Identifier: GPL-3.0-only

pub mod fractional_scale;
pub mod handlers;
pub mod keybindings_protocol;
pub mod layer_shell;
pub mod mousegrabber;
pub mod output_configuration;
pub mod primary_selection;
pub mod xdg_activation;

use smithay::{
    backend::renderer::utils::{on_commit_buffer_handler, with_renderer_surface_state},
    delegate_compositor, delegate_cursor_shape, delegate_data_device, delegate_output,
    delegate_pointer_gestures, delegate_presentation, delegate_relative_pointer, delegate_seat,
    delegate_shm, delegate_text_input_manager, delegate_viewporter, delegate_xdg_decoration,
    delegate_xdg_shell,
    desktop::{find_popup_root_surface, PopupKeyboardGrab, PopupKind, PopupPointerGrab, PopupUngrabStrategy},
    input::{pointer::Focus, Seat},
    output::Output,
    reexports::wayland_protocols::xdg::decoration::zv1::server::zxdg_toplevel_decoration_v1::Mode,
    reexports::wayland_protocols::xdg::shell::server::xdg_toplevel,
    reexports::wayland_server::{
        protocol::{wl_buffer::WlBuffer, wl_output::WlOutput, wl_seat::WlSeat, wl_surface::WlSurface},
        Client,
    },
    utils::{Rectangle, Serial, Size, SERIAL_COUNTER},
    wayland::{
        buffer::BufferHandler,
        compositor::{CompositorClientState, CompositorHandler, CompositorState},
        output::OutputHandler,
        selection::{
            data_device::{
                ClientDndGrabHandler, DataDeviceHandler, DataDeviceState, ServerDndGrabHandler,
            },
            SelectionHandler,
        },
        shell::xdg::{
            decoration::XdgDecorationHandler, PopupSurface, PositionerState, ToplevelSurface,
            XdgShellHandler, XdgShellState,
        },
        shm::{ShmHandler, ShmState},
    },
};

use self::handlers::ClientState;
use crate::shell::cursor::ResizeEdge;
use crate::shell::output::{OutputState, LAYERS_BACK_TO_FRONT};
use crate::shell::view::View;
use crate::State;

impl CompositorHandler for State {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(&self, client: &'a Client) -> &'a CompositorClientState {
        &client.get_data::<ClientState>().unwrap().compositor_state
    }

    /// §4.1: load the buffer, then route the commit to whichever model it
    /// belongs to — a layer-shell surface re-arranges its output, a view
    /// surface goes through the map/geometry-negotiation routine.
    fn commit(&mut self, surface: &WlSurface) {
        on_commit_buffer_handler::<Self>(surface);

        if self.commit_layer_surface(surface) {
            return;
        }

        self.commit_view_surface(surface);
    }
}

impl State {
    fn commit_layer_surface(&mut self, surface: &WlSurface) -> bool {
        let outputs: Vec<Output> = self.shell.outputs.borrow().iter().cloned().collect();
        for output in outputs {
            OutputState::install(&output);
            let state = OutputState::get(&output);
            let found = LAYERS_BACK_TO_FRONT.iter().any(|&layer| {
                state
                    .layer_list(layer)
                    .borrow()
                    .iter()
                    .any(|ls| ls.surface.wl_surface() == surface)
            });
            if found {
                crate::shell::layer::arrange_layers(&output);
                self.refresh_layer_keyboard_focus(&output);
                self.backend.schedule_render(&output);
                return true;
            }
        }
        false
    }

    fn commit_view_surface(&mut self, surface: &WlSurface) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };

        let has_buffer =
            with_renderer_surface_state(surface, |s| s.buffer().is_some()).unwrap_or(false);

        if !view.mapped() {
            // A commit on an unmapped view without a buffer yet is dropped
            // silently (§4.1 failure semantics); once a buffer lands, map.
            if has_buffer {
                self.map_view(&view);
            }
            return;
        }

        if !has_buffer {
            return;
        }

        if let Some(size) = with_renderer_surface_state(surface, |s| s.surface_size()).flatten() {
            self.shell.reconcile_view_commit(&view, size);
            self.schedule_render_for_view(&view);
        }
    }

    fn map_view(&mut self, view: &View) {
        let output = self
            .shell
            .active_output
            .get()
            .or_else(|| self.shell.outputs.borrow().first().cloned());

        let size = view
            .get_size()
            .filter(|s| s.w > 0 && s.h > 0)
            .or_else(|| with_renderer_surface_state(view.main_surface(), |s| s.surface_size()).flatten())
            .unwrap_or_else(|| Size::from((0, 0)));

        let loc = output
            .as_ref()
            .and_then(|o| self.shell.output_geometry(o))
            .map(|g| g.as_rectangle().loc)
            .unwrap_or_default();

        view.set_current(Rectangle::new(loc, size));
        view.set_mapped(true);

        self.shell.focus_view(view);
        self.seat_focus.set_focused_view(Some(view));
        if let Some(keyboard) = self.seat.get_keyboard() {
            let serial = SERIAL_COUNTER.next_serial();
            keyboard.set_focus(self, Some(view.main_surface().clone()), serial);
        }
        self.shell.damage_view(view);

        if let Some(output) = output {
            self.backend.schedule_render(&output);
        }
    }

    /// Look up the view (if any) whose main surface is `surface`.
    fn view_for_surface(&self, surface: &WlSurface) -> Option<View> {
        self.shell
            .views
            .borrow()
            .iter()
            .find(|v| v.main_surface() == surface)
            .cloned()
    }

    /// Whether `view`'s main surface currently holds pointer focus — the
    /// gate move/resize requests must pass per §4.4.
    fn view_has_pointer_focus(&self, view: &View) -> bool {
        self.seat
            .get_pointer()
            .and_then(|p| p.current_focus())
            .as_ref()
            == Some(view.main_surface())
    }

    fn schedule_render_for_view(&mut self, view: &View) {
        let rect = view.current();
        let outputs: Vec<Output> = self
            .shell
            .outputs
            .borrow()
            .iter()
            .filter(|o| {
                self.shell
                    .output_geometry(o)
                    .map(|g| g.as_rectangle().overlaps(rect))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for output in outputs {
            self.backend.schedule_render(&output);
        }
    }
}

fn convert_resize_edge(edges: xdg_toplevel::ResizeEdge) -> ResizeEdge {
    use xdg_toplevel::ResizeEdge as X;
    match edges {
        X::Top => ResizeEdge::TOP,
        X::Bottom => ResizeEdge::BOTTOM,
        X::Left => ResizeEdge::LEFT,
        X::Right => ResizeEdge::RIGHT,
        X::TopLeft => ResizeEdge::TOP | ResizeEdge::LEFT,
        X::TopRight => ResizeEdge::TOP | ResizeEdge::RIGHT,
        X::BottomLeft => ResizeEdge::BOTTOM | ResizeEdge::LEFT,
        X::BottomRight => ResizeEdge::BOTTOM | ResizeEdge::RIGHT,
        _ => ResizeEdge::empty(),
    }
}

impl BufferHandler for State {
    fn buffer_destroyed(&mut self, _buffer: &WlBuffer) {}
}

impl ShmHandler for State {
    fn shm_state(&self) -> &ShmState {
        &self.shm_state
    }
}

impl OutputHandler for State {}

impl SelectionHandler for State {
    type SelectionUserData = ();
}

impl ClientDndGrabHandler for State {}
impl ServerDndGrabHandler for State {}
impl DataDeviceHandler for State {
    fn data_device_state(&mut self) -> &mut DataDeviceState {
        &mut self.data_device_state
    }
}

impl XdgShellHandler for State {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    /// A new toplevel is inserted unmapped at the head of the view list
    /// (§4.1); it is mapped once its first commit carries a buffer.
    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        let initial_size = self
            .shell
            .outputs
            .borrow()
            .first()
            .map(|output| {
                let scale = output.current_scale().fractional_scale();
                if scale > 1.5 {
                    Size::from((640, 480))
                } else {
                    Size::from((800, 600))
                }
            })
            .unwrap_or_else(|| Size::from((800, 600)));

        surface.with_pending_state(|state| {
            state.states.set(xdg_toplevel::State::Activated);
            state.size = Some(initial_size);
        });
        surface.send_configure();

        self.shell.add_view(View::new_xdg(surface));
    }

    fn new_popup(&mut self, surface: PopupSurface, positioner: PositionerState) {
        surface.with_pending_state(|state| {
            state.geometry = positioner.get_geometry();
            state.positioner = positioner;
        });

        self.shell.unconstrain_popup(&surface);

        if let Err(err) = surface.send_configure() {
            tracing::warn!(?err, "failed to configure popup");
        } else if let Err(err) = self.popups.track_popup(PopupKind::from(surface)) {
            tracing::warn!(?err, "failed to track popup");
        }
    }

    fn move_request(&mut self, surface: ToplevelSurface, _seat: WlSeat, _serial: Serial) {
        let Some(view) = self.view_for_surface(surface.wl_surface()) else {
            return;
        };
        if !self.view_has_pointer_focus(&view) {
            return;
        }
        self.shell.cursor.start_move(&view, self.shell.cursor.position());
    }

    fn resize_request(
        &mut self,
        surface: ToplevelSurface,
        _seat: WlSeat,
        _serial: Serial,
        edges: xdg_toplevel::ResizeEdge,
    ) {
        let Some(view) = self.view_for_surface(surface.wl_surface()) else {
            return;
        };
        if !self.view_has_pointer_focus(&view) {
            return;
        }
        self.shell
            .cursor
            .start_resize(&view, self.shell.cursor.position(), convert_resize_edge(edges));
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        let Some(view) = self.view_for_surface(surface.wl_surface()) else {
            return;
        };

        let was_focused = self
            .seat_focus
            .focused_view()
            .map(|f| f.ptr_eq(&view))
            .unwrap_or(false);

        self.shell.damage_view(&view);
        self.shell.remove_view(&view);

        if was_focused {
            self.seat_focus.set_focused_view(None);
            let serial = SERIAL_COUNTER.next_serial();
            if let Some(keyboard) = self.seat.get_keyboard() {
                keyboard.set_focus(self, Option::<WlSurface>::None, serial);
            }
            if let Some(next) = self.shell.focused_view() {
                self.seat_focus.set_focused_view(Some(&next));
                if let Some(keyboard) = self.seat.get_keyboard() {
                    let serial = SERIAL_COUNTER.next_serial();
                    keyboard.set_focus(self, Some(next.main_surface().clone()), serial);
                }
            }
        }

        if let Some(output) = self
            .shell
            .active_output
            .get()
            .or_else(|| self.shell.outputs.borrow().first().cloned())
        {
            self.backend.schedule_render(&output);
        }
    }

    fn fullscreen_request(&mut self, surface: ToplevelSurface, wl_output: Option<WlOutput>) {
        surface.with_pending_state(|state| {
            state.states.set(xdg_toplevel::State::Fullscreen);
            state.fullscreen_output = wl_output.clone();
        });

        let Some(view) = self.view_for_surface(surface.wl_surface()) else {
            // Not mapped yet; `new_toplevel`'s initial configure will pick
            // the fullscreen state up once the view is created and mapped.
            return;
        };

        let output = wl_output
            .as_ref()
            .and_then(Output::from_resource)
            .or_else(|| self.shell.active_output.get())
            .or_else(|| self.shell.outputs.borrow().first().cloned());

        match output {
            Some(output) => self.shell.fullscreen_view(&view, &output),
            None => {
                surface.send_configure();
            }
        }
    }

    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        surface.with_pending_state(|state| {
            state.states.unset(xdg_toplevel::State::Fullscreen);
            state.fullscreen_output = None;
        });

        match self.view_for_surface(surface.wl_surface()) {
            Some(view) => self.shell.unfullscreen_view(&view),
            None => {
                surface.send_configure();
            }
        }
    }

    fn grab(&mut self, surface: PopupSurface, seat: WlSeat, serial: Serial) {
        let seat = Seat::from_resource(&seat).unwrap();
        let kind = PopupKind::Xdg(surface);

        let Ok(root_surface) = find_popup_root_surface(&kind) else {
            tracing::warn!("no root surface found for popup grab");
            return;
        };

        let ret = self.popups.grab_popup(root_surface, kind, &seat, serial);

        match ret {
            Ok(mut grab) => {
                if let Some(keyboard) = seat.get_keyboard() {
                    if keyboard.is_grabbed()
                        && !(keyboard.has_grab(serial)
                            || keyboard.has_grab(grab.previous_serial().unwrap_or(serial)))
                    {
                        grab.ungrab(PopupUngrabStrategy::All);
                        return;
                    }
                    keyboard.set_grab(self, PopupKeyboardGrab::new(&grab), serial);
                }

                if let Some(pointer) = seat.get_pointer() {
                    if pointer.is_grabbed()
                        && !(pointer.has_grab(serial)
                            || pointer.has_grab(grab.previous_serial().unwrap_or(serial)))
                    {
                        grab.ungrab(PopupUngrabStrategy::All);
                        return;
                    }
                    pointer.set_grab(self, PopupPointerGrab::new(&grab), serial, Focus::Keep);
                }
            }
            Err(err) => {
                tracing::warn!("Failed to grab popup: {:?}", err);
            }
        }
    }

    fn reposition_request(&mut self, _surface: PopupSurface, _positioner: PositionerState, _token: u32) {}
}

impl XdgDecorationHandler for State {
    fn new_decoration(&mut self, toplevel: ToplevelSurface) {
        // always use server-side decorations (no client decorations)
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(Mode::ServerSide);
        });

        if toplevel.is_initial_configure_sent() {
            toplevel.send_configure();
        }
    }

    fn request_mode(&mut self, _toplevel: ToplevelSurface, _mode: Mode) {}

    fn unset_mode(&mut self, _toplevel: ToplevelSurface) {}
}

delegate_compositor!(State);
delegate_xdg_decoration!(State);
delegate_data_device!(State);
delegate_output!(State);
delegate_shm!(State);
delegate_seat!(State);
delegate_cursor_shape!(State);
delegate_xdg_shell!(State);
delegate_presentation!(State);

delegate_viewporter!(State);
delegate_pointer_gestures!(State);
delegate_relative_pointer!(State);
delegate_text_input_manager!(State);

// SeatHandler is implemented in input/mod.rs

use crate::delegate_output_configuration;
delegate_output_configuration!(State);

use crate::delegate_mousegrabber;
delegate_mousegrabber!(State);

use crate::delegate_keybindings;
delegate_keybindings!(State);
