// SPDX-License-Identifier: GPL-3.0-only

pub mod keybindings;

use smithay::{
    backend::input::{
        AbsolutePositionEvent, Axis, AxisSource, ButtonState, Device, Event, InputBackend,
        InputEvent, KeyboardKeyEvent, PointerAxisEvent, PointerButtonEvent, PointerMotionEvent,
    },
    input::{
        keyboard::FilterResult,
        pointer::{AxisFrame, ButtonEvent, CursorImageStatus, MotionEvent},
        Seat, SeatHandler, SeatState,
    },
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Point, SERIAL_COUNTER},
};
use tracing::{debug, info, trace};

use self::keybindings::{FilterVerdict, ModMask};
use crate::shell::cursor::CursorMode;
use crate::State;

impl State {
    pub fn process_input_event_impl<B: InputBackend>(&mut self, event: InputEvent<B>)
    where
        <B as InputBackend>::Device: 'static,
    {
        match event {
            InputEvent::DeviceAdded { device } => {
                info!(name = %device.name(), "input device added");
            }

            InputEvent::DeviceRemoved { device } => {
                info!(name = %device.name(), "input device removed");
            }

            InputEvent::Keyboard { event, .. } => self.on_keyboard_key::<B>(event),

            InputEvent::PointerMotion { event, .. } => self.on_pointer_motion::<B>(event),

            InputEvent::PointerMotionAbsolute { event, .. } => {
                self.on_pointer_motion_absolute::<B>(event)
            }

            InputEvent::PointerButton { event, .. } => self.on_pointer_button::<B>(event),

            InputEvent::PointerAxis { event, .. } => self.on_pointer_axis::<B>(event),

            _ => trace!("unhandled input event"),
        }
    }

    /// §4.7: evaluate every key through the keybinding filter before the
    /// regular keyboard-focus dispatch. A `Diverted` chord or the
    /// hard-coded terminator is intercepted here, sent to the bound
    /// controller over the `keybindings_v1` protocol, and never reaches
    /// the focused client.
    fn on_keyboard_key<B: InputBackend>(&mut self, event: B::KeyboardKeyEvent) {
        let keycode = event.key_code();
        let key_state = event.state();
        let serial = SERIAL_COUNTER.next_serial();
        let time = Event::time_msec(&event);
        let pressed = key_state == smithay::backend::input::KeyState::Pressed;

        trace!(?keycode, ?key_state, "keyboard event");

        let Some(keyboard) = self.seat.get_keyboard() else {
            return;
        };

        let controller_owns_focus = self
            .keybinding_filter
            .controller_has_keyboard_focus(keyboard.current_focus().as_ref());

        keyboard.input(
            self,
            keycode,
            key_state,
            serial,
            time,
            |state, modifiers, _keysym| {
                let mods = ModMask::from_modifiers_state(modifiers).bits();
                let verdict = state.keybinding_filter.evaluate(keycode.raw(), mods, pressed);

                let diverted = matches!(verdict, FilterVerdict::Diverted | FilterVerdict::Terminate);
                if diverted || controller_owns_focus {
                    state.send_keybinding_event(time, keycode.raw(), pressed, mods);
                }

                match verdict {
                    FilterVerdict::Forward => FilterResult::Forward,
                    FilterVerdict::Diverted => FilterResult::Intercept(()),
                    FilterVerdict::Terminate => {
                        info!("terminator keybinding pressed, shutting down");
                        state.should_stop = true;
                        state.loop_signal.stop();
                        FilterResult::Intercept(())
                    }
                }
            },
        );
    }

    /// §4.7: deliver a `key` event to the bound controller client, either
    /// because the chord matched the registered set (or the terminator)
    /// or because the controller currently owns keyboard focus and so
    /// sees every key regardless of registration.
    fn send_keybinding_event(&self, time: u32, keycode: u32, pressed: bool, modifiers: u32) {
        use woven_protocols::server::keybindings_v1::keybindings_v1;

        if let Some(resource) = self.keybinding_filter.bound_resource() {
            let key_state = if pressed {
                keybindings_v1::KeyState::Pressed
            } else {
                keybindings_v1::KeyState::Released
            };
            resource.key(time, keycode, key_state, modifiers);
        }
    }

    fn on_pointer_motion<B: InputBackend>(&mut self, event: B::PointerMotionEvent) {
        let pointer = self.seat.get_pointer().unwrap();
        let mut new_pos = pointer.current_location() + event.delta();

        if let Some(bounds) = self.shell.bounding_box() {
            let min_x = bounds.loc.x as f64;
            let max_x = (bounds.loc.x + bounds.size.w) as f64 - 1.0;
            let min_y = bounds.loc.y as f64;
            let max_y = (bounds.loc.y + bounds.size.h) as f64 - 1.0;
            new_pos.x = new_pos.x.clamp(min_x, min_x.max(max_x));
            new_pos.y = new_pos.y.clamp(min_y, min_y.max(max_y));
        }

        let time = Event::time_msec(&event);
        self.handle_pointer_motion(new_pos, time);
    }

    fn on_pointer_motion_absolute<B: InputBackend>(&mut self, event: B::PointerMotionAbsoluteEvent) {
        let output = self
            .shell
            .active_output
            .get()
            .or_else(|| self.shell.outputs.borrow().first().cloned());
        let Some(output) = output else { return };
        let Some(geo) = self.shell.output_geometry(&output) else {
            return;
        };
        let rect = geo.as_rectangle();

        let new_pos = Point::from((
            rect.loc.x as f64 + event.x_transformed(rect.size.w),
            rect.loc.y as f64 + event.y_transformed(rect.size.h),
        ));

        let time = Event::time_msec(&event);
        self.handle_pointer_motion(new_pos, time);
    }

    /// Dispatch a new absolute cursor position through the cursor state
    /// machine (§4.4): drive the active grab if one is in progress,
    /// otherwise do the point-in-layout query for plain hover/enter.
    fn handle_pointer_motion(&mut self, new_pos: Point<f64, Logical>, time: u32) {
        self.shell.cursor.set_position(new_pos);

        if let Some(output) = self.shell.output_at(new_pos) {
            self.shell.active_output.set(Some(&output));
        }

        // §4.4/§4.8: while a controller client holds the cursor override,
        // motion streams to it instead of the normal pointer-enter/motion
        // routing — no regular client sees this event.
        if let Some(resource) = self.mousegrabber_state.grabber().grabber_resource() {
            resource.mouse_moved(new_pos.x.round() as i32, new_pos.y.round() as i32);
            return;
        }

        let serial = SERIAL_COUNTER.next_serial();
        let pointer = self.seat.get_pointer().unwrap();

        match self.shell.cursor.mode() {
            CursorMode::Move => {
                if let Some(view) = self.shell.cursor.live_grabbed_view() {
                    if let Some(loc) = self.shell.cursor.move_delta(new_pos) {
                        self.shell.move_view(&view, loc);
                        self.schedule_render_for_view(&view);
                    }
                }
                pointer.motion(self, None, &MotionEvent { location: new_pos, serial, time });
            }
            CursorMode::Resize => {
                if let Some(view) = self.shell.cursor.live_grabbed_view() {
                    let edges = self.shell.cursor.grab_resize_edges();
                    if let Some(rect) = self.shell.cursor.resize_rect(new_pos) {
                        self.shell.request_view_geometry(&view, rect, edges);
                        self.schedule_render_for_view(&view);
                    }
                }
                pointer.motion(self, None, &MotionEvent { location: new_pos, serial, time });
            }
            CursorMode::Passthrough => {
                let under = self.shell.view_at(new_pos).map(|(_, surface, local)| {
                    let origin = (new_pos - local).to_i32_round();
                    (surface, origin)
                });

                if under.is_none() {
                    self.shell.cursor.revert_to_default();
                }

                pointer.motion(self, under, &MotionEvent { location: new_pos, serial, time });
            }
        }
    }

    /// §4.5: a press on a view focuses it (no-op if already focused); any
    /// release ends an in-progress Move/Resize grab and returns to
    /// Passthrough.
    fn on_pointer_button<B: InputBackend>(&mut self, event: B::PointerButtonEvent) {
        let button = event.button_code();
        let button_state = event.state();
        let serial = SERIAL_COUNTER.next_serial();
        let time = Event::time_msec(&event);

        debug!(button, ?button_state, "pointer button");

        // §4.5/§4.8: a bound cursor-override client claims every button
        // event; it is forwarded over that protocol and never reaches a
        // regular client.
        if let Some(resource) = self.mousegrabber_state.grabber().grabber_resource() {
            use woven_protocols::server::mousegrabber_v1::mousegrabber_v1;
            let pos = self.shell.cursor.position();
            let state = if button_state == ButtonState::Pressed {
                mousegrabber_v1::ButtonState::Pressed
            } else {
                mousegrabber_v1::ButtonState::Released
            };
            resource.mouse_button(pos.x.round() as i32, pos.y.round() as i32, state, button);

            if button_state == ButtonState::Released && self.shell.cursor.mode() != CursorMode::Passthrough {
                self.shell.cursor.end_grab();
            }
            return;
        }

        if button_state == ButtonState::Pressed && self.shell.cursor.mode() == CursorMode::Passthrough
        {
            if let Some((view, _, _)) = self.shell.view_at(self.shell.cursor.position()) {
                self.shell.focus_view(&view);
                self.seat_focus.set_focused_view(Some(&view));
                if let Some(keyboard) = self.seat.get_keyboard() {
                    let focus_serial = SERIAL_COUNTER.next_serial();
                    keyboard.set_focus(self, Some(view.main_surface().clone()), focus_serial);
                }
                self.schedule_render_for_view(&view);
            }
        } else if button_state == ButtonState::Released
            && self.shell.cursor.mode() != CursorMode::Passthrough
        {
            self.shell.cursor.end_grab();
        }

        let pointer = self.seat.get_pointer().unwrap();
        pointer.button(
            self,
            &ButtonEvent { button, state: button_state.into(), serial, time },
        );
    }

    fn on_pointer_axis<B: InputBackend>(&mut self, event: B::PointerAxisEvent) {
        trace!("pointer axis");

        let pointer = self.seat.get_pointer().unwrap();
        let source = event.source();

        let mut frame = AxisFrame::new(Event::time_msec(&event)).source(source);

        if let Some(horizontal) = event.amount(Axis::Horizontal) {
            frame = frame.value(Axis::Horizontal, horizontal);
            if let Some(discrete) = event.amount_v120(Axis::Horizontal) {
                frame = frame.v120(Axis::Horizontal, discrete as i32);
            }
        }

        if let Some(vertical) = event.amount(Axis::Vertical) {
            frame = frame.value(Axis::Vertical, vertical);
            if let Some(discrete) = event.amount_v120(Axis::Vertical) {
                frame = frame.v120(Axis::Vertical, discrete as i32);
            }
        }

        if source == AxisSource::Finger
            && event.amount(Axis::Horizontal) == Some(0.0)
            && event.amount(Axis::Vertical) == Some(0.0)
        {
            frame = frame.stop(Axis::Horizontal).stop(Axis::Vertical);
        }

        pointer.axis(self, frame);
    }
}

impl SeatHandler for State {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<Self> {
        &mut self.seat_state
    }

    /// Track the client's requested cursor surface so the render pipeline
    /// can draw it in place of the named image (§4.4's image-priority
    /// chain: compositor override, then client surface, then default).
    fn cursor_image(&mut self, _seat: &Seat<Self>, image: CursorImageStatus) {
        match image {
            CursorImageStatus::Surface(surface) => {
                self.shell.cursor.set_client_image(Some(surface));
            }
            _ => {
                self.shell.cursor.set_client_image(None);
            }
        }

        if let Some(output) = self.shell.active_output.get() {
            self.backend.schedule_render(&output);
        }
    }

    fn focus_changed(&mut self, _seat: &Seat<Self>, _focused: Option<&Self::KeyboardFocus>) {}
}
