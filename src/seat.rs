// SPDX-License-Identifier: GPL-3.0-only

//! Seat focus bookkeeping (§3/§4.6). smithay's `Keyboard`/`Pointer`
//! handles already track "current focus" internally; this wraps the
//! extra piece the spec calls out explicitly — a weak reference to the
//! *view* (not just the surface) currently holding keyboard focus, so
//! §4.2's focus-change ordering (deactivate outgoing, activate incoming)
//! has something to deactivate.

use std::cell::RefCell;

use crate::shell::view::{View, WeakView};

#[derive(Default)]
pub struct SeatFocus {
    keyboard_view: RefCell<Option<WeakView>>,
}

impl SeatFocus {
    pub fn focused_view(&self) -> Option<View> {
        self.keyboard_view
            .borrow()
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(View::from_rc)
    }

    pub fn set_focused_view(&self, view: Option<&View>) {
        *self.keyboard_view.borrow_mut() = view.map(View::downgrade);
    }
}
