// SPDX-License-Identifier: GPL-3.0-only

//! The keybinding filter (§4.7): an indexed set of keycode+modifier
//! chords that divert matching key events to a single privileged
//! controller client instead of the focused regular client, plus the
//! hard-coded `Ctrl+Shift+Escape` terminator that always fires.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use smithay::input::keyboard::ModifiersState;
use smithay::reexports::wayland_server::Client;

use woven_protocols::server::keybindings_v1::keybindings_v1::Keybindings as KeybindingsResource;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModMask: u32 {
        const SHIFT   = 0b0000_0001;
        const CAPS    = 0b0000_0010;
        const CTRL    = 0b0000_0100;
        const ALT     = 0b0000_1000;
        const MOD2    = 0b0001_0000;
        const MOD3    = 0b0010_0000;
        const LOGO    = 0b0100_0000;
        const MOD5    = 0b1000_0000;
    }
}

/// `caps-lock` and `mod2` (num-lock, on most layouts) are stripped from
/// both stored and queried masks so they don't perturb matching.
const IGNORED_MODS: u32 = ModMask::CAPS.bits() | ModMask::MOD2.bits();

impl ModMask {
    pub fn from_modifiers_state(state: &ModifiersState) -> Self {
        let mut mask = ModMask::empty();
        if state.shift { mask |= ModMask::SHIFT; }
        if state.caps_lock { mask |= ModMask::CAPS; }
        if state.ctrl { mask |= ModMask::CTRL; }
        if state.alt { mask |= ModMask::ALT; }
        if state.num_lock { mask |= ModMask::MOD2; }
        if state.logo { mask |= ModMask::LOGO; }
        mask
    }

    /// Strip the lock/mod2 bits that should never affect chord matching.
    pub fn normalized(self) -> Self {
        Self::from_bits_truncate(self.bits() & !IGNORED_MODS)
    }
}

/// keycode for `Escape` on a standard PC-105 XKB layout.
const KEYCODE_ESCAPE: u32 = 9;

/// The filter's registered-chords set plus the single bound controller
/// resource, and the bookkeeping needed to resolve the open question of
/// whether a filtered press also filters its matching release: track
/// which (keycode, normalized-mask) pairs are "currently diverted" —
/// pressed and filtered but not yet released.
#[derive(Default)]
pub struct KeybindingFilter {
    registered: RefCell<HashMap<u32, HashSet<u32>>>,
    bound: RefCell<Option<KeybindingsResource>>,
    diverted: RefCell<HashSet<(u32, u32)>>,
}

pub enum FilterVerdict {
    /// Forward to the focused regular client.
    Forward,
    /// Deliver only to the bound controller client.
    Diverted,
    /// The hard-coded terminator chord; the caller should shut down.
    Terminate,
}

impl KeybindingFilter {
    pub fn register(&self, keycode: u32, modifiers: u32) {
        self.registered
            .borrow_mut()
            .entry(keycode)
            .or_default()
            .insert(ModMask::from_bits_truncate(modifiers).normalized().bits());
    }

    pub fn clear_all(&self) {
        self.registered.borrow_mut().clear();
        self.diverted.borrow_mut().clear();
    }

    pub fn bind(&self, resource: KeybindingsResource) -> bool {
        if self.bound.borrow().is_some() {
            return false;
        }
        *self.bound.borrow_mut() = Some(resource);
        true
    }

    pub fn owner_client(&self) -> Option<Client> {
        self.bound.borrow().as_ref().and_then(|r| r.client())
    }

    pub fn is_owner(&self, client: &Client) -> bool {
        self.owner_client().as_ref() == Some(client)
    }

    pub fn unbind(&self, client: &Client) {
        if self.is_owner(client) {
            self.bound.borrow_mut().take();
            self.clear_all();
        }
    }

    pub fn bound_resource(&self) -> Option<KeybindingsResource> {
        self.bound.borrow().clone()
    }

    pub fn controller_has_keyboard_focus(
        &self,
        focused: Option<&smithay::reexports::wayland_server::protocol::wl_surface::WlSurface>,
    ) -> bool {
        let Some(owner) = self.owner_client() else { return false };
        let Some(focused) = focused else { return false };
        focused.client().as_ref() == Some(&owner)
    }

    /// Evaluate a key event per §4.7/§9(iii): a registered chord (or the
    /// hard terminator) diverts on press; the matching release is
    /// diverted too, keyed on keycode+mask of the press.
    pub fn evaluate(&self, keycode: u32, modifiers: u32, pressed: bool) -> FilterVerdict {
        let mask = ModMask::from_bits_truncate(modifiers).normalized();

        if keycode == KEYCODE_ESCAPE && mask.contains(ModMask::CTRL | ModMask::SHIFT) && pressed {
            return FilterVerdict::Terminate;
        }

        let key = (keycode, mask.bits());
        if pressed {
            let matches = self
                .registered
                .borrow()
                .get(&keycode)
                .map(|masks| masks.contains(&mask.bits()))
                .unwrap_or(false);
            if matches {
                self.diverted.borrow_mut().insert(key);
                FilterVerdict::Diverted
            } else {
                FilterVerdict::Forward
            }
        } else if self.diverted.borrow_mut().remove(&key) {
            FilterVerdict::Diverted
        } else {
            FilterVerdict::Forward
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_mod2_bits_do_not_affect_matching() {
        let filter = KeybindingFilter::default();
        filter.register(24, (ModMask::CTRL | ModMask::ALT).bits());

        match filter.evaluate(24, (ModMask::CTRL | ModMask::ALT | ModMask::CAPS).bits(), true) {
            FilterVerdict::Diverted => {}
            _ => panic!("expected chord with caps-lock set to still match"),
        }
    }

    #[test]
    fn unregistered_chord_forwards() {
        let filter = KeybindingFilter::default();
        filter.register(24, ModMask::CTRL.bits());
        match filter.evaluate(24, ModMask::CTRL.bits() | ModMask::ALT.bits(), true) {
            FilterVerdict::Forward => {}
            _ => panic!("a superset of modifiers should not match an unregistered combination"),
        }
    }

    #[test]
    fn register_clear_register_round_trips() {
        let filter = KeybindingFilter::default();
        filter.register(10, ModMask::CTRL.bits());
        filter.clear_all();
        filter.register(10, ModMask::CTRL.bits());
        assert!(matches!(
            filter.evaluate(10, ModMask::CTRL.bits(), true),
            FilterVerdict::Diverted
        ));
    }

    #[test]
    fn filtered_press_also_filters_matching_release() {
        let filter = KeybindingFilter::default();
        filter.register(24, ModMask::CTRL.bits());
        assert!(matches!(filter.evaluate(24, ModMask::CTRL.bits(), true), FilterVerdict::Diverted));
        assert!(matches!(filter.evaluate(24, ModMask::CTRL.bits(), false), FilterVerdict::Diverted));
    }

    #[test]
    fn terminator_chord_fires_regardless_of_registration() {
        let filter = KeybindingFilter::default();
        assert!(matches!(
            filter.evaluate(KEYCODE_ESCAPE, (ModMask::CTRL | ModMask::SHIFT).bits(), true),
            FilterVerdict::Terminate
        ));
    }
}
