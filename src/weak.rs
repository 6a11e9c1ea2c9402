// SPDX-License-Identifier: GPL-3.0-only

//! Upgrade-on-use weak handles.
//!
//! The active-output pointer, the cursor grab's target view, the seat's
//! focused surfaces, and the keybinding filter's bound client are all
//! observe-then-check references: something else may have destroyed the
//! referent since the reference was taken, and every read site has to be
//! prepared for that. `Rc`/`Weak` gives us this for free on a
//! single-threaded event loop without reaching for a generational slab.

use std::rc::{Rc, Weak};

/// A weak handle to a reference-counted value, upgraded (and checked for
/// liveness) at the point of use rather than cached.
pub struct WeakHandle<T>(Weak<T>);

impl<T> WeakHandle<T> {
    pub fn upgrade(&self) -> Option<Rc<T>> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> From<&Rc<T>> for WeakHandle<T> {
    fn from(rc: &Rc<T>) -> Self {
        Self(Rc::downgrade(rc))
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        Self(Weak::new())
    }
}

impl<T> std::fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeakHandle({})", if self.is_alive() { "alive" } else { "dead" })
    }
}
