//! Generated server-side bindings for the two custom protocol extensions
//! this compositor exposes to a single privileged controller client:
//! `mousegrabber_v1` (cursor override) and `keybindings_v1` (keybinding
//! filter). Neither protocol is part of any published wayland-protocols
//! release, so their Rust bindings are generated here from a local `.xml`
//! description the same way `wayland-protocols-wlr` generates its own.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(missing_docs)]

#[cfg(feature = "server")]
pub mod server {
    pub mod mousegrabber_v1 {
        use wayland_server::protocol::*;
        use wayland_server::{self, backend};
        include!(concat!(env!("OUT_DIR"), "/mousegrabber_v1.rs"));
    }

    pub mod keybindings_v1 {
        use wayland_server::protocol::*;
        use wayland_server::{self, backend};
        include!(concat!(env!("OUT_DIR"), "/keybindings_v1.rs"));
    }
}
