use std::env;
use std::path::PathBuf;

use wayland_scanner::{generate_code, Side};

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());

    for name in ["mousegrabber-v1", "keybindings-v1"] {
        let xml = format!("protocol/{name}.xml");
        println!("cargo:rerun-if-changed={xml}");
        generate_code(
            &xml,
            out_dir.join(format!("{}.rs", name.replace('-', "_"))),
            Side::Server,
        );
    }
}
