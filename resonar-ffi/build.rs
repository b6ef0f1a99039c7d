// Emits `resonar.h` into $OUT_DIR.
//
// With `cbindgen` on PATH the header is regenerated from src/lib.rs and the
// checked-in copy under include/ is refreshed. Without it the checked-in
// include/resonar.h is copied as-is.

use std::path::{Path, PathBuf};
use std::{env, fs, process::Command};

const HEADER: &str = "resonar.h";

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/{HEADER}");
    println!("cargo:rerun-if-env-changed=RESONAR_SKIP_CBINDGEN");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let checked_in = crate_dir.join("include").join(HEADER);
    let generated = out_dir.join(HEADER);

    if env::var_os("RESONAR_SKIP_CBINDGEN").is_none() && run_cbindgen(&crate_dir, &generated) {
        let _ = fs::copy(&generated, &checked_in);
        return;
    }

    fs::copy(&checked_in, &generated)
        .unwrap_or_else(|e| panic!("copying {} to OUT_DIR: {e}", checked_in.display()));
}

fn run_cbindgen(crate_dir: &Path, output: &Path) -> bool {
    let available = Command::new("cbindgen")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !available {
        println!("cargo:warning=resonar-ffi: cbindgen not found; using include/{HEADER}");
        return false;
    }

    let ok = Command::new("cbindgen")
        .args(["--crate", "resonar-ffi", "--lang", "C", "--cpp-compat", "--output"])
        .arg(output)
        .current_dir(crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !ok {
        println!("cargo:warning=resonar-ffi: cbindgen failed; using include/{HEADER}");
    }
    ok
}
