fn main() {
    // Point bindgen at the CommandLineTools libclang before opencv builds.
    if cfg!(target_os = "macos") {
        std::env::set_var("LIBCLANG_PATH", "/Library/Developer/CommandLineTools/usr/lib");
        std::env::set_var(
            "DYLD_FALLBACK_LIBRARY_PATH",
            "/Library/Developer/CommandLineTools/usr/lib",
        );
    }

    println!("cargo:rerun-if-changed=build.rs");
}
