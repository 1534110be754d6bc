//! Entry point for generating AuthKit foreign-language bindings.

fn main() {
    uniffi::uniffi_bindgen_main();
}
