//! Binding generator for the glucose FFI library
//!
//! Usage:
//!   cargo run -p glucose-ffi --features bindgen --bin uniffi-bindgen generate \
//!       --library target/aarch64-apple-ios/release/libglucose_ffi.a \
//!       --language swift \
//!       --out-dir generated/swift

fn main() {
    uniffi::uniffi_bindgen_main()
}
