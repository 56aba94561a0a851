//! UniFFI bindings crate for the glucose library
//!
//! This crate wraps the glucose crate for UniFFI library mode binding
//! generation. It re-exports the FFI module and UniFFI scaffolding.
//!
//! ## Building for Swift
//!
//! 1. Build the library for Apple platforms:
//!    ```bash
//!    cargo build --release -p glucose-ffi --target aarch64-apple-ios
//!    cargo build --release -p glucose-ffi --target aarch64-apple-ios-sim
//!    ```
//!
//! 2. Generate Swift bindings:
//!    ```bash
//!    cargo run -p glucose-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-apple-ios/release/libglucose_ffi.a \
//!        --language swift \
//!        --out-dir generated/swift
//!    ```

pub use glucose::ffi::*;

// Library mode needs the scaffolding re-exported from this cdylib
glucose::uniffi_reexport_scaffolding!();
