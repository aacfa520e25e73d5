//! Android APK Variant Packaging
//!
//! This crate packages a pre-built native engine into APKs of an Android
//! application shell, one per build variant, and places the results at
//! stable locations next to the native build.
//!
//! Model
//! -----
//!
//! A build variant is the combination of a product flavor (e.g. `main`,
//! `googlevr`, `oculusvr`), a CPU architecture (`arm`, `armv7`, `arm64`,
//! `x86`) and a build type (`debug` or `release`). The set of variants is
//! configured in a TOML manifest, usually `apk-variants.toml`, and is
//! represented as structured identifiers (see [`variant`]). Variant names
//! like `googlevrArm64Debug` are only parsed when supplied from outside.
//!
//! Packaging a variant is a strictly ordered chain of steps: verify the
//! native libraries are staged, let Gradle assemble the APK, then finalize
//! the APK by copying it to its output location. The chains of all selected
//! variants form one build-step graph (see [`pipeline`]), so independent
//! variants are packaged concurrently. A failure stops the build, unless
//! asked to keep going, in which case only the dependent steps are skipped.
//!
//! Output locations are derived from architecture and build type only:
//!
//! ```text
//! <target-root>/<debug|release>/<arch>/servoapp.apk
//! ```
//!
//! The `apk-variants` command-line tool parses the manifest and dispatches
//! to the operations in [`op`].

pub mod manifest;
pub mod pipeline;
pub mod variant;

/// Variant Operations
///
/// The `op` module is a collection of all operations that can be performed via
/// the command-line interface. Each operation is implemented in a submodule
/// and can be used independently.
pub mod op {
    pub mod build;
    pub mod finalize;
    pub mod resolve;
}

/// Platform Integration
///
/// The `platform` module documents how the native engine is integrated into
/// the application shell of each respective platform.
pub mod platform {
    pub mod android;
}
