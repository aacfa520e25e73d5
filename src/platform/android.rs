//! Android Platform Integration
//!
//! This module documents how the Android application shell is laid out and
//! how the native engine ends up inside the final APK. It also carries the
//! tables mapping CPU architectures to their NDK and Rust counterparts.
//!
//! The application shell is a plain Gradle project using the Android
//! application plugin. It contains only the Java entry-points and resources.
//! The native engine is built by Cargo beforehand, once per architecture, and
//! its shared libraries are staged in a `jniLibs` directory inside the Cargo
//! target directory:
//!
//! ```text
//! <target-root>/
//! ├── <rust-triple>/
//! │   ├── debug/
//! │   │   └── apk/
//! │   │       └── jniLibs/
//! │   │           └── <abi>/
//! │   │               └── lib*.so
//! │   └── release/
//! │       └── ...
//! ├── debug/
//! │   └── <arch>/
//! │       └── servoapp.apk
//! └── release/
//!     └── <arch>/
//!         └── servoapp.apk
//! ```
//!
//! Gradle is pointed at the matching `jniLibs` directory for each variant and
//! restricted to the single ABI of the variant. Gradle places its output deep
//! inside its own build directory with a name that depends on plugin
//! versions, hence the finalized APK is copied to a stable location next to
//! the native build, partitioned by build type and architecture.
//!
//! The Gradle project reads the following project properties, all passed on
//! the command-line by `apk-variants build`:
//!
//!  * `apkVariants.applicationId`
//!  * `apkVariants.compileSdk`, `apkVariants.minSdk`, `apkVariants.targetSdk`
//!  * `apkVariants.versionCode`, `apkVariants.versionName`
//!  * `apkVariants.abi`
//!  * `apkVariants.jniLibsDir`
//!
//! Properties without a configured value are omitted and the Gradle project
//! falls back to its own defaults.
//!
//! Each variant is assembled by its own task. If the manifest declares
//! flavors, the Gradle project must declare the same product flavors and
//! the task is `assemble<Flavor><Arch><BuildType>`. Without flavors, the
//! project declares build types only and the task is
//! `assemble<Arch><BuildType>`.

use crate::variant::{Arch, BuildType};

/// NDK ABI Filter
///
/// Return the ABI name the NDK and the Android packager use for the given
/// architecture. Only this ABI is included in the APK of a variant.
pub fn abi(arch: Arch) -> &'static str {
    match arch {
        Arch::Arm => "armeabi",
        Arch::Armv7 => "armeabi-v7a",
        Arch::Arm64 => "arm64-v8a",
        Arch::X86 => "x86",
    }
}

/// Rust Target Triple
///
/// Return the Rust target triple the native engine is compiled for on the
/// given architecture. Cargo uses it as sub-directory of its target
/// directory.
pub fn rust_triple(arch: Arch) -> &'static str {
    match arch {
        Arch::Arm => "arm-linux-androideabi",
        Arch::Armv7 => "armv7-linux-androideabi",
        Arch::Arm64 => "aarch64-linux-android",
        Arch::X86 => "i686-linux-android",
    }
}

/// Native Library Directory
///
/// Return the `jniLibs` directory that holds the staged native libraries of
/// the given architecture and build type. The directory contains one
/// sub-directory per ABI, as expected by the Android Gradle plugin.
pub fn jni_libs_dir(
    target_root: &std::path::Path,
    arch: Arch,
    build_type: BuildType,
) -> std::path::PathBuf {
    let mut path = target_root.to_path_buf();

    path.push(rust_triple(arch));
    path.push(build_type.as_str());
    path.push("apk");
    path.push("jniLibs");
    path
}
