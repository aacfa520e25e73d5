//! Output Location Resolution
//!
//! Every variant places its finalized artifact at a fixed location below the
//! target root, partitioned first by build type and then by architecture:
//!
//! ```text
//! <target-root>/<debug|release>/<arch>/<artifact-name>
//! ```
//!
//! Resolution is pure. The flavor does not take part, so two flavors of the
//! same architecture and build type share a location. `check_distinct()`
//! refuses to schedule such variants in the same invocation.

use crate::variant::{Arch, Descriptor, Variant};

/// Resolve Errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The architecture is not part of the supported set.
    #[error("invalid target architecture '{0}'")]
    UnknownArchitecture(String),
    /// Two variants of one invocation resolve to the same location.
    #[error("variants {first} and {second} both resolve to {location:?}")]
    Collision {
        first: String,
        second: String,
        location: std::path::PathBuf,
    },
}

/// Output Location
///
/// The directory a finalized artifact is placed in, and the canonical file
/// name it gets there.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Location {
    pub dir: std::path::PathBuf,
    pub file_name: String,
}

impl Location {
    /// Resolve the location of a descriptor
    ///
    /// Compute `<target_root>/<build-type>/<arch>/` as directory and use
    /// `artifact_name` as file name.
    pub fn for_descriptor(
        target_root: &std::path::Path,
        descriptor: Descriptor,
        artifact_name: &str,
    ) -> Self {
        let mut dir = target_root.to_path_buf();
        dir.push(descriptor.build_type().as_str());
        dir.push(descriptor.arch.as_str());

        Self {
            dir: dir,
            file_name: artifact_name.to_string(),
        }
    }

    /// Resolve the location of a variant. The flavor is ignored.
    pub fn for_variant(
        target_root: &std::path::Path,
        variant: &Variant,
        artifact_name: &str,
    ) -> Self {
        Self::for_descriptor(target_root, variant.descriptor(), artifact_name)
    }

    /// Full path of the artifact.
    pub fn path(&self) -> std::path::PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Resolve from an architecture name
///
/// Like `Location::for_descriptor()`, but takes the architecture as string,
/// as used by external callers. Unknown architectures are a configuration
/// error.
pub fn resolve(
    target_root: &std::path::Path,
    arch: &str,
    debug: bool,
    artifact_name: &str,
) -> Result<Location, Error> {
    let arch: Arch = arch.parse().map_err(
        |_| Error::UnknownArchitecture(arch.to_string()),
    )?;

    Ok(Location::for_descriptor(
        target_root,
        Descriptor { arch: arch, debug: debug },
        artifact_name,
    ))
}

/// Verify variants resolve to distinct locations
///
/// Resolve the location of every given variant and fail if any two of them
/// share a location. On success, the locations are returned in the order of
/// the variants.
pub fn check_distinct(
    target_root: &std::path::Path,
    variants: &[Variant],
    artifact_name: &str,
) -> Result<Vec<Location>, Error> {
    let mut seen: std::collections::HashMap<Descriptor, &Variant> = std::collections::HashMap::new();
    let mut locations = Vec::with_capacity(variants.len());

    for variant in variants {
        let location = Location::for_variant(target_root, variant, artifact_name);

        if let Some(first) = seen.insert(variant.descriptor(), variant) {
            return Err(Error::Collision {
                first: first.name(),
                second: variant.name(),
                location: location.path(),
            });
        }

        locations.push(location);
    }

    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{BuildType, parse_name};

    fn location_of(name: &str) -> std::path::PathBuf {
        let v = parse_name(name).unwrap();
        Location::for_variant(std::path::Path::new("target"), &v, "servoapp.apk").path()
    }

    // Verify the documented layout for a few variant names
    #[test]
    fn resolve_scenarios() {
        assert_eq!(location_of("armDebug"), std::path::Path::new("target/debug/arm/servoapp.apk"));
        assert_eq!(location_of("armv7Release"), std::path::Path::new("target/release/armv7/servoapp.apk"));
        assert_eq!(location_of("googlevrArm64Debug"), std::path::Path::new("target/debug/arm64/servoapp.apk"));
        assert_eq!(location_of("x86Release"), std::path::Path::new("target/release/x86/servoapp.apk"));
    }

    // Verify all descriptors map to distinct locations
    #[test]
    fn resolve_injective() {
        let mut all = std::collections::HashSet::new();

        for arch in Arch::ALL {
            for build_type in BuildType::ALL {
                let d = Descriptor { arch: arch, debug: build_type.is_debug() };
                let l = Location::for_descriptor(std::path::Path::new("/t"), d, "a.apk");
                assert!(all.insert(l.path()));
            }
        }

        assert_eq!(all.len(), 8);
    }

    #[test]
    fn resolve_from_strings() {
        let l = resolve(std::path::Path::new("/t"), "ARMv7", false, "servoapp.apk").unwrap();
        assert_eq!(l.dir, std::path::Path::new("/t/release/armv7"));

        assert!(matches!(
            resolve(std::path::Path::new("/t"), "default", true, "servoapp.apk"),
            Err(Error::UnknownArchitecture(v)) if v == "default",
        ));
    }

    // Verify flavors sharing a location are refused
    #[test]
    fn distinct_locations() {
        let root = std::path::Path::new("/t");
        let ok = [
            parse_name("x86Debug").unwrap(),
            parse_name("x86Release").unwrap(),
        ];
        let locations = check_distinct(root, &ok, "servoapp.apk").unwrap();
        assert_ne!(locations[0], locations[1]);

        let clash = [
            parse_name("mainArmDebug").unwrap(),
            parse_name("googlevrArmDebug").unwrap(),
        ];
        match check_distinct(root, &clash, "servoapp.apk") {
            Err(Error::Collision { first, second, .. }) => {
                assert_eq!(first, "mainArmDebug");
                assert_eq!(second, "googlevrArmDebug");
            },
            v => panic!("unexpected result {:?}", v),
        }
    }
}
