//! Build Variants
//!
//! A build variant is the combination of a product flavor, a target
//! architecture and a build type. The Android shell compiles every variant
//! independently and each of them yields exactly one APK.
//!
//! Variants are represented as structured identifiers. The variant matrix is
//! assembled from the manifest, so the tool never has to recover the
//! components of a variant it enumerated itself. Names supplied from the
//! outside (command-line, Gradle hooks) are parsed with a fixed grammar:
//!
//! ```text
//! <flavor><Arch>(Debug|Release)     e.g. googlevrArm64Debug
//! <arch>(Debug|Release)             e.g. armv7Release, flavor `main`
//! ```
//!
//! Flavor identifiers are restricted to lower-case ASCII alphanumerics, so
//! the first upper-case letter always starts either the architecture or the
//! build type. This makes the decomposition unambiguous.

use regex;

/// Name of the flavor used for variant names without flavor prefix.
pub const DEFAULT_FLAVOR: &str = "main";

/// Variant Errors
///
/// Parsing variant names has a single failure mode. The error carries the
/// offending name and a human-readable reason.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The variant name cannot be decomposed into flavor, architecture and
    /// build type.
    #[error("invalid variant name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: &'static str,
    },
}

impl Error {
    fn invalid(name: &str, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason,
        }
    }
}

/// Target Architecture
///
/// Enumeration of the CPU architectures the native engine is built for.
/// Use `as_str()` for the canonical lower-case name, and `FromStr` to parse
/// it back (case-insensitive).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Arch {
    Arm,
    Armv7,
    Arm64,
    X86,
}

impl Arch {
    /// All supported architectures in canonical order.
    pub const ALL: [Arch; 4] = [Arch::Arm, Arch::Armv7, Arch::Arm64, Arch::X86];

    /// Get string representation
    ///
    /// Return the canonical lower-case name of the architecture. This is
    /// guaranteed to be parsable by the `FromStr` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Armv7 => "armv7",
            Arch::Arm64 => "arm64",
            Arch::X86 => "x86",
        }
    }

    /// Get the capitalized name as used inside variant names.
    pub fn capitalized(&self) -> &'static str {
        match self {
            Arch::Arm => "Arm",
            Arch::Armv7 => "Armv7",
            Arch::Arm64 => "Arm64",
            Arch::X86 => "X86",
        }
    }

    /// Get the NDK ABI filter of the architecture.
    pub fn abi(&self) -> &'static str {
        crate::platform::android::abi(*self)
    }

    /// Get the Rust target triple of the architecture.
    pub fn rust_triple(&self) -> &'static str {
        crate::platform::android::rust_triple(*self)
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Parse architectures from strings
//
// Matching is case-insensitive, so both `armv7` and `Armv7` are accepted.
// The error carries no information, callers know what they tried to parse.
impl std::str::FromStr for Arch {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
            .find(|v| s.eq_ignore_ascii_case(v.as_str()))
            .copied()
            .ok_or(())
    }
}

/// Build Type
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    /// All build types in canonical order.
    pub const ALL: [BuildType; 2] = [BuildType::Debug, BuildType::Release];

    /// Create from a debug flag.
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            Self::Debug
        } else {
            Self::Release
        }
    }

    /// Get the lower-case name, as used in paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }

    /// Get the capitalized name, as used at the end of variant names.
    pub fn capitalized(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        }
    }

    pub fn is_debug(&self) -> bool {
        *self == BuildType::Debug
    }
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
            .find(|v| s.eq_ignore_ascii_case(v.as_str()))
            .copied()
            .ok_or(())
    }
}

/// Variant Descriptor
///
/// The part of a variant that determines where its artifact is placed. The
/// flavor is deliberately not part of it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Descriptor {
    pub arch: Arch,
    pub debug: bool,
}

impl Descriptor {
    pub fn build_type(&self) -> BuildType {
        BuildType::from_debug(self.debug)
    }
}

// Parse descriptors from variant names
//
// This applies the variant grammar but ignores the flavor prefix, hence
// any flavor is accepted. Use `Matrix::variant_by_name()` to restrict names
// to the configured flavors.
impl std::str::FromStr for Descriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(s).map(|v| v.descriptor())
    }
}

/// Build Variant
///
/// Structured identifier of a single build variant. Variant names, Gradle
/// task names and descriptors are derived from it, never the other way
/// around.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Variant {
    pub flavor: String,
    pub arch: Arch,
    pub build_type: BuildType,
}

impl Variant {
    pub fn new(flavor: &str, arch: Arch, build_type: BuildType) -> Self {
        Self {
            flavor: flavor.to_string(),
            arch: arch,
            build_type: build_type,
        }
    }

    /// Variant name
    ///
    /// Return the full variant name `<flavor><Arch><BuildType>`. This is the
    /// name Gradle uses for the variant.
    pub fn name(&self) -> String {
        format!(
            "{}{}{}",
            self.flavor,
            self.arch.capitalized(),
            self.build_type.capitalized(),
        )
    }

    /// Gradle build type
    ///
    /// The Android project encodes the architecture in its build types, so
    /// each of them is named `<arch><BuildType>`, e.g. `arm64Debug`.
    pub fn gradle_build_type(&self) -> String {
        format!("{}{}", self.arch.as_str(), self.build_type.capitalized())
    }

    /// Name of the Gradle task that assembles this variant.
    pub fn assemble_task(&self) -> String {
        format!("assemble{}", capitalize(&self.name()))
    }

    /// Name of the Gradle task assembling this variant in a project without
    /// product flavors, where only the build type is part of the task name.
    pub fn assemble_build_type_task(&self) -> String {
        format!("assemble{}", capitalize(&self.gradle_build_type()))
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            arch: self.arch,
            debug: self.build_type.is_debug(),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

// Check whether a string is a valid flavor identifier
//
// Flavors must start with a lower-case ASCII letter, followed by lower-case
// ASCII letters or digits. Anything else would break the variant grammar.
pub fn is_flavor_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            chars.all(|v| v.is_ascii_lowercase() || v.is_ascii_digit())
        },
        _ => false,
    }
}

fn name_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    RE.get_or_init(|| {
        regex::Regex::new(r"^([a-z][a-z0-9]*)([A-Z][a-z0-9]*)?(Debug|Release)$")
            .expect("Variant grammar must compile")
    })
}

/// Parse a variant name
///
/// Decompose a variant name into flavor, architecture and build type. The
/// flavor is not checked against any configuration, so this succeeds for
/// any syntactically valid flavor. Names without flavor prefix use
/// `DEFAULT_FLAVOR`.
pub fn parse_name(name: &str) -> Result<Variant, Error> {
    let captures = name_regex().captures(name).ok_or_else(
        || Error::invalid(name, "expected <flavor><Arch>(Debug|Release)"),
    )?;

    // The grammar guarantees groups 1 and 3, group 2 is optional.
    let head = &captures[1];
    let build_type = if &captures[3] == "Debug" {
        BuildType::Debug
    } else {
        BuildType::Release
    };

    let (flavor, arch) = match captures.get(2) {
        Some(arch) => (head, arch.as_str()),
        None => (DEFAULT_FLAVOR, head),
    };

    let arch: Arch = arch.parse().map_err(
        |_| Error::invalid(name, "unknown architecture"),
    )?;

    Ok(Variant::new(flavor, arch, build_type))
}

/// Variant Matrix
///
/// The set of variants configured for a project, in canonical order:
/// flavors in manifest order, then architectures, then build types.
#[derive(Clone, Debug, Default)]
pub struct Matrix {
    variants: Vec<Variant>,
}

impl Matrix {
    /// Create a matrix from an explicit list of variants. Duplicates are
    /// dropped, the first occurrence wins.
    pub fn from_variants(variants: impl IntoIterator<Item = Variant>) -> Self {
        let mut v: Vec<Variant> = Vec::new();

        for variant in variants {
            if !v.contains(&variant) {
                v.push(variant);
            }
        }

        Self {
            variants: v,
        }
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn contains(&self, variant: &Variant) -> bool {
        self.variants.contains(variant)
    }

    /// Return whether the matrix has variants of the given flavor.
    pub fn has_flavor(&self, flavor: &str) -> bool {
        self.variants.iter().any(|v| v.flavor == flavor)
    }

    /// Return the flavors of the matrix in canonical order.
    pub fn flavors(&self) -> Vec<&str> {
        let mut v: Vec<&str> = Vec::new();

        for variant in self.variants.iter() {
            if !v.contains(&variant.flavor.as_str()) {
                v.push(&variant.flavor);
            }
        }

        v
    }

    /// Default flavor
    ///
    /// Return `DEFAULT_FLAVOR` if the matrix has variants of it, otherwise
    /// the first flavor of the matrix. `None` if the matrix is empty.
    pub fn default_flavor(&self) -> Option<&str> {
        if self.has_flavor(DEFAULT_FLAVOR) {
            Some(DEFAULT_FLAVOR)
        } else {
            self.variants.first().map(|v| v.flavor.as_str())
        }
    }

    /// Return all variants of the given flavor in canonical order.
    pub fn variants_of(&self, flavor: &str) -> Vec<Variant> {
        self.variants.iter()
            .filter(|v| v.flavor == flavor)
            .cloned()
            .collect()
    }

    /// Look up a variant by name
    ///
    /// Parse the name and verify that it denotes a variant of this matrix.
    /// Names that parse but refer to an unknown flavor, or to an
    /// architecture or build type not configured for the flavor, are
    /// rejected as invalid names as well.
    pub fn variant_by_name(&self, name: &str) -> Result<Variant, Error> {
        let variant = parse_name(name)?;

        if !self.has_flavor(&variant.flavor) {
            return Err(Error::invalid(name, "unknown flavor"));
        }

        if !self.contains(&variant) {
            return Err(Error::invalid(name, "variant not part of the configured matrix"));
        }

        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(name: &str) {
        match parse_name(name) {
            Err(Error::InvalidName { name: v, .. }) => assert_eq!(v, name),
            Ok(v) => panic!("'{}' unexpectedly parsed as {:?}", name, v),
        }
    }

    // Verify names without flavor prefix
    //
    // A leading lower-case architecture selects the default flavor.
    #[test]
    fn parse_without_flavor() {
        let v = parse_name("armDebug").unwrap();
        assert_eq!(v, Variant::new("main", Arch::Arm, BuildType::Debug));

        let v = parse_name("armv7Release").unwrap();
        assert_eq!(v, Variant::new("main", Arch::Armv7, BuildType::Release));
        assert!(!v.descriptor().debug);

        let v = parse_name("x86Debug").unwrap();
        assert_eq!(v.arch, Arch::X86);
    }

    // Verify names with flavor prefix
    //
    // The flavor is split off at the first upper-case letter and the
    // architecture segment is matched case-insensitively.
    #[test]
    fn parse_with_flavor() {
        let v = parse_name("googlevrArm64Debug").unwrap();
        assert_eq!(v, Variant::new("googlevr", Arch::Arm64, BuildType::Debug));

        let v = parse_name("oculusvrArmv7Release").unwrap();
        assert_eq!(v.flavor, "oculusvr");
        assert_eq!(v.arch, Arch::Armv7);
        assert_eq!(v.build_type, BuildType::Release);
    }

    // Verify descriptors ignore the flavor
    #[test]
    fn descriptor_from_name() {
        let d: Descriptor = "googlevrArm64Debug".parse().unwrap();
        assert_eq!(d, Descriptor { arch: Arch::Arm64, debug: true });

        let d: Descriptor = "mainArm64Debug".parse().unwrap();
        assert_eq!(d, Descriptor { arch: Arch::Arm64, debug: true });

        assert!("release".parse::<Descriptor>().is_err());
    }

    // Verify rejection of malformed names
    #[test]
    fn parse_invalid() {
        assert_invalid("");
        assert_invalid("release");
        assert_invalid("Release");
        assert_invalid("Debug");
        assert_invalid("armDebugExtra");
        assert_invalid("armdebug");
        assert_invalid("mainArmDebugRelease");
        assert_invalid("mainMipsDebug");
        assert_invalid("mipsRelease");
        assert_invalid("main-armDebug");
        assert_invalid("googlevrArmV7Debug");
    }

    // Verify lossless decomposition
    //
    // Every variant of the full matrix must decompose back into the same
    // architecture and build type, no matter the flavor.
    #[test]
    fn parse_lossless() {
        for flavor in ["main", "googlevr", "oculusvr", "a1"] {
            for arch in Arch::ALL {
                for build_type in BuildType::ALL {
                    let v = Variant::new(flavor, arch, build_type);
                    let parsed = parse_name(&v.name()).unwrap();

                    assert_eq!(parsed, v);
                    assert_eq!(parsed.descriptor(), v.descriptor());
                }
            }
        }
    }

    // Verify derived Gradle names
    #[test]
    fn gradle_names() {
        let v = Variant::new("googlevr", Arch::Arm64, BuildType::Debug);

        assert_eq!(v.name(), "googlevrArm64Debug");
        assert_eq!(v.gradle_build_type(), "arm64Debug");
        assert_eq!(v.assemble_task(), "assembleGooglevrArm64Debug");
        assert_eq!(v.assemble_build_type_task(), "assembleArm64Debug");
        assert_eq!(v.arch.abi(), "arm64-v8a");
    }

    #[test]
    fn flavor_identifiers() {
        assert!(is_flavor_identifier("main"));
        assert!(is_flavor_identifier("googlevr2"));
        assert!(!is_flavor_identifier(""));
        assert!(!is_flavor_identifier("2vr"));
        assert!(!is_flavor_identifier("googleVr"));
        assert!(!is_flavor_identifier("google-vr"));
    }

    // Verify lookups against a configured matrix
    #[test]
    fn matrix_lookup() {
        let m = Matrix::from_variants([
            Variant::new("main", Arch::Arm, BuildType::Debug),
            Variant::new("main", Arch::Arm, BuildType::Release),
            Variant::new("googlevr", Arch::Arm64, BuildType::Debug),
            Variant::new("main", Arch::Arm, BuildType::Debug),
        ]);

        assert_eq!(m.len(), 3);
        assert_eq!(
            m.variant_by_name("armDebug").unwrap(),
            Variant::new("main", Arch::Arm, BuildType::Debug),
        );
        assert!(m.variant_by_name("googlevrArm64Debug").is_ok());
        assert!(m.variant_by_name("googlevrArmDebug").is_err());
        assert!(m.variant_by_name("oculusvrArm64Debug").is_err());
        assert!(m.variant_by_name("x86Release").is_err());
    }

    // Verify flavor selection on a matrix
    //
    // The default flavor is preferred, and any other flavor is only the
    // default if the matrix lacks it.
    #[test]
    fn matrix_flavors() {
        let m = Matrix::from_variants([
            Variant::new("googlevr", Arch::Arm64, BuildType::Debug),
            Variant::new("main", Arch::Arm, BuildType::Debug),
            Variant::new("main", Arch::Arm64, BuildType::Debug),
        ]);

        assert_eq!(m.flavors(), ["googlevr", "main"]);
        assert_eq!(m.default_flavor(), Some("main"));
        assert_eq!(
            m.variants_of("main"),
            [
                Variant::new("main", Arch::Arm, BuildType::Debug),
                Variant::new("main", Arch::Arm64, BuildType::Debug),
            ],
        );
        assert!(m.variants_of("oculusvr").is_empty());

        let m = Matrix::from_variants([
            Variant::new("oculusvr", Arch::Arm64, BuildType::Release),
        ]);
        assert_eq!(m.default_flavor(), Some("oculusvr"));
        assert_eq!(Matrix::default().default_flavor(), None);
    }
}
