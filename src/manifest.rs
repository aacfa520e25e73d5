//! Variant Manifest
//!
//! The manifest is a TOML file, usually called `apk-variants.toml`, that
//! describes the Android application shell: where its Gradle project lives,
//! where build artifacts go, which SDK levels to build against and which
//! flavors, architectures and build types make up the variant matrix.
//!
//! Relative paths in the manifest are interpreted relative to the directory
//! containing the manifest.

use serde;
use toml;

use crate::variant::{self, Arch, BuildType, Matrix, Variant};

/// Default name of the finalized artifact.
pub const DEFAULT_ARTIFACT_NAME: &str = "servoapp.apk";

/// Manifest Errors
///
/// This is the exhaustive list of errors raised when loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading the manifest file failed.
    #[error("cannot read manifest {0:?}: {1}")]
    Read(std::ffi::OsString, std::io::Error),
    /// The manifest is not valid TOML or does not match the manifest schema.
    #[error("cannot parse manifest: {0}")]
    Syntax(String),
    /// The manifest format version is not supported.
    #[error("unsupported manifest version {0}")]
    Version(u32),
    /// The specified key holds a value that is not a valid identifier.
    #[error("invalid identifier in '{0}'")]
    Identifier(&'static str),
    /// The specified key holds quotes, backslashes or control characters.
    #[error("value of '{0}' must not contain quotes, backslashes or control characters")]
    Unquotable(&'static str),
    /// The named flavor is defined more than once.
    #[error("flavor '{0}' defined more than once")]
    DuplicateFlavor(String),
    /// The named architecture is not supported.
    #[error("unknown architecture '{0}'")]
    Architecture(String),
    /// The named build type is not supported.
    #[error("unknown build type '{0}'")]
    BuildType(String),
    /// The specified key holds an empty list.
    #[error("'{0}' must not be empty")]
    EmptyList(&'static str),
    /// The named flavor shares no architecture with `android.architectures`.
    #[error("flavor '{0}' has no architecture left to build")]
    NoArchitectures(String),
}

/// Raw Manifest Application Table
///
/// Sub-type of `Raw` representing the `application` table.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawApplication {
    /// Identifier of the application. Only alphanumeric and `-`, `_`
    /// allowed.
    pub id: Option<String>,
    /// Human-readable name of the application.
    pub name: Option<String>,
    /// File name of the finalized artifact. Defaults to `servoapp.apk`.
    pub artifact_name: Option<String>,
}

/// Raw Manifest Android Table
///
/// Sub-type of `Raw` holding the Android project configuration. SDK levels
/// and version information are passed through to Gradle unmodified.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawAndroid {
    /// Path to the Gradle project of the application shell.
    pub project_dir: Option<String>,
    /// Name of the Gradle application module. Defaults to `app`.
    pub module: Option<String>,
    /// Root of all build output. Defaults to `./target`.
    pub target_root: Option<String>,
    /// Path to the Android SDK, exported as `ANDROID_HOME` to Gradle.
    pub sdk_path: Option<String>,
    /// Gradle executable. Defaults to `gradle`.
    pub gradle: Option<String>,

    pub application_id: Option<String>,

    pub compile_sdk: Option<u32>,
    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,

    pub version_code: Option<u32>,
    pub version_name: Option<String>,

    /// Architectures to build for all flavors. Defaults to all.
    pub architectures: Option<Vec<String>>,
    /// Build types to build for all flavors. Defaults to both.
    pub build_types: Option<Vec<String>>,
}

/// Raw Manifest Flavor Table
///
/// Sub-type of `Raw` describing a single product flavor.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawFlavor {
    /// Identifier of the flavor. Lower-case alphanumeric only.
    pub id: String,
    /// Minimum SDK level overriding `android.min-sdk` for this flavor.
    pub min_sdk: Option<u32>,
    /// Restrict the flavor to a subset of the architectures.
    pub architectures: Option<Vec<String>>,
}

/// Raw Manifest Content
///
/// This type contains the raw manifest content as parsed by `toml` and
/// converted into rust types via `serde`.
///
/// Note that content of the type is not verified other than for syntactic
/// correctness required by the given types. Semantic correctness needs to
/// be verified by the caller.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the manifest format. Only version `1` is currently
    /// supported.
    pub version: u32,

    pub application: Option<RawApplication>,
    pub android: Option<RawAndroid>,
    #[serde(default)]
    pub flavor: Vec<RawFlavor>,
}

/// Manifest Abstraction
///
/// This type represents a valid and verified manifest. The raw content is
/// available via the `raw` field, the variant matrix derived from it via
/// `matrix()`.
pub struct Manifest {
    /// Raw manifest content as parsed by the TOML module.
    pub raw: Raw,
    /// Directory relative paths are resolved against.
    pub root: std::path::PathBuf,

    matrix: Matrix,
}

impl Raw {
    fn parse_toml(table: toml::Table) -> Result<Self, Error> {
        <Self as serde::Deserialize>::deserialize(table)
            .map_err(|v| Error::Syntax(v.to_string()))
    }

    fn parse_str(content: &str) -> Result<Self, Error> {
        content.parse::<toml::Table>()
            .map_err(|v| Error::Syntax(v.to_string()))
            .and_then(|v| Self::parse_toml(v))
    }

    /// Find the flavor entry with the given ID.
    pub fn flavor_by_id(&self, id: &str) -> Option<&RawFlavor> {
        self.flavor.iter().find(
            |v| v.id == id
        )
    }
}

impl Manifest {
    // Check whether a string is a valid identifier
    //
    // This verifies that the given string consists of only alphanumeric
    // characters plus `-`, `_`. Empty identifiers are rejected.
    fn is_identifier(s: &str) -> bool {
        !s.is_empty() && s.chars().all(
            |v| v.is_alphanumeric() || v == '-' || v == '_'
        )
    }

    // Check whether a string contains no quotes or escapes
    //
    // Values passed to Gradle as project properties end up in Groovy code.
    // Refusing quotes, backslashes and control characters keeps them safe
    // to interpolate without escaping.
    fn is_quotable(s: &str) -> bool {
        s.chars().all(
            |v| !v.is_control()
                && v != '\\'
                && v != '\''
                && v != '"'
        )
    }

    fn check_quotable(key: &'static str, v: &Option<String>) -> Result<(), Error> {
        match v {
            Some(v) if !Self::is_quotable(v) => Err(Error::Unquotable(key)),
            _ => Ok(()),
        }
    }

    fn parse_architectures(
        key: &'static str,
        list: &Option<Vec<String>>,
    ) -> Result<Vec<Arch>, Error> {
        match list {
            None => Ok(Arch::ALL.to_vec()),
            Some(list) if list.is_empty() => Err(Error::EmptyList(key)),
            Some(list) => {
                let mut archs = Vec::new();
                for name in list {
                    let arch: Arch = name.parse().map_err(
                        |_| Error::Architecture(name.clone()),
                    )?;
                    if !archs.contains(&arch) {
                        archs.push(arch);
                    }
                }
                Ok(archs)
            },
        }
    }

    fn parse_build_types(
        key: &'static str,
        list: &Option<Vec<String>>,
    ) -> Result<Vec<BuildType>, Error> {
        match list {
            None => Ok(BuildType::ALL.to_vec()),
            Some(list) if list.is_empty() => Err(Error::EmptyList(key)),
            Some(list) => {
                let mut types = Vec::new();
                for name in list {
                    let build_type: BuildType = name.parse().map_err(
                        |_| Error::BuildType(name.clone()),
                    )?;
                    if !types.contains(&build_type) {
                        types.push(build_type);
                    }
                }
                Ok(types)
            },
        }
    }

    // Assemble the variant matrix
    //
    // Every flavor gets the global architectures, optionally restricted to
    // the flavor's own list, crossed with the global build types. Without
    // any flavor entries the matrix uses the single default flavor. Every
    // flavor must end up with at least one architecture.
    fn assemble_matrix(raw: &Raw) -> Result<Matrix, Error> {
        let android = raw.android.as_ref();
        let archs = Self::parse_architectures(
            "android.architectures",
            &android.and_then(|v| v.architectures.clone()),
        )?;
        let build_types = Self::parse_build_types(
            "android.build-types",
            &android.and_then(|v| v.build_types.clone()),
        )?;

        let mut flavors: Vec<(&str, Vec<Arch>)> = Vec::new();
        if raw.flavor.is_empty() {
            flavors.push((variant::DEFAULT_FLAVOR, archs.clone()));
        }
        for flavor in raw.flavor.iter() {
            let restrict = Self::parse_architectures("flavor.architectures", &flavor.architectures)?;
            let v: Vec<Arch> = archs.iter()
                .copied()
                .filter(|v| restrict.contains(v))
                .collect();
            if v.is_empty() {
                return Err(Error::NoArchitectures(flavor.id.clone()));
            }
            flavors.push((flavor.id.as_str(), v));
        }

        let mut variants = Vec::new();
        for (flavor, archs) in flavors {
            for arch in archs {
                for build_type in build_types.iter() {
                    variants.push(Variant::new(flavor, arch, *build_type));
                }
            }
        }

        Ok(Matrix::from_variants(variants))
    }

    /// Parse manifest from raw
    ///
    /// Take a raw representation of the manifest and perform post-parsing
    /// validation, ensuring the final manifest will not contain invalid
    /// entries.
    fn parse_raw(raw: Raw, root: std::path::PathBuf) -> Result<Self, Error> {
        // We only support version '1'. Unknown keys are ignored, so version
        // '1' can still grow new optional keys.
        if raw.version != 1 {
            return Err(Error::Version(raw.version));
        }

        if let Some(application) = &raw.application {
            if let Some(v) = &application.id {
                if !Self::is_identifier(v) {
                    return Err(Error::Identifier("application.id"));
                }
            }

            Self::check_quotable("application.name", &application.name)?;

            // The artifact name becomes a file name, so it must be a single
            // non-empty path component.
            if let Some(v) = &application.artifact_name {
                if v.is_empty()
                    || v.contains('/')
                    || v.contains('\\')
                    || v == "."
                    || v == ".."
                {
                    return Err(Error::Identifier("application.artifact-name"));
                }
            }
        }

        if let Some(android) = &raw.android {
            if let Some(v) = &android.module {
                if !Self::is_identifier(v) {
                    return Err(Error::Identifier("android.module"));
                }
            }

            Self::check_quotable("android.application-id", &android.application_id)?;
            Self::check_quotable("android.version-name", &android.version_name)?;

            // The SDK path is exported via the environment, so only refuse
            // control characters.
            if let Some(sdk_path) = &android.sdk_path {
                if sdk_path.chars().any(|v| v.is_control()) {
                    return Err(Error::Unquotable("android.sdk-path"));
                }
            }
        }

        for (i, flavor) in raw.flavor.iter().enumerate() {
            if !variant::is_flavor_identifier(&flavor.id) {
                return Err(Error::Identifier("flavor.id"));
            }
            if raw.flavor[..i].iter().any(|v| v.id == flavor.id) {
                return Err(Error::DuplicateFlavor(flavor.id.clone()));
            }
        }

        let matrix = Self::assemble_matrix(&raw)?;

        Ok(
            Self {
                raw: raw,
                root: root,
                matrix: matrix,
            }
        )
    }

    /// Parse manifest from string
    ///
    /// Parse the given string as a literal manifest in TOML representation.
    /// Relative paths are resolved against the current working directory.
    pub fn parse_str(content: &str) -> Result<Self, Error> {
        Raw::parse_str(content)
            .and_then(|v| Self::parse_raw(v, std::path::PathBuf::new()))
    }

    /// Parse manifest from file-system
    ///
    /// Open the specified file and parse it as a manifest. Relative paths in
    /// the manifest are resolved against the directory of the file.
    pub fn parse_path(path: &std::path::Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(
            |v| Error::Read(path.as_os_str().to_os_string(), v),
        )?;

        let root: std::path::PathBuf = path.parent()
            .map(|v| v.components().filter(|c| *c != std::path::Component::CurDir).collect())
            .unwrap_or_default();

        Raw::parse_str(&content)
            .and_then(|v| Self::parse_raw(v, root))
    }

    // Resolve a manifest path against the manifest root
    //
    // `.` components are dropped, so default paths stay readable when
    // printed. An empty result denotes the current directory.
    fn resolve(&self, path: &str) -> std::path::PathBuf {
        let path = std::path::Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }

        let mut v = self.root.clone();
        v.extend(path.components().filter(|c| *c != std::path::Component::CurDir));
        if v.as_os_str().is_empty() {
            v.push(".");
        }
        v
    }

    /// Return the variant matrix configured by this manifest.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Return whether the manifest declares product flavors.
    ///
    /// Without `[[flavor]]` entries the Gradle project has no product
    /// flavors, and all variants belong to the implicit default flavor.
    pub fn has_flavors(&self) -> bool {
        !self.raw.flavor.is_empty()
    }

    /// Return the canonical file name of finalized artifacts.
    pub fn artifact_name(&self) -> &str {
        self.raw.application.as_ref()
            .and_then(|v| v.artifact_name.as_deref())
            .unwrap_or(DEFAULT_ARTIFACT_NAME)
    }

    /// Return `android.target-root` resolved against the manifest root, or
    /// its default `./target`.
    pub fn target_root(&self) -> std::path::PathBuf {
        let v = self.raw.android.as_ref()
            .and_then(|v| v.target_root.as_deref())
            .unwrap_or("./target");
        self.resolve(v)
    }

    /// Return `android.project-dir` resolved against the manifest root, or
    /// the manifest root itself.
    pub fn project_dir(&self) -> std::path::PathBuf {
        let v = self.raw.android.as_ref()
            .and_then(|v| v.project_dir.as_deref())
            .unwrap_or(".");
        self.resolve(v)
    }

    pub fn module(&self) -> &str {
        self.raw.android.as_ref()
            .and_then(|v| v.module.as_deref())
            .unwrap_or("app")
    }

    pub fn gradle(&self) -> &str {
        self.raw.android.as_ref()
            .and_then(|v| v.gradle.as_deref())
            .unwrap_or("gradle")
    }

    /// Minimum SDK level
    ///
    /// Return the minimum SDK level of a flavor, which is the flavor
    /// override if present, or the global value otherwise.
    pub fn min_sdk(&self, flavor: &str) -> Option<u32> {
        self.raw.flavor_by_id(flavor)
            .and_then(|v| v.min_sdk)
            .or_else(|| self.raw.android.as_ref().and_then(|v| v.min_sdk))
    }
}
