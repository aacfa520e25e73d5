//! Build Variants
//!
//! Run the full packaging of a set of variants. Each variant goes through a
//! chain of steps:
//!
//!  1. check-native: verify the native libraries of the variant are staged,
//!  2. assemble: let the host build tool produce the APK,
//!  3. finalize: copy the APK into its output location.
//!
//! The chains of all variants form one build-step graph, so independent
//! variants proceed concurrently while each chain stays strictly ordered.

use serde;
use serde_json;

use crate::manifest::Manifest;
use crate::op::{finalize, resolve};
use crate::pipeline;
use crate::variant::Variant;

/// Build Errors
///
/// This is the exhaustive list of possible errors raised by the build
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named flavor has no variants in the configured matrix.
    #[error("unknown flavor '{0}'")]
    UnknownFlavor(String),
    /// The selected variants cannot be placed side by side.
    #[error(transparent)]
    Resolve(#[from] resolve::Error),
    /// The build-step graph cannot be executed.
    #[error(transparent)]
    Pipeline(#[from] pipeline::Error),
    /// The current working directory cannot be queried.
    #[error("cannot query working directory: {0}")]
    WorkingDirectory(std::io::Error),
    /// No native library is staged in the specified directory.
    #[error("no native libraries staged in {0:?}")]
    NativeLibraries(std::ffi::OsString),
    /// Creation of the specified build directory failed.
    #[error("cannot create directory {0:?}: {1}")]
    DirectoryCreation(std::ffi::OsString, std::io::Error),
    /// Command execution could not commence.
    #[error("cannot execute '{0}': {1}")]
    Exec(String, std::io::Error),
    /// The host build tool failed to assemble the named variant.
    #[error("assembling {0} failed ({1})")]
    Assemble(String, std::process::ExitStatus),
    /// The output metadata at the specified path cannot be parsed.
    #[error("cannot parse output metadata {0:?}: {1}")]
    Metadata(std::ffi::OsString, String),
    /// No artifact was found in the specified output directory.
    #[error("no artifact found in {0:?}")]
    ArtifactMissing(std::ffi::OsString),
    /// More than one artifact was found in the specified output directory.
    #[error("more than one artifact found in {0:?}")]
    ArtifactAmbiguous(std::ffi::OsString),
    /// Finalizing the assembled artifact failed.
    #[error(transparent)]
    Finalize(#[from] finalize::Error),
}

/// Artifact Assembly
///
/// Backend producing the APK of a single variant. Implementations must be
/// safe to call from multiple threads, since independent variants are
/// assembled concurrently.
pub trait Assemble: Sync {
    /// Assemble the variant and return the path of the produced artifact.
    fn assemble(&self, variant: &Variant) -> Result<std::path::PathBuf, Error>;
}

// Make a path absolute
//
// Gradle resolves relative paths against the project directory, not the
// working directory of the caller. Hence, any path handed to it is made
// absolute first.
fn absolute(path: &std::path::Path) -> Result<std::path::PathBuf, Error> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let mut cwd = std::env::current_dir().map_err(Error::WorkingDirectory)?;
        cwd.push(path);
        Ok(cwd)
    }
}

// Gradle takes `-P`/`-D` values as a single `KEY=VALUE` argument. Paths
// such as `buildDir` and `apkVariants.jniLibsDir` are not necessarily UTF-8,
// so the argument is assembled as `OsString` rather than formatted.

// Add Gradle `KEY=VALUE` to command-line.
fn cmd_gradle_key_value(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    let mut arg = std::ffi::OsString::new();

    arg.push(key);
    arg.push("=");
    arg.push(value.as_ref());
    cmd.arg(arg);
}

// Add Gradle `--project-prop KEY=VALUE` to command-line.
fn cmd_gradle_project_prop(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    cmd.arg("--project-prop");
    cmd_gradle_key_value(cmd, key, value)
}

// Add Gradle `--system-prop KEY=VALUE` to command-line.
fn cmd_gradle_system_prop(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    cmd.arg("--system-prop");
    cmd_gradle_key_value(cmd, key, value)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputElement {
    output_file: String,
}

// `output-metadata.json` as written by the Android Gradle plugin next to
// the APKs of a variant. Only the fields we need are declared.
#[derive(serde::Deserialize)]
struct OutputMetadata {
    #[serde(default)]
    elements: Vec<OutputElement>,
}

/// Locate an assembled artifact
///
/// Find the APK in the Gradle output directory of a variant. The
/// `output-metadata.json` file is consulted first. Without it, the
/// directory must contain exactly one `*.apk` file.
pub fn locate_artifact(dir: &std::path::Path) -> Result<std::path::PathBuf, Error> {
    let metadata = dir.join("output-metadata.json");

    match std::fs::read_to_string(&metadata) {
        Ok(content) => {
            let m: OutputMetadata = serde_json::from_str(&content).map_err(
                |v| Error::Metadata(metadata.as_os_str().to_os_string(), v.to_string()),
            )?;

            return match m.elements.first() {
                Some(e) => Ok(dir.join(&e.output_file)),
                None => Err(Error::ArtifactMissing(dir.as_os_str().to_os_string())),
            };
        },
        Err(v) if v.kind() == std::io::ErrorKind::NotFound => {},
        Err(v) => {
            return Err(Error::Metadata(metadata.as_os_str().to_os_string(), v.to_string()));
        },
    }

    let entries = std::fs::read_dir(dir).map_err(
        |_| Error::ArtifactMissing(dir.as_os_str().to_os_string()),
    )?;

    let mut found = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(false, |v| v == "apk") && path.is_file() {
            if found.is_some() {
                return Err(Error::ArtifactAmbiguous(dir.as_os_str().to_os_string()));
            }
            found = Some(path);
        }
    }

    found.ok_or_else(|| Error::ArtifactMissing(dir.as_os_str().to_os_string()))
}

/// Gradle Backend
///
/// Assemble variants by running the Gradle task of the variant in the
/// Android project of the manifest. Gradle keeps per-project locks, so
/// invocations are serialized.
pub struct Gradle<'a> {
    manifest: &'a Manifest,
    lock: std::sync::Mutex<()>,
}

impl<'a> Gradle<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self {
            manifest: manifest,
            lock: std::sync::Mutex::new(()),
        }
    }

    // Directory Gradle puts its build output in.
    fn build_dir(&self) -> Result<std::path::PathBuf, Error> {
        let mut path = absolute(&self.manifest.target_root())?;
        path.push("apk-variants");
        path.push("gradle-build");
        Ok(path)
    }

    fn cache_dir(&self) -> Result<std::path::PathBuf, Error> {
        let mut path = absolute(&self.manifest.target_root())?;
        path.push("apk-variants");
        path.push("gradle-cache");
        Ok(path)
    }

    /// Assemble task
    ///
    /// Return the Gradle task assembling the variant. Without product
    /// flavors in the manifest, the task only names the build type, e.g.
    /// `assembleArm64Debug` rather than `assembleMainArm64Debug`.
    pub fn task(&self, variant: &Variant) -> String {
        if self.manifest.has_flavors() {
            variant.assemble_task()
        } else {
            variant.assemble_build_type_task()
        }
    }

    /// Output directory
    ///
    /// Return the directory the Android Gradle plugin writes the APK of the
    /// variant to: `<build-dir>/outputs/apk/<flavor>/<gradle-build-type>/`.
    /// The flavor segment is absent if the manifest declares no flavors.
    pub fn output_dir(&self, variant: &Variant) -> Result<std::path::PathBuf, Error> {
        let mut path = self.build_dir()?;
        path.push("outputs");
        path.push("apk");
        if self.manifest.has_flavors() {
            path.push(&variant.flavor);
        }
        path.push(variant.gradle_build_type());
        Ok(path)
    }

    /// Prepare the Gradle command assembling the given variant.
    pub fn command(&self, variant: &Variant) -> Result<std::process::Command, Error> {
        let raw_android = self.manifest.raw.android.as_ref();
        let mut cmd = std::process::Command::new(self.manifest.gradle());

        // The Android Gradle plugin needs the SDK path. Prefer the
        // environment over `local.properties` to keep the project clean.
        if let Some(v) = raw_android.and_then(|v| v.sdk_path.as_ref()) {
            cmd.env("ANDROID_HOME", v);
        }

        cmd.arg(format!(":{}:{}", self.manifest.module(), self.task(variant)));

        cmd.arg("--no-scan");
        cmd.arg("--no-watch-fs");
        cmd.arg("--quiet");

        cmd.arg("--project-dir");
        cmd.arg(absolute(&self.manifest.project_dir())?);

        // Keep Gradle caches and output out of the source tree.
        cmd.arg("--project-cache-dir");
        cmd.arg(self.cache_dir()?);
        cmd_gradle_project_prop(&mut cmd, "buildDir", &self.build_dir()?);

        if let Some(v) = self.manifest.raw.application.as_ref().and_then(|v| v.name.as_ref()) {
            cmd_gradle_system_prop(&mut cmd, "apkVariants.name", v);
        }

        //
        // Write `apkVariants.*` properties.
        //

        if let Some(android) = raw_android {
            if let Some(v) = &android.application_id {
                cmd_gradle_project_prop(&mut cmd, "apkVariants.applicationId", v);
            }
            if let Some(v) = android.compile_sdk {
                cmd_gradle_project_prop(&mut cmd, "apkVariants.compileSdk", &v.to_string());
            }
            if let Some(v) = android.target_sdk {
                cmd_gradle_project_prop(&mut cmd, "apkVariants.targetSdk", &v.to_string());
            }
            if let Some(v) = android.version_code {
                cmd_gradle_project_prop(&mut cmd, "apkVariants.versionCode", &v.to_string());
            }
            if let Some(v) = &android.version_name {
                cmd_gradle_project_prop(&mut cmd, "apkVariants.versionName", v);
            }
        }

        if let Some(v) = self.manifest.min_sdk(&variant.flavor) {
            cmd_gradle_project_prop(&mut cmd, "apkVariants.minSdk", &v.to_string());
        }

        cmd_gradle_project_prop(&mut cmd, "apkVariants.abi", &variant.arch.abi());
        cmd_gradle_project_prop(
            &mut cmd,
            "apkVariants.jniLibsDir",
            &crate::platform::android::jni_libs_dir(
                &absolute(&self.manifest.target_root())?,
                variant.arch,
                variant.build_type,
            ),
        );

        cmd.stderr(std::process::Stdio::inherit());
        cmd.stdout(std::process::Stdio::inherit());

        Ok(cmd)
    }
}

impl<'a> Assemble for Gradle<'a> {
    fn assemble(&self, variant: &Variant) -> Result<std::path::PathBuf, Error> {
        let mut cmd = self.command(variant)?;

        let cache_dir = self.cache_dir()?;
        std::fs::create_dir_all(&cache_dir).map_err(
            |v| Error::DirectoryCreation(cache_dir.as_os_str().to_os_string(), v),
        )?;

        tracing::debug!(command = ?cmd, "invoking gradle");

        let status = {
            let _guard = self.lock.lock().unwrap_or_else(|v| v.into_inner());
            cmd.status().map_err(|v| Error::Exec(self.manifest.gradle().to_string(), v))?
        };
        if !status.success() {
            return Err(Error::Assemble(variant.name(), status));
        }

        locate_artifact(&self.output_dir(variant)?)
    }
}

/// Verify native libraries are staged
///
/// The `jniLibs` directory of the variant must contain at least one shared
/// library for the ABI of the variant.
pub fn check_native(
    target_root: &std::path::Path,
    variant: &Variant,
) -> Result<(), Error> {
    let mut dir = crate::platform::android::jni_libs_dir(
        target_root,
        variant.arch,
        variant.build_type,
    );
    dir.push(variant.arch.abi());

    let found = std::fs::read_dir(&dir)
        .map(|entries| {
            entries.flatten().any(
                |v| v.path().extension().map_or(false, |e| e == "so")
            )
        })
        .unwrap_or(false);

    if found {
        Ok(())
    } else {
        Err(Error::NativeLibraries(dir.as_os_str().to_os_string()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StepKind {
    CheckNative,
    Assemble,
    Finalize,
}

// A single step of a variant chain. `index` refers to the variant in the
// list passed to `build()`.
struct Step<'a> {
    kind: StepKind,
    index: usize,
    variant: &'a Variant,
}

impl<'a> std::fmt::Display for Step<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            StepKind::CheckNative => "check-native",
            StepKind::Assemble => "assemble",
            StepKind::Finalize => "finalize",
        };
        write!(f, "{} {}", kind, self.variant)
    }
}

/// Build Options
#[derive(Clone, Debug)]
pub struct Options {
    pub pipeline: pipeline::Options,
    /// Verify native libraries before assembling.
    pub check_native: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pipeline: pipeline::Options::default(),
            check_native: true,
        }
    }
}

/// Per-Variant Result
#[derive(Debug)]
pub struct Entry {
    pub variant: Variant,
    pub status: pipeline::Status,
    /// Path of the finalized artifact, if the variant completed.
    pub artifact: Option<std::path::PathBuf>,
    pub errors: Vec<Error>,
}

/// Build Report
#[derive(Debug)]
pub struct Report {
    pub entries: Vec<Entry>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|v| v.status == pipeline::Status::Completed)
    }
}

/// Select the variants of a flavor
///
/// Return all variants of the given flavor, or of the default flavor of the
/// matrix if none is given. Variants of different flavors share output
/// locations, so a default selection never spans more than one flavor.
pub fn select(manifest: &Manifest, flavor: Option<&str>) -> Result<Vec<Variant>, Error> {
    let matrix = manifest.matrix();

    let flavor = match flavor {
        Some(v) => v,
        None => match matrix.default_flavor() {
            Some(v) => v,
            None => return Ok(Vec::new()),
        },
    };

    if !matrix.has_flavor(flavor) {
        return Err(Error::UnknownFlavor(flavor.to_string()));
    }

    Ok(matrix.variants_of(flavor))
}

fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|v| v.into_inner())
}

/// Build variants
///
/// Run check-native, assemble and finalize for every given variant. The
/// variants must resolve to distinct output locations, otherwise nothing is
/// run. Failures of individual steps do not fail the operation, they are
/// recorded in the returned report.
pub fn build(
    manifest: &Manifest,
    variants: &[Variant],
    assembler: &dyn Assemble,
    options: &Options,
) -> Result<Report, Error> {
    let target_root = manifest.target_root();
    let locations = resolve::check_distinct(
        &target_root,
        variants,
        manifest.artifact_name(),
    )?;

    let mut graph = pipeline::Graph::new();
    let mut chains = Vec::with_capacity(variants.len());
    for (index, variant) in variants.iter().enumerate() {
        let step = |kind| Step { kind: kind, index: index, variant: variant };
        let mut chain = Vec::new();

        if options.check_native {
            chain.push(graph.add_step(step(StepKind::CheckNative)));
        }
        chain.push(graph.add_step(step(StepKind::Assemble)));
        chain.push(graph.add_step(step(StepKind::Finalize)));

        for pair in chain.windows(2) {
            graph.add_edge(pair[0], pair[1]);
        }
        chains.push(chain);
    }

    let assembled: Vec<std::sync::Mutex<Option<std::path::PathBuf>>> =
        variants.iter().map(|_| std::sync::Mutex::new(None)).collect();
    let finalized: Vec<std::sync::Mutex<Option<std::path::PathBuf>>> =
        variants.iter().map(|_| std::sync::Mutex::new(None)).collect();

    let outcome = graph.execute(&options.pipeline, |step| -> Result<(), Error> {
        match step.kind {
            StepKind::CheckNative => {
                check_native(&target_root, step.variant)
            },
            StepKind::Assemble => {
                let path = assembler.assemble(step.variant)?;
                tracing::debug!(variant = %step.variant, path = ?path, "assembled");
                *lock(&assembled[step.index]) = Some(path);
                Ok(())
            },
            StepKind::Finalize => {
                let artifact = lock(&assembled[step.index]).take().ok_or_else(
                    || Error::ArtifactMissing(step.variant.name().into()),
                )?;
                let path = finalize::finalize(&artifact, &locations[step.index])?;
                *lock(&finalized[step.index]) = Some(path);
                Ok(())
            },
        }
    })?;

    let mut entries: Vec<Entry> = variants.iter().zip(chains.iter()).map(|(variant, chain)| {
        let statuses: Vec<_> = chain.iter().map(|v| outcome.status(*v)).collect();
        let status = if statuses.contains(&pipeline::Status::Failed) {
            pipeline::Status::Failed
        } else if statuses.iter().all(|v| *v == pipeline::Status::Completed) {
            pipeline::Status::Completed
        } else {
            pipeline::Status::Skipped
        };

        Entry {
            variant: variant.clone(),
            status: status,
            artifact: None,
            errors: Vec::new(),
        }
    }).collect();

    for (id, error) in outcome.into_errors() {
        entries[graph.step(id).index].errors.push(error);
    }
    for (entry, path) in entries.iter_mut().zip(finalized.into_iter()) {
        entry.artifact = path.into_inner().unwrap_or_else(|v| v.into_inner());
    }

    Ok(Report {
        entries: entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::parse_name;

    // Assembler writing a fake APK per variant into a scratch directory.
    // Variants listed in `fail` exit with an error instead.
    struct Fake {
        dir: std::path::PathBuf,
        fail: Vec<&'static str>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl Fake {
        fn new(dir: &std::path::Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                fail: Vec::new(),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl Assemble for Fake {
        fn assemble(&self, variant: &Variant) -> Result<std::path::PathBuf, Error> {
            self.calls.lock().unwrap().push(variant.name());
            if self.fail.iter().any(|v| *v == variant.name()) {
                return Err(Error::ArtifactMissing(variant.name().into()));
            }

            let path = self.dir.join(format!("app-{}.apk", variant.name()));
            std::fs::write(&path, variant.name()).unwrap();
            Ok(path)
        }
    }

    fn manifest(root: &std::path::Path) -> Manifest {
        Manifest::parse_str(&format!(
            "version = 1\n[android]\ntarget-root = \"{}\"\n",
            root.display(),
        )).unwrap()
    }

    fn variants(names: &[&str]) -> Vec<Variant> {
        names.iter().map(|v| parse_name(v).unwrap()).collect()
    }

    fn no_native() -> Options {
        Options {
            check_native: false,
            ..Default::default()
        }
    }

    // Verify both build types of one architecture finalize side by side
    #[test]
    fn build_assembles_and_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("target");
        let m = manifest(&root);
        let fake = Fake::new(dir.path());

        let report = build(&m, &variants(&["x86Debug", "x86Release"]), &fake, &no_native()).unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.entries[0].artifact.as_deref(),
            Some(root.join("debug/x86/servoapp.apk").as_path()),
        );
        assert_eq!(std::fs::read(root.join("debug/x86/servoapp.apk")).unwrap(), b"mainX86Debug");
        assert_eq!(std::fs::read(root.join("release/x86/servoapp.apk")).unwrap(), b"mainX86Release");
    }

    // Verify a failed assembly never gets finalized
    #[test]
    fn build_failure_skips_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("target");
        let m = manifest(&root);
        let mut fake = Fake::new(dir.path());
        fake.fail.push("mainArmDebug");

        let options = Options {
            check_native: false,
            pipeline: pipeline::Options { keep_going: true, jobs: Some(2) },
        };
        let report = build(&m, &variants(&["armDebug", "arm64Debug"]), &fake, &options).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.entries[0].status, pipeline::Status::Failed);
        assert_eq!(report.entries[0].errors.len(), 1);
        assert!(report.entries[0].artifact.is_none());
        assert!(!root.join("debug/arm/servoapp.apk").exists());

        assert_eq!(report.entries[1].status, pipeline::Status::Completed);
        assert!(root.join("debug/arm64/servoapp.apk").exists());
    }

    // Verify missing native libraries stop the chain before Gradle runs
    #[test]
    fn build_checks_native() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("target");
        let m = manifest(&root);
        let fake = Fake::new(dir.path());
        let vs = variants(&["armv7Release"]);

        let report = build(&m, &vs, &fake, &Options::default()).unwrap();
        assert_eq!(report.entries[0].status, pipeline::Status::Failed);
        assert!(matches!(report.entries[0].errors[0], Error::NativeLibraries(_)));
        assert!(fake.calls.lock().unwrap().is_empty());

        let libs = root.join("armv7-linux-androideabi/release/apk/jniLibs/armeabi-v7a");
        std::fs::create_dir_all(&libs).unwrap();
        std::fs::write(libs.join("libsimpleservo.so"), b"").unwrap();

        let report = build(&m, &vs, &fake, &Options::default()).unwrap();
        assert!(report.is_success());
        assert_eq!(*fake.calls.lock().unwrap(), ["mainArmv7Release"]);
    }

    // Verify colliding variants are refused before anything runs
    #[test]
    fn build_refuses_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path());
        let fake = Fake::new(dir.path());

        let r = build(&m, &variants(&["mainArmDebug", "googlevrArmDebug"]), &fake, &no_native());

        assert!(matches!(r, Err(Error::Resolve(resolve::Error::Collision { .. }))));
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    fn flavored(root: &std::path::Path) -> Manifest {
        Manifest::parse_str(&format!(
            "
            version = 1
            [android]
            target-root = \"{}\"
            architectures = [\"arm\", \"armv7\", \"arm64\", \"x86\"]
            [[flavor]]
            id = \"main\"
            [[flavor]]
            id = \"googlevr\"
            architectures = [\"armv7\", \"arm64\"]
            ",
            root.display(),
        )).unwrap()
    }

    // Verify building without explicit variants on a multi-flavor manifest
    //
    // The default selection covers a single flavor only, so it never runs
    // into location collisions, while the whole matrix would.
    #[test]
    fn build_default_selection() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("target");
        let m = flavored(&root);
        let fake = Fake::new(dir.path());

        assert!(matches!(
            build(&m, m.matrix().variants(), &fake, &no_native()),
            Err(Error::Resolve(resolve::Error::Collision { .. })),
        ));

        let vs = select(&m, None).unwrap();
        assert_eq!(vs.len(), 8);
        assert!(vs.iter().all(|v| v.flavor == "main"));

        let report = build(&m, &vs, &fake, &no_native()).unwrap();
        assert!(report.is_success());
        assert_eq!(std::fs::read(root.join("debug/arm/servoapp.apk")).unwrap(), b"mainArmDebug");
        assert_eq!(std::fs::read(root.join("release/x86/servoapp.apk")).unwrap(), b"mainX86Release");

        let vs = select(&m, Some("googlevr")).unwrap();
        assert_eq!(vs.len(), 4);

        let report = build(&m, &vs, &fake, &no_native()).unwrap();
        assert!(report.is_success());
        assert_eq!(
            std::fs::read(root.join("debug/arm64/servoapp.apk")).unwrap(),
            b"googlevrArm64Debug",
        );

        assert!(matches!(select(&m, Some("oculusvr")), Err(Error::UnknownFlavor(_))));
    }

    // Verify artifact lookup via output metadata and via directory scan
    #[test]
    fn locate_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();

        assert!(matches!(locate_artifact(out), Err(Error::ArtifactMissing(_))));

        std::fs::write(out.join("app-main-armDebug.apk"), b"").unwrap();
        assert_eq!(locate_artifact(out).unwrap(), out.join("app-main-armDebug.apk"));

        std::fs::write(out.join("other.apk"), b"").unwrap();
        assert!(matches!(locate_artifact(out), Err(Error::ArtifactAmbiguous(_))));

        std::fs::write(
            out.join("output-metadata.json"),
            r#"{"version": 3, "variantName": "mainArmDebug", "elements": [{"type": "SINGLE", "outputFile": "other.apk"}]}"#,
        ).unwrap();
        assert_eq!(locate_artifact(out).unwrap(), out.join("other.apk"));

        std::fs::write(out.join("output-metadata.json"), "{").unwrap();
        assert!(matches!(locate_artifact(out), Err(Error::Metadata(..))));
    }

    // Verify the Gradle command-line of a variant
    #[test]
    fn gradle_command() {
        let s = "
            version = 1
            [application]
            name = \"Servo\"
            [android]
            project-dir = \"/src/shell\"
            target-root = \"/out\"
            module = \"servoapp\"
            min-sdk = 18
            [[flavor]]
            id = \"googlevr\"
            min-sdk = 21
        ";
        let m = Manifest::parse_str(s).unwrap();
        let g = Gradle::new(&m);
        let v = parse_name("googlevrArm64Debug").unwrap();

        let cmd = g.command(&v).unwrap();
        let args: Vec<String> = cmd.get_args().map(|v| v.to_string_lossy().into_owned()).collect();

        assert_eq!(cmd.get_program(), "gradle");
        assert_eq!(args[0], ":servoapp:assembleGooglevrArm64Debug");
        assert!(args.contains(&"/src/shell".to_string()));
        assert!(args.contains(&"buildDir=/out/apk-variants/gradle-build".to_string()));
        assert!(args.contains(&"apkVariants.name=Servo".to_string()));
        assert!(args.contains(&"apkVariants.minSdk=21".to_string()));
        assert!(args.contains(&"apkVariants.abi=arm64-v8a".to_string()));
        assert!(args.contains(
            &"apkVariants.jniLibsDir=/out/aarch64-linux-android/debug/apk/jniLibs".to_string(),
        ));

        assert_eq!(
            g.output_dir(&v).unwrap(),
            std::path::Path::new("/out/apk-variants/gradle-build/outputs/apk/googlevr/arm64Debug"),
        );
    }

    // Verify a project without product flavors
    //
    // Neither the task nor the output directory of the Android Gradle plugin
    // carry a flavor segment in that case.
    #[test]
    fn gradle_command_without_flavors() {
        let s = "
            version = 1
            [android]
            target-root = \"/out\"
        ";
        let m = Manifest::parse_str(s).unwrap();
        let g = Gradle::new(&m);
        let v = parse_name("armv7Release").unwrap();

        let cmd = g.command(&v).unwrap();
        let args: Vec<String> = cmd.get_args().map(|v| v.to_string_lossy().into_owned()).collect();

        assert_eq!(args[0], ":app:assembleArmv7Release");
        assert_eq!(
            g.output_dir(&v).unwrap(),
            std::path::Path::new("/out/apk-variants/gradle-build/outputs/apk/armv7Release"),
        );
    }
}
