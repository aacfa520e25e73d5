//! Artifact Finalization
//!
//! After a variant was assembled, its APK lives somewhere inside the Gradle
//! build directory. The `finalize` operation copies it into the resolved
//! output location under the canonical artifact name.
//!
//! The copy is written to a hidden partial file next to the destination and
//! then renamed onto it. Readers of the output location thus either see the
//! previous artifact or the complete new one.

use crate::op::resolve::Location;

/// Finalize Errors
///
/// This is the exhaustive list of errors raised by the finalize operation.
/// None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The assembled artifact does not exist or is not a regular file.
    #[error("assembled artifact {0:?} is missing")]
    MissingArtifact(std::ffi::OsString),
    /// Creation of the output directory failed.
    #[error("cannot create directory {0:?}: {1}")]
    DirectoryCreation(std::ffi::OsString, std::io::Error),
    /// Copying the artifact to the given path failed.
    #[error("cannot copy artifact to {0:?}: {1}")]
    Copy(std::ffi::OsString, std::io::Error),
    /// Moving the copy into place at the given path failed.
    #[error("cannot move artifact into place at {0:?}: {1}")]
    Rename(std::ffi::OsString, std::io::Error),
}

// Ensure directory exists
//
// Make sure the directory at the given path exists. Create the directory and
// its parent directories if necessary.
fn ensure_dir(
    path: &std::path::Path,
) -> Result<(), Error> {
    std::fs::create_dir_all(path)
        .map_err(
            |v| Error::DirectoryCreation(path.as_os_str().to_os_string(), v)
        )
}

// Copy a file and sync it
//
// Copy `from` to `to`, truncating `to` if it exists, and sync the result so
// write errors are caught before the file is moved into place.
fn copy_synced(
    from: &std::path::Path,
    to: &std::path::Path,
) -> Result<(), Error> {
    let map = |v: std::io::Error| Error::Copy(to.as_os_str().to_os_string(), v);

    let mut src = std::fs::File::open(from).map_err(map)?;
    let mut dst = std::fs::File::create(to).map_err(map)?;

    std::io::copy(&mut src, &mut dst).map_err(map)?;
    dst.sync_all().map_err(map)?;

    Ok(())
}

/// Finalize an assembled artifact
///
/// Copy the artifact at `artifact` into `location`, creating the output
/// directory if needed, and return the final path. An existing artifact at
/// the destination is replaced.
pub fn finalize(
    artifact: &std::path::Path,
    location: &Location,
) -> Result<std::path::PathBuf, Error> {
    match std::fs::metadata(artifact) {
        Ok(m) if m.is_file() => {},
        _ => return Err(Error::MissingArtifact(artifact.as_os_str().to_os_string())),
    }

    ensure_dir(&location.dir)?;

    let target = location.path();
    let mut partial = location.dir.clone();
    partial.push(format!(".{}.partial", location.file_name));

    tracing::debug!(from = ?artifact, to = ?target, "copying artifact");

    if let Err(e) = copy_synced(artifact, &partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&partial, &target) {
        let _ = std::fs::remove_file(&partial);
        return Err(Error::Rename(target.as_os_str().to_os_string(), e));
    }

    tracing::info!(path = ?target, "artifact finalized");

    Ok(target)
}
