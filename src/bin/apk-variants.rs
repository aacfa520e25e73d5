//! APK Variant Tooling
//!
//! This is the entry-point of `apk-variants`, a command-line tool to package
//! the build variants of an Android application shell. Its main input is the
//! `apk-variants.toml` manifest, which describes the Gradle project and the
//! variant matrix.
//!
//! This CLI is mainly a dispatcher of all the operations available in
//! `apk_variants::op::*`. It is a simple clap-based CLI that forwards the
//! arguments to `apk_variants` and visualizes the results.

use apk_variants::{manifest, op, pipeline, variant};
use clap;
use serde;
use serde_json;
use tracing_subscriber;

struct Cli {
    cmd: clap::Command,
}

// Row of the `variants` listing.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing {
    name: String,
    flavor: String,
    arch: &'static str,
    build_type: &'static str,
    abi: &'static str,
    task: String,
    output: std::path::PathBuf,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "apk_variants=debug"
    } else {
        "apk_variants=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

impl Cli {
    fn new() -> Self {
        let mut cmd;

        cmd = clap::Command::new("apk-variants")
            .propagate_version(true)
            .subcommand_required(true)
            .about("APK Variant Tooling")
            .long_about("Package the build variants of an Android application shell")
            .version(clap::crate_version!());

        cmd = cmd.arg(
            clap::Arg::new("manifest")
                .long("manifest")
                .value_name("PATH")
                .help("Path to the variant manifest relative to the working directory")
                .default_value("./apk-variants.toml")
                .value_parser(clap::builder::ValueParser::path_buf())
        );

        cmd = cmd.arg(
            clap::Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable debug logging")
                .global(true)
                .action(clap::ArgAction::SetTrue)
        );

        cmd = cmd.subcommand(
            clap::Command::new("variants")
                .about("List the configured variants and their output locations")
                .arg(
                    clap::Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .default_value("text")
                        .value_parser(["text", "json"])
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("resolve")
                .about("Print the output location of a variant")
                .arg(
                    clap::Arg::new("variant")
                        .value_name("VARIANT")
                        .help("Variant name, e.g. `armv7Release` or `googlevrArm64Debug`")
                        .required(true)
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("build")
                .about("Assemble and finalize variants")
                .arg(
                    clap::Arg::new("variant")
                        .long("variant")
                        .value_name("NAME")
                        .help("Variant to build, can be given multiple times")
                        .action(clap::ArgAction::Append)
                )
                .arg(
                    clap::Arg::new("flavor")
                        .long("flavor")
                        .value_name("FLAVOR")
                        .help("Build all variants of a flavor (default: `main`, or the first flavor)")
                        .conflicts_with("variant")
                )
                .arg(
                    clap::Arg::new("keep-going")
                        .long("keep-going")
                        .help("Continue with independent variants after a failure")
                        .action(clap::ArgAction::SetTrue)
                )
                .arg(
                    clap::Arg::new("jobs")
                        .long("jobs")
                        .short('j')
                        .value_name("N")
                        .help("Maximum number of concurrent build steps")
                        .value_parser(clap::value_parser!(usize))
                )
                .arg(
                    clap::Arg::new("skip-native-check")
                        .long("skip-native-check")
                        .help("Do not verify native libraries are staged")
                        .action(clap::ArgAction::SetTrue)
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("finalize")
                .about("Copy an assembled artifact into the output location of a variant")
                .arg(
                    clap::Arg::new("variant")
                        .long("variant")
                        .value_name("NAME")
                        .help("Variant the artifact belongs to")
                        .required(true)
                )
                .arg(
                    clap::Arg::new("artifact")
                        .long("artifact")
                        .value_name("PATH")
                        .help("Path to the assembled artifact")
                        .required(true)
                        .value_parser(clap::builder::ValueParser::path_buf())
                )
        );

        Self {
            cmd: cmd,
        }
    }

    fn manifest(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<manifest::Manifest, u8> {
        let path: &std::path::PathBuf = m.get_one("manifest").expect("Manifest path lacks a value");

        manifest::Manifest::parse_path(path).map_err(|e| {
            eprintln!("Cannot load variant manifest {:?}: {}", path, e);
            1
        })
    }

    // Look up a variant name in the configured matrix
    //
    // An invalid name is a broken configuration, so it aborts the operation
    // before anything is built.
    fn variant(
        manifest: &manifest::Manifest,
        name: &str,
    ) -> Result<variant::Variant, u8> {
        manifest.matrix().variant_by_name(name).map_err(|e| {
            eprintln!("Cannot select variant: {}", e);
            1
        })
    }

    fn op_variants(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let format: &String = m_op.get_one("format").expect("Format lacks a value");
        let target_root = manifest.target_root();
        let gradle = op::build::Gradle::new(&manifest);

        let listing: Vec<Listing> = manifest.matrix().variants().iter().map(|v| {
            let location = op::resolve::Location::for_variant(
                &target_root,
                v,
                manifest.artifact_name(),
            );

            Listing {
                name: v.name(),
                flavor: v.flavor.clone(),
                arch: v.arch.as_str(),
                build_type: v.build_type.as_str(),
                abi: v.arch.abi(),
                task: gradle.task(v),
                output: location.path(),
            }
        }).collect();

        if format == "json" {
            let s = serde_json::to_string_pretty(&listing).map_err(|e| {
                eprintln!("Cannot serialize variant listing: {}", e);
                1
            })?;
            println!("{}", s);
        } else {
            for v in listing.iter() {
                println!("{:<24} {:<12} {:<32} {}", v.name, v.abi, v.task, v.output.display());
            }
        }

        Ok(())
    }

    fn op_resolve(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let name: &String = m_op.get_one("variant").expect("Variant lacks a value");
        let variant = Self::variant(&manifest, name)?;

        let location = op::resolve::Location::for_variant(
            &manifest.target_root(),
            &variant,
            manifest.artifact_name(),
        );
        println!("{}", location.path().display());

        Ok(())
    }

    fn op_build(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;

        // Resolve all names up front, so a broken name aborts the whole
        // invocation before any variant is touched. Without names, a single
        // flavor is built, since flavors share output locations.
        let variants: Vec<variant::Variant> = match m_op.get_many::<String>("variant") {
            Some(names) => {
                names.map(|v| Self::variant(&manifest, v)).collect::<Result<_, _>>()?
            },
            None => {
                let flavor = m_op.get_one::<String>("flavor").map(|v| v.as_str());
                op::build::select(&manifest, flavor).map_err(|e| {
                    eprintln!("Cannot select variants: {}", e);
                    1
                })?
            },
        };

        let options = op::build::Options {
            pipeline: pipeline::Options {
                keep_going: m_op.get_flag("keep-going"),
                jobs: m_op.get_one::<usize>("jobs").copied(),
            },
            check_native: !m_op.get_flag("skip-native-check"),
        };

        let gradle = op::build::Gradle::new(&manifest);
        let report = op::build::build(&manifest, &variants, &gradle, &options).map_err(|e| {
            eprintln!("Cannot build variants: {}", e);
            1
        })?;

        for entry in report.entries.iter() {
            match entry.status {
                pipeline::Status::Completed => {
                    if let Some(path) = &entry.artifact {
                        println!("{:<24} {}", entry.variant.name(), path.display());
                    }
                },
                pipeline::Status::Failed => {
                    for e in entry.errors.iter() {
                        eprintln!("Cannot build {}: {}", entry.variant.name(), e);
                    }
                },
                pipeline::Status::Skipped | pipeline::Status::Pending => {
                    eprintln!("Skipped {}", entry.variant.name());
                },
            }
        }

        if report.is_success() {
            Ok(())
        } else {
            Err(1)
        }
    }

    fn op_finalize(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let name: &String = m_op.get_one("variant").expect("Variant lacks a value");
        let artifact: &std::path::PathBuf = m_op.get_one("artifact").expect("Artifact lacks a value");
        let variant = Self::variant(&manifest, name)?;

        let location = op::resolve::Location::for_variant(
            &manifest.target_root(),
            &variant,
            manifest.artifact_name(),
        );

        match op::finalize::finalize(artifact, &location) {
            Err(e) => {
                eprintln!("Cannot finalize {}: {}", variant.name(), e);
                Err(1)
            },
            Ok(path) => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    // Parse the command-line and dispatch
    //
    // Help and version requests are not failures, all other parse errors
    // exit with the usage code `2`. Logging is set up only after parsing,
    // since `--verbose` selects the filter.
    fn run(mut self) -> Result<(), u8> {
        let (m, r);

        r = self.cmd.try_get_matches_from_mut(
            std::env::args_os(),
        );

        match r {
            Ok(v) => m = v,
            Err(e) => {
                return match e.kind() {
                    clap::error::ErrorKind::DisplayHelp |
                    clap::error::ErrorKind::DisplayVersion => {
                        e.print().expect("Cannot write to STDERR");
                        Ok(())
                    },
                    _ => {
                        e.print().expect("Cannot write to STDERR");
                        Err(2)
                    }
                }
            }
        }

        init_logging(m.get_flag("verbose"));

        match m.subcommand() {
            Some(("variants", m_op)) => self.op_variants(&m, m_op),
            Some(("resolve", m_op)) => self.op_resolve(&m, m_op),
            Some(("build", m_op)) => self.op_build(&m, m_op),
            Some(("finalize", m_op)) => self.op_finalize(&m, m_op),
            _ => std::unreachable!(),
        }
    }
}

fn main() -> std::process::ExitCode {
    match Cli::new().run() {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
