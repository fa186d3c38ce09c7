//! `nuget lock` commands.

use super::EXIT_FAILURE;
use miette::{IntoDiagnostic, Result};
use nuget_core::paths::absolutize;
use nuget_core::pkg::{is_lock_file_still_valid, lock_file_path, PackagesLockFile};
use nuget_core::project::{classify_path, ProjectInput};
use nuget_core::Config;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct DependencyOutput {
    id: String,
    #[serde(rename = "type")]
    dependency_type: String,
    requested: Option<String>,
    resolved: Option<String>,
    content_hash: Option<String>,
    dependencies: usize,
}

#[derive(Serialize)]
struct TargetOutput {
    name: String,
    dependencies: Vec<DependencyOutput>,
}

#[derive(Serialize)]
struct ComparisonOutput {
    other: String,
    is_valid: bool,
    matched_dependencies: usize,
}

#[derive(Serialize)]
struct LockShowOutput {
    path: String,
    version: i32,
    targets: Vec<TargetOutput>,
    comparison: Option<ComparisonOutput>,
}

/// Lock file for a path argument; directories use the project's lock file.
fn locate(cwd: &Path, path: Option<&Path>) -> PathBuf {
    let path = path.map_or_else(|| cwd.to_path_buf(), |p| absolutize(cwd, p));
    if !path.is_dir() {
        return path;
    }

    let project_name = match classify_path(&path) {
        Ok(ProjectInput::Project(project)) => project
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned()),
        _ => None,
    };
    lock_file_path(&path, project_name.as_deref())
}

fn load(path: &Path) -> PackagesLockFile {
    match PackagesLockFile::read_from(path) {
        Ok(lock_file) => lock_file,
        Err(e) => {
            eprintln!("{}", e.message());
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// `nuget lock show [PATH] [--compare OTHER]`.
pub fn show(config: &Config, path: Option<&Path>, compare: Option<&Path>, json: bool) -> Result<()> {
    let path = locate(&config.cwd, path);
    debug!(path = %path.display(), "Reading lock file");
    let lock_file = load(&path);

    let comparison = compare.map(|other| {
        let other_path = locate(&config.cwd, Some(other));
        let other_lock = load(&other_path);
        let validity = is_lock_file_still_valid(&lock_file, &other_lock);
        ComparisonOutput {
            other: other_path.display().to_string(),
            is_valid: validity.is_valid,
            matched_dependencies: validity.matched_dependencies.len(),
        }
    });

    let targets: Vec<TargetOutput> = lock_file
        .targets
        .iter()
        .map(|target| TargetOutput {
            name: target.name(),
            dependencies: target
                .dependencies
                .iter()
                .map(|dep| DependencyOutput {
                    id: dep.id.clone(),
                    dependency_type: dep.dependency_type.to_string(),
                    requested: dep.requested_version.clone(),
                    resolved: dep.resolved_version.clone(),
                    content_hash: dep.content_hash.clone(),
                    dependencies: dep.dependencies.len(),
                })
                .collect(),
        })
        .collect();

    let differs = comparison.as_ref().is_some_and(|c| !c.is_valid);
    let output = LockShowOutput {
        path: path.display().to_string(),
        version: lock_file.version,
        targets,
        comparison,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else {
        print_summary(&output);
    }

    if differs {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

fn print_summary(output: &LockShowOutput) {
    println!("{} (version {})", output.path, output.version);
    for target in &output.targets {
        println!();
        println!("  [{}]", target.name);
        for dep in &target.dependencies {
            let resolved = dep
                .resolved
                .as_deref()
                .map(|v| format!(" {v}"))
                .unwrap_or_default();
            match &dep.requested {
                Some(requested) => println!(
                    "    {}{resolved} ({}, requested {requested})",
                    dep.id, dep.dependency_type
                ),
                None => println!("    {}{resolved} ({})", dep.id, dep.dependency_type),
            }
        }
    }

    if let Some(comparison) = &output.comparison {
        println!();
        if comparison.is_valid {
            println!(
                "Lock file matches {} ({} dependencies, content hashes ignored)",
                comparison.other, comparison.matched_dependencies
            );
        } else {
            println!("Lock file differs from {}", comparison.other);
        }
    }
}
