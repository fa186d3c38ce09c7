//! `nuget cache` commands.

use super::{EXIT_FAILURE, EXIT_INVALID_ARGS};
use miette::{IntoDiagnostic, Result};
use nuget_core::pkg::{
    get_package, get_packages_by_id, LocalPackageFileCache, LocalPackageInfo, LocalRepository,
    NuGetVersion,
};
use nuget_core::Config;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct PackageOutput {
    id: String,
    version: String,
    path: String,
    fallback: bool,
    content_hash: Option<String>,
    file_count: Option<usize>,
    dependencies: Vec<String>,
}

#[derive(Serialize)]
struct FindOutput {
    ok: bool,
    id: String,
    packages: Vec<PackageOutput>,
}

#[derive(Serialize)]
struct VersionsOutput {
    id: String,
    root: String,
    versions: Vec<String>,
}

/// Global folder first, then fallback folders, sharing one file cache.
fn repositories(config: &Config) -> Result<Vec<Arc<LocalRepository>>> {
    let global = config.resolve_packages_folder().into_diagnostic()?;
    let file_cache = Arc::new(LocalPackageFileCache::new());

    let mut repositories = vec![Arc::new(LocalRepository::with_file_cache(
        global,
        Arc::clone(&file_cache),
    ))];
    for folder in config.resolve_fallback_folders() {
        repositories.push(Arc::new(
            LocalRepository::with_file_cache(folder, Arc::clone(&file_cache)).as_fallback(),
        ));
    }

    debug!(
        repositories = repositories.len(),
        global = %repositories[0].root().display(),
        "Opened package folders"
    );
    Ok(repositories)
}

fn describe(repository: &LocalRepository, package: &LocalPackageInfo) -> PackageOutput {
    let content_hash = match package.sha512() {
        Ok(hash) => Some(hash.as_str().to_string()),
        Err(e) => {
            warn!(package = package.id(), error = %e, "Unable to read content hash");
            None
        }
    };
    let file_count = match package.files() {
        Ok(files) => Some(files.len()),
        Err(e) => {
            warn!(package = package.id(), error = %e, "Unable to list package files");
            None
        }
    };
    let dependencies = match package.nuspec() {
        Ok(nuspec) => {
            let mut ids: Vec<String> = nuspec.dependency_ids().map(str::to_string).collect();
            ids.sort_by_key(|id| id.to_ascii_lowercase());
            ids.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
            ids
        }
        Err(e) => {
            warn!(package = package.id(), error = %e, "Unable to read nuspec");
            Vec::new()
        }
    };

    PackageOutput {
        id: package.id().to_string(),
        version: package.version().to_normalized_string(),
        path: package.expanded_path().display().to_string(),
        fallback: repository.is_fallback_folder(),
        content_hash,
        file_count,
        dependencies,
    }
}

fn print_package(package: &PackageOutput) {
    println!("{} {}", package.id, package.version);
    println!("  path: {}", package.path);
    println!(
        "  source: {}",
        if package.fallback {
            "fallback folder"
        } else {
            "global packages folder"
        }
    );
    if let Some(hash) = &package.content_hash {
        println!("  contentHash: {hash}");
    }
    if let Some(count) = package.file_count {
        println!("  files: {count}");
    }
    if !package.dependencies.is_empty() {
        println!("  dependencies: {}", package.dependencies.join(", "));
    }
}

/// `nuget cache find ID [VERSION]`.
pub fn find(config: &Config, id: &str, version: Option<&str>, json: bool) -> Result<()> {
    let version = match version.map(NuGetVersion::parse).transpose() {
        Ok(version) => version,
        Err(e) => {
            eprintln!("{}", e.message());
            std::process::exit(EXIT_INVALID_ARGS);
        }
    };
    let repositories = repositories(config)?;

    let packages: Vec<PackageOutput> = match &version {
        Some(version) => get_package(&repositories, id, version)
            .map(|found| vec![describe(&found.repository, &found.package)])
            .unwrap_or_default(),
        None => get_packages_by_id(&repositories, id)
            .map(|(repository, packages)| {
                packages
                    .iter()
                    .map(|package| describe(&repository, package))
                    .collect()
            })
            .unwrap_or_default(),
    };

    let found = !packages.is_empty();
    if json {
        let output = FindOutput {
            ok: found,
            id: id.to_string(),
            packages,
        };
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else if found {
        for package in &packages {
            print_package(package);
        }
    } else {
        match &version {
            Some(version) => eprintln!("Package '{id}' version '{version}' is not installed"),
            None => eprintln!("Package '{id}' is not installed"),
        }
    }

    if !found {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

/// `nuget cache versions ID`.
pub fn versions(config: &Config, id: &str, json: bool) -> Result<()> {
    let root = config.resolve_packages_folder().into_diagnostic()?;
    let repository = LocalRepository::new(root);
    let versions: Vec<String> = repository
        .find_packages_by_id(id)
        .iter()
        .map(|package| package.version().to_normalized_string())
        .collect();

    if json {
        let output = VersionsOutput {
            id: id.to_string(),
            root: repository.root().display().to_string(),
            versions,
        };
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else if versions.is_empty() {
        println!("No versions of '{id}' are installed");
    } else {
        for version in &versions {
            println!("{version}");
        }
    }
    Ok(())
}
