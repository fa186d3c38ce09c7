//! `nuget why` command.

use super::{use_color, EXIT_FAILURE, EXIT_INVALID_ARGS};
use miette::{IntoDiagnostic, Result};
use nuget_core::paths::absolutize;
use nuget_core::pkg::why::{why_codes, ProjectWhyResult, TreeLine, WhyError, PKG_WHY_SCHEMA_VERSION};
use nuget_core::project::{classify_path, why_for_file, ProjectFileEvaluator};
use nuget_core::Config;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct WhyOutput<'a> {
    schema_version: u32,
    ok: bool,
    package: &'a str,
    projects: Vec<ProjectWhyResult>,
    errors: Vec<WhyError>,
}

/// Split `[PROJECT|SOLUTION] PACKAGE`; a single argument is the package.
fn split_args<'a>(cwd: &Path, args: &'a [String]) -> Result<(PathBuf, &'a str), WhyError> {
    let (path, package) = match args {
        [package] => (cwd.to_path_buf(), package.as_str()),
        [path, package] => (absolutize(cwd, Path::new(path)), package.as_str()),
        _ => {
            return Err(WhyError::new(
                why_codes::PKG_WHY_ARGS_INVALID,
                "Expected [PROJECT|SOLUTION] PACKAGE",
            ))
        }
    };

    if package.trim().is_empty() {
        return Err(WhyError::new(
            why_codes::PKG_WHY_ARGS_INVALID,
            "A package name is required",
        ));
    }
    Ok((path, package.trim()))
}

pub fn run(config: &Config, args: &[String], frameworks: &[String], json: bool) -> Result<()> {
    let (path, package) = match split_args(&config.cwd, args) {
        Ok(parsed) => parsed,
        Err(e) => return fail(json, "", Vec::new(), vec![e]),
    };
    let input = match classify_path(&path) {
        Ok(input) => input,
        Err(e) => return fail(json, package, Vec::new(), vec![e]),
    };
    let files = match input.files() {
        Ok(files) => files,
        Err(e) => return fail(json, package, Vec::new(), vec![e]),
    };
    debug!(inputs = files.len(), package, "Explaining package");

    let evaluator = ProjectFileEvaluator;
    let color = !json && use_color();
    let mut projects = Vec::new();
    let mut errors = Vec::new();

    // A failing project is reported and the rest are still processed.
    for file in &files {
        match why_for_file(&evaluator, file, package, frameworks) {
            Ok(result) => {
                if !json {
                    print!("{}", result.format_with(|line| node_label(line, color)));
                }
                projects.push(result);
            }
            Err(e) => {
                if !json {
                    eprintln!("{}", e.message());
                }
                errors.push(e);
            }
        }
    }

    if json {
        print_json(&WhyOutput {
            schema_version: PKG_WHY_SCHEMA_VERSION,
            ok: errors.is_empty(),
            package,
            projects,
            errors: errors.clone(),
        })?;
    }

    if !errors.is_empty() {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

fn node_label(line: &TreeLine, color: bool) -> String {
    let label = line.label();
    if line.is_target && color {
        label.cyan().bold().to_string()
    } else {
        label
    }
}

fn fail(
    json: bool,
    package: &str,
    projects: Vec<ProjectWhyResult>,
    errors: Vec<WhyError>,
) -> Result<()> {
    if json {
        print_json(&WhyOutput {
            schema_version: PKG_WHY_SCHEMA_VERSION,
            ok: false,
            package,
            projects,
            errors: errors.clone(),
        })?;
    } else {
        for e in &errors {
            eprintln!("{}", e.message());
        }
    }

    let usage = errors.iter().any(WhyError::is_usage_error);
    std::process::exit(if usage { EXIT_INVALID_ARGS } else { EXIT_FAILURE });
}

fn print_json(output: &WhyOutput<'_>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output).into_diagnostic()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_argument_is_package() {
        let args = vec!["Newtonsoft.Json".to_string()];
        let (path, package) = split_args(Path::new("/work"), &args).unwrap();
        assert_eq!(path, PathBuf::from("/work"));
        assert_eq!(package, "Newtonsoft.Json");
    }

    #[test]
    fn test_path_and_package() {
        let args = vec!["src/App.csproj".to_string(), "A".to_string()];
        let (path, package) = split_args(Path::new("/work"), &args).unwrap();
        assert_eq!(path, PathBuf::from("/work/src/App.csproj"));
        assert_eq!(package, "A");
    }

    #[test]
    fn test_blank_package_is_usage_error() {
        let args = vec!["App.sln".to_string(), "  ".to_string()];
        let err = split_args(Path::new("/work"), &args).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_ARGS_INVALID);
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_target_label_is_plain_without_color() {
        let line = TreeLine {
            prefix: "└─ ".to_string(),
            id: "B".to_string(),
            version: "1.0.0".to_string(),
            is_target: true,
        };
        assert_eq!(node_label(&line, false), "B (v1.0.0)");
        assert_ne!(node_label(&line, true), "B (v1.0.0)");
    }
}
