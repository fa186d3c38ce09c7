//! Project and solution discovery for `why`.
//!
//! Project files are read statically: properties are taken as written, and
//! values that still contain `$(...)` references are ignored.

use crate::pkg::assets::{AssetsFile, ASSETS_FILE_NAME};
use crate::pkg::why::{why_codes, why_for_project, ProjectWhyResult, WhyError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project file extensions accepted as inputs.
pub const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj", "proj"];

const SOLUTION_EXTENSION: &str = "sln";
const DEFAULT_INTERMEDIATE_PATH: &str = "obj";

/// What a path argument points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectInput {
    Solution(PathBuf),
    Project(PathBuf),
    AssetsFile(PathBuf),
}

impl ProjectInput {
    /// Files to inspect for this input; solutions expand to their projects.
    pub fn files(&self) -> Result<Vec<PathBuf>, WhyError> {
        match self {
            Self::Solution(path) => solution_projects(path),
            Self::Project(path) | Self::AssetsFile(path) => Ok(vec![path.clone()]),
        }
    }
}

/// Classify a path argument.
///
/// A directory must contain exactly one solution or project file.
pub fn classify_path(path: &Path) -> Result<ProjectInput, WhyError> {
    if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| {
            WhyError::new(
                why_codes::PKG_WHY_PATH_INVALID,
                format!("Unable to read directory {}: {e}", path.display()),
            )
            .with_path(path.display().to_string())
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                extension(p).is_some_and(|ext| {
                    ext == SOLUTION_EXTENSION || PROJECT_EXTENSIONS.contains(&ext.as_str())
                })
            })
            .collect();
        candidates.sort();

        return match candidates.as_slice() {
            [single] => classify_file(single),
            [] => Err(path_invalid(
                path,
                "does not contain a project or solution file",
            )),
            _ => Err(path_invalid(
                path,
                "contains more than one project or solution file; specify which one to use",
            )),
        };
    }

    if path.is_file() {
        return classify_file(path);
    }

    Err(path_invalid(path, "does not exist"))
}

fn classify_file(path: &Path) -> Result<ProjectInput, WhyError> {
    match extension(path).as_deref() {
        Some(SOLUTION_EXTENSION) => Ok(ProjectInput::Solution(path.to_path_buf())),
        Some("json") => Ok(ProjectInput::AssetsFile(path.to_path_buf())),
        Some(ext) if PROJECT_EXTENSIONS.contains(&ext) => {
            Ok(ProjectInput::Project(path.to_path_buf()))
        }
        _ => Err(path_invalid(
            path,
            "is not a solution, project or assets file",
        )),
    }
}

fn path_invalid(path: &Path, reason: &str) -> WhyError {
    WhyError::new(
        why_codes::PKG_WHY_PATH_INVALID,
        format!("The path '{}' {reason}", path.display()),
    )
    .with_path(path.display().to_string())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Project files referenced by a solution that exist on disk.
pub fn solution_projects(solution: &Path) -> Result<Vec<PathBuf>, WhyError> {
    let content = nuget_util::fs::read_to_string_lossy(solution).map_err(|e| {
        WhyError::new(
            why_codes::PKG_WHY_PROJECT_UNREADABLE,
            format!("Unable to read solution {}: {e}", solution.display()),
        )
        .with_path(solution.display().to_string())
    })?;
    let dir = solution.parent().unwrap_or_else(|| Path::new("."));
    Ok(parse_solution(&content, dir))
}

/// Parse `Project(...) = "Name", "Path", "{Guid}"` lines of a solution.
///
/// Solution folders and missing projects are skipped.
#[must_use]
pub fn parse_solution(content: &str, solution_dir: &Path) -> Vec<PathBuf> {
    let Ok(re) = regex_lite::Regex::new(r#"^Project\("\{[^}]+\}"\)\s*=\s*"([^"]+)"\s*,\s*"([^"]+)""#)
    else {
        return Vec::new();
    };

    content
        .lines()
        .filter_map(|line| re.captures(line.trim_start()))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().replace('\\', "/")))
        .map(|relative| solution_dir.join(relative))
        .filter(|path| {
            extension(path).is_some_and(|ext| PROJECT_EXTENSIONS.contains(&ext.as_str()))
        })
        .filter(|path| {
            let exists = path.is_file();
            if !exists {
                debug!(path = %path.display(), "Skipping missing solution project");
            }
            exists
        })
        .collect()
}

/// Properties of a project relevant to `why`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_sdk_style: bool,
    pub is_package_reference: bool,
    pub assets_path: PathBuf,
}

/// Evaluates a project file.
pub trait ProjectEvaluator: Send + Sync {
    fn evaluate(&self, project: &Path) -> Result<ProjectInfo, WhyError>;
}

/// Reads project properties straight from the project XML.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFileEvaluator;

#[derive(Default)]
struct ProjectXml {
    sdk: bool,
    package_references: bool,
    restore_style: Option<String>,
    assets_file: Option<String>,
    extensions_path: Option<String>,
    intermediate_path: Option<String>,
}

impl ProjectEvaluator for ProjectFileEvaluator {
    fn evaluate(&self, project: &Path) -> Result<ProjectInfo, WhyError> {
        let unreadable = |detail: String| {
            WhyError::new(
                why_codes::PKG_WHY_PROJECT_UNREADABLE,
                format!("Unable to read project {}: {detail}", project.display()),
            )
            .with_path(project.display().to_string())
        };

        let content =
            nuget_util::fs::read_to_string_lossy(project).map_err(|e| unreadable(e.to_string()))?;
        let xml = parse_project_xml(&content).map_err(unreadable)?;

        let is_package_reference = match xml.restore_style.as_deref() {
            Some(style) => style.eq_ignore_ascii_case("PackageReference"),
            None => xml.sdk || xml.package_references,
        };

        let dir = project.parent().unwrap_or_else(|| Path::new("."));
        let assets_path = match xml.assets_file {
            Some(file) => dir.join(file),
            None => {
                let base = xml
                    .extensions_path
                    .or(xml.intermediate_path)
                    .unwrap_or_else(|| DEFAULT_INTERMEDIATE_PATH.to_string());
                dir.join(base).join(ASSETS_FILE_NAME)
            }
        };

        let name = project
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            project = %project.display(),
            sdk = xml.sdk,
            package_reference = is_package_reference,
            assets = %assets_path.display(),
            "Evaluated project"
        );

        Ok(ProjectInfo {
            name,
            path: project.to_path_buf(),
            is_sdk_style: xml.sdk,
            is_package_reference,
            assets_path,
        })
    }
}

fn parse_project_xml(content: &str) -> Result<ProjectXml, String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut xml = ProjectXml::default();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut current_element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                inspect_element(&mut xml, &e, depth);
                current_element = local_name(&e);
                depth += 1;
            }
            Ok(Event::Empty(e)) => inspect_element(&mut xml, &e, depth),
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                let text = text.trim();
                if text.is_empty() || text.contains("$(") {
                    continue;
                }
                let value = Some(text.replace('\\', "/"));
                match current_element.as_str() {
                    "RestoreProjectStyle" => xml.restore_style = value,
                    "ProjectAssetsFile" => xml.assets_file = value,
                    "MSBuildProjectExtensionsPath" => xml.extensions_path = value,
                    "BaseIntermediateOutputPath" => xml.intermediate_path = value,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(xml)
}

fn inspect_element(xml: &mut ProjectXml, e: &BytesStart<'_>, depth: usize) {
    match local_name(e).as_str() {
        "Project" if depth == 0 => xml.sdk |= attribute(e, b"Sdk").is_some(),
        "Sdk" => xml.sdk = true,
        "Import" => xml.sdk |= attribute(e, b"Sdk").is_some(),
        "PackageReference" => xml.package_references = true,
        _ => {}
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

/// Explain why `package` is referenced by one project or assets file.
pub fn why_for_file(
    evaluator: &dyn ProjectEvaluator,
    file: &Path,
    package: &str,
    frameworks: &[String],
) -> Result<ProjectWhyResult, WhyError> {
    if extension(file).as_deref() == Some("json") {
        let assets = read_assets(file)?;
        let name = assets.project_name.clone().unwrap_or_else(|| {
            file.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        return Ok(why_for_project(&name, &assets, package, frameworks));
    }

    let info = evaluator.evaluate(file)?;
    if !info.is_sdk_style {
        return Err(WhyError::new(
            why_codes::PKG_WHY_NOT_SDK_PROJECT,
            format!(
                "The project {} is not an SDK-style project",
                file.display()
            ),
        )
        .with_path(file.display().to_string()));
    }
    if !info.is_package_reference {
        return Err(WhyError::new(
            why_codes::PKG_WHY_NOT_PACKAGE_REFERENCE,
            format!(
                "The project {} does not use PackageReference",
                file.display()
            ),
        )
        .with_path(file.display().to_string()));
    }
    if !info.assets_path.is_file() {
        return Err(WhyError::new(
            why_codes::PKG_WHY_ASSETS_NOT_FOUND,
            format!(
                "No assets file was found for {}. Please run restore before running this command.",
                file.display()
            ),
        )
        .with_path(info.assets_path.display().to_string()));
    }

    let assets = read_assets(&info.assets_path)?;
    Ok(why_for_project(&info.name, &assets, package, frameworks))
}

fn read_assets(path: &Path) -> Result<AssetsFile, WhyError> {
    AssetsFile::read_from(path).map_err(|e| {
        WhyError::new(why_codes::PKG_WHY_ASSETS_INVALID, e.message())
            .with_path(path.display().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SDK_PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="A" Version="1.0.0" />
  </ItemGroup>
</Project>"#;

    const LEGACY_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <Import Project="$(MSBuildExtensionsPath)\Microsoft.Common.props" />
  <ItemGroup>
    <Reference Include="System" />
  </ItemGroup>
</Project>"#;

    const ASSETS: &str = r#"{
      "version": 3,
      "targets": {
        ".NETCoreApp,Version=v8.0": {
          "A/1.0.0": { "type": "package", "dependencies": { "B": "2.0.0" } },
          "B/2.0.0": { "type": "package" }
        }
      },
      "projectFileDependencyGroups": { ".NETCoreApp,Version=v8.0": [ "A >= 1.0.0" ] },
      "project": { "restore": { "projectName": "App" } }
    }"#;

    #[test]
    fn test_classify_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["App.csproj", "All.sln", "project.assets.json", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        assert!(matches!(
            classify_path(&dir.path().join("App.csproj")),
            Ok(ProjectInput::Project(_))
        ));
        assert!(matches!(
            classify_path(&dir.path().join("All.sln")),
            Ok(ProjectInput::Solution(_))
        ));
        assert!(matches!(
            classify_path(&dir.path().join("project.assets.json")),
            Ok(ProjectInput::AssetsFile(_))
        ));

        let err = classify_path(&dir.path().join("notes.txt")).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_PATH_INVALID);
        assert!(err.is_usage_error());

        let err = classify_path(&dir.path().join("missing.csproj")).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_PATH_INVALID);
    }

    #[test]
    fn test_classify_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify_path(dir.path()).unwrap_err();
        assert!(err.message().contains("does not contain"));

        fs::write(dir.path().join("App.csproj"), "").unwrap();
        assert_eq!(
            classify_path(dir.path()).unwrap(),
            ProjectInput::Project(dir.path().join("App.csproj"))
        );

        fs::write(dir.path().join("App.sln"), "").unwrap();
        let err = classify_path(dir.path()).unwrap_err();
        assert!(err.message().contains("more than one"));
    }

    #[test]
    fn test_parse_solution() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/App")).unwrap();
        fs::write(dir.path().join("src/App/App.csproj"), SDK_PROJECT).unwrap();

        let sln = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "src", "src", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Gone", "src\Gone\Gone.csproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
"#;
        let projects = parse_solution(sln, dir.path());
        assert_eq!(projects, [dir.path().join("src/App/App.csproj")]);
    }

    #[test]
    fn test_evaluate_sdk_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(&path, SDK_PROJECT).unwrap();

        let info = ProjectFileEvaluator.evaluate(&path).unwrap();
        assert_eq!(info.name, "App");
        assert!(info.is_sdk_style);
        assert!(info.is_package_reference);
        assert_eq!(info.assets_path, dir.path().join("obj").join(ASSETS_FILE_NAME));
    }

    #[test]
    fn test_evaluate_custom_extensions_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lib.fsproj");
        fs::write(
            &path,
            r#"<Project>
  <Sdk Name="Microsoft.NET.Sdk" />
  <PropertyGroup>
    <MSBuildProjectExtensionsPath>build\ext\</MSBuildProjectExtensionsPath>
    <BaseIntermediateOutputPath>$(Root)obj\</BaseIntermediateOutputPath>
  </PropertyGroup>
</Project>"#,
        )
        .unwrap();

        let info = ProjectFileEvaluator.evaluate(&path).unwrap();
        assert!(info.is_sdk_style);
        assert_eq!(
            info.assets_path,
            dir.path().join("build/ext/").join(ASSETS_FILE_NAME)
        );
    }

    #[test]
    fn test_evaluate_legacy_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Old.csproj");
        fs::write(&path, LEGACY_PROJECT).unwrap();

        let info = ProjectFileEvaluator.evaluate(&path).unwrap();
        assert!(!info.is_sdk_style);
        assert!(!info.is_package_reference);

        let err = why_for_file(&ProjectFileEvaluator, &path, "A", &[]).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_NOT_SDK_PROJECT);
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_packages_config_style_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(
            &path,
            r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup><RestoreProjectStyle>PackagesConfig</RestoreProjectStyle></PropertyGroup>
</Project>"#,
        )
        .unwrap();

        let err = why_for_file(&ProjectFileEvaluator, &path, "A", &[]).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_NOT_PACKAGE_REFERENCE);
    }

    #[test]
    fn test_why_for_file_requires_assets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(&path, SDK_PROJECT).unwrap();

        let err = why_for_file(&ProjectFileEvaluator, &path, "B", &[]).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_ASSETS_NOT_FOUND);

        fs::create_dir_all(dir.path().join("obj")).unwrap();
        fs::write(dir.path().join("obj").join(ASSETS_FILE_NAME), ASSETS).unwrap();

        let result = why_for_file(&ProjectFileEvaluator, &path, "B", &[]).unwrap();
        assert_eq!(result.project, "App");
        assert!(result.has_dependency());
    }

    #[test]
    fn test_why_for_assets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ASSETS_FILE_NAME);
        fs::write(&path, ASSETS).unwrap();

        let result = why_for_file(&ProjectFileEvaluator, &path, "b", &[]).unwrap();
        assert_eq!(result.project, "App");
        assert_eq!(result.groups.len(), 1);

        fs::write(&path, "{ broken").unwrap();
        let err = why_for_file(&ProjectFileEvaluator, &path, "b", &[]).unwrap_err();
        assert_eq!(err.code(), why_codes::PKG_WHY_ASSETS_INVALID);
    }

    struct FixedEvaluator(ProjectInfo);

    impl ProjectEvaluator for FixedEvaluator {
        fn evaluate(&self, _project: &Path) -> Result<ProjectInfo, WhyError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_custom_evaluator() {
        let dir = tempfile::tempdir().unwrap();
        let assets_path = dir.path().join("custom.assets.json");
        fs::write(&assets_path, ASSETS).unwrap();

        let evaluator = FixedEvaluator(ProjectInfo {
            name: "Evaluated".to_string(),
            path: dir.path().join("X.proj"),
            is_sdk_style: true,
            is_package_reference: true,
            assets_path,
        });
        let result = why_for_file(&evaluator, &dir.path().join("X.proj"), "A", &[]).unwrap();
        assert_eq!(result.project, "Evaluated");
    }
}
