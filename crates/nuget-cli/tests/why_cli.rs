//! Integration tests for `nuget why`.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nuget"))
}

const PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks>net8.0;net472</TargetFrameworks>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="A" Version="1.0.0" />
  </ItemGroup>
</Project>"#;

const ASSETS: &str = r#"{
  "version": 3,
  "targets": {
    ".NETCoreApp,Version=v8.0": {
      "A/1.0.0": { "type": "package", "dependencies": { "B": "2.0.0", "C": "1.0.0" } },
      "B/2.0.0": { "type": "package" },
      "C/1.0.0": { "type": "package", "dependencies": { "B": "2.0.0" } }
    },
    ".NETFramework,Version=v4.7.2": {
      "A/1.0.0": { "type": "package" }
    }
  },
  "projectFileDependencyGroups": {
    ".NETCoreApp,Version=v8.0": [ "A >= 1.0.0" ],
    ".NETFramework,Version=v4.7.2": [ "A >= 1.0.0" ]
  },
  "project": { "restore": { "projectName": "App" } }
}"#;

/// `<root>/<name>/<name>.csproj`, restored unless `restored` is false.
fn create_project(root: &Path, name: &str, restored: bool) {
    let dir = root.join(name);
    fs::create_dir_all(dir.join("obj")).unwrap();
    fs::write(dir.join(format!("{name}.csproj")), PROJECT).unwrap();
    if restored {
        fs::write(dir.join("obj/project.assets.json"), ASSETS).unwrap();
    }
}

#[test]
fn test_why_prints_tree() {
    let temp = TempDir::new().unwrap();
    create_project(temp.path(), "App", true);

    let output = cargo_bin()
        .arg("--cwd")
        .arg(temp.path().join("App"))
        .args(["why", "b"])
        .output()
        .expect("Failed to run why");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("Project 'App' has the following dependency graph(s) for 'b':"));
    let expected = "  [net8.0]
  │
  └─ A (v1.0.0)
     ├─ B (v2.0.0)
     └─ C (v1.0.0)
        └─ B (v2.0.0)
";
    assert!(stdout.contains(expected), "stdout: {stdout}");
    assert!(stdout.contains("  [net472]\n  │\n  └─ No dependency graph(s) found"));
}

#[test]
fn test_why_json_output() {
    let temp = TempDir::new().unwrap();
    create_project(temp.path(), "App", true);
    let project = temp.path().join("App/App.csproj");

    let output = cargo_bin()
        .arg("--json")
        .arg("why")
        .arg(&project)
        .arg("B")
        .args(["--framework", "NET8.0"])
        .output()
        .expect("Failed to run why");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["schema_version"], 1);
    assert_eq!(json["ok"], true);

    let groups = json["projects"][0]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["frameworks"][0], "net8.0");
    let targets = groups[0]["lines"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|line| line["is_target"] == true)
        .count();
    assert_eq!(targets, 2);
}

#[test]
fn test_why_package_not_referenced() {
    let temp = TempDir::new().unwrap();
    create_project(temp.path(), "App", true);

    let output = cargo_bin()
        .arg("--cwd")
        .arg(temp.path().join("App"))
        .args(["why", "Nothing.Here"])
        .output()
        .expect("Failed to run why");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Project 'App' does not have any dependency graph(s) for 'Nothing.Here'"));
}

#[test]
fn test_why_invalid_path_is_usage_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("readme.txt"), "").unwrap();

    let output = cargo_bin()
        .arg("why")
        .arg(temp.path().join("readme.txt"))
        .arg("A")
        .output()
        .expect("Failed to run why");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_why_missing_package_argument() {
    let output = cargo_bin().arg("why").output().expect("Failed to run why");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_why_solution_continues_after_failed_project() {
    let temp = TempDir::new().unwrap();
    create_project(temp.path(), "Broken", false);
    create_project(temp.path(), "App", true);
    fs::write(
        temp.path().join("All.sln"),
        r#"
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Broken", "Broken\Broken.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "App\App.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
"#,
    )
    .unwrap();

    let output = cargo_bin()
        .arg("--cwd")
        .arg(temp.path())
        .args(["why", "B"])
        .output()
        .expect("Failed to run why");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("Project 'App' has the following dependency graph(s) for 'B':"));
    assert!(stderr.contains("No assets file was found"), "stderr: {stderr}");
}
