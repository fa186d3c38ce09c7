//! Reader for `.nuspec` package manifests.

use super::error::PkgError;
use super::version::NuGetVersion;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// A single `<dependency>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NuspecDependency {
    pub id: String,
    /// Version range as written, e.g. `[1.0.0, )`.
    pub version_range: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
}

/// Dependencies declared for one target framework, or for all frameworks
/// when `target_framework` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NuspecDependencyGroup {
    pub target_framework: Option<String>,
    pub dependencies: Vec<NuspecDependency>,
}

/// The parts of a package manifest the local repository exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nuspec {
    pub id: String,
    pub version: NuGetVersion,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub dependency_groups: Vec<NuspecDependencyGroup>,
}

impl Nuspec {
    /// Read and parse a manifest from disk.
    ///
    /// # Errors
    /// Returns `PKG_NUSPEC_INVALID` if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, PkgError> {
        let content = nuget_util::fs::read_to_string_lossy(path)
            .map_err(|e| PkgError::nuspec_invalid(path, e))?;
        Self::parse(&content, path)
    }

    /// Parse manifest XML. `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns `PKG_NUSPEC_INVALID` on malformed XML, a missing id, or a
    /// missing or invalid version.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PkgError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut id = None;
        let mut version = None;
        let mut description = None;
        let mut authors = None;
        let mut groups: Vec<NuspecDependencyGroup> = Vec::new();

        let mut buf = Vec::new();
        let mut current_element = String::new();
        let mut in_metadata = false;
        let mut in_dependencies = false;
        let mut in_group = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = local_name(&e);
                    match tag.as_str() {
                        "metadata" => in_metadata = true,
                        "dependencies" if in_metadata => in_dependencies = true,
                        "group" if in_dependencies => {
                            in_group = true;
                            groups.push(NuspecDependencyGroup {
                                target_framework: attribute(&e, b"targetFramework"),
                                dependencies: Vec::new(),
                            });
                        }
                        "dependency" if in_dependencies => {
                            push_dependency(&mut groups, in_group, &e);
                        }
                        _ => {}
                    }
                    current_element = tag;
                }
                Ok(Event::Empty(e)) => {
                    let tag = local_name(&e);
                    match tag.as_str() {
                        "dependency" if in_dependencies => {
                            push_dependency(&mut groups, in_group, &e);
                        }
                        "group" if in_dependencies => groups.push(NuspecDependencyGroup {
                            target_framework: attribute(&e, b"targetFramework"),
                            dependencies: Vec::new(),
                        }),
                        _ => {}
                    }
                }
                Ok(Event::Text(e)) => {
                    if !in_metadata {
                        continue;
                    }
                    let text = e
                        .unescape()
                        .map_err(|err| PkgError::nuspec_invalid(path, err))?
                        .trim()
                        .to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match current_element.as_str() {
                        "id" => id = Some(text),
                        "version" => version = Some(text),
                        "description" => description = Some(text),
                        "authors" => authors = Some(text),
                        _ => {}
                    }
                }
                Ok(Event::End(e)) => {
                    match String::from_utf8_lossy(e.local_name().as_ref()).as_ref() {
                        "metadata" => in_metadata = false,
                        "dependencies" => in_dependencies = false,
                        "group" => in_group = false,
                        _ => {}
                    }
                    current_element.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PkgError::nuspec_invalid(path, e)),
                _ => {}
            }
            buf.clear();
        }

        let id = id.ok_or_else(|| PkgError::nuspec_invalid(path, "missing <id>"))?;
        let version = version.ok_or_else(|| PkgError::nuspec_invalid(path, "missing <version>"))?;
        let version = NuGetVersion::parse(&version)
            .map_err(|e| PkgError::nuspec_invalid(path, e.message()))?;

        Ok(Self {
            id,
            version,
            description,
            authors,
            dependency_groups: groups,
        })
    }

    /// Every dependency id across all groups, in declaration order.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependency_groups
            .iter()
            .flat_map(|g| g.dependencies.iter().map(|d| d.id.as_str()))
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

fn push_dependency(groups: &mut Vec<NuspecDependencyGroup>, in_group: bool, e: &BytesStart<'_>) {
    let Some(id) = attribute(e, b"id") else {
        return;
    };
    let dependency = NuspecDependency {
        id,
        version_range: attribute(e, b"version"),
        include: attribute(e, b"include"),
        exclude: attribute(e, b"exclude"),
    };

    // Dependencies outside a <group> belong to an implicit framework-less group.
    if !in_group && groups.last().map_or(true, |g| g.target_framework.is_some()) {
        groups.push(NuspecDependencyGroup::default());
    }
    if let Some(group) = groups.last_mut() {
        group.dependencies.push(dependency);
    }
}
