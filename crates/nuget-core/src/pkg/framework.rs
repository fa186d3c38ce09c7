//! Target framework names.
//!
//! Assets files key targets by full framework names such as
//! `.NETCoreApp,Version=v8.0`; users and lock files use short folder names
//! such as `net8.0`.

/// Short folder name for a framework.
///
/// Names that are already short, or whose identifier is not recognised,
/// come back unchanged.
#[must_use]
pub fn short_folder_name(framework: &str) -> String {
    let Some((identifier, rest)) = framework.split_once(',') else {
        return framework.to_string();
    };

    let Some(version) = rest
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("Version="))
    else {
        return framework.to_string();
    };
    let version = version.trim_start_matches(['v', 'V']);
    let parts: Vec<u32> = version
        .split('.')
        .map(|p| p.parse().unwrap_or(0))
        .collect();
    let major = parts.first().copied().unwrap_or(0);
    let minor = parts.get(1).copied().unwrap_or(0);
    let build = parts.get(2).copied().unwrap_or(0);

    match identifier.trim().to_ascii_lowercase().as_str() {
        ".netcoreapp" if major >= 5 => format!("net{major}.{minor}"),
        ".netcoreapp" => format!("netcoreapp{major}.{minor}"),
        ".netstandard" => format!("netstandard{major}.{minor}"),
        ".netframework" => {
            if build > 0 {
                format!("net{major}{minor}{build}")
            } else {
                format!("net{major}{minor}")
            }
        }
        _ => framework.to_string(),
    }
}

/// True if two framework names refer to the same framework, comparing
/// short folder names case-insensitively.
#[must_use]
pub fn frameworks_match(a: &str, b: &str) -> bool {
    short_folder_name(a).eq_ignore_ascii_case(&short_folder_name(b))
}

/// Split a target key `<framework>[/<rid>]`.
#[must_use]
pub fn split_target_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once('/') {
        Some((framework, rid)) if !rid.is_empty() => (framework, Some(rid)),
        Some((framework, _)) => (framework, None),
        None => (key, None),
    }
}
