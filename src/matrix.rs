/// Build-matrix variables that make up the matrix key, in key order.
pub const MATRIX_VARS: &[&str] = &[
    "MATRIX_NODE_VERSION",
    "MATRIX_OS",
    "MATRIX_PYTHON_VERSION",
    "MATRIX_JAVA_VERSION",
    "MATRIX_RUBY_VERSION",
];

/// Environment variable holding the CI job name.
pub const JOB_VAR: &str = "GITHUB_JOB";

/// Derive the matrix key from `lookup`, e.g. `node_version:18,os:ubuntu`.
///
/// A job name containing `matrix` is appended verbatim. Returns `None` when
/// no component is present.
pub fn matrix_key_from_vars<F>(lookup: F, job: Option<&str>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut parts: Vec<String> = MATRIX_VARS
        .iter()
        .filter_map(|var| {
            let value = lookup(var).filter(|v| !v.is_empty())?;
            let name = var.trim_start_matches("MATRIX_").to_ascii_lowercase();
            Some(format!("{}:{}", name, value))
        })
        .collect();

    if let Some(job) = job.filter(|j| j.contains("matrix")) {
        parts.push(job.to_string());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// Matrix key of the current process environment.
pub fn matrix_key_from_env() -> Option<String> {
    let job = std::env::var(JOB_VAR).ok();
    matrix_key_from_vars(|var| std::env::var(var).ok(), job.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_follows_variable_order() {
        let env = vars(&[("MATRIX_OS", "ubuntu"), ("MATRIX_NODE_VERSION", "18")]);
        let key = matrix_key_from_vars(|k| env.get(k).cloned(), None);
        assert_eq!(key.as_deref(), Some("node_version:18,os:ubuntu"));
    }

    #[test]
    fn test_matrix_job_name_appended() {
        let env = vars(&[("MATRIX_OS", "macos")]);
        let key = matrix_key_from_vars(|k| env.get(k).cloned(), Some("test-matrix"));
        assert_eq!(key.as_deref(), Some("os:macos,test-matrix"));

        let key = matrix_key_from_vars(|k| env.get(k).cloned(), Some("build"));
        assert_eq!(key.as_deref(), Some("os:macos"));
    }

    #[test]
    fn test_no_components_is_none() {
        let env = vars(&[("MATRIX_OS", "")]);
        assert_eq!(matrix_key_from_vars(|k| env.get(k).cloned(), None), None);
        assert_eq!(matrix_key_from_vars(|_| None, Some("lint")), None);
    }
}
