use eyre::{
    Context as _,
    Result,
};
use regex::Regex;
use std::{
    collections::HashMap,
    path::Path,
};

/// Per-project hostname policy: a VM project may only mutate FQDNs matching
/// its configured pattern. A project absent from the mapping may mutate
/// nothing.
///
/// The file is loaded and every pattern compiled once at startup; a missing
/// or malformed file is a deployment defect and refuses to serve rather than
/// failing per request.
pub struct AllowList {
    patterns: HashMap<String, Regex>,
}

impl AllowList {
    /// Load a YAML mapping of project id -> regular expression from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read dns allow list {path:?}"))?;
        let entries: HashMap<String, String> =
            serde_yaml::from_str(&raw).with_context(|| format!("malformed dns allow list {path:?}"))?;
        Self::from_patterns(entries)
    }

    pub fn from_patterns(entries: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut patterns = HashMap::new();
        for (project, pattern) in entries {
            // An empty pattern means "deny everything", same as no entry.
            if pattern.is_empty() {
                warn!(%project, "empty allow list pattern, project will be denied");
                continue;
            }
            let regex = Regex::new(&pattern)
                .with_context(|| format!("invalid allow list pattern for project {project:?}"))?;
            patterns.insert(project, regex);
        }
        Ok(AllowList { patterns })
    }

    /// Whether `project` may mutate the record named `fqdn`. A deny is a
    /// silent authorization failure, reported by callers as a no-op.
    pub fn is_allowed(&self, fqdn: &str, project: &str) -> bool {
        self.patterns.get(project).is_some_and(|re| re.is_match(fqdn))
    }
}
