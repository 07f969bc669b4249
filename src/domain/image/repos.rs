use serde::{Deserialize, Serialize};
use url::Url;

/// Package repository attached to an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    name: String,
    url: String,
}

impl Repo {
    /// Returns `None` unless the name is non-blank and the url is either an
    /// absolute url or an absolute path.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let url = url.into();
        if name.trim().is_empty() || !is_request_uri(&url) {
            return None;
        }
        Some(Self { name, url })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn is_request_uri(url: &str) -> bool {
    if url.starts_with('/') {
        return !url.chars().any(|c| c.is_ascii_control());
    }
    Url::parse(url).is_ok()
}

/// Ordered repository list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RepoRecord>", into = "Vec<RepoRecord>")]
pub struct Repos(Vec<Repo>);

impl Repos {
    pub fn new(repos: Vec<Repo>) -> Self {
        Self(repos)
    }

    pub fn add(&mut self, repo: Repo) {
        self.0.push(repo);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repo> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unvalidated `{name, url}` pair as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub name: String,
    pub url: String,
}

impl RepoRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

// Stored documents are trusted input; entries that no longer validate are skipped.
impl From<Vec<RepoRecord>> for Repos {
    fn from(records: Vec<RepoRecord>) -> Self {
        Self(
            records
                .into_iter()
                .filter_map(|record| Repo::new(record.name, record.url))
                .collect(),
        )
    }
}

impl From<Repos> for Vec<RepoRecord> {
    fn from(repos: Repos) -> Self {
        repos
            .0
            .into_iter()
            .map(|repo| RepoRecord {
                name: repo.name,
                url: repo.url,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_yields_none() {
        assert!(Repo::new("test", "not-a-url").is_none());
    }

    #[test]
    fn absolute_path_is_accepted() {
        let repo = Repo::new("local", "/repo/el8").expect("absolute path");
        assert_eq!(repo.url(), "/repo/el8");
        assert!(Repo::new("local", "repo/el8").is_none());
        assert!(Repo::new("local", "/repo\n/el8").is_none());
    }

    #[test]
    fn blank_name_yields_none() {
        assert!(Repo::new("  ", "https://repo.example.com/el8").is_none());
    }

    #[test]
    fn valid_repo_keeps_fields() {
        let repo = Repo::new("appstream", "https://repo.example.com/el8").expect("valid");
        assert_eq!(repo.name(), "appstream");
        assert_eq!(repo.url(), "https://repo.example.com/el8");
    }

    #[test]
    fn deserializing_skips_invalid_entries() {
        let repos: Repos = serde_json::from_str(
            r#"[{"name":"ok","url":"http://a.example"},{"name":"bad","url":"nope"}]"#,
        )
        .expect("valid json");
        assert_eq!(repos.len(), 1);
    }
}
