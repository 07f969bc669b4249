use serde::{Deserialize, Serialize};

/// Packages every edge image ships with. They cannot be removed.
pub const REQUIRED_PACKAGES: [&str; 6] = [
    "ansible",
    "rhc",
    "rhc-worker-playbook",
    "subscription-manager",
    "subscription-manager-plugin-ostree",
    "insights-client",
];

pub fn is_required(name: &str) -> bool {
    REQUIRED_PACKAGES.contains(&name)
}

/// Required packages followed by user-selected ones, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Packages {
    optional: Vec<String>,
}

impl Packages {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut packages = Self::default();
        packages.add(names);
        packages
    }

    /// Blank names, required names and names already present are ignored.
    pub fn add<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if name.trim().is_empty() || is_required(&name) || self.optional.contains(&name) {
                continue;
            }
            self.optional.push(name);
        }
    }

    /// Required names are filtered out before removal, so they stay.
    pub fn remove<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let doomed: Vec<S> = names
            .into_iter()
            .filter(|name| !is_required(name.as_ref()))
            .collect();
        self.optional
            .retain(|name| !doomed.iter().any(|candidate| candidate.as_ref() == name));
    }

    pub fn has(&self, name: &str) -> bool {
        is_required(name) || self.optional.iter().any(|pkg| pkg == name)
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        REQUIRED_PACKAGES
            .iter()
            .copied()
            .chain(self.optional.iter().map(String::as_str))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

impl From<Vec<String>> for Packages {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<Packages> for Vec<String> {
    fn from(packages: Packages) -> Self {
        packages.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_always_contains_required_packages() {
        let packages = Packages::new(["vim"]);
        assert!(packages.has("vim"));
        for required in REQUIRED_PACKAGES {
            assert!(packages.has(required), "missing {required}");
        }
        assert_eq!(packages.to_vec().len(), REQUIRED_PACKAGES.len() + 1);
    }

    #[test]
    fn required_packages_cannot_be_removed() {
        let mut packages = Packages::new(["vim"]);
        packages.remove(["ansible"]);
        assert!(packages.has("ansible"));
        assert!(packages.has("vim"));
    }

    #[test]
    fn duplicates_across_partitions_are_suppressed() {
        let packages = Packages::new(["rhc", "vim", "vim", ""]);
        assert_eq!(packages.optional(), ["vim".to_string()]);
        let rhc = packages.iter().filter(|name| *name == "rhc").count();
        assert_eq!(rhc, 1);
    }

    #[test]
    fn remove_drops_optional_packages() {
        let mut packages = Packages::new(["vim", "git"]);
        packages.remove(["vim", "ansible", "absent"]);
        assert_eq!(packages.optional(), ["git".to_string()]);
    }

    #[test]
    fn json_round_trip_keeps_required_prefix() {
        let packages = Packages::new(["vim"]);
        let json = serde_json::to_string(&packages).expect("serializable");
        assert!(json.starts_with("[\"ansible\""));
        let parsed: Packages = serde_json::from_str(&json).expect("parsable");
        assert_eq!(parsed, packages);
    }
}
