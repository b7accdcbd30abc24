use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A content asset path such as `/MyMod/Meshes/SM_Rock`.
///
/// Two ids are equal when their normalized forms match: lower-cased with
/// runs of `/` collapsed to one. The original spelling is kept for display
/// and for handing back to the host when deleting.
#[derive(Clone)]
pub struct AssetId {
    path: String,
    key: String,
}

impl AssetId {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let key = normalize(&path);
        Self { path, key }
    }

    /// Join a report directory and asset name the way a posix path join does.
    pub fn join(dir: &str, name: &str) -> Self {
        let name = name.trim();
        if name.starts_with('/') || dir.is_empty() {
            return Self::new(name);
        }
        if dir.ends_with('/') {
            Self::new(format!("{}{}", dir, name))
        } else {
            Self::new(format!("{}/{}", dir, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Case-insensitive prefix test against an already-normalized prefix.
    pub fn has_prefix(&self, normalized_prefix: &str) -> bool {
        self.key.starts_with(normalized_prefix)
    }
}

/// Lower-case a path and collapse repeated slashes.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_slash = false;
    for ch in path.trim().chars() {
        if ch == '/' {
            if last_slash {
                continue;
            }
            last_slash = true;
        } else {
            last_slash = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

impl PartialEq for AssetId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AssetId {}

impl Hash for AssetId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for AssetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssetId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({:?})", self.path)
    }
}

impl From<&str> for AssetId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for AssetId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// The live module: every asset whose normalized path starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleScope {
    prefix: String,
}

impl ModuleScope {
    /// Build a scope from a mod path. `MyMod`, `/MyMod` and `/MyMod/` all
    /// yield the prefix `/mymod/`.
    pub fn new(mod_path: &str) -> Self {
        let prefix = normalize(&format!("/{}/", mod_path.trim()));
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The scope root without the trailing slash, as used for path queries.
    pub fn root(&self) -> &str {
        let trimmed = self.prefix.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        asset.has_prefix(&self.prefix)
    }
}
