//! Bundle membership manifest (`multipack`), stored beside the library.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::Result, save};

/// Bundle-source id to the ordered ids of the games it contains.
///
/// Membership recorded here can predate the member games being resolved in
/// the library, so it is persisted separately from the game map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleManifest {
    bundles: BTreeMap<String, Vec<String>>,
}

impl BundleManifest {
    /// Load the manifest from `path`, returning an empty one if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(save::read_json(path.as_ref())?.unwrap_or_default())
    }

    /// Persist the manifest to `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        save::write_json(path.as_ref(), self)
    }

    /// Member ids of `bundle_id`.
    pub fn members(&self, bundle_id: &str) -> Option<&[String]> {
        self.bundles.get(bundle_id).map(Vec::as_slice)
    }

    /// Replace the members of `bundle_id`.
    pub fn set_members(&mut self, bundle_id: impl Into<String>, members: Vec<String>) {
        self.bundles.insert(bundle_id.into(), members);
    }

    /// Drop a bundle entirely.
    pub fn remove_bundle(&mut self, bundle_id: &str) -> Option<Vec<String>> {
        self.bundles.remove(bundle_id)
    }

    /// Remove `game_id` from every member list, returning how many lists changed.
    pub fn remove_member(&mut self, game_id: &str) -> usize {
        let mut changed = 0;
        for members in self.bundles.values_mut() {
            let before = members.len();
            members.retain(|member| member != game_id);
            if members.len() != before {
                changed += 1;
            }
        }
        changed
    }

    /// Bundles and their members in bundle id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.bundles
            .iter()
            .map(|(bundle, members)| (bundle.as_str(), members.as_slice()))
    }

    /// Number of bundles.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether no bundle is recorded.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn load_missing_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let manifest = BundleManifest::load(dir.path().join("gog_packages.json"))?;
        assert!(manifest.is_empty());
        Ok(())
    }

    #[test]
    fn persist_round_trip_keeps_member_order() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("gog_packages.json");
        let mut manifest = BundleManifest::default();
        manifest.set_members("gog_bundle", vec!["gog_z".into(), "gog_a".into()]);
        manifest.persist(&path)?;

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(raw["gog_bundle"][0], "gog_z");

        let loaded = BundleManifest::load(&path)?;
        assert_eq!(loaded, manifest);
        assert_eq!(
            loaded.members("gog_bundle"),
            Some(&["gog_z".to_string(), "gog_a".to_string()][..])
        );
        Ok(())
    }

    #[test]
    fn remove_member_scrubs_every_bundle() {
        let mut manifest = BundleManifest::default();
        manifest.set_members("a", vec!["x".into(), "y".into()]);
        manifest.set_members("b", vec!["y".into()]);
        manifest.set_members("c", vec!["z".into()]);

        assert_eq!(manifest.remove_member("y"), 2);
        assert_eq!(manifest.members("a"), Some(&["x".to_string()][..]));
        assert_eq!(manifest.members("b"), Some(&[][..]));
        assert_eq!(manifest.iter().count(), 3);
    }
}
