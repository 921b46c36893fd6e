//! Named groups of layers, summed from a compute report.

use std::{fs, path::Path};

use eyre::{ensure, WrapErr};
use serde::{Deserialize, Serialize};

use crate::sim::LayerCycles;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub name: String,
    pub layers: Vec<u32>,
}

/// the `[[groups]]` tables of a groups file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerGroups {
    pub groups: Vec<LayerGroup>,
}

impl Default for LayerGroups {
    /// the stages of ResNet-18 as the simulator numbers its layers
    fn default() -> Self {
        let group = |name: &str, layers: std::ops::RangeInclusive<u32>| LayerGroup {
            name: name.to_string(),
            layers: layers.collect(),
        };
        Self {
            groups: vec![
                group("Conv1", 0..=0),
                group("Conv2", 1..=4),
                group("Conv3", 5..=9),
                group("Conv4", 10..=14),
                group("Conv5", 15..=19),
                group("FC", 20..=20),
            ],
        }
    }
}

impl LayerGroups {
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).wrap_err_with(|| format!("cannot read groups {path:?}"))?;
        let groups: Self =
            toml::from_str(&text).wrap_err_with(|| format!("cannot parse groups {path:?}"))?;
        ensure!(!groups.groups.is_empty(), "{path:?} defines no groups");
        Ok(groups)
    }

    /// the total cycles of every group, layers absent from the report count as zero
    pub fn sum(&self, layers: &[LayerCycles]) -> Vec<(String, u64)> {
        self.groups
            .iter()
            .map(|group| {
                let total = layers
                    .iter()
                    .filter(|layer| group.layers.contains(&layer.layer_id))
                    .map(|layer| layer.total_cycles)
                    .sum();
                (group.name.clone(), total)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers(count: u32) -> Vec<LayerCycles> {
        (0..count)
            .map(|layer_id| LayerCycles {
                layer_id,
                total_cycles: 10 * (layer_id as u64 + 1),
            })
            .collect()
    }

    #[test]
    fn resnet_stages() {
        let sums = LayerGroups::default().sum(&layers(21));
        let names: Vec<_> = sums.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Conv1", "Conv2", "Conv3", "Conv4", "Conv5", "FC"]);
        assert_eq!(sums[0].1, 10);
        assert_eq!(sums[1].1, 20 + 30 + 40 + 50);
        assert_eq!(sums[5].1, 210);
        let total: u64 = sums.iter().map(|(_, cycles)| cycles).sum();
        assert_eq!(total, (1..=21).map(|i| 10 * i).sum::<u64>());
    }

    #[test]
    fn short_report() {
        let sums = LayerGroups::default().sum(&layers(3));
        assert_eq!(sums[1].1, 20 + 30);
        assert_eq!(sums[2].1, 0);
    }

    #[test]
    fn bundled_groups_match_the_default() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("sweeps/resnet18_groups.toml");
        assert_eq!(LayerGroups::load(path).unwrap(), LayerGroups::default());
    }

    #[test]
    fn from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.toml");
        fs::write(
            &path,
            "[[groups]]\nname = \"attention\"\nlayers = [0, 1]\n\n[[groups]]\nname = \"mlp\"\nlayers = [2]\n",
        )
        .unwrap();
        let groups = LayerGroups::load(&path).unwrap();
        assert_eq!(
            groups.sum(&layers(3)),
            vec![("attention".to_string(), 30), ("mlp".to_string(), 30)]
        );
        fs::write(&path, "groups = []\n").unwrap();
        assert!(LayerGroups::load(&path).is_err());
    }
}
