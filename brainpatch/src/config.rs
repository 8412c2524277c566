//! JSON运行配置。
//!
//! ```json
//! {
//!     "seed": 42,
//!     "patch_size": [1, 32, 32, 32],
//!     "step": [1, 4, 4, 4],
//!     "reconstruction_patch_size": [1, 64, 64, 64],
//!     "reconstruction_step": [1, 16, 16, 16],
//!     "datasets": [
//!         { "name": "iSEG", "path": "data/iSEG", "dataset_id": 0,
//!           "modalities": ["T1", "T2"], "validation_split": 0.2,
//!           "max_subjects": 10, "max_patches": 10000 },
//!         { "name": "ABIDE", "path": "data/ABIDE", "dataset_id": 1,
//!           "modalities": "T1", "validation_split": 0.2, "sites": ["NYU"] }
//!     ]
//! }
//! ```

use crate::error::{PatchError, Result};
use crate::factory::{DatasetSpec, FactoryOptions, Modalities, Modality};
use crate::geometry::{Geometry, Shape4};
use json::JsonValue;
use std::path::{Path, PathBuf};

/// 一个数据集的配置项。
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetEntry {
    pub spec: DatasetSpec,
    pub path: PathBuf,
    pub dataset_id: usize,
    pub modalities: Modalities,
    pub validation_split: f64,
    pub max_subjects: Option<usize>,
    pub max_patches: Option<usize>,
    pub sites: Option<Vec<String>>,
    pub augmented_path: Option<PathBuf>,
}

/// 一次运行的配置。
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub seed: Option<u64>,
    pub geometry: Geometry,
    pub reconstruction_geometry: Option<Geometry>,
    pub datasets: Vec<DatasetEntry>,
}

fn config_err<S: Into<String>>(reason: S) -> PatchError {
    PatchError::Config(reason.into())
}

fn opt_usize(v: &JsonValue, key: &str) -> Result<Option<usize>> {
    match &v[key] {
        JsonValue::Null => Ok(None),
        x => x
            .as_usize()
            .map(Some)
            .ok_or_else(|| config_err(format!("`{key}` must be a non-negative integer"))),
    }
}

fn opt_shape(v: &JsonValue, key: &str) -> Result<Option<Shape4>> {
    let x = &v[key];
    if x.is_null() {
        return Ok(None);
    }
    let dims: Option<Vec<usize>> = x.members().map(JsonValue::as_usize).collect();
    match dims.as_deref() {
        Some(&[c, z, y, w]) if x.is_array() => Ok(Some([c, z, y, w])),
        _ => Err(config_err(format!("`{key}` must be an array of 4 integers"))),
    }
}

fn opt_strings(v: &JsonValue, key: &str) -> Result<Option<Vec<String>>> {
    let x = &v[key];
    if x.is_null() {
        return Ok(None);
    }
    if !x.is_array() {
        return Err(config_err(format!("`{key}` must be an array of strings")));
    }
    x.members()
        .map(|m| {
            m.as_str()
                .map(str::to_string)
                .ok_or_else(|| config_err(format!("`{key}` must be an array of strings")))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn geometry(v: &JsonValue, size_key: &str, step_key: &str, default: Geometry) -> Result<Option<Geometry>> {
    match (opt_shape(v, size_key)?, opt_shape(v, step_key)?) {
        (None, None) => Ok(None),
        (size, step) => Geometry::new(
            size.unwrap_or(default.patch_size),
            step.unwrap_or(default.step),
        )
        .map(Some),
    }
}

impl DatasetEntry {
    fn from_json(v: &JsonValue) -> Result<Self> {
        let name = v["name"]
            .as_str()
            .ok_or_else(|| config_err("dataset entry without `name`"))?;
        let spec = DatasetSpec::by_name(name)?;
        let path = v["path"]
            .as_str()
            .map(PathBuf::from)
            .ok_or_else(|| config_err(format!("dataset `{name}` has no `path`")))?;
        let modalities = match &v["modalities"] {
            JsonValue::Null => Modalities::Single(spec.modalities[0]),
            m if m.is_array() => Modalities::from_list(
                m.members()
                    .map(|s| s.as_str().unwrap_or_default().parse::<Modality>())
                    .collect::<Result<_>>()?,
                spec.modalities[0],
            ),
            m => Modalities::Single(m.as_str().unwrap_or_default().parse()?),
        };
        let validation_split = match &v["validation_split"] {
            JsonValue::Null => 0.2,
            x => x
                .as_f64()
                .ok_or_else(|| config_err("`validation_split` must be a number"))?,
        };
        Ok(Self {
            spec,
            path,
            dataset_id: opt_usize(v, "dataset_id")?.unwrap_or(0),
            modalities,
            validation_split,
            max_subjects: opt_usize(v, "max_subjects")?,
            max_patches: opt_usize(v, "max_patches")?,
            sites: opt_strings(v, "sites")?,
            augmented_path: v["augmented_path"].as_str().map(PathBuf::from),
        })
    }

    /// 该数据集的工厂参数。
    pub fn options(&self, run: &RunConfig) -> FactoryOptions {
        let mut o = FactoryOptions::default().with_geometry(run.geometry);
        o.seed = run.seed;
        o.reconstruction_geometry = run.reconstruction_geometry;
        o.max_subjects = self.max_subjects;
        o.max_patches = self.max_patches;
        o.sites = self.sites.clone();
        o.augmented_dir = self.augmented_path.clone();
        o
    }
}

impl RunConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let v = json::parse(text)?;
        if !v.is_object() {
            return Err(config_err("top level must be an object"));
        }
        let seed = match &v["seed"] {
            JsonValue::Null => None,
            x => Some(
                x.as_u64()
                    .ok_or_else(|| config_err("`seed` must be a non-negative integer"))?,
            ),
        };
        let train = geometry(&v, "patch_size", "step", Geometry::training())?.unwrap_or_default();
        let reconstruction = geometry(
            &v,
            "reconstruction_patch_size",
            "reconstruction_step",
            Geometry::reconstruction(),
        )?;
        if !v["datasets"].is_array() {
            return Err(config_err("`datasets` must be an array"));
        }
        let datasets = v["datasets"]
            .members()
            .map(DatasetEntry::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            seed,
            geometry: train,
            reconstruction_geometry: reconstruction,
            datasets,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "seed": 7,
        "patch_size": [1, 16, 16, 16],
        "step": [1, 8, 8, 8],
        "datasets": [
            { "name": "iseg", "path": "data/iSEG", "dataset_id": 0,
              "modalities": ["T1", "T2"], "max_patches": 100 },
            { "name": "ABIDE", "path": "data/ABIDE", "dataset_id": 1,
              "modalities": "T1", "validation_split": 0.3, "sites": ["NYU", "UM"] }
        ]
    }"#;

    #[test]
    fn parses_full_config() {
        let c = RunConfig::parse(SAMPLE).unwrap();
        assert_eq!(c.seed, Some(7));
        assert_eq!(c.geometry, Geometry::new([1, 16, 16, 16], [1, 8, 8, 8]).unwrap());
        assert_eq!(c.reconstruction_geometry, None);
        assert_eq!(c.datasets.len(), 2);
        let iseg = &c.datasets[0];
        assert_eq!(iseg.spec, DatasetSpec::ISEG);
        assert_eq!(iseg.modalities, Modalities::Multi(vec![Modality::T1, Modality::T2]));
        assert_eq!(iseg.validation_split, 0.2);
        let abide = &c.datasets[1];
        assert_eq!(abide.modalities, Modalities::Single(Modality::T1));
        assert_eq!(abide.sites.as_deref(), Some(&["NYU".to_string(), "UM".to_string()][..]));

        let o = iseg.options(&c);
        assert_eq!((o.seed, o.max_patches, o.geometry), (Some(7), Some(100), c.geometry));
    }

    #[test]
    fn single_element_modality_list_is_single_channel() {
        let text = r#"{ "datasets": [ { "name": "abide", "path": "x", "modalities": ["T1"] } ] }"#;
        let c = RunConfig::parse(text).unwrap();
        assert_eq!(c.datasets[0].modalities, Modalities::Single(Modality::T1));
        let text = r#"{ "datasets": [ { "name": "abide", "path": "x", "modalities": [] } ] }"#;
        let c = RunConfig::parse(text).unwrap();
        assert_eq!(c.datasets[0].modalities, Modalities::Single(Modality::T1));
    }

    #[test]
    fn unknown_dataset_is_config_error() {
        let text = r#"{ "datasets": [ { "name": "BraTS", "path": "x" } ] }"#;
        assert!(matches!(RunConfig::parse(text), Err(PatchError::Config(_))));
    }

    #[test]
    fn bad_shapes_and_values() {
        for text in [
            r#"{ "patch_size": [1, 32, 32], "datasets": [] }"#,
            r#"{ "step": [1, 0, 4, 4], "datasets": [] }"#,
            r#"{ "seed": -1, "datasets": [] }"#,
            r#"{ "datasets": [ { "name": "iSEG", "path": "x", "modalities": ["PD"] } ] }"#,
            r#"[]"#,
        ] {
            assert!(RunConfig::parse(text).is_err(), "{text}");
        }
    }

    #[test]
    fn defaults() {
        let c = RunConfig::parse(r#"{ "datasets": [ { "name": "MRBrainS", "path": "m" } ] }"#).unwrap();
        assert_eq!(c.seed, None);
        assert_eq!(c.geometry, Geometry::training());
        assert_eq!(c.datasets[0].modalities, Modalities::Single(Modality::T1));
    }
}
