//! 参数化的数据集工厂：清单 → 受试者划分 → 读取与填充 → 切块 → 数据集。
//!
//! iSEG、MRBrainS、ABIDE之间的差别全部由[`DatasetSpec`]描述，控制流只有一份。

use crate::dataset::{Augmentation, FileDataset, PatchDataset};
use crate::error::{PatchError, Result};
use crate::geometry::{pad_to_patch_shape, Geometry};
use crate::manifest::{Manifest, SamplePaths};
use crate::patch::{extract_indexed, Patch};
use crate::pool::{run_indexed, CancelFlag};
use crate::split::{
    co_shuffle, sample_without_replacement, seeded_rng, ReconstructionSubjects, SplitRng,
    SubjectSplit,
};
use crate::volume::{
    load_image, load_pair, FileLoader, RemapClassIds, Volume, VolumeLoader, ISEG_CLASS_IDS,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 划分组。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Split {
    Train,
    Validation,
    Test,
    Reconstruction,
}

impl Split {
    pub const ALL: [Split; 4] = [
        Split::Train,
        Split::Validation,
        Split::Test,
        Split::Reconstruction,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
            Split::Reconstruction => "reconstruction",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 采集模态。字符串形式即清单中的列名。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Modality {
    T1,
    /// 1mm各向同性重采样的T1。
    T1Iso,
    /// T1反转恢复序列。
    T1Ir,
    T2,
    T2Flair,
}

impl Modality {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::T1 => "T1",
            Modality::T1Iso => "T1_1mm",
            Modality::T1Ir => "T1_IR",
            Modality::T2 => "T2",
            Modality::T2Flair => "T2_FLAIR",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        [
            Modality::T1,
            Modality::T1Iso,
            Modality::T1Ir,
            Modality::T2,
            Modality::T2Flair,
        ]
        .into_iter()
        .find(|m| m.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| PatchError::Config(format!("unknown modality `{s}`")))
    }
}

/// 单模态（单通道）或有序的多模态（多通道，通道顺序即列表顺序）。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Modalities {
    Single(Modality),
    Multi(Vec<Modality>),
}

impl Modalities {
    pub fn to_vec(&self) -> Vec<Modality> {
        match self {
            Modalities::Single(m) => vec![*m],
            Modalities::Multi(ms) => ms.clone(),
        }
    }

    #[inline]
    pub fn is_multi(&self) -> bool {
        matches!(self, Modalities::Multi(_))
    }

    /// 按给定顺序组合模态：空表取`default`，一个模态为单通道，多个为多通道。
    pub fn from_list(mut ms: Vec<Modality>, default: Modality) -> Self {
        match ms.len() {
            0 => Modalities::Single(default),
            1 => Modalities::Single(ms.remove(0)),
            _ => Modalities::Multi(ms),
        }
    }
}

impl From<Modality> for Modalities {
    fn from(m: Modality) -> Self {
        Modalities::Single(m)
    }
}

impl From<Vec<Modality>> for Modalities {
    fn from(ms: Vec<Modality>) -> Self {
        Modalities::Multi(ms)
    }
}

/// 类别筛选：`column`列取值必须属于`allowed`。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClassFilter {
    pub column: &'static str,
    pub allowed: &'static [u32],
}

const CENTER_CLASS: ClassFilter = ClassFilter {
    column: "center_class",
    allowed: &[1, 2, 3],
};

/// 一个数据集的全部差异化参数。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DatasetSpec {
    pub name: &'static str,
    /// 整段体数据的清单文件名。
    pub manifest: &'static str,
    /// 预先增强体数据目录中的清单文件名。
    pub augmented_manifest: Option<&'static str>,
    /// 逐样本文件（预先切好的样本）的清单文件名。
    pub sample_manifest: &'static str,
    pub label_column: &'static str,
    pub modalities: &'static [Modality],
    pub multimodal: bool,
    pub site_filter: bool,
    /// 清单中存在该列时才生效；重建划分从不做类别筛选。
    pub class_filter: Option<ClassFilter>,
    /// 切块数据集的重建受试者数量。
    pub reconstruction: ReconstructionSubjects,
    /// 读取时的标签值映射，`(原始值, 类别编号)`。
    pub label_remap: Option<&'static [(f32, f32)]>,
}

impl DatasetSpec {
    pub const ISEG: DatasetSpec = DatasetSpec {
        name: "iSEG",
        manifest: "output_iseg_images.csv",
        augmented_manifest: Some("output_iseg_augmented_images.csv"),
        sample_manifest: "output.csv",
        label_column: "labels",
        modalities: &[Modality::T1, Modality::T2],
        multimodal: true,
        site_filter: false,
        class_filter: Some(CENTER_CLASS),
        reconstruction: ReconstructionSubjects::Count(1),
        label_remap: Some(ISEG_CLASS_IDS),
    };

    pub const MRBRAINS: DatasetSpec = DatasetSpec {
        name: "MRBrainS",
        manifest: "output_mrbrains_images.csv",
        augmented_manifest: Some("output_mrbrains_augmented_images.csv"),
        sample_manifest: "output.csv",
        label_column: "LabelsForTesting",
        modalities: &[
            Modality::T1,
            Modality::T1Iso,
            Modality::T1Ir,
            Modality::T2Flair,
        ],
        multimodal: true,
        site_filter: false,
        class_filter: Some(CENTER_CLASS),
        reconstruction: ReconstructionSubjects::Count(1),
        label_remap: None,
    };

    pub const ABIDE: DatasetSpec = DatasetSpec {
        name: "ABIDE",
        manifest: "output_abide_images.csv",
        augmented_manifest: None,
        sample_manifest: "output.csv",
        label_column: "labels",
        modalities: &[Modality::T1],
        multimodal: false,
        site_filter: true,
        class_filter: Some(CENTER_CLASS),
        reconstruction: ReconstructionSubjects::All,
        label_remap: None,
    };

    /// 按名称（忽略大小写）查找内置数据集。
    pub fn by_name(name: &str) -> Result<Self> {
        [Self::ISEG, Self::MRBRAINS, Self::ABIDE]
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PatchError::Config(format!("unknown dataset `{name}`")))
    }

    /// 检查模态组合，返回对应的清单列名。
    fn modality_columns(&self, modalities: &Modalities) -> Result<Vec<&'static str>> {
        if modalities.is_multi() && !self.multimodal {
            return Err(PatchError::UnsupportedConfiguration(format!(
                "{} only provides a single modality",
                self.name
            )));
        }
        let list = modalities.to_vec();
        if list.is_empty() {
            return Err(PatchError::UnsupportedConfiguration(
                "empty modality list".to_string(),
            ));
        }
        list.into_iter()
            .map(|m| {
                if self.modalities.contains(&m) {
                    Ok(m.as_str())
                } else {
                    Err(PatchError::ModalityNotSupported(
                        self.name.to_string(),
                        m.to_string(),
                    ))
                }
            })
            .collect()
    }
}

/// 各划分的运行时增强策略。默认全部为空。
#[derive(Clone, Default)]
pub struct Augmentations {
    pub train: Option<Arc<dyn Augmentation>>,
    pub validation: Option<Arc<dyn Augmentation>>,
    pub test: Option<Arc<dyn Augmentation>>,
    pub reconstruction: Option<Arc<dyn Augmentation>>,
}

impl Augmentations {
    #[inline]
    pub fn get(&self, split: Split) -> Option<Arc<dyn Augmentation>> {
        match split {
            Split::Train => self.train.clone(),
            Split::Validation => self.validation.clone(),
            Split::Test => self.test.clone(),
            Split::Reconstruction => self.reconstruction.clone(),
        }
    }

    pub fn set(&mut self, split: Split, augmentation: Option<Arc<dyn Augmentation>>) {
        match split {
            Split::Train => self.train = augmentation,
            Split::Validation => self.validation = augmentation,
            Split::Test => self.test = augmentation,
            Split::Reconstruction => self.reconstruction = augmentation,
        }
    }
}

/// 工厂的可选参数。
#[derive(Clone)]
pub struct FactoryOptions {
    /// 随机种子；为空时从系统熵取种子，实际使用的种子会记录在结果中。
    pub seed: Option<u64>,
    pub max_subjects: Option<usize>,
    /// 训练切块上限`m`；验证与测试的上限为`floor(m * test_ratio)`（逐样本数据集为`ceil`）。
    pub max_patches: Option<usize>,
    /// 只保留这些采集站点（仅ABIDE）。
    pub sites: Option<Vec<String>>,
    pub geometry: Geometry,
    pub reconstruction_geometry: Option<Geometry>,
    pub reconstruction_subjects: Option<ReconstructionSubjects>,
    pub augmentations: Augmentations,
    /// 并行线程数，`None`为全部逻辑CPU。
    pub workers: Option<usize>,
    pub cancel: CancelFlag,
    pub augmented_dir: Option<PathBuf>,
    /// 为空时使用数据集自带的映射。
    pub label_remap: Option<RemapClassIds>,
    pub loader: Arc<dyn VolumeLoader>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_subjects: None,
            max_patches: None,
            sites: None,
            geometry: Geometry::training(),
            reconstruction_geometry: None,
            reconstruction_subjects: None,
            augmentations: Augmentations::default(),
            workers: None,
            cancel: CancelFlag::default(),
            augmented_dir: None,
            label_remap: None,
            loader: Arc::new(FileLoader),
        }
    }
}

impl FactoryOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_subjects(mut self, n: usize) -> Self {
        self.max_subjects = Some(n);
        self
    }

    pub fn with_max_patches(mut self, n: usize) -> Self {
        self.max_patches = Some(n);
        self
    }

    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_reconstruction_geometry(mut self, geometry: Geometry) -> Self {
        self.reconstruction_geometry = Some(geometry);
        self
    }

    pub fn with_reconstruction_subjects(mut self, which: ReconstructionSubjects) -> Self {
        self.reconstruction_subjects = Some(which);
        self
    }

    pub fn with_augmentation(mut self, split: Split, augmentation: Arc<dyn Augmentation>) -> Self {
        self.augmentations.set(split, Some(augmentation));
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_augmented_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.augmented_dir = Some(dir.into());
        self
    }

    pub fn with_label_remap(mut self, remap: RemapClassIds) -> Self {
        self.label_remap = Some(remap);
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn VolumeLoader>) -> Self {
        self.loader = loader;
        self
    }

    fn remap(&self, spec: &DatasetSpec) -> Option<RemapClassIds> {
        self.label_remap
            .clone()
            .or_else(|| spec.label_remap.map(RemapClassIds::from_pairs))
    }
}

impl fmt::Debug for FactoryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("seed", &self.seed)
            .field("max_subjects", &self.max_subjects)
            .field("max_patches", &self.max_patches)
            .field("sites", &self.sites)
            .field("geometry", &self.geometry)
            .field("reconstruction_geometry", &self.reconstruction_geometry)
            .field("reconstruction_subjects", &self.reconstruction_subjects)
            .field("workers", &self.workers)
            .field("augmented_dir", &self.augmented_dir)
            .field("label_remap", &self.label_remap)
            .finish_non_exhaustive()
    }
}

/// 两路划分的结果。
#[derive(Debug)]
pub struct TrainTest<D> {
    pub train: D,
    pub test: D,
    pub reconstruction: D,
    pub subjects: SubjectSplit<String>,
    /// 实际使用的随机种子。
    pub seed: u64,
}

/// 三路划分的结果。
#[derive(Debug)]
pub struct TrainValidTest<D> {
    pub train: D,
    pub valid: D,
    pub test: D,
    pub reconstruction: D,
    pub subjects: SubjectSplit<String>,
    pub seed: u64,
}

/// 一次工厂调用的公共上下文。
struct Context<'a> {
    spec: &'a DatasetSpec,
    options: &'a FactoryOptions,
    columns: Vec<&'static str>,
    manifest: Manifest,
    /// 已做类别筛选，用于训练、验证、测试。
    filtered: Manifest,
    rng: SplitRng,
    seed: u64,
    remap: Option<RemapClassIds>,
}

impl<'a> Context<'a> {
    fn open(
        spec: &'a DatasetSpec,
        dir: &Path,
        manifest_name: &str,
        modalities: &Modalities,
        options: &'a FactoryOptions,
    ) -> Result<Self> {
        let columns = spec.modality_columns(modalities)?;
        let mut manifest = Manifest::load(dir, manifest_name)?;
        for c in &columns {
            if !manifest.has_column(c) {
                return Err(PatchError::ModalityNotSupported(
                    spec.name.to_string(),
                    c.to_string(),
                ));
            }
        }
        if let Some(sites) = &options.sites {
            if !spec.site_filter {
                return Err(PatchError::UnsupportedConfiguration(format!(
                    "{} has no acquisition site metadata",
                    spec.name
                )));
            }
            manifest = manifest.filter_sites(sites)?;
        }
        let filtered = match spec.class_filter {
            Some(f) if manifest.has_column(f.column) => {
                manifest.filter_classes(f.column, f.allowed)?
            }
            _ => manifest.clone(),
        };
        let (rng, seed) = seeded_rng(options.seed);
        info!(
            dataset = spec.name,
            manifest = %manifest.source().display(),
            rows = manifest.len(),
            seed,
            "dataset construction started"
        );
        Ok(Self {
            spec,
            options,
            columns,
            remap: options.remap(spec),
            manifest,
            filtered,
            rng,
            seed,
        })
    }

    /// 取受试者并按需限制数量，然后划分。
    fn split(
        &mut self,
        test_ratio: f64,
        three_way: bool,
        default_recon: ReconstructionSubjects,
    ) -> Result<SubjectSplit<String>> {
        // 被类别筛选去掉全部行的受试者不参与划分
        let mut subjects = self.filtered.subjects();
        if let Some(n) = self.options.max_subjects {
            subjects = sample_without_replacement(subjects, n, "subjects", &mut self.rng)?;
        }
        let recon = self.options.reconstruction_subjects.unwrap_or(default_recon);
        let split = if three_way {
            SubjectSplit::train_valid_test(subjects, test_ratio, recon, &mut self.rng)?
        } else {
            SubjectSplit::train_test(subjects, test_ratio, recon, &mut self.rng)?
        };
        if split.train.is_empty() {
            return Err(PatchError::InsufficientSubjects(
                "training subjects".to_string(),
                1,
                0,
            ));
        }
        if three_way && split.valid.is_empty() {
            warn!(dataset = self.spec.name, "validation split is empty");
        }
        info!(
            dataset = self.spec.name,
            train = split.train.len(),
            valid = split.valid.len(),
            test = split.test.len(),
            reconstruction = split.reconstruction.len(),
            "subjects split"
        );
        Ok(split)
    }

    fn rows(&self, split: Split, subjects: &[String]) -> Result<Vec<SamplePaths>> {
        let source = match split {
            Split::Reconstruction => &self.manifest,
            _ => &self.filtered,
        };
        source
            .for_subjects(subjects)
            .sample_paths(&self.columns, self.spec.label_column)
    }

    fn wrap(&self, split: Split, subject: &str) -> impl Fn(PatchError) -> PatchError + '_ {
        let name = self.spec.name;
        let subject = subject.to_string();
        move |e| e.in_subject(name, split, subject.clone())
    }

    /// 读取并填充一个划分的全部体数据。
    fn load_volumes(
        &self,
        split: Split,
        rows: &[SamplePaths],
        geometry: Geometry,
    ) -> Result<(Vec<Volume>, Vec<Volume>)> {
        let shared = Arc::new(rows.to_vec());
        let loader = Arc::clone(&self.options.loader);
        let remap = self.remap.clone();
        let job_rows = Arc::clone(&shared);
        let pairs = run_indexed(shared.len(), self.options.workers, &self.options.cancel, move |i| {
            let row = &job_rows[i];
            let (image, label) = load_pair(loader.as_ref(), &row.images, &row.label, remap.as_ref())?;
            Ok((
                pad_to_patch_shape(&image, geometry),
                pad_to_patch_shape(&label, geometry),
            ))
        })
        .map_err(|f| (self.wrap(split, &shared[f.index].subject))(f.error))?;
        Ok(pairs.into_iter().unzip())
    }

    /// 读取预先增强的体数据，与`rows`逐个受试者对应。
    fn load_augmented(
        &self,
        split: Split,
        rows: &[SamplePaths],
        geometry: Geometry,
    ) -> Result<Option<Vec<Volume>>> {
        let dir = match &self.options.augmented_dir {
            Some(d) => d,
            None => return Ok(None),
        };
        let file = self.spec.augmented_manifest.ok_or_else(|| {
            PatchError::UnsupportedConfiguration(format!(
                "{} has no pre-computed augmented volumes",
                self.spec.name
            ))
        })?;
        let subjects: Vec<String> = rows.iter().map(|r| r.subject.clone()).collect();
        let augmented = Manifest::load(dir, file)?.for_subjects(&subjects);
        let mut available = augmented.sample_paths(&self.columns, self.spec.label_column)?;
        let mut ordered = Vec::with_capacity(rows.len());
        for r in rows {
            let at = available.iter().position(|a| a.subject == r.subject).ok_or_else(|| {
                PatchError::ManifestFormat(
                    augmented.source().to_path_buf(),
                    format!("no augmented volume for subject `{}`", r.subject),
                )
            })?;
            ordered.push(available.remove(at));
        }

        let shared = Arc::new(ordered);
        let loader = Arc::clone(&self.options.loader);
        let job_rows = Arc::clone(&shared);
        let volumes = run_indexed(shared.len(), self.options.workers, &self.options.cancel, move |i| {
            let image = load_image(loader.as_ref(), &job_rows[i].images)?;
            Ok(pad_to_patch_shape(&image, geometry))
        })
        .map_err(|f| (self.wrap(split, &shared[f.index].subject))(f.error))?;
        debug!(split = %split, volumes = volumes.len(), "augmented volumes loaded");
        Ok(Some(volumes))
    }

    fn patch_split(
        &mut self,
        split: Split,
        subjects: &[String],
        geometry: Geometry,
        dataset_id: usize,
        cap: Option<usize>,
    ) -> Result<PatchDataset> {
        let mut rows = self.rows(split, subjects)?;
        if split != Split::Reconstruction {
            rows = co_shuffle_rows(rows, &mut self.rng)?;
        }
        let (images, labels) = self.load_volumes(split, &rows, geometry)?;
        let (images, labels) = (Arc::new(images), Arc::new(labels));
        let keep_foreground = split != Split::Reconstruction;
        let mut patches: Vec<Patch> = extract_indexed(
            &images,
            &labels,
            geometry,
            keep_foreground,
            self.options.workers,
            &self.options.cancel,
        )
        .map_err(|f| match rows.get(f.index) {
            Some(r) => (self.wrap(split, &r.subject))(f.error),
            None => f.error,
        })?;
        let found = patches.len();
        if let Some(n) = cap {
            patches = sample_without_replacement(
                patches,
                n,
                &format!("{split} patches of {}", self.spec.name),
                &mut self.rng,
            )?;
        }
        info!(
            dataset = self.spec.name,
            split = %split,
            volumes = rows.len(),
            patches = patches.len(),
            found,
            "split built"
        );

        let augmented = match split {
            Split::Train | Split::Reconstruction => self.load_augmented(split, &rows, geometry)?,
            _ => None,
        };
        let subjects = rows.into_iter().map(|r| r.subject).collect();
        let mut dataset = PatchDataset::new(images, labels, patches, dataset_id)?
            .with_subjects(subjects)?
            .with_augmentation(self.options.augmentations.get(split));
        if let Some(a) = augmented {
            dataset = dataset.with_augmented_volumes(Arc::new(a))?;
        }
        Ok(dataset)
    }

    fn file_split(
        &mut self,
        split: Split,
        subjects: &[String],
        dataset_id: usize,
        cap: Option<usize>,
    ) -> Result<FileDataset> {
        let mut rows = self.rows(split, subjects)?;
        if let Some(n) = cap {
            rows = sample_without_replacement(
                rows,
                n,
                &format!("{split} samples of {}", self.spec.name),
                &mut self.rng,
            )?;
        }
        if split != Split::Reconstruction {
            rows = co_shuffle_rows(rows, &mut self.rng)?;
        }
        info!(dataset = self.spec.name, split = %split, samples = rows.len(), "split built");
        Ok(FileDataset::new(rows, Arc::clone(&self.options.loader), dataset_id)
            .with_label_remap(self.remap.clone())
            .with_augmentation(self.options.augmentations.get(split)))
    }
}

/// 把样本拆成图像路径与标签路径两个序列，用同一排列打乱后重新配对。
fn co_shuffle_rows(rows: Vec<SamplePaths>, rng: &mut SplitRng) -> Result<Vec<SamplePaths>> {
    let (mut sources, mut targets): (Vec<(String, Vec<PathBuf>)>, Vec<PathBuf>) = rows
        .into_iter()
        .map(|r| ((r.subject, r.images), r.label))
        .unzip();
    co_shuffle(&mut sources, &mut targets, rng)?;
    Ok(sources
        .into_iter()
        .zip(targets)
        .map(|((subject, images), label)| SamplePaths {
            subject,
            images,
            label,
        })
        .collect())
}

#[inline]
fn held_out_patch_cap(max: Option<usize>, test_ratio: f64) -> Option<usize> {
    max.map(|m| (m as f64 * test_ratio).floor() as usize)
}

#[inline]
fn held_out_sample_cap(max: Option<usize>, test_ratio: f64) -> Option<usize> {
    max.map(|m| (m as f64 * test_ratio).ceil() as usize)
}

/// 两路划分的切块数据集：训练、测试、重建。
///
/// 重建划分默认沿用训练几何，可用`FactoryOptions::reconstruction_geometry`覆盖。
pub fn create_train_test<P, M>(
    spec: &DatasetSpec,
    manifest_dir: P,
    modalities: M,
    dataset_id: usize,
    test_ratio: f64,
    options: &FactoryOptions,
) -> Result<TrainTest<PatchDataset>>
where
    P: AsRef<Path>,
    M: Into<Modalities>,
{
    let mut ctx = Context::open(spec, manifest_dir.as_ref(), spec.manifest, &modalities.into(), options)?;
    let subjects = ctx.split(test_ratio, false, spec.reconstruction)?;
    let geometry = options.geometry;
    let recon_geometry = options.reconstruction_geometry.unwrap_or(geometry);
    let cap = options.max_patches;
    let held_cap = held_out_patch_cap(cap, test_ratio);

    let train = ctx.patch_split(Split::Train, &subjects.train, geometry, dataset_id, cap)?;
    let test = ctx.patch_split(Split::Test, &subjects.test, geometry, dataset_id, held_cap)?;
    let reconstruction = ctx.patch_split(
        Split::Reconstruction,
        &subjects.reconstruction,
        recon_geometry,
        dataset_id,
        None,
    )?;
    Ok(TrainTest {
        train,
        test,
        reconstruction,
        subjects,
        seed: ctx.seed,
    })
}

/// 三路划分的切块数据集：训练、验证、测试、重建。
///
/// 重建划分默认使用[`Geometry::reconstruction`]。
pub fn create_train_valid_test<P, M>(
    spec: &DatasetSpec,
    manifest_dir: P,
    modalities: M,
    dataset_id: usize,
    test_ratio: f64,
    options: &FactoryOptions,
) -> Result<TrainValidTest<PatchDataset>>
where
    P: AsRef<Path>,
    M: Into<Modalities>,
{
    let mut ctx = Context::open(spec, manifest_dir.as_ref(), spec.manifest, &modalities.into(), options)?;
    let subjects = ctx.split(test_ratio, true, spec.reconstruction)?;
    let geometry = options.geometry;
    let recon_geometry = options
        .reconstruction_geometry
        .unwrap_or_else(Geometry::reconstruction);
    let cap = options.max_patches;
    let held_cap = held_out_patch_cap(cap, test_ratio);

    let train = ctx.patch_split(Split::Train, &subjects.train, geometry, dataset_id, cap)?;
    let valid = ctx.patch_split(Split::Validation, &subjects.valid, geometry, dataset_id, held_cap)?;
    let test = ctx.patch_split(Split::Test, &subjects.test, geometry, dataset_id, held_cap)?;
    let reconstruction = ctx.patch_split(
        Split::Reconstruction,
        &subjects.reconstruction,
        recon_geometry,
        dataset_id,
        None,
    )?;
    Ok(TrainValidTest {
        train,
        valid,
        test,
        reconstruction,
        subjects,
        seed: ctx.seed,
    })
}

/// 两路划分的逐样本数据集。重建划分默认取测试组全部受试者。
pub fn create_file_train_test<P, M>(
    spec: &DatasetSpec,
    manifest_dir: P,
    modalities: M,
    dataset_id: usize,
    test_ratio: f64,
    options: &FactoryOptions,
) -> Result<TrainTest<FileDataset>>
where
    P: AsRef<Path>,
    M: Into<Modalities>,
{
    let mut ctx = Context::open(
        spec,
        manifest_dir.as_ref(),
        spec.sample_manifest,
        &modalities.into(),
        options,
    )?;
    let subjects = ctx.split(test_ratio, false, ReconstructionSubjects::All)?;
    let cap = options.max_patches;
    let held_cap = held_out_sample_cap(cap, test_ratio);
    let train = ctx.file_split(Split::Train, &subjects.train, dataset_id, cap)?;
    let test = ctx.file_split(Split::Test, &subjects.test, dataset_id, held_cap)?;
    let reconstruction = ctx.file_split(Split::Reconstruction, &subjects.reconstruction, dataset_id, None)?;
    Ok(TrainTest {
        train,
        test,
        reconstruction,
        subjects,
        seed: ctx.seed,
    })
}

/// 三路划分的逐样本数据集。
pub fn create_file_train_valid_test<P, M>(
    spec: &DatasetSpec,
    manifest_dir: P,
    modalities: M,
    dataset_id: usize,
    test_ratio: f64,
    options: &FactoryOptions,
) -> Result<TrainValidTest<FileDataset>>
where
    P: AsRef<Path>,
    M: Into<Modalities>,
{
    let mut ctx = Context::open(
        spec,
        manifest_dir.as_ref(),
        spec.sample_manifest,
        &modalities.into(),
        options,
    )?;
    let subjects = ctx.split(test_ratio, true, ReconstructionSubjects::All)?;
    let cap = options.max_patches;
    let held_cap = held_out_sample_cap(cap, test_ratio);
    let train = ctx.file_split(Split::Train, &subjects.train, dataset_id, cap)?;
    let valid = ctx.file_split(Split::Validation, &subjects.valid, dataset_id, held_cap)?;
    let test = ctx.file_split(Split::Test, &subjects.test, dataset_id, held_cap)?;
    let reconstruction = ctx.file_split(Split::Reconstruction, &subjects.reconstruction, dataset_id, None)?;
    Ok(TrainValidTest {
        train,
        valid,
        test,
        reconstruction,
        subjects,
        seed: ctx.seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_names_round_trip() {
        for m in ["T1", "t1_1mm", "T1_IR", "T2", "T2_FLAIR"] {
            let parsed: Modality = m.parse().unwrap();
            assert!(parsed.as_str().eq_ignore_ascii_case(m));
        }
        assert!("PD".parse::<Modality>().is_err());
    }

    #[test]
    fn abide_rejects_multimodal_and_t2() {
        let spec = DatasetSpec::ABIDE;
        assert!(matches!(
            spec.modality_columns(&vec![Modality::T1].into()),
            Err(PatchError::UnsupportedConfiguration(_))
        ));
        assert!(matches!(
            spec.modality_columns(&Modality::T2.into()),
            Err(PatchError::ModalityNotSupported(..))
        ));
        assert_eq!(spec.modality_columns(&Modality::T1.into()).unwrap(), ["T1"]);
    }

    #[test]
    fn multimodal_column_order_follows_request() {
        let cols = DatasetSpec::MRBRAINS
            .modality_columns(&vec![Modality::T2Flair, Modality::T1].into())
            .unwrap();
        assert_eq!(cols, ["T2_FLAIR", "T1"]);
        assert!(DatasetSpec::ISEG
            .modality_columns(&Modalities::Multi(Vec::new()))
            .is_err());
    }

    #[test]
    fn modality_lists_normalise() {
        assert_eq!(Modalities::from_list(vec![], Modality::T1), Modalities::Single(Modality::T1));
        assert_eq!(
            Modalities::from_list(vec![Modality::T2], Modality::T1),
            Modalities::Single(Modality::T2)
        );
        assert_eq!(
            Modalities::from_list(vec![Modality::T2, Modality::T1], Modality::T1),
            Modalities::Multi(vec![Modality::T2, Modality::T1])
        );
    }

    #[test]
    fn held_out_caps() {
        assert_eq!(held_out_patch_cap(Some(10), 0.25), Some(2));
        assert_eq!(held_out_sample_cap(Some(10), 0.25), Some(3));
        assert_eq!(held_out_patch_cap(None, 0.25), None);
    }

    #[test]
    fn presets_by_name() {
        assert_eq!(DatasetSpec::by_name("iseg").unwrap(), DatasetSpec::ISEG);
        assert_eq!(DatasetSpec::by_name("MRBrainS").unwrap().label_column, "LabelsForTesting");
        assert!(DatasetSpec::by_name("BraTS").is_err());
    }

    #[test]
    fn split_names() {
        let names: Vec<String> = Split::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["train", "validation", "test", "reconstruction"]);
    }
}
