use super::utils::{modality, shape4};
use brainpatch::config::{DatasetEntry, RunConfig};
use brainpatch::factory::{DatasetSpec, FactoryOptions, Modalities, Modality};
use brainpatch::geometry::{Geometry, Shape4};
use clap::Args;
use std::path::PathBuf;

/// `split`与`stats`共用的数据集参数：给出JSON配置文件，或直接用命令行描述单个数据集。
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// JSON运行配置文件。
    #[arg(long, short = 'c', conflicts_with_all = ["dataset", "path"])]
    config: Option<PathBuf>,
    /// 数据集名称：iSEG、MRBrainS或ABIDE。
    #[arg(long, short = 'd', required_unless_present = "config")]
    dataset: Option<String>,
    /// 清单文件所在目录。
    #[arg(long, short = 'p', required_unless_present = "config")]
    path: Option<PathBuf>,
    /// 模态，逗号分隔；多于一个时为多通道输入。缺省为数据集的第一个模态。
    #[arg(long, short = 'm', value_delimiter = ',', value_parser = modality)]
    modalities: Vec<Modality>,
    /// 数据集编号。
    #[arg(long, default_value_t = 0)]
    dataset_id: usize,
    /// 留出比例。
    #[arg(long, short = 'r', default_value_t = 0.2)]
    ratio: f64,
    /// 随机种子。也会覆盖配置文件中的种子。
    #[arg(long, short = 's')]
    seed: Option<u64>,
    /// 最多使用的受试者数。
    #[arg(long)]
    max_subjects: Option<usize>,
    /// 训练切块上限。
    #[arg(long)]
    max_patches: Option<usize>,
    /// 只保留这些采集站点（仅ABIDE），逗号分隔。
    #[arg(long, value_delimiter = ',')]
    sites: Vec<String>,
    /// 切块尺寸，如`1,32,32,32`。
    #[arg(long, value_parser = shape4)]
    patch_size: Option<Shape4>,
    /// 步长，如`1,4,4,4`。
    #[arg(long, value_parser = shape4)]
    step: Option<Shape4>,
    /// 重建切块尺寸。
    #[arg(long, value_parser = shape4)]
    reconstruction_patch_size: Option<Shape4>,
    /// 重建步长。
    #[arg(long, value_parser = shape4)]
    reconstruction_step: Option<Shape4>,
    /// 预先增强体数据所在目录。
    #[arg(long)]
    augmented_path: Option<PathBuf>,
    /// 工作线程数，缺省为全部逻辑CPU。
    #[arg(long, short = 'j')]
    workers: Option<usize>,
}

impl DatasetArgs {
    /// 读取配置文件，或由命令行参数组装出只含一个数据集的配置。
    pub fn run_config(&self) -> brainpatch::Result<RunConfig> {
        if let Some(path) = &self.config {
            let mut run = RunConfig::load(path)?;
            if self.seed.is_some() {
                run.seed = self.seed;
            }
            return Ok(run);
        }
        let (name, path) = match (&self.dataset, &self.path) {
            (Some(n), Some(p)) => (n, p),
            _ => {
                return Err(brainpatch::PatchError::Config(
                    "either --config or both --dataset and --path are required".to_string(),
                ))
            }
        };
        let spec = DatasetSpec::by_name(name)?;
        let modalities = Modalities::from_list(self.modalities.clone(), spec.modalities[0]);
        let train = Geometry::training();
        let recon = Geometry::reconstruction();
        let reconstruction_geometry = match (self.reconstruction_patch_size, self.reconstruction_step) {
            (None, None) => None,
            (size, step) => Some(Geometry::new(
                size.unwrap_or(recon.patch_size),
                step.unwrap_or(recon.step),
            )?),
        };
        Ok(RunConfig {
            seed: self.seed,
            geometry: Geometry::new(
                self.patch_size.unwrap_or(train.patch_size),
                self.step.unwrap_or(train.step),
            )?,
            reconstruction_geometry,
            datasets: vec![DatasetEntry {
                spec,
                path: path.clone(),
                dataset_id: self.dataset_id,
                modalities,
                validation_split: self.ratio,
                max_subjects: self.max_subjects,
                max_patches: self.max_patches,
                sites: (!self.sites.is_empty()).then(|| self.sites.clone()),
                augmented_path: self.augmented_path.clone(),
            }],
        })
    }

    /// 某个数据集的工厂参数，附加命令行上的线程数。
    pub fn options(&self, entry: &DatasetEntry, run: &RunConfig) -> FactoryOptions {
        let options = entry.options(run);
        match self.workers {
            Some(w) => options.with_workers(w),
            None => options,
        }
    }
}
