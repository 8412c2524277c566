//! 错误类型。

use crate::factory::Split;
use quick_error::quick_error;
use std::io::Error as IoError;
use std::path::PathBuf;

quick_error! {
    /// 数据集构建、切块与取样过程中可能出现的全部错误。
    #[derive(Debug)]
    pub enum PatchError {
        /// 清单文件不存在。
        ManifestNotFound(path: PathBuf) {
            display("manifest `{}` not found", path.display())
        }
        /// 清单文件格式错误（缺少列、空表等）。
        ManifestFormat(path: PathBuf, reason: String) {
            display("malformed manifest `{}`: {}", path.display(), reason)
        }
        /// 数据集不提供所请求的模态。
        ModalityNotSupported(dataset: String, modality: String) {
            display("dataset `{}` has no `{}` modality", dataset, modality)
        }
        /// 该数据集不支持这种配置（例如对只有T1的数据集请求多模态）。
        UnsupportedConfiguration(reason: String) {
            display("unsupported configuration: {}", reason)
        }
        /// 请求的受试者或切块数量超过可用数量。
        InsufficientSubjects(what: String, requested: usize, available: usize) {
            display("requested {} {} but only {} available", requested, what, available)
        }
        /// 切块尺寸或步长与体数据形状不相容。
        InvalidGeometry(reason: String) {
            display("invalid patch geometry: {}", reason)
        }
        /// 划分比例不在(0, 1)之间。
        InvalidRatio(ratio: f64) {
            display("split ratio must lie in (0, 1), got {}", ratio)
        }
        /// 数据集下标越界。
        IndexOutOfRange(index: usize, len: usize) {
            display("index {} out of range for dataset of length {}", index, len)
        }
        /// 图像与标签（或各模态之间）形状不一致。
        ShapeMismatch(what: String, expected: Vec<usize>, found: Vec<usize>) {
            display("shape mismatch in {}: expected {:?}, found {:?}", what, expected, found)
        }
        /// 体数据解码失败。
        Volume(path: PathBuf, reason: String) {
            display("cannot decode volume `{}`: {}", path.display(), reason)
        }
        /// 构建被外部取消。
        Cancelled {
            display("dataset construction cancelled")
        }
        /// 运行配置错误。
        Config(reason: String) {
            display("invalid configuration: {}", reason)
        }
        /// 构建某个数据集划分时，某个受试者出错。
        Construction(dataset: String, split: Split, subject: String, cause: Box<PatchError>) {
            display("dataset `{}`, split `{}`, subject `{}`: {}", dataset, split, subject, cause)
            source(cause)
        }
        Csv(err: csv::Error) {
            from()
            source(err)
            display("CSV error: {}", err)
        }
        Json(err: json::Error) {
            from()
            source(err)
            display("JSON error: {}", err)
        }
        Io(err: IoError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
    }
}

impl PatchError {
    /// 给出错信息附上数据集、划分与受试者。
    pub fn in_subject<D, S>(self, dataset: D, split: Split, subject: S) -> Self
    where
        D: Into<String>,
        S: Into<String>,
    {
        match self {
            // 已经带有上下文的错误不再重复包装
            e @ PatchError::Construction(..) | e @ PatchError::Cancelled => e,
            e => PatchError::Construction(dataset.into(), split, subject.into(), Box::new(e)),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
