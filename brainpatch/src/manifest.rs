//! 数据集清单（CSV）：受试者 → 各模态文件路径 → 标签路径。

use crate::error::{PatchError, Result};
use crate::natsort::{first_number, natural_cmp, natural_sorted};
use csv::{ReaderBuilder, StringRecord, Writer};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 受试者编号列。
pub const SUBJECT_COLUMN: &str = "subject";
/// 采集站点列。
pub const SITE_COLUMN: &str = "site";

/// 清单中的一行。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestRecord {
    pub subject: String,
    values: Vec<String>,
}

impl ManifestRecord {
    #[inline]
    pub fn new(subject: String, values: Vec<String>) -> Self {
        Self { subject, values }
    }

    #[inline]
    fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }
}

/// 一个样本（一行）对应的全部文件。`images`的顺序即通道顺序。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SamplePaths {
    pub subject: String,
    pub images: Vec<PathBuf>,
    pub label: PathBuf,
}

/// 载入内存的清单。创建后不再修改，筛选操作返回新清单。
#[derive(Clone, Debug)]
pub struct Manifest {
    source: PathBuf,
    columns: Vec<String>,
    records: Vec<ManifestRecord>,
}

impl Manifest {
    /// 直接由列名和行构造。`columns`须包含`subject`列。
    pub fn new(source: PathBuf, columns: Vec<String>, records: Vec<ManifestRecord>) -> Result<Self> {
        if !columns.iter().any(|c| c == SUBJECT_COLUMN) {
            return Err(PatchError::ManifestFormat(
                source,
                format!("missing `{SUBJECT_COLUMN}` column"),
            ));
        }
        Ok(Self {
            source,
            columns,
            records,
        })
    }

    /// 读取`dir/file_name`。
    pub fn load<P: AsRef<Path>>(dir: P, file_name: &str) -> Result<Self> {
        let path = dir.as_ref().join(file_name);
        if !path.is_file() {
            return Err(PatchError::ManifestNotFound(path));
        }
        let file = std::fs::File::open(&path)?;
        Self::from_reader(path, file)
    }

    /// 从任意CSV输入读取。`source`用于错误信息与相对路径解析。
    pub fn from_reader<R: Read>(source: PathBuf, reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let subject_index = columns
            .iter()
            .position(|c| c == SUBJECT_COLUMN)
            .ok_or_else(|| {
                PatchError::ManifestFormat(source.clone(), format!("missing `{SUBJECT_COLUMN}` column"))
            })?;
        let mut records = Vec::new();
        for row in reader.records() {
            let row: StringRecord = row?;
            let values: Vec<String> = row.iter().map(str::to_string).collect();
            let subject = values.get(subject_index).cloned().unwrap_or_default();
            if subject.is_empty() {
                return Err(PatchError::ManifestFormat(
                    source,
                    format!("empty subject id on row {}", records.len() + 1),
                ));
            }
            records.push(ManifestRecord::new(subject, values));
        }
        debug!(manifest = %source.display(), rows = records.len(), "manifest loaded");
        Self::new(source, columns, records)
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns.iter().position(|c| c == name).ok_or_else(|| {
            PatchError::ManifestFormat(self.source.clone(), format!("missing `{name}` column"))
        })
    }

    /// 按首次出现顺序返回去重后的受试者编号。
    pub fn subjects(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.subject.as_str()))
            .map(|r| r.subject.clone())
            .collect()
    }

    fn retain<F: FnMut(&ManifestRecord) -> Result<bool>>(&self, mut keep: F) -> Result<Self> {
        let mut records = Vec::with_capacity(self.records.len());
        for r in &self.records {
            if keep(r)? {
                records.push(r.clone());
            }
        }
        Ok(Self {
            source: self.source.clone(),
            columns: self.columns.clone(),
            records,
        })
    }

    /// 只保留`column`列取值在`allowed`中的行。
    pub fn filter_values(&self, column: &str, allowed: &[String]) -> Result<Self> {
        let index = self.column_index(column)?;
        self.retain(|r| Ok(allowed.iter().any(|a| a == r.get(index))))
    }

    /// 只保留给定采集站点的行。
    #[inline]
    pub fn filter_sites(&self, sites: &[String]) -> Result<Self> {
        self.filter_values(SITE_COLUMN, sites)
    }

    /// 只保留`column`列中类别编号属于`allowed`的行。单元格按数值解析，`2`与`2.0`视为同一类别。
    pub fn filter_classes(&self, column: &str, allowed: &[u32]) -> Result<Self> {
        let index = self.column_index(column)?;
        let source = &self.source;
        self.retain(|r| {
            let cell = r.get(index);
            let value: f64 = cell.parse().map_err(|_| {
                PatchError::ManifestFormat(
                    source.clone(),
                    format!("class `{cell}` of subject `{}` is not a number", r.subject),
                )
            })?;
            Ok(allowed.iter().any(|&c| f64::from(c) == value))
        })
    }

    /// 只保留属于`subjects`的行。
    pub fn for_subjects(&self, subjects: &[String]) -> Self {
        let wanted: HashSet<&str> = subjects.iter().map(String::as_str).collect();
        Self {
            source: self.source.clone(),
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| wanted.contains(r.subject.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// 收集每行的模态路径与标签路径，按标签路径的自然序排列。
    ///
    /// 整行作为一个整体排序，图像与标签的对应关系不依赖于文件名是否对齐。
    /// 相对路径相对于清单所在目录解析。
    pub fn sample_paths(&self, modality_columns: &[&str], label_column: &str) -> Result<Vec<SamplePaths>> {
        let image_indices = modality_columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let label_index = self.column_index(label_column)?;
        let base = self.source.parent().unwrap_or_else(|| Path::new(""));
        let resolve = |cell: &str, subject: &str, column: &str| -> Result<PathBuf> {
            if cell.is_empty() {
                return Err(PatchError::ManifestFormat(
                    self.source.clone(),
                    format!("empty `{column}` path for subject `{subject}`"),
                ));
            }
            Ok(base.join(cell))
        };

        let mut rows = Vec::with_capacity(self.records.len());
        for r in &self.records {
            let images = image_indices
                .iter()
                .zip(modality_columns)
                .map(|(&i, c)| resolve(r.get(i), &r.subject, c))
                .collect::<Result<Vec<_>>>()?;
            let label = resolve(r.get(label_index), &r.subject, label_column)?;
            rows.push(SamplePaths {
                subject: r.subject.clone(),
                images,
                label,
            });
        }
        rows.sort_by(|a, b| {
            natural_cmp(&a.label.to_string_lossy(), &b.label.to_string_lossy())
                .then_with(|| natural_cmp(&a.subject, &b.subject))
        });
        Ok(rows)
    }

    /// 写出为CSV。
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for r in &self.records {
            writer.write_record(&r.values)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// 扫描`root/<目录>/`，生成清单。
    ///
    /// `modality_dirs`与`label_dir`都是`root`下的子目录名，列名与目录名相同；各目录下的文件按自然序排列后逐行对齐，
    /// 路径记录为相对`root`的路径，
    /// 文件数量必须一致。受试者编号取自标签文件名中的第一段数字，没有数字时使用从1开始的行号。
    pub fn generate<P: AsRef<Path>>(root: P, modality_dirs: &[String], label_dir: &str) -> Result<Self> {
        let root = root.as_ref();
        let source = root.join("manifest.csv");
        let list = |dir: &str| -> Result<Vec<PathBuf>> {
            let dir = root.join(dir);
            if !dir.is_dir() {
                return Err(PatchError::ManifestFormat(
                    source.clone(),
                    format!("`{}` is not a directory", dir.display()),
                ));
            }
            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(|e| PatchError::Io(e.into()))?;
                if entry.file_type().is_file() {
                    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    files.push(rel.to_string_lossy().into_owned());
                }
            }
            Ok(natural_sorted(files).into_iter().map(PathBuf::from).collect())
        };

        let labels = list(label_dir)?;
        let mut images = Vec::with_capacity(modality_dirs.len());
        for m in modality_dirs {
            let files = list(m)?;
            if files.len() != labels.len() {
                return Err(PatchError::ManifestFormat(
                    source.clone(),
                    format!(
                        "`{m}` holds {} files but `{label_dir}` holds {}",
                        files.len(),
                        labels.len()
                    ),
                ));
            }
            images.push(files);
        }

        let mut columns = vec![SUBJECT_COLUMN.to_string()];
        columns.extend(modality_dirs.iter().cloned());
        columns.push(label_dir.to_string());

        let records = labels
            .iter()
            .enumerate()
            .map(|(row, label)| {
                let name = label
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let subject = first_number(&name).unwrap_or(row as u64 + 1).to_string();
                let mut values = vec![subject.clone()];
                values.extend(images.iter().map(|files| files[row].to_string_lossy().into_owned()));
                values.push(label.to_string_lossy().into_owned());
                ManifestRecord::new(subject, values)
            })
            .collect();
        Self::new(source, columns, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "\
subject,T1,T2,labels,site,center_class
3,s3/T1.npy,s3/T2.npy,s3/label.npy,NYU,1
1,s1/T1.npy,s1/T2.npy,s1/label.npy,NYU,0
10,s10/T1.npy,s10/T2.npy,s10/label.npy,Pitt,2.0
2,s2/T1.npy,s2/T2.npy,s2/label.npy,Pitt,3
";

    fn manifest() -> Manifest {
        Manifest::from_reader(PathBuf::from("/data/iseg/m.csv"), CSV.as_bytes()).unwrap()
    }

    #[test]
    fn unique_subjects_in_order() {
        assert_eq!(manifest().subjects(), ["3", "1", "10", "2"]);
    }

    #[test]
    fn site_and_class_filters() {
        let m = manifest();
        assert_eq!(m.filter_sites(&["Pitt".to_string()]).unwrap().subjects(), ["10", "2"]);
        assert_eq!(m.filter_classes("center_class", &[1, 2, 3]).unwrap().subjects(), ["3", "10", "2"]);
        assert!(m.filter_classes("quality", &[1]).is_err());
    }

    #[test]
    fn paths_are_sorted_naturally_and_resolved() {
        let m = manifest().for_subjects(&["10".to_string(), "2".to_string(), "3".to_string()]);
        let rows = m.sample_paths(&["T1", "T2"], "labels").unwrap();
        let subjects: Vec<_> = rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["2", "3", "10"]);
        assert_eq!(rows[0].images, [PathBuf::from("/data/iseg/s2/T1.npy"), PathBuf::from("/data/iseg/s2/T2.npy")]);
        assert_eq!(rows[2].label, PathBuf::from("/data/iseg/s10/label.npy"));
    }

    #[test]
    fn missing_columns() {
        assert!(matches!(
            manifest().sample_paths(&["FLAIR"], "labels"),
            Err(PatchError::ManifestFormat(..))
        ));
        let err = Manifest::from_reader(PathBuf::from("x.csv"), "id,T1\n1,a\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PatchError::ManifestFormat(..)));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Manifest::load(dir.path(), "output_iseg_images.csv"),
            Err(PatchError::ManifestNotFound(_))
        ));
    }

    #[test]
    fn generate_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["T1", "label"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            for i in [1, 2, 10] {
                std::fs::write(dir.path().join(sub).join(format!("subject-{i}-{sub}.npy")), b"").unwrap();
            }
        }
        let m = Manifest::generate(dir.path(), &["T1".to_string()], "label").unwrap();
        assert_eq!(m.columns(), ["subject", "T1", "label"]);
        assert_eq!(m.subjects(), ["1", "2", "10"]);

        let out = dir.path().join("manifest.csv");
        m.write(&out).unwrap();
        let back = Manifest::load(dir.path(), "manifest.csv").unwrap();
        assert_eq!(back.records(), m.records());
        let rows = back.sample_paths(&["T1"], "label").unwrap();
        assert!(rows[2].images[0].ends_with("subject-10-T1.npy"));
    }
}
