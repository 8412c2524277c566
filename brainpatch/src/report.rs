//! 划分报告：记录种子、每个划分的受试者与样本数，写成JSON，便于复现与核对。

use crate::dataset::Dataset;
use crate::error::Result;
use crate::factory::{Split, TrainTest, TrainValidTest};
use json::JsonValue;
use std::path::Path;

/// 一个划分的记录。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitEntry {
    pub split: Split,
    pub subjects: Vec<String>,
    pub samples: usize,
}

impl From<&SplitEntry> for JsonValue {
    fn from(e: &SplitEntry) -> Self {
        let mut obj = JsonValue::new_object();
        obj["subjects"] = e.subjects.clone().into();
        obj["samples"] = e.samples.into();
        obj
    }
}

/// 一个数据集一次构建的报告。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitReport {
    pub dataset: String,
    pub dataset_id: usize,
    pub seed: u64,
    pub splits: Vec<SplitEntry>,
}

impl SplitReport {
    pub fn from_train_test<D: Dataset>(dataset: &str, dataset_id: usize, r: &TrainTest<D>) -> Self {
        let s = &r.subjects;
        Self {
            dataset: dataset.to_string(),
            dataset_id,
            seed: r.seed,
            splits: vec![
                entry(Split::Train, &s.train, &r.train),
                entry(Split::Test, &s.test, &r.test),
                entry(Split::Reconstruction, &s.reconstruction, &r.reconstruction),
            ],
        }
    }

    pub fn from_train_valid_test<D: Dataset>(dataset: &str, dataset_id: usize, r: &TrainValidTest<D>) -> Self {
        let s = &r.subjects;
        Self {
            dataset: dataset.to_string(),
            dataset_id,
            seed: r.seed,
            splits: vec![
                entry(Split::Train, &s.train, &r.train),
                entry(Split::Validation, &s.valid, &r.valid),
                entry(Split::Test, &s.test, &r.test),
                entry(Split::Reconstruction, &s.reconstruction, &r.reconstruction),
            ],
        }
    }

    #[inline]
    pub fn get(&self, split: Split) -> Option<&SplitEntry> {
        self.splits.iter().find(|e| e.split == split)
    }

    pub fn to_json(&self) -> JsonValue {
        let mut splits = JsonValue::new_object();
        for e in &self.splits {
            splits[e.split.as_str()] = e.into();
        }
        let mut obj = JsonValue::new_object();
        obj["dataset"] = self.dataset.as_str().into();
        obj["dataset_id"] = self.dataset_id.into();
        obj["seed"] = self.seed.into();
        obj["splits"] = splits;
        obj
    }
}

#[inline]
fn entry<D: Dataset>(split: Split, subjects: &[String], dataset: &D) -> SplitEntry {
    SplitEntry {
        split,
        subjects: subjects.to_vec(),
        samples: dataset.len(),
    }
}

/// 一次运行中全部数据集的报告。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub datasets: Vec<SplitReport>,
}

impl RunReport {
    #[inline]
    pub fn push(&mut self, report: SplitReport) {
        self.datasets.push(report);
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.datasets.iter().map(SplitReport::to_json).collect())
    }

    /// 以缩进格式写入`path`。
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json().pretty(2))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Sample;
    use crate::split::SubjectSplit;
    use pretty_assertions::assert_eq;

    struct Fixed(usize);

    impl Dataset for Fixed {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> Result<Sample> {
            Err(crate::error::PatchError::IndexOutOfRange(index, self.0))
        }
    }

    fn report() -> SplitReport {
        let r = TrainTest {
            train: Fixed(40),
            test: Fixed(8),
            reconstruction: Fixed(27),
            subjects: SubjectSplit {
                train: vec!["1".to_string(), "2".to_string()],
                valid: Vec::new(),
                test: vec!["3".to_string()],
                reconstruction: vec!["3".to_string()],
            },
            seed: 42,
        };
        SplitReport::from_train_test("iSEG", 0, &r)
    }

    #[test]
    fn json_layout() {
        let j = report().to_json();
        assert_eq!(j["dataset"], "iSEG");
        assert_eq!(j["seed"].as_u64(), Some(42));
        assert_eq!(j["splits"]["train"]["samples"].as_usize(), Some(40));
        assert_eq!(j["splits"]["reconstruction"]["subjects"][0], "3");
        assert!(j["splits"]["validation"].is_null());
    }

    #[test]
    fn written_report_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.json");
        let mut run = RunReport::default();
        run.push(report());
        run.write(&path).unwrap();
        let parsed = json::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["splits"]["test"]["samples"].as_usize(), Some(8));
        assert_eq!(report().get(Split::Test).map(|e| e.samples), Some(8));
    }
}
