//! 受试者级别的随机划分。
//!
//! 所有随机操作都显式接收一个`Rng`，没有任何全局随机状态。

use crate::error::{PatchError, Result};
use rand::seq::{index, SliceRandom};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::hash::Hash;

/// 数据集构建使用的随机数生成器。
pub type SplitRng = ChaCha8Rng;

/// 由种子创建随机数生成器。不给种子时从系统熵中取一个种子，并一并返回，便于记录与复现。
pub fn seeded_rng(seed: Option<u64>) -> (SplitRng, u64) {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().next_u64());
    (ChaCha8Rng::seed_from_u64(seed), seed)
}

#[inline]
fn check_ratio(ratio: f64) -> Result<()> {
    if ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(PatchError::InvalidRatio(ratio))
    }
}

/// 打乱后按比例切分，返回`(kept, held_out)`。
///
/// 前`ceil(n * ratio)`个元素成为留出组，其余为保留组。`n`很小时留出组可能占据全部元素。
pub fn shuffle_split<T, R>(mut items: Vec<T>, ratio: f64, rng: &mut R) -> Result<(Vec<T>, Vec<T>)>
where
    R: Rng + ?Sized,
{
    check_ratio(ratio)?;
    items.shuffle(rng);
    let held = (items.len() as f64 * ratio).ceil() as usize;
    let kept = items.split_off(held.min(items.len()));
    Ok((kept, items))
}

/// 用同一个排列同时打乱两个等长序列，保持逐项对应关系。
///
/// 两者长度不同时返回错误。
pub fn co_shuffle<A, B, R>(a: &mut Vec<A>, b: &mut Vec<B>, rng: &mut R) -> Result<()>
where
    R: Rng + ?Sized,
{
    if a.len() != b.len() {
        return Err(PatchError::ShapeMismatch(
            "co-shuffled sequences".to_string(),
            vec![a.len()],
            vec![b.len()],
        ));
    }
    let mut perm: Vec<usize> = (0..a.len()).collect();
    perm.shuffle(rng);
    let mut pairs: Vec<Option<(A, B)>> = a.drain(..).zip(b.drain(..)).map(Some).collect();
    for i in perm {
        // 每个下标恰好出现一次
        if let Some((x, y)) = pairs[i].take() {
            a.push(x);
            b.push(y);
        }
    }
    Ok(())
}

/// 无放回地均匀抽取`n`个元素，保持抽取顺序。`n`超过可用数量时返回错误，不会自动截断。
pub fn sample_without_replacement<T, R>(
    items: Vec<T>,
    n: usize,
    what: &str,
    rng: &mut R,
) -> Result<Vec<T>>
where
    R: Rng + ?Sized,
{
    if n > items.len() {
        return Err(PatchError::InsufficientSubjects(
            what.to_string(),
            n,
            items.len(),
        ));
    }
    let chosen = index::sample(rng, items.len(), n).into_vec();
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(chosen.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// 重建划分从测试组中抽取多少个受试者。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReconstructionSubjects {
    Count(usize),
    /// 测试组全部受试者（顺序随机）。
    All,
}

impl Default for ReconstructionSubjects {
    fn default() -> Self {
        Self::Count(1)
    }
}

/// 一次受试者划分的结果。训练、验证、测试三组两两不相交；重建组是测试组的子集。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubjectSplit<T> {
    pub train: Vec<T>,
    /// 两路划分时为空。
    pub valid: Vec<T>,
    pub test: Vec<T>,
    pub reconstruction: Vec<T>,
}

impl<T: Clone + Eq + Hash> SubjectSplit<T> {
    /// 两路划分：训练 / 测试。
    pub fn train_test<R>(
        subjects: Vec<T>,
        test_ratio: f64,
        reconstruction: ReconstructionSubjects,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let subjects = dedup(subjects);
        let (train, test) = shuffle_split(subjects, test_ratio, rng)?;
        let reconstruction = draw_reconstruction(&test, reconstruction, rng)?;
        Ok(Self {
            train,
            valid: Vec::new(),
            test,
            reconstruction,
        })
    }

    /// 三路划分：先以`test_ratio`切出留出组，再对留出组以同一比例切出测试组，余下为验证组。
    ///
    /// 因此验证与测试各占留出组的约`test_ratio`与`1 - test_ratio`，而不是总数的`test_ratio`。
    pub fn train_valid_test<R>(
        subjects: Vec<T>,
        test_ratio: f64,
        reconstruction: ReconstructionSubjects,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let subjects = dedup(subjects);
        let (train, rest) = shuffle_split(subjects, test_ratio, rng)?;
        let (valid, test) = shuffle_split(rest, test_ratio, rng)?;
        let reconstruction = draw_reconstruction(&test, reconstruction, rng)?;
        Ok(Self {
            train,
            valid,
            test,
            reconstruction,
        })
    }

    /// 检查训练、验证、测试三组两两不相交，且重建组包含于测试组。
    pub fn is_disjoint(&self) -> bool {
        let train: HashSet<&T> = self.train.iter().collect();
        let valid: HashSet<&T> = self.valid.iter().collect();
        let test: HashSet<&T> = self.test.iter().collect();
        train.is_disjoint(&valid)
            && train.is_disjoint(&test)
            && valid.is_disjoint(&test)
            && self.reconstruction.iter().all(|s| test.contains(s))
    }
}

/// 去除重复的受试者，保留首次出现的顺序。
fn dedup<T: Clone + Eq + Hash>(subjects: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(subjects.len());
    subjects
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn draw_reconstruction<T, R>(
    test: &[T],
    which: ReconstructionSubjects,
    rng: &mut R,
) -> Result<Vec<T>>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let n = match which {
        ReconstructionSubjects::Count(n) => n,
        ReconstructionSubjects::All => test.len(),
    };
    if n == 0 || test.is_empty() {
        return Err(PatchError::InsufficientSubjects(
            "reconstruction subjects from the test group".to_string(),
            n.max(1),
            test.len(),
        ));
    }
    sample_without_replacement(
        test.to_vec(),
        n,
        "reconstruction subjects from the test group",
        rng,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subjects(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn shuffle_split_sizes() {
        let (mut rng, _) = seeded_rng(Some(7));
        let (kept, held) = shuffle_split(subjects(10), 0.2, &mut rng).unwrap();
        assert_eq!((kept.len(), held.len()), (8, 2));
        let (kept, held) = shuffle_split(subjects(10), 0.25, &mut rng).unwrap();
        assert_eq!((kept.len(), held.len()), (7, 3));
        let (kept, held) = shuffle_split(Vec::<u8>::new(), 0.5, &mut rng).unwrap();
        assert!(kept.is_empty() && held.is_empty());
    }

    #[test]
    fn ratio_out_of_range() {
        let (mut rng, _) = seeded_rng(Some(0));
        for r in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                shuffle_split(subjects(4), r, &mut rng),
                Err(PatchError::InvalidRatio(_))
            ));
        }
    }

    #[test]
    fn three_way_split_is_disjoint_and_complete() {
        for seed in 0..50 {
            let (mut rng, _) = seeded_rng(Some(seed));
            let split = SubjectSplit::train_valid_test(
                subjects(10),
                0.2,
                ReconstructionSubjects::default(),
                &mut rng,
            )
            .unwrap();
            assert!(split.is_disjoint());
            assert_eq!(split.train.len(), 8);
            assert_eq!(split.valid.len(), 1);
            assert_eq!(split.test.len(), 1);
            assert_eq!(split.reconstruction, split.test);
            let mut all: Vec<_> = split
                .train
                .iter()
                .chain(&split.valid)
                .chain(&split.test)
                .cloned()
                .collect();
            all.sort();
            let mut expected = subjects(10);
            expected.sort();
            assert_eq!(all, expected);
        }
    }

    #[test]
    fn same_seed_same_split() {
        let run = |seed| {
            let (mut rng, _) = seeded_rng(Some(seed));
            SubjectSplit::train_test(subjects(20), 0.3, ReconstructionSubjects::All, &mut rng)
                .unwrap()
        };
        assert_eq!(run(42), run(42));
        let split = run(42);
        assert_eq!(split.test.len(), 6);
        assert_eq!(split.reconstruction.len(), 6);
        assert!(split.valid.is_empty());
        assert!(split.is_disjoint());
    }

    #[test]
    fn duplicate_subjects_are_collapsed() {
        let (mut rng, _) = seeded_rng(Some(3));
        let mut input = subjects(5);
        input.extend(subjects(5));
        let split =
            SubjectSplit::train_test(input, 0.4, ReconstructionSubjects::default(), &mut rng)
                .unwrap();
        assert_eq!(split.train.len() + split.test.len(), 5);
    }

    #[test]
    fn too_many_reconstruction_subjects() {
        let (mut rng, _) = seeded_rng(Some(1));
        let err = SubjectSplit::train_test(
            subjects(10),
            0.2,
            ReconstructionSubjects::Count(3),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::InsufficientSubjects(_, 3, 2)));
    }

    #[test]
    fn co_shuffle_keeps_pairs() {
        let (mut rng, _) = seeded_rng(Some(11));
        let mut images: Vec<String> = (0..20).map(|i| format!("img_{i}")).collect();
        let mut labels: Vec<String> = (0..20).map(|i| format!("lbl_{i}")).collect();
        co_shuffle(&mut images, &mut labels, &mut rng).unwrap();
        assert_eq!(images.len(), 20);
        for (i, l) in images.iter().zip(&labels) {
            assert_eq!(i.trim_start_matches("img_"), l.trim_start_matches("lbl_"));
        }
        let mut short = vec![1];
        assert!(co_shuffle(&mut images, &mut short, &mut rng).is_err());
    }

    #[test]
    fn sampling_is_not_clamped() {
        let (mut rng, _) = seeded_rng(Some(5));
        let picked = sample_without_replacement((0..10).collect(), 4, "patches", &mut rng).unwrap();
        assert_eq!(picked.len(), 4);
        let mut unique = picked.clone();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert!(matches!(
            sample_without_replacement((0..3).collect::<Vec<_>>(), 4, "patches", &mut rng),
            Err(PatchError::InsufficientSubjects(_, 4, 3))
        ));
    }
}
