//! 按体数据下标并行执行任务。结果总是按下标顺序返回，与串行执行一致。

use crate::error::PatchError;
use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use threadpool::ThreadPool;

/// 外部取消标志。置为`true`后，尚未开始的任务立即以`Cancelled`结束。
pub type CancelFlag = Arc<AtomicBool>;

/// 某个下标上的任务失败。
#[derive(Debug)]
pub(crate) struct Failed {
    pub index: usize,
    pub error: PatchError,
}

impl From<Failed> for PatchError {
    fn from(f: Failed) -> Self {
        f.error
    }
}

/// 工作线程数：未指定时取逻辑CPU数，且不超过任务数。
#[inline]
pub(crate) fn worker_count(requested: Option<usize>, jobs: usize) -> usize {
    requested.unwrap_or_else(num_cpus::get).min(jobs).max(1)
}

#[inline]
fn check(cancel: &AtomicBool) -> Result<(), PatchError> {
    if cancel.load(Ordering::Relaxed) {
        Err(PatchError::Cancelled)
    } else {
        Ok(())
    }
}

/// 对`0..len`的每个下标执行`job`。
///
/// 出错时返回下标最小的那个错误。单线程时遇错即停。
pub(crate) fn run_indexed<T, F>(
    len: usize,
    workers: Option<usize>,
    cancel: &CancelFlag,
    job: F,
) -> Result<Vec<T>, Failed>
where
    T: Send + 'static,
    F: Fn(usize) -> Result<T, PatchError> + Send + Sync + 'static,
{
    match worker_count(workers, len) {
        1 => (0..len)
            .map(|index| {
                check(cancel)
                    .and_then(|_| job(index))
                    .map_err(|error| Failed { index, error })
            })
            .collect(),
        cpus => {
            let pool = ThreadPool::new(cpus);
            let job = Arc::new(job);
            let (tx, rx) = channel();
            for index in 0..len {
                let tx = tx.clone();
                let job = Arc::clone(&job);
                let cancel = Arc::clone(cancel);
                pool.execute(move || {
                    let r = check(&cancel).and_then(|_| (*job)(index));
                    // 接收端只会在全部结果收齐后才关闭
                    let _ = tx.send((index, r));
                });
            }
            drop(tx);
            let mut results: Vec<(usize, Result<T, PatchError>)> = rx.iter().collect();
            if results.len() != len {
                let missing = (0..len)
                    .find(|i| !results.iter().any(|(j, _)| j == i))
                    .unwrap_or(0);
                return Err(Failed {
                    index: missing,
                    error: PatchError::Io(IoError::new(ErrorKind::Other, "worker thread panicked")),
                });
            }
            results.sort_unstable_by_key(|(i, _)| *i);
            results
                .into_iter()
                .map(|(index, r)| r.map_err(|error| Failed { index, error }))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_preserved() {
        let cancel = CancelFlag::default();
        for workers in [1, 4] {
            let out = run_indexed(50, Some(workers), &cancel, |i| Ok(i * i)).unwrap();
            assert_eq!(out, (0..50).map(|i| i * i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn first_error_by_index() {
        let cancel = CancelFlag::default();
        for workers in [1, 3] {
            let err = run_indexed(10, Some(workers), &cancel, |i| {
                if i % 4 == 3 {
                    Err(PatchError::IndexOutOfRange(i, 0))
                } else {
                    Ok(i)
                }
            })
            .unwrap_err();
            assert_eq!(err.index, 3);
        }
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelFlag::default();
        cancel.store(true, Ordering::Relaxed);
        let err = run_indexed(5, Some(2), &cancel, Ok).unwrap_err();
        assert!(matches!(err.error, PatchError::Cancelled));
    }

    #[test]
    fn empty_job_list() {
        let cancel = CancelFlag::default();
        let out: Vec<usize> = run_indexed(0, None, &cancel, Ok).unwrap();
        assert!(out.is_empty());
    }
}
