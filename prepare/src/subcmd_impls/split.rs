use super::dataset_args::DatasetArgs;
use brainpatch::config::DatasetEntry;
use brainpatch::factory::{
    create_file_train_test, create_file_train_valid_test, create_train_test,
    create_train_valid_test, FactoryOptions,
};
use brainpatch::report::{RunReport, SplitReport};
use brainpatch::timer::PhaseTimer;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct Split {
    #[command(flatten)]
    data: DatasetArgs,
    /// 三路划分（训练/验证/测试）。缺省为两路划分（训练/测试）。
    #[arg(long)]
    three_way: bool,
    /// 使用逐样本清单（每行一个预先切好的样本），而不是整段体数据。
    #[arg(long)]
    samples: bool,
    /// JSON划分报告的输出路径。
    #[arg(long, short = 'o')]
    report: Option<PathBuf>,
}

impl Split {
    pub fn run(&mut self) -> brainpatch::Result<()> {
        let run = self.data.run_config()?;
        let mut report = RunReport::default();
        let mut timer = PhaseTimer::new();
        for entry in &run.datasets {
            let options = self.data.options(entry, &run);
            let r = timer.measure(|| self.build(entry, &options))?;
            print_report(&r);
            report.push(r);
        }
        info!(datasets = report.datasets.len(), elapsed = %timer, "split finished");
        if let Some(path) = &self.report {
            report.write(path)?;
            println!("划分报告已写入`{}`", path.display());
        }
        Ok(())
    }

    fn build(&self, e: &DatasetEntry, options: &FactoryOptions) -> brainpatch::Result<SplitReport> {
        let (spec, dir, id, ratio) = (&e.spec, &e.path, e.dataset_id, e.validation_split);
        let m = e.modalities.clone();
        Ok(match (self.samples, self.three_way) {
            (false, false) => {
                SplitReport::from_train_test(spec.name, id, &create_train_test(spec, dir, m, id, ratio, options)?)
            }
            (false, true) => SplitReport::from_train_valid_test(
                spec.name,
                id,
                &create_train_valid_test(spec, dir, m, id, ratio, options)?,
            ),
            (true, false) => SplitReport::from_train_test(
                spec.name,
                id,
                &create_file_train_test(spec, dir, m, id, ratio, options)?,
            ),
            (true, true) => SplitReport::from_train_valid_test(
                spec.name,
                id,
                &create_file_train_valid_test(spec, dir, m, id, ratio, options)?,
            ),
        })
    }
}

fn print_report(r: &SplitReport) {
    println!("{}（编号{}，种子{}）", r.dataset, r.dataset_id, r.seed);
    for e in &r.splits {
        println!(
            "  {:<15}{:>6} 名受试者{:>10} 个样本",
            e.split.as_str(),
            e.subjects.len(),
            e.samples
        );
    }
}
