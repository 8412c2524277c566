use super::dataset_args::DatasetArgs;
use brainpatch::factory::create_train_test;
use brainpatch::stats::PatchStatistics;
use clap::{Args, ValueEnum};

#[derive(Args, Debug)]
pub struct Stats {
    #[command(flatten)]
    data: DatasetArgs,
    /// 统计哪个划分。
    #[arg(long, value_enum, default_value_t = Which::Train)]
    split: Which,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Which {
    Train,
    Test,
    Reconstruction,
}

impl Stats {
    pub fn run(&mut self) -> brainpatch::Result<()> {
        let run = self.data.run_config()?;
        for e in &run.datasets {
            let options = self.data.options(e, &run);
            let r = create_train_test(
                &e.spec,
                &e.path,
                e.modalities.clone(),
                e.dataset_id,
                e.validation_split,
                &options,
            )?;
            let dataset = match self.split {
                Which::Train => &r.train,
                Which::Test => &r.test,
                Which::Reconstruction => &r.reconstruction,
            };
            let s = PatchStatistics::of_patch_dataset(dataset)?;
            println!(
                "{} {:?}: mean = {:.6}, std = {:.6}（{} 个切块，种子{}）",
                e.spec.name, self.split, s.mean, s.std, s.patches, r.seed
            );
        }
        Ok(())
    }
}
