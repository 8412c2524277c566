use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "prepare")]
#[command(about = "脑部MRI切块数据集的准备与检查工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 日志详细程度，可重复（`-v`为info，`-vv`为debug）。设置了`RUST_LOG`时以其为准。
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    #[inline]
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run_program(&mut self) -> brainpatch::Result<()> {
        match self.command {
            Commands::Split(ref mut v) => v.run(),
            Commands::Stats(ref mut v) => v.run(),
            Commands::Manifest(ref mut v) => v.run(),
            Commands::Nii2npy(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 按受试者划分数据集并切块，打印各划分的规模，可写出JSON划分报告。
    Split(crate::subcmd_impls::split::Split),
    /// 统计训练划分切块的强度均值与标准差。
    Stats(crate::subcmd_impls::stats::Stats),
    /// 扫描各模态目录，生成数据集清单CSV。
    Manifest(crate::subcmd_impls::manifest::ManifestCmd),
    /// 将NIfTI文件转换为npy文件。
    Nii2npy(crate::subcmd_impls::nii2npy::Nii2npy),
}
