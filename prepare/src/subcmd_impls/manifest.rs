use brainpatch::manifest::Manifest;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ManifestCmd {
    /// 数据根目录，其下每个模态与标签各占一个子目录。
    #[arg(long = "root", short = 'R')]
    root: PathBuf,
    /// 模态子目录，按通道顺序逗号分隔；目录名即清单中的列名。
    #[arg(long, short = 'm', value_delimiter = ',', required = true)]
    modalities: Vec<String>,
    /// 标签子目录。
    #[arg(long, short = 'l', default_value = "labels")]
    label_dir: String,
    /// 输出文件名，写在根目录下。
    #[arg(long, short = 'o', default_value = "manifest.csv")]
    output: String,
}

impl ManifestCmd {
    pub fn run(&mut self) -> brainpatch::Result<()> {
        let manifest = Manifest::generate(&self.root, &self.modalities, &self.label_dir)?;
        let out = self.root.join(&self.output);
        manifest.write(&out)?;
        println!("已写出 {} 行到`{}`", manifest.len(), out.display());
        Ok(())
    }
}
