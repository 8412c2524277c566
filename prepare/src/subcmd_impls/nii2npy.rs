use brainpatch::natsort::natural_cmp;
use brainpatch::PatchError;
use clap::{Args, ValueEnum};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct Nii2npy {
    /// 输入目录，递归查找`.nii`与`.nii.gz`文件。
    #[arg(long = "input", short = 'i')]
    input: PathBuf,
    /// 输出目录，保持与输入目录相同的子目录结构。
    #[arg(long = "output", short = 'o')]
    output: PathBuf,
    /// 输出元素类型。
    #[arg(short, long, value_enum, default_value_t = Dtype::F32)]
    dtype: Dtype,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
/// 扫描图像用`f32`，标签用`u8`。
enum Dtype {
    F32,
    U8,
}

/// 去掉NIfTI扩展名；不是NIfTI文件时返回`None`。
fn nifti_stem(name: &str) -> Option<&str> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".nii.gz") {
        Some(&name[..name.len() - 7])
    } else if lower.ends_with(".nii") {
        Some(&name[..name.len() - 4])
    } else {
        None
    }
}

impl Nii2npy {
    pub fn run(&mut self) -> brainpatch::Result<()> {
        if !self.input.is_dir() {
            return Err(PatchError::Config(format!(
                "`{}` is not a directory",
                self.input.display()
            )));
        }
        let mut jobs = Vec::new();
        for entry in WalkDir::new(&self.input) {
            let entry = entry.map_err(|e| PatchError::Io(e.into()))?;
            let name = entry.file_name().to_string_lossy();
            if let Some(stem) = entry.file_type().is_file().then(|| nifti_stem(&name)).flatten() {
                let rel = entry
                    .path()
                    .parent()
                    .and_then(|p| p.strip_prefix(&self.input).ok())
                    .unwrap_or_else(|| Path::new(""));
                let out = self.output.join(rel).join(format!("{stem}.npy"));
                jobs.push((entry.path().to_string_lossy().into_owned(), out));
            }
        }
        jobs.sort_by(|a, b| natural_cmp(&a.0, &b.0));
        info!(files = jobs.len(), "converting NIfTI volumes");
        for (src, dst) in &jobs {
            println!("处理文件`{src}`...");
            self.convert(Path::new(src), dst)?;
        }
        info!(output = %self.output.display(), "conversion finished");
        Ok(())
    }

    fn convert(&self, src: &Path, dst: &Path) -> brainpatch::Result<()> {
        let err = |e: &dyn std::fmt::Display| PatchError::Volume(src.to_path_buf(), e.to_string());
        let obj = ReaderOptions::new().read_file(src).map_err(|e| err(&e))?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let write_err = |e: ndarray_npy::WriteNpyError| PatchError::Volume(dst.to_path_buf(), e.to_string());
        // [x, y, z] -> [z, y, x]
        match self.dtype {
            Dtype::F32 => {
                let volume = obj.into_volume().into_ndarray::<f32>().map_err(|e| err(&e))?;
                let v0 = volume.reversed_axes();
                ndarray_npy::write_npy(dst, &v0.as_standard_layout()).map_err(write_err)
            }
            Dtype::U8 => {
                let volume = obj.into_volume().into_ndarray::<u8>().map_err(|e| err(&e))?;
                let v0 = volume.reversed_axes();
                ndarray_npy::write_npy(dst, &v0.as_standard_layout()).map_err(write_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nifti_extensions() {
        assert_eq!(nifti_stem("sub-1_T1w.nii.gz"), Some("sub-1_T1w"));
        assert_eq!(nifti_stem("label.NII"), Some("label"));
        assert_eq!(nifti_stem("label.npy"), None);
    }
}
