pub mod args;
mod dataset_args;
mod manifest;
mod nii2npy;
mod split;
mod stats;
mod utils;
