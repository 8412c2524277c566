pub use super::center::CenterCoordinate;
pub use super::config::{DatasetEntry, RunConfig};
pub use super::dataset::{
    Augmentation, ConcatDataset, Dataset, FileDataset, PatchDataset, Sample, Standardize, Transform,
};
pub use super::error::{PatchError, Result};
pub use super::factory::{
    create_file_train_test, create_file_train_valid_test, create_train_test,
    create_train_valid_test, DatasetSpec, FactoryOptions, Modalities, Modality, Split, TrainTest,
    TrainValidTest,
};
pub use super::geometry::{Geometry, PatchSlice, SliceBuilder};
pub use super::patch::Patch;
pub use super::pool::CancelFlag;
pub use super::report::{RunReport, SplitReport};
pub use super::split::{ReconstructionSubjects, SubjectSplit};
pub use super::stats::PatchStatistics;
pub use super::timer::PhaseTimer;
pub use super::volume::{FileLoader, RemapClassIds, Volume, VolumeLoader};
