use clap::Parser;
use ndarray::Array3;
use ndarray_npy::write_npy;
use prepare::Cli;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

/// 6个受试者，40³体数据，中心有一个半径5的球。
fn write_subjects(root: &Path) {
    for dir in ["T1", "labels"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    for s in 1..=6 {
        write_npy(root.join("T1").join(format!("t1-{s}.npy")), &Array3::from_elem((40, 40, 40), 1.0f32)).unwrap();
        let label = Array3::from_shape_fn((40, 40, 40), |(z, y, x)| {
            let d2 = [z, y, x].iter().map(|&v| (v as f32 - 20.0).powi(2)).sum::<f32>();
            if d2 <= 25.0 {
                1.0f32
            } else {
                0.0
            }
        });
        write_npy(root.join("labels").join(format!("label-{s}.npy")), &label).unwrap();
    }
}

fn run(args: &[&str]) -> brainpatch::Result<()> {
    let mut cli = Cli::try_parse_from(args).unwrap();
    cli.run_program()
}

#[test]
fn manifest_then_split() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_subjects(root);
    let root_s = root.to_str().unwrap();

    run(&["prepare", "manifest", "-R", root_s, "-m", "T1", "-o", "output_abide_images.csv"]).unwrap();
    let csv = fs::read_to_string(root.join("output_abide_images.csv")).unwrap();
    assert_eq!(csv.lines().next(), Some("subject,T1,labels"));
    assert_eq!(csv.lines().count(), 7);

    let report = root.join("split.json");
    run(&[
        "prepare", "split", "-d", "ABIDE", "-p", root_s, "-s", "17", "-r", "0.5", "-j", "2",
        "-o", report.to_str().unwrap(),
    ])
    .unwrap();
    let j = json::parse(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(j[0]["dataset"], "ABIDE");
    assert_eq!(j[0]["seed"].as_u64(), Some(17));
    assert_eq!(j[0]["splits"]["train"]["subjects"].len(), 3);
    assert_eq!(j[0]["splits"]["test"]["subjects"].len(), 3);
    assert_eq!(j[0]["splits"]["train"]["samples"].as_usize(), Some(3 * 7));

    run(&["prepare", "stats", "-d", "ABIDE", "-p", root_s, "-s", "17", "-r", "0.5"]).unwrap();
}

#[test]
fn split_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_subjects(root);
    run(&["prepare", "manifest", "-R", root.to_str().unwrap(), "-m", "T1", "-o", "output_abide_images.csv"]).unwrap();

    let config = root.join("run.json");
    let text = format!(
        r#"{{ "seed": 5, "datasets": [ {{ "name": "abide", "path": {:?}, "dataset_id": 3, "validation_split": 0.5, "max_patches": 10 }} ] }}"#,
        root.to_str().unwrap()
    );
    fs::write(&config, text).unwrap();
    let report = root.join("split.json");
    run(&[
        "prepare", "split", "-c", config.to_str().unwrap(), "--three-way", "-o", report.to_str().unwrap(),
    ])
    .unwrap();
    let j = json::parse(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(j[0]["dataset_id"].as_usize(), Some(3));
    assert_eq!(j[0]["splits"]["train"]["samples"].as_usize(), Some(10));
    assert_eq!(j[0]["splits"]["validation"]["samples"].as_usize(), Some(5));
}

#[test]
fn missing_manifest_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&["prepare", "split", "-d", "iSEG", "-p", dir.path().to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, brainpatch::PatchError::ManifestNotFound(_)));
}
