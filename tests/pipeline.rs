use std::fs;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use rust_ngramcount::file;
use rust_ngramcount::ngram::{
    CountSession, CounterConfig, InputFormat, NgramCounter, SpillFiles, merge,
};
use tempfile::TempDir;

const CORPUS: &str = "the cat sat\nthe cat ran\n\nthe dog sat\na cat sat\n";

fn count(dir: &TempDir, inputs: &[&str], config: CounterConfig, ext: &str) -> Vec<PathBuf> {
    let prefix = dir.path().join("ngms").to_string_lossy().into_owned();
    let mut session = CountSession::new(NgramCounter::new(config), SpillFiles::new(prefix, ext, 10));
    for input in inputs {
        session.count(input.as_bytes()).unwrap();
    }
    session.finish().unwrap()
}

fn merge_files(paths: &[PathBuf], threshold: u64) -> String {
    let inputs: Vec<(String, Box<dyn BufRead>)> = paths
        .iter()
        .map(|p| (p.display().to_string(), file::open_input(Some(p)).unwrap()))
        .collect();
    let mut out = Vec::new();
    merge(threshold, inputs, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn read_text(path: &Path) -> String {
    let mut text = String::new();
    file::open_input(Some(path))
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

fn sorted_config(max_ngram_length: usize) -> CounterConfig {
    CounterConfig {
        max_ngram_length,
        memory_limit: 2 << 20,
        sort: true,
        ..CounterConfig::default()
    }
}

#[test]
fn split_counts_merge_to_whole_counts() {
    let dir = tempfile::tempdir().unwrap();
    let whole = count(&dir, &[CORPUS], sorted_config(3), "");
    assert_eq!(whole.len(), 1);
    let expected = read_text(&whole[0]);

    // Separate sessions give one spill per part.
    let parts = ["the cat sat\nthe cat ran\n", "the dog sat\n", "a cat sat\n"];
    let mut spills = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let sub = dir.path().join(format!("part{}", i));
        fs::create_dir(&sub).unwrap();
        let prefix = sub.join("ngms").to_string_lossy().into_owned();
        let mut session =
            CountSession::new(NgramCounter::new(sorted_config(3)), SpillFiles::new(prefix, "gz", 1));
        session.count(part.as_bytes()).unwrap();
        spills.extend(session.finish().unwrap());
    }
    assert_eq!(spills.len(), 3);
    assert!(spills.iter().all(|p| p.to_string_lossy().ends_with(".0000.gz")));

    assert_eq!(merge_files(&spills, 0), expected);
    assert!(expected.contains("the cat\t2\n"));
    assert!(expected.contains("cat sat\t2\n"));
    assert!(expected.contains("sat\t3\n"));
}

#[test]
fn threshold_applies_after_summing() {
    let dir = tempfile::tempdir().unwrap();
    let a = count(&dir, &["x y\nx\n"], sorted_config(2), "a");
    let b = count(&dir, &["x z\n"], sorted_config(2), "b");
    let merged = merge_files(&[a[0].clone(), b[0].clone()], 2);
    assert_eq!(merged, "x\t3\n");
}

#[test]
fn boundary_counts_in_tagged_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = "a\tN\nb\tV\nEOS\nEOS\na\tN\nb\tV\nEOS\n";
    let files = count(
        &dir,
        &[input],
        CounterConfig {
            format: InputFormat::Mecab,
            boundary: true,
            ..sorted_config(2)
        },
        "",
    );
    assert_eq!(
        read_text(&files[0]),
        "</S>\t2\n<S>\t2\n<S> a\t2\na\t2\na b\t2\nb\t2\nb </S>\t2\n"
    );
}

#[test]
fn unsorted_spills_hold_same_counts() {
    let dir = tempfile::tempdir().unwrap();
    let sorted = count(&dir, &[CORPUS], sorted_config(3), "sorted");
    let unsorted = count(
        &dir,
        &[CORPUS],
        CounterConfig {
            sort: false,
            ..sorted_config(3)
        },
        "unsorted",
    );
    let mut lines: Vec<String> = read_text(&unsorted[0]).lines().map(str::to_string).collect();
    lines.sort_by(|a, b| {
        let (ka, _) = a.rsplit_once('\t').unwrap();
        let (kb, _) = b.rsplit_once('\t').unwrap();
        format!("{}\t", ka).cmp(&format!("{}\t", kb))
    });
    let expected: Vec<String> = read_text(&sorted[0]).lines().map(str::to_string).collect();
    assert_eq!(lines, expected);
}

#[test]
fn gzip_spills_are_readable_by_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hand.gz");
    let mut enc = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::fast());
    enc.write_all(b"cat\t4\ndog\t1\n").unwrap();
    enc.finish().unwrap();

    let spills = count(&dir, &["cat dog\n"], sorted_config(1), "gz");
    let merged = merge_files(&[path, spills[0].clone()], 0);
    assert_eq!(merged, "cat\t5\ndog\t2\n");
}
