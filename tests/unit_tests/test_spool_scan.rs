// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs::File;

use horace::spool::{FilestoreScan, Lockfile, spoolfile::SpoolfileName};
use tempfile::TempDir;

fn touch(dir: &TempDir, name: &str) {
    File::create(dir.path().join(name)).expect("cannot create file");
}

#[test]
fn test_spoolfile_name_format() {
    assert_eq!(SpoolfileName::format(0, 6), "000000");
    assert_eq!(SpoolfileName::format(42, 6), "000042");
    assert_eq!(SpoolfileName::format(1_234_567, 6), "1234567");
    assert_eq!(SpoolfileName::format(3, 0), "3");
}

#[test]
fn test_spoolfile_name_parse() {
    let sf = SpoolfileName::parse("000042").expect("parse failed");
    assert_eq!(sf.filenum, 42);
    assert!(sf.padded);
    assert_eq!(sf.width, 6);

    let sf = SpoolfileName::parse("7").expect("parse failed");
    assert_eq!(sf.filenum, 7);
    assert!(!sf.padded);

    assert!(SpoolfileName::parse("").is_err());
    assert!(SpoolfileName::parse("12a").is_err());
    assert!(SpoolfileName::parse("-1").is_err());
    // 2^64 - 1 cannot be allocated a successor.
    assert!(SpoolfileName::parse("18446744073709551615").is_err());
    assert!(SpoolfileName::parse("99999999999999999999").is_err());
}

#[test]
fn test_scan_empty_store() {
    let dir = TempDir::new().expect("cannot create temp dir");
    let scan = FilestoreScan::scan(dir.path()).expect("scan failed");
    assert!(scan.is_empty());
    assert_eq!(scan.first_filenum, 0);
    assert_eq!(scan.next_filenum, 0);
}

#[test]
fn test_scan_ignores_dotfiles() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, ".rdlock");
    touch(&dir, ".wrlock");
    let scan = FilestoreScan::scan(dir.path()).expect("scan failed");
    assert!(scan.is_empty());
}

#[test]
fn test_scan_dense_store() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, "000003");
    touch(&dir, "000004");
    touch(&dir, "000005");
    touch(&dir, ".wrlock");
    let scan = FilestoreScan::scan(dir.path()).expect("scan failed");
    assert_eq!(scan.first_filenum, 3);
    assert_eq!(scan.next_filenum, 6);
    assert_eq!(scan.minwidth, 6);
}

#[test]
fn test_scan_unpadded_store() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, "9");
    touch(&dir, "10");
    touch(&dir, "11");
    let scan = FilestoreScan::scan(dir.path()).expect("scan failed");
    assert_eq!(scan.first_filenum, 9);
    assert_eq!(scan.next_filenum, 12);
    assert_eq!(scan.minwidth, 1);
}

#[test]
fn test_scan_rejects_inconsistent_padding() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, "000001");
    touch(&dir, "0002");
    assert!(FilestoreScan::scan(dir.path()).is_err());
}

#[test]
fn test_scan_rejects_short_unpadded_name() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, "000001");
    touch(&dir, "23");
    assert!(FilestoreScan::scan(dir.path()).is_err());
}

#[test]
fn test_scan_rejects_invalid_name() {
    let dir = TempDir::new().expect("cannot create temp dir");
    touch(&dir, "000001");
    touch(&dir, "junk");
    assert!(FilestoreScan::scan(dir.path()).is_err());
}

#[test]
fn test_lockfile_is_exclusive() {
    let dir = TempDir::new().expect("cannot create temp dir");
    let path = dir.path().join(".wrlock");
    let lock = Lockfile::acquire(path.clone()).expect("acquire failed");
    assert!(path.exists());

    // Dropping the lock releases it and removes the file.
    drop(lock);
    assert!(!path.exists());
    let _lock = Lockfile::acquire(path).expect("reacquire failed");
}
