use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use log::*;

use rezip::{
    AccessMode, Archive, CompressionMethod, Entry, EntryOptions, EntryType, Progress, ZipError,
    ZipResult,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A provider serving chunks out of a byte slice.
fn provider_for(data: &[u8]) -> impl FnMut(u64, usize) -> ZipResult<Vec<u8>> + '_ {
    move |position, want| {
        let start = position as usize;
        Ok(data[start..start + want].to_vec())
    }
}

fn add_file(
    archive: &mut Archive,
    name: &str,
    data: &[u8],
    options: &EntryOptions,
) -> Result<()> {
    archive.add_entry(
        name,
        EntryType::File,
        data.len() as u64,
        options,
        None,
        provider_for(data),
    )?;
    Ok(())
}

fn extract_bytes(archive: &mut Archive, name: &str) -> Result<(Vec<u8>, u32)> {
    let entry = archive
        .entry(name)?
        .unwrap_or_else(|| panic!("no entry named {name}"));
    let mut contents = Vec::new();
    let crc32 = archive.extract(&entry, None, |chunk| {
        contents.extend_from_slice(chunk);
        Ok(())
    })?;
    Ok((contents, crc32))
}

fn collect_entries(archive: &mut Archive) -> Result<Vec<Entry>> {
    Ok(archive.entries()?.collect::<ZipResult<Vec<_>>>()?)
}

#[test]
fn utf8_filename_round_trips() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("a.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "héllo.txt", b"abc", &EntryOptions::default())?;
    drop(archive);

    let mut archive = Archive::open(&path, AccessMode::Read)?;
    let entries = collect_entries(&mut archive)?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path(), "héllo.txt");

    let (contents, crc32) = extract_bytes(&mut archive, "héllo.txt")?;
    assert_eq!(contents, [0x61, 0x62, 0x63]);
    assert_eq!(crc32, 0x352441c2);
    assert_eq!(entries[0].crc32(), 0x352441c2);

    // The entry starts the file, so the UTF-8 flag (bit 11) is right
    // there in its local header.
    let bytes = fs::read(&path)?;
    let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
    assert_ne!(flags & (1 << 11), 0);
    Ok(())
}

#[test]
fn store_round_trips() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "x", b"1234567890", &EntryOptions::default())?;

    let entries = collect_entries(&mut archive)?;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.compression_method(), CompressionMethod::Store);
    assert_eq!(entry.compressed_size(), 10);
    assert_eq!(entry.uncompressed_size(), 10);
    assert_eq!(entry.crc32(), 0x261daee5);

    let (contents, crc32) = extract_bytes(&mut archive, "x")?;
    assert_eq!(contents, b"1234567890");
    assert_eq!(crc32, 0x261daee5);
    Ok(())
}

#[test]
fn deflate_round_trips_a_mebibyte_of_zeros() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("big.zip");
    const SIZE: u64 = 1 << 20;

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    let options = EntryOptions::default().compression_method(CompressionMethod::Deflate);
    archive.add_entry("big", EntryType::File, SIZE, &options, None, |_, want| {
        Ok(vec![0u8; want])
    })?;

    let entries = collect_entries(&mut archive)?;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.compression_method(), CompressionMethod::Deflate);
    assert_eq!(entry.uncompressed_size(), SIZE);
    assert!(entry.compressed_size() < SIZE / 100);
    info!(
        "1 MiB of zeros deflated to {} bytes",
        entry.compressed_size()
    );

    let (contents, crc32) = extract_bytes(&mut archive, "big")?;
    assert_eq!(contents.len() as u64, SIZE);
    assert!(contents.iter().all(|&b| b == 0));
    // The recorded checksum covers the *uncompressed* bytes.
    assert_eq!(crc32, entry.crc32());
    Ok(())
}

#[test]
fn removing_the_middle_entry_keeps_its_neighbors() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trio.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "a", b"A", &EntryOptions::default())?;
    add_file(&mut archive, "b", b"B", &EntryOptions::default())?;
    add_file(&mut archive, "c", b"C", &EntryOptions::default())?;

    let doomed = archive.entry("b")?.expect("b was just added");
    archive.remove(&doomed, None)?;

    assert_eq!(archive.len(), 2);
    let paths: Vec<String> = collect_entries(&mut archive)?
        .iter()
        .map(Entry::path)
        .collect();
    assert_eq!(paths, ["a", "c"]);
    assert!(archive.entry("b")?.is_none());

    assert_eq!(extract_bytes(&mut archive, "a")?.0, b"A");
    assert_eq!(extract_bytes(&mut archive, "c")?.0, b"C");
    Ok(())
}

#[test]
fn removal_preserves_survivor_payloads_exactly() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("survivors.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    let deflated = EntryOptions::default().compression_method(CompressionMethod::Deflate);
    add_file(&mut archive, "first", &[0xa5; 40_000], &deflated)?;
    add_file(&mut archive, "victim", b"short-lived", &EntryOptions::default())?;
    add_file(&mut archive, "last", b"tail data", &EntryOptions::default())?;

    let before_first = extract_bytes(&mut archive, "first")?;
    let before_last = extract_bytes(&mut archive, "last")?;

    let victim = archive.entry("victim")?.expect("victim was just added");
    archive.remove(&victim, None)?;

    assert_eq!(extract_bytes(&mut archive, "first")?, before_first);
    assert_eq!(extract_bytes(&mut archive, "last")?, before_last);
    Ok(())
}

#[test]
fn directory_entries_get_a_trailing_slash_and_directory_mode() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dirs.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    let mut calls = 0;
    archive.add_entry(
        "dir",
        EntryType::Directory,
        0,
        &EntryOptions::default(),
        None,
        |position, want| {
            calls += 1;
            assert_eq!((position, want), (0, 0));
            Ok(Vec::new())
        },
    )?;
    assert_eq!(calls, 1, "directory providers finalize exactly once");

    let entries = collect_entries(&mut archive)?;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.path(), "dir/");
    assert_eq!(entry.entry_type(), EntryType::Directory);
    assert_eq!(entry.uncompressed_size(), 0);
    assert_eq!(entry.unix_mode(), Some(0o040755));
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinks_round_trip_to_the_filesystem() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("links.zip");

    let target = b"target.txt";
    let mut archive = Archive::open(&path, AccessMode::Create)?;
    archive.add_entry(
        "lnk",
        EntryType::Symlink,
        target.len() as u64,
        &EntryOptions::default(),
        None,
        provider_for(target),
    )?;

    let entry = archive.entry("lnk")?.expect("lnk was just added");
    assert_eq!(entry.entry_type(), EntryType::Symlink);
    assert_eq!(entry.unix_mode(), Some(0o120644));

    let destination = dir.path().join("restored");
    archive.extract_to_path(&entry, &destination, None)?;
    assert!(fs::symlink_metadata(&destination)?.file_type().is_symlink());
    assert_eq!(fs::read_link(&destination)?, PathBuf::from("target.txt"));
    Ok(())
}

#[test]
fn entry_count_tracks_adds_and_removes() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("counts.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    for i in 0..5 {
        add_file(
            &mut archive,
            &format!("file-{i}"),
            format!("contents {i}").as_bytes(),
            &EntryOptions::default(),
        )?;
    }
    for name in ["file-1", "file-3"] {
        let entry = archive.entry(name)?.expect("entry exists");
        archive.remove(&entry, None)?;
    }

    assert_eq!(archive.len(), 3);
    assert_eq!(collect_entries(&mut archive)?.len(), 3);

    // And removal down to empty leaves a working archive.
    for name in ["file-0", "file-2", "file-4"] {
        let entry = archive.entry(name)?.expect("entry exists");
        archive.remove(&entry, None)?;
    }
    assert!(archive.is_empty());
    assert_eq!(collect_entries(&mut archive)?.len(), 0);
    add_file(&mut archive, "rebirth", b"!", &EntryOptions::default())?;
    assert_eq!(archive.len(), 1);
    Ok(())
}

#[test]
fn appends_work_across_reopens_in_update_mode() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "one", b"first session", &EntryOptions::default())?;
    drop(archive);

    let mut archive = Archive::open(&path, AccessMode::Update)?;
    add_file(&mut archive, "two", b"second session", &EntryOptions::default())?;

    assert_eq!(extract_bytes(&mut archive, "one")?.0, b"first session");
    assert_eq!(extract_bytes(&mut archive, "two")?.0, b"second session");
    Ok(())
}

#[test]
fn duplicate_paths_resolve_to_the_first_entry() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dupes.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "dup", b"older", &EntryOptions::default())?;
    add_file(&mut archive, "dup", b"newer", &EntryOptions::default())?;

    assert_eq!(archive.len(), 2);
    assert_eq!(extract_bytes(&mut archive, "dup")?.0, b"older");
    Ok(())
}

#[test]
fn modification_times_survive_at_two_second_resolution() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("times.zip");

    let when = NaiveDate::from_ymd_opt(2001, 2, 3)
        .unwrap()
        .and_hms_opt(4, 5, 6)
        .unwrap();
    let mut archive = Archive::open(&path, AccessMode::Create)?;
    let options = EntryOptions::default().last_modified(when);
    add_file(&mut archive, "dated", b"data", &options)?;

    let entry = archive.entry("dated")?.expect("dated was just added");
    assert_eq!(entry.last_modified(), when);
    Ok(())
}

#[test]
fn cancelled_appends_leave_the_archive_byte_identical() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cancel.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "keep", b"precious", &EntryOptions::default())?;
    let pristine = fs::read(&path)?;

    let progress = Progress::new();
    let data = vec![0x5au8; rezip::CHUNK_SIZE * 3];
    let mut chunks = 0;
    let result = archive.add_entry(
        "doomed",
        EntryType::File,
        data.len() as u64,
        &EntryOptions::default(),
        Some(&progress),
        |position, want| {
            chunks += 1;
            if chunks == 2 {
                progress.cancel();
            }
            let start = position as usize;
            Ok(data[start..start + want].to_vec())
        },
    );
    assert!(matches!(result, Err(ZipError::Cancelled)));

    assert_eq!(fs::read(&path)?, pristine);
    assert_eq!(archive.len(), 1);
    assert_eq!(extract_bytes(&mut archive, "keep")?.0, b"precious");
    Ok(())
}

#[test]
fn cancelled_removals_leave_the_original_untouched() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cancel-remove.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "a", b"alpha", &EntryOptions::default())?;
    add_file(&mut archive, "b", b"beta", &EntryOptions::default())?;
    let pristine = fs::read(&path)?;

    let progress = Progress::new();
    progress.cancel();
    let entry = archive.entry("b")?.expect("b was just added");
    let result = archive.remove(&entry, Some(&progress));
    assert!(matches!(result, Err(ZipError::Cancelled)));

    assert_eq!(fs::read(&path)?, pristine);
    assert_eq!(archive.len(), 2);
    Ok(())
}

#[test]
fn progress_counts_fill_to_their_totals() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("progress.zip");

    let data = vec![1u8; rezip::CHUNK_SIZE + 123];
    let mut archive = Archive::open(&path, AccessMode::Create)?;
    let progress = Progress::new();
    archive.add_entry(
        "counted",
        EntryType::File,
        data.len() as u64,
        &EntryOptions::default(),
        Some(&progress),
        provider_for(&data),
    )?;
    assert_eq!(progress.total_unit_count(), data.len() as i64);
    assert_eq!(progress.completed_unit_count(), data.len() as i64);

    let entry = archive.entry("counted")?.expect("counted was just added");
    let progress = Progress::new();
    archive.extract(&entry, Some(&progress), |_| Ok(()))?;
    assert_eq!(progress.completed_unit_count(), data.len() as i64);
    assert!((progress.fraction_completed() - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn creating_over_an_existing_file_is_refused() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("already-there.zip");
    fs::write(&path, b"occupied")?;

    match Archive::open(&path, AccessMode::Create) {
        Err(ZipError::FileNotAccessible(p)) => assert_eq!(p, path),
        other => panic!("expected FileNotAccessible, got {other:?}"),
    }
    Ok(())
}

#[test]
fn opening_a_missing_archive_is_refused() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("no-such.zip");

    for mode in [AccessMode::Read, AccessMode::Update] {
        match Archive::open(&path, mode) {
            Err(ZipError::FileNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn mutating_a_read_mode_archive_is_refused() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("readonly.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "x", b"data", &EntryOptions::default())?;
    drop(archive);

    let mut archive = Archive::open(&path, AccessMode::Read)?;
    let entry = archive.entry("x")?.expect("x exists");

    let add = add_file(&mut archive, "y", b"more", &EntryOptions::default());
    assert!(matches!(
        add.unwrap_err().downcast::<ZipError>()?,
        ZipError::FileNotAccessible(_)
    ));
    assert!(matches!(
        archive.remove(&entry, None),
        Err(ZipError::FileNotAccessible(_))
    ));
    Ok(())
}

#[test]
fn garbage_files_fail_with_invalid_format() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("garbage.bin");
    fs::write(&path, vec![0x42; 4096])?;

    assert!(matches!(
        Archive::open(&path, AccessMode::Read),
        Err(ZipError::InvalidFormat(_))
    ));
    Ok(())
}

#[test]
fn foreign_compression_methods_are_refused_at_extraction() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bzip.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "x", b"1234567890", &EntryOptions::default())?;
    drop(archive);

    // Rewrite the method fields (bzip2 is 12): the entry's local
    // header leads the file, and its central record leads the
    // directory, whose offset the EOCD trailer gives us.
    let mut bytes = fs::read(&path)?;
    let eocd = bytes.len() - 22;
    let directory = u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;
    bytes[8..10].copy_from_slice(&12u16.to_le_bytes());
    bytes[directory + 10..directory + 12].copy_from_slice(&12u16.to_le_bytes());
    fs::write(&path, bytes)?;

    let mut archive = Archive::open(&path, AccessMode::Read)?;
    let entry = archive.entry("x")?.expect("x exists");
    assert_eq!(entry.compression_method(), CompressionMethod::Unsupported(12));
    match archive.extract(&entry, None, |_| Ok(())) {
        Err(ZipError::InvalidArchiveLevel(12)) => {}
        other => panic!("expected InvalidArchiveLevel, got {other:?}"),
    }
    Ok(())
}

#[test]
fn trailing_comments_are_located_and_preserved() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("commented.zip");

    let comment = b"packed by rezip's test suite";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PK\x05\x06");
    bytes.extend_from_slice(&[0; 16]);
    bytes.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    bytes.extend_from_slice(comment);
    fs::write(&path, &bytes)?;

    let mut archive = Archive::open(&path, AccessMode::Update)?;
    assert!(archive.is_empty());
    assert_eq!(archive.comment(), comment);

    // Mutations keep the comment on the rewritten trailer.
    add_file(&mut archive, "x", b"data", &EntryOptions::default())?;
    drop(archive);
    let mut archive = Archive::open(&path, AccessMode::Read)?;
    assert_eq!(archive.comment(), comment);
    assert_eq!(extract_bytes(&mut archive, "x")?.0, b"data");
    Ok(())
}

/// A hand-assembled single-entry archive whose sizes and CRC live in a
/// data descriptor (general purpose bit 3), as streaming writers
/// produce them.
fn descriptor_archive() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PK\x03\x04");
    bytes.extend_from_slice(&20u16.to_le_bytes()); // version needed
    bytes.extend_from_slice(&0x0008u16.to_le_bytes()); // flags: bit 3
    bytes.extend_from_slice(&0u16.to_le_bytes()); // method: store
    bytes.extend_from_slice(&0u16.to_le_bytes()); // mod time
    bytes.extend_from_slice(&0x21u16.to_le_bytes()); // mod date: 1980-01-01
    bytes.extend_from_slice(&[0; 12]); // crc + sizes deferred
    bytes.extend_from_slice(&1u16.to_le_bytes()); // name length
    bytes.extend_from_slice(&0u16.to_le_bytes()); // extra length
    bytes.push(b'd');

    bytes.extend_from_slice(b"abc");

    bytes.extend_from_slice(b"PK\x07\x08");
    bytes.extend_from_slice(&0x352441c2u32.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes());

    let directory_offset = bytes.len() as u32;
    bytes.extend_from_slice(b"PK\x01\x02");
    bytes.extend_from_slice(&20u16.to_le_bytes()); // version made by (DOS)
    bytes.extend_from_slice(&20u16.to_le_bytes()); // version needed
    bytes.extend_from_slice(&0x0008u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes()); // method
    bytes.extend_from_slice(&0u16.to_le_bytes()); // mod time
    bytes.extend_from_slice(&0x21u16.to_le_bytes()); // mod date
    bytes.extend_from_slice(&0x352441c2u32.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes()); // compressed
    bytes.extend_from_slice(&3u32.to_le_bytes()); // uncompressed
    bytes.extend_from_slice(&1u16.to_le_bytes()); // name length
    bytes.extend_from_slice(&[0; 12]); // extra/comment/disk/internal/external
    bytes.extend_from_slice(&0u32.to_le_bytes()); // local header offset
    bytes.push(b'd');
    let directory_size = bytes.len() as u32 - directory_offset;

    bytes.extend_from_slice(b"PK\x05\x06");
    bytes.extend_from_slice(&[0; 4]);
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&directory_size.to_le_bytes());
    bytes.extend_from_slice(&directory_offset.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes
}

#[test]
fn data_descriptor_entries_read_back() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("descriptor.zip");
    fs::write(&path, descriptor_archive())?;

    let mut archive = Archive::open(&path, AccessMode::Read)?;
    let entries = collect_entries(&mut archive)?;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.path(), "d");
    assert_eq!(entry.uncompressed_size(), 3);

    let (contents, crc32) = extract_bytes(&mut archive, "d")?;
    assert_eq!(contents, b"abc");
    assert_eq!(crc32, 0x352441c2);
    Ok(())
}

#[test]
fn readers_validate_the_recorded_checksum() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("checksummed.zip");

    let mut archive = Archive::open(&path, AccessMode::Create)?;
    add_file(&mut archive, "x", b"1234567890", &EntryOptions::default())?;
    let entry = archive.entry("x")?.expect("x was just added");

    let mut contents = String::new();
    archive.reader(&entry)?.read_to_string(&mut contents)?;
    assert_eq!(contents, "1234567890");
    drop(archive);

    // Flip one payload byte; the read reaching EOF now fails.
    let mut bytes = fs::read(&path)?;
    bytes[31] ^= 0xff;
    fs::write(&path, bytes)?;

    let mut archive = Archive::open(&path, AccessMode::Read)?;
    let entry = archive.entry("x")?.expect("x exists");
    let mut sink = Vec::new();
    let err = archive.reader(&entry)?.read_to_end(&mut sink).unwrap_err();
    assert!(err.to_string().contains("Invalid checksum"));
    Ok(())
}

#[test]
fn extraction_to_path_materializes_files_and_directories() -> Result<()> {
    init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tree.zip");

    let when = NaiveDate::from_ymd_opt(2010, 6, 15)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    let mut archive = Archive::open(&path, AccessMode::Create)?;
    archive.add_entry(
        "docs",
        EntryType::Directory,
        0,
        &EntryOptions::default(),
        None,
        |_, _| Ok(Vec::new()),
    )?;
    let options = EntryOptions::default().last_modified(when);
    add_file(&mut archive, "docs/readme.txt", b"read me", &options)?;

    let out = dir.path().join("out");
    let dir_entry = archive.entry("docs/")?.expect("docs/ was just added");
    archive.extract_to_path(&dir_entry, out.join("docs"), None)?;
    let file_entry = archive
        .entry("docs/readme.txt")?
        .expect("readme was just added");
    archive.extract_to_path(&file_entry, out.join("docs/readme.txt"), None)?;

    assert!(out.join("docs").is_dir());
    assert_eq!(fs::read(out.join("docs/readme.txt"))?, b"read me");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let dir_mode = fs::metadata(out.join("docs"))?.permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        let file_mode = fs::metadata(out.join("docs/readme.txt"))?.permissions().mode();
        assert_eq!(file_mode & 0o777, 0o644);
    }

    let expected = std::time::UNIX_EPOCH
        + std::time::Duration::from_secs(when.and_utc().timestamp() as u64);
    assert_eq!(fs::metadata(out.join("docs/readme.txt"))?.modified()?, expected);

    // Extracting over the fresh copy is refused.
    assert!(matches!(
        archive.extract_to_path(&file_entry, out.join("docs/readme.txt"), None),
        Err(ZipError::FileNotAccessible(_))
    ));
    Ok(())
}
