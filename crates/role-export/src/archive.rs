// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory zip archive of the successful exports.
//!
//! Entries are written in report order with Deflate compression and a
//! fixed timestamp, so building twice from the same report yields the same
//! bytes. Nothing here touches the filesystem.

use crate::error::ExportResult;
use crate::report::RunReport;
use chrono::{DateTime, TimeZone};
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::OnceLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build the archive for every success in the report.
///
/// A report without successes yields a valid, empty archive.
pub fn build(report: &RunReport) -> ExportResult<Vec<u8>> {
    build_entries(report.successes())
}

/// Build an archive from `(name, bytes)` pairs, renaming collisions.
pub fn build_entries<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> ExportResult<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = UniqueNames::default();

    for (name, bytes) in entries {
        let entry_name = names.claim(name);
        zip.start_file(entry_name, options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Hands out entry names, suffixing `_2`, `_3`, … before the extension on
/// collision. Comparison ignores ASCII case so extraction onto a
/// case-insensitive filesystem never overwrites.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_ascii_lowercase()) {
            return name.to_string();
        }

        let (stem, ext) = split_extension(name);
        let mut n = 2u32;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if self.taken.insert(candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// `("report", ".txt")` for `report.txt`; dotfiles and extensionless names
/// keep everything in the stem.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Replace anything outside `[A-Za-z0-9_. -]` with `_`, falling back to
/// `default` when nothing usable is left.
pub fn sanitize_filename(name: &str, default: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9_. -]+").expect("filename regex is valid")
    });

    let cleaned = re.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        default.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Download name for the archive: `<netloc>_roles_ou<org unit>[_<timestamp>].zip`.
pub fn archive_file_name<Tz: TimeZone>(
    netloc: &str,
    org_unit: u64,
    timestamp: Option<DateTime<Tz>>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let host = sanitize_filename(&netloc.replace(':', "_"), "export");
    let mut name = format!("{host}_roles_ou{org_unit}");
    if let Some(ts) = timestamp {
        name.push_str(&ts.format("_%Y%m%d_%H%M%S").to_string());
    }
    name.push_str(".zip");
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::RoleDescriptor;
    use crate::error::FailureKind;
    use crate::report::ExtractionOutcome;
    use std::io::Read;

    fn success(id: &str, name: &str, body: &[u8]) -> ExtractionOutcome {
        ExtractionOutcome::Success {
            role: RoleDescriptor::new(id, name),
            content_name: name.to_string(),
            content: body.to_vec(),
            attempts: 1,
        }
    }

    fn report(outcomes: Vec<ExtractionOutcome>) -> RunReport {
        RunReport {
            run_id: "run".into(),
            total_roles: outcomes.len(),
            outcomes,
            unprocessed: Vec::new(),
            cancelled: false,
            elapsed_ms: 0,
        }
    }

    fn read_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).unwrap();
                (file.name().to_string(), buf)
            })
            .collect()
    }

    #[test]
    fn test_only_successes_are_archived() {
        let r = report(vec![
            success("1", "A.txt", b"alpha"),
            ExtractionOutcome::Failure {
                role: RoleDescriptor::new("2", "B"),
                reason: FailureKind::EmptyDownload,
                attempts: 3,
            },
            success("3", "C.txt", b"gamma"),
        ]);
        let entries = read_entries(&build(&r).unwrap());
        assert_eq!(
            entries,
            vec![
                ("A.txt".to_string(), b"alpha".to_vec()),
                ("C.txt".to_string(), b"gamma".to_vec()),
            ]
        );
    }

    #[test]
    fn test_empty_report_gives_valid_empty_archive() {
        let bytes = build(&report(Vec::new())).unwrap();
        assert!(read_entries(&bytes).is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let r = report(vec![
            success("1", "A.txt", b"alpha"),
            success("2", "B.txt", b"beta"),
        ]);
        assert_eq!(build(&r).unwrap(), build(&r).unwrap());
    }

    #[test]
    fn test_colliding_names_are_all_recoverable() {
        let r = report(vec![
            success("1", "Role.txt", b"one"),
            success("2", "Role.txt", b"two"),
            success("3", "role.TXT", b"three"),
        ]);
        let entries = read_entries(&build(&r).unwrap());
        assert_eq!(
            entries,
            vec![
                ("Role.txt".to_string(), b"one".to_vec()),
                ("Role_2.txt".to_string(), b"two".to_vec()),
                ("role_3.TXT".to_string(), b"three".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unique_names_skip_taken_suffixes() {
        let mut names = UniqueNames::default();
        assert_eq!(names.claim("a_2.txt"), "a_2.txt");
        assert_eq!(names.claim("a.txt"), "a.txt");
        assert_eq!(names.claim("a.txt"), "a_3.txt");
        assert_eq!(names.claim("README"), "README");
        assert_eq!(names.claim("README"), "README_2");
        assert_eq!(names.claim(".hidden"), ".hidden");
        assert_eq!(names.claim(".hidden"), ".hidden_2");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Instructor / Lead", "x"), "Instructor _ Lead");
        assert_eq!(sanitize_filename("Évaluateur", "x"), "_valuateur");
        assert_eq!(sanitize_filename("  ", "role_7"), "role_7");
        assert_eq!(sanitize_filename("../..", "role_7"), "role_7");
        assert_eq!(sanitize_filename("***", "role_7"), "role_7");
    }

    #[test]
    fn test_archive_file_name() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            archive_file_name("lms.example.edu", 6606, Some(ts)),
            "lms.example.edu_roles_ou6606_20260304_050607.zip"
        );
        assert_eq!(
            archive_file_name::<chrono::Utc>("127.0.0.1:8080", 1, None),
            "127.0.0.1_8080_roles_ou1.zip"
        );
    }
}
