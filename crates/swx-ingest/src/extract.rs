//! Unpack a downloaded archive into the working directory
//!
//! Entries are written flat, by base file name, so no entry can land outside
//! the destination. An entry that is itself a `.zip` (the per-day archives
//! inside a folder download) is unpacked into `<dest>/<archive stem>/`; a
//! broken nested archive is reported and skipped.

use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::Result;

/// Nested archives deeper than this are skipped
const MAX_NESTING_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Directory the top-level entries were written to
    pub destination: PathBuf,
    /// Regular files written, nested archives included
    pub files: usize,
    /// Nested archives unpacked successfully
    pub nested_archives: usize,
}

/// Extract `archive` into `data_dir`, or `data_dir/<date>` for a single date
pub fn extract_archive(
    archive: &Path,
    data_dir: &Path,
    target_date: Option<NaiveDate>,
) -> Result<ExtractSummary> {
    let destination = match target_date {
        Some(date) => data_dir.join(date.format("%Y-%m-%d").to_string()),
        None => data_dir.to_path_buf(),
    };
    fs::create_dir_all(&destination)?;

    let mut summary = ExtractSummary {
        destination: destination.clone(),
        files: 0,
        nested_archives: 0,
    };

    let reader = ZipArchive::new(File::open(archive)?)?;
    extract_entries(reader, &destination, 0, &mut summary)?;

    info!(
        archive = %archive.display(),
        destination = %destination.display(),
        files = summary.files,
        nested = summary.nested_archives,
        "Archive extracted"
    );

    Ok(summary)
}

fn extract_entries<R: Read + Seek>(
    mut archive: ZipArchive<R>,
    destination: &Path,
    depth: usize,
    summary: &mut ExtractSummary,
) -> Result<()> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let Some(name) = base_name(entry.name()).map(str::to_string) else {
            debug!(entry = entry.name(), "Skipping entry without a usable file name");
            continue;
        };

        match name.strip_suffix(".zip") {
            Some(stem) if depth < MAX_NESTING_DEPTH => {
                // The declared size comes from the archive; let the buffer grow
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents)?;

                let nested_destination = destination.join(stem);
                match extract_nested(contents, &nested_destination, depth + 1, summary) {
                    Ok(()) => summary.nested_archives += 1,
                    Err(e) => warn!(archive = %name, error = %e, "Failed to extract nested archive"),
                }
            },
            Some(_) => warn!(archive = %name, "Nested archive too deep, skipping"),
            None => {
                let mut file = File::create(destination.join(&name))?;
                io::copy(&mut entry, &mut file)?;
                summary.files += 1;
            },
        }
    }

    Ok(())
}

fn extract_nested(
    bytes: Vec<u8>,
    destination: &Path,
    depth: usize,
    summary: &mut ExtractSummary,
) -> Result<()> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(destination)?;
    extract_entries(archive, destination, depth, summary)
}

/// Last path component of an entry name, `None` for `.`/`..`/empty
fn base_name(entry_name: &str) -> Option<&str> {
    entry_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            for (name, contents) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(contents).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn write_archive(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("download.zip");
        fs::write(&path, zip_bytes(entries)).unwrap();
        path
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("inzynierka/2024-06-01/a.csv"), Some("a.csv"));
        assert_eq!(base_name("..\\..\\evil.csv"), Some("evil.csv"));
        assert_eq!(base_name("folder/"), None);
        assert_eq!(base_name(".."), None);
    }

    #[test]
    fn test_single_date_archive_goes_to_date_directory() {
        let tmp = TempDir::new().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                ("2024-06-01/boulder_k_index_1m_2024-06-01.csv", b"time_tag,k_index\n"),
                ("../../escape.csv", b"x"),
            ],
        );
        let data_dir = tmp.path().join("data");
        let date = NaiveDate::from_ymd_opt(2024, 6, 1);

        let summary = extract_archive(&archive, &data_dir, date).unwrap();

        let day = data_dir.join("2024-06-01");
        assert_eq!(summary.destination, day);
        assert_eq!(summary.files, 2);
        assert!(day.join("boulder_k_index_1m_2024-06-01.csv").is_file());
        assert!(day.join("escape.csv").is_file());
        assert!(!tmp.path().join("escape.csv").exists());
    }

    #[test]
    fn test_nested_day_archives() {
        let tmp = TempDir::new().unwrap();
        let day_one = zip_bytes(&[("boulder_k_index_1m_2024-06-01.csv", b"time_tag,k_index\n")]);
        let day_two = zip_bytes(&[("solar_regions_2024-06-02.csv", b"observed_date\n")]);
        let archive = write_archive(
            tmp.path(),
            &[
                ("inzynierka/2024-06-01.zip", &day_one),
                ("inzynierka/2024-06-02.zip", &day_two),
                ("inzynierka/broken.zip", b"not a zip"),
            ],
        );
        let data_dir = tmp.path().join("data");

        let summary = extract_archive(&archive, &data_dir, None).unwrap();

        assert_eq!(summary.nested_archives, 2);
        assert_eq!(summary.files, 2);
        assert!(data_dir.join("2024-06-01/boulder_k_index_1m_2024-06-01.csv").is_file());
        assert!(data_dir.join("2024-06-02/solar_regions_2024-06-02.csv").is_file());
        assert!(!data_dir.join("broken.zip").exists());
    }

    #[test]
    fn test_large_entry_is_copied_intact() {
        let tmp = TempDir::new().unwrap();
        let row = b"2024-06-01 00:00:00.000,5.1,1.2,-3.4,2.2,25.5,289.4,1.2,-3.0,2.8,33.1,291.0\n";
        let body: Vec<u8> = row.iter().copied().cycle().take(row.len() * 50_000).collect();

        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            zip.start_file("dscovr_mag_1s_2024-06-01.csv", options).unwrap();
            zip.write_all(&body).unwrap();
            zip.start_file("2024-06-02.zip", SimpleFileOptions::default()).unwrap();
            zip.write_all(&zip_bytes(&[("solar_regions_2024-06-02.csv", b"observed_date\n")]))
                .unwrap();
            zip.finish().unwrap();
        }
        let archive = tmp.path().join("download.zip");
        fs::write(&archive, buf.into_inner()).unwrap();
        let data_dir = tmp.path().join("data");

        let summary = extract_archive(&archive, &data_dir, None).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.nested_archives, 1);
        assert_eq!(fs::read(data_dir.join("dscovr_mag_1s_2024-06-01.csv")).unwrap(), body);
        assert!(data_dir.join("2024-06-02/solar_regions_2024-06-02.csv").is_file());
        assert!(!data_dir.join("2024-06-02.zip").exists());
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.zip");
        fs::write(&path, b"plain text").unwrap();
        assert!(extract_archive(&path, &tmp.path().join("data"), None).is_err());
    }
}
