//! Process-descriptor file reader, implemented here so the simulator runs
//! end-to-end from a file path rather than needing a pre-parsed list handed
//! in. Format: one process per line, four whitespace-separated fields
//! `<arrival_time> <name> <service_time> <memory_size>`, pre-sorted by
//! non-decreasing arrival time.

use std::fs;
use std::path::Path;

use procman_process::Descriptor;

const MIN_MEMORY_SIZE: u16 = 1;
const MAX_MEMORY_SIZE: u16 = 2048;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to read descriptor file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected 4 fields `<arrival_time> <name> <service_time> <memory_size>`, found {found}")]
    WrongFieldCount { line: usize, found: usize },
    #[error("line {line}: invalid {field} value {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: memory_size {size} outside the valid range [{MIN_MEMORY_SIZE}, {MAX_MEMORY_SIZE}]")]
    MemorySizeOutOfRange { line: usize, size: u16 },
    #[error("line {line}: process name {name:?} is not unique across the run")]
    DuplicateName { line: usize, name: String },
    #[error("line {line}: arrival_time {arrival} is less than the previous line's {previous} (file must be non-decreasing by arrival time)")]
    ArrivalOutOfOrder {
        line: usize,
        arrival: u32,
        previous: u32,
    },
}

/// Parse a descriptor file into an arrival-ordered `Vec<Descriptor>`, the
/// precondition the cycle engine's admission phase assumes.
pub fn load(path: &Path) -> Result<Vec<Descriptor>, LoaderError> {
    let contents = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut descriptors = Vec::new();
    let mut seen_names = std::collections::HashSet::new();
    let mut previous_arrival: Option<u32> = None;

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(LoaderError::WrongFieldCount {
                line,
                found: fields.len(),
            });
        }

        let arrival_time = parse_field(line, "arrival_time", fields[0])?;
        let name = fields[1].to_string();
        let service_time = parse_field(line, "service_time", fields[2])?;
        let memory_size = parse_field(line, "memory_size", fields[3])?;

        if !(MIN_MEMORY_SIZE..=MAX_MEMORY_SIZE).contains(&memory_size) {
            return Err(LoaderError::MemorySizeOutOfRange {
                line,
                size: memory_size,
            });
        }
        if let Some(prev) = previous_arrival {
            if arrival_time < prev {
                return Err(LoaderError::ArrivalOutOfOrder {
                    line,
                    arrival: arrival_time,
                    previous: prev,
                });
            }
        }
        if !seen_names.insert(name.clone()) {
            return Err(LoaderError::DuplicateName { line, name });
        }
        previous_arrival = Some(arrival_time);

        descriptors.push(Descriptor {
            name,
            arrival_time,
            service_time,
            memory_size,
        });
    }

    Ok(descriptors)
}

fn parse_field<T>(line: usize, field: &'static str, raw: &str) -> Result<T, LoaderError>
where
    T: std::str::FromStr,
{
    raw.parse().map_err(|_| LoaderError::InvalidField {
        line,
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    struct TempFile(PathBuf);

    impl TempFile {
        fn new(contents: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!(
                "procman-loader-test-{}-{:p}",
                std::process::id(),
                contents
            ));
            std::fs::File::create(&path)
                .unwrap()
                .write_all(contents.as_bytes())
                .unwrap();
            TempFile(path)
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn parses_well_formed_file() {
        let f = TempFile::new("0 P1 6 100\n0 P2 3 100\n");
        let descs = load(&f.0).unwrap();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].name, "P1");
        assert_eq!(descs[1].service_time, 3);
    }

    #[test]
    fn skips_blank_lines() {
        let f = TempFile::new("0 P1 6 100\n\n   \n1 P2 3 100\n");
        let descs = load(&f.0).unwrap();
        assert_eq!(descs.len(), 2);
    }

    #[test]
    fn rejects_out_of_range_memory_size() {
        let f = TempFile::new("0 P1 6 4096\n");
        assert!(matches!(
            load(&f.0),
            Err(LoaderError::MemorySizeOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_decreasing_arrival_time() {
        let f = TempFile::new("5 P1 6 100\n2 P2 3 100\n");
        assert!(matches!(
            load(&f.0),
            Err(LoaderError::ArrivalOutOfOrder { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let f = TempFile::new("0 P1 6 100\n0 P1 3 100\n");
        assert!(matches!(load(&f.0), Err(LoaderError::DuplicateName { .. })));
    }

    #[test]
    fn rejects_wrong_field_count() {
        let f = TempFile::new("0 P1 6\n");
        assert!(matches!(
            load(&f.0),
            Err(LoaderError::WrongFieldCount { .. })
        ));
    }
}
