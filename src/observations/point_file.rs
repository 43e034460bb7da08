//! # Binary observation files
//!
//! One file holds one measurement group as a headerless sequence of fixed-size
//! records. Each record is four 8-byte IEEE-754 doubles in order
//! `x, y, z, w`, little-endian, 32 bytes total. The layout is reproduced
//! bit-exactly for interoperability with existing survey datasets.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::constants::RECORD_SIZE;
use crate::observations::{Observation, ObservationSource};
use crate::triaxial_errors::TriaxialError;

/// A buffered reader over one group's binary observation file.
///
/// Satisfies the [`ObservationSource`] rewind-and-rescan contract by seeking
/// back to the start of the file; every adjustment pass re-reads the records
/// from disk.
#[derive(Debug)]
pub struct PointFile {
    path: Utf8PathBuf,
    reader: BufReader<File>,
}

impl PointFile {
    /// Open an observation file for reading.
    ///
    /// Arguments
    /// -----------------
    /// * `path`: Path of the binary observation file.
    ///
    /// Return
    /// ----------
    /// * A [`PointFile`] positioned at the first record, or
    ///   [`TriaxialError::FileUnavailable`] naming the path that could not be
    ///   opened (fatal in the driver: the run aborts before any computation).
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, TriaxialError> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|source| TriaxialError::FileUnavailable {
            path: path.clone(),
            source,
        })?;
        Ok(PointFile {
            path,
            reader: BufReader::new(file),
        })
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl ObservationSource for PointFile {
    fn next_observation(&mut self) -> Result<Option<Observation>, TriaxialError> {
        let mut record = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            let n = self.reader.read(&mut record[filled..])?;
            if n == 0 {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(TriaxialError::TruncatedRecord)
                };
            }
            filled += n;
        }

        let field = |i: usize| {
            f64::from_le_bytes(record[i * 8..(i + 1) * 8].try_into().expect("8-byte slice"))
        };
        Ok(Some(Observation {
            x: field(0),
            y: field(1),
            z: field(2),
            weight: field(3),
        }))
    }

    fn rewind(&mut self) -> Result<(), TriaxialError> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// Write a group of observations as a binary point file.
///
/// The inverse of [`PointFile`]: emits the exact 32-byte little-endian record
/// layout, no header. Overwrites `path` if it exists.
pub fn write_observations(
    path: impl AsRef<Utf8Path>,
    observations: &[Observation],
) -> Result<(), TriaxialError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for obs in observations {
        writer.write_all(&obs.x.to_le_bytes())?;
        writer.write_all(&obs.y.to_le_bytes())?;
        writer.write_all(&obs.z.to_le_bytes())?;
        writer.write_all(&obs.weight.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod point_file_tests {
    use super::*;

    fn temp_path(name: &str) -> Utf8PathBuf {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("triaxial-{}-{}", std::process::id(), name));
        Utf8PathBuf::from_path_buf(path).expect("temp dir is valid UTF-8")
    }

    #[test]
    fn test_binary_round_trip_is_bit_exact() {
        let path = temp_path("roundtrip.bin");
        let points = vec![
            Observation::new(1.5, -2.25, 1e-300, 1.0),
            Observation::new(f64::MIN_POSITIVE, 12345.6789, -0.0, 0.5),
        ];
        write_observations(&path, &points).unwrap();

        let mut file = PointFile::open(&path).unwrap();
        let mut read_back = Vec::new();
        while let Some(p) = file.next_observation().unwrap() {
            read_back.push(p);
        }
        assert_eq!(read_back.len(), points.len());
        for (a, b) in points.iter().zip(&read_back) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.z.to_bits(), b.z.to_bits());
            assert_eq!(a.weight.to_bits(), b.weight.to_bits());
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rewind_rereads_from_start() {
        let path = temp_path("rewind.bin");
        let points = vec![
            Observation::new(1.0, 2.0, 3.0, 1.0),
            Observation::new(4.0, 5.0, 6.0, 1.0),
        ];
        write_observations(&path, &points).unwrap();

        let mut file = PointFile::open(&path).unwrap();
        assert_eq!(file.next_observation().unwrap(), Some(points[0]));
        assert_eq!(file.next_observation().unwrap(), Some(points[1]));
        assert_eq!(file.next_observation().unwrap(), None);

        file.rewind().unwrap();
        assert_eq!(file.next_observation().unwrap(), Some(points[0]));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let path = temp_path("truncated.bin");
        write_observations(&path, &[Observation::new(1.0, 2.0, 3.0, 1.0)]).unwrap();
        // Chop the last record short.
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..RECORD_SIZE - 5]).unwrap();

        let mut file = PointFile::open(&path).unwrap();
        match file.next_observation() {
            Err(TriaxialError::TruncatedRecord) => {}
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Utf8PathBuf::from("/definitely/not/here.bin");
        match PointFile::open(&path) {
            Err(TriaxialError::FileUnavailable { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected FileUnavailable, got {other:?}"),
        }
    }
}
