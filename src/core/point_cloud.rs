// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading of binary point clouds captured by the ToF sensor.
//!
//! The file starts with an ASCII header terminated by an `end_header` line.
//! It is followed by one fixed size record per pixel, in row-major order:
//! three little-endian `f32` for the position and three `u8` for the color.
//! Only the `z` coordinate is used.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::core::error::{Error, Result};
use crate::misc::helper;

/// Line closing the header.
pub const END_HEADER: &str = "end_header";

/// Size in bytes of one record: x, y, z (f32) then r, g, b (u8).
pub const RECORD_SIZE: usize = 3 * 4 + 3;

/// Depth sample of one pixel.
/// `row` and `col` are 1-based.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PointSample {
    pub row: usize,
    pub col: usize,
    pub z: f32,
}

impl PointSample {
    /// Sample of the record at the 0-based index `index`, for a sensor of width `width`.
    pub fn from_index(index: usize, width: usize, z: f32) -> Self {
        let (row, col) = helper::div_rem(index, width);
        PointSample {
            row: row + 1,
            col: col + 1,
            z,
        }
    }
}

/// Information gathered while skipping the header.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Header {
    /// Content of the `format` line, e.g. `binary_little_endian`.
    pub format: Option<String>,
    /// Number of records announced by the `element vertex` line.
    pub vertex_count: Option<usize>,
    /// Byte offset of the first record.
    pub data_offset: u64,
}

/// Consume the header, up to and including the `end_header` line.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<Header> {
    let mut header = Header::default();
    let mut line = Vec::new();
    loop {
        line.clear();
        let nb_bytes = reader.read_until(b'\n', &mut line)?;
        if nb_bytes == 0 {
            return Err(Error::Format {
                offset: header.data_offset,
                record: None,
                reason: format!("no `{}` line before end of stream", END_HEADER),
            });
        }
        header.data_offset += nb_bytes as u64;
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text == END_HEADER {
            return Ok(header);
        }
        let mut words = text.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("format"), Some(format), _) => header.format = Some(format.to_string()),
            (Some("element"), Some("vertex"), Some(count)) => {
                header.vertex_count = count.parse().ok();
            }
            _ => (),
        }
    }
}

/// Read the records following the header.
///
/// Reading stops when the stream is exhausted, when `max_records` records were read,
/// or at a partial trailing record which is silently dropped.
pub fn read_samples<R: Read>(
    reader: &mut R,
    width: usize,
    max_records: Option<usize>,
    data_offset: u64,
) -> Result<Vec<PointSample>> {
    if width == 0 {
        return Err(Error::Dimension {
            expected: "a sensor width > 0".to_string(),
            found: "0".to_string(),
        });
    }
    let max_records = max_records.unwrap_or(usize::MAX);
    let mut samples = Vec::with_capacity(max_records.min(1 << 20));
    let mut record = [0_u8; RECORD_SIZE];
    while samples.len() < max_records {
        let index = samples.len();
        let nb_bytes = fill_record(reader, &mut record).map_err(|e| Error::Format {
            offset: data_offset + (index * RECORD_SIZE) as u64,
            record: Some(index),
            reason: e.to_string(),
        })?;
        if nb_bytes < RECORD_SIZE {
            if nb_bytes > 0 {
                log::debug!(
                    "Dropping partial record {} ({} of {} bytes)",
                    index,
                    nb_bytes,
                    RECORD_SIZE
                );
            }
            break;
        }
        let z = LittleEndian::read_f32(&record[8..12]);
        samples.push(PointSample::from_index(index, width, z));
    }
    Ok(samples)
}

/// Read a whole point cloud: header then records.
pub fn read<R: BufRead>(
    mut reader: R,
    width: usize,
    max_records: Option<usize>,
) -> Result<(Header, Vec<PointSample>)> {
    let header = read_header(&mut reader)?;
    if let Some(format) = &header.format {
        if format != "binary_little_endian" {
            log::warn!("Point cloud format is {}, reading it as little endian", format);
        }
    }
    let samples = read_samples(&mut reader, width, max_records, header.data_offset)?;
    if let Some(count) = header.vertex_count {
        if count != samples.len() {
            log::warn!(
                "Header announces {} vertices but {} records were read",
                count,
                samples.len()
            );
        }
    }
    Ok((header, samples))
}

/// Open and read a point cloud file.
pub fn read_file<P: AsRef<Path>>(
    file_path: P,
    width: usize,
    max_records: Option<usize>,
) -> Result<(Header, Vec<PointSample>)> {
    let file = File::open(file_path)?;
    read(BufReader::new(file), width, max_records)
}

/// Write positions in the same binary layout, with a black color.
pub fn write<W: Write>(writer: &mut W, positions: &[[f32; 3]]) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "element vertex {}", positions.len())?;
    for axis in &["x", "y", "z"] {
        writeln!(writer, "property float {}", axis)?;
    }
    for channel in &["red", "green", "blue"] {
        writeln!(writer, "property uchar {}", channel)?;
    }
    writeln!(writer, "{}", END_HEADER)?;
    for p in positions {
        for coord in p {
            writer.write_f32::<LittleEndian>(*coord)?;
        }
        writer.write_all(&[0, 0, 0])?;
    }
    Ok(())
}

/// Read as many bytes as possible into `buf`, returning how many were read.
/// Unlike `read_exact`, a short count at the end of the stream is not an error.
fn fill_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use quickcheck_macros;
    use std::io::Cursor;

    fn cloud_bytes(positions: &[[f32; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        write(&mut bytes, positions).unwrap();
        bytes
    }

    #[test]
    fn reads_header_fields() {
        let bytes = cloud_bytes(&[[1.0, 2.0, 3.0]]);
        let mut cursor = Cursor::new(bytes.clone());
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.format.as_deref(), Some("binary_little_endian"));
        assert_eq!(header.vertex_count, Some(1));
        assert_eq!(header.data_offset as usize, bytes.len() - RECORD_SIZE);
    }

    #[test]
    fn keeps_only_z() {
        let bytes = cloud_bytes(&[[1.0, 2.0, -850.5], [4.0, 5.0, 0.0], [7.0, 8.0, -900.0]]);
        let (_, samples) = read(Cursor::new(bytes), 2, None).unwrap();
        assert_eq!(
            samples,
            vec![
                PointSample { row: 1, col: 1, z: -850.5 },
                PointSample { row: 1, col: 2, z: 0.0 },
                PointSample { row: 2, col: 1, z: -900.0 },
            ]
        );
    }

    #[test]
    fn missing_end_header_is_a_format_error() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 3\n".to_vec();
        match read(Cursor::new(bytes), 4, None) {
            Err(Error::Format { offset, record, .. }) => {
                assert_eq!(offset, 53);
                assert_eq!(record, None);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn partial_trailing_record_is_dropped() {
        let mut bytes = cloud_bytes(&[[0.0, 0.0, 1.0], [0.0, 0.0, 2.0]]);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        let (_, samples) = read(Cursor::new(bytes), 2, None).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn stops_at_max_records() {
        let bytes = cloud_bytes(&[[0.0, 0.0, 1.0]; 10]);
        let (_, samples) = read(Cursor::new(bytes), 3, Some(6)).unwrap();
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[5], PointSample { row: 2, col: 3, z: 1.0 });
    }

    #[test]
    fn zero_width_is_rejected() {
        let bytes = cloud_bytes(&[[0.0, 0.0, 1.0]]);
        assert!(matches!(
            read(Cursor::new(bytes), 0, None),
            Err(Error::Dimension { .. })
        ));
    }

    #[test]
    fn header_line_with_crlf_is_accepted() {
        let mut bytes = b"ply\r\nend_header\r\n".to_vec();
        bytes.extend_from_slice(&[0; RECORD_SIZE]);
        let (header, samples) = read(Cursor::new(bytes), 1, None).unwrap();
        assert_eq!(header.data_offset, 17);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&cloud_bytes(&[[0.0, 0.0, 5.0]; 4])).unwrap();
        let (_, samples) = read_file(file.path(), 2, None).unwrap();
        assert_eq!(samples.last(), Some(&PointSample { row: 2, col: 2, z: 5.0 }));
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn row_col_from_linear_index(width: u8, nb_records: u8) -> bool {
        let width = width as usize % 17 + 1;
        let positions: Vec<_> = (0..nb_records).map(|i| [0.0, 0.0, i as f32]).collect();
        let (_, samples) = read(Cursor::new(cloud_bytes(&positions)), width, None).unwrap();
        samples.len() == positions.len()
            && samples.iter().enumerate().all(|(i, s)| {
                s.row == i / width + 1 && s.col == i % width + 1 && s.z == i as f32
            })
    }
}
