//! Ranged reads of remote parquet files.
//!
//! A parquet file ends with its metadata block, the block's length as a
//! little-endian `u32` and the `PAR1` magic. Reading that tail first gives the
//! schema and the byte range of every column chunk, so a schema lookup costs two
//! small requests and a projected scan fetches only the chunks it decodes.

use crate::error::SourceError;
use async_trait::async_trait;
use polars::prelude::*;
use std::io::Cursor;
use std::ops::Range;

const MAGIC: &[u8; 4] = b"PAR1";

/// Metadata length plus magic.
pub const TAIL_LEN: u64 = 8;

/// Byte-range access to stored objects.
#[async_trait]
pub trait RangeRead: Send + Sync {
    /// Reads `range` (end exclusive) of the object at `path`.
    async fn read_range(&self, path: &str, range: Range<u64>) -> Result<Vec<u8>, SourceError>;
}

/// The metadata block of one parquet file, held without any data pages.
#[derive(Debug, Clone)]
pub struct ParquetFooter {
    file_size: u64,
    // Metadata followed by the tail.
    bytes: Vec<u8>,
}

impl ParquetFooter {
    /// Fetches the footer of a remote file with two range reads.
    pub async fn fetch<R: RangeRead + ?Sized>(
        reader: &R,
        path: &str,
        file_size: u64,
    ) -> Result<Self, SourceError> {
        if file_size < MAGIC.len() as u64 + TAIL_LEN {
            return Err(malformed(path, "shorter than the parquet framing"));
        }
        let tail = reader.read_range(path, file_size - TAIL_LEN..file_size).await?;
        let footer_len = parse_tail(path, &tail)? + TAIL_LEN;
        if footer_len + MAGIC.len() as u64 > file_size {
            return Err(malformed(path, "metadata length exceeds the file size"));
        }

        let mut bytes = reader
            .read_range(path, file_size - footer_len..file_size - TAIL_LEN)
            .await?;
        if bytes.len() as u64 != footer_len - TAIL_LEN {
            return Err(malformed(path, "short read of the metadata block"));
        }
        bytes.extend_from_slice(&tail);
        Ok(Self { file_size, bytes })
    }

    /// Splits the footer off a file that was downloaded whole.
    pub fn from_file(path: &str, file: &[u8]) -> Result<Self, SourceError> {
        let file_size = file.len() as u64;
        if file_size < MAGIC.len() as u64 + TAIL_LEN {
            return Err(malformed(path, "shorter than the parquet framing"));
        }
        let tail_start = to_usize(file_size - TAIL_LEN)?;
        let footer_len = parse_tail(path, &file[tail_start..])? + TAIL_LEN;
        if footer_len + MAGIC.len() as u64 > file_size {
            return Err(malformed(path, "metadata length exceeds the file size"));
        }
        let footer_start = to_usize(file_size - footer_len)?;
        Ok(Self {
            file_size,
            bytes: file[footer_start..].to_vec(),
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes the footer occupies at the end of the file, tail included.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Top-level column names, in file order.
    pub fn columns(&self) -> Result<Vec<String>, SourceError> {
        let schema = ParquetReader::new(Cursor::new(self.stub_file())).schema()?;
        Ok(schema.fields.iter().map(|f| f.name.clone()).collect())
    }

    /// Sorted, coalesced byte ranges of every column chunk that stores one of
    /// `columns`, across all row groups.
    pub fn column_ranges(&self, columns: &[String]) -> Result<Vec<Range<u64>>, SourceError> {
        let mut reader = ParquetReader::new(Cursor::new(self.stub_file()));
        let metadata = reader.get_metadata()?;

        let mut ranges = Vec::new();
        for row_group in &metadata.row_groups {
            for chunk in row_group.columns() {
                let stored = chunk.descriptor().path_in_schema.first();
                if stored.is_some_and(|name| columns.contains(name)) {
                    let (start, len) = chunk.byte_range();
                    ranges.push(start..start + len);
                }
            }
        }
        Ok(coalesce(ranges))
    }

    /// A file image of the original size that holds the footer and the given
    /// chunks. Every other byte is zero and must not be decoded.
    pub fn image(&self, chunks: Vec<(Range<u64>, Vec<u8>)>) -> Result<Vec<u8>, SourceError> {
        let size = to_usize(self.file_size)?;
        let mut image = vec![0u8; size];
        image[..MAGIC.len()].copy_from_slice(MAGIC);
        image[size - self.bytes.len()..].copy_from_slice(&self.bytes);

        for (range, bytes) in chunks {
            if range.end > self.file_size || bytes.len() as u64 != range.end - range.start {
                return Err(SourceError::Malformed(format!(
                    "chunk {}..{} does not fit a {} byte file",
                    range.start, range.end, self.file_size
                )));
            }
            let start = to_usize(range.start)?;
            image[start..start + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(image)
    }

    // The smallest buffer the parquet reader accepts as a file: magic, then footer.
    fn stub_file(&self) -> Vec<u8> {
        let mut stub = Vec::with_capacity(MAGIC.len() + self.bytes.len());
        stub.extend_from_slice(MAGIC);
        stub.extend_from_slice(&self.bytes);
        stub
    }
}

/// Fetches only the chunks that store `columns` and returns a decodable image
/// of the file.
pub async fn fetch_columns<R: RangeRead + ?Sized>(
    reader: &R,
    path: &str,
    footer: &ParquetFooter,
    columns: &[String],
) -> Result<Vec<u8>, SourceError> {
    let mut chunks = Vec::new();
    for range in footer.column_ranges(columns)? {
        let bytes = reader.read_range(path, range.clone()).await?;
        chunks.push((range, bytes));
    }
    footer.image(chunks)
}

fn parse_tail(path: &str, tail: &[u8]) -> Result<u64, SourceError> {
    if tail.len() != TAIL_LEN as usize || &tail[4..] != MAGIC {
        return Err(malformed(path, "missing the PAR1 trailer"));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&tail[..4]);
    Ok(u64::from(u32::from_le_bytes(len)))
}

fn coalesce(mut ranges: Vec<Range<u64>>) -> Vec<Range<u64>> {
    ranges.retain(|r| r.start < r.end);
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<u64>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

fn to_usize(value: u64) -> Result<usize, SourceError> {
    usize::try_from(value).map_err(|_| SourceError::Malformed(format!("offset {value} exceeds memory")))
}

fn malformed(path: &str, reason: &str) -> SourceError {
    SourceError::Malformed(format!("{path}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves one object from memory and records every range it was asked for.
    struct RecordingObject {
        bytes: Vec<u8>,
        reads: Mutex<Vec<Range<u64>>>,
    }

    impl RecordingObject {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                reads: Mutex::new(Vec::new()),
            }
        }

        fn reads(&self) -> Vec<Range<u64>> {
            self.reads.lock().unwrap().clone()
        }

        fn bytes_read(&self) -> u64 {
            self.reads().iter().map(|r| r.end - r.start).sum()
        }
    }

    #[async_trait]
    impl RangeRead for RecordingObject {
        async fn read_range(&self, _path: &str, range: Range<u64>) -> Result<Vec<u8>, SourceError> {
            self.reads.lock().unwrap().push(range.clone());
            Ok(self.bytes[range.start as usize..range.end as usize].to_vec())
        }
    }

    fn frame() -> DataFrame {
        let rows = 2000;
        let inn: Vec<String> = (0..rows).map(|i| format!("{i:010}")).collect();
        let region: Vec<String> = (0..rows).map(|i| format!("region-{}", i % 7)).collect();
        let payload: Vec<String> = (0..rows)
            .map(|i: u64| format!("{:016x}{:016x}", i.wrapping_mul(0x9E37_79B9_7F4A_7C15), i * 31))
            .collect();
        df!("inn" => inn, "region" => region, "payload" => payload).unwrap()
    }

    fn parquet_bytes() -> Vec<u8> {
        let mut frame = frame();
        let mut bytes = Vec::new();
        ParquetWriter::new(&mut bytes).finish(&mut frame).unwrap();
        bytes
    }

    fn overlaps(a: &Range<u64>, b: &Range<u64>) -> bool {
        a.start < b.end && b.start < a.end
    }

    #[tokio::test]
    async fn footer_fetch_reads_only_the_tail_of_the_file() {
        let object = RecordingObject::new(parquet_bytes());
        let size = object.bytes.len() as u64;

        let footer = ParquetFooter::fetch(&object, "part-0.parquet", size).await.unwrap();
        assert_eq!(footer.columns().unwrap(), vec!["inn", "region", "payload"]);

        let reads = object.reads();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0], size - TAIL_LEN..size);
        assert!(reads.iter().all(|r| r.start >= size - footer.len()));
        assert_eq!(object.bytes_read(), footer.len());
        assert!(object.bytes_read() < size / 4);
    }

    #[tokio::test]
    async fn projected_fetch_skips_unrequested_column_chunks() {
        let object = RecordingObject::new(parquet_bytes());
        let size = object.bytes.len() as u64;
        let footer = ParquetFooter::fetch(&object, "part-0.parquet", size).await.unwrap();
        let payload_ranges = footer.column_ranges(&["payload".to_string()]).unwrap();
        assert!(!payload_ranges.is_empty());

        let wanted = vec!["inn".to_string(), "region".to_string()];
        let image = fetch_columns(&object, "part-0.parquet", &footer, &wanted).await.unwrap();
        assert_eq!(image.len() as u64, size);

        let reads = object.reads();
        for read in &reads {
            assert!(payload_ranges.iter().all(|p| !overlaps(read, p)));
        }
        assert!(object.bytes_read() < size);

        let decoded = ParquetReader::new(Cursor::new(image))
            .with_columns(Some(wanted))
            .finish()
            .unwrap();
        let expected = frame();
        assert_eq!(decoded.height(), expected.height());
        assert!(decoded.column("inn").unwrap().equals(expected.column("inn").unwrap()));
        assert!(decoded.column("region").unwrap().equals(expected.column("region").unwrap()));
    }

    #[test]
    fn footer_split_from_a_whole_file_matches_the_fetched_one() {
        let bytes = parquet_bytes();
        let footer = ParquetFooter::from_file("part-0.parquet", &bytes).unwrap();
        assert_eq!(footer.file_size(), bytes.len() as u64);
        assert_eq!(footer.columns().unwrap(), vec!["inn", "region", "payload"]);
    }

    #[test]
    fn truncated_files_are_rejected() {
        let bytes = parquet_bytes();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            ParquetFooter::from_file("part-0.parquet", cut),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            ParquetFooter::from_file("tiny.parquet", b"PAR1"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn adjacent_and_overlapping_ranges_coalesce() {
        let merged = coalesce(vec![40..50, 0..10, 10..20, 15..30, 60..60]);
        assert_eq!(merged, vec![0..30, 40..50]);
    }
}
