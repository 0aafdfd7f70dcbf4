// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streaming Parser. A synchronous, byte-counting CSV reader driven from
//! a [`tokio::task::spawn_blocking`] context (see `worker.rs`), so file
//! I/O never runs on the async executor's threads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("resuming at a non-zero offset requires an externally supplied header")]
    MissingHeader,
}

/// Skips forward from the current position to just past the next `\n`,
/// returning the number of bytes consumed. Used to realign an arbitrary
/// resume seek onto a record boundary.
fn skip_to_next_newline(file: &mut File) -> Result<u64, std::io::Error> {
    let mut byte = [0u8; 1];
    let mut skipped = 0u64;
    loop {
        let n = file.read(&mut byte)?;
        if n == 0 {
            return Ok(skipped);
        }
        skipped += 1;
        if byte[0] == b'\n' {
            return Ok(skipped);
        }
    }
}

fn split_header_line(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if reader.read_record(&mut record).unwrap_or(false) {
        record.iter().map(|f| f.trim().to_string()).collect()
    } else {
        Vec::new()
    }
}

pub struct StreamingParser {
    inner: csv::Reader<File>,
    header: Vec<String>,
    base_offset: u64,
}

impl StreamingParser {
    /// Opens `path` for a forward-only read starting at `start_offset`.
    /// When `start_offset == 0` the header is read from the file itself;
    /// otherwise `external_header` must be supplied (column names are
    /// stable for the lifetime of a job).
    pub fn open(
        path: &Path,
        start_offset: u64,
        external_header: Option<Vec<String>>,
        buffer_capacity: usize,
    ) -> Result<Self, ParseError> {
        let mut file = File::open(path)?;

        let (base_offset, header) = if start_offset == 0 {
            // The header line is consumed through the same CSV engine used
            // for data rows, so quoting rules are consistent.
            let mut header_reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(&mut file);
            let mut record = csv::StringRecord::new();
            let header = if header_reader.read_record(&mut record)? {
                record.iter().map(|f| f.trim().to_string()).collect()
            } else {
                Vec::new()
            };
            let consumed = header_reader.position().byte();
            drop(header_reader);
            file.seek(SeekFrom::Start(consumed))?;
            (consumed, header)
        } else {
            file.seek(SeekFrom::Start(start_offset))?;
            let skipped = skip_to_next_newline(&mut file)?;
            let header = external_header.ok_or(ParseError::MissingHeader)?;
            (start_offset + skipped, header)
        };

        let inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .buffer_capacity(buffer_capacity)
            .from_reader(file);

        Ok(Self {
            inner,
            header,
            base_offset,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Cumulative absolute byte offset into the file consumed so far.
    /// Used verbatim as the resume cursor.
    pub fn current_offset(&self) -> u64 {
        self.base_offset + self.inner.position().byte()
    }

    /// Returns the next non-empty row as a `header -> value` map, or
    /// `None` at end of stream. Extra columns are dropped; missing
    /// columns are filled with an empty string.
    pub fn next_record(&mut self) -> Result<Option<HashMap<String, String>>, ParseError> {
        let mut record = csv::StringRecord::new();
        loop {
            if !self.inner.read_record(&mut record)? {
                return Ok(None);
            }
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let mut row = HashMap::with_capacity(self.header.len());
            for (i, column) in self.header.iter().enumerate() {
                let value = record.get(i).unwrap_or("").trim().to_string();
                row.insert(column.clone(), value);
            }
            return Ok(Some(row));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_header_and_rows_from_start() {
        let f = write_temp("Customer Id,First Name\nC001,Alice\nC002,Bob\n");
        let mut parser = StreamingParser::open(f.path(), 0, None, 64 * 1024).unwrap();
        assert_eq!(parser.header(), &["Customer Id", "First Name"]);
        let r1 = parser.next_record().unwrap().unwrap();
        assert_eq!(r1.get("Customer Id").unwrap(), "C001");
        let r2 = parser.next_record().unwrap().unwrap();
        assert_eq!(r2.get("First Name").unwrap(), "Bob");
        assert!(parser.next_record().unwrap().is_none());
    }

    #[test]
    fn tracks_cumulative_byte_offset() {
        let contents = "Customer Id,First Name\nC001,Alice\nC002,Bob\n";
        let f = write_temp(contents);
        let mut parser = StreamingParser::open(f.path(), 0, None, 64 * 1024).unwrap();
        let header_len = "Customer Id,First Name\n".len() as u64;
        assert_eq!(parser.current_offset(), header_len);
        parser.next_record().unwrap();
        let first_row_len = "C001,Alice\n".len() as u64;
        assert_eq!(parser.current_offset(), header_len + first_row_len);
    }

    #[test]
    fn resumes_mid_file_with_external_header() {
        let contents = "Customer Id,First Name\nC001,Alice\nC002,Bob\nC003,Carol\n";
        let f = write_temp(contents);
        let header_len = "Customer Id,First Name\n".len() as u64;
        let first_row_len = "C001,Alice\n".len() as u64;
        let mut parser = StreamingParser::open(
            f.path(),
            header_len + first_row_len,
            Some(vec!["Customer Id".to_string(), "First Name".to_string()]),
            64 * 1024,
        )
        .unwrap();
        let row = parser.next_record().unwrap().unwrap();
        assert_eq!(row.get("Customer Id").unwrap(), "C002");
    }

    #[test]
    fn skips_blank_lines() {
        let f = write_temp("Customer Id,First Name\nC001,Alice\n\nC002,Bob\n");
        let mut parser = StreamingParser::open(f.path(), 0, None, 64 * 1024).unwrap();
        parser.next_record().unwrap();
        let row = parser.next_record().unwrap().unwrap();
        assert_eq!(row.get("Customer Id").unwrap(), "C002");
    }

    #[test]
    fn tolerates_ragged_rows() {
        let f = write_temp("a,b,c\n1,2\n3,4,5,6\n");
        let mut parser = StreamingParser::open(f.path(), 0, None, 64 * 1024).unwrap();
        let r1 = parser.next_record().unwrap().unwrap();
        assert_eq!(r1.get("c").unwrap(), "");
        let r2 = parser.next_record().unwrap().unwrap();
        assert_eq!(r2.get("a").unwrap(), "3");
        assert_eq!(r2.len(), 3);
    }
}
