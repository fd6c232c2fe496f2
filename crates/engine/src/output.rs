//! Report sinks: the `;`-delimited file writer and its transcoding layer.

use chrono::{DateTime, Local};
use encoding_rs::{Encoder, EncoderResult, Encoding};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf};

use crate::error::{EngineError, Result};

pub const FIELD_DELIMITER: u8 = b';';

/// Accepts report records (header first, then one record per file).
pub trait ReportSink {
    fn write_record(&mut self, record: &[String]) -> Result<()>;

    /// Pushes buffered records to the underlying storage.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Collects records in memory.
impl ReportSink for Vec<Vec<String>> {
    fn write_record(&mut self, record: &[String]) -> Result<()> {
        self.push(record.to_vec());
        Ok(())
    }
}

/// `;`-separated, minimally quoted, `\n`-terminated records.
///
/// Once [`ReportSink::finish`] has run the sink accepts no more records.
pub struct DelimitedSink<W: Write> {
    writer: Option<csv::Writer<TranscodingWriter<W>>>,
    finished: Option<TranscodingWriter<W>>,
}

impl<W: Write> DelimitedSink<W> {
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(TranscodingWriter::new(inner, encoding));
        Self {
            writer: Some(writer),
            finished: None,
        }
    }

    /// Finishes the report and returns the underlying writer.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.finished
            .take()
            .map(TranscodingWriter::into_inner)
            .ok_or_else(finished_error)
    }

    fn open_writer(&mut self) -> Result<&mut csv::Writer<TranscodingWriter<W>>> {
        self.writer.as_mut().ok_or_else(finished_error)
    }
}

fn finished_error() -> EngineError {
    EngineError::Io(io::Error::other("report already finished"))
}

impl<W: Write> ReportSink for DelimitedSink<W> {
    fn write_record(&mut self, record: &[String]) -> Result<()> {
        self.open_writer()?.write_record(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.open_writer()?.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let mut inner = writer
            .into_inner()
            .map_err(|err| EngineError::Io(err.into_error()))?;
        inner.finish()?;
        self.finished = Some(inner);
        Ok(())
    }
}

/// Re-encodes UTF-8 written to it into `encoding`.
///
/// Characters the target cannot represent become `?`. UTF-8 (and the UTF-16
/// family, whose output encoding is UTF-8) passes through untouched.
pub struct TranscodingWriter<W: Write> {
    inner: W,
    encoder: Option<Encoder>,
    pending: Vec<u8>,
    encoded: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        let encoding = encoding.output_encoding();
        let encoder = (encoding != encoding_rs::UTF_8).then(|| encoding.new_encoder());
        Self {
            inner,
            encoder,
            pending: Vec::new(),
            encoded: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Emits any trailing encoder state (stateful encodings such as ISO-2022-JP).
    ///
    /// # Errors
    /// Fails on write errors or when an incomplete UTF-8 sequence is still pending.
    pub fn finish(&mut self) -> io::Result<()> {
        let Self {
            inner,
            encoder,
            pending,
            encoded,
        } = self;
        let Some(encoder) = encoder.as_mut() else {
            return inner.flush();
        };
        if !pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "incomplete UTF-8 sequence at end of report",
            ));
        }
        encode_into(encoder, "", encoded, true);
        inner.write_all(encoded)?;
        encoded.clear();
        inner.flush()
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Self {
            inner,
            encoder,
            pending,
            encoded,
        } = self;
        let Some(encoder) = encoder.as_mut() else {
            return inner.write(buf);
        };

        pending.extend_from_slice(buf);
        // A multi-byte character may be split across writes; keep the tail for later.
        let valid = match std::str::from_utf8(pending) {
            Ok(text) => text.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
        };
        let text = std::str::from_utf8(&pending[..valid])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        encode_into(encoder, text, encoded, false);
        inner.write_all(encoded)?;
        encoded.clear();
        pending.drain(..valid);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn encode_into(encoder: &mut Encoder, mut src: &str, dst: &mut Vec<u8>, last: bool) {
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        dst.reserve(needed);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(src, dst, last);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => dst.push(b'?'),
        }
    }
}

/// `Files_Head_Scan_YYYYMMDD_HHMMSS.csv`
#[must_use]
pub fn report_file_name(now: DateTime<Local>) -> String {
    format!("Files_Head_Scan_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Renders `path` with the platform's directory separator.
#[must_use]
pub fn render_path(path: &Path) -> String {
    let rendered = path.display().to_string();
    if MAIN_SEPARATOR == '/' {
        rendered
    } else {
        rendered.replace('/', MAIN_SEPARATOR_STR)
    }
}

/// Creates `dir` if needed and opens a new report file in it.
///
/// # Errors
/// Returns [`EngineError::OutputCreate`] when the directory or file cannot be created.
pub fn create_report_file(
    dir: &Path,
    now: DateTime<Local>,
    encoding: &'static Encoding,
) -> Result<(PathBuf, DelimitedSink<BufWriter<File>>)> {
    fs::create_dir_all(dir).map_err(|source| EngineError::OutputCreate {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(report_file_name(now));
    let file = File::create(&path).map_err(|source| EngineError::OutputCreate {
        path: path.clone(),
        source,
    })?;
    Ok((path, DelimitedSink::new(BufWriter::new(file), encoding)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn written(records: &[&[&str]], encoding: &'static Encoding) -> Vec<u8> {
        let mut sink = DelimitedSink::new(Vec::new(), encoding);
        for record in records {
            let record: Vec<String> = record.iter().map(|s| (*s).to_string()).collect();
            sink.write_record(&record).unwrap();
        }
        sink.into_inner().unwrap()
    }

    #[test]
    fn uses_semicolons_and_minimal_quoting() {
        let bytes = written(&[&["File Path", "Line 1"], &["/a.csv", "x;y"]], encoding_rs::UTF_8);
        assert_eq!(String::from_utf8(bytes).unwrap(), "File Path;Line 1\n/a.csv;\"x;y\"\n");
    }

    #[test]
    fn encodes_to_legacy_code_page() {
        let bytes = written(&[&["Привет"]], encoding_rs::WINDOWS_1251);
        let (expected, _, _) = encoding_rs::WINDOWS_1251.encode("Привет\n");
        assert_eq!(bytes, expected.into_owned());
    }

    #[test]
    fn unmappable_characters_become_question_marks() {
        let bytes = written(&[&["a€文b"]], encoding_rs::WINDOWS_1251);
        // The euro sign exists in windows-1251, the CJK character does not.
        let (expected, _, _) = encoding_rs::WINDOWS_1251.encode("a€?b\n");
        assert_eq!(bytes, expected.into_owned());
    }

    #[test]
    fn split_utf8_sequences_are_buffered() {
        let mut writer = TranscodingWriter::new(Vec::new(), encoding_rs::WINDOWS_1251);
        let bytes = "Ж".as_bytes();
        writer.write_all(&bytes[..1]).unwrap();
        writer.write_all(&bytes[1..]).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.into_inner(), vec![0xC6]);
    }

    #[test]
    fn file_name_carries_local_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(report_file_name(now), "Files_Head_Scan_20240309_070501.csv");
    }

    #[test]
    fn finished_report_file_holds_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let (path, mut sink) = create_report_file(dir.path(), now, encoding_rs::WINDOWS_1251).unwrap();
        sink.write_record(&["Путь".to_string(), "Строка 1".to_string()]).unwrap();
        sink.write_record(&["/a.csv".to_string(), "Иван;30".to_string()]).unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.write_record(&["late".to_string()]).is_err());
        drop(sink);

        let (expected, _, _) = encoding_rs::WINDOWS_1251.encode("Путь;Строка 1\n/a.csv;\"Иван;30\"\n");
        assert_eq!(fs::read(&path).unwrap(), expected.into_owned());
    }

    #[test]
    fn flushed_rows_are_on_disk_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        let (path, mut sink) = create_report_file(dir.path(), now, encoding_rs::UTF_8).unwrap();
        sink.write_record(&["File Path".to_string(), "Line 1".to_string()]).unwrap();
        sink.write_record(&["/a.csv".to_string(), "x".to_string()]).unwrap();
        sink.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "File Path;Line 1\n/a.csv;x\n");
    }

    #[test]
    fn vec_sink_collects_records() {
        let mut rows: Vec<Vec<String>> = Vec::new();
        rows.write_record(&["a".to_string()]).unwrap();
        rows.finish().unwrap();
        assert_eq!(rows, vec![vec!["a".to_string()]]);
    }
}
