//! Reads the first lines of a text file through a chain of candidate encodings.

use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::encoding::{EncodingSniffer, TextEncoding};

const CHUNK_SIZE: usize = 8 * 1024;

/// Lines decoded from a text file and the encoding that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLines {
    pub lines: Vec<String>,
    pub encoding: TextEncoding,
    /// Set when every strict candidate failed and undecodable bytes were replaced.
    pub lossy: bool,
}

#[derive(Debug)]
enum ReadFailure {
    Io(io::Error),
    Malformed,
}

#[derive(Debug, Clone, Copy)]
pub struct TextReader {
    sniffer: EncodingSniffer,
    legacy: &'static Encoding,
}

impl TextReader {
    #[must_use]
    pub fn new(sniffer: EncodingSniffer, legacy: &'static Encoding) -> Self {
        Self { sniffer, legacy }
    }

    /// Strict decode order: sniffed guess, UTF-8 (BOM tolerant), legacy code page, UTF-16, Latin-1.
    #[must_use]
    pub fn candidates(&self, sniffed: Option<TextEncoding>) -> Vec<TextEncoding> {
        let mut chain: Vec<TextEncoding> = Vec::with_capacity(5);
        let fallbacks = [
            TextEncoding::Utf8Sig,
            TextEncoding::from_encoding(self.legacy),
            TextEncoding::Utf16,
            TextEncoding::Latin1,
        ];
        for encoding in sniffed.into_iter().chain(fallbacks) {
            if !chain.contains(&encoding) {
                chain.push(encoding);
            }
        }
        chain
    }

    /// Returns at most `max_lines` lines with their terminators stripped.
    ///
    /// Tries every candidate strictly, then decodes once more with the legacy
    /// code page replacing undecodable bytes.
    ///
    /// # Errors
    /// Only when the file cannot be read at all.
    pub fn read_first_lines(&self, path: &Path, max_lines: usize) -> io::Result<DecodedLines> {
        let sniffed = self.sniffer.detect_file(path);
        for encoding in self.candidates(sniffed) {
            let attempt = File::open(path)
                .map_err(ReadFailure::Io)
                .and_then(|file| read_lines(file, LineDecoder::strict(encoding), max_lines));
            match attempt {
                Ok(lines) => {
                    return Ok(DecodedLines {
                        lines,
                        encoding,
                        lossy: false,
                    });
                }
                Err(ReadFailure::Malformed) => {
                    log::trace!("{} is not valid {encoding}", path.display());
                }
                Err(ReadFailure::Io(err)) => {
                    log::trace!("reading {} as {encoding} failed: {err}", path.display());
                }
            }
        }

        let file = File::open(path)?;
        let lines = match read_lines(file, LineDecoder::replacing(self.legacy), max_lines) {
            Ok(lines) => lines,
            Err(ReadFailure::Io(err)) => return Err(err),
            Err(ReadFailure::Malformed) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "undecodable text"));
            }
        };
        Ok(DecodedLines {
            lines,
            encoding: TextEncoding::from_encoding(self.legacy),
            lossy: true,
        })
    }
}

fn read_lines<R: Read>(
    reader: R,
    mut decoder: LineDecoder,
    max_lines: usize,
) -> Result<Vec<String>, ReadFailure> {
    if max_lines == 0 {
        return Ok(Vec::new());
    }
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, reader);
    let mut splitter = LineSplitter::default();
    let mut text = String::new();

    loop {
        let buf = reader.fill_buf().map_err(ReadFailure::Io)?;
        let last = buf.is_empty();
        let consumed = buf.len();

        text.clear();
        let decoded = decoder.decode(buf, last, &mut text);
        splitter.push(&text);
        // Bytes past the requested lines never invalidate the result.
        if splitter.completed() >= max_lines {
            return Ok(splitter.into_lines(max_lines));
        }
        decoded?;
        if last {
            return Ok(splitter.into_lines(max_lines));
        }
        reader.consume(consumed);
    }
}

/// Splits decoded text on CR, LF and CRLF, across chunk boundaries.
#[derive(Debug, Default)]
struct LineSplitter {
    lines: Vec<String>,
    current: String,
    after_cr: bool,
}

impl LineSplitter {
    fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if std::mem::take(&mut self.after_cr) && ch == '\n' {
                continue;
            }
            match ch {
                '\r' => {
                    self.end_line();
                    self.after_cr = true;
                }
                '\n' => self.end_line(),
                _ => self.current.push(ch),
            }
        }
    }

    fn end_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn completed(&self) -> usize {
        self.lines.len()
    }

    /// Flushes an unterminated last line and keeps the first `max` lines.
    fn into_lines(mut self, max: usize) -> Vec<String> {
        if !self.current.is_empty() {
            self.end_line();
        }
        self.lines.truncate(max);
        self.lines
    }
}

enum LineDecoder {
    Strict(Decoder),
    Replacing(Decoder),
    Utf32 {
        big_endian: bool,
        at_start: bool,
        pending: Vec<u8>,
    },
    Latin1,
}

impl LineDecoder {
    fn strict(encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Utf8Sig => Self::Strict(encoding_rs::UTF_8.new_decoder_with_bom_removal()),
            TextEncoding::Utf8 => Self::Strict(encoding_rs::UTF_8.new_decoder_without_bom_handling()),
            // BOM sniffing, little endian without one.
            TextEncoding::Utf16 => Self::Strict(encoding_rs::UTF_16LE.new_decoder()),
            TextEncoding::Utf16Le => Self::Strict(encoding_rs::UTF_16LE.new_decoder_with_bom_removal()),
            TextEncoding::Utf16Be => Self::Strict(encoding_rs::UTF_16BE.new_decoder_with_bom_removal()),
            TextEncoding::Utf32Le => Self::utf32(false),
            TextEncoding::Utf32Be => Self::utf32(true),
            TextEncoding::Latin1 => Self::Latin1,
            TextEncoding::Codec(enc) => Self::Strict(enc.new_decoder_without_bom_handling()),
        }
    }

    fn replacing(encoding: &'static Encoding) -> Self {
        Self::Replacing(encoding.new_decoder_without_bom_handling())
    }

    fn utf32(big_endian: bool) -> Self {
        Self::Utf32 {
            big_endian,
            at_start: true,
            pending: Vec::new(),
        }
    }

    /// Appends the decoded form of `src` to `out`.
    ///
    /// On malformed input everything before the bad sequence is still appended.
    fn decode(&mut self, src: &[u8], last: bool, out: &mut String) -> Result<(), ReadFailure> {
        match self {
            Self::Strict(decoder) => decode_strict(decoder, src, last, out),
            Self::Replacing(decoder) => {
                decode_replacing(decoder, src, last, out);
                Ok(())
            }
            Self::Utf32 {
                big_endian,
                at_start,
                pending,
            } => decode_utf32(*big_endian, at_start, pending, src, last, out),
            Self::Latin1 => {
                out.extend(src.iter().map(|&b| char::from(b)));
                Ok(())
            }
        }
    }
}

fn decode_strict(
    decoder: &mut Decoder,
    mut src: &[u8],
    last: bool,
    out: &mut String,
) -> Result<(), ReadFailure> {
    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len() * 3 + 16);
        out.reserve(needed);
        let (result, read) = decoder.decode_to_string_without_replacement(src, out, last);
        src = &src[read..];
        match result {
            DecoderResult::InputEmpty => return Ok(()),
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(_, _) => return Err(ReadFailure::Malformed),
        }
    }
}

fn decode_replacing(decoder: &mut Decoder, mut src: &[u8], last: bool, out: &mut String) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3 + 16);
        out.reserve(needed);
        let (result, read, _) = decoder.decode_to_string(src, out, last);
        src = &src[read..];
        if result == CoderResult::InputEmpty {
            return;
        }
    }
}

fn decode_utf32(
    big_endian: bool,
    at_start: &mut bool,
    pending: &mut Vec<u8>,
    src: &[u8],
    last: bool,
    out: &mut String,
) -> Result<(), ReadFailure> {
    pending.extend_from_slice(src);
    let whole = pending.len() - pending.len() % 4;
    for unit in pending[..whole].chunks_exact(4) {
        let bytes = [unit[0], unit[1], unit[2], unit[3]];
        let code = if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        };
        let ch = char::from_u32(code).ok_or(ReadFailure::Malformed)?;
        if std::mem::take(at_start) && ch == '\u{FEFF}' {
            continue;
        }
        out.push(ch);
    }
    pending.drain(..whole);
    if last && !pending.is_empty() {
        return Err(ReadFailure::Malformed);
    }
    Ok(())
}
