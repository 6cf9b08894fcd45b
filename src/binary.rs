//! Binary detection.
//!
//! Two tiers: known container signatures are recognized from the mapped
//! file first ([`detect_signature`]), and anything unrecognized goes through
//! a text heuristic over a bounded head and tail sample ([`looks_binary`]).
//! Blobs already held in memory skip the signature tier ([`is_binary_bytes`]).

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

const HEAD_WINDOW: usize = 4096;
const ZIP_TAIL_WINDOW: usize = 70 * 1024;
const ZIP_SUBTYPE_TAIL: usize = 256 * 1024;
const PDF_TAIL_WINDOW: usize = 8 * 1024;
const RAR_SFX_MAX: usize = 1024 * 1024;
const HDF5_SCAN_LIMIT: usize = 64 * 1024;
const ISO_PVD_OFFSET: usize = 16 * 2048 + 1;

const SAMPLE_SIZE: usize = 4096;
const PRINTABLE_THRESHOLD: f64 = 0.95;
const UTF16_ZERO_LANE: f64 = 0.30;
const UTF32_ZERO_LANE: f64 = 0.80;

/// A recognized binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub kind: &'static str,
    /// False for short or ambiguous magic numbers.
    pub strong: bool,
}

const PREFIX_ARCHIVES: &[(&[u8], &str)] = &[
    (b"\x37\x7a\xbc\xaf\x27\x1c", "7z"),
    (b"\x1f\x8b", "gzip"),
    (b"\xfd7zXZ\x00", "xz"),
    (b"\x28\xb5\x2f\xfd", "zstd"),
    (b"LZIP", "lzip"),
    (b"\x04\x22\x4d\x18", "lz4"),
    (b"\xed\xab\xee\xdb", "rpm"),
    (b"MSCF", "cab"),
];

const PREFIX_FONTS: &[(&[u8], &str)] = &[
    (b"\0\x01\0\0", "sfnt"),
    (b"OTTO", "sfnt"),
    (b"ttcf", "ttc"),
    (b"wOFF", "woff"),
    (b"wOF2", "woff2"),
];

const BOMS: &[&[u8]] = &[b"\xef\xbb\xbf", b"\xff\xfe", b"\xfe\xff", b"\x00\x00\xfe\xff"];

const fn sig(kind: &'static str, strong: bool) -> Option<Signature> {
    Some(Signature { kind, strong })
}

fn starts_at(buf: &[u8], offset: usize, magic: &[u8]) -> bool {
    buf.get(offset..offset + magic.len()) == Some(magic)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn tail(buf: &[u8], window: usize) -> &[u8] {
    &buf[buf.len().saturating_sub(window)..]
}

fn u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn is_pe(head: &[u8]) -> bool {
    if !head.starts_with(b"MZ") || head.len() < 0x40 {
        return false;
    }
    u32_le(head, 0x3C).is_some_and(|off| starts_at(head, off as usize, b"PE\0\0"))
}

fn riff(head: &[u8], form: &[u8]) -> bool {
    head.starts_with(b"RIFF") && starts_at(head, 8, form)
}

/// Recognize a binary container from its magic bytes.
pub fn detect_signature(buf: &[u8]) -> Option<Signature> {
    let head = &buf[..buf.len().min(HEAD_WINDOW)];

    // executables and objects
    if head.starts_with(b"\x7fELF") {
        return sig("elf", true);
    }
    if let Some(magic) = u32_le(head, 0) {
        if matches!(
            magic,
            0xFEED_FACE | 0xFEED_FACF | 0xCEFA_EDFE | 0xCFFA_EDFE | 0xCAFE_BABE | 0xBEBA_FECA
        ) {
            return sig("macho", false);
        }
    }
    if is_pe(head) {
        return sig("pe", true);
    }
    if head.starts_with(b"\0asm") {
        return sig("wasm", true);
    }
    if head.starts_with(b"FOR1") && starts_at(head, 8, b"BEAM") {
        return sig("beam", true);
    }
    if head.starts_with(b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1") {
        return sig("ole-cfbf", false);
    }

    // archives and packages
    let zip_tail = tail(buf, ZIP_TAIL_WINDOW);
    if find(zip_tail, b"PK\x05\x06").is_some() || find(zip_tail, b"PK\x06\x06").is_some() {
        let names = tail(buf, ZIP_SUBTYPE_TAIL);
        let has = |name: &[u8]| find(names, name).is_some();
        return if has(b"AndroidManifest.xml") {
            sig("apk", true)
        } else if has(b"META-INF/MANIFEST.MF") {
            sig("jar", false)
        } else {
            sig("zip", true)
        };
    }
    for &(magic, kind) in PREFIX_ARCHIVES {
        if head.starts_with(magic) {
            return sig(kind, true);
        }
    }
    if head.starts_with(b"BZh") && head.get(3).is_some_and(|b| (b'1'..=b'9').contains(b)) {
        return sig("bzip2", true);
    }
    let sfx = &buf[..buf.len().min(RAR_SFX_MAX)];
    if find(sfx, b"Rar!\x1a\x07\x00").is_some() || find(sfx, b"Rar!\x1a\x07\x01\x00").is_some() {
        return sig("rar", true);
    }
    if head.starts_with(b"!<arch>\n") {
        return sig("ar", false);
    }
    if starts_at(buf, ISO_PVD_OFFSET, b"CD001") {
        return sig("iso9660", true);
    }
    if buf.len() >= 512 && starts_at(buf, buf.len() - 512, b"koly") {
        return sig("dmg", true);
    }

    // images
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return sig("png", true);
    }
    if head.starts_with(b"\xff\xd8\xff") {
        return sig("jpeg", false);
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return sig("gif", true);
    }
    if riff(head, b"WEBP") {
        return sig("webp", true);
    }
    if head.starts_with(b"BM")
        && u32_le(head, 14).is_some_and(|dib| matches!(dib, 12 | 40 | 52 | 56 | 64 | 108 | 124))
    {
        return sig("bmp", false);
    }
    if head.starts_with(b"\0\0\x01\0") {
        return sig("ico", true);
    }
    if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        return sig("tiff", true);
    }
    if head.starts_with(b"8BPS") {
        return sig("psd", true);
    }

    // fonts
    for &(magic, kind) in PREFIX_FONTS {
        if head.starts_with(magic) {
            return sig(kind, true);
        }
    }

    // data
    if head.starts_with(b"SQLite format 3\0") {
        return sig("sqlite3", true);
    }
    if head.starts_with(b"\x93NUMPY") {
        return sig("npy", true);
    }
    let hdf5_limit = buf.len().min(HDF5_SCAN_LIMIT);
    if (0..hdf5_limit)
        .step_by(512)
        .any(|off| off + 8 <= hdf5_limit && starts_at(buf, off, b"\x89HDF\r\n\x1a\n"))
    {
        return sig("hdf5", true);
    }
    if head.starts_with(b"PAR1") {
        return sig("parquet", find(tail(buf, 16), b"PAR1").is_some());
    }
    if head.starts_with(b"ARROW1") {
        return sig("arrow-ipc", find(tail(buf, 16), b"ARROW1").is_some());
    }

    // documents
    if head.starts_with(b"%PDF-") {
        return sig("pdf", find(tail(buf, PDF_TAIL_WINDOW), b"%%EOF").is_some());
    }

    // audio and video
    if riff(head, b"WAVE") {
        return sig("wav", true);
    }
    if riff(head, b"AVI ") {
        return sig("avi", true);
    }
    if head.len() >= 12 && starts_at(head, 4, b"ftyp") {
        return sig("mp4", true);
    }
    if head.starts_with(b"\x1a\x45\xdf\xa3") {
        return sig("matroska", true);
    }
    if head.starts_with(b"\x30\x26\xb2\x75\x8e\x66\xcf\x11\xa6\xd9\x00\xaa\x00\x62\xce\x6c") {
        return sig("asf", true);
    }
    if head.starts_with(b"FLV\x01") {
        return sig("flv", true);
    }
    if head.starts_with(b"OggS") {
        return sig("ogg", false);
    }
    if head.starts_with(b"ID3") && head.get(3).is_some_and(|v| *v < 5) {
        return sig("mp3", false);
    }
    if let [0xFF, second, ..] = head {
        if second & 0xE0 == 0xE0 && *second != 0xFE {
            return sig("mpeg-audio", false);
        }
    }

    if head.len() >= 262 && starts_at(head, 257, b"ustar") {
        return sig("tar", false);
    }

    None
}

fn is_allowed_ascii(b: u8) -> bool {
    matches!(b, 0x20..=0x7E | b'\t' | b'\n' | 0x0B | 0x0C | b'\r' | 0x1B | 0x08)
}

fn printable_ratio<'a>(bytes: impl Iterator<Item = &'a u8>) -> f64 {
    let (mut allowed, mut total) = (0usize, 0usize);
    for b in bytes {
        total += 1;
        if is_allowed_ascii(*b) {
            allowed += 1;
        }
    }
    allowed as f64 / total.max(1) as f64
}

fn zero_ratio<'a>(bytes: impl Iterator<Item = &'a u8>) -> f64 {
    let (mut zeros, mut total) = (0usize, 0usize);
    for b in bytes {
        total += 1;
        if *b == 0 {
            zeros += 1;
        }
    }
    zeros as f64 / total.max(1) as f64
}

fn has_bom(sample: &[u8]) -> bool {
    BOMS.iter().any(|bom| sample.starts_with(bom))
}

/// Valid UTF-8, tolerating a sequence cut off at either end of the sample.
fn is_utf8(sample: &[u8], trim_leading: bool) -> bool {
    let start = if trim_leading {
        sample
            .iter()
            .take(3)
            .take_while(|b| (**b & 0xC0) == 0x80)
            .count()
    } else {
        0
    };
    match std::str::from_utf8(&sample[start..]) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

fn looks_utf16(sample: &[u8]) -> bool {
    if sample.len() < 16 {
        return false;
    }
    let even = || sample.iter().step_by(2);
    let odd = || sample.iter().skip(1).step_by(2);
    (zero_ratio(even()) > UTF16_ZERO_LANE && printable_ratio(odd()) > 0.80)
        || (zero_ratio(odd()) > UTF16_ZERO_LANE && printable_ratio(even()) > 0.80)
}

fn looks_utf32(sample: &[u8]) -> bool {
    if sample.len() < 16 {
        return false;
    }
    let lane = |i: usize| sample.iter().skip(i).step_by(4);
    let ratios: Vec<f64> = (0..4).map(|i| zero_ratio(lane(i))).collect();
    let text_lane = (0..4)
        .min_by(|a, b| ratios[*a].total_cmp(&ratios[*b]))
        .unwrap_or(0);
    ratios[text_lane] < 0.10
        && (0..4).all(|i| i == text_lane || ratios[i] > UTF32_ZERO_LANE)
        && printable_ratio(lane(text_lane)) > 0.80
}

fn sample_is_text(sample: &[u8], is_tail: bool) -> bool {
    if sample.is_empty() || has_bom(sample) {
        return true;
    }
    if looks_utf16(sample) || looks_utf32(sample) {
        return true;
    }
    if sample.contains(&0) {
        return false;
    }
    if is_utf8(sample, is_tail) {
        return true;
    }
    printable_ratio(sample.iter()) >= PRINTABLE_THRESHOLD
}

/// Text heuristic over one sample: a NUL byte, or too many non-printable
/// bytes, means binary. BOMs, valid UTF-8 and UTF-16/32 lane patterns are
/// text.
pub fn looks_binary(sample: &[u8]) -> bool {
    !sample_is_text(sample, false)
}

/// Heuristic check of an in-memory blob, head and tail sampled.
pub fn is_binary_bytes(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    if !sample_is_text(head, false) {
        return true;
    }
    if bytes.len() > SAMPLE_SIZE * 2 {
        return !sample_is_text(tail(bytes, SAMPLE_SIZE), true);
    }
    false
}

/// Two-tier check of a file on disk. An empty file is text; a file that
/// cannot be read is treated as binary.
pub fn is_binary_file(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unreadable, treating as binary");
            return true;
        }
    };
    match file.metadata() {
        Ok(meta) if meta.len() == 0 => return false,
        Ok(_) => {}
        Err(_) => return true,
    }
    // SAFETY: the map is read-only and dropped before returning. A file
    // truncated underneath us can fault, as with any mmap reader.
    let map = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "mmap failed, treating as binary");
            return true;
        }
    };
    is_binary_content(&map)
}

/// Both tiers over bytes already in memory. Only a strong signature is
/// conclusive; a weak one still has to fail the heuristic.
pub fn is_binary_content(bytes: &[u8]) -> bool {
    match detect_signature(bytes) {
        Some(signature) if signature.strong => {
            tracing::trace!(kind = signature.kind, "binary signature");
            true
        }
        Some(signature) => {
            tracing::trace!(kind = signature.kind, "weak signature, checking content");
            is_binary_bytes(bytes)
        }
        None => is_binary_bytes(bytes),
    }
}

/// Whether a body can be printed as is: valid UTF-8 with no NUL byte.
/// UTF-16 and UTF-32 pass the heuristic but still fail here.
pub fn is_printable_text(bytes: &[u8]) -> bool {
    !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
}
