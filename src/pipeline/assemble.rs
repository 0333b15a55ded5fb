//! Document assembly: ordered image artifacts → one multi-page PDF.
//!
//! Each artifact becomes one page sized to the image (pixels × 72 / DPI).
//! Pixel data is passed through whenever PDF can carry the source encoding
//! directly:
//!
//! | Source | Embedded as |
//! |--------|-------------|
//! | JPEG (baseline or progressive) | the original bytes, `/DCTDecode` |
//! | PNG, non-interlaced, gray / RGB / palette, ≤ 8 bit | the original IDAT stream, `/FlateDecode` + PNG predictor |
//! | anything else `image` can decode | decoded to 8-bit RGB, `/FlateDecode` |
//!
//! The writer streams page by page, so only one image is held in memory at
//! a time. Output goes to a temp file next to the destination and is renamed
//! into place only after the last byte is written; an unreadable artifact or
//! a write failure leaves no partial PDF behind.

use crate::error::PagebindError;
use crate::output::{Artifact, ArtifactData, AssemblyStats};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Write `artifacts` as a PDF at `output`, in the order given.
pub async fn assemble(
    artifacts: Vec<Artifact>,
    output: &Path,
    page_dpi: u32,
) -> Result<AssemblyStats, PagebindError> {
    if artifacts.is_empty() {
        return Err(PagebindError::NoArtifacts);
    }
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || assemble_file_blocking(&artifacts, &output, page_dpi))
        .await
        .map_err(|e| PagebindError::Internal(format!("Assembly task panicked: {}", e)))?
}

/// Assemble into memory instead of a file.
pub async fn assemble_to_bytes(
    artifacts: Vec<Artifact>,
    page_dpi: u32,
) -> Result<(Vec<u8>, AssemblyStats), PagebindError> {
    if artifacts.is_empty() {
        return Err(PagebindError::NoArtifacts);
    }

    tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        let counts = write_pdf(&artifacts, page_dpi, &mut buf).map_err(|e| match e {
            WriteError::Artifact(e) => e,
            WriteError::Io(e) => PagebindError::Internal(format!("in-memory write: {e}")),
        })?;
        let stats = counts.into_stats(None, buf.len() as u64);
        Ok((buf, stats))
    })
    .await
    .map_err(|e| PagebindError::Internal(format!("Assembly task panicked: {}", e)))?
}

fn assemble_file_blocking(
    artifacts: &[Artifact],
    output: &Path,
    page_dpi: u32,
) -> Result<AssemblyStats, PagebindError> {
    let write_failed = |e: io::Error| PagebindError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: e,
    };

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    let mut writer = BufWriter::new(tmp);
    let counts = write_pdf(artifacts, page_dpi, &mut writer).map_err(|e| match e {
        WriteError::Artifact(e) => e,
        WriteError::Io(e) => write_failed(e),
    })?;
    let tmp = writer
        .into_inner()
        .map_err(|e| write_failed(e.into_error()))?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    let file = tmp.persist(output).map_err(|e| write_failed(e.error))?;
    let bytes = file.metadata().map_err(write_failed)?.len();

    info!(
        "Assembled {} pages ({} passthrough, {} re-encoded) into {}",
        counts.pages,
        counts.passthrough,
        counts.reencoded,
        output.display()
    );
    Ok(counts.into_stats(Some(output.to_path_buf()), bytes))
}

// ── Image preparation ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { palette: Vec<u8> },
}

impl ColorSpace {
    fn pdf(&self) -> String {
        match self {
            ColorSpace::Gray => "/DeviceGray".into(),
            ColorSpace::Rgb => "/DeviceRGB".into(),
            ColorSpace::Cmyk => "/DeviceCMYK".into(),
            ColorSpace::Indexed { palette } => {
                let hival = palette.len() / 3 - 1;
                let hex: String = palette.iter().map(|b| format!("{b:02X}")).collect();
                format!("[/Indexed /DeviceRGB {hival} <{hex}>]")
            }
        }
    }
}

/// One image ready to embed as an XObject.
#[derive(Debug)]
struct PdfImage<'a> {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    bits: u8,
    filter: &'static str,
    decode_parms: Option<String>,
    decode: Option<&'static str>,
    data: Cow<'a, [u8]>,
    passthrough: bool,
}

fn prepare_image(ordinal: u32, bytes: &[u8]) -> Result<PdfImage<'_>, PagebindError> {
    if let Some(jpeg) = jpeg_info(bytes) {
        let (color_space, decode) = match jpeg.components {
            1 => (ColorSpace::Gray, None),
            3 => (ColorSpace::Rgb, None),
            // Adobe-written CMYK JPEGs store inverted samples.
            4 if jpeg.adobe => (ColorSpace::Cmyk, Some("[1 0 1 0 1 0 1 0]")),
            4 => (ColorSpace::Cmyk, None),
            _ => return reencode(ordinal, bytes),
        };
        return Ok(PdfImage {
            width: jpeg.width,
            height: jpeg.height,
            color_space,
            bits: 8,
            filter: "/DCTDecode",
            decode_parms: None,
            decode,
            data: Cow::Borrowed(bytes),
            passthrough: true,
        });
    }

    if let Some(png) = png_info(bytes) {
        if let Some(img) = png_passthrough(png) {
            return Ok(img);
        }
    }

    reencode(ordinal, bytes)
}

fn png_passthrough(png: PngInfo) -> Option<PdfImage<'static>> {
    if png.interlace != 0 || png.bit_depth > 8 {
        return None;
    }
    let (color_space, colors) = match png.color_type {
        0 => (ColorSpace::Gray, 1),
        2 => (ColorSpace::Rgb, 3),
        3 if !png.palette.is_empty() && png.palette.len() % 3 == 0 => (
            ColorSpace::Indexed {
                palette: png.palette,
            },
            1,
        ),
        _ => return None,
    };
    Some(PdfImage {
        width: png.width,
        height: png.height,
        color_space,
        bits: png.bit_depth,
        filter: "/FlateDecode",
        decode_parms: Some(format!(
            "<< /Predictor 15 /Colors {} /BitsPerComponent {} /Columns {} >>",
            colors, png.bit_depth, png.width
        )),
        decode: None,
        data: Cow::Owned(png.idat),
        passthrough: true,
    })
}

/// Decode with `image` and embed as Flate-compressed 8-bit RGB.
fn reencode(ordinal: u32, bytes: &[u8]) -> Result<PdfImage<'static>, PagebindError> {
    let img = image::load_from_memory(bytes).map_err(|e| PagebindError::UnsupportedImage {
        ordinal,
        detail: e.to_string(),
    })?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(rgb.as_raw())
        .and_then(|_| encoder.flush())
        .map_err(|e| PagebindError::Internal(format!("zlib: {e}")))?;
    let data = encoder
        .finish()
        .map_err(|e| PagebindError::Internal(format!("zlib: {e}")))?;

    debug!("Artifact {} re-encoded as {}x{} RGB", ordinal, width, height);
    Ok(PdfImage {
        width,
        height,
        color_space: ColorSpace::Rgb,
        bits: 8,
        filter: "/FlateDecode",
        decode_parms: None,
        decode: None,
        data: Cow::Owned(data),
        passthrough: false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegInfo {
    width: u32,
    height: u32,
    components: u8,
    adobe: bool,
}

/// Read dimensions and component count from the first SOF marker.
fn jpeg_info(data: &[u8]) -> Option<JpegInfo> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut adobe = false;
    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        // Fill bytes and parameterless markers.
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
            i += 2;
            continue;
        }
        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if len < 2 || i + 2 + len > data.len() {
            return None;
        }
        let segment = &data[i + 4..i + 2 + len];
        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if segment.len() < 6 {
                    return None;
                }
                let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
                let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
                if width == 0 || height == 0 {
                    return None;
                }
                return Some(JpegInfo {
                    width,
                    height,
                    components: segment[5],
                    adobe,
                });
            }
            0xDA | 0xD9 => return None,
            _ => {}
        }
        i += 2 + len;
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PngInfo {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
    palette: Vec<u8>,
    idat: Vec<u8>,
}

/// Walk PNG chunks, collecting IHDR fields, PLTE and the IDAT stream.
fn png_info(data: &[u8]) -> Option<PngInfo> {
    if data.len() < 8 || data[..8] != PNG_SIGNATURE {
        return None;
    }
    let mut info: Option<PngInfo> = None;
    let mut i = 8;
    while i + 8 <= data.len() {
        let len = u32::from_be_bytes(data[i..i + 4].try_into().ok()?) as usize;
        let kind = &data[i + 4..i + 8];
        let body_end = i.checked_add(8)?.checked_add(len)?;
        if body_end + 4 > data.len() {
            return None;
        }
        let body = &data[i + 8..body_end];
        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return None;
                }
                info = Some(PngInfo {
                    width: u32::from_be_bytes(body[0..4].try_into().ok()?),
                    height: u32::from_be_bytes(body[4..8].try_into().ok()?),
                    bit_depth: body[8],
                    color_type: body[9],
                    interlace: body[12],
                    palette: Vec::new(),
                    idat: Vec::new(),
                });
            }
            b"PLTE" => info.as_mut()?.palette = body.to_vec(),
            b"IDAT" => info.as_mut()?.idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
        i = body_end + 4;
    }
    info.filter(|p| p.width > 0 && p.height > 0 && !p.idat.is_empty())
}

// ── PDF writing ──────────────────────────────────────────────────────────

enum WriteError {
    Artifact(PagebindError),
    Io(io::Error),
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::Io(e)
    }
}

#[derive(Debug, Default)]
struct PageCounts {
    pages: usize,
    passthrough: usize,
    reencoded: usize,
}

impl PageCounts {
    fn into_stats(self, path: Option<PathBuf>, bytes: u64) -> AssemblyStats {
        AssemblyStats {
            path,
            pages: self.pages,
            bytes,
            passthrough_pages: self.passthrough,
            reencoded_pages: self.reencoded,
        }
    }
}

/// `io::Write` wrapper tracking the byte offset for the xref table.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Object numbers: 1 catalog, 2 page tree, then (image, contents, page)
/// per page, then the info dictionary.
fn image_id(page: usize) -> usize {
    3 + 3 * page
}

fn write_pdf<W: Write>(
    artifacts: &[Artifact],
    page_dpi: u32,
    out: W,
) -> Result<PageCounts, WriteError> {
    let mut w = CountingWriter {
        inner: out,
        written: 0,
    };
    let n = artifacts.len();
    let info_id = image_id(n);
    let mut offsets: Vec<u64> = Vec::with_capacity(info_id);
    let mut counts = PageCounts::default();

    w.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;

    offsets.push(w.written);
    write!(w, "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n")?;

    offsets.push(w.written);
    let kids: Vec<String> = (0..n).map(|p| format!("{} 0 R", image_id(p) + 2)).collect();
    write!(
        w,
        "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
        kids.join(" "),
        n
    )?;

    for (page, artifact) in artifacts.iter().enumerate() {
        let bytes = load_artifact(artifact).map_err(WriteError::Artifact)?;
        let img = prepare_image(artifact.ordinal, &bytes).map_err(WriteError::Artifact)?;
        let id = image_id(page);

        offsets.push(w.written);
        write!(
            w,
            "{id} 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent {} /Filter {}",
            img.width,
            img.height,
            img.color_space.pdf(),
            img.bits,
            img.filter
        )?;
        if let Some(parms) = &img.decode_parms {
            write!(w, " /DecodeParms {parms}")?;
        }
        if let Some(decode) = img.decode {
            write!(w, " /Decode {decode}")?;
        }
        write!(w, " /Length {} >>\nstream\n", img.data.len())?;
        w.write_all(&img.data)?;
        w.write_all(b"\nendstream\nendobj\n")?;

        let page_w = points(img.width, page_dpi);
        let page_h = points(img.height, page_dpi);
        let content = format!("q {page_w} 0 0 {page_h} 0 0 cm /Im0 Do Q\n");
        offsets.push(w.written);
        write!(
            w,
            "{} 0 obj\n<< /Length {} >>\nstream\n{}endstream\nendobj\n",
            id + 1,
            content.len(),
            content
        )?;

        offsets.push(w.written);
        write!(
            w,
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {page_w} {page_h}] /Resources << /XObject << /Im0 {id} 0 R >> >> /Contents {} 0 R >>\nendobj\n",
            id + 2,
            id + 1
        )?;

        counts.pages += 1;
        if img.passthrough {
            counts.passthrough += 1;
        } else {
            counts.reencoded += 1;
        }
        debug!(
            "Page {} ← artifact {} ({}x{} px, {})",
            page + 1,
            artifact.ordinal,
            img.width,
            img.height,
            if img.passthrough { "passthrough" } else { "re-encoded" }
        );
    }

    offsets.push(w.written);
    write!(
        w,
        "{info_id} 0 obj\n<< /Producer (edgequake-pagebind {}) >>\nendobj\n",
        env!("CARGO_PKG_VERSION")
    )?;

    let xref_offset = w.written;
    write!(w, "xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1)?;
    for off in &offsets {
        write!(w, "{off:010} 00000 n \n")?;
    }
    write!(
        w,
        "trailer\n<< /Size {} /Root 1 0 R /Info {info_id} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        offsets.len() + 1
    )?;
    w.flush()?;

    Ok(counts)
}

fn load_artifact(artifact: &Artifact) -> Result<Cow<'_, [u8]>, PagebindError> {
    match &artifact.data {
        ArtifactData::Memory(b) => Ok(Cow::Borrowed(b.as_slice())),
        ArtifactData::File(p) => std::fs::read(p)
            .map(Cow::Owned)
            .map_err(|e| PagebindError::ArtifactRead {
                ordinal: artifact.ordinal,
                path: p.clone(),
                source: e,
            }),
    }
}

/// Pixels to PDF points, trimmed to at most 3 decimals.
fn points(pixels: u32, dpi: u32) -> String {
    let pt = f64::from(pixels) * 72.0 / f64::from(dpi.max(1));
    let s = format!("{pt:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::{Cursor, Read};

    pub(crate) fn jpeg_bytes(w: u32, h: u32, shade: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([shade, 40, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
        buf
    }

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    /// Image XObject stream payloads in file order.
    pub(crate) fn image_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut from = 0;
        while let Some(pos) = find(pdf, b"/Subtype /Image", from) {
            let len_at = find(pdf, b"/Length ", pos).unwrap() + 8;
            let len_end = find(pdf, b" ", len_at).unwrap();
            let len: usize = std::str::from_utf8(&pdf[len_at..len_end]).unwrap().parse().unwrap();
            let start = find(pdf, b"stream\n", len_end).unwrap() + 7;
            out.push(pdf[start..start + len].to_vec());
            from = start + len;
        }
        out
    }

    fn find(hay: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        hay[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| p + from)
    }

    fn assemble_sync(artifacts: &[Artifact]) -> (Vec<u8>, PageCounts) {
        let mut buf = Vec::new();
        let counts = match write_pdf(artifacts, 96, &mut buf) {
            Ok(c) => c,
            Err(WriteError::Artifact(e)) => panic!("{e}"),
            Err(WriteError::Io(e)) => panic!("{e}"),
        };
        (buf, counts)
    }

    #[test]
    fn jpeg_header_is_read() {
        let info = jpeg_info(&jpeg_bytes(30, 20, 0)).unwrap();
        assert_eq!((info.width, info.height, info.components), (30, 20, 3));
        assert!(jpeg_info(b"not a jpeg").is_none());
    }

    #[test]
    fn png_header_is_read() {
        let png = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(5, 7)));
        let info = png_info(&png).unwrap();
        assert_eq!((info.width, info.height, info.color_type, info.bit_depth), (5, 7, 2, 8));
        assert!(!info.idat.is_empty());
    }

    #[test]
    fn pages_follow_input_order_and_keep_jpeg_bytes() {
        let jpegs = [jpeg_bytes(10, 10, 0), jpeg_bytes(20, 10, 90), jpeg_bytes(30, 10, 180)];
        let artifacts: Vec<Artifact> = jpegs
            .iter()
            .enumerate()
            .map(|(i, b)| Artifact::from_bytes(i as u32 + 1, "jpg", b.clone()))
            .collect();

        let (pdf, counts) = assemble_sync(&artifacts);
        assert_eq!(counts.pages, 3);
        assert_eq!(counts.passthrough, 3);

        let text = String::from_utf8_lossy(&pdf);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Count 3"));
        assert!(text.trim_end().ends_with("%%EOF"));

        let streams = image_streams(&pdf);
        assert_eq!(streams.len(), 3);
        for (stream, original) in streams.iter().zip(&jpegs) {
            assert_eq!(stream, original);
        }

        // 10/20/30 px at 96 DPI → 7.5/15/22.5 pt wide, in that order.
        let a = text.find("[0 0 7.5 7.5]").unwrap();
        let b = text.find("[0 0 15 7.5]").unwrap();
        let c = text.find("[0 0 22.5 7.5]").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let artifacts = vec![Artifact::from_bytes(1, "jpg", jpeg_bytes(8, 8, 1))];
        let (pdf, _) = assemble_sync(&artifacts);

        let sx = pdf.windows(10).rposition(|w| w == b"startxref\n").unwrap() + 10;
        let tail = std::str::from_utf8(&pdf[sx..]).unwrap();
        let xref_at: usize = tail.lines().next().unwrap().parse().unwrap();
        let xref = std::str::from_utf8(&pdf[xref_at..]).unwrap();
        assert!(xref.starts_with("xref\n"));

        let entries: Vec<&str> = xref.lines().skip(3).take_while(|l| l.ends_with(" n ")).collect();
        assert_eq!(entries.len(), 6);
        for (i, line) in entries.iter().enumerate() {
            let off: usize = line[..10].parse().unwrap();
            let header = format!("{} 0 obj", i + 1);
            assert!(pdf[off..].starts_with(header.as_bytes()), "object {}", i + 1);
        }
    }

    #[test]
    fn rgb_png_is_passed_through() {
        let png = png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([1, 2, 3]))));
        let idat = png_info(&png).unwrap().idat;
        let (pdf, counts) = assemble_sync(&[Artifact::from_bytes(1, "png", png)]);
        assert_eq!(counts.passthrough, 1);
        assert_eq!(image_streams(&pdf)[0], idat);
        assert!(String::from_utf8_lossy(&pdf).contains("/Predictor 15 /Colors 3"));
    }

    #[test]
    fn alpha_png_is_reencoded() {
        let png = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 128]))));
        let (pdf, counts) = assemble_sync(&[Artifact::from_bytes(1, "png", png)]);
        assert_eq!(counts.reencoded, 1);
        assert_eq!(counts.passthrough, 0);
        let stream = &image_streams(&pdf)[0];
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(stream.as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw.len(), 4 * 4 * 3);
    }

    #[test]
    fn garbage_is_unsupported() {
        let mut buf = Vec::new();
        let err = write_pdf(&[Artifact::from_bytes(9, "png", b"<html>404</html>".to_vec())], 96, &mut buf);
        assert!(matches!(
            err,
            Err(WriteError::Artifact(PagebindError::UnsupportedImage { ordinal: 9, .. }))
        ));
    }

    #[test]
    fn points_formatting() {
        assert_eq!(points(96, 96), "72");
        assert_eq!(points(10, 96), "7.5");
        assert_eq!(points(1, 96), "0.75");
        assert_eq!(points(100, 300), "24");
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = assemble(Vec::new(), &dir.path().join("x.pdf"), 96).await.unwrap_err();
        assert!(matches!(err, PagebindError::NoArtifacts));
    }

    #[tokio::test]
    async fn unsupported_artifact_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("merged.pdf");
        let artifacts = vec![
            Artifact::from_bytes(1, "jpg", jpeg_bytes(4, 4, 0)),
            Artifact::from_bytes(2, "png", b"nope".to_vec()),
        ];
        assert!(assemble(artifacts, &out, 96).await.is_err());
        assert!(!out.exists());
        let mut listing = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(listing.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/merged.pdf");
        let stats = assemble(vec![Artifact::from_bytes(1, "jpg", jpeg_bytes(4, 4, 0))], &out, 96)
            .await
            .unwrap();
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.path.as_deref(), Some(out.as_path()));
        assert_eq!(stats.bytes, std::fs::metadata(&out).unwrap().len());
    }

    #[tokio::test]
    async fn unwritable_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A regular file where a directory is needed.
        let out = blocker.join("merged.pdf");
        let err = assemble(vec![Artifact::from_bytes(1, "jpg", jpeg_bytes(4, 4, 0))], &out, 96)
            .await
            .unwrap_err();
        assert!(matches!(err, PagebindError::OutputWriteFailed { .. }));
    }
}
