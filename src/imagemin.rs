//! In-place image optimization
//!
//! Every file under the configured directories is run through the first
//! codec that handles its extension. The result replaces the original only
//! when it is strictly smaller.

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::error::DecodingError;
use image::{AnimationDecoder, ColorType, ImageEncoder, ImageError, ImageFormat};
use regex::{Captures, Regex};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ImageminConfig;
use crate::items::ItemList;
use crate::logging::section;
use crate::paths::{files_recursive, is_valid_path, recursive_pattern, to_slash, PathKind};
use crate::report::{ErrorReporter, FatalError};

/// Error optimizing a single image. Never fatal.
#[derive(Debug, Error)]
pub enum ImageminError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("{}: not valid UTF-8 SVG", .0.display())]
    Svg(PathBuf),
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Image codecs, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Gif,
    Jpeg,
    Png,
    Svg,
}

impl ImageCodec {
    pub const ORDER: [ImageCodec; 4] = [ImageCodec::Gif, ImageCodec::Jpeg, ImageCodec::Png, ImageCodec::Svg];

    /// First codec that handles `path`, by extension.
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        Self::ORDER.into_iter().find(|codec| codec.extensions().contains(&ext.as_str()))
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageCodec::Gif => &["gif"],
            ImageCodec::Jpeg => &["jpg", "jpeg"],
            ImageCodec::Png => &["png"],
            ImageCodec::Svg => &["svg"],
        }
    }

    /// Re-encode `bytes`. The result may be larger than the input.
    pub fn optimize(&self, bytes: &[u8], options: &ImageminOptions) -> Result<Vec<u8>, ImageError> {
        match self {
            ImageCodec::Gif => optimize_gif(bytes),
            ImageCodec::Jpeg => match options.jpeg_quality {
                Some(quality) => reencode_jpeg(bytes, quality),
                None => strip_jpeg_metadata(bytes),
            },
            ImageCodec::Png => optimize_png(bytes),
            ImageCodec::Svg => Ok(optimize_svg(&String::from_utf8_lossy(bytes), options.remove_view_box).into_bytes()),
        }
    }
}

/// Validated image optimization settings.
#[derive(Debug, Clone)]
pub struct ImageminOptions {
    pub dirs: Vec<PathBuf>,
    /// Lossy re-encode quality; `None` only strips JPEG metadata
    pub jpeg_quality: Option<u8>,
    pub remove_view_box: bool,
}

impl ImageminOptions {
    /// Split and validate the configured directories. A missing directory
    /// is fatal.
    pub fn resolve(config: &ImageminConfig) -> Result<Self, FatalError> {
        let list = ItemList::from_items(config.dirs.clone());
        let mut dirs = Vec::with_capacity(list.len());
        for dir in &list {
            let path = PathBuf::from(dir);
            if !is_valid_path(&path, PathKind::Directory) {
                return Err(FatalError::InvalidDirectory { label: "Imagemin", path });
            }
            dirs.push(path);
        }
        Ok(Self { dirs, jpeg_quality: config.jpeg_quality, remove_view_box: config.remove_view_box })
    }
}

/// Result of one optimization pass.
#[derive(Debug, Default)]
pub struct ImageminSummary {
    /// Files rewritten, with sizes before and after
    pub optimized: Vec<(PathBuf, u64, u64)>,
    /// Images already as small as the codec can make them
    pub unchanged: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl ImageminSummary {
    pub fn saved_bytes(&self) -> u64 {
        self.optimized.iter().map(|(_, before, after)| before - after).sum()
    }
}

/// Logged when no image directory is configured.
pub const NO_DIRS_WARNING: [&str; 2] =
    ["No image directories to minify", "Did you miss the parameter to add image directories?"];

/// Run the ImageOptimize operation.
///
/// Returns `Ok(None)`, after two warnings, when no directory is configured.
pub fn run_imagemin(config: &ImageminConfig, reporter: &ErrorReporter) -> Result<Option<ImageminSummary>, FatalError> {
    let options = ImageminOptions::resolve(config)?;
    if options.dirs.is_empty() {
        for line in NO_DIRS_WARNING {
            warn!("{}", line);
        }
        return Ok(None);
    }

    section(" imagemin > ");
    for dir in &options.dirs {
        info!("  {}", to_slash(&recursive_pattern(dir)));
    }
    section(" < imagemin ");

    let summary = optimize_dirs(&options, reporter);
    info!(
        "Minified {} image(s), saved {} bytes",
        summary.optimized.len(),
        summary.saved_bytes()
    );
    reporter.done("imagemin");
    Ok(Some(summary))
}

/// Optimize every image under `options.dirs`, reporting per-file failures.
pub fn optimize_dirs(options: &ImageminOptions, reporter: &ErrorReporter) -> ImageminSummary {
    let mut summary = ImageminSummary::default();
    for dir in &options.dirs {
        for path in files_recursive(dir) {
            let Some(codec) = ImageCodec::for_path(&path) else {
                continue;
            };
            match optimize_file(&path, codec, options) {
                Ok(Some((before, after))) => {
                    debug!("{}: {} -> {} bytes", path.display(), before, after);
                    summary.optimized.push((path, before, after));
                }
                Ok(None) => summary.unchanged.push(path),
                Err(e) => {
                    reporter.error(&e);
                    summary.failed.push(path);
                }
            }
        }
    }
    summary
}

/// Optimize one file in place. Returns the sizes when it was rewritten.
pub fn optimize_file(
    path: &Path,
    codec: ImageCodec,
    options: &ImageminOptions,
) -> Result<Option<(u64, u64)>, ImageminError> {
    let original = fs::read(path).map_err(|source| ImageminError::Read { path: path.to_path_buf(), source })?;
    if codec == ImageCodec::Svg && std::str::from_utf8(&original).is_err() {
        return Err(ImageminError::Svg(path.to_path_buf()));
    }
    let optimized = codec
        .optimize(&original, options)
        .map_err(|source| ImageminError::Codec { path: path.to_path_buf(), source })?;

    if optimized.is_empty() || optimized.len() >= original.len() {
        return Ok(None);
    }
    fs::write(path, &optimized).map_err(|source| ImageminError::Write { path: path.to_path_buf(), source })?;
    Ok(Some((original.len() as u64, optimized.len() as u64)))
}

fn optimize_png(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive).write_image(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color(),
    )?;
    Ok(out)
}

fn jpeg_error(message: &str) -> ImageError {
    ImageError::Decoding(DecodingError::new(ImageFormat::Jpeg.into(), message.to_string()))
}

/// Drop comment and editor metadata segments, copying the entropy-coded
/// data untouched.
///
/// JFIF (APP0), EXIF (APP1), ICC profiles (APP2) and the Adobe color
/// transform (APP14) are kept since they change how the image renders.
pub fn strip_jpeg_metadata(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Err(jpeg_error("missing start of image marker"));
    }
    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..2]);
    let mut pos = 2;

    loop {
        if bytes.get(pos) != Some(&0xFF) {
            return Err(jpeg_error("expected segment marker"));
        }
        while bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = bytes.get(pos + 1) else {
            return Err(jpeg_error("truncated segment marker"));
        };
        match marker {
            // Start of scan or end of image: the rest is copied verbatim.
            0xDA | 0xD9 => {
                out.extend_from_slice(&bytes[pos..]);
                return Ok(out);
            }
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&bytes[pos..pos + 2]);
                pos += 2;
            }
            _ => {
                let Some(len) = bytes.get(pos + 2..pos + 4).map(|b| usize::from(u16::from_be_bytes([b[0], b[1]]))) else {
                    return Err(jpeg_error("truncated segment length"));
                };
                let end = pos + 2 + len;
                if len < 2 || end > bytes.len() {
                    return Err(jpeg_error("segment runs past end of file"));
                }
                let segment = &bytes[pos..end];
                if keep_jpeg_segment(marker, &segment[4..]) {
                    out.extend_from_slice(segment);
                }
                pos = end;
            }
        }
    }
}

fn keep_jpeg_segment(marker: u8, payload: &[u8]) -> bool {
    match marker {
        0xFE => false,
        0xE1 => payload.starts_with(b"Exif\0"),
        0xE0 | 0xE2 | 0xEE => true,
        0xE3..=0xEF => false,
        _ => true,
    }
}

fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if img.color() == ColorType::L8 {
        encoder.encode(img.as_bytes(), img.width(), img.height(), ColorType::L8)?;
    } else {
        let rgb = img.to_rgb8();
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
    }
    Ok(out)
}

fn optimize_gif(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let frames = GifDecoder::new(Cursor::new(bytes))?.into_frames().collect_frames()?;
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut out, 1);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

fn svg_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?s)<\?xml.*?\?>", ""),
            (r"(?s)<!DOCTYPE[^>]*>", ""),
            (r"(?s)<!--.*?-->", ""),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

fn tag_gap_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r">\s+<").ok()).as_ref()
}

fn text_element_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<text[\s>].*?</text\s*>").ok()).as_ref()
}

/// Remove whitespace between tags, except inside `<text>` where it renders.
fn collapse_tag_gaps(svg: &str) -> String {
    let (Some(gap), Some(text)) = (tag_gap_pattern(), text_element_pattern()) else {
        return svg.to_string();
    };
    let texts: Vec<_> = text.find_iter(svg).map(|m| m.range()).collect();
    gap.replace_all(svg, |caps: &Captures| match caps.get(0) {
        Some(m) if texts.iter().any(|r| r.start < m.start() && m.end() <= r.end) => m.as_str().to_string(),
        _ => "><".to_string(),
    })
    .into_owned()
}

fn view_box_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"\s+viewBox\s*=\s*"\s*0[\s,]+0[\s,]+([\d.]+)[\s,]+([\d.]+)\s*""#).ok())
        .as_ref()
}

/// Strip declarations, comments and inter-tag whitespace from an SVG.
///
/// With `remove_view_box`, a root `viewBox="0 0 W H"` is dropped when the
/// element also carries `width="W"` and `height="H"`.
pub fn optimize_svg(svg: &str, remove_view_box: bool) -> String {
    let mut out = svg.to_string();
    for (pattern, replacement) in svg_patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out = collapse_tag_gaps(&out);
    if remove_view_box {
        out = strip_redundant_view_box(&out);
    }
    out.trim().to_string()
}

fn strip_redundant_view_box(svg: &str) -> String {
    let Some(start) = svg.find("<svg") else {
        return svg.to_string();
    };
    let Some(len) = svg[start..].find('>') else {
        return svg.to_string();
    };
    let tag = &svg[start..start + len];
    let Some(pattern) = view_box_pattern() else {
        return svg.to_string();
    };
    let Some(caps) = pattern.captures(tag) else {
        return svg.to_string();
    };
    let has_attr = |name: &str, value: &str| {
        tag.contains(&format!("{}=\"{}\"", name, value)) || tag.contains(&format!("{}=\"{}px\"", name, value))
    };
    if !(has_attr("width", &caps[1]) && has_attr("height", &caps[2])) {
        return svg.to_string();
    }
    let stripped = pattern.replace(tag, "");
    format!("{}{}{}", &svg[..start], stripped, &svg[start + len..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn options(dir: &Path) -> ImageminOptions {
        ImageminOptions { dirs: vec![dir.to_path_buf()], jpeg_quality: None, remove_view_box: true }
    }

    #[test]
    fn test_codec_for_path() {
        assert_eq!(ImageCodec::for_path(Path::new("a/b.PNG")), Some(ImageCodec::Png));
        assert_eq!(ImageCodec::for_path(Path::new("b.jpeg")), Some(ImageCodec::Jpeg));
        assert_eq!(ImageCodec::for_path(Path::new("b.jpg")), Some(ImageCodec::Jpeg));
        assert_eq!(ImageCodec::for_path(Path::new("b.gif")), Some(ImageCodec::Gif));
        assert_eq!(ImageCodec::for_path(Path::new("b.svg")), Some(ImageCodec::Svg));
        assert_eq!(ImageCodec::for_path(Path::new("b.webp")), None);
        assert_eq!(ImageCodec::for_path(Path::new("README")), None);
    }

    #[test]
    fn test_optimize_svg() {
        let svg = "<?xml version=\"1.0\"?>\n<!-- editor -->\n<svg width=\"10\" height=\"20\" viewBox=\"0 0 10 20\">\n  <rect/>\n</svg>\n";
        assert_eq!(optimize_svg(svg, true), "<svg width=\"10\" height=\"20\"><rect/></svg>");
        assert_eq!(
            optimize_svg(svg, false),
            "<svg width=\"10\" height=\"20\" viewBox=\"0 0 10 20\"><rect/></svg>"
        );
    }

    #[test]
    fn test_svg_keeps_whitespace_inside_text() {
        let svg = "<svg>\n  <text x=\"0\"><tspan>Hello</tspan> <tspan>World</tspan></text>\n  <rect/>\n</svg>";
        assert_eq!(
            optimize_svg(svg, true),
            "<svg><text x=\"0\"><tspan>Hello</tspan> <tspan>World</tspan></text><rect/></svg>"
        );
    }

    #[test]
    fn test_svg_keeps_scaling_view_box() {
        let svg = "<svg width=\"10\" height=\"10\" viewBox=\"0 0 100 100\"><rect/></svg>";
        assert_eq!(optimize_svg(svg, true), svg);
    }

    #[test]
    fn test_png_round_trips_pixels() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        PngEncoder::new_with_quality(&mut png, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 16, 16, ColorType::Rgba8)
            .unwrap();

        let optimized = optimize_png(&png).unwrap();
        let decoded = image::load_from_memory(&optimized).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    fn photo_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 95)
            .encode(img.as_raw(), 64, 64, ColorType::Rgb8)
            .unwrap();
        jpeg
    }

    fn with_segment(jpeg: &[u8], marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, marker]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_jpeg_default_is_lossless() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("photo.jpg");
        let original = photo_jpeg();
        let tagged = with_segment(&with_segment(&original, 0xE1, b"Exif\0\0MM"), 0xFE, b"saved by an editor");
        fs::write(&path, &tagged).unwrap();

        let result = optimize_file(&path, ImageCodec::Jpeg, &options(temp.path())).unwrap();
        let written = fs::read(&path).unwrap();
        assert_eq!(result, Some((tagged.len() as u64, written.len() as u64)));
        assert_eq!(written, with_segment(&original, 0xE1, b"Exif\0\0MM"));
        assert_eq!(
            image::load_from_memory(&written).unwrap().to_rgb8(),
            image::load_from_memory(&original).unwrap().to_rgb8()
        );
    }

    #[test]
    fn test_jpeg_without_metadata_left_alone() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("photo.jpg");
        let original = photo_jpeg();
        fs::write(&path, &original).unwrap();

        assert_eq!(optimize_file(&path, ImageCodec::Jpeg, &options(temp.path())).unwrap(), None);
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_jpeg_quality_opts_into_reencoding() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("photo.jpg");
        fs::write(&path, photo_jpeg()).unwrap();
        let lossy = ImageminOptions { jpeg_quality: Some(10), ..options(temp.path()) };

        let result = optimize_file(&path, ImageCodec::Jpeg, &lossy).unwrap();
        assert!(matches!(result, Some((before, after)) if after < before));
    }

    #[test]
    fn test_strip_jpeg_rejects_non_jpeg() {
        assert!(strip_jpeg_metadata(b"GIF89a").is_err());
        assert!(strip_jpeg_metadata(&[0xFF, 0xD8, 0xFF, 0xFE, 0x00]).is_err());
    }

    #[test]
    fn test_optimize_file_only_writes_smaller() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tiny.svg");
        fs::write(&path, "<svg/>").unwrap();

        let result = optimize_file(&path, ImageCodec::Svg, &options(temp.path())).unwrap();
        assert!(result.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<svg/>");
    }

    #[test]
    fn test_optimize_dirs_recurses_and_skips_unknown() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("icons");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.svg"), "<svg>\n  <!-- x -->\n  <g/>\n</svg>\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "keep   me").unwrap();
        fs::write(temp.path().join("broken.png"), "not a png").unwrap();

        let summary = optimize_dirs(&options(temp.path()), &ErrorReporter::default());
        assert_eq!(summary.optimized.len(), 1);
        assert_eq!(summary.failed, vec![temp.path().join("broken.png")]);
        assert_eq!(fs::read_to_string(nested.join("a.svg")).unwrap(), "<svg><g/></svg>");
        assert_eq!(fs::read_to_string(temp.path().join("notes.txt")).unwrap(), "keep   me");
    }

    #[test]
    fn test_run_imagemin_without_dirs() {
        let result = run_imagemin(&ImageminConfig::default(), &ErrorReporter::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(NO_DIRS_WARNING[0], "No image directories to minify");
    }

    #[test]
    fn test_invalid_dir_is_fatal() {
        let config = ImageminConfig { dirs: vec!["/definitely/not/here".into()], ..Default::default() };
        let result = ImageminOptions::resolve(&config);
        assert!(matches!(result, Err(FatalError::InvalidDirectory { label: "Imagemin", .. })));
    }
}
