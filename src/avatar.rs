// Avatar resolution: a source is either an absolute URL (fetched over HTTP)
// or a local path (read from disk). The bytes are sniffed by their magic
// numbers, never by extension or declared header, and only PNG and JPEG are
// accepted.

use crate::api::HttpClient;
use crate::error::AvatarError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const ALLOWED_AVATAR_MIME_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// Only this many leading bytes are inspected when sniffing.
const SNIFF_LEN: usize = 512;

/// An accepted avatar image, ready to send. Serializes as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAvatar {
    pub mime: &'static str,
    pub base64: String,
}

impl fmt::Display for EncodedAvatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, self.base64)
    }
}

impl Serialize for EncodedAvatar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// True when `source` parses as a URL with both a scheme and a host.
///
/// `Url::parse` repairs inputs such as `http:/host` or `https:\\host`, so
/// the `<scheme>://` shape is checked on the raw string first.
pub fn is_absolute_url(source: &str) -> bool {
    if !has_authority_prefix(source) {
        return false;
    }
    match Url::parse(source) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

fn has_authority_prefix(source: &str) -> bool {
    if source.contains('\\') || source.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let Some((scheme, rest)) = source.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && rest.starts_with("//")
}

/// Load, validate and encode the avatar at `source`.
pub fn resolve_avatar<H: HttpClient + ?Sized>(
    source: &str,
    http: &H,
) -> Result<EncodedAvatar, AvatarError> {
    let img = if is_absolute_url(source) {
        log::debug!("fetching avatar from {source}");
        fetch_image(source, http)?
    } else {
        log::debug!("reading avatar from {source}");
        read_image(Path::new(source))?
    };

    encode_image(&img)
}

fn fetch_image<H: HttpClient + ?Sized>(url: &str, http: &H) -> Result<Vec<u8>, AvatarError> {
    let res = http.get(url, FETCH_TIMEOUT).map_err(AvatarError::Fetch)?;
    if res.status != StatusCode::OK {
        return Err(AvatarError::Status(res.status.to_string()));
    }
    Ok(res.body)
}

fn read_image(path: &Path) -> Result<Vec<u8>, AvatarError> {
    std::fs::metadata(path).map_err(|source| AvatarError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::read(path).map_err(|source| AvatarError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Check `img` is a non-empty PNG or JPEG and base64 it.
pub fn encode_image(img: &[u8]) -> Result<EncodedAvatar, AvatarError> {
    if img.is_empty() {
        return Err(AvatarError::Empty);
    }

    let mime = sniff_content_type(img);
    log::debug!("avatar is {} bytes of {mime}", img.len());
    if !ALLOWED_AVATAR_MIME_TYPES.contains(&mime) {
        return Err(AvatarError::MimeNotAllowed(mime.to_string()));
    }

    Ok(EncodedAvatar {
        mime,
        base64: STANDARD.encode(img),
    })
}

/// Detect the content type of `data` from its leading bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if data.len() >= 14 && &data[0..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }
    if data.starts_with(b"BM") {
        return "image/bmp";
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) || data.starts_with(&[0x00, 0x00, 0x02, 0x00])
    {
        return "image/x-icon";
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        return "audio/wave";
    }
    if data.starts_with(b"ID3") {
        return "audio/mpeg";
    }
    if data.starts_with(b"OggS\x00") {
        return "application/ogg";
    }
    if is_mp4(data) {
        return "video/mp4";
    }
    if data.starts_with(b"wOFF") {
        return "font/woff";
    }
    if data.starts_with(b"wOF2") {
        return "font/woff2";
    }
    if data.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if data.starts_with(b"PK\x03\x04") {
        return "application/zip";
    }
    if data.starts_with(&[0x1F, 0x8B, 0x08]) {
        return "application/x-gzip";
    }
    if let Some(mime) = sniff_markup(data) {
        return mime;
    }

    if data.iter().any(|&b| is_binary_byte(b)) {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

const HTML_TAGS: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// HTML is recognized by a known opening tag after leading whitespace,
/// followed by a space or `>`.
fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' '))?;
    let data = &data[start..];

    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }
    let is_html = HTML_TAGS.iter().any(|tag| {
        data.len() > tag.len()
            && data[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(data[tag.len()], b' ' | b'>')
    });
    is_html.then_some("text/html; charset=utf-8")
}

/// An `ftyp` box whose major or compatible brands include `mp4*`.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|&st| st != 12)
        .any(|st| st + 3 <= box_size && &data[st..st + 3] == b"mp4")
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
