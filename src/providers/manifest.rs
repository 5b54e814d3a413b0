//! Main-section headers of an archive's `META-INF/MANIFEST.MF`.
//!
//! The class path is scanned for the first element whose path ends with the
//! requested archive name. Zip archives (stored or deflated entries) and
//! exploded directories are both supported; see [`read_zip_entry`] for the
//! zip forms that are rejected.

use super::{Provider, ProviderRequest, ProviderResult, non_empty};
use crate::cache::SourceCache;
use crate::error::ProviderError;
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Parsed main section of a manifest. Header names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    headers: HashMap<String, String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        let mut headers = HashMap::new();
        let mut current: Option<(String, String)> = None;
        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                // End of the main section.
                break;
            }
            if let Some(continued) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continued);
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                headers.insert(name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                current = Some((name.trim().to_ascii_lowercase(), value.to_string()));
            }
        }
        if let Some((name, value)) = current {
            headers.insert(name, value);
        }
        Self { headers }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.headers
            .get(&header.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

pub struct ManifestProvider {
    class_path: Vec<PathBuf>,
    cache: SourceCache<Manifest>,
}

impl ManifestProvider {
    pub fn new(class_path: Vec<PathBuf>) -> Self {
        Self {
            class_path,
            cache: SourceCache::new("manifest"),
        }
    }

    /// Class path taken from the `CLASSPATH` environment variable.
    pub fn from_env() -> Self {
        let class_path = std::env::var_os("CLASSPATH")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        Self::new(class_path)
    }

    fn find_archive(&self, archive: &str) -> Option<&Path> {
        self.class_path
            .iter()
            .find(|element| element.to_string_lossy().ends_with(archive))
            .map(PathBuf::as_path)
    }

    fn load(&self, archive: &str) -> Result<Manifest, ProviderError> {
        let element = self.find_archive(archive).ok_or_else(|| {
            ProviderError::unavailable(
                archive,
                format!(
                    "archive not found in class path '{}'",
                    std::env::join_paths(&self.class_path)
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
            )
        })?;
        debug!(archive = %archive, path = %element.display(), "Reading manifest");

        let bytes = if element.is_dir() {
            std::fs::read(element.join(MANIFEST_PATH))
                .map_err(|e| ProviderError::unavailable(archive, e))?
        } else {
            let data = std::fs::read(element).map_err(|e| ProviderError::unavailable(archive, e))?;
            read_zip_entry(&data, MANIFEST_PATH)
                .map_err(|e| ProviderError::unavailable(archive, e))?
                .ok_or_else(|| ProviderError::unavailable(archive, "archive has no manifest"))?
        };
        Ok(Manifest::parse(&String::from_utf8_lossy(&bytes)))
    }
}

impl Provider for ManifestProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let archive = request.params.required("archive")?;
        let header = request.params.required("header")?;

        let manifest = self
            .cache
            .get_or_load(archive, request.policy, || self.load(archive))?;

        let value = manifest.get(header).map(str::to_string);
        if value.is_none() {
            warn!(header = %header, archive = %archive, "Header not found in manifest");
        }
        Ok(non_empty(value, header, archive))
    }
}

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_SIGNATURE: u32 = 0x0403_4b50;
const EOCD_LEN: usize = 22;

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn corrupt(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("corrupt zip archive: {}", what))
}

fn unsupported(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Unsupported, format!("unsupported zip archive: {}", what))
}

/// Extract one entry from an in-memory zip archive, `Ok(None)` if absent.
///
/// Only single-disk archives without zip64 extensions are read, and only
/// unencrypted entries that are stored or deflated. Anything else fails with
/// [`std::io::ErrorKind::Unsupported`] rather than being misread. The end of
/// central directory record is the one whose comment length reaches exactly
/// to the end of the data, so a comment containing the record signature does
/// not confuse the lookup. Entry names are compared ASCII case-insensitively.
pub fn read_zip_entry(data: &[u8], name: &str) -> std::io::Result<Option<Vec<u8>>> {
    if data.len() < EOCD_LEN {
        return Err(corrupt("too short"));
    }
    let earliest = data.len().saturating_sub(EOCD_LEN + u16::MAX as usize);
    let eocd = (earliest..=data.len() - EOCD_LEN)
        .rev()
        .find(|&i| {
            u32_at(data, i) == Some(EOCD_SIGNATURE)
                && u16_at(data, i + 20).is_some_and(|len| i + EOCD_LEN + len as usize == data.len())
        })
        .ok_or_else(|| corrupt("no end of central directory"))?;

    let disk = u16_at(data, eocd + 4).ok_or_else(|| corrupt("disk number"))?;
    let directory_disk = u16_at(data, eocd + 6).ok_or_else(|| corrupt("disk number"))?;
    if disk != 0 || directory_disk != 0 {
        return Err(unsupported("multi-disk archive"));
    }
    let entries = u16_at(data, eocd + 10).ok_or_else(|| corrupt("entry count"))?;
    let directory = u32_at(data, eocd + 16).ok_or_else(|| corrupt("directory offset"))?;
    if entries == u16::MAX || directory == u32::MAX {
        return Err(unsupported("zip64"));
    }
    let mut offset = directory as usize;

    for _ in 0..entries {
        if u32_at(data, offset) != Some(CENTRAL_SIGNATURE) {
            return Err(corrupt("bad central directory entry"));
        }
        let field = |rel: usize| u16_at(data, offset + rel).map(usize::from).ok_or_else(|| corrupt("header"));
        let flags = field(8)?;
        let method = field(10)?;
        let name_len = field(28)?;
        let extra_len = field(30)?;
        let comment_len = field(32)?;
        let compressed = u32_at(data, offset + 20).ok_or_else(|| corrupt("size"))?;
        let local = u32_at(data, offset + 42).ok_or_else(|| corrupt("local offset"))?;
        let entry_name = data
            .get(offset + 46..offset + 46 + name_len)
            .ok_or_else(|| corrupt("name"))?;

        if entry_name.eq_ignore_ascii_case(name.as_bytes()) {
            if flags & 0x1 != 0 {
                return Err(unsupported("encrypted entry"));
            }
            if compressed == u32::MAX || local == u32::MAX {
                return Err(unsupported("zip64"));
            }
            return read_local_entry(data, local as usize, method, compressed as usize).map(Some);
        }
        offset += 46 + name_len + extra_len + comment_len;
    }
    Ok(None)
}

fn read_local_entry(data: &[u8], offset: usize, method: usize, compressed: usize) -> std::io::Result<Vec<u8>> {
    if u32_at(data, offset) != Some(LOCAL_SIGNATURE) {
        return Err(corrupt("bad local header"));
    }
    let name_len = u16_at(data, offset + 26).ok_or_else(|| corrupt("local header"))? as usize;
    let extra_len = u16_at(data, offset + 28).ok_or_else(|| corrupt("local header"))? as usize;
    let start = offset + 30 + name_len + extra_len;
    let raw = data
        .get(start..start + compressed)
        .ok_or_else(|| corrupt("entry data"))?;

    match method {
        0 => Ok(raw.to_vec()),
        8 => {
            let mut out = Vec::new();
            DeflateDecoder::new(raw).read_to_end(&mut out)?;
            Ok(out)
        }
        other => Err(unsupported(&format!("compression method {}", other))),
    }
}
