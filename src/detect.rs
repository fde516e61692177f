//! Artifact format detection
//!
//! Decides what kind of file the downloader produced before it is handed to
//! the converter. Content is sniffed first (magic numbers, leading document
//! markers); the file extension is only consulted when the bytes are not
//! conclusive, so a zip served as `sbom.json` is still treated as an archive.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Number of leading bytes inspected (covers the tar header magic at 257..262)
const SNIFF_LEN: usize = 512;

/// Offset of the `ustar` magic inside a tar header
const TAR_MAGIC_OFFSET: usize = 257;

/// Archive container formats recognized by the detector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// ZIP container (also jar, war, whl, nupkg)
    Zip,
    /// gzip stream (typically a compressed tarball)
    Gzip,
    /// bzip2 stream
    Bzip2,
    /// xz stream
    Xz,
    /// Zstandard stream
    Zstd,
    /// 7-Zip archive
    SevenZip,
    /// RAR archive
    Rar,
    /// Uncompressed tarball
    Tar,
}

impl ArchiveKind {
    /// Short lowercase name used in skip markers and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Gzip => "gzip",
            ArchiveKind::Bzip2 => "bzip2",
            ArchiveKind::Xz => "xz",
            ArchiveKind::Zstd => "zstd",
            ArchiveKind::SevenZip => "7z",
            ArchiveKind::Rar => "rar",
            ArchiveKind::Tar => "tar",
        }
    }
}

/// Serialization hint for a file that already looks like an SBOM document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentHint {
    /// JSON (CycloneDX, SPDX or Syft JSON)
    Json,
    /// XML (CycloneDX XML)
    Xml,
    /// SPDX tag-value text
    SpdxTagValue,
    /// YAML (SPDX YAML)
    Yaml,
}

impl DocumentHint {
    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentHint::Json => "json",
            DocumentHint::Xml => "xml",
            DocumentHint::SpdxTagValue => "spdx-tag-value",
            DocumentHint::Yaml => "yaml",
        }
    }
}

/// What the downloaded artifact appears to be
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ArtifactKind {
    /// An existing SBOM document that can be converted directly
    SbomDocument(DocumentHint),
    /// An archive container
    Archive(ArchiveKind),
    /// Neither content nor extension were recognized
    Unknown,
}

impl ArtifactKind {
    /// Whether the artifact is an archive container
    pub fn is_archive(&self) -> bool {
        matches!(self, ArtifactKind::Archive(_))
    }

    /// Short label for skip markers and logs
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::SbomDocument(hint) => hint.as_str(),
            ArtifactKind::Archive(kind) => kind.as_str(),
            ArtifactKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Detect the kind of artifact stored at `path`
///
/// Reads at most the first 512 bytes. An empty file is `Unknown` unless its
/// extension says otherwise.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub async fn detect_artifact(path: &Path) -> Result<ArtifactKind> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = vec![0u8; SNIFF_LEN];
    let mut filled = 0;

    // read() may return short counts, keep going until the buffer is full or EOF
    while filled < SNIFF_LEN {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);

    let kind = sniff_content(&head)
        .or_else(|| kind_from_extension(path))
        .unwrap_or(ArtifactKind::Unknown);

    tracing::debug!(path = %path.display(), kind = %kind, "artifact detected");
    Ok(kind)
}

/// Classify a file from its leading bytes
pub fn sniff_content(head: &[u8]) -> Option<ArtifactKind> {
    if let Some(kind) = sniff_archive(head) {
        return Some(ArtifactKind::Archive(kind));
    }
    sniff_document(head).map(ArtifactKind::SbomDocument)
}

fn sniff_archive(head: &[u8]) -> Option<ArchiveKind> {
    const SIGNATURES: &[(&[u8], ArchiveKind)] = &[
        (b"PK\x03\x04", ArchiveKind::Zip),
        // empty zip
        (b"PK\x05\x06", ArchiveKind::Zip),
        (b"\x1f\x8b", ArchiveKind::Gzip),
        (b"BZh", ArchiveKind::Bzip2),
        (b"\xfd7zXZ\x00", ArchiveKind::Xz),
        (b"\x28\xb5\x2f\xfd", ArchiveKind::Zstd),
        (b"7z\xbc\xaf\x27\x1c", ArchiveKind::SevenZip),
        (b"Rar!\x1a\x07", ArchiveKind::Rar),
    ];

    if let Some((_, kind)) = SIGNATURES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return Some(*kind);
    }

    if head.len() >= TAR_MAGIC_OFFSET + 5
        && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
    {
        return Some(ArchiveKind::Tar);
    }

    None
}

fn sniff_document(head: &[u8]) -> Option<DocumentHint> {
    let text = head.strip_prefix(b"\xef\xbb\xbf").unwrap_or(head);
    let start = text.iter().position(|b| !b.is_ascii_whitespace())?;
    let text = &text[start..];

    match text.first() {
        Some(b'{') => Some(DocumentHint::Json),
        Some(b'<') => Some(DocumentHint::Xml),
        _ if text.starts_with(b"SPDXVersion:") => Some(DocumentHint::SpdxTagValue),
        _ => None,
    }
}

/// Classify a file from its extension alone
pub fn kind_from_extension(path: &Path) -> Option<ArtifactKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    let kind = match ext.as_str() {
        "json" | "cdx" => ArtifactKind::SbomDocument(DocumentHint::Json),
        "xml" => ArtifactKind::SbomDocument(DocumentHint::Xml),
        "spdx" => ArtifactKind::SbomDocument(DocumentHint::SpdxTagValue),
        "yaml" | "yml" => ArtifactKind::SbomDocument(DocumentHint::Yaml),
        "zip" | "jar" | "war" | "ear" | "whl" | "nupkg" | "egg" => {
            ArtifactKind::Archive(ArchiveKind::Zip)
        }
        "gz" | "tgz" => ArtifactKind::Archive(ArchiveKind::Gzip),
        "bz2" | "tbz2" => ArtifactKind::Archive(ArchiveKind::Bzip2),
        "xz" | "txz" => ArtifactKind::Archive(ArchiveKind::Xz),
        "zst" => ArtifactKind::Archive(ArchiveKind::Zstd),
        "7z" => ArtifactKind::Archive(ArchiveKind::SevenZip),
        "rar" => ArtifactKind::Archive(ArchiveKind::Rar),
        "tar" => ArtifactKind::Archive(ArchiveKind::Tar),
        _ => return None,
    };

    Some(kind)
}
