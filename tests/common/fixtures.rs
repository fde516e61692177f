//! Artifacts and a scripted stand-in for the SBOM engine

use std::path::{Path, PathBuf};

/// Minimal CycloneDX document
pub const MINIMAL_CYCLONEDX: &str =
    r#"{"bomFormat": "CycloneDX", "specVersion": "1.4", "components": []}"#;

/// Minimal SPDX JSON document
pub const MINIMAL_SPDX: &str = r#"{"spdxVersion": "SPDX-2.3", "SPDXID": "SPDXRef-DOCUMENT", "name": "fixture", "packages": []}"#;

/// Marker that makes the scripted engine fail on an input
pub const BROKEN_MARKER: &str = "BROKEN-SBOM";

/// Shell script behaving like the engine's `convert` and `--version` commands
///
/// JSON formats echo the input back; other formats print a fixed text
/// document. Inputs containing [`BROKEN_MARKER`] fail with exit status 1.
const ENGINE_SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "Application:   syft"
    echo "Version:       0.99.1"
    exit 0
fi
if [ "$1" != "convert" ] || [ "$3" != "-o" ]; then
    echo "usage: convert <file> -o <format>" >&2
    exit 2
fi
if grep -q "BROKEN-SBOM" "$2"; then
    echo "failed to decode SBOM: unrecognized document" >&2
    exit 1
fi
case "$4" in
    *-json) cat "$2" ;;
    *) echo "SPDXVersion: SPDX-2.3" ;;
esac
"#;

/// Write the scripted engine into `dir` and return its path
#[cfg(unix)]
pub fn write_fake_engine(dir: &Path) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-syft");
    std::fs::write(&path, ENGINE_SCRIPT)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
