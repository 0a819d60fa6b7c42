use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use url::Url;

use crate::error::CatalogError;
use crate::seatable::SeaTableClient;

/// Length of the hex hash prefix used for cache filenames. Short enough to
/// stay readable; truncation collision risk is accepted.
const HASH_LEN: usize = 12;

/// Whether `ensure_downloaded` hit the cache or pulled bytes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Cached,
    Downloaded,
}

fn decoded_url_path(image_url: &str) -> Result<String, CatalogError> {
    let parsed = Url::parse(image_url)
        .map_err(|_| CatalogError::ImagePathUnrecognized(image_url.to_string()))?;
    Ok(percent_decode_str(parsed.path())
        .decode_utf8_lossy()
        .into_owned())
}

/// Derive the stable cache filename for an image URL.
///
/// Hash of the decoded URL path (includes upload uuid and date segments, so
/// same image = same filename, different uploads = different filenames),
/// truncated, with the original extension preserved.
pub fn derive_filename(image_url: &str) -> Result<String, CatalogError> {
    let path = decoded_url_path(image_url)?;

    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let extension = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    Ok(format!("{}{}", &digest[..HASH_LEN], extension))
}

/// Extract the asset's server-relative location from an image URL.
///
/// URL format: {server}/workspace/NN/asset/{uuid}/images/2024-02/file.jpg
/// The download-link endpoint wants everything after the asset uuid.
pub fn asset_relative_path(image_url: &str) -> Result<String, CatalogError> {
    let path = decoded_url_path(image_url)?;

    let after_asset = path
        .split_once("/asset/")
        .map(|(_, rest)| rest)
        .ok_or_else(|| CatalogError::ImagePathUnrecognized(path.clone()))?;

    match after_asset.split_once('/') {
        Some((_uuid, rest)) if !rest.is_empty() => Ok(rest.to_string()),
        _ => Err(CatalogError::ImagePathUnrecognized(path)),
    }
}

/// Make sure the image behind `image_url` exists in `cache_dir`, downloading
/// it if missing. Idempotent: a cached file short-circuits before any
/// network I/O. Bytes are streamed to a `.part` file and renamed into place
/// so an interrupted run never leaves a truncated file under a final name.
pub fn ensure_downloaded(
    client: &SeaTableClient,
    image_url: &str,
    cache_dir: &Path,
) -> Result<(String, FetchStatus)> {
    let filename = derive_filename(image_url)?;
    let target = cache_dir.join(&filename);

    if target.exists() {
        return Ok((filename, FetchStatus::Cached));
    }

    let relative_path = asset_relative_path(image_url)?;
    let download_url = client.download_link(&relative_path)?;

    let mut response = client.fetch_asset(&download_url)?;

    let part = cache_dir.join(format!("{}.part", filename));
    let mut file = fs::File::create(&part)
        .with_context(|| format!("Failed to create {:?}", part))?;
    if let Err(e) = response.copy_to(&mut file) {
        let _ = fs::remove_file(&part);
        return Err(e).with_context(|| format!("Failed to download: {}", download_url));
    }
    fs::rename(&part, &target)
        .with_context(|| format!("Failed to move {:?} into place", part))?;

    Ok((filename, FetchStatus::Downloaded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const IMAGE_URL: &str =
        "https://cloud.seatable.io/workspace/42/asset/3f2a9b1c-77de-4a10-9e65-08d1b2c3d4e5/images/2024-02/dawn.jpg";

    #[test]
    fn test_derive_filename_deterministic() {
        let a = derive_filename(IMAGE_URL).unwrap();
        let b = derive_filename(IMAGE_URL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_filename_preserves_extension() {
        let url = "https://cloud.seatable.io/workspace/1/asset/u/images/2024-02/file.JPG";
        let name = derive_filename(url).unwrap();
        assert!(name.ends_with(".JPG"), "got {}", name);
        assert_eq!(name.len(), HASH_LEN + 4);
    }

    #[test]
    fn test_derive_filename_no_extension() {
        let url = "https://cloud.seatable.io/workspace/1/asset/u/images/2024-02/file";
        let name = derive_filename(url).unwrap();
        assert_eq!(name.len(), HASH_LEN);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_derive_filename_distinct_paths() {
        let a = derive_filename("https://s/workspace/1/asset/u/images/2024-02/a.jpg").unwrap();
        let b = derive_filename("https://s/workspace/1/asset/u/images/2024-02/b.jpg").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_filename_decodes_percent_escapes() {
        // Encoded and literal forms of the same path name the same file
        let encoded = "https://s/workspace/1/asset/u/images/2024-02/my%20art.jpg";
        let literal = "https://s/workspace/1/asset/u/images/2024-02/my art.jpg";
        assert_eq!(
            derive_filename(encoded).unwrap(),
            derive_filename(literal).unwrap()
        );
    }

    #[test]
    fn test_derive_filename_bad_url() {
        assert!(matches!(
            derive_filename("not a url"),
            Err(CatalogError::ImagePathUnrecognized(_))
        ));
    }

    #[test]
    fn test_asset_relative_path() {
        assert_eq!(
            asset_relative_path(IMAGE_URL).unwrap(),
            "images/2024-02/dawn.jpg"
        );
    }

    #[test]
    fn test_asset_relative_path_no_asset_segment() {
        let url = "https://cloud.seatable.io/workspace/42/images/2024-02/dawn.jpg";
        assert!(matches!(
            asset_relative_path(url),
            Err(CatalogError::ImagePathUnrecognized(_))
        ));
    }

    #[test]
    fn test_asset_relative_path_nothing_after_uuid() {
        let url = "https://cloud.seatable.io/workspace/42/asset/some-uuid";
        assert!(matches!(
            asset_relative_path(url),
            Err(CatalogError::ImagePathUnrecognized(_))
        ));
    }

    #[test]
    fn test_ensure_downloaded_idempotent() {
        // Pre-seed the cache; the client points at an unroutable server, so
        // any network attempt would fail the test.
        let dir = tempdir().unwrap();
        let filename = derive_filename(IMAGE_URL).unwrap();
        fs::write(dir.path().join(&filename), b"jpeg bytes").unwrap();

        let client = SeaTableClient::new("http://127.0.0.1:9", "unused-token").unwrap();
        let (name, status) = ensure_downloaded(&client, IMAGE_URL, dir.path()).unwrap();
        assert_eq!(name, filename);
        assert_eq!(status, FetchStatus::Cached);
    }

    #[test]
    fn test_ensure_downloaded_bad_path_is_skippable() {
        let dir = tempdir().unwrap();
        let url = "https://cloud.seatable.io/workspace/42/no-asset-here/dawn.jpg";
        let client = SeaTableClient::new("http://127.0.0.1:9", "unused-token").unwrap();

        let err = ensure_downloaded(&client, url, dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::ImagePathUnrecognized(_))
        ));
    }
}
