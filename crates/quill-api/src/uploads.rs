use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// URL prefix the server mounts the upload directory under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Cover images on local disk.
///
/// Each upload is stored as `{dir}/{uuid}.{ext}` and referenced from posts by
/// its public path `/uploads/{uuid}.{ext}`.
pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, max_bytes: usize) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Write an image and return its public path.
    pub async fn store(&self, data: &[u8], extension: &str) -> Result<String> {
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.dir.join(&file_name);

        let written = write_file(&path, data).await;
        discard_on_error(&path, written).await?;

        Ok(format!("{}/{}", PUBLIC_PREFIX, file_name))
    }

    /// Best-effort removal of a previously stored image. Paths that were not
    /// produced by `store` are ignored.
    pub async fn remove(&self, public_path: &str) {
        let Some(file_name) = stored_file_name(public_path) else {
            warn!("Refusing to remove unrecognised upload path '{}'", public_path);
            return;
        };

        match fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => info!("Removed upload {}", file_name),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", file_name);
            }
            Err(e) => warn!("Failed to remove upload {}: {}", file_name, e),
        }
    }
}

async fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await
}

/// A failed write must not leave a partial file behind.
async fn discard_on_error<T>(path: &Path, result: io::Result<T>) -> io::Result<T> {
    if let Err(e) = &result {
        warn!("Failed to write upload {}: {}", path.display(), e);
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial upload {}: {}", path.display(), e),
        }
    }
    result
}

/// Map an uploaded part's content type to the extension it is stored under.
/// Only raster image formats browsers render inline are accepted.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `/uploads/{uuid}.{ext}` -> `{uuid}.{ext}`, rejecting anything that could
/// escape the upload directory.
fn stored_file_name(public_path: &str) -> Option<&str> {
    let name = public_path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    let (stem, ext) = name.split_once('.')?;
    stem.parse::<Uuid>().ok()?;
    ext.chars().all(|c| c.is_ascii_alphanumeric()).then_some(name)
}
