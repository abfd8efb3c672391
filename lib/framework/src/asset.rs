use std::env::current_exe;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::exception::CoreRsResult;
use crate::exception::error_code;

pub fn asset_path(path: &str) -> CoreRsResult<PathBuf> {
    let exe_path = current_exe()?;
    let asset_path = find_asset_path(&exe_path, path);
    if asset_path.exists() {
        Ok(asset_path)
    } else {
        Err(exception!(
            code = error_code::ASSET_NOT_FOUND,
            message = format!(
                "asset not found, asset={}, exe={}",
                asset_path.to_string_lossy(),
                exe_path.to_string_lossy()
            )
        ))
    }
}

// absolute paths are read as is, relative ones are resolved with asset_path
pub fn read_asset(path: &str) -> CoreRsResult<Vec<u8>> {
    let path_buf = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        asset_path(path)?
    };
    fs::read(&path_buf).map_err(|err| {
        exception!(
            code = error_code::IO_ERROR,
            message = format!("failed to read asset, path={}", path_buf.to_string_lossy()),
            source = err
        )
    })
}

#[cfg(debug_assertions)]
fn find_asset_path(exe_path: &Path, path: &str) -> PathBuf {
    let asset_path = exe_path.with_file_name(path);
    if asset_path.exists() {
        return asset_path;
    }
    // cargo run / cargo test, fall back to crate source folder
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    if !manifest_dir.is_empty() {
        let source_path = PathBuf::from(manifest_dir).join(path);
        if source_path.exists() {
            tracing::debug!("load asset from source folder, asset={}", source_path.to_string_lossy());
            return source_path;
        }
    }
    asset_path
}

#[cfg(not(debug_assertions))]
fn find_asset_path(exe_path: &Path, path: &str) -> PathBuf {
    exe_path.with_file_name(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::exception::error_code;

    #[test]
    fn read_absolute_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        fs::write(&path, [1_u8, 2, 3]).unwrap();

        let bytes = super::read_asset(&path.to_string_lossy()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn read_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");

        let error = super::read_asset(&path.to_string_lossy()).err().unwrap();
        assert_eq!(error.code.as_deref(), Some(error_code::IO_ERROR));
    }
}
