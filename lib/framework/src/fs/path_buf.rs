use std::fs;
use std::path::PathBuf;

use crate::exception::CoreRsResult;
use crate::exception::error_code;

pub trait PathBufExt {
    fn into_absolute_path(self) -> CoreRsResult<PathBuf>;

    fn ensure_dir(self) -> CoreRsResult<PathBuf>;
}

impl PathBufExt for PathBuf {
    fn into_absolute_path(self) -> CoreRsResult<PathBuf> {
        if self.is_absolute() {
            return Ok(self);
        }
        let current_dir = std::env::current_dir()
            .map_err(|err| exception!(message = "failed to get current directory", source = err))?;
        Ok(current_dir.join(self))
    }

    fn ensure_dir(self) -> CoreRsResult<PathBuf> {
        if !self.exists() {
            fs::create_dir_all(&self).map_err(|err| {
                exception!(
                    code = error_code::IO_ERROR,
                    message = format!("failed to create dir, path={}", self.to_string_lossy()),
                    source = err
                )
            })?;
        }
        Ok(self)
    }
}
