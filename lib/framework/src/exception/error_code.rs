pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
pub const IO_ERROR: &str = "IO_ERROR";
pub const INVALID_JSON: &str = "INVALID_JSON";
pub const ASSET_NOT_FOUND: &str = "ASSET_NOT_FOUND";
