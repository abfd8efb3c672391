use std::fs::read_to_string;
use std::path::Path;

use serde::Serialize;
use serde::de::Deserialize;
use serde::de::DeserializeOwned;

use crate::exception::CoreRsResult;
use crate::exception::error_code;

pub fn load_file<T>(path: &Path) -> CoreRsResult<T>
where
    T: DeserializeOwned,
{
    let json = read_to_string(path).map_err(|err| {
        exception!(
            code = error_code::IO_ERROR,
            message = format!("failed to read file, path={}", path.to_string_lossy()),
            source = err
        )
    })?;
    serde_json::from_str(&json).map_err(|err| {
        exception!(
            code = error_code::INVALID_JSON,
            message = format!("failed to deserialize file, path={}", path.to_string_lossy()),
            source = err
        )
    })
}

pub fn from_json<'a, T>(json: &'a str) -> CoreRsResult<T>
where
    T: Deserialize<'a>,
{
    serde_json::from_str(json).map_err(|err| {
        exception!(
            code = error_code::INVALID_JSON,
            message = format!("failed to deserialize, json={json}"),
            source = err
        )
    })
}

pub fn to_json<T>(object: &T) -> CoreRsResult<String>
where
    T: Serialize,
{
    serde_json::to_string(object)
        .map_err(|err| exception!(code = error_code::INVALID_JSON, message = "failed to serialize", source = err))
}

pub fn to_json_pretty<T>(object: &T) -> CoreRsResult<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(object)
        .map_err(|err| exception!(code = error_code::INVALID_JSON, message = "failed to serialize", source = err))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::exception::error_code;

    #[test]
    fn from_json() {
        let map: BTreeMap<String, i32> = super::from_json(r#"{"a":1}"#).unwrap();
        assert_eq!(map.get("a"), Some(&1));

        let error = super::from_json::<BTreeMap<String, i32>>("{not json").err().unwrap();
        assert_eq!(error.code.as_deref(), Some(error_code::INVALID_JSON));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = super::load_file::<BTreeMap<String, i32>>(&dir.path().join("missing.json"))
            .err()
            .unwrap();
        assert_eq!(error.code.as_deref(), Some(error_code::IO_ERROR));
    }
}
