//! Common routines for handling input data.
use anyhow::{Context, Result};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// Read an f64, checking that it is in the range (0, 1]
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialise_proportion(deserialiser)?;
    if value == 0.0 {
        Err(serde::de::Error::custom("Value cannot be zero"))?;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        #[serde(deserialize_with = "deserialise_proportion")]
        share: f64,
        #[serde(default = "one", deserialize_with = "deserialise_proportion_nonzero")]
        efficiency: f64,
    }

    fn one() -> f64 {
        1.0
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("record.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id = \"battery\"\nshare = 0.25").unwrap();
        }

        let record: Record = read_toml(&file_path).unwrap();
        assert_eq!(
            record,
            Record {
                id: "battery".into(),
                share: 0.25,
                efficiency: 1.0,
            }
        );
    }

    #[test]
    fn test_read_toml_missing_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.toml");
        let result: Result<Record> = read_toml(&file_path);
        assert_eq!(
            result.unwrap_err().to_string(),
            input_err_msg(&file_path)
        );
    }

    #[test]
    fn test_deserialise_proportion() {
        let parse = |s: &str| toml::from_str::<Record>(s);

        assert!(parse("id = \"a\"\nshare = 0.0").is_ok());
        assert!(parse("id = \"a\"\nshare = 1.0").is_ok());
        assert!(parse("id = \"a\"\nshare = 1.5").is_err());
        assert!(parse("id = \"a\"\nshare = -0.1").is_err());
        assert!(parse("id = \"a\"\nshare = 0.5\nefficiency = 0.0").is_err());
    }
}
