//! INI file configuration adapter.

use crate::domain::error::LittermanError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LittermanError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| LittermanError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn sections(&self) -> Vec<String> {
        self.config.sections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[model]
risk_aversion = 3.0
return_method = log

[data]
prices = data/prices.csv
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "prices"),
            Some("data/prices.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("model", "return_method"),
            Some("log".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[model]\nrisk_aversion = 3\n").unwrap();
        assert_eq!(adapter.get_string("model", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[optimizer]\nmax_iterations = 250\nbad = abc\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("optimizer", "max_iterations", 0), 250);
        assert_eq!(adapter.get_int("optimizer", "missing", 42), 42);
        assert_eq!(adapter.get_int("optimizer", "bad", 42), 42);
    }

    #[test]
    fn get_bool_parses_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[model]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("model", "a", false));
        assert!(adapter.get_bool("model", "b", false));
        assert!(adapter.get_bool("model", "c", false));
        assert!(!adapter.get_bool("model", "d", true));
        assert!(!adapter.get_bool("model", "e", true));
        assert!(!adapter.get_bool("model", "f", true));
        assert!(adapter.get_bool("model", "missing", true));
    }

    #[test]
    fn sections_lists_view_sections() {
        let content = "[model]\nrisk_aversion = 3\n[view.tech]\nassets = A\n[view.banks]\nassets = B\n";
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        let mut sections = adapter.sections();
        sections.sort();
        assert_eq!(sections, vec!["model", "view.banks", "view.tech"]);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[report]\noutput = weights.csv\nformat = csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("report", "output"),
            Some("weights.csv".to_string())
        );
    }

    #[test]
    fn from_file_returns_config_parse_error_for_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, LittermanError::ConfigParse { .. }));
    }
}
