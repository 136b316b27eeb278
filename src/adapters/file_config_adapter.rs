//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
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

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
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

    fn get_section(&self, section: &str) -> Vec<(String, String)> {
        let map = self.config.get_map_ref();
        let Some(entries) = map.get(&section.to_lowercase()) else {
            return vec![];
        };
        let mut pairs: Vec<(String, String)> = entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
csv_dir = /var/data/prices

[backtest]
initial = 1000.0
contribution = 80
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "csv_dir"),
            Some("/var/data/prices".to_string())
        );
        assert_eq!(adapter.get_double("backtest", "initial", 0.0), 1000.0);
        assert_eq!(adapter.get_int("backtest", "contribution", 0), 80);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_int("backtest", "missing", 42), 42);
        assert_eq!(adapter.get_double("missing", "key", 9.5), 9.5);
        assert!(adapter.get_bool("backtest", "missing", true));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[s]\na = true\nb = yes\nc = 0\nd = garbage\n").unwrap();
        assert!(adapter.get_bool("s", "a", false));
        assert!(adapter.get_bool("s", "b", false));
        assert!(!adapter.get_bool("s", "c", true));
        assert!(adapter.get_bool("s", "d", true));
    }

    #[test]
    fn get_section_returns_sorted_pairs() {
        let content = "[portfolio.growth]\nqld = 30\nmags = 20\ntqqq = 10\n";
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        let pairs = adapter.get_section("portfolio.growth");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("mags".to_string(), "20".to_string()));
        assert_eq!(pairs[1], ("qld".to_string(), "30".to_string()));
    }

    #[test]
    fn get_section_missing_is_empty() {
        let adapter = FileConfigAdapter::from_string("[a]\nx = 1\n").unwrap();
        assert!(adapter.get_section("nope").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[data]\ncsv_dir = /tmp/prices\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "csv_dir"),
            Some("/tmp/prices".to_string())
        );
    }

    #[test]
    fn from_file_errors_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/riskpulse.ini").is_err());
    }
}
