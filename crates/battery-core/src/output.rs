use crate::OutputError;
use serde::Serialize;
use std::io::Write;

/// Encoding of read results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

/// Serializes read results in the selected encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn write<T, W>(&self, data: &T, out: &mut W) -> Result<(), OutputError>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, data)?;
                writeln!(out)?;
            }
            OutputFormat::Yaml => serde_yaml::to_writer(&mut *out, data)?,
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_string<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, OutputError> {
        let mut buf = Vec::new();
        self.write(data, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_output() {
        let w = OutputWriter::new(OutputFormat::Yaml);
        let out = w
            .to_string(&json!({"data": "this is read-only data from the config"}))
            .unwrap();
        assert_eq!(out.trim(), "data: this is read-only data from the config");
    }

    #[test]
    fn test_json_output_is_pretty() {
        let w = OutputWriter::new(OutputFormat::Json);
        let out = w.to_string(&json!({"temperature": 21})).unwrap();
        assert_eq!(out, "{\n  \"temperature\": 21\n}\n");
    }

    #[test]
    fn test_nested_values_round_trip_through_yaml() {
        let data = json!({"sensor": {"values": [1, 2.5, "x"], "ok": true}});
        let out = OutputWriter::new(OutputFormat::Yaml).to_string(&data).unwrap();
        let back: serde_json::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_default_format_is_yaml() {
        assert_eq!(OutputFormat::default(), OutputFormat::Yaml);
        let out = OutputWriter::default().to_string(&json!({"ok": true})).unwrap();
        assert_eq!(out.trim(), "ok: true");
    }

    #[cfg(feature = "clap")]
    #[test]
    fn test_format_value_names() {
        use clap::ValueEnum;
        let names: Vec<String> = OutputFormat::value_variants()
            .iter()
            .filter_map(|f| f.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["json", "yaml"]);
        assert_eq!(OutputFormat::from_str("json", true), Ok(OutputFormat::Json));
    }
}
