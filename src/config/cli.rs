use super::ClientConfig;
use crate::utils::error::{Error, Result};
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cloud-iface")]
#[command(about = "Exercise Google Cloud services through the cloud-iface adapters")]
pub struct CliConfig {
    #[arg(long, help = "TOML client configuration; read from the environment when omitted")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Overrides the configured project")]
    pub project: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Publish one message and print its server-assigned ID.
    Publish {
        topic: String,
        message: String,
        #[arg(long = "attr", value_parser = parse_key_val, help = "Attribute as key=value; repeatable")]
        attributes: Vec<(String, String)>,
    },
    /// List the variables of a runtime config.
    ListVariables { config_name: String },
    /// Fetch one entity by kind and name or ID.
    GetEntity {
        kind: String,
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        name: Option<String>,
        #[arg(long)]
        id: Option<i64>,
        #[arg(long, default_value = "")]
        namespace: String,
    },
    /// Run a query and print its rows as JSON lines.
    Query {
        sql: String,
        #[arg(long, default_value = "100")]
        max_rows: usize,
        #[arg(long)]
        location: Option<String>,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

impl CliConfig {
    /// Loads the client configuration the flags point at and validates it.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::from_env()?,
        };
        if let Some(project) = &self.project {
            config.project_id = project.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Command::Query { max_rows: 0, .. } = self.command {
            return Err(Error::InvalidConfigValue {
                field: "max_rows".to_string(),
                value: "0".to_string(),
                reason: "at least one row must be requested".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_publish_with_attributes() {
        let cli = CliConfig::try_parse_from([
            "cloud-iface",
            "publish",
            "orders",
            "hello",
            "--attr",
            "origin=cli",
        ])
        .unwrap();
        match cli.command {
            Command::Publish {
                topic,
                message,
                attributes,
            } => {
                assert_eq!(topic, "orders");
                assert_eq!(message, "hello");
                assert_eq!(attributes, vec![("origin".to_string(), "cli".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_get_entity_needs_name_or_id() {
        assert!(CliConfig::try_parse_from(["cloud-iface", "get-entity", "Task"]).is_err());
        assert!(CliConfig::try_parse_from(["cloud-iface", "get-entity", "Task", "--id", "5"]).is_ok());
    }

    #[test]
    fn test_client_config_from_file_with_project_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"project_id = "from-file""#).unwrap();

        let cli = CliConfig::try_parse_from([
            "cloud-iface",
            "--config",
            file.path().to_str().unwrap(),
            "--project",
            "override",
            "query",
            "SELECT 1",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
        assert_eq!(cli.client_config().unwrap().project_id, "override");
    }

    #[test]
    fn test_zero_rows_is_invalid() {
        let cli =
            CliConfig::try_parse_from(["cloud-iface", "query", "SELECT 1", "--max-rows", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
