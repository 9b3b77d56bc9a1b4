use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load spreadsheets from watched folders into template-governed tables",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration file (defaults to ./sheet-loader.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_is_optional() {
        let cli = Cli::try_parse_from(["sheet-loader"]).unwrap();
        assert!(cli.config.is_none());
        let cli = Cli::try_parse_from(["sheet-loader", "--config", "run.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("run.yaml")));
    }
}
