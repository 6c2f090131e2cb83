// SPDX-License-Identifier: Apache-2.0

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args, Clone)]
pub struct AgentRun {
    /// Config file path
    #[arg(long, env = "PIPETAIL_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        agent: AgentRun,
    }

    #[test]
    fn test_default_config_path() {
        let cli = TestCli::parse_from(["pipetail"]);
        assert_eq!(cli.agent.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_config_flag() {
        let cli = TestCli::parse_from(["pipetail", "--config", "/etc/pipetail.yaml"]);
        assert_eq!(cli.agent.config, PathBuf::from("/etc/pipetail.yaml"));
    }
}
