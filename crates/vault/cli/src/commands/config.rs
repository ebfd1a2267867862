//! `config`: print the effective ledger configuration

use vault_engine::LedgerConfig;

use crate::error::CliResult;
use crate::output::{self, OutputFormat};

pub fn execute(config: &LedgerConfig, format: OutputFormat) -> CliResult<()> {
    let format = match format {
        OutputFormat::Table => OutputFormat::Yaml,
        other => other,
    };
    output::print_single(config, format)
}
