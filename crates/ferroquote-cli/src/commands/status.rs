use ferroquote_core::StockDataService;

use crate::error::CliError;

use super::CommandResult;

pub fn run(service: &StockDataService) -> Result<CommandResult, CliError> {
    let data = serde_json::to_value(service.status())?;
    Ok(CommandResult::ok(data))
}
