use ferroquote_core::{DataKind, StockDataService};

use crate::cli::SymbolArgs;
use crate::error::CliError;

use super::CommandResult;

/// Single-symbol fetch for `history` and `profile`. Any failure aborts the command.
pub async fn run(
    kind: DataKind,
    args: &SymbolArgs,
    service: &StockDataService,
) -> Result<CommandResult, CliError> {
    let payload = service.get_data(kind, &args.symbol).await?;
    let data = serde_json::to_value(&payload)?;
    Ok(CommandResult::ok(data).with_payloads(vec![payload]))
}
