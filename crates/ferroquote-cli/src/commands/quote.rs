use ferroquote_core::{Payload, StockDataService, Symbol};
use serde::Serialize;

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct QuoteResponseData<'a> {
    quotes: &'a [Payload],
    requested: usize,
    succeeded: usize,
    failed: usize,
}

pub async fn run(args: &QuoteArgs, service: &StockDataService) -> Result<CommandResult, CliError> {
    for raw in &args.symbols {
        Symbol::parse(raw)?;
    }

    let batch = service.get_quotes(&args.symbols).await;
    let data = serde_json::to_value(QuoteResponseData {
        quotes: &batch.quotes,
        requested: batch.requested,
        succeeded: batch.succeeded,
        failed: batch.failed,
    })?;

    Ok(CommandResult::ok(data)
        .with_payloads(batch.quotes)
        .with_errors(batch.errors))
}
