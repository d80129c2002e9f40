mod data;
mod quote;
mod status;

use std::time::Instant;

use ferroquote_core::{BatchError, DataKind, Payload, StockDataService};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::output::Envelope;

pub struct CommandResult {
    pub data: Value,
    pub payloads: Vec<Payload>,
    pub errors: Vec<BatchError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            payloads: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_payloads(mut self, payloads: Vec<Payload>) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn with_errors(mut self, errors: Vec<BatchError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli, service: &StockDataService) -> Result<Envelope, CliError> {
    let started = Instant::now();

    let command_result = match &cli.command {
        Command::Quote(args) => quote::run(args, service).await?,
        Command::History(args) => data::run(DataKind::Historical, args, service).await?,
        Command::Profile(args) => data::run(DataKind::Profile, args, service).await?,
        Command::Status => status::run(service)?,
    };

    let CommandResult {
        data,
        payloads,
        errors,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut meta = Metadata::new(service.mode(), latency_ms);
    meta.observe(&payloads);

    Ok(Envelope { meta, data, errors })
}
