//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! `patient-link`: print every patient known to the server.

use anyhow::Context;
use clap::Parser;
use patient_link::client::DEFAULT_ADDRESS;
use patient_link::{ClientConfig, ClientError, PatientClient};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SEPARATOR: &str = "\n============================================\n";

#[derive(Parser, Debug)]
#[command(name = "patient-link", version)]
#[command(about = "Fetch the patient list and print every patient with its diagnoses")]
struct Cli {
    /// WebSocket address of the patient service
    #[arg(short, long, env = "PATIENT_LINK_ADDRESS", default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Give up after this many seconds (waits forever when unset)
    #[arg(short, long, env = "PATIENT_LINK_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            println!("{e:#}");
            let status = e
                .downcast_ref::<ClientError>()
                .map(|e| e.kind().status())
                .unwrap_or(1);
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::default().with_address(cli.address);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }

    let mut client = PatientClient::new(config);
    client.init().context("failed to start the client")?;

    info!(address = %client.address(), "Fetching patients");
    let patients = client.fetch_patients_blocking()?;

    let mut uris: Vec<_> = patients.keys().collect();
    uris.sort();

    let mut stdout = std::io::stdout().lock();
    for uri in uris {
        write!(stdout, "{}{SEPARATOR}", patients[uri])?;
    }
    stdout.flush()?;

    info!(count = patients.len(), "Done");
    Ok(())
}
