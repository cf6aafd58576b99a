// Copyright 2025 Cisco Systems, Inc. and its affiliates
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use pickledec::cli::{Cli, Command};
use pickledec::config::Config;
use pickledec::disasm::{SliceDisassembler, SliceHost};
use pickledec::render::{render_json, render_pseudocode};
use pickledec::{Interpreter, MachineState};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    if matches!(cli.command, Command::Help) {
        println!("pdp <file> <pseudocode|json|help> [--offset N] [--verbose]");
        return Ok(ExitCode::SUCCESS);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bytes = fs::read(&cli.file)
        .wrap_err_with(|| format!("failed to read {}", cli.file.display()))?;

    let config = Config::new("pickle", cli.verbose, cli.offset, None);
    let mut state = MachineState::new(&config)?;

    let disasm = SliceDisassembler::new(&bytes);
    let host = SliceHost::new(&bytes);
    let interp = Interpreter::new(&disasm, &host, bytes.len() as u64);
    let complete = interp.run(&mut state)?;

    let output = match cli.command {
        Command::Pseudocode => render_pseudocode(&state.stack, cli.verbose, !complete),
        Command::Json => serde_json::to_string_pretty(&render_json(&state, !complete))
            .wrap_err("failed to serialize JSON output")?,
        Command::Help => unreachable!("handled above"),
    };

    if output.is_empty() {
        eprintln!("no output produced");
        return Ok(ExitCode::FAILURE);
    }

    println!("{output}");
    Ok(ExitCode::SUCCESS)
}
