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

//! Command-line surface, standing in for the host command interface
//! (`pdP`/`pdPj`/`pdP?`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Decompile a Python pickle byte stream into pseudocode or JSON.
#[derive(Debug, Parser)]
#[command(name = "pdp", version, about)]
pub struct Cli {
    /// path to the pickle file to decompile.
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Command,

    /// offset to begin interpretation at.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// verbose diagnostics (feeds `anal.verbose`).
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// `pdP` — emit Python-like pseudocode.
    Pseudocode,
    /// `pdPj` — emit structured JSON.
    Json,
    /// `pdP?` — show help text only, without running the machine.
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pseudocode_subcommand() {
        let cli = Cli::parse_from(["pdp", "in.pkl", "pseudocode"]);
        assert_eq!(cli.file, PathBuf::from("in.pkl"));
        assert!(matches!(cli.command, Command::Pseudocode));
        assert_eq!(cli.offset, 0);
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_offset_and_verbose() {
        let cli = Cli::parse_from(["pdp", "in.pkl", "json", "--offset", "16", "-v"]);
        assert!(matches!(cli.command, Command::Json));
        assert_eq!(cli.offset, 16);
        assert!(cli.verbose);
    }
}
