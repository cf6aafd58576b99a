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

//! Runtime configuration, standing in for the host's `asm.arch`/`anal.verbose`
//! config knobs.

use crate::error::{DecompileError, Result};

/// Mirrors the two config knobs spec.md names plus the offset range a host
/// would otherwise supply via `PMState.start`/`end`.
#[derive(Debug, Clone)]
pub struct Config {
    /// must be `"pickle"` for this plugin to accept the buffer; any other
    /// value is a configuration error, matching the C plugin's arch check.
    pub arch: String,
    /// verbose diagnostics, analogous to radare2's `anal.verbose`.
    pub verbose: bool,
    /// offset to begin interpretation at.
    pub start: u64,
    /// optional end offset; `None` means "until STOP or buffer end".
    pub end: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            arch: "pickle".to_string(),
            verbose: false,
            start: 0,
            end: None,
        }
    }
}

impl Config {
    pub fn new(arch: impl Into<String>, verbose: bool, start: u64, end: Option<u64>) -> Self {
        Config {
            arch: arch.into(),
            verbose,
            start,
            end,
        }
    }

    /// matches the C plugin's early-exit when `asm.arch` isn't `pickle`.
    pub fn validate(&self) -> Result<()> {
        if self.arch != "pickle" {
            return Err(DecompileError::Configuration(format!(
                "asm.arch must be \"pickle\", got {:?}",
                self.arch
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arch_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn wrong_arch_is_rejected() {
        let cfg = Config::new("x86", false, 0, None);
        assert!(cfg.validate().is_err());
    }
}
