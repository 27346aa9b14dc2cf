// Copyright 2022-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to do when fixed-size laced data does not divide evenly into the
/// number of frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnevenLacingPolicy {
    /// Fail the parse with [crate::Error::UnevenFixedLacing].
    #[default]
    Reject,
    /// Keep the evenly sized frames and skip the leftover octets.
    Discard,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderConfig {
    #[serde(default)]
    pub uneven_fixed_lacing: UnevenLacingPolicy,
}

/// Load a [ReaderConfig] from a TOML file.
pub fn parse_config_file<P: AsRef<std::path::Path>>(fname: P) -> Result<ReaderConfig> {
    let contents = std::fs::read_to_string(fname.as_ref())?;
    let cfg: ReaderConfig = toml::from_str(&contents)?;
    tracing::debug!("reader config from {}: {cfg:?}", fname.as_ref().display());
    Ok(cfg)
}
