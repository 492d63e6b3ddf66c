// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Column buffers for moving typed, variable-length and nullable cells between an array storage
//! engine and a tabular dataset layer in bulk.

// The clippy throws an error if the reference clone not wrapped into `Arc::clone`
// The lint makes easier for code reader/reviewer separate references clones from more heavyweight ones
#![deny(clippy::clone_on_ref_ptr)]

use log::{info, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{load_config_file, Appender, Deserializers, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use once_cell::sync::OnceCell;

pub mod buffer;
pub mod common;
pub mod config;
pub mod data_type;
pub mod errors;
pub mod query;
pub mod reader;
pub mod schema;

pub use buffer::{ArrayBuffers, ColumnBuffer};
pub use errors::{SomaError, SomaResult};

static LOGGER: OnceCell<()> = OnceCell::new();

/// Initializes logging. `log_conf_path` points to a log4rs config file; without it, logs go to
/// stderr at `INFO` level. Only the first call has an effect.
pub fn init_logging(log_conf_path: Option<&str>) -> SomaResult<()> {
    LOGGER
        .get_or_try_init(|| {
            let log_config = match log_conf_path {
                None | Some("") => default_logger_config()?,
                Some(path) => load_config_file(path, Deserializers::default())
                    .map_err(|err| SomaError::Config(err.to_string()))?,
            };
            log4rs::init_config(log_config).map_err(|err| SomaError::Config(err.to_string()))?;

            let version = env!("CARGO_PKG_VERSION");
            info!("soma-buffers version {} initialized", version);
            Ok(())
        })
        .map(|_| ())
}

const LOG_PATTERN: &str = "{d(%y/%m/%d %H:%M:%S)} {l} {f}: {m}{n}";

// Creates a default log4rs config, which logs to console with `INFO` level.
fn default_logger_config() -> SomaResult<Config> {
    let console_append = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let appender = Appender::builder().build("console", Box::new(console_append));
    let root = Root::builder().appender("console").build(LevelFilter::Info);
    Config::builder()
        .appender(appender)
        .build(root)
        .map_err(|err| SomaError::Config(err.to_string()))
}
