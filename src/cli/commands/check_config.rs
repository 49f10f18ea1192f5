//! `check-config`: show resolved settings and warnings.

use console::style;

use crate::cli::icons::{dim_arrow, error, success, warn};
use didrep::config::{Config, Settings};

pub fn cmd_check_config(settings: &Settings, config: &Config) -> anyhow::Result<i32> {
    match config.source_path {
        Some(ref path) => println!("{} Config file: {}", dim_arrow(), path.display()),
        None => println!("{} No config file found, using defaults", dim_arrow()),
    }
    println!("{}", serde_json::to_string_pretty(settings)?);

    match settings.validate() {
        Ok(warnings) if warnings.is_empty() => {
            println!("{} Configuration is valid", success());
            Ok(0)
        }
        Ok(warnings) => {
            for warning in &warnings {
                println!("{} {}", warn(), warning);
            }
            println!(
                "{} Configuration is valid with {} warning(s)",
                success(),
                style(warnings.len()).yellow()
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("{} {}", error(), e);
            Ok(1)
        }
    }
}
