#![forbid(unsafe_code)]

//! ulakefs — union/overlay filesystem mount helper.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use ulakefs::cli::{self, exit_code, Cli};
use ulakefs::core::branch::BranchTable;
use ulakefs::fs::adapter::{mount_options_for, Overlay};
use ulakefs::logger::jsonl::{EventType, JsonlConfig, LogEntry};
use ulakefs::logger::DebugLog;

fn main() -> ExitCode {
    let args = Cli::parse();

    match run(&args) {
        Ok(()) => ExitCode::from(exit_code::OK as u8),
        Err(message) => {
            eprintln!("ulakefs: {message}");
            ExitCode::from(exit_code::FAILURE as u8)
        }
    }
}

fn run(args: &Cli) -> Result<(), String> {
    let mut config = cli::build_config(&args.dirs, args.mountpoint.clone(), args.options.as_deref())
        .map_err(|e| e.to_string())?;

    if let Some(chroot) = config.chroot.clone() {
        cli::apply_chroot(&chroot).map_err(|e| e.to_string())?;
    }
    if let Some(n) = config.max_files {
        cli::apply_max_files(n).map_err(|e| e.to_string())?;
    }

    let branches = Arc::new(BranchTable::new(&config.branch_specs).map_err(|e| e.to_string())?);

    let debug = Arc::new(match (config.debug_file.take(), args.debug) {
        (Some(path), _) => DebugLog::enabled(JsonlConfig {
            path,
            ..JsonlConfig::default()
        }),
        (None, true) => DebugLog::stderr(),
        (None, false) => DebugLog::disabled(),
    });
    let config = Arc::new(config);

    debug.log(LogEntry::new(EventType::Mounted).with_path(args.mountpoint.to_string_lossy()));

    let options = mount_options_for(&config);
    let overlay = Overlay::new(branches, Arc::clone(&config), Arc::clone(&debug));

    let result = fuser::mount2(overlay, &args.mountpoint, &options).map_err(|e| e.to_string());

    debug.log(LogEntry::new(EventType::Unmounted).with_path(args.mountpoint.to_string_lossy()));

    result
}
