// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::path::PathBuf;

use pocketpal::session::Session;
use pocketpal::{cli, commands, db, utils};

fn main() -> Result<()> {
    utils::init_tracing();

    let matches = cli::build_cli().get_matches();

    let db_file = matches.get_one::<String>("db").map(PathBuf::from);
    let mut conn = db::open_or_init(db_file.as_deref())?;
    let today = chrono::Local::now().date_naive();
    let mut session = Session::resolve(
        &conn,
        matches.get_one::<String>("user").map(String::as_str),
        today,
    )?;

    match matches.subcommand() {
        Some(("init", _)) => {
            let path = match db_file {
                Some(p) => p,
                None => db::db_path()?,
            };
            println!("Database initialized at {}", path.display());
            return Ok(());
        }
        Some(("onboard", sub)) => return commands::profile::handle_onboard(&conn, &session, sub),
        Some(("profile", sub)) => return commands::profile::handle(&conn, &session, sub),
        Some(("config", sub)) => return commands::profile::handle_config(&conn, sub),
        Some(_) => {
            session.require_onboarded(&conn)?;
            session.run_auto_snapshot(&conn);
        }
        None => {}
    }

    match matches.subcommand() {
        Some(("account", sub)) => commands::accounts::handle(&mut conn, &session, sub)?,
        Some(("category", sub)) => commands::categories::handle(&conn, &session, sub)?,
        Some(("mov", sub)) => commands::movements::handle(&conn, &mut session, sub)?,
        Some(("recurring", sub)) => commands::recurring::handle(&mut conn, &mut session, sub)?,
        Some(("snapshot", sub)) => commands::snapshots::handle(&conn, &session, sub)?,
        Some(("report", sub)) => commands::reports::handle(&conn, &session, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, &session, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn, &session)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
