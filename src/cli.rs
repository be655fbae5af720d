// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, ArgGroup, Command, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn text(id: &'static str, long: &'static str) -> Arg {
    Arg::new(id).long(long)
}

/// Accepts negative values such as `--amount -45.50`.
fn money(id: &'static str, long: &'static str) -> Arg {
    Arg::new(id).long(long).allow_hyphen_values(true)
}

fn id_arg() -> Arg {
    Arg::new("id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn month_arg() -> Arg {
    text("month", "month").value_name("YYYY-MM")
}

fn account_cmd() -> Command {
    let form_args = |cmd: Command| {
        cmd.arg(text("kind", "kind").help("current|investment|wallet"))
            .arg(text("currency", "currency").help("ISO code, e.g. EUR"))
            .arg(money("initial", "initial").help("Initial balance"))
            .arg(text("color", "color").value_name("#RRGGBB"))
            .arg(money("topup", "topup").help("Wallet monthly top-up"))
            .arg(
                Arg::new("topup_day")
                    .long("topup-day")
                    .value_parser(value_parser!(u32)),
            )
    };
    Command::new("account")
        .about("Manage accounts")
        .subcommand_required(true)
        .subcommand(form_args(
            Command::new("add").arg(text("name", "name").required(true)),
        ))
        .subcommand(json_flags(
            Command::new("list").arg(flag("all", "all", "Include inactive accounts")),
        ))
        .subcommand(form_args(
            Command::new("edit")
                .arg(text("name", "name").required(true))
                .arg(text("rename", "rename"))
                .arg(flag("no_topup", "no-topup", "Remove the wallet top-up")),
        ))
        .subcommand(Command::new("toggle").arg(text("name", "name").required(true)))
        .subcommand(Command::new("default").arg(text("name", "name").required(true)))
        .subcommand(
            Command::new("move")
                .arg(text("name", "name").required(true))
                .arg(flag("up", "up", "Move one place up"))
                .arg(flag("down", "down", "Move one place down"))
                .group(
                    ArgGroup::new("direction")
                        .args(["up", "down"])
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("rm")
                .arg(text("name", "name").required(true))
                .arg(flag(
                    "cascade",
                    "cascade",
                    "Also delete the account's movements, templates and snapshots",
                )),
        )
}

fn category_cmd() -> Command {
    Command::new("category")
        .about("Manage categories and subcategories")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(text("name", "name").required(true))
                .arg(text("kind", "kind").help("income|expense|investment"))
                .arg(text("parent", "parent").help("Parent category for a subcategory"))
                .arg(text("icon", "icon"))
                .arg(text("color", "color").value_name("#RRGGBB")),
        )
        .subcommand(json_flags(Command::new("list").arg(text("kind", "kind"))))
        .subcommand(
            Command::new("edit")
                .arg(text("name", "name").required(true))
                .arg(text("rename", "rename"))
                .arg(text("kind", "kind"))
                .arg(text("parent", "parent"))
                .arg(flag("no_parent", "no-parent", "Make it top-level").conflicts_with("parent"))
                .arg(text("icon", "icon"))
                .arg(text("color", "color")),
        )
        .subcommand(Command::new("rm").arg(text("name", "name").required(true)))
}

fn movement_cmd() -> Command {
    Command::new("mov")
        .about("Record and browse movements")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(text("date", "date").value_name("YYYY-MM-DD"))
                .arg(text("account", "account"))
                .arg(text("category", "category").required(true))
                .arg(text("subcategory", "subcategory"))
                .arg(text("concept", "concept").required(true))
                .arg(money("amount", "amount").required(true))
                .arg(text("notes", "notes")),
        )
        .subcommand(json_flags(
            Command::new("list")
                .arg(month_arg())
                .arg(text("account", "account"))
                .arg(text("category", "category"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize)),
                ),
        ))
        .subcommand(
            Command::new("edit")
                .arg(id_arg())
                .arg(text("date", "date"))
                .arg(text("concept", "concept"))
                .arg(money("amount", "amount"))
                .arg(text("account", "account"))
                .arg(text("category", "category"))
                .arg(text("subcategory", "subcategory"))
                .arg(
                    flag("clear_subcategory", "clear-subcategory", "Drop the subcategory")
                        .conflicts_with("subcategory"),
                )
                .arg(text("notes", "notes")),
        )
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn recurring_cmd() -> Command {
    let form_args = |cmd: Command, required: bool| {
        cmd.arg(text("concept", "concept").required(required))
            .arg(money("amount", "amount").required(required))
            .arg(
                Arg::new("day")
                    .long("day")
                    .value_parser(value_parser!(u32))
                    .help("Day of month (1-31)"),
            )
            .arg(text("account", "account").required(required))
            .arg(text("category", "category").required(required))
            .arg(text("subcategory", "subcategory"))
            .arg(text("notes", "notes"))
            .arg(text("transfer_to", "transfer-to").help("Destination account of a transfer"))
            .arg(
                flag("no_transfer", "no-transfer", "Turn a transfer back into a plain template")
                    .conflicts_with("transfer_to"),
            )
    };
    Command::new("recurring")
        .about("Recurring templates and monthly generation")
        .subcommand_required(true)
        .subcommand(form_args(Command::new("add"), true))
        .subcommand(json_flags(Command::new("list")))
        .subcommand(form_args(Command::new("edit").arg(id_arg()), false))
        .subcommand(Command::new("toggle").arg(id_arg()))
        .subcommand(Command::new("rm").arg(id_arg()))
        .subcommand(Command::new("status").arg(month_arg()))
        .subcommand(Command::new("skip").arg(month_arg()))
        .subcommand(Command::new("generate").arg(month_arg()))
}

fn snapshot_cmd() -> Command {
    Command::new("snapshot")
        .about("Monthly net-worth snapshots")
        .subcommand_required(true)
        .subcommand(Command::new("auto").about("Snapshot last month's balances"))
        .subcommand(
            Command::new("set")
                .arg(month_arg().required(true))
                .arg(text("account", "account").required(true))
                .arg(money("balance", "balance").required(true))
                .arg(text("notes", "notes")),
        )
        .subcommand(json_flags(Command::new("list").arg(month_arg())))
        .subcommand(
            Command::new("rm")
                .arg(month_arg().required(true))
                .arg(text("account", "account").required(true)),
        )
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Dashboard and analysis")
        .subcommand_required(true)
        .subcommand(Command::new("dashboard").arg(flag("json", "json", "Print as JSON")))
        .subcommand(json_flags(
            Command::new("distribution")
                .arg(month_arg())
                .arg(text("category", "category").help("Break one category down")),
        ))
        .subcommand(
            Command::new("explore")
                .arg(
                    text("period", "period")
                        .default_value("month")
                        .value_parser(["month", "quarter", "year"]),
                )
                .arg(
                    Arg::new("year")
                        .long("year")
                        .value_parser(value_parser!(i32)),
                )
                .arg(
                    Arg::new("month_of_year")
                        .long("month-of-year")
                        .value_parser(value_parser!(u32).range(1..=12)),
                )
                .arg(
                    Arg::new("quarter")
                        .long("quarter")
                        .value_parser(value_parser!(u32).range(1..=4)),
                )
                .arg(
                    text("flow", "flow")
                        .default_value("expenses")
                        .value_parser(["expenses", "income", "all"]),
                )
                .arg(text("category", "category"))
                .arg(flag("json", "json", "Print as JSON")),
        )
}

fn export_cmd() -> Command {
    let out = || text("out", "out").value_name("PATH");
    Command::new("export")
        .about("Export data as CSV/JSON or a zip backup")
        .subcommand_required(true)
        .subcommand(
            Command::new("movements")
                .arg(text("format", "format").default_value("csv"))
                .arg(month_arg())
                .arg(out()),
        )
        .subcommand(Command::new("accounts").arg(out()))
        .subcommand(Command::new("categories").arg(out()))
        .subcommand(Command::new("recurring").arg(out()))
        .subcommand(Command::new("backup").arg(out().required(true)))
}

pub fn build_cli() -> Command {
    Command::new("pocketpal")
        .version(clap::crate_version!())
        .about("Personal finance ledger: accounts, movements, recurring expenses and net worth")
        .arg(
            Arg::new("user")
                .long("user")
                .env("POCKETPAL_USER")
                .global(true)
                .help("Act as this user"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .env("POCKETPAL_DB")
                .global(true)
                .value_name("PATH")
                .help("SQLite database file"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("onboard")
                .about("First-run setup: profile, accounts and default categories")
                .arg(text("name", "name").help("Display name"))
                .arg(text("currency", "currency"))
                .arg(
                    text("account", "account")
                        .action(ArgAction::Append)
                        .allow_hyphen_values(true)
                        .value_name("NAME:KIND:INITIAL"),
                ),
        )
        .subcommand(
            Command::new("profile")
                .about("Show or update your profile")
                .subcommand_required(true)
                .subcommand(Command::new("show").arg(flag("json", "json", "Print as JSON")))
                .subcommand(
                    Command::new("set")
                        .arg(text("name", "name"))
                        .arg(flag("clear_name", "clear-name", "Remove the display name").conflicts_with("name"))
                        .arg(text("avatar", "avatar").value_name("URL"))
                        .arg(flag("clear_avatar", "clear-avatar", "Remove the avatar").conflicts_with("avatar"))
                        .arg(text("currency", "currency"))
                        .arg(text("default_account", "default-account"))
                        .arg(
                            text("pref", "pref")
                                .action(ArgAction::Append)
                                .value_name("KEY=VALUE"),
                        )
                        .arg(text("unset_pref", "unset-pref").action(ArgAction::Append)),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Local settings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("set-user")
                        .about("Remember the user to act as")
                        .arg(Arg::new("name").required(true).value_name("USER")),
                ),
        )
        .subcommand(account_cmd())
        .subcommand(category_cmd())
        .subcommand(movement_cmd())
        .subcommand(recurring_cmd())
        .subcommand(snapshot_cmd())
        .subcommand(report_cmd())
        .subcommand(export_cmd())
        .subcommand(Command::new("doctor").about("Check data for inconsistencies"))
}
