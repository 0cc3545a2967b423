// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{arg, value_parser, Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print as pretty JSON"))
        .arg(arg!(--jsonl "Print as JSON lines"))
}

pub fn build_cli() -> Command {
    Command::new("paperdepot")
        .about("Educational portfolio-simulation ledger: depots, savings plans, teacher oversight")
        .arg(
            Arg::new("as")
                .long("as")
                .value_name("USER_ID")
                .help("Caller identity used for role and ownership checks")
                .global(true),
        )
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("user")
                .about("Manage the mirrored auth directory")
                .subcommand(
                    Command::new("add")
                        .about("Register or refresh a user")
                        .arg(arg!(<id> "User id (from the auth provider)"))
                        .arg(arg!(<name> "Display name")),
                )
                .subcommand(json_flags(Command::new("list").about("List users"))),
        )
        .subcommand(
            Command::new("depot")
                .about("Manage depots")
                .subcommand(
                    Command::new("create")
                        .about("Create a depot; the caller becomes a member")
                        .arg(arg!(--name <NAME> "Depot name").required(true))
                        .arg(arg!(--cash <AMOUNT> "Starting cash").required(true))
                        .arg(
                            arg!(--member <USER_ID> "Additional member (repeatable)")
                                .action(ArgAction::Append),
                        ),
                )
                .subcommand(json_flags(Command::new("list").about("List visible depots")))
                .subcommand(
                    Command::new("rm")
                        .about("Delete a depot and everything in it")
                        .arg(
                            arg!(--id <ID> "Depot id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        ),
                ),
        )
        .subcommand(
            Command::new("asset")
                .about("Asset registry")
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--ticker <TICKER>).required(true))
                        .arg(arg!(--name <NAME>).required(true))
                        .arg(arg!(--currency <CCY>).required(true)),
                )
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("price")
                .about("Quote store fed by the price collaborator")
                .subcommand(Command::new("fetch").about("Fetch live quotes for all assets"))
                .subcommand(json_flags(Command::new("list").about("Recently stored quotes"))),
        )
        .subcommand(
            Command::new("tx")
                .about("Ledger transactions")
                .subcommand(trade_args(Command::new("buy").about("Buy an asset")))
                .subcommand(trade_args(Command::new("sell").about("Sell an asset")))
                .subcommand(
                    Command::new("cash")
                        .about("Cash adjustment (subject to the cash floor)")
                        .arg(depot_arg())
                        .arg(arg!(--amount <AMOUNT> "Signed amount").required(true)),
                )
                .subcommand(
                    Command::new("reward")
                        .about("Teacher-granted reward (override kind)")
                        .arg(depot_arg())
                        .arg(arg!(--amount <AMOUNT>).required(true)),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("Ordered transaction history")
                        .arg(depot_arg())
                        .arg(arg!(--from <DATE> "YYYY-MM-DD"))
                        .arg(arg!(--to <DATE> "YYYY-MM-DD")),
                )),
        )
        .subcommand(
            Command::new("plan")
                .about("Recurring savings plans")
                .subcommand(
                    Command::new("add")
                        .arg(depot_arg())
                        .arg(arg!(--ticker <TICKER>).required(true))
                        .arg(arg!(--worth <AMOUNT> "Amount per occurrence").required(true))
                        .arg(
                            arg!(--frequency <FREQ> "weekly|biweekly|monthly|quarterly|yearly")
                                .required(true),
                        ),
                )
                .subcommand(
                    Command::new("set")
                        .about("Update a plan's asset, worth or frequency")
                        .arg(plan_id_arg())
                        .arg(arg!(--ticker <TICKER>))
                        .arg(arg!(--worth <AMOUNT>))
                        .arg(arg!(--frequency <FREQ>)),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete plan definitions; history stays")
                        .arg(
                            Arg::new("ids")
                                .value_name("ID")
                                .required(true)
                                .num_args(1..)
                                .value_parser(value_parser!(i64)),
                        ),
                )
                .subcommand(
                    Command::new("budget")
                        .about("Set a depot's monthly budget (teacher)")
                        .arg(depot_arg())
                        .arg(arg!(--amount <AMOUNT>).required(true)),
                )
                .subcommand(json_flags(
                    Command::new("overview")
                        .about("Budget consumption of a depot's plans")
                        .arg(depot_arg()),
                ))
                .subcommand(json_flags(
                    Command::new("runs")
                        .about("Attempt history of one plan")
                        .arg(plan_id_arg()),
                )),
        )
        .subcommand(
            Command::new("role")
                .about("Role grants (teacher/admin)")
                .subcommand(
                    Command::new("grant")
                        .arg(arg!(--user <USER_ID>).required(true))
                        .arg(arg!(--role <ROLE> "admin|teacher").required(true)),
                )
                .subcommand(
                    Command::new("revoke")
                        .arg(arg!(--user <USER_ID>).required(true))
                        .arg(arg!(--role <ROLE> "admin|teacher").required(true)),
                ),
        )
        .subcommand(
            Command::new("overview")
                .about("Dashboards")
                .subcommand(json_flags(Command::new("depots").about("Per-depot summary")))
                .subcommand(json_flags(
                    Command::new("admin").about("Per-user summary (teacher/admin)"),
                )),
        )
        .subcommand(
            Command::new("value")
                .about("Valuation time series")
                .subcommand(
                    Command::new("snapshot")
                        .about("Record today's value point(s)")
                        .arg(arg!(--depot <ID> "One depot (default: all)").value_parser(value_parser!(i64))),
                )
                .subcommand(json_flags(
                    Command::new("series")
                        .arg(depot_arg())
                        .arg(arg!(--from <DATE> "YYYY-MM-DD").required(true))
                        .arg(arg!(--to <DATE> "YYYY-MM-DD").required(true)),
                ))
                .subcommand(json_flags(Command::new("deltas").arg(depot_arg())))
                .subcommand(json_flags(Command::new("positions").arg(depot_arg()))),
        )
        .subcommand(
            Command::new("tick")
                .about("Run the savings-plan scheduler")
                .arg(arg!(--watch "Keep ticking on a fixed interval"))
                .arg(
                    arg!(--interval <SECS> "Seconds between ticks")
                        .value_parser(value_parser!(u64))
                        .default_value("300"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Audit exports")
                .subcommand(
                    Command::new("transactions")
                        .arg(depot_arg())
                        .arg(arg!(--format <FMT> "csv|json").required(true))
                        .arg(arg!(--out <PATH>).required(true)),
                ),
        )
        .subcommand(Command::new("doctor").about("Integrity checks"))
}

fn depot_arg() -> Arg {
    arg!(--depot <ID> "Depot id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn plan_id_arg() -> Arg {
    arg!(--id <ID> "Plan id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn trade_args(cmd: Command) -> Command {
    cmd.arg(depot_arg())
        .arg(arg!(--ticker <TICKER>).required(true))
        .arg(arg!(--qty <QUANTITY>).required(true))
        .arg(arg!(--price <PRICE> "Unit price (default: latest stored quote)"))
}
