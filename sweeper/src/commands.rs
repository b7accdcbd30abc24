use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use sweeper_core::config::{DEFAULT_CONFIG_PATH, DEFAULT_REGISTRY_PATH, DEFAULT_REPORT_PATH};

/// Flags shared by every command that walks the dependency graph.
fn analysis_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-m --"mod" <MOD_PATH>)
            .required(true)
            .help("The live module, e.g. /MyMod"),
    )
    .arg(
        arg!(-d --"max-depth" <DEPTH>)
            .required(false)
            .help("How many dependency levels to follow (default: 10)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-t --"workers" <NUM_WORKERS>)
            .required(false)
            .help("Number of blocking workers walking top-level assets")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"include" <PREFIX>)
            .required(false)
            .help("Extra path prefix that is always walked (repeatable)")
            .action(clap::ArgAction::Append),
    )
    .arg(
        arg!(--"exclude" <PREFIX>)
            .required(false)
            .help("Extra path prefix that is never walked (repeatable)")
            .action(clap::ArgAction::Append),
    )
    .arg(
        arg!(--"ignore-exclusions")
            .required(false)
            .help("Walk excluded namespaces too")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"external-only")
            .required(false)
            .help("Leave assets inside the module out of the dependency graph")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"strict")
            .required(false)
            .help("Abort on the first failed dependency lookup instead of skipping it")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"evidence" <SOURCE>)
            .required(false)
            .help("Liveness evidence: subtree (walked dependencies) or referencers (host query)")
            .value_parser(["subtree", "referencers"]),
    )
}

fn output_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, dot")
            .value_parser(["text", "json", "dot"])
            .default_value("text"),
    )
}

fn usage_report_arg(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-p --"path" <PATH>)
            .required(false)
            .help("Also look for dead dependencies under PATH (default: the module only)"),
    )
    .arg(
        arg!(-r --"report" <PATH>)
            .required(false)
            .help("Asset usage report exported as CSV (Path, Name, TotalUsage)")
            .default_value(DEFAULT_REPORT_PATH),
    )
    .arg(
        arg!(--"filter" <TEXT>)
            .required(false)
            .help("Only keep assets whose path contains TEXT (case-insensitive)"),
    )
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sweeper")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sweeper")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log every dependency decision")
                .required(false)
                .global(true)
                .conflicts_with("quiet"),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .global(true)
                .help("Location of the asset registry database")
                .default_value(DEFAULT_REGISTRY_PATH),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Analysis config file (JSON)")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the sweeper registry and config on your filesystem")
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite any existing registry and config without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("import")
                .about("Loads an Asset,Dependency manifest into the registry")
                .arg(
                    arg!(<MANIFEST>)
                        .required(true)
                        .help("CSV file with Asset and Dependency columns")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("mods")
                .about("Lists the mods of a project (directories under <PROJECT>/Mods)")
                .arg(
                    arg!(<PROJECT>)
                        .required(true)
                        .help("Project root directory")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(output_args(analysis_args(
            command!("graph").about("Builds the weighted dependency graph of a module"),
        )))
        .subcommand(output_args(analysis_args(
            command!("unused")
                .about("Finds assets under a path that nothing in the module keeps alive")
                .arg(
                    arg!(-p --"path" <PATH>)
                        .required(false)
                        .help("Path to scan (default: the module itself)"),
                ),
        )))
        .subcommand(output_args(usage_report_arg(analysis_args(
            command!("classify")
                .about("Splits a usage report into used, unused and dead dependencies")
                .arg(
                    arg!(-s --"show" <SET>)
                        .required(false)
                        .help("Which assets to list")
                        .value_parser(["used", "unused", "all", "dead", "candidates"])
                        .default_value("candidates"),
                ),
        ))))
        .subcommand(usage_report_arg(analysis_args(
            command!("remove")
                .about("Deletes removal candidates from the registry")
                .arg(
                    arg!(--"continue-on-error")
                        .required(false)
                        .help("Keep going when a delete fails and list the failures at the end")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-y --"yes")
                        .required(false)
                        .help("Do not ask for confirmation")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("List what would be deleted and stop")
                        .action(clap::ArgAction::SetTrue),
                ),
        )))
}
