use colored::Colorize;
use sweeper::command_argument_builder;
use sweeper::handlers::*;
use sweeper_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let Some((name, primary_command)) = chosen_command.subcommand() else {
        if !chosen_command.get_flag("quiet") {
            print_banner();
        }
        return;
    };

    // globals given after the subcommand only show up in its matches
    let quiet = chosen_command.get_flag("quiet") || primary_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose") || primary_command.get_flag("verbose");
    if !quiet {
        print_banner();
    }
    init_tracing(verbose, quiet);

    let result = match name {
        "init" => handle_init(primary_command),
        "import" => handle_import(primary_command),
        "mods" => handle_mods(primary_command),
        "graph" => handle_graph(primary_command).await,
        "unused" => handle_unused(primary_command).await,
        "classify" => handle_classify(primary_command).await,
        "remove" => handle_remove(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
