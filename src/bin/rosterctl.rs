use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use roster::{
    cli_utils,
    commands::{CommandContext, handle_record_command},
    http_utils::{self, DEFAULT_BASE_URL},
    logging,
};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(optional, "Base URL of the roster API server")]
    base_url: String,
    #[arrrg(flag, "Print results as YAML instead of JSON")]
    yaml: bool,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
}

const USAGE: &str = r#"Usage: rosterctl [options] <entity> <command> [args...]

Options:
  --base-url <url>     Base URL of the roster API server (default: http://localhost:8000)
  --yaml               Print results as YAML instead of JSON
  --verbose            Enable verbose logging

Commands:
  <entity> create <record-json>          Create a record
  <entity> get <id>                      Get a record by identity
  <entity> list                          List all records
  <entity> count                         Count records
  <entity> page [skip] [limit]           Page through records (default 0 100)
  <entity> search [field=value...]       Find records whose fields equal the values
  <entity> update <id> <record-json>     Replace a record
  <entity> delete <id>                   Delete a record
  <entity> bulk-create <json-array>      Create many records, all or nothing
  <entity> bulk-delete <id>...           Delete many records

Example:
  rosterctl user create '{"id":1,"username":"ada","email":"a@x.com","dateOfBirth":"1990-01-01","isActive":true}'"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (options, free) =
        Options::from_command_line_relaxed("USAGE: rosterctl <entity> <command> [args...]");

    if free.is_empty() {
        cli_utils::exit_with_usage_error("No entity specified", USAGE);
    }
    if free[0] == "help" {
        println!("{}", USAGE);
        return Ok(());
    }
    logging::init_logging(options.verbose);

    let base_url = if options.base_url.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        options.base_url
    };

    let client = http_utils::RosterClient::new(base_url);
    let context = CommandContext {
        entity: &free[0],
        client: &client,
        yaml: options.yaml,
    };
    handle_record_command(&free[1..], &context).await;

    Ok(())
}
