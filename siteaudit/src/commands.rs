use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("siteaudit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("siteaudit")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("audit")
                .about(
                    "Crawl every internal page of a site and audit performance, SEO, \
                accessibility and responsive layout.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Base URL of the site to audit (default: detect from a DDEV project in the current directory)")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"compare" <URL>)
                        .required(false)
                        .help("Live deployment of the same site to compare load times against")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"drush" <CMD>)
                        .required(false)
                        .help("Drush launcher used to seed URLs from the Drupal database (e.g. 'ddev drush')"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Directory for the JSON report, CSV report and screenshots")
                        .default_value("./audit"),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable the progress spinner (useful in CI logs)")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
