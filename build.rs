// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("anemonix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Source-independent binary package manager")
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Force action (ignore warnings)"),
        )
        .arg(
            Arg::new("bootstrap")
                .short('b')
                .long("bootstrap")
                .global(true)
                .value_name("DIR")
                .help("Bootstrap directory prefix"),
        )
        .arg(
            Arg::new("parse")
                .short('p')
                .long("parse")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Parseable output"),
        )
        .subcommand(
            Command::new("install-bin")
                .about("Install local .apkg archives directly")
                .arg(Arg::new("archives").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("install")
                .about("Resolve requirements against the repositories, download, and install")
                .arg(Arg::new("requirements").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(Arg::new("names").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("add-repo")
                .about("Add a repository descriptor")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("url").required(true))
                .arg(Arg::new("priority")),
        )
        .subcommand(
            Command::new("sync-repo").about("Fetch the index of every configured repository"),
        )
        .subcommand(
            Command::new("remove-repo")
                .about("Delete a repository descriptor and its synced index")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("audit")
                .about("Re-check broken packages and clear the ones now satisfied"),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("info")
                .about("Show details of installed packages")
                .arg(Arg::new("names").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("query")
                .about("Search all synced repository indexes")
                .arg(Arg::new("pattern").required(true)),
        )
        .subcommand(Command::new("count").about("Print the number of installed packages"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("anemonix.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
