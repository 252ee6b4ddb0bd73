extern crate clap;
extern crate env_logger;
extern crate pairsync_core;

use clap::{App, Arg, ArgMatches, SubCommand};
use pairsync_core::config::Config;
use pairsync_core::fs_client::DefaultLocalFsClient;
use pairsync_core::pair_store::PairStateStore;
use pairsync_core::remote_client::HttpRemoteClient;
use pairsync_core::scheduler::{self, SilentNotifier};
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let local_path_arg = Arg::with_name("LOCAL_PATH")
        .required(true)
        .index(1)
        .help("Local directory this binding synchronizes");

    let server_url_arg = Arg::with_name("server-url")
        .long("server-url")
        .takes_value(true)
        .required(true)
        .help("Base URL of the remote document repository");
    let token_arg = Arg::with_name("token")
        .long("token")
        .takes_value(true)
        .required(true)
        .help("Bearer token used to authenticate against the remote repository");
    let create_cmd = SubCommand::with_name("create")
        .about("binds a local directory to a remote repository and creates the pair state database")
        .arg(server_url_arg)
        .arg(token_arg);

    let scan_cmd = SubCommand::with_name("scan")
        .about("refreshes pair states from both the local tree and the remote repository, without resolving them");

    let delay_arg = Arg::with_name("delay")
        .long("delay")
        .takes_value(true)
        .help("Seconds to sleep between loop iterations that did no work (default 5)");
    let max_sync_step_arg = Arg::with_name("max-sync-step")
        .long("max-sync-step")
        .takes_value(true)
        .help("Maximum pending pairs resolved per loop iteration (default 10)");
    let limit_pending_arg = Arg::with_name("limit-pending")
        .long("limit-pending")
        .takes_value(true)
        .help("Maximum pending pairs fetched per loop iteration (default 100)");
    let max_loops_arg = Arg::with_name("max-loops")
        .long("max-loops")
        .takes_value(true)
        .help("Stop after this many loop iterations instead of running until the stop file appears");
    let sync_cmd = SubCommand::with_name("sync")
        .about("runs the scheduler loop: change-feed, scan, resolve, until the stop file appears")
        .arg(delay_arg)
        .arg(max_sync_step_arg)
        .arg(limit_pending_arg)
        .arg(max_loops_arg);

    let optimize_cmd = SubCommand::with_name("optimize")
        .about("runs VACUUM/ANALYZE on the underlying SQLite database");

    let cli = App::new("pairsync")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Bidirectional pair-state synchronization between a local directory and a remote document repository")
        .arg(local_path_arg)
        .subcommand(create_cmd)
        .subcommand(scan_cmd)
        .subcommand(sync_cmd)
        .subcommand(optimize_cmd)
        .get_matches();

    let local_path = cli.value_of("LOCAL_PATH").unwrap();
    if let Some(create_cli) = cli.subcommand_matches("create") {
        create_binding(local_path, create_cli);
    } else if cli.subcommand_matches("scan").is_some() {
        run_scan(local_path);
    } else if let Some(sync_cli) = cli.subcommand_matches("sync") {
        run_sync(local_path, sync_cli);
    } else if cli.subcommand_matches("optimize").is_some() {
        run_optimize(local_path);
    } else {
        println!("Please specify the command you want to perform (create, scan, sync, optimize).");
        println!("See --help for more information.");
    }
}

fn open_store(local_path: &str) -> PairStateStore {
    let database_path = format!("{}/.pairsync.sqlite", local_path.trim_end_matches('/'));
    PairStateStore::open(&database_path).expect("failed to open pair state database")
}

fn create_binding(local_path: &str, cmd_cli: &ArgMatches) {
    let server_url = cmd_cli.value_of("server-url").unwrap();
    let token = cmd_cli.value_of("token").unwrap();

    println!("Binding '{}' to '{}'...", local_path, server_url);
    let store = open_store(local_path);
    match store.create_server_binding(local_path, server_url, token) {
        Ok(_) => {
            store.create_root_item(local_path).expect("failed to seed root pair");
            println!("Created binding for '{}'.", local_path);
        }
        Err(err) => eprintln!("Could not create binding: {}", err),
    }
}

fn run_scan(local_path: &str) {
    let store = open_store(local_path);
    let local_fs = DefaultLocalFsClient::new(PathBuf::from(local_path));

    let root = store
        .get_by_local_path(local_path, "/")
        .expect("query failed")
        .expect("binding has no root pair; run 'create' first");
    match pairsync_core::scan::scan_local(&store, &local_fs, &root) {
        Ok(result) => println!("Local scan complete: {:?}", result),
        Err(err) => eprintln!("Local scan failed: {}", err),
    }

    if let Ok(binding) = store.get_server_binding(local_path) {
        let remote_fs = HttpRemoteClient::new(binding.server_url.clone(), binding.credentials.clone())
            .expect("failed to build remote client");
        if let Ok(Some(root)) = store.get_by_local_path(local_path, "/") {
            match pairsync_core::scan::scan_remote(&store, &remote_fs, &root) {
                Ok(result) => println!("Remote scan complete: {:?}", result),
                Err(err) => eprintln!("Remote scan failed: {}", err),
            }
        }
    }
}

fn run_sync(local_path: &str, cmd_cli: &ArgMatches) {
    let store = open_store(local_path);
    let binding = store
        .get_server_binding(local_path)
        .expect("no binding found; run 'create' first");
    let config = Config::from_matches(local_path, &binding.server_url, &binding.credentials, cmd_cli);

    let local_fs = DefaultLocalFsClient::new(PathBuf::from(local_path));
    let remote_fs =
        HttpRemoteClient::new(binding.server_url.clone(), binding.credentials.clone()).expect("failed to build remote client");

    let config_dir = PathBuf::from(local_path).join(".pairsync");
    std::fs::create_dir_all(&config_dir).expect("failed to create config directory");

    match scheduler::run_loop(&store, &local_fs, &remote_fs, &config, &config_dir, &SilentNotifier) {
        Ok(()) => println!("Sync loop exited cleanly."),
        Err(err) => eprintln!("Sync loop exited with an error: {}", err),
    }
}

fn run_optimize(local_path: &str) {
    let store = open_store(local_path);
    match store.optimize_database() {
        Ok(()) => println!("Optimization done!"),
        Err(err) => eprintln!("Optimization failed: {}", err),
    }
}
