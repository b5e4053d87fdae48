mod cli;
mod commands;
mod shutdown;

use clap::Parser;
use log::*;
use tokio::runtime::Builder;

use crate::cli::Cli;

fn init_logger() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_micros()
    .init();
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("keeper-runtime")
        .build()
        .expect("failed to build async runtime");
    let result = runtime.block_on(commands::run(cli));
    drop(runtime);

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}
