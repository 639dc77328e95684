use clap::Parser;
use log::{debug, LevelFilter};

mod args;
mod pipeline;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    debug!("args: {:?}", args);

    let res = match &args.command {
        Command::Resolve => pipeline::run_resolve(&args.config, &args.out, &args.reference),
        Command::Apply { review_dir } => {
            pipeline::run_apply(&args.config, &args.out, review_dir, &args.reference)
        }
        Command::Districts { at } => {
            pipeline::run_districts(&args.config, &args.out, at, &args.reference)
        }
        Command::Results => pipeline::run_results(&args.config, &args.out, &args.reference),
    };

    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = snafu::ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
