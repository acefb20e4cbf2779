#![forbid(unsafe_code)]
//! Store and coalescing benchmarks for ffindex.
//!
//! Scenarios:
//! - `append`: batched appends into a growing disk store
//! - `get`: id lookups under every retrieval mode
//! - `coalesce`: sequential coalescing of a multi-passage corpus

use std::env;
use std::process;

mod bench_utils;
mod coalesce_bench;
mod store_bench;

use crate::coalesce_bench::run_coalesce_bench;
use crate::store_bench::{run_append_bench, run_get_bench};

fn main() {
    if cfg!(debug_assertions) && env::var("FFINDEX_ALLOW_DEBUG_BENCH").as_deref() != Ok("1") {
        eprintln!(
            "error=debug_build_not_allowed message=\"run `cargo run --release -p ffindex-bench`\""
        );
        process::exit(2);
    }

    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    let scenario = env::var("FFINDEX_BENCH_SCENARIO").unwrap_or_else(|_| "all".to_string());
    let ok = match scenario.as_str() {
        "all" => run_append_bench(mode) && run_get_bench(mode) && run_coalesce_bench(mode),
        "append" => run_append_bench(mode),
        "get" => run_get_bench(mode),
        "coalesce" => run_coalesce_bench(mode),
        _ => {
            eprintln!(
                "error=invalid_scenario scenario=\"{scenario}\" allowed=\"all,append,get,coalesce\""
            );
            false
        }
    };

    if !ok {
        process::exit(1);
    }
}
