// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! pbrd: a BGP-aware performance routing overlay for BIRD. Reads the
//! daemon's routes, scores every AS path against the metrics oracle and
//! installs the cheapest next hop per prefix into the kernel under a
//! dedicated owner protocol.

use anyhow::Result;
use bird::AddressFamily;
use clap::{Parser, ValueEnum};
use cost::UnknownCostPolicy;
use pbr_lower::netlink::NetlinkFib;
use pbr_lower::platform::V6SourceSelector;
use pbr_lower::table::RouteTable;
use slog::error;

mod display;
mod oracle;

#[derive(Parser, Debug)]
#[command(version, about = "BGP-aware performance routing overlay for BIRD")]
struct Cli {
    /// Select and install the best path for every prefix.
    #[arg(short = 'u')]
    update_routes: bool,

    /// Print a table of all routes and computed path costs.
    #[arg(short = 'i')]
    show_info: bool,

    /// Print the managed kernel routes.
    #[arg(short = 's')]
    show_routes: bool,

    /// Run forever, reconciling on a fixed interval.
    #[arg(short = 'd')]
    daemon: bool,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,

    /// BIRD control socket (IPv4 instance).
    #[arg(long, default_value = bird::BIRD4_SOCKET)]
    bird_socket: String,

    /// BIRD control socket (IPv6 instance).
    #[arg(long, default_value = bird::BIRD6_SOCKET)]
    bird6_socket: String,

    /// BIRD configuration file to read the local AS from.
    #[arg(long, default_value = bird::config::BIRD_CONFIG)]
    config_path: String,

    /// Base URL of the performance metrics oracle.
    #[arg(long, default_value = "http://localhost:9822")]
    metrics_url: String,

    /// Textual prefix a candidate IPv6 source address must start with.
    #[arg(long, default_value = "fdac:c9:")]
    v6_source_prefix: String,

    /// Textual suffix a candidate IPv6 source address must end with.
    #[arg(long, default_value = "::2")]
    v6_source_suffix: String,

    /// How an unknowable edge cost is treated during selection.
    #[arg(long, value_enum, default_value_t = UnknownCostArg::Zero)]
    unknown_cost: UnknownCostArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum UnknownCostArg {
    /// Unknown edges cost nothing and never block selection.
    Zero,
    /// Unknown edges cost infinity and are never installed.
    Infinity,
}

impl From<UnknownCostArg> for UnknownCostPolicy {
    fn from(arg: UnknownCostArg) -> Self {
        match arg {
            UnknownCostArg::Zero => UnknownCostPolicy::ZeroPermits,
            UnknownCostArg::Infinity => UnknownCostPolicy::InfinityBlocks,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let level = if args.debug {
        slog::Level::Debug
    } else {
        slog::Level::Info
    };
    let log = pbr_common::log::init_logger(level);

    // A missing local AS is survivable: selection still runs, only the
    // self-AS withdraw branch goes quiet (zero matches no first hop).
    let local_as = match bird::config::local_as(&args.config_path) {
        Ok(asn) => asn,
        Err(e) => {
            error!(log, "failed to read local AS: {e}");
            0
        }
    };

    let cfg = pbr_lower::Config {
        local_as,
        bird4_socket: args.bird_socket.clone(),
        bird6_socket: args.bird6_socket.clone(),
        v6_source: V6SourceSelector {
            ifname_prefix: "e".into(),
            addr_prefix: args.v6_source_prefix.clone(),
            addr_suffix: args.v6_source_suffix.clone(),
        },
    };

    let engine = cost::Engine::new(
        oracle::HttpSource::new(&args.metrics_url),
        args.unknown_cost.into(),
        log.clone(),
    );

    let fib = NetlinkFib::new()?;
    let hosts = fib.clone();
    let table = RouteTable::new(fib, log.clone());

    if args.daemon {
        pbr_lower::run(&cfg, &engine, &table, &hosts, &log).await;
        return Ok(());
    }

    // Interactive mode: run each requested action once; the first
    // failure sets a non-zero exit code.
    for family in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
        if args.update_routes {
            pbr_lower::reconcile(family, &cfg, &engine, &table, &hosts, &log).await?;
        }
        if args.show_info {
            let socket = match family {
                AddressFamily::Ipv4 => &args.bird_socket,
                AddressFamily::Ipv6 => &args.bird6_socket,
            };
            let routes = bird::routes(socket, &log).await?;
            display::info_table(&routes, local_as, &engine).await?;
        }
    }
    if args.show_routes {
        display::managed_table(&table).await?;
    }

    Ok(())
}
