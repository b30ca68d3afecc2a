// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use colored::Colorize;
use cost::{Engine, MetricsSource};
use pbr_lower::platform::Fib;
use pbr_lower::table::RouteTable;
use pbr_lower::RECONCILE_TIMEOUT;
use std::io::Write;
use tabwriter::TabWriter;
use tokio::time::Instant;

/// Print every route with the computed total cost of each of its paths,
/// cheapest first. Routes without paths print as a bare row.
pub async fn info_table<M: MetricsSource>(
    routes: &[bird::Route],
    local_as: u32,
    engine: &Engine<M>,
) -> Result<()> {
    println!("Local AS: {local_as}");

    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(
        &mut tw,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        "Network".dimmed(),
        "Origin AS".dimmed(),
        "Via AS".dimmed(),
        "AS Path".dimmed(),
        "Next Hop".dimmed(),
        "Interface".dimmed(),
        "MED".dimmed(),
        "Local Pref".dimmed(),
        "Origin Type".dimmed(),
        "Total Cost".dimmed(),
    )?;

    let deadline = Instant::now() + RECONCILE_TIMEOUT;
    for route in routes {
        if route.paths.is_empty() {
            writeln!(
                &mut tw,
                "{}\t{}\t\t\t\t\t\t\t\t",
                route.network, route.origin_as
            )?;
            continue;
        }

        let mut rows = Vec::new();
        for path in &route.paths {
            let cost = engine.total_cost(&path.as_path, local_as, deadline).await;
            rows.push((path, cost));
        }
        rows.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (path, cost) in rows {
            writeln!(
                &mut tw,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}",
                route.network,
                route.origin_as,
                path.neighbor_as,
                join_as_path(&path.as_path),
                path.nexthop,
                path.ifname,
                path.med,
                path.local_pref,
                path.origin_type,
                cost,
            )?;
        }
    }
    tw.flush()?;
    Ok(())
}

/// Print the kernel routes this system currently owns.
pub async fn managed_table<F: Fib>(table: &RouteTable<F>) -> Result<()> {
    let routes = table.list_managed().await?;
    if routes.is_empty() {
        println!("No managed routes found");
        return Ok(());
    }

    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(
        &mut tw,
        "{}\t{}\t{}",
        "Destination".dimmed(),
        "Gateway".dimmed(),
        "Source".dimmed(),
    )?;
    for route in routes {
        let src = route
            .src
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        writeln!(&mut tw, "{}\t{}\t{}", route.dst, route.gw, src)?;
    }
    tw.flush()?;
    Ok(())
}

fn join_as_path(as_path: &[u32]) -> String {
    as_path
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
