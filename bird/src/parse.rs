// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for the response stream of `show route all`.
//!
//! The daemon's output dialect is line oriented with a numeric tag at the
//! start of each record. The tags that matter here: `1007-` carries a
//! route header (prefix, first next hop, egress interface) or, with an
//! empty prefix token, a bare next-hop continuation; `1008-` names the
//! route type; `1012-` opens the BGP attribute block, whose further
//! attributes arrive on tab-indented untagged lines.
//!
//! The parser is a state machine fed one line at a time. A route is
//! emitted when the next header opens, and the trailing route when the
//! stream ends. Paths are sealed at header boundaries; a path only counts
//! once an `as_path` attribute was seen, so half-read attribute blocks
//! are dropped rather than guessed at.

use crate::{BgpPath, Error, Route};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

const TAG_ROUTE: &str = "1007-";
const TAG_TYPE: &str = "1008-";
const TAG_BGP_ATTR: &str = "1012-";
const ATTR_PREFIX: &str = "BGP.";

/// Whole-line field indices on `1007-` lines. The tag token itself is
/// field 0; on continuation lines it stands alone, which keeps the
/// indices stable across both forms.
const FIELD_NEXTHOP: usize = 2;
const FIELD_IFNAME: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No route header seen yet, or the previous route was just emitted.
    AwaitingRoute,
    /// Inside a route record, before any BGP attribute.
    InRoute,
    /// Accumulating BGP attributes for the current path.
    InPath,
}

/// Fields stashed from the most recent `1007-` line, consumed when the
/// matching `1008-` line identifies the route as BGP.
#[derive(Debug, Default)]
struct Header {
    nexthop: Option<IpAddr>,
    ifname: Option<String>,
    /// Last whitespace-delimited token; the origin AS hides in here.
    trailer: Option<String>,
}

/// A path under construction. `as_path` is `None` until the attribute is
/// seen, which doubles as the "is there a sealable path" marker.
#[derive(Debug, Default)]
struct PathDraft {
    neighbor_as: u32,
    as_path: Option<Vec<u32>>,
    nexthop: Option<IpAddr>,
    ifname: Option<String>,
    med: u32,
    local_pref: u32,
    origin_type: String,
}

#[derive(Debug)]
struct RouteAcc {
    network: IpNetwork,
    origin_as: u32,
    paths: Vec<BgpPath>,
    is_bgp: bool,
}

pub struct Parser {
    state: State,
    route: Option<RouteAcc>,
    header: Header,
    path: PathDraft,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingRoute,
            route: None,
            header: Header::default(),
            path: PathDraft::default(),
        }
    }

    /// Feed one line of the response stream. Returns a completed route
    /// when `line` opens the next record.
    pub fn feed(&mut self, line: &str) -> Result<Option<Route>, Error> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with(TAG_ROUTE) {
            return self.route_line(line);
        }
        if let Some(rest) = line.strip_prefix(TAG_TYPE) {
            self.type_line(rest)?;
            return Ok(None);
        }
        if let Some(rest) = line.strip_prefix(TAG_BGP_ATTR) {
            self.attr_line(rest)?;
            return Ok(None);
        }
        // Attribute continuations arrive indented and untagged.
        if self.state == State::InPath && line.starts_with(['\t', ' ']) {
            self.attr_line(line)?;
        }
        Ok(None)
    }

    /// Flush the route under construction when the stream ends.
    pub fn finish(&mut self) -> Result<Option<Route>, Error> {
        self.seal_path()?;
        self.state = State::AwaitingRoute;
        Ok(self.take_route())
    }

    /// A `1007-` line: either a new route header (non-empty prefix token)
    /// or a next-hop continuation for the route we are in.
    fn route_line(&mut self, line: &str) -> Result<Option<Route>, Error> {
        // A header boundary seals whatever path was accumulating, so one
        // route can carry several equal-prefix paths back to back.
        self.seal_path()?;

        let fields: Vec<&str> = line.split_whitespace().collect();
        let prefix_tok = fields
            .first()
            .and_then(|f| f.strip_prefix(TAG_ROUTE))
            .unwrap_or("");

        let nexthop = fields.get(FIELD_NEXTHOP).and_then(|f| f.parse().ok());
        let ifname = fields.get(FIELD_IFNAME).map(|f| f.to_string());

        if prefix_tok.is_empty() {
            // A further next hop for the current route.
            self.header.nexthop = nexthop;
            self.header.ifname = ifname.clone();
            if self.route.as_ref().is_some_and(|r| r.is_bgp) {
                self.path.nexthop = nexthop;
                self.path.ifname = ifname;
            }
            return Ok(None);
        }

        let network: IpNetwork = prefix_tok
            .parse()
            .map_err(|_| Error::MalformedPrefix(prefix_tok.to_string()))?;

        let done = self.take_route();
        self.route = Some(RouteAcc {
            network,
            origin_as: 0,
            paths: Vec::new(),
            is_bgp: false,
        });
        self.header = Header {
            nexthop,
            ifname,
            trailer: fields.last().map(|f| f.to_string()),
        };
        self.state = State::InRoute;
        Ok(done)
    }

    /// A `1008-` type descriptor, e.g. `\tType: BGP unicast univ`.
    fn type_line(&mut self, rest: &str) -> Result<(), Error> {
        let Some(route) = self.route.as_mut() else {
            return Ok(());
        };
        let body = rest.trim_start();
        let body = body.strip_prefix("Type:").unwrap_or(body);
        route.is_bgp = body.split_whitespace().next() == Some("BGP");
        if !route.is_bgp {
            return Ok(());
        }

        // First sight of a BGP path under this header: next hop and
        // egress interface come from the header line until the attribute
        // block overrides them.
        self.path.nexthop = self.header.nexthop;
        self.path.ifname = self.header.ifname.clone();

        if route.origin_as == 0 {
            if let Some(run) = self.header.trailer.as_deref().and_then(first_digit_run) {
                route.origin_as = run
                    .parse()
                    .map_err(|_| Error::MalformedInteger(run.to_string()))?;
            }
        }
        Ok(())
    }

    /// A BGP attribute, `BGP.<attr>: <value>`, from the `1012-` line or a
    /// continuation. Unknown attribute keys are ignored so newer daemons
    /// stay parseable.
    fn attr_line(&mut self, rest: &str) -> Result<(), Error> {
        if !self.route.as_ref().is_some_and(|r| r.is_bgp) {
            return Ok(());
        }
        let body = rest.trim_start();
        let Some((key, value)) = body.split_once(':') else {
            return Ok(());
        };
        let Some(attr) = key.trim().strip_prefix(ATTR_PREFIX) else {
            return Ok(());
        };
        let value = value.trim();
        self.state = State::InPath;

        match attr {
            "origin" => self.path.origin_type = value.to_string(),
            "next_hop" => {
                if !value.is_empty() {
                    self.path.nexthop = value.parse().ok();
                }
            }
            "as_path" => {
                let mut as_path = Vec::new();
                for tok in value.split_whitespace() {
                    let asn = tok
                        .parse::<u32>()
                        .map_err(|_| Error::MalformedInteger(tok.to_string()))?;
                    as_path.push(asn);
                }
                self.path.neighbor_as = as_path.first().copied().unwrap_or(0);
                self.path.as_path = Some(as_path);
            }
            "local_pref" => {
                if !value.is_empty() {
                    self.path.local_pref = parse_u32(value)?;
                }
            }
            "med" => {
                if !value.is_empty() {
                    self.path.med = parse_u32(value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Close out the path under construction, if it accumulated an AS
    /// path. Called at header boundaries and at end of stream.
    fn seal_path(&mut self) -> Result<(), Error> {
        let draft = std::mem::take(&mut self.path);
        let Some(route) = self.route.as_mut() else {
            return Ok(());
        };
        let Some(as_path) = draft.as_path else {
            return Ok(());
        };
        let nexthop = draft.nexthop.ok_or(Error::MissingNexthop(route.network))?;
        route.paths.push(BgpPath {
            neighbor_as: draft.neighbor_as,
            as_path,
            nexthop,
            ifname: draft.ifname.unwrap_or_default(),
            med: draft.med,
            local_pref: draft.local_pref,
            origin_type: draft.origin_type,
        });
        Ok(())
    }

    fn take_route(&mut self) -> Option<Route> {
        let acc = self.route.take()?;
        Some(Route {
            network: acc.network,
            origin_as: acc.origin_as,
            paths: acc.paths,
        })
    }
}

fn parse_u32(value: &str) -> Result<u32, Error> {
    value
        .parse()
        .map_err(|_| Error::MalformedInteger(value.to_string()))
}

/// First run of consecutive ASCII digits in `s`, if any.
fn first_digit_run(s: &str) -> Option<&str> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}
