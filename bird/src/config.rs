// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reader for the one value this system needs out of the daemon's own
//! configuration: the local AS number.

use crate::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default location of the BIRD daemon configuration.
pub const BIRD_CONFIG: &str = "/etc/bird/bird.conf";

/// Scan `path` for the first `local as <digits>` statement and return the
/// AS number. An absent file and an absent statement are the same
/// condition to callers: no local AS is configured.
pub fn local_as<P: AsRef<Path>>(path: P) -> Result<u32, Error> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|_| Error::ConfigMissing(path.display().to_string()))?;

    for line in BufReader::new(file).lines() {
        if let Some(asn) = match_local_as(&line?) {
            return Ok(asn);
        }
    }
    Err(Error::ConfigMissing(path.display().to_string()))
}

/// Match `local as <digits>` anywhere in a line, tokenized the way the
/// daemon writes it. The number may run into trailing punctuation.
fn match_local_as(line: &str) -> Option<u32> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    for w in tokens.windows(3) {
        if w[0] == "local" && w[1] == "as" {
            if let Some(asn) = digits_prefix(w[2]) {
                return Some(asn);
            }
        }
    }
    None
}

fn digits_prefix(tok: &str) -> Option<u32> {
    let end = tok
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tok.len());
    if end == 0 {
        None
    } else {
        tok[..end].parse().ok()
    }
}
