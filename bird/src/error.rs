// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ipnetwork::IpNetwork;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io {0}")]
    Io(#[from] std::io::Error),

    #[error("control socket unavailable: {0}")]
    SocketUnavailable(String),

    #[error("control socket deadline exceeded")]
    Timeout,

    #[error("malformed prefix {0}")]
    MalformedPrefix(String),

    #[error("malformed integer {0}")]
    MalformedInteger(String),

    #[error("missing next-hop for {0}")]
    MissingNexthop(IpNetwork),

    #[error("no `local as` statement in {0}")]
    ConfigMissing(String),
}
