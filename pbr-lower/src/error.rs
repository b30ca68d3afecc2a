// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("route already exists")]
    Exists,

    #[error("route does not exist")]
    DoesNotExist,

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("system error {0}")]
    SystemError(String),

    #[error("io error {0}")]
    Io(#[from] std::io::Error),

    #[error("bird {0}")]
    Bird(#[from] bird::Error),

    #[error("no usable outbound source address: {0}")]
    NoSourceAddr(String),
}
