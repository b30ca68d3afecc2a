// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog::{Drain, Level, Logger};
use std::io::Write;

pub fn init_logger(level: Level) -> Logger {
    build_logger(std::io::stdout(), level)
}

pub fn build_logger<W: Write + Send + 'static>(w: W, level: Level) -> Logger {
    let drain = slog_bunyan::new(w).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(0x8000)
        .build()
        .fuse();
    let drain = drain.filter_level(level).fuse();
    slog::Logger::root(drain, slog::o!())
}
