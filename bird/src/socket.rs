// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The BIRD control socket speaks a line protocol: a `0001 ` welcome on
//! connect, then tagged response lines terminated by a `0000 ` sentinel.
//! This client only interprets those two tags; everything in between is
//! handed to the parser untouched.

use crate::Error;
use slog::{debug, Logger};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::{timeout_at, Instant};

/// Deadline for the whole session: connect, welcome, command write and
/// every subsequent line read.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

const TAG_WELCOME: &str = "0001 ";
const TAG_END: &str = "0000 ";

/// One open session against the daemon's control socket. Stateless beyond
/// the socket itself.
pub struct ControlSocket {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    deadline: Instant,
    log: Logger,
}

impl ControlSocket {
    /// Connect and consume the welcome banner.
    pub async fn connect(path: &str, log: Logger) -> Result<Self, Error> {
        let deadline = Instant::now() + SESSION_TIMEOUT;
        let stream = timeout_at(deadline, UnixStream::connect(path))
            .await
            .map_err(|_| Error::SocketUnavailable(format!("{path}: connect timeout")))?
            .map_err(|e| Error::SocketUnavailable(format!("{path}: {e}")))?;

        let (rh, wh) = stream.into_split();
        let mut sock = Self {
            reader: BufReader::new(rh),
            writer: wh,
            deadline,
            log,
        };

        match sock.read_line().await {
            Ok(Some(line)) => match line.strip_prefix(TAG_WELCOME) {
                Some(banner) => debug!(sock.log, "welcome: {}", banner.trim_end()),
                None => debug!(sock.log, "unexpected welcome line: {}", line.trim_end()),
            },
            Ok(None) => {
                return Err(Error::SocketUnavailable(format!(
                    "{path}: closed before welcome"
                )));
            }
            Err(e) => {
                return Err(Error::SocketUnavailable(format!("{path}: welcome: {e}")));
            }
        }
        Ok(sock)
    }

    /// Write one command line to the daemon.
    pub async fn send_command(&mut self, cmd: &str) -> Result<(), Error> {
        timeout_at(self.deadline, self.writer.write_all(cmd.as_bytes()))
            .await
            .map_err(|_| Error::Timeout)??;
        Ok(())
    }

    /// Next line of the response stream, or `None` once the end-of-data
    /// sentinel is seen or the daemon closes the connection.
    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        match self.read_line().await? {
            Some(line) if line.starts_with(TAG_END) => Ok(None),
            other => Ok(other),
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>, Error> {
        let mut line = String::new();
        let n = timeout_at(self.deadline, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout)??;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    // Serve one scripted control session: read a line, then write the
    // canned response.
    fn fake_bird(listener: UnixListener, response: &'static str) {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"0001 BIRD 2.0.8 ready.\n").await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"show route all\n");
            stream.write_all(response.as_bytes()).await.unwrap();
        });
    }

    #[tokio::test]
    async fn fetch_routes_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird.ctl");
        let listener = UnixListener::bind(&path).unwrap();
        fake_bird(
            listener,
            "1007-10.0.0.0/24 via 192.0.2.1 on eth0 [peer1 12:00:00] * (100) [AS65001i]\n\
             1008-\tType: BGP unicast univ\n\
             1012-\tBGP.origin: IGP\n\
             \tBGP.as_path: 65001 65002\n\
             \tBGP.next_hop: 192.0.2.1\n\
             \tBGP.local_pref: 100\n\
             \tBGP.med: 0\n\
             0000 \n",
        );

        let log = pbr_common::test::logger();
        let routes = crate::routes(path.to_str().unwrap(), &log).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].network, "10.0.0.0/24".parse().unwrap());
        assert_eq!(routes[0].paths.len(), 1);
    }

    #[tokio::test]
    async fn connect_failure_is_socket_unavailable() {
        let log = pbr_common::test::logger();
        let err = crate::routes("/nonexistent/bird.ctl", &log)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SocketUnavailable(_)));
    }

    #[tokio::test]
    async fn close_before_welcome_is_socket_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bird.ctl");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let log = pbr_common::test::logger();
        let err = ControlSocket::connect(path.to_str().unwrap(), log)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::SocketUnavailable(_)));
    }
}
