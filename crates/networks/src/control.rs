//! Minimal Tor control-port client: authenticate with the shared secret and
//! ask for a new circuit.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use darkgather_core::GatewayError;

#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: String,
    password: String,
}

#[derive(Debug)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn is_ok(&self) -> bool {
        self.code == 250
    }
}

impl ControlClient {
    pub fn new(addr: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            password: password.into(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// AUTHENTICATE, SIGNAL NEWNYM, QUIT. No timeout here, the gateway wraps the whole exchange.
    pub async fn new_identity(&self) -> Result<(), GatewayError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| GatewayError::Unavailable(format!("{}: {}", self.addr, e)))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let auth = send(
            &mut reader,
            &mut write_half,
            &format!("AUTHENTICATE {}", quote(&self.password)),
        )
        .await?;
        if !auth.is_ok() {
            return Err(GatewayError::AuthFailed(format!("{} {}", auth.code, auth.text)));
        }

        let signal = send(&mut reader, &mut write_half, "SIGNAL NEWNYM").await?;
        if !signal.is_ok() {
            return Err(GatewayError::Unavailable(format!(
                "NEWNYM rejected: {} {}",
                signal.code, signal.text
            )));
        }

        // Best effort, the circuit is already scheduled.
        let _ = send(&mut reader, &mut write_half, "QUIT").await;
        debug!(addr = %self.addr, "NEWNYM accepted");
        Ok(())
    }
}

fn quote(secret: &str) -> String {
    format!("\"{}\"", secret.replace('\\', "\\\\").replace('"', "\\\""))
}

async fn send<R, W>(
    reader: &mut BufReader<R>,
    writer: &mut W,
    command: &str,
) -> Result<Reply, GatewayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("{}\r\n", command).as_bytes())
        .await
        .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
    read_reply(reader).await
}

/// Reads one (possibly multi-line) reply. The final line has a space after the code.
async fn read_reply<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<Reply, GatewayError> {
    let mut text = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        if n == 0 {
            return Err(GatewayError::Unavailable("control connection closed".into()));
        }
        let line = line.trim_end();
        if line.len() < 4 {
            return Err(GatewayError::Unavailable(format!("malformed reply: {:?}", line)));
        }
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| GatewayError::Unavailable(format!("malformed reply: {:?}", line)))?;
        text.push(line.get(4..).unwrap_or_default().to_string());
        if line.as_bytes()[3] == b' ' {
            return Ok(Reply {
                code,
                text: text.join(" "),
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Fake control port. Accepts connections forever and records every command line.
    pub(crate) async fn spawn_control_port(password: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let line = line.trim_end().to_string();
                        log.lock().unwrap().push(line.clone());
                        let reply = if line.starts_with("AUTHENTICATE") {
                            if line == format!("AUTHENTICATE \"{}\"", password) {
                                "250 OK\r\n"
                            } else {
                                "515 Authentication failed: Password did not match\r\n"
                            }
                        } else if line == "SIGNAL NEWNYM" {
                            "250 OK\r\n"
                        } else if line == "QUIT" {
                            let _ = write_half.write_all(b"250 closing connection\r\n").await;
                            return;
                        } else {
                            "510 Unrecognized command\r\n"
                        };
                        if write_half.write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (addr, seen)
    }

    #[tokio::test]
    async fn test_new_identity_sends_newnym() {
        let (addr, seen) = spawn_control_port("hunter2").await;
        let client = ControlClient::new(addr, "hunter2");

        client.new_identity().await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["AUTHENTICATE \"hunter2\"", "SIGNAL NEWNYM", "QUIT"]);
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_failed() {
        let (addr, seen) = spawn_control_port("hunter2").await;
        let client = ControlClient::new(addr, "wrong");

        let err = client.new_identity().await.unwrap_err();

        assert!(matches!(err, GatewayError::AuthFailed(_)));
        assert!(!seen.lock().unwrap().iter().any(|l| l == "SIGNAL NEWNYM"));
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = ControlClient::new(addr, "x").new_identity().await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[test]
    fn test_quote_escapes_secret() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[tokio::test]
    async fn test_multiline_reply() {
        let data: &[u8] = b"250-version=0.4.8\r\n250 OK\r\n";
        let mut reader = BufReader::new(data);
        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.text, "version=0.4.8 OK");
    }
}
