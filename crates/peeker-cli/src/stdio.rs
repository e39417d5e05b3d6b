use std::io::{self, Read};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// Spawn a thread that forwards stdin to `tx` byte by byte.
///
/// The sender is dropped when stdin reaches end of file or fails, which
/// disconnects the channel.
pub fn spawn_stdin_reader(tx: Sender<u8>) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("Stdin reader started");

        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 256];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => {
                    debug!("Stdin closed");
                    break;
                }
                Ok(n) => {
                    if buf[..n].iter().any(|&b| tx.send(b).is_err()) {
                        // Service is gone
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Stdin read failed: {}", e);
                    break;
                }
            }
        }

        debug!("Stdin reader stopped");
    })
}
