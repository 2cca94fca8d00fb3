//! GPS monitor: NMEA sentences over UDP in, position fixes out
//!
//! Phone apps such as GPS2IP push raw NMEA lines to a UDP port. Every RMC or
//! GGA sentence that carries a position becomes a [`GpsFix`] and is fanned
//! out to subscribers. Anything else on the socket is dropped.

use nmea0183::{ParseResult, Parser};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const FIX_BUFFER_SIZE: usize = 64;
const MAX_DATAGRAM: usize = 2048;

/// One position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Sentence the fix came from, `RMC` or `GGA`
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    /// Metres above mean sea level, GGA only
    pub alt: Option<f64>,
    /// Receipt time, RFC 3339
    pub time: String,
}

impl GpsFix {
    fn from_result(result: ParseResult) -> Option<Self> {
        let time = chrono::Utc::now().to_rfc3339();
        match result {
            ParseResult::RMC(Some(rmc)) => Some(GpsFix {
                kind: "RMC".to_string(),
                lat: rmc.latitude.as_f64(),
                lon: rmc.longitude.as_f64(),
                alt: None,
                time,
            }),
            ParseResult::GGA(Some(gga)) => Some(GpsFix {
                kind: "GGA".to_string(),
                lat: gga.latitude.as_f64(),
                lon: gga.longitude.as_f64(),
                alt: Some(gga.altitude.meters as f64),
                time,
            }),
            _ => None,
        }
    }
}

/// Parse every sentence in one datagram.
///
/// Lines are trimmed and re-terminated before parsing, so senders may use
/// `\n`, `\r\n` or no terminator at all.
pub fn parse_datagram(data: &[u8]) -> Vec<GpsFix> {
    let text = String::from_utf8_lossy(data);
    let mut fixes = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parser = Parser::new();
        let sentence = format!("{}\r\n", line);
        for result in parser.parse_from_bytes(sentence.as_bytes()) {
            match result {
                Ok(parsed) => {
                    if let Some(fix) = GpsFix::from_result(parsed) {
                        fixes.push(fix);
                    }
                }
                Err(e) => debug!("Ignoring NMEA line {:?}: {}", line, e),
            }
        }
    }
    fixes
}

/// UDP listener that publishes parsed fixes
pub struct GpsMonitor {
    socket: UdpSocket,
    fixes: broadcast::Sender<GpsFix>,
}

impl GpsMonitor {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let (fixes, _) = broadcast::channel(FIX_BUFFER_SIZE);
        Ok(Self { socket, fixes })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender side of the fix channel, for handing to the WebSocket hub
    pub fn sender(&self) -> broadcast::Sender<GpsFix> {
        self.fixes.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GpsFix> {
        self.fixes.subscribe()
    }

    /// Receive until the socket fails
    pub async fn run(self) -> io::Result<()> {
        info!("Listening for GPS data on UDP {}...", self.local_addr()?);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    warn!("GPS sender went away: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for fix in parse_datagram(&buf[..len]) {
                debug!("Parsed GPS from {}: {:?}", peer, fix);
                // no browser connected yet is not an error
                let _ = self.fixes.send(fix);
            }
        }
    }
}
