//! Per-call media endpoint: a UDP socket speaking RTP both ways.
//!
//! [`MediaEndpoint`] owns its socket exclusively. Inbound datagrams are
//! exposed through [`Ingress`], a lazy infinite sequence of µ-law
//! payloads; outbound audio is submitted to a FIFO playback queue
//! serviced by a single long-lived worker task, so at most one stream is
//! ever on the wire per call. Cancellation drops the queue and halts the
//! in-flight stream at the next frame boundary, which is all barge-in
//! needs.

mod error;
pub(crate) mod playback;

pub use error::{Error, Result};

use crate::constants::RTP_HEADER_LEN;
use bytes::Bytes;
use flume::{Receiver, Sender};
use playback::PlaybackJob;
use std::{
    io::ErrorKind,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{net::UdpSocket, spawn};
use tracing::{error, trace};

/// A bound RTP endpoint for one call.
///
/// Dropping the endpoint cancels any in-flight playback, stops the
/// worker and closes the socket; no explicit teardown call is needed on
/// any exit path.
#[derive(Debug)]
pub struct MediaEndpoint {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    jobs_tx: Sender<PlaybackJob>,
    // Held only to drain pending jobs on cancellation; the worker owns
    // its own clone.
    jobs_rx: Receiver<PlaybackJob>,
    generation: Arc<AtomicU64>,
    // Jobs accepted but not yet fully played or discarded. Incremented
    // on enqueue, decremented exactly once per job by whichever side
    // consumes it.
    pending: Arc<AtomicUsize>,
}

impl MediaEndpoint {
    /// Binds a UDP socket on `addr` and starts the playback worker.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let (jobs_tx, jobs_rx) = flume::unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        spawn(playback::runner(
            jobs_rx.clone(),
            Arc::clone(&socket),
            Arc::clone(&generation),
            Arc::clone(&pending),
        ));

        trace!("Media endpoint bound on {}.", local_addr);

        Ok(Self {
            socket,
            local_addr,
            jobs_tx,
            jobs_rx,
            generation,
            pending,
        })
    }

    /// The locally bound address, useful when binding to port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Opens the inbound payload sequence.
    ///
    /// Each item is the payload of one received datagram, i.e. the bytes
    /// after the 12-byte RTP header, together with the sender address.
    /// Header extensions and CSRCs are deliberately not parsed. The
    /// sequence is infinite until an empty datagram arrives or the
    /// socket fails fatally.
    ///
    /// The endpoint owns its socket exclusively; only one [`Ingress`]
    /// should be read at a time.
    pub fn ingress(&self, packet_size: usize) -> Result<Ingress> {
        if packet_size < RTP_HEADER_LEN {
            return Err(Error::PacketSizeTooSmall(packet_size));
        }

        Ok(Ingress {
            socket: Arc::clone(&self.socket),
            buf: vec![0u8; packet_size],
        })
    }

    /// Appends one audio buffer to the playback queue.
    ///
    /// Never blocks and never drops: submissions play strictly in order
    /// unless [`cancel_playback`] discards them. `sample_rate` and
    /// `frame_duration` determine the frame size on the wire.
    ///
    /// [`cancel_playback`]: MediaEndpoint::cancel_playback
    pub fn enqueue_playback(
        &self,
        audio: Vec<u8>,
        peer: SocketAddr,
        sample_rate: usize,
        frame_duration: Duration,
    ) {
        let job = PlaybackJob {
            audio,
            peer,
            sample_rate,
            frame_duration,
            generation: self.generation.load(Ordering::Acquire),
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        // The worker holds the receiving half for as long as we exist.
        drop(self.jobs_tx.send(job));
    }

    /// Whether the worker is mid-stream or playback is queued.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Discards all queued playback and interrupts the current stream.
    ///
    /// On return the queue is empty; the in-flight frame loop observes
    /// the cancellation no later than the next frame boundary.
    /// Idempotent and safe from any task.
    pub fn cancel_playback(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let discarded = self.jobs_rx.try_iter().count();
        if discarded > 0 {
            self.pending.fetch_sub(discarded, Ordering::AcqRel);
            trace!("Discarded {} queued playback jobs.", discarded);
        }
    }
}

impl Drop for MediaEndpoint {
    fn drop(&mut self) {
        // Halt any in-flight stream; the worker then sees the job
        // channel disconnect and exits, releasing the socket.
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Lazy, infinite sequence of inbound `(payload, peer)` pairs.
#[derive(Debug)]
pub struct Ingress {
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
}

impl Ingress {
    /// Waits for the next datagram.
    ///
    /// Resolves to `None` once an empty datagram is received or the
    /// socket reports an unrecoverable error, ending the call's media.
    pub async fn next(&mut self) -> Option<(Bytes, SocketAddr)> {
        loop {
            match self.socket.recv_from(&mut self.buf).await {
                Ok((0, _)) => return None,
                Ok((len, addr)) if len < RTP_HEADER_LEN => {
                    trace!("Dropping {}-byte datagram from {}.", len, addr);
                },
                Ok((len, addr)) => {
                    return Some((Bytes::copy_from_slice(&self.buf[RTP_HEADER_LEN..len]), addr));
                },
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::Interrupted | ErrorKind::WouldBlock
                    ) =>
                {
                    // Transient: typically an ICMP bounce from the peer.
                    trace!("Transient UDP receive error: {:?}.", e);
                },
                Err(e) => {
                    error!("Fatal UDP receive error: {:?}.", e);
                    return None;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RTP_VERSION, SAMPLE_RATE_RAW, TIMESTEP_LENGTH, ULAW_FRAME_SIZE};
    use byteorder::{BigEndian, ByteOrder};
    use std::time::Duration;
    use tokio::{net::UdpSocket, time::timeout};

    const RECV_GAP: Duration = Duration::from_millis(400);

    async fn harness() -> (MediaEndpoint, UdpSocket, SocketAddr) {
        let endpoint = MediaEndpoint::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        (endpoint, peer, peer_addr)
    }

    /// Reads packets off `peer` until the stream goes quiet.
    async fn collect_packets(peer: &UdpSocket) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        let mut buf = [0u8; 2048];
        while let Ok(Ok((len, _))) = timeout(RECV_GAP, peer.recv_from(&mut buf)).await {
            packets.push(buf[..len].to_vec());
        }
        packets
    }

    fn seq(packet: &[u8]) -> u16 {
        BigEndian::read_u16(&packet[2..4])
    }

    fn ts(packet: &[u8]) -> u32 {
        BigEndian::read_u32(&packet[4..8])
    }

    fn ssrc(packet: &[u8]) -> u32 {
        BigEndian::read_u32(&packet[8..12])
    }

    #[tokio::test]
    async fn rejects_packet_sizes_below_the_header() {
        let (endpoint, _peer, _) = harness().await;
        assert!(matches!(
            endpoint.ingress(11),
            Err(Error::PacketSizeTooSmall(11))
        ));
        assert!(endpoint.ingress(12).is_ok());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn header_sized_packets_yield_empty_payloads() {
        let (endpoint, peer, _) = harness().await;
        let mut ingress = endpoint.ingress(12).unwrap();

        peer.send_to(&[0u8; 12], endpoint.local_addr()).await.unwrap();
        let (payload, addr) = ingress.next().await.unwrap();
        assert!(payload.is_empty());
        assert_eq!(addr, peer.local_addr().unwrap());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn ingress_strips_the_rtp_header() {
        let (endpoint, peer, _) = harness().await;
        let mut ingress = endpoint.ingress(2048).unwrap();

        let mut datagram = vec![0u8; 12];
        datagram.extend_from_slice(&[0xAB; ULAW_FRAME_SIZE]);
        peer.send_to(&datagram, endpoint.local_addr()).await.unwrap();

        let (payload, _) = ingress.next().await.unwrap();
        assert_eq!(&payload[..], &[0xAB; ULAW_FRAME_SIZE][..]);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn empty_datagram_ends_the_stream() {
        let (endpoint, peer, _) = harness().await;
        let mut ingress = endpoint.ingress(2048).unwrap();

        peer.send_to(&[], endpoint.local_addr()).await.unwrap();
        assert!(ingress.next().await.is_none());
    }

    #[tokio::test]
    #[ntest::timeout(20_000)]
    async fn playback_round_trips_with_monotonic_headers() {
        let (endpoint, peer, peer_addr) = harness().await;

        let audio: Vec<u8> = (0..5 * ULAW_FRAME_SIZE + 40).map(|i| i as u8).collect();
        endpoint.enqueue_playback(audio.clone(), peer_addr, SAMPLE_RATE_RAW, TIMESTEP_LENGTH);

        let packets = collect_packets(&peer).await;
        assert_eq!(packets.len(), 6);

        let session_ssrc = ssrc(&packets[0]);
        let mut replayed = Vec::new();
        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet[0] >> 6, RTP_VERSION);
            assert_eq!(packet[1] & 0x7F, 0, "payload type must be PCMU");
            assert_eq!(seq(packet), i as u16);
            assert_eq!(ts(packet), (i * ULAW_FRAME_SIZE) as u32);
            assert_eq!(ssrc(packet), session_ssrc);
            replayed.extend_from_slice(&packet[12..]);
        }
        assert_eq!(replayed, audio);
        assert!(!endpoint.is_playing());
    }

    #[tokio::test]
    #[ntest::timeout(20_000)]
    async fn sessions_play_in_order_and_restart_headers() {
        let (endpoint, peer, peer_addr) = harness().await;

        endpoint.enqueue_playback(
            vec![0x01; 2 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );
        endpoint.enqueue_playback(
            vec![0x02; ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );

        let packets = collect_packets(&peer).await;
        assert_eq!(packets.len(), 3);

        // First session: two frames of 0x01 with one SSRC.
        assert_eq!(seq(&packets[0]), 0);
        assert_eq!(seq(&packets[1]), 1);
        assert_eq!(ssrc(&packets[0]), ssrc(&packets[1]));
        assert!(packets[0][12..].iter().all(|&b| b == 0x01));

        // Second session restarts the sequence under a fresh SSRC.
        assert_eq!(seq(&packets[2]), 0);
        assert_eq!(ts(&packets[2]), 0);
        assert_ne!(ssrc(&packets[2]), ssrc(&packets[0]));
        assert!(packets[2][12..].iter().all(|&b| b == 0x02));
    }

    #[tokio::test]
    #[ntest::timeout(20_000)]
    async fn cancel_stops_the_stream_and_drains_the_queue() {
        let (endpoint, peer, peer_addr) = harness().await;

        // A hundred frames of audio plus a queued follow-up.
        endpoint.enqueue_playback(
            vec![0x01; 100 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );
        endpoint.enqueue_playback(
            vec![0x02; 10 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );

        let mut buf = [0u8; 2048];
        for _ in 0..3 {
            timeout(RECV_GAP, peer.recv_from(&mut buf)).await.unwrap().unwrap();
        }

        endpoint.cancel_playback();

        // Whatever was already in flight settles within a frame or two;
        // the queued job must never surface.
        let leftovers = collect_packets(&peer).await;
        assert!(leftovers.len() <= 2, "got {} packets after cancel", leftovers.len());
        assert!(leftovers.iter().all(|p| p[12..].iter().all(|&b| b == 0x01)));
        assert!(!endpoint.is_playing());
    }

    #[tokio::test]
    #[ntest::timeout(20_000)]
    async fn playback_enqueued_after_cancel_still_plays() {
        let (endpoint, peer, peer_addr) = harness().await;

        endpoint.enqueue_playback(
            vec![0x01; 100 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );
        endpoint.cancel_playback();
        endpoint.enqueue_playback(
            vec![0x03; 2 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );

        let packets = collect_packets(&peer).await;
        let survivors: Vec<_> = packets
            .iter()
            .filter(|p| p[12..].iter().all(|&b| b == 0x03))
            .collect();
        assert_eq!(survivors.len(), 2);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn cancel_is_idempotent_when_idle() {
        let (endpoint, _peer, _) = harness().await;
        endpoint.cancel_playback();
        endpoint.cancel_playback();
        assert!(!endpoint.is_playing());
    }

    #[tokio::test]
    #[ntest::timeout(20_000)]
    async fn is_playing_tracks_the_queue() {
        let (endpoint, peer, peer_addr) = harness().await;
        assert!(!endpoint.is_playing());

        endpoint.enqueue_playback(
            vec![0x01; 5 * ULAW_FRAME_SIZE],
            peer_addr,
            SAMPLE_RATE_RAW,
            TIMESTEP_LENGTH,
        );
        assert!(endpoint.is_playing());

        let packets = collect_packets(&peer).await;
        assert_eq!(packets.len(), 5);
        assert!(!endpoint.is_playing());
    }
}
