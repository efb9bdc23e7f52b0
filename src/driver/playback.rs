use crate::constants::*;
use flume::Receiver;
use rand::random;
use std::{
    io::Result as IoResult,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{net::UdpSocket, time::sleep};
use tracing::{error, instrument, trace, warn};

use discortp::rtp::MutableRtpPacket;

/// One queued playback: a complete µ-law buffer destined for a peer.
///
/// Jobs are stamped with the cancel generation current at enqueue time;
/// the worker discards any job older than the live generation.
#[derive(Debug)]
pub(crate) struct PlaybackJob {
    pub audio: Vec<u8>,
    pub peer: SocketAddr,
    pub sample_rate: usize,
    pub frame_duration: Duration,
    pub generation: u64,
}

pub(crate) async fn runner(
    rx: Receiver<PlaybackJob>,
    socket: Arc<UdpSocket>,
    generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
) {
    trace!("Playback worker started.");

    while let Ok(job) = rx.recv_async().await {
        if job.generation >= generation.load(Ordering::Acquire) {
            if let Err(e) = stream_job(&job, &socket, &generation).await {
                // One bad chunk must not take the worker down with it.
                error!("RTP playback send error: {:?}.", e);
            }
        } else {
            trace!("Discarding stale playback job.");
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }

    trace!("Playback worker stopped.");
}

/// Walks one audio buffer onto the wire in frame-sized RTP packets.
///
/// A fresh header is built per session: new random SSRC, sequence and
/// timestamp starting at zero. Cancellation is observed between frames,
/// so playback halts no later than one frame duration after the
/// generation moves on.
#[instrument(level = "trace", skip_all, fields(peer = %job.peer, len = job.audio.len()))]
async fn stream_job(
    job: &PlaybackJob,
    socket: &UdpSocket,
    generation: &AtomicU64,
) -> IoResult<()> {
    let frame_size = job.sample_rate * job.frame_duration.as_millis() as usize / 1000;
    if frame_size == 0 {
        warn!("Refusing zero-length playback frames.");
        return Ok(());
    }

    let mut packet = vec![0u8; RTP_HEADER_LEN + frame_size];
    {
        let mut rtp = MutableRtpPacket::new(&mut packet[..])
            .expect("FATAL: Too few bytes in packet buffer for RTP header.");
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_ssrc(random::<u32>());
        rtp.set_sequence(0u16.into());
        rtp.set_timestamp(0u32.into());
    }

    for payload in job.audio.chunks(frame_size) {
        if job.generation < generation.load(Ordering::Acquire) {
            trace!("Playback cancelled mid-stream.");
            return Ok(());
        }

        packet[RTP_HEADER_LEN..RTP_HEADER_LEN + payload.len()].copy_from_slice(payload);
        socket
            .send_to(&packet[..RTP_HEADER_LEN + payload.len()], job.peer)
            .await?;

        sleep(job.frame_duration).await;

        let mut rtp = MutableRtpPacket::new(&mut packet[..])
            .expect("FATAL: Too few bytes in packet buffer for RTP header.");
        rtp.set_sequence(rtp.get_sequence() + 1);
        rtp.set_timestamp(rtp.get_timestamp() + frame_size as u32);
    }

    Ok(())
}
