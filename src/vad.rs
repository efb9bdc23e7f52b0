//! Voice-activity detection over inbound µ-law frames.
//!
//! [`VoiceDetector`] consumes one frame at a time and buffers everything
//! it sees. Runs of speech and silence are counted per frame: a long
//! enough run of speech means the caller is talking (and should interrupt
//! any bot playback), a long enough run of silence closes the current
//! utterance, which is emitted with its trailing silence trimmed off.

use crate::{
    audio::is_silent,
    constants::{
        SILENCE_FRAMES_THRESHOLD,
        SILENCE_RMS_THRESHOLD,
        SPEECH_FRAMES_THRESHOLD,
        ULAW_FRAME_SIZE,
    },
};

/// Outcome of feeding one frame to the detector.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum VadEvent {
    /// The caller has been speaking for long enough that any ongoing
    /// playback should be interrupted. Fires exactly once per run of
    /// speech, on the threshold frame.
    BargeIn,
    /// A complete utterance, with trailing silence-classified frames
    /// removed.
    Utterance(Vec<u8>),
}

/// Frame-by-frame speech/silence classifier and utterance buffer.
///
/// The buffer is never capped; callers that want a maximum utterance
/// duration must impose it externally.
#[derive(Clone, Debug)]
pub struct VoiceDetector {
    rms_threshold: f32,
    speech_threshold: usize,
    silence_threshold: usize,
    speech_frames: usize,
    silence_frames: usize,
    buffer: Vec<u8>,
}

impl Default for VoiceDetector {
    fn default() -> Self {
        Self::new(
            SILENCE_RMS_THRESHOLD,
            SPEECH_FRAMES_THRESHOLD,
            SILENCE_FRAMES_THRESHOLD,
        )
    }
}

impl VoiceDetector {
    /// Creates a detector with explicit thresholds.
    ///
    /// `rms_threshold` classifies individual frames, `speech_threshold`
    /// counts frames until barge-in, `silence_threshold` counts frames
    /// until an utterance is closed.
    #[must_use]
    pub fn new(rms_threshold: f32, speech_threshold: usize, silence_threshold: usize) -> Self {
        Self {
            rms_threshold,
            speech_threshold,
            silence_threshold,
            speech_frames: 0,
            silence_frames: 0,
            buffer: Vec::new(),
        }
    }

    /// Feeds one µ-law frame into the detector.
    pub fn push(&mut self, frame: &[u8]) -> Option<VadEvent> {
        self.buffer.extend_from_slice(frame);

        if is_silent(frame, self.rms_threshold) {
            self.silence_frames += 1;
            self.speech_frames = 0;
        } else {
            self.speech_frames += 1;
            self.silence_frames = 0;

            // Edge-triggered: exactly at the threshold, not beyond it.
            if self.speech_frames == self.speech_threshold {
                return Some(VadEvent::BargeIn);
            }
            return None;
        }

        if self.silence_frames >= self.silence_threshold {
            let trim = self.silence_frames * ULAW_FRAME_SIZE;
            let keep = self.buffer.len().saturating_sub(trim);

            // No fractional frames: a trim below one frame empties the
            // buffer outright.
            if keep < ULAW_FRAME_SIZE {
                self.buffer.clear();
            } else {
                self.buffer.truncate(keep);
            }

            self.speech_frames = 0;
            self.silence_frames = 0;

            if !self.buffer.is_empty() {
                return Some(VadEvent::Utterance(std::mem::take(&mut self.buffer)));
            }
        }

        None
    }

    /// Number of bytes currently buffered for the in-progress utterance.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SILENT_ULAW;

    const SPEECH: [u8; ULAW_FRAME_SIZE] = [0x00; ULAW_FRAME_SIZE];
    const SILENCE: [u8; ULAW_FRAME_SIZE] = [SILENT_ULAW; ULAW_FRAME_SIZE];

    fn detector() -> VoiceDetector {
        VoiceDetector::default()
    }

    #[test]
    fn utterance_is_emitted_with_silence_trimmed() {
        let mut vad = detector();
        let mut events = Vec::new();

        for _ in 0..20 {
            events.extend(vad.push(&SPEECH));
        }
        for _ in 0..SILENCE_FRAMES_THRESHOLD {
            events.extend(vad.push(&SILENCE));
        }

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], VadEvent::BargeIn);
        match &events[1] {
            VadEvent::Utterance(bytes) => {
                assert_eq!(bytes.len(), 20 * ULAW_FRAME_SIZE);
                assert!(bytes.iter().all(|&b| b == 0x00));
            },
            other => panic!("expected utterance, got {:?}", other),
        }
        assert_eq!(vad.buffered(), 0);
    }

    #[test]
    fn pure_silence_never_emits() {
        let mut vad = detector();

        for _ in 0..5 * SILENCE_FRAMES_THRESHOLD {
            assert_eq!(vad.push(&SILENCE), None);
        }
        assert_eq!(vad.buffered(), 0);
    }

    #[test]
    fn barge_in_fires_once_per_speech_run() {
        let mut vad = detector();
        let mut barge_ins = 0;

        for _ in 0..3 * SPEECH_FRAMES_THRESHOLD {
            if vad.push(&SPEECH) == Some(VadEvent::BargeIn) {
                barge_ins += 1;
            }
        }
        assert_eq!(barge_ins, 1);

        // A new run of speech after an emitted utterance fires again.
        for _ in 0..SILENCE_FRAMES_THRESHOLD {
            vad.push(&SILENCE);
        }
        for _ in 0..SPEECH_FRAMES_THRESHOLD {
            if vad.push(&SPEECH) == Some(VadEvent::BargeIn) {
                barge_ins += 1;
            }
        }
        assert_eq!(barge_ins, 2);
    }

    #[test]
    fn short_speech_interrupted_by_silence_does_not_barge_in() {
        let mut vad = detector();

        for _ in 0..SPEECH_FRAMES_THRESHOLD - 1 {
            assert_eq!(vad.push(&SPEECH), None);
        }
        assert_eq!(vad.push(&SILENCE), None);
        // The silence reset the speech count, so the threshold is not hit.
        assert_eq!(vad.push(&SPEECH), None);
    }

    #[test]
    fn fractional_leftovers_are_dropped_not_emitted() {
        let mut vad = detector();

        // Half-sized frames: the whole-frame trim overshoots what is
        // actually buffered, so nothing survives.
        let speech = [0x00; ULAW_FRAME_SIZE / 2];
        let silence = [SILENT_ULAW; ULAW_FRAME_SIZE / 2];

        for _ in 0..SPEECH_FRAMES_THRESHOLD - 1 {
            assert_eq!(vad.push(&speech), None);
        }
        for _ in 0..SILENCE_FRAMES_THRESHOLD {
            assert_eq!(vad.push(&silence), None);
        }
        assert_eq!(vad.buffered(), 0);
    }

    #[test]
    fn speech_resumed_mid_capture_extends_the_utterance() {
        let mut vad = detector();

        for _ in 0..5 {
            vad.push(&SPEECH);
        }
        // Not enough silence to close the utterance.
        for _ in 0..SILENCE_FRAMES_THRESHOLD - 1 {
            vad.push(&SILENCE);
        }
        for _ in 0..5 {
            vad.push(&SPEECH);
        }

        let mut utterance = None;
        for _ in 0..SILENCE_FRAMES_THRESHOLD {
            if let Some(VadEvent::Utterance(bytes)) = vad.push(&SILENCE) {
                utterance = Some(bytes);
            }
        }

        // Interior silence survives, only the trailing run is trimmed.
        let bytes = utterance.expect("utterance should have been emitted");
        assert_eq!(
            bytes.len(),
            (5 + (SILENCE_FRAMES_THRESHOLD - 1) + 5) * ULAW_FRAME_SIZE
        );
    }
}
