//! **Speakers**: the [`Speaker`] implementations handed to the alert fan-out.
//!
//! `PlaybackSpeaker` synthesizes on the caller's thread and plays on a dedicated audio
//! thread that owns the non-`Send` rodio output stream. `speak` returns once the line has
//! finished playing, so queued lines never overlap.

use std::io::Cursor;
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use aegis_core::ports::Speaker;
use aegis_core::AegisResult;
use rodio::{OutputStream, Sink, Source};
use tracing::{debug, info};

use crate::error::{VoiceError, VoiceResult};
use crate::tts::TtsBackend;

struct PlayJob {
    audio: Vec<u8>,
    done: Sender<VoiceResult<()>>,
}

pub struct PlaybackSpeaker {
    tts: Box<dyn TtsBackend>,
    tx: Mutex<Sender<PlayJob>>,
}

impl PlaybackSpeaker {
    /// Start the audio thread. Fails when no output device can be opened.
    pub fn new(tts: Box<dyn TtsBackend>) -> VoiceResult<Self> {
        let (tx, rx) = mpsc::channel::<PlayJob>();
        let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<()>>();

        thread::Builder::new()
            .name("aegis-audio-out".to_string())
            .spawn(move || {
                let (_stream, sink) = match open_output() {
                    Ok(out) => {
                        let _ = ready_tx.send(Ok(()));
                        out
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while let Ok(job) = rx.recv() {
                    let result = play(&sink, job.audio);
                    let _ = job.done.send(result);
                }
                debug!(target: "aegis::voice", "audio output thread stopped");
            })?;

        ready_rx
            .recv()
            .map_err(|_| VoiceError::Playback("audio thread exited during startup".to_string()))??;
        info!(target: "aegis::voice", "speech playback ready");
        Ok(Self {
            tts,
            tx: Mutex::new(tx),
        })
    }

    fn say(&self, text: &str) -> VoiceResult<()> {
        let audio = self.tts.synthesize(text)?;
        if audio.is_empty() {
            return Ok(());
        }
        let (done_tx, done_rx) = mpsc::channel();
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(PlayJob {
                audio,
                done: done_tx,
            })
            .map_err(|_| VoiceError::Playback("audio thread is gone".to_string()))?;
        done_rx
            .recv()
            .map_err(|_| VoiceError::Playback("audio thread dropped the job".to_string()))?
    }
}

impl Speaker for PlaybackSpeaker {
    fn speak(&self, text: &str) -> AegisResult<()> {
        Ok(self.say(text)?)
    }
}

fn open_output() -> VoiceResult<(OutputStream, Sink)> {
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| VoiceError::Playback(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
    Ok((stream, sink))
}

fn play(sink: &Sink, audio: Vec<u8>) -> VoiceResult<()> {
    let source = rodio::Decoder::new(Cursor::new(audio))
        .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
    sink.append(source.convert_samples::<f32>());
    sink.sleep_until_end();
    Ok(())
}

/// Speaker used when there is no synthesis backend or output device. The fan-out already
/// logs every line, so this only records that nothing was vocalized.
#[derive(Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, text: &str) -> AegisResult<()> {
        debug!(target: "aegis::voice", chars = text.len(), "speech not vocalized (no output)");
        Ok(())
    }
}
