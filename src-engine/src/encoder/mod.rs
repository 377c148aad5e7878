//! Video encoding via FFmpeg (ffmpeg-sidecar).
//!
//! Each requested output format gets its own independent encoder instance
//! fed from the shared composited surface. Instances stream their container
//! to stdout (fragmented MP4 / WebM) and accumulate the ordered chunks in
//! memory; finalization concatenates them into one binary artifact.

use crate::error::EngineError;
use bezelrec_types::{Artifact, OutputFormat};
use chrono::{DateTime, Utc};
use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Target frame rate for output video.
pub const TARGET_FPS: u32 = 30;
/// Frame interval in milliseconds.
pub const FRAME_INTERVAL_MS: u64 = 1000 / TARGET_FPS as u64;

/// Ordered codec preference per output format. The first candidate the
/// runtime FFmpeg build supports wins.
const MP4_CANDIDATES: &[&str] = &[
    "libx264",
    "libopenh264",
    "h264_videotoolbox",
    "h264_nvenc",
    "h264_vaapi",
    "h264_amf",
    "h264_qsv",
];
const WEBM_ALPHA_CANDIDATES: &[&str] = &["libvpx-vp9", "libvpx"];

/// Resolve the path to the FFmpeg binary: the sidecar location next to the
/// executable when present, otherwise the system binary from PATH.
fn resolve_ffmpeg_path() -> PathBuf {
    let sidecar = ffmpeg_sidecar::paths::ffmpeg_path();
    if sidecar.exists() {
        sidecar
    } else {
        PathBuf::from("ffmpeg")
    }
}

fn new_ffmpeg_command() -> FfmpegCommand {
    FfmpegCommand::new_with_path(resolve_ffmpeg_path())
}

/// Verify FFmpeg is runnable, attempting an auto-download as a fallback.
/// Call once at startup.
pub fn ensure_ffmpeg() -> Result<(), String> {
    let ffmpeg = resolve_ffmpeg_path();
    match Command::new(&ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!(
            "FFmpeg binary at {} exited with status: {}",
            ffmpeg.display(),
            status
        )),
        Err(_) => ffmpeg_sidecar::download::auto_download()
            .map_err(|e| format!("FFmpeg not found and auto-download failed: {}", e)),
    }
}

/// Whether an FFmpeg binary is currently runnable (no download attempt).
pub fn ffmpeg_available() -> bool {
    Command::new(resolve_ffmpeg_path())
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Raw `ffmpeg -encoders` listing, empty on failure.
fn list_encoders() -> String {
    match Command::new(resolve_ffmpeg_path())
        .args(["-encoders", "-hide_banner"])
        .output()
    {
        Ok(o) => String::from_utf8_lossy(&o.stdout).to_string(),
        Err(e) => {
            warn!("failed to run ffmpeg -encoders: {}", e);
            String::new()
        }
    }
}

/// Pick the first supported candidate for `format` out of `encoders_output`
/// (the `ffmpeg -encoders` listing).
pub fn select_codec(format: OutputFormat, encoders_output: &str) -> Result<&'static str, EngineError> {
    let candidates = match format {
        OutputFormat::Mp4 => MP4_CANDIDATES,
        OutputFormat::WebmAlpha => WEBM_ALPHA_CANDIDATES,
    };
    for candidate in candidates {
        let found = encoders_output
            .lines()
            .any(|line| line.split_whitespace().any(|word| word == *candidate));
        if found {
            return Ok(candidate);
        }
    }
    Err(EngineError::UnsupportedCodec(format))
}

/// Probe the runtime FFmpeg build for a codec for `format`.
pub fn detect_codec(format: OutputFormat) -> Result<&'static str, EngineError> {
    let codec = select_codec(format, &list_encoders())?;
    debug!("selected codec {} for {}", codec, format.display_name());
    Ok(codec)
}

/// Output-side FFmpeg arguments for one encoder instance.
fn codec_args(format: OutputFormat, codec: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-c:v".into(), codec.into()];
    match format {
        OutputFormat::Mp4 => {
            match codec {
                "libx264" => {
                    args.extend(["-preset".into(), "ultrafast".into(), "-crf".into(), "23".into()]);
                }
                "libopenh264" => args.extend(["-b:v".into(), "2M".into()]),
                "h264_vaapi" => args.extend(["-qp".into(), "23".into()]),
                "h264_nvenc" | "h264_amf" => {
                    args.extend([
                        "-preset".into(),
                        "p1".into(),
                        "-rc".into(),
                        "vbr".into(),
                        "-cq".into(),
                        "23".into(),
                    ]);
                }
                _ => {}
            }
            args.extend([
                "-pix_fmt".into(),
                "yuv420p".into(),
                // Fragmented so the container can stream to a pipe.
                "-movflags".into(),
                "frag_keyframe+empty_moov".into(),
                "-f".into(),
                "mp4".into(),
            ]);
        }
        OutputFormat::WebmAlpha => {
            args.extend([
                "-pix_fmt".into(),
                "yuva420p".into(),
                // Alt-ref frames discard the alpha plane in libvpx.
                "-auto-alt-ref".into(),
                "0".into(),
                "-b:v".into(),
                "2M".into(),
                "-f".into(),
                "webm".into(),
            ]);
        }
    }
    args
}

/// Lifecycle state of one encoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Recording,
    Stopping,
    Stopped,
    Errored,
}

/// One FFmpeg-backed encoder bound to the composited surface dimensions.
pub struct EncoderInstance {
    format: OutputFormat,
    codec: &'static str,
    state: EncoderState,
    width: u32,
    height: u32,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    stdout_reader: Option<std::thread::JoinHandle<()>>,
    last_stderr: Arc<Mutex<Option<String>>>,
}

impl EncoderInstance {
    /// Select a codec and spawn the FFmpeg process for `format`.
    /// Dimensions are rounded down to even numbers for codec compatibility.
    pub fn start(format: OutputFormat, width: u32, height: u32) -> Result<Self, EngineError> {
        let codec = detect_codec(format)?;

        let width = width & !1;
        let height = height & !1;
        if width == 0 || height == 0 {
            return Err(EngineError::EncoderFailed(
                format,
                format!("invalid dimensions: {}x{}", width, height),
            ));
        }

        let mut command = new_ffmpeg_command();
        command
            .args(["-f", "rawvideo"])
            .args(["-pix_fmt", "rgba"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &TARGET_FPS.to_string()])
            .args(["-i", "-"]);
        for arg in codec_args(format, codec) {
            command.arg(arg);
        }
        command.arg("pipe:1");

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::piped());
        inner.stdout(Stdio::piped());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| EngineError::EncoderFailed(format, format!("failed to start FFmpeg: {}", e)))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            EngineError::EncoderFailed(format, "failed to get FFmpeg stdin".to_string())
        })?;

        let chunks: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let stdout_reader = child.stdout.take().map(|mut stdout| {
            let chunks = chunks.clone();
            std::thread::spawn(move || {
                let mut buf = [0u8; 64 * 1024];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut chunks = chunks.lock().expect("chunk lock");
                            chunks.push(buf[..n].to_vec());
                        }
                    }
                }
            })
        });

        let last_stderr: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        if let Some(stderr) = child.stderr.take() {
            let last_stderr = last_stderr.clone();
            let ext = format.extension();
            std::thread::spawn(move || {
                use std::io::{BufRead, BufReader};
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("[ffmpeg:{}] {}", ext, line);
                    *last_stderr.lock().expect("stderr lock") = Some(line);
                }
            });
        }

        debug!(
            "started {} encoder ({}) at {}x{}",
            format.display_name(),
            codec,
            width,
            height
        );

        Ok(Self {
            format,
            codec,
            state: EncoderState::Recording,
            width,
            height,
            stdin: Some(stdin),
            child: Some(child),
            chunks,
            stdout_reader,
            last_stderr,
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn codec(&self) -> &'static str {
        self.codec
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Feed one straight-RGBA surface snapshot. The buffer may be larger
    /// than the encoder dimensions only by the even-rounding margin; rows
    /// are cropped in that case, short buffers skip the frame.
    pub fn write_frame(&mut self, rgba: &[u8], surface_width: u32, surface_height: u32) -> Result<(), EngineError> {
        if self.state != EncoderState::Recording {
            return Ok(());
        }
        if surface_width < self.width || surface_height < self.height {
            warn!(
                "skipping frame: surface {}x{} smaller than encoder {}x{}",
                surface_width, surface_height, self.width, self.height
            );
            return Ok(());
        }

        let result = if let Some(ref mut stdin) = self.stdin {
            if surface_width == self.width && surface_height == self.height {
                stdin.write_all(rgba)
            } else {
                let src_row = (surface_width * 4) as usize;
                let dst_row = (self.width * 4) as usize;
                let mut res = Ok(());
                for y in 0..self.height as usize {
                    let start = y * src_row;
                    let end = start + dst_row;
                    if end > rgba.len() {
                        break;
                    }
                    if let Err(e) = stdin.write_all(&rgba[start..end]) {
                        res = Err(e);
                        break;
                    }
                }
                res
            }
        } else {
            return Ok(());
        };

        result.map_err(|e| {
            self.state = EncoderState::Errored;
            EngineError::EncoderFailed(self.format, format!("failed to write frame: {}", e))
        })
    }

    /// Finalize: flush buffered chunks, wait for the process, concatenate the
    /// accumulated chunks into one artifact.
    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Result<Artifact, EngineError> {
        self.state = EncoderState::Stopping;

        // Closing stdin signals end of input to FFmpeg.
        drop(self.stdin.take());

        if let Some(reader) = self.stdout_reader.take() {
            let _ = reader.join();
        }

        if let Some(mut child) = self.child.take() {
            let status = child.wait().map_err(|e| {
                self.state = EncoderState::Errored;
                EngineError::EncoderFailed(self.format, format!("FFmpeg process error: {}", e))
            })?;
            if !status.success() {
                self.state = EncoderState::Errored;
                let detail = self
                    .last_stderr
                    .lock()
                    .ok()
                    .and_then(|l| l.clone())
                    .unwrap_or_else(|| format!("exit code {:?}", status.code()));
                return Err(EngineError::EncoderFailed(self.format, detail));
            }
        }

        let chunks = std::mem::take(&mut *self.chunks.lock().expect("chunk lock"));
        let artifact = match assemble_artifact(self.format, chunks, finished_at) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.state = EncoderState::Errored;
                return Err(e);
            }
        };

        self.state = EncoderState::Stopped;
        debug!(
            "finalized {} recording: {} bytes",
            self.format.display_name(),
            artifact.data.len()
        );
        Ok(artifact)
    }
}

/// Concatenate the ordered stdout chunks into the final artifact. Zero
/// accumulated bytes means the encoder produced nothing worth delivering.
fn assemble_artifact(
    format: OutputFormat,
    chunks: Vec<Vec<u8>>,
    finished_at: DateTime<Utc>,
) -> Result<Artifact, EngineError> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    if total == 0 {
        return Err(EngineError::NoDataRecorded(format));
    }

    let mut data = Vec::with_capacity(total);
    for chunk in chunks {
        data.extend_from_slice(&chunk);
    }
    Ok(Artifact {
        format: Some(format),
        filename: recording_filename(format, finished_at),
        data,
    })
}

impl Drop for EncoderInstance {
    fn drop(&mut self) {
        // Discarded without finish(): reap the process instead of leaking it.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// ISO-8601 timestamp with colons replaced by hyphens, truncated to seconds.
fn filename_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Suggested download filename for a finished recording.
pub fn recording_filename(format: OutputFormat, now: DateTime<Utc>) -> String {
    format!(
        "mobile-recording-{}.{}",
        filename_timestamp(now),
        format.extension()
    )
}

/// Suggested download filename for a screenshot.
pub fn screenshot_filename(now: DateTime<Utc>) -> String {
    format!("mobile-screenshot-{}.png", filename_timestamp(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FAKE_ENCODERS: &str = "\
 Encoders:
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libvpx               libvpx VP8
 V....D libvpx-vp9           libvpx VP9
 A....D aac                  AAC (Advanced Audio Coding)";

    #[test]
    fn test_select_codec_prefers_first_candidate() {
        assert_eq!(select_codec(OutputFormat::Mp4, FAKE_ENCODERS).unwrap(), "libx264");
        assert_eq!(
            select_codec(OutputFormat::WebmAlpha, FAKE_ENCODERS).unwrap(),
            "libvpx-vp9"
        );
    }

    #[test]
    fn test_select_codec_falls_back() {
        let only_fallbacks = " V....D libopenh264  foo\n V....D libvpx  bar";
        assert_eq!(
            select_codec(OutputFormat::Mp4, only_fallbacks).unwrap(),
            "libopenh264"
        );
        assert_eq!(
            select_codec(OutputFormat::WebmAlpha, only_fallbacks).unwrap(),
            "libvpx"
        );
    }

    #[test]
    fn test_select_codec_unsupported() {
        assert_eq!(
            select_codec(OutputFormat::WebmAlpha, " V....D mjpeg  jpeg"),
            Err(EngineError::UnsupportedCodec(OutputFormat::WebmAlpha))
        );
        assert_eq!(
            select_codec(OutputFormat::Mp4, ""),
            Err(EngineError::UnsupportedCodec(OutputFormat::Mp4))
        );
    }

    #[test]
    fn test_codec_args_mp4_streams_fragmented() {
        let args = codec_args(OutputFormat::Mp4, "libx264");
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"frag_keyframe+empty_moov".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
    }

    #[test]
    fn test_codec_args_webm_preserves_alpha() {
        let args = codec_args(OutputFormat::WebmAlpha, "libvpx-vp9");
        assert!(args.contains(&"yuva420p".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-auto-alt-ref" && w[1] == "0"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "webm"));
    }

    #[test]
    fn test_assemble_artifact_zero_bytes_is_no_data() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 27, 13, 5, 9).unwrap();
        assert!(matches!(
            assemble_artifact(OutputFormat::Mp4, vec![], ts),
            Err(EngineError::NoDataRecorded(OutputFormat::Mp4))
        ));
        // Chunks that exist but carry no bytes count as no data too.
        assert!(matches!(
            assemble_artifact(OutputFormat::WebmAlpha, vec![vec![], vec![]], ts),
            Err(EngineError::NoDataRecorded(OutputFormat::WebmAlpha))
        ));
    }

    #[test]
    fn test_assemble_artifact_concatenates_in_order() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 27, 13, 5, 9).unwrap();
        let artifact = assemble_artifact(
            OutputFormat::WebmAlpha,
            vec![vec![1, 2], vec![], vec![3, 4, 5]],
            ts,
        )
        .unwrap();
        assert_eq!(artifact.data, vec![1, 2, 3, 4, 5]);
        assert_eq!(artifact.format, Some(OutputFormat::WebmAlpha));
        assert!(artifact.filename.ends_with(".webm"));
    }

    #[test]
    fn test_encoder_instance_lifecycle() {
        if !ffmpeg_available() {
            return;
        }
        let mut encoder = EncoderInstance::start(OutputFormat::Mp4, 64, 64).unwrap();
        assert_eq!(encoder.state(), EncoderState::Recording);
        assert!(MP4_CANDIDATES.contains(&encoder.codec()));

        let frame = vec![127u8; 64 * 64 * 4];
        for _ in 0..10 {
            encoder.write_frame(&frame, 64, 64).unwrap();
        }
        let artifact = encoder.finish(Utc::now()).unwrap();
        assert_eq!(artifact.format, Some(OutputFormat::Mp4));
        assert!(!artifact.data.is_empty());
    }

    #[test]
    fn test_filename_patterns() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 27, 13, 5, 9).unwrap();
        assert_eq!(
            recording_filename(OutputFormat::Mp4, ts),
            "mobile-recording-2026-08-27T13-05-09.mp4"
        );
        assert_eq!(
            recording_filename(OutputFormat::WebmAlpha, ts),
            "mobile-recording-2026-08-27T13-05-09.webm"
        );
        assert_eq!(
            screenshot_filename(ts),
            "mobile-screenshot-2026-08-27T13-05-09.png"
        );
        assert!(!filename_timestamp(ts).contains(':'));
    }
}
