//! CLI command implementations.

use crate::colors;
use crate::exit_codes::ExitCode;
use crate::{DeviceOptions, RecordOptions};
use bezelrec::encoder::detect_codec;
use bezelrec::{ensure_ffmpeg, SessionController, SourceFrame, SourceHandle};
use bezelrec_types::{
    BackgroundStyle, CaptureConfig, CaptureMode, OutputFormat, Rgb, SessionEvent, SessionPhase,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Parse the --background value: 'transparent' or '#RRGGBB'.
fn parse_background(value: &str) -> Result<BackgroundStyle, String> {
    if value.eq_ignore_ascii_case("transparent") {
        return Ok(BackgroundStyle::Transparent);
    }
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid background '{}' (expected 'transparent' or #RRGGBB)",
            value
        ));
    }
    let r = u8::from_str_radix(&hex[0..2], 16).map_err(|e| e.to_string())?;
    let g = u8::from_str_radix(&hex[2..4], 16).map_err(|e| e.to_string())?;
    let b = u8::from_str_radix(&hex[4..6], 16).map_err(|e| e.to_string())?;
    Ok(BackgroundStyle::Solid(Rgb::new(r, g, b)))
}

/// Parse and dedupe the --format list.
fn parse_formats(values: &[String]) -> Result<Vec<OutputFormat>, String> {
    let mut formats = Vec::new();
    for value in values {
        let format = OutputFormat::parse(value)
            .ok_or_else(|| format!("unknown format '{}' (expected mp4 or webm)", value))?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

/// Load the content frame: the --input PNG when given, a generated test
/// pattern otherwise. The pattern renders at physical resolution so the
/// blit stays sharp.
fn load_content_frame(device: &DeviceOptions) -> Result<SourceFrame, String> {
    if let Some(path) = &device.input {
        let img = image::open(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?
            .to_rgba8();
        let (w, h) = img.dimensions();
        return SourceFrame::from_rgba(w, h, img.into_raw())
            .ok_or_else(|| format!("{} decoded to an empty image", path.display()));
    }

    let dpr = device.dpr.max(1.0);
    let w = ((device.width as f32 * dpr) as u32).max(2);
    let h = ((device.height as f32 * dpr) as u32).max(2);
    let mut data = Vec::with_capacity((w as usize) * (h as usize) * 4);
    for y in 0..h {
        for x in 0..w {
            let r = (x * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            data.extend_from_slice(&[r, g, 160, 255]);
        }
    }
    Ok(SourceFrame { width: w, height: h, data })
}

fn capture_config(device: &DeviceOptions, outputs: Vec<OutputFormat>, mode: CaptureMode) -> Result<CaptureConfig, String> {
    Ok(CaptureConfig {
        logical_width: device.width,
        logical_height: device.height,
        device_pixel_ratio: device.dpr,
        show_notch: !device.no_notch,
        show_frame: !device.no_frame,
        background: parse_background(&device.background)?,
        outputs,
        mode,
    })
}

/// Forward engine status lines to the terminal.
fn spawn_event_printer(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    json: bool,
    quiet: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if json || quiet {
                continue;
            }
            match event {
                SessionEvent::Status { message } => println!("{}", colors::info(&message)),
                SessionEvent::Error { message } => eprintln!("{}", colors::error(&message)),
                SessionEvent::ArtifactReady { filename, bytes } => {
                    println!("{}", colors::dim(&format!("{} ({} bytes)", filename, bytes)))
                }
                SessionEvent::Phase { .. } => {}
            }
        }
    })
}

async fn write_artifact(dir: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    Ok(path)
}

/// Record the framed content for a fixed duration (or until Ctrl-C).
pub async fn record(
    device: DeviceOptions,
    options: RecordOptions,
    json: bool,
    quiet: bool,
) -> ExitCode {
    let formats = match parse_formats(&options.format) {
        Ok(formats) => formats,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::InvalidArguments;
        }
    };
    let config = match capture_config(&device, formats.clone(), CaptureMode::Recording) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::InvalidArguments;
        }
    };

    match tokio::task::spawn_blocking(ensure_ffmpeg).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::FfmpegUnavailable;
        }
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::FfmpegUnavailable;
        }
    }

    let frame = match load_content_frame(&device) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::GeneralError;
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = spawn_event_printer(event_rx, json, quiet);
    let controller = SessionController::with_events(event_tx);

    let (frame_tx, source) = SourceHandle::stream();
    let feeder = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
            bezelrec::encoder::FRAME_INTERVAL_MS,
        ));
        loop {
            ticker.tick().await;
            if frame_tx.send(frame.clone()).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = controller.start(config, source).await {
        eprintln!("{}", colors::error(&e.to_string()));
        feeder.abort();
        return ExitCode::CaptureFailedToStart;
    }

    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_secs(options.duration)) => {}
        _ = tokio::signal::ctrl_c() => {
            if !quiet && !json {
                println!("{}", colors::dim("interrupted, finalizing..."));
            }
        }
    }

    let outcome = controller.stop().await;
    feeder.abort();
    printer.abort();

    let mut written = Vec::new();
    for artifact in &outcome.artifacts {
        match write_artifact(&options.output_dir, &artifact.filename, &artifact.data).await {
            Ok(path) => {
                if !quiet && !json {
                    println!(
                        "{}",
                        colors::success(&format!(
                            "wrote {} ({} bytes)",
                            path.display(),
                            artifact.data.len()
                        ))
                    );
                }
                written.push(path);
            }
            Err(e) => {
                eprintln!("{}", colors::error(&e));
                return ExitCode::GeneralError;
            }
        }
    }

    if json {
        let report: Vec<_> = outcome
            .artifacts
            .iter()
            .zip(&written)
            .map(|(artifact, path)| {
                serde_json::json!({
                    "filename": artifact.filename,
                    "bytes": artifact.data.len(),
                    "path": path,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    }

    if outcome.errored || (!formats.is_empty() && outcome.artifacts.is_empty()) {
        for error in &outcome.errors {
            eprintln!("{}", colors::error(&error.to_string()));
        }
        return ExitCode::CaptureFailed;
    }
    ExitCode::Success
}

/// Compose one framed screenshot and write it to disk.
pub async fn screenshot(
    device: DeviceOptions,
    output: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> ExitCode {
    let config = match capture_config(&device, Vec::new(), CaptureMode::Screenshot) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::InvalidArguments;
        }
    };
    let frame = match load_content_frame(&device) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::GeneralError;
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = spawn_event_printer(event_rx, json, quiet);
    let controller = SessionController::with_events(event_tx);

    if let Err(e) = controller
        .start(config, SourceHandle::Still(frame))
        .await
    {
        eprintln!("{}", colors::error(&e.to_string()));
        return ExitCode::CaptureFailedToStart;
    }

    // The screenshot session completes on its own after the settle delay.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
    while controller.phase().await != SessionPhase::Idle {
        if tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let outcome = controller.stop().await;
    printer.abort();

    let Some(artifact) = outcome.artifacts.first() else {
        for error in &outcome.errors {
            eprintln!("{}", colors::error(&error.to_string()));
        }
        return ExitCode::CaptureFailed;
    };

    let path = match &output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    eprintln!(
                        "{}",
                        colors::error(&format!("cannot create {}: {}", parent.display(), e))
                    );
                    return ExitCode::GeneralError;
                }
            }
            if let Err(e) = tokio::fs::write(path, &artifact.data).await {
                eprintln!(
                    "{}",
                    colors::error(&format!("cannot write {}: {}", path.display(), e))
                );
                return ExitCode::GeneralError;
            }
            path.clone()
        }
        None => match write_artifact(Path::new("."), &artifact.filename, &artifact.data).await {
            Ok(path) => path,
            Err(e) => {
                eprintln!("{}", colors::error(&e));
                return ExitCode::GeneralError;
            }
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "filename": artifact.filename,
                "bytes": artifact.data.len(),
                "path": path,
            }))
            .unwrap_or_default()
        );
    } else if !quiet {
        println!(
            "{}",
            colors::success(&format!(
                "wrote {} ({} bytes)",
                path.display(),
                artifact.data.len()
            ))
        );
    }
    ExitCode::Success
}

/// Report the codec the runtime FFmpeg build would use per output format.
pub async fn codecs(json: bool, quiet: bool) -> ExitCode {
    let detected = tokio::task::spawn_blocking(|| {
        [OutputFormat::Mp4, OutputFormat::WebmAlpha]
            .into_iter()
            .map(|format| (format, detect_codec(format).ok()))
            .collect::<Vec<_>>()
    })
    .await;

    let detected = match detected {
        Ok(detected) => detected,
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::GeneralError;
        }
    };

    if json {
        let report: serde_json::Map<String, serde_json::Value> = detected
            .iter()
            .map(|(format, codec)| {
                (
                    format.extension().to_string(),
                    codec.map(Into::into).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return ExitCode::Success;
    }

    let mut any = false;
    for (format, codec) in &detected {
        match codec {
            Some(codec) => {
                any = true;
                if !quiet {
                    println!("{:<12} {}", format.display_name(), colors::success(codec));
                }
            }
            None => {
                if !quiet {
                    println!("{:<12} {}", format.display_name(), colors::dim("unavailable"));
                }
            }
        }
    }
    if any {
        ExitCode::Success
    } else {
        eprintln!("{}", colors::error("no usable video encoder found"));
        ExitCode::FfmpegUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_background_variants() {
        assert_eq!(
            parse_background("transparent").unwrap(),
            BackgroundStyle::Transparent
        );
        assert_eq!(
            parse_background("#1A2B3C").unwrap(),
            BackgroundStyle::Solid(Rgb::new(0x1A, 0x2B, 0x3C))
        );
        assert_eq!(
            parse_background("ffffff").unwrap(),
            BackgroundStyle::Solid(Rgb::new(255, 255, 255))
        );
        assert!(parse_background("#12345").is_err());
        assert!(parse_background("blue").is_err());
    }

    #[test]
    fn test_parse_formats_dedupes() {
        let formats =
            parse_formats(&["mp4".into(), "webm".into(), "MP4".into()]).unwrap();
        assert_eq!(formats, vec![OutputFormat::Mp4, OutputFormat::WebmAlpha]);
        assert!(parse_formats(&["gif".into()]).is_err());
    }

    #[test]
    fn test_test_pattern_matches_physical_size() {
        let device = DeviceOptions {
            width: 100,
            height: 50,
            dpr: 2.0,
            no_notch: false,
            no_frame: false,
            background: "transparent".into(),
            input: None,
        };
        let frame = load_content_frame(&device).unwrap();
        assert_eq!(frame.width, 200);
        assert_eq!(frame.height, 100);
        assert!(frame.is_readable());
    }
}
