//! External codec invocation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use vidgate_core::{AppError, TranscodeProfile};

/// Codec seam for the orchestrator.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Source duration in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, AppError>;

    /// Produce one rendition according to the profile. Diagnostic output from
    /// the tool is captured into the error on failure.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TranscodeProfile,
    ) -> Result<(), AppError>;

    /// Extract a single frame at `offset_secs`, scaled to `width`.
    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
        width: u32,
    ) -> Result<(), AppError>;
}

/// Production transcoder shelling out to ffmpeg/ffprobe.
#[derive(Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }
}

/// Fit the source into the profile's exact frame: scale down preserving
/// aspect ratio, then pad to the target dimensions.
fn scale_pad_filter(profile: &TranscodeProfile) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = profile.width,
        h = profile.height
    )
}

fn transcode_args(input: &Path, output: &Path, profile: &TranscodeProfile) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        profile.preset.clone().unwrap_or_else(|| "fast".to_string()),
        "-vf".to_string(),
        scale_pad_filter(profile),
        "-b:v".to_string(),
        format!("{}k", profile.video_bitrate),
        "-maxrate".to_string(),
        format!("{}k", (profile.video_bitrate as f32 * 1.2) as u32),
        "-bufsize".to_string(),
        format!("{}k", profile.video_bitrate * 2),
    ];

    if let Some(frame_rate) = profile.frame_rate {
        args.extend_from_slice(&["-r".to_string(), frame_rate.to_string()]);
    }
    if let Some(keyframe_interval) = profile.keyframe_interval {
        args.extend_from_slice(&[
            "-g".to_string(),
            keyframe_interval.to_string(),
            "-keyint_min".to_string(),
            keyframe_interval.to_string(),
        ]);
    }
    if let Some(ref tune) = profile.tune {
        args.extend_from_slice(&["-tune".to_string(), tune.clone()]);
    }

    args.extend_from_slice(&[
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", profile.audio_bitrate),
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        "48000".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, input: &Path) -> Result<f64, AppError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Internal(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::Internal(format!("ffprobe returned no duration: {}", stdout)))
    }

    #[tracing::instrument(skip(self, input, output), fields(profile = %profile.name))]
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TranscodeProfile,
    ) -> Result<(), AppError> {
        let args = transcode_args(input, output, profile);
        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AppError::TranscodeTool {
                profile: profile.name.clone(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
        width: u32,
    ) -> Result<(), AppError> {
        let result = Command::new(&self.ffmpeg_path)
            .args(["-y", "-ss", &format!("{:.3}", offset_secs), "-i"])
            .arg(input)
            .args([
                "-frames:v",
                "1",
                "-vf",
                &format!("scale={}:-2", width),
                "-q:v",
                "3",
            ])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AppError::TranscodeTool {
                profile: "thumbnail".to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
