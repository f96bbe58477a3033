//! YouTube Download Tool
//!
//! Runs `yt-dlp` in the workspace root and names the result after the
//! current local time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::{parse_input, require, run_program};
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

const RESOLUTIONS: [&str; 3] = ["480", "720", "1080"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MediaFormat {
    #[default]
    Video,
    Audio,
}

impl MediaFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

fn default_resolution() -> String {
    "720".into()
}

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    url: String,
    #[serde(default = "default_resolution")]
    resolution: String,
    #[serde(default)]
    format: MediaFormat,
}

/// `yt-dlp` arguments. Options come first and `--` keeps the URL from being
/// read as one.
fn yt_dlp_args(url: &str, resolution: &str, format: MediaFormat, output: &str) -> Vec<String> {
    let mut args: Vec<String> = match format {
        MediaFormat::Audio => ["-f", "bestaudio", "--extract-audio", "--audio-format", "mp3"]
            .map(String::from)
            .into(),
        MediaFormat::Video => {
            let height = format!("height<={resolution}");
            vec![
                "-f".into(),
                format!("bestvideo[{height}][ext=mp4]+bestaudio[ext=m4a]/best[{height}][ext=mp4]"),
                "--merge-output-format".into(),
                "mp4".into(),
            ]
        }
    };
    args.extend(["-o".into(), output.into(), "--".into(), url.into()]);
    args
}

/// Downloads a YouTube video as mp4, or its audio as mp3
pub struct DownloadFromYoutubeTool {
    workspace: Arc<Workspace>,
}

impl DownloadFromYoutubeTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: Args = parse_input(input)?;
        let url = require(&args.url, "No YouTube URL provided")?;
        let resolution = args.resolution.trim();
        if !RESOLUTIONS.contains(&resolution) {
            return Err(ToolError::InvalidInput(format!(
                "Unsupported resolution '{resolution}', expected one of 480, 720, 1080"
            )));
        }

        let output = format!(
            "{}.{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            args.format.extension()
        );
        let argv = yt_dlp_args(url, resolution, args.format, &output);

        let result = run_program("yt-dlp", argv, self.workspace.root()).await?;
        if !result.status.success() {
            return Err(ToolError::ProcessFailed {
                program: "yt-dlp",
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        tracing::info!(url, file = %output, format = args.format.label(), "Downloaded");
        Ok(format!(
            "Successfully downloaded {} from {url} to {}",
            args.format.label(),
            self.workspace.root().join(&output).display()
        ))
    }
}

#[async_trait]
impl Tool for DownloadFromYoutubeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "download_from_youtube".into(),
            description: "Download video or audio from YouTube. Can specify resolution for videos or download just the audio as mp3. Files are saved to the Capri data directory with timestamp filenames.".into(),
            parameters: vec![
                ParameterSchema::string("url", "The YouTube video URL to download").required(),
                ParameterSchema::string("resolution", "Video resolution: '480', '720', or '1080'. Default is '720'")
                    .with_enum(RESOLUTIONS),
                ParameterSchema::string(
                    "format",
                    "Output format: 'video' for mp4 or 'audio' for mp3. Default is 'video'",
                )
                .with_enum(["video", "audio"]),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yt_dlp_args() {
        assert_eq!(
            yt_dlp_args("https://youtu.be/x", "480", MediaFormat::Video, "20250101_120000.mp4"),
            [
                "-f",
                "bestvideo[height<=480][ext=mp4]+bestaudio[ext=m4a]/best[height<=480][ext=mp4]",
                "--merge-output-format",
                "mp4",
                "-o",
                "20250101_120000.mp4",
                "--",
                "https://youtu.be/x",
            ]
        );
        assert_eq!(
            yt_dlp_args("--exec=rm", "720", MediaFormat::Audio, "a.mp3"),
            [
                "-f",
                "bestaudio",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "-o",
                "a.mp3",
                "--",
                "--exec=rm"
            ]
        );
    }

    #[tokio::test]
    async fn test_input_checked_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DownloadFromYoutubeTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool.execute(br#"{"url":"  "}"#).await.unwrap_err();
        assert!(err.to_string().contains("No YouTube URL provided"));

        let err = tool
            .execute(br#"{"url":"https://youtu.be/x","resolution":"4k"}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported resolution '4k'"));

        let err = tool
            .execute(br#"{"url":"https://youtu.be/x","format":"gif"}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }
}
