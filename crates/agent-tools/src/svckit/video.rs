//! Video Tools
//!
//! Thin wrappers around `ffmpeg` for trimming, rescaling and cutting
//! segments out of a video.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use super::{parse_input, require, run_program};
use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

async fn ffmpeg(args: Vec<OsString>, workspace: &Workspace) -> Result<()> {
    let output = run_program("ffmpeg", args, workspace.root()).await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ToolError::ProcessFailed {
            program: "ffmpeg",
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

async fn require_file(full: &Path, shown: &str) -> Result<()> {
    if tokio::fs::metadata(full).await.is_ok_and(|m| m.is_file()) {
        Ok(())
    } else {
        Err(ToolError::not_found("Input file", shown))
    }
}

/// Everything before the final extension, like `clip` for `clip.mp4`
fn strip_extension(text: &str) -> &str {
    match text.rfind('.') {
        Some(i) if i > 0 => &text[..i],
        _ => text,
    }
}

/// Lowercase, drop punctuation, and join words with single hyphens
fn slug(text: &str) -> String {
    let kept: String = strip_extension(text)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    kept.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Deserialize)]
struct TrimArgs {
    #[serde(default)]
    input_file: String,
    #[serde(default)]
    cut_from: String,
    #[serde(default)]
    cut_to: String,
    #[serde(default)]
    output_file: String,
}

/// `<input-slug>-<from-slug>-<to-slug><ext>`, e.g. `my-clip-000100-000200.mp4`
fn trim_output_name(input_file: &str, cut_from: &str, cut_to: &str) -> String {
    let path = Path::new(input_file);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!("{}-{}-{}{extension}", slug(&stem), slug(cut_from), slug(cut_to))
}

/// Cuts a time range out of a video without re-encoding
pub struct TrimVideoTool {
    workspace: Arc<Workspace>,
}

impl TrimVideoTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: TrimArgs = parse_input(input)?;
        let input_file = require(&args.input_file, "No input file provided")?;
        let cut_from = require(&args.cut_from, "No cut from time provided")?;
        let cut_to = require(&args.cut_to, "No cut to time provided")?;

        let output_file = match args.output_file.trim() {
            "" => trim_output_name(input_file, cut_from, cut_to),
            given => given.to_string(),
        };

        let full_input = self.workspace.resolve(input_file)?;
        let full_output = self.workspace.resolve(&output_file)?;
        require_file(&full_input, input_file).await?;

        let argv: Vec<OsString> = vec![
            "-i".into(),
            full_input.into(),
            "-ss".into(),
            cut_from.into(),
            "-to".into(),
            cut_to.into(),
            "-c".into(),
            "copy".into(),
            full_output.into(),
        ];
        ffmpeg(argv, &self.workspace).await?;

        Ok(format!("Successfully trimmed video to {output_file}"))
    }
}

#[async_trait]
impl Tool for TrimVideoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "trim_video".into(),
            description: "Trim a video file using ffmpeg with specified start and end times. Optionally specify an output file name.".into(),
            parameters: vec![
                ParameterSchema::string("input_file", "The input video file to trim").required(),
                ParameterSchema::string("cut_from", "Start time in format HH:MM:SS").required(),
                ParameterSchema::string("cut_to", "End time in format HH:MM:SS").required(),
                ParameterSchema::string(
                    "output_file",
                    "Optional output file name. If not provided, it will be generated automatically.",
                ),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

const fn default_width() -> u32 {
    1920
}

const fn default_height() -> u32 {
    1080
}

#[derive(Deserialize)]
struct RescaleArgs {
    #[serde(default)]
    input_path: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default)]
    output_path: String,
}

/// `<dir>/<name>_<w>x<h><ext>` next to the input
fn rescale_output_name(input_path: &str, width: u32, height: u32) -> String {
    let path = Path::new(input_path);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let file_name = format!("{stem}_{width}x{height}{extension}");

    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.join(file_name).to_string_lossy().into_owned(),
        None => file_name,
    }
}

/// Scale to cover the target size, then crop the overflow
fn scale_filter(width: u32, height: u32) -> String {
    format!("scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}")
}

/// Rescales a video to exact dimensions, keeping the aspect ratio by cropping
pub struct RescaleVideoTool {
    workspace: Arc<Workspace>,
}

impl RescaleVideoTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: RescaleArgs = parse_input(input)?;
        let input_path = require(&args.input_path, "No input file path provided")?;
        if args.width == 0 || args.height == 0 {
            return Err(ToolError::InvalidInput("width and height must be positive".into()));
        }

        let output_path = match args.output_path.trim() {
            "" => rescale_output_name(input_path, args.width, args.height),
            given => given.to_string(),
        };

        let full_input = self.workspace.resolve(input_path)?;
        let full_output = self.workspace.resolve(&output_path)?;
        require_file(&full_input, input_path).await?;
        if let Some(parent) = full_output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let argv: Vec<OsString> = vec![
            "-i".into(),
            full_input.into(),
            "-vf".into(),
            scale_filter(args.width, args.height).into(),
            "-y".into(),
            full_output.into(),
        ];
        ffmpeg(argv, &self.workspace).await?;

        Ok(format!(
            "Video successfully rescaled to {}x{} and saved to {output_path}",
            args.width, args.height
        ))
    }
}

#[async_trait]
impl Tool for RescaleVideoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "rescale_video".into(),
            description: "Rescale a video to specified dimensions while maintaining aspect ratio through cropping.".into(),
            parameters: vec![
                ParameterSchema::string(
                    "input_path",
                    "The relative path of the input video file in the Capri data directory.",
                )
                .required(),
                ParameterSchema::integer("width", "The target width for the video in pixels.").with_default(1920.into()),
                ParameterSchema::integer("height", "The target height for the video in pixels.").with_default(1080.into()),
                ParameterSchema::string(
                    "output_path",
                    "The relative path for the output video file in the Capri data directory. If not provided, one will be generated automatically.",
                )
                .with_default("".into()),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, input: &[u8]) -> CoreResult<String> {
        Ok(self.run(input).await?)
    }
}

#[derive(Deserialize)]
struct SegmentArgs {
    #[serde(default)]
    input_path: String,
    #[serde(default)]
    output_path: String,
    #[serde(default)]
    segments_to_keep: Vec<[f64; 2]>,
}

/// `<name>_edited<ext>` for a default, and the input's extension (or `.mp4`)
/// added to a given name that has none
fn segments_output_name(input_path: &str, output_path: &str) -> String {
    let input = Path::new(input_path);
    let extension = input
        .extension()
        .map_or_else(|| ".mp4".to_string(), |e| format!(".{}", e.to_string_lossy()));

    if output_path.is_empty() {
        let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        return format!("{stem}_edited{extension}");
    }

    let has_extension = Path::new(output_path)
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains('.'));
    if has_extension {
        output_path.to_string()
    } else {
        format!("{output_path}{extension}")
    }
}

fn check_segments(segments: &[[f64; 2]]) -> Result<()> {
    if segments.is_empty() {
        return Err(ToolError::InvalidInput("No segments to keep specified".into()));
    }
    for [start, end] in segments {
        if !(start.is_finite() && end.is_finite()) || *start < 0.0 || end <= start {
            return Err(ToolError::InvalidInput(format!("Invalid segment [{start}, {end}]")));
        }
    }
    Ok(())
}

/// `-filter_complex` graph that trims each segment and concatenates them,
/// plus the `-map` arguments for its outputs
fn segments_filter(segments: &[[f64; 2]], has_audio: bool) -> (String, Vec<&'static str>) {
    let mut parts = Vec::with_capacity(segments.len() * 2 + 1);
    let mut video = String::new();
    let mut audio = String::new();

    for (i, [start, end]) in segments.iter().enumerate() {
        parts.push(format!("[0:v]trim=start={start}:end={end},setpts=PTS-STARTPTS[v{i}]"));
        video.push_str(&format!("[v{i}]"));
        if has_audio {
            parts.push(format!("[0:a]atrim=start={start}:end={end},asetpts=PTS-STARTPTS[a{i}]"));
            audio.push_str(&format!("[a{i}]"));
        }
    }

    let n = segments.len();
    if has_audio {
        parts.push(format!("{video}{audio}concat=n={n}:v=1:a=1[outv][outa]"));
        (parts.join("; "), vec!["-map", "[outv]", "-map", "[outa]"])
    } else {
        parts.push(format!("{video}concat=n={n}:v=1:a=0[outv]"));
        (parts.join("; "), vec!["-map", "[outv]"])
    }
}

/// Ask `ffprobe` whether the file has an audio stream. A failed probe counts
/// as no audio.
async fn has_audio_stream(full_input: &Path, workspace: &Workspace) -> Result<bool> {
    let argv: Vec<OsString> = vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "a".into(),
        "-show_entries".into(),
        "stream=codec_type".into(),
        "-of".into(),
        "json".into(),
        full_input.into(),
    ];
    let output = run_program("ffprobe", argv, workspace.root()).await?;
    if !output.status.success() {
        tracing::warn!(status = %output.status, "ffprobe failed, assuming no audio");
        return Ok(false);
    }

    let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    Ok(info["streams"]
        .as_array()
        .is_some_and(|streams| streams.iter().any(|s| s["codec_type"] == "audio")))
}

/// Keeps the listed time ranges of a video and joins them back together
pub struct KeepSegmentsTool {
    workspace: Arc<Workspace>,
}

impl KeepSegmentsTool {
    pub const fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn run(&self, input: &[u8]) -> Result<String> {
        let args: SegmentArgs = parse_input(input)?;
        let input_path = require(&args.input_path, "No input file path provided")?;
        check_segments(&args.segments_to_keep)?;

        let output_path = segments_output_name(input_path, args.output_path.trim());
        let full_input = self.workspace.resolve(input_path)?;
        let full_output = self.workspace.resolve(&output_path)?;
        require_file(&full_input, input_path).await?;
        if let Some(parent) = full_output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let has_audio = has_audio_stream(&full_input, &self.workspace).await?;
        let (filter, mapping) = segments_filter(&args.segments_to_keep, has_audio);

        let mut argv: Vec<OsString> = vec!["-i".into(), full_input.into(), "-filter_complex".into(), filter.into()];
        argv.extend(mapping.into_iter().map(OsString::from));
        argv.push(full_output.into());
        ffmpeg(argv, &self.workspace).await?;

        tracing::info!(
            input = input_path,
            output = %output_path,
            segments = args.segments_to_keep.len(),
            has_audio,
            "Kept video segments"
        );
        Ok(format!("Successfully created edited video at {output_path}"))
    }
}

#[async_trait]
impl Tool for KeepSegmentsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "keep_segments_from_video".into(),
            description: "Keep specified segments from a video and concatenate them together. Provide the input video path and a list of time segments to keep.".into(),
            parameters: vec![
                ParameterSchema::string(
                    "input_path",
                    "The relative path of the input video file in the Capri data directory.",
                )
                .required(),
                ParameterSchema::string(
                    "output_path",
                    "Optional. The relative path for the output video in the Capri data directory. If not provided, will use input filename with '_edited' suffix.",
                ),
                ParameterSchema::new(
                    "segments_to_keep",
                    "array",
                    "List of time segments to keep in the output video. Each segment is a pair of [start_time, end_time] in seconds.",
                )
                .with_keyword(
                    "items",
                    serde_json::json!({
                        "type": "array",
                        "minItems": 2,
                        "maxItems": 2,
                        "items": {"type": "number", "description": "Time in seconds."}
                    }),
                )
                .required(),
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
    fn test_slug() {
        assert_eq!(slug("My Clip.mp4"), "my-clip");
        assert_eq!(slug("00:01:00"), "000100");
        assert_eq!(slug("  a -- b  "), "a-b");
    }

    #[test]
    fn test_default_output_names() {
        assert_eq!(
            trim_output_name("videos/My Clip.mp4", "00:01:00", "00:02:30"),
            "my-clip-000100-000230.mp4"
        );
        assert_eq!(rescale_output_name("videos/intro.mov", 1280, 720), "videos/intro_1280x720.mov");
        assert_eq!(rescale_output_name("intro.mov", 1920, 1080), "intro_1920x1080.mov");
        assert_eq!(
            scale_filter(1280, 720),
            "scale=1280:720:force_original_aspect_ratio=increase,crop=1280:720"
        );
    }

    #[test]
    fn test_segments_output_name() {
        assert_eq!(segments_output_name("videos/talk.mov", ""), "talk_edited.mov");
        assert_eq!(segments_output_name("talk", ""), "talk_edited.mp4");
        assert_eq!(segments_output_name("talk.mov", "cuts/short"), "cuts/short.mov");
        assert_eq!(segments_output_name("talk.mov", "short.mkv"), "short.mkv");
    }

    #[test]
    fn test_segments_filter() {
        let (filter, mapping) = segments_filter(&[[0.0, 5.0], [10.5, 12.0]], true);
        assert_eq!(
            filter,
            "[0:v]trim=start=0:end=5,setpts=PTS-STARTPTS[v0]; \
             [0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS[a0]; \
             [0:v]trim=start=10.5:end=12,setpts=PTS-STARTPTS[v1]; \
             [0:a]atrim=start=10.5:end=12,asetpts=PTS-STARTPTS[a1]; \
             [v0][v1][a0][a1]concat=n=2:v=1:a=1[outv][outa]"
        );
        assert_eq!(mapping, ["-map", "[outv]", "-map", "[outa]"]);

        let (filter, mapping) = segments_filter(&[[1.0, 2.0]], false);
        assert_eq!(
            filter,
            "[0:v]trim=start=1:end=2,setpts=PTS-STARTPTS[v0]; [v0]concat=n=1:v=1:a=0[outv]"
        );
        assert_eq!(mapping, ["-map", "[outv]"]);
    }

    #[tokio::test]
    async fn test_keep_segments_checks_input_first() {
        let dir = tempfile::tempdir().unwrap();
        let tool = KeepSegmentsTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool
            .execute(br#"{"input_path":"a.mp4","segments_to_keep":[]}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No segments to keep specified"));

        let err = tool
            .execute(br#"{"input_path":"a.mp4","segments_to_keep":[[5, 2]]}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid segment [5, 2]"));

        let err = tool
            .execute(br#"{"input_path":"a.mp4","segments_to_keep":[[0, 2]]}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Input file not found: a.mp4"));
    }

    #[tokio::test]
    async fn test_missing_input_checked_before_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));

        let err = TrimVideoTool::new(ws.clone())
            .execute(br#"{"input_file":"a.mp4","cut_from":"00:00:01","cut_to":"00:00:02"}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Input file not found: a.mp4"));

        let err = RescaleVideoTool::new(ws)
            .execute(br#"{"input_path":"a.mp4","width":0}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}
