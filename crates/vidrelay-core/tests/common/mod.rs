//! Scripted stand-ins for yt-dlp, ffprobe and ffmpeg.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use vidrelay_core::command::{CommandOutput, CommandRunner, CommandSpec};
use vidrelay_core::error::RunError;

pub struct ScriptedTools {
    /// Declared size per ladder tier (max height); absent means unknown.
    pub declared: HashMap<u32, u64>,
    /// Bytes written by a download.
    pub download_bytes: u64,
    /// Source duration reported by ffprobe, in seconds.
    pub duration_secs: f64,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedTools {
    pub fn new(declared: HashMap<u32, u64>, download_bytes: u64, duration_secs: f64) -> Self {
        Self {
            declared,
            download_bytes,
            duration_secs,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, program: &str, flag: Option<&str>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, args)| p == program && flag.map_or(true, |f| args.iter().any(|a| a == f)))
            .count()
    }
}

fn after(args: &[String], flag: &str) -> String {
    let i = args.iter().position(|a| a == flag).unwrap();
    args[i + 1].clone()
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.into_bytes(),
        stderr: Vec::new(),
    }
}

#[async_trait]
impl CommandRunner for ScriptedTools {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, RunError> {
        let args = spec.display_args();
        self.calls
            .lock()
            .unwrap()
            .push((spec.program.clone(), args.clone()));

        match spec.program.as_str() {
            "yt-dlp" => {
                let fmt = after(&args, "-f");
                let start = fmt.find("height<=").unwrap() + "height<=".len();
                let end = start + fmt[start..].find(']').unwrap();
                let tier: u32 = fmt[start..end].parse().unwrap();
                if args.iter().any(|a| a == "--dump-json") {
                    let size = self
                        .declared
                        .get(&tier)
                        .map_or("null".to_string(), |s| s.to_string());
                    return Ok(ok(format!(
                        "{{\"id\":\"dQw4w9WgXcQ\",\"extractor_key\":\"Youtube\",\"title\":\"Test clip\",\"duration\":{},\"filesize\":{}}}\n",
                        self.duration_secs, size
                    )));
                }
                let path = PathBuf::from(after(&args, "-o").replace("%(ext)s", "mp4"));
                std::fs::write(&path, vec![7u8; self.download_bytes as usize]).unwrap();
                Ok(ok(format!("{}\n", path.display())))
            }
            "ffprobe" => Ok(ok(format!(
                "{{\"format\":{{\"duration\":\"{:.3}\"}}}}",
                self.duration_secs
            ))),
            "ffmpeg" => {
                let secs: f64 = after(&args, "-t").parse().unwrap();
                let rate = self.download_bytes as f64 / self.duration_secs;
                let out = args.last().unwrap();
                std::fs::write(out, vec![7u8; (secs * rate) as usize]).unwrap();
                Ok(ok(String::new()))
            }
            other => Err(RunError::NotFound(other.to_string())),
        }
    }
}
