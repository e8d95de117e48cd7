use std::io::{self, Write};

use serde::Serialize;

use crate::init::{InitProgress, InitReport};
use crate::layout::WorkspacePaths;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::scheduler::DownloadReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_download(report: &DownloadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_init(report: &InitReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_layout(paths: &WorkspacePaths, progress: &InitProgress) -> io::Result<()> {
        #[derive(Serialize)]
        struct LayoutView<'a> {
            paths: &'a WorkspacePaths,
            exists: bool,
            initialized: &'a InitProgress,
        }
        Self::print_json(&LayoutView {
            paths,
            exists: paths.exists(),
            initialized: progress,
        })
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
