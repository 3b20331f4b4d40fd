//! Line commands read from stdin.

use camstream_ipc::{QualitySelection, StreamCommand};

pub const HELP: &str = "\
Commands:
  start [url] [key]   start publishing (defaults to the configured destination)
  stop                stop publishing
  toggle [url] [key]  stop when live, start otherwise
  preview on|off      start or stop the camera preview
  quality low|medium  switch quality preset
  clear               acknowledge the current error
  stats               print session statistics
  help                show this text
  quit                release everything and exit";

/// Destination used when `start` is given no arguments.
#[derive(Debug, Clone, Default)]
pub struct Destination {
    pub rtmp_url: String,
    pub stream_key: String,
}

/// A parsed console line.
#[derive(Debug)]
pub enum Input {
    Command(StreamCommand),
    Stats,
    Help,
    Quit,
    Empty,
}

/// Parse one line of input.
pub fn parse_line(line: &str, destination: &Destination) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let args: Vec<&str> = words.collect();

    let input = match verb.to_ascii_lowercase().as_str() {
        "start" | "toggle" => {
            let rtmp_url = args
                .first()
                .copied()
                .unwrap_or(destination.rtmp_url.as_str())
                .to_string();
            let stream_key = args
                .get(1)
                .copied()
                .unwrap_or(destination.stream_key.as_str())
                .to_string();
            if verb.eq_ignore_ascii_case("start") {
                Input::Command(StreamCommand::StartStreaming {
                    rtmp_url,
                    stream_key,
                })
            } else {
                Input::Command(StreamCommand::ToggleStreaming {
                    rtmp_url,
                    stream_key,
                })
            }
        }
        "stop" => Input::Command(StreamCommand::StopStreaming),
        "preview" => match args.first().copied() {
            Some("on") => Input::Command(StreamCommand::StartPreview),
            Some("off") => Input::Command(StreamCommand::StopPreview),
            _ => return Err("usage: preview on|off".to_string()),
        },
        "quality" => match args.first() {
            Some(name) => Input::Command(StreamCommand::SelectQuality(
                QualitySelection::from_name(name),
            )),
            None => return Err("usage: quality low|medium".to_string()),
        },
        "clear" => Input::Command(StreamCommand::ClearError),
        "stats" => Input::Stats,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("Unknown command: {} (try 'help')", other)),
    };

    Ok(input)
}
