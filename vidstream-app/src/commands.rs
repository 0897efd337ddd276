//! Runtime commands typed on stdin while a stream plays.

use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};
use vidstream_player::{PlaybackSpeed, SnapshotFormat};

/// Actions the user can trigger while the player runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Select a new location (file path or link) for the next play.
    Open(String),
    /// Select a camera for the next play.
    Camera(u32),
    /// Play the selection, or stop if already playing.
    Play,
    Stop,
    Pause,
    Resume,
    Seek(f64),
    Interval(u64),
    Speed(PlaybackSpeed),
    Rotate { clockwise: bool },
    Snapshot(PathBuf, SnapshotFormat),
    Info,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

fn invalid(command: &'static str, reason: impl ToString) -> ParseCommandError {
    ParseCommandError::InvalidArgument {
        command,
        reason: reason.to_string(),
    }
}

impl FromStr for PlayerCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = |name: &'static str| {
            if rest.is_empty() {
                Err(ParseCommandError::MissingArgument(name))
            } else {
                Ok(rest)
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseCommandError::Empty),
            "open" => Ok(PlayerCommand::Open(arg("open")?.to_string())),
            "camera" => arg("camera")?
                .parse()
                .map(PlayerCommand::Camera)
                .map_err(|e| invalid("camera", e)),
            "play" => Ok(PlayerCommand::Play),
            "stop" => Ok(PlayerCommand::Stop),
            "pause" => Ok(PlayerCommand::Pause),
            "resume" => Ok(PlayerCommand::Resume),
            "seek" => arg("seek")?
                .parse()
                .map(PlayerCommand::Seek)
                .map_err(|e| invalid("seek", e)),
            "interval" => arg("interval")?
                .parse()
                .map(PlayerCommand::Interval)
                .map_err(|e| invalid("interval", e)),
            "speed" => arg("speed")?
                .parse()
                .map(PlayerCommand::Speed)
                .map_err(|e| invalid("speed", e)),
            "rotate" => match arg("rotate")?.to_ascii_lowercase().as_str() {
                "cw" => Ok(PlayerCommand::Rotate { clockwise: true }),
                "ccw" => Ok(PlayerCommand::Rotate { clockwise: false }),
                other => Err(invalid("rotate", format!("expected cw or ccw, got '{}'", other))),
            },
            "snap" => {
                let mut parts = arg("snap")?.rsplitn(2, char::is_whitespace);
                let last = parts.next().unwrap_or_default();
                match (parts.next(), last.parse::<SnapshotFormat>()) {
                    (Some(path), Ok(format)) => {
                        Ok(PlayerCommand::Snapshot(PathBuf::from(path.trim()), format))
                    }
                    _ => {
                        let path = PathBuf::from(rest);
                        let format = path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .and_then(|ext| ext.parse().ok())
                            .unwrap_or_default();
                        Ok(PlayerCommand::Snapshot(path, format))
                    }
                }
            }
            "info" => Ok(PlayerCommand::Info),
            "quit" | "exit" => Ok(PlayerCommand::Quit),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

/// Read commands from stdin on a background thread.
///
/// The receiver disconnects when stdin reaches end of file.
pub fn spawn_stdin_reader() -> mpsc::Receiver<PlayerCommand> {
    let (sender, receiver) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("vidstream-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                match line.parse::<PlayerCommand>() {
                    Ok(command) => {
                        debug!("Command: {:?}", command);
                        if sender.send(command).is_err() {
                            break;
                        }
                    }
                    Err(ParseCommandError::Empty) => {}
                    Err(e) => warn!("{}", e),
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Commands disabled, cannot spawn stdin reader: {}", e);
    }
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!("play".parse(), Ok(PlayerCommand::Play));
        assert_eq!("  PAUSE ".parse(), Ok(PlayerCommand::Pause));
        assert_eq!("exit".parse(), Ok(PlayerCommand::Quit));
        assert_eq!("".parse::<PlayerCommand>(), Err(ParseCommandError::Empty));
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!("seek 120".parse(), Ok(PlayerCommand::Seek(120.0)));
        assert_eq!("interval 66".parse(), Ok(PlayerCommand::Interval(66)));
        assert_eq!("speed 2x".parse(), Ok(PlayerCommand::Speed(PlaybackSpeed::Double)));
        assert_eq!("camera 1".parse(), Ok(PlayerCommand::Camera(1)));
        assert_eq!(
            "open rtsp://cam.local/live".parse(),
            Ok(PlayerCommand::Open("rtsp://cam.local/live".into()))
        );
        assert_eq!(
            "rotate ccw".parse(),
            Ok(PlayerCommand::Rotate { clockwise: false })
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(
            "seek".parse::<PlayerCommand>(),
            Err(ParseCommandError::MissingArgument("seek"))
        );
        assert!(matches!(
            "interval fast".parse::<PlayerCommand>(),
            Err(ParseCommandError::InvalidArgument { command: "interval", .. })
        ));
        assert!(matches!(
            "rotate left".parse::<PlayerCommand>(),
            Err(ParseCommandError::InvalidArgument { command: "rotate", .. })
        ));
        assert_eq!(
            "jump 4".parse::<PlayerCommand>(),
            Err(ParseCommandError::Unknown("jump".into()))
        );
    }

    #[test]
    fn test_snapshot_format() {
        assert_eq!(
            "snap out/frame jpg".parse(),
            Ok(PlayerCommand::Snapshot(PathBuf::from("out/frame"), SnapshotFormat::Jpeg))
        );
        assert_eq!(
            "snap shot.webp".parse(),
            Ok(PlayerCommand::Snapshot(PathBuf::from("shot.webp"), SnapshotFormat::Webp))
        );
        assert_eq!(
            "snap shot".parse(),
            Ok(PlayerCommand::Snapshot(PathBuf::from("shot"), SnapshotFormat::Png))
        );
    }
}
