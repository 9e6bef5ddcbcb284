use std::io::BufRead;

use navigator_lib::itinerary::StopId;

use crate::runtime::{Command, RuntimeHandle};

pub const HELP: &str = "\
Commands:
  start                 start navigation
  stop                  stop navigation
  skip                  go to the next stop
  goto <n>              navigate to stop n (1-based)
  voice on|off          voice guidance
  alerts on|off         SMS proximity alerts
  radius <meters>       proximity radius
  phone <number>        SMS number (turns alerts on)
  quit                  exit";

/// Parses one console line. Stop numbers are 1-based.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("Empty command".to_string());
    };
    let argument = words.collect::<Vec<_>>().join(" ");

    let switch = |argument: &str| match argument {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("Expected 'on' or 'off', got {argument:?}")),
    };

    match verb.to_ascii_lowercase().as_str() {
        "start" => Ok(Command::Start),
        "stop" => Ok(Command::Stop),
        "skip" | "next" => Ok(Command::Skip),
        "goto" | "go" => match argument.parse::<usize>() {
            Ok(number) if number > 0 => Ok(Command::Select(StopId(number - 1))),
            _ => Err(format!("Expected a stop number starting at 1, got {argument:?}")),
        },
        "voice" => switch(&argument).map(Command::SetVoice),
        "alerts" => switch(&argument).map(Command::SetAlerts),
        "radius" => argument
            .parse::<f64>()
            .map(Command::SetRadius)
            .map_err(|_| format!("Expected a radius in meters, got {argument:?}")),
        "phone" if !argument.is_empty() => Ok(Command::SetPhoneNumber(argument)),
        "phone" => Err("Expected a phone number".to_string()),
        "quit" | "exit" => Ok(Command::Shutdown),
        other => Err(format!("Unknown command {other:?}")),
    }
}

/// Handles one console line. Returns false once the console should close.
pub fn dispatch(line: &str, handle: &RuntimeHandle) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    if line == "help" {
        println!("{HELP}");
        return true;
    }

    match parse_command(line) {
        Ok(command) => {
            let quit = command == Command::Shutdown;
            handle.send(command) && !quit
        }
        Err(err) => {
            println!("{err}. Type 'help' for commands.");
            true
        }
    }
}

/// Reads commands from stdin on a dedicated thread, so a pending read never holds up shutdown.
pub fn spawn_stdin(handle: RuntimeHandle) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new().name("console".to_string()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if dispatch(&line, &handle) => {}
                Ok(_) => break,
                Err(err) => {
                    tracing::error!("Failed to read console input: {err}");
                    break;
                }
            }
        }
        tracing::debug!("Console closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LoopEvent;

    #[test]
    fn parses_navigation_controls() {
        assert_eq!(parse_command("start"), Ok(Command::Start));
        assert_eq!(parse_command(" STOP "), Ok(Command::Stop));
        assert_eq!(parse_command("next"), Ok(Command::Skip));
        assert_eq!(parse_command("goto 3"), Ok(Command::Select(StopId(2))));
        assert!(parse_command("goto 0").is_err());
        assert!(parse_command("goto").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn parses_preferences() {
        assert_eq!(parse_command("voice off"), Ok(Command::SetVoice(false)));
        assert_eq!(parse_command("alerts on"), Ok(Command::SetAlerts(true)));
        assert!(parse_command("alerts maybe").is_err());
        assert_eq!(parse_command("radius 250"), Ok(Command::SetRadius(250.)));
        assert_eq!(
            parse_command("phone +91 98765 43210"),
            Ok(Command::SetPhoneNumber("+91 98765 43210".into()))
        );
        assert!(parse_command("phone").is_err());
    }

    #[test]
    fn forwards_until_quit() {
        let (handle, mut rx) = RuntimeHandle::channel();
        for line in ["start", "", "bogus", "skip", "quit", "stop"] {
            if !dispatch(line, &handle) {
                break;
            }
        }

        let mut commands = Vec::new();
        while let Ok(LoopEvent::Command(command)) = rx.try_recv() {
            commands.push(command);
        }
        assert_eq!(commands, vec![Command::Start, Command::Skip, Command::Shutdown]);
    }
}
