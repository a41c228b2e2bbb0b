//! Command-line interface for shell-bridge.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every setting is optional so that an absent flag leaves the environment
/// and config file values in place.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Shared secret (overrides config file).
    pub secret: Option<String>,
    /// Program to run in each session.
    pub shell: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// The first item is the program name, as with `std::env::args_os`.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("secret") => {
                result.secret = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("shell") => {
                result.shell = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-bridge {version}
Tunnel interactive terminal sessions over HTTP and WebSocket

USAGE:
    shell-bridge [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 3000]
    -c, --config <FILE>     Path to configuration file (JSON)
    -k, --secret <SECRET>   Shared secret clients must present
    -s, --shell <PROGRAM>   Program to run in each session [default: $SHELL]
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_BRIDGE_HOST       Host address (overrides config)
    SHELL_BRIDGE_PORT       Port number (overrides config)
    SHELL_BRIDGE_SECRET     Shared secret (overrides config)
    SHELL_BRIDGE_SHELL      Session program (overrides config)
    SHELL_BRIDGE_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                Alternative log level setting

CLIENTS:
    Present the secret as "Authorization: Bearer <SECRET>" or as a
    "token" query parameter. Without a secret every connection is refused.

EXAMPLES:
    # Start on localhost:3000
    shell-bridge -k my-secret

    # Start on all interfaces with a specific shell
    shell-bridge -H 0.0.0.0 -p 8080 -k my-secret -s /bin/zsh

    # Start with config file
    shell-bridge -c /etc/shell-bridge/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-bridge {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("shell-bridge")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.host.is_none());
        assert!(result.port.is_none());
        assert!(result.secret.is_none());
        assert!(!result.help);
    }

    #[test]
    fn test_host_port() {
        let result = parse_args_from(args(&["-H", "0.0.0.0", "-p", "8080"])).unwrap();
        assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
        assert_eq!(result.port, Some(8080));
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--host",
            "::1",
            "--port",
            "9000",
            "--secret",
            "tok-A",
            "--shell",
            "/bin/bash",
        ]))
        .unwrap();
        assert_eq!(result.host.unwrap().to_string(), "::1");
        assert_eq!(result.port, Some(9000));
        assert_eq!(result.secret.as_deref(), Some("tok-A"));
        assert_eq!(result.shell.as_deref(), Some("/bin/bash"));
    }

    #[test]
    fn test_short_secret_and_shell() {
        let result = parse_args_from(args(&["-k", "my-secret", "-s", "/bin/zsh"])).unwrap();
        assert_eq!(result.secret, Some("my-secret".to_string()));
        assert_eq!(result.shell, Some("/bin/zsh".to_string()));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_help_and_version_flags() {
        assert!(parse_args_from(args(&["-h"])).unwrap().help);
        assert!(parse_args_from(args(&["--help"])).unwrap().help);
        assert!(parse_args_from(args(&["-V"])).unwrap().version);
        assert!(parse_args_from(args(&["--version"])).unwrap().version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse_args_from(args(&["-p", "invalid"])),
            Err(ArgsError::InvalidValue("port", _))
        ));
        assert!(matches!(
            parse_args_from(args(&["-H", "not-an-ip"])),
            Err(ArgsError::InvalidValue("host", _))
        ));
    }

    #[test]
    fn test_unexpected_arguments() {
        let err = parse_args_from(args(&["serve"])).unwrap_err();
        assert_eq!(err.to_string(), "unexpected argument: 'serve'");

        assert!(matches!(
            parse_args_from(args(&["--api-key", "x"])),
            Err(ArgsError::Lexopt(_))
        ));
        assert!(parse_args_from(args(&["-k"])).is_err());
    }
}
