//! Line-oriented CLI grammar (§6): three commands, parsed independently of
//! any process argv, matching the host project's REPL-style CLI rather
//! than a Unix-argv one.
//!
//! - `http static server www-root <path> [prealloc-fifos N] [private-segment-size SZ]
//!   [fifo-size SZ] [uri URI] [cache-size SZ] [ptr-thresh SZ] [url-handlers] [debug [N]]`
//! - `show http static server [cache] [sessions] [verbose [N]]`
//! - `clear http static cache`

use crate::config::ServerConfig;
use crate::error::CliError;

#[derive(Debug, Clone)]
pub enum CliCommand {
    Start(ServerConfig),
    Show { cache: bool, sessions: bool, verbose: Option<u8> },
    ClearCache,
}

/// Parses one line of input into a [`CliCommand`].
pub fn parse(line: &str) -> Result<CliCommand, CliError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["http", "static", "server", rest @ ..] => parse_start(rest).map(CliCommand::Start),
        ["show", "http", "static", "server", rest @ ..] => parse_show(rest),
        ["clear", "http", "static", "cache"] => Ok(CliCommand::ClearCache),
        _ => Err(CliError::UnknownInput(line.to_string())),
    }
}

fn parse_start(tokens: &[&str]) -> Result<ServerConfig, CliError> {
    let mut builder = ServerConfig::builder();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "www-root" => {
                let value = next_value(tokens, &mut i, "www-root")?;
                builder = builder.www_root(value);
            }
            "uri" => {
                let value = next_value(tokens, &mut i, "uri")?;
                builder = builder.uri(value);
            }
            "cache-size" => {
                let value = next_value(tokens, &mut i, "cache-size")?;
                builder = builder.cache_limit(parse_size("cache-size", value)?);
            }
            "fifo-size" => {
                let value = next_value(tokens, &mut i, "fifo-size")?;
                builder = builder.fifo_size(parse_size("fifo-size", value)?);
            }
            "prealloc-fifos" => {
                let value = next_value(tokens, &mut i, "prealloc-fifos")?;
                builder = builder.prealloc_fifos(parse_int("prealloc-fifos", value)?);
            }
            "private-segment-size" => {
                let value = next_value(tokens, &mut i, "private-segment-size")?;
                builder = builder.private_segment_size(parse_size("private-segment-size", value)?);
            }
            "ptr-thresh" => {
                let value = next_value(tokens, &mut i, "ptr-thresh")?;
                builder = builder.use_ptr_thresh(parse_size("ptr-thresh", value)?);
            }
            "url-handlers" => {
                builder = builder.enable_url_handlers(true);
                i += 1;
            }
            "debug" => {
                i += 1;
                let level = match tokens.get(i) {
                    Some(v) if v.parse::<u8>().is_ok() => {
                        let parsed = v.parse().expect("checked above");
                        i += 1;
                        parsed
                    }
                    _ => 1,
                };
                builder = builder.debug_level(level);
            }
            other => return Err(CliError::UnknownInput(other.to_string())),
        }
    }
    Ok(builder.build()?)
}

fn parse_show(tokens: &[&str]) -> Result<CliCommand, CliError> {
    let mut cache = false;
    let mut sessions = false;
    let mut verbose = None;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "cache" => {
                cache = true;
                i += 1;
            }
            "sessions" => {
                sessions = true;
                i += 1;
            }
            "verbose" => {
                i += 1;
                let level = match tokens.get(i) {
                    Some(v) if v.parse::<u8>().is_ok() => {
                        let parsed = v.parse().expect("checked above");
                        i += 1;
                        parsed
                    }
                    _ => 1,
                };
                verbose = Some(level);
            }
            other => return Err(CliError::UnknownInput(other.to_string())),
        }
    }
    if !cache && !sessions {
        cache = true;
        sessions = true;
    }
    Ok(CliCommand::Show { cache, sessions, verbose })
}

fn next_value<'a>(tokens: &[&'a str], i: &mut usize, flag: &'static str) -> Result<&'a str, CliError> {
    *i += 1;
    let value = tokens.get(*i).ok_or(CliError::MissingValue(flag))?;
    *i += 1;
    Ok(value)
}

fn parse_int(flag: &'static str, value: &str) -> Result<u32, CliError> {
    value.parse().map_err(|_| CliError::InvalidValue { flag, value: value.to_string() })
}

/// Parses a byte count with an optional `K`/`M`/`G` (binary) suffix, e.g.
/// `512K`, `10M`, `1G`, or a bare byte count.
fn parse_size(flag: &'static str, value: &str) -> Result<usize, CliError> {
    let invalid = || CliError::InvalidValue { flag, value: value.to_string() };
    let (digits, multiplier) = match value.chars().last() {
        Some(c @ ('k' | 'K')) => (&value[..value.len() - c.len_utf8()], 1 << 10),
        Some(c @ ('m' | 'M')) => (&value[..value.len() - c.len_utf8()], 1 << 20),
        Some(c @ ('g' | 'G')) => (&value[..value.len() - c.len_utf8()], 1 << 30),
        _ => (value, 1),
    };
    let n: usize = digits.parse().map_err(|_| invalid())?;
    Ok(n * multiplier)
}
