//! Console command parsing.

use anyhow::{anyhow, bail, Context, Result};

use plexdl_core::{DownloadRequest, SessionId, TaskId};

pub const HELP: &str = "\
Commands:
  get <session> <library> <link> <title...> [--season N] [--year Y] [--group] [--name LABEL]
  queue [session] [--json]      list running and queued tasks
  content [session] [--json]    list queued content items
  cancel <session> <task_id>    cancel the content item owning a task
  cancel-all <session>          cancel everything for a session
  metrics                       print Prometheus metrics
  help                          show this help
  quit                          cancel all downloads and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(DownloadRequest),
    Queue {
        session: Option<SessionId>,
        json: bool,
    },
    Content {
        session: Option<SessionId>,
        json: bool,
    },
    Cancel {
        session: SessionId,
        task_id: TaskId,
    },
    CancelAll(SessionId),
    Metrics,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let tokens = tokenize(line)?;
    let Some((name, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "get" | "dl" => Command::Get(parse_get(args)?),
        "queue" | "q" => {
            let (session, json) = parse_listing(args)?;
            Command::Queue { session, json }
        }
        "content" => {
            let (session, json) = parse_listing(args)?;
            Command::Content { session, json }
        }
        "cancel" => match args {
            [session, task_id] => Command::Cancel {
                session: SessionId::new(session.as_str()),
                task_id: TaskId(
                    task_id
                        .parse()
                        .with_context(|| format!("invalid task id '{}'", task_id))?,
                ),
            },
            _ => bail!("usage: cancel <session> <task_id>"),
        },
        "cancel-all" => match args {
            [session] => Command::CancelAll(SessionId::new(session.as_str())),
            _ => bail!("usage: cancel-all <session>"),
        },
        "metrics" => Command::Metrics,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(Some(command))
}

fn parse_get(args: &[String]) -> Result<DownloadRequest> {
    let mut positional = Vec::new();
    let mut season = None;
    let mut year = None;
    let mut grouped = false;
    let mut name = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--season" => season = Some(number(iter.next(), "--season")?),
            "--year" => year = Some(number(iter.next(), "--year")?),
            "--group" => grouped = true,
            "--name" => {
                name = Some(
                    iter.next()
                        .ok_or_else(|| anyhow!("--name needs a value"))?
                        .clone(),
                )
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let [session, library, link, title @ ..] = positional.as_slice() else {
        bail!("usage: get <session> <library> <link> <title...>");
    };
    if title.is_empty() {
        bail!("a title is required");
    }

    let mut request = DownloadRequest::new(*session, *library, *link, title.join(" ")).grouped(grouped);
    if let Some(season) = season {
        request = request.with_season(season);
    }
    if let Some(year) = year {
        request = request.with_year(year);
    }
    if let Some(name) = name {
        request = request.with_display_name(name);
    }
    Ok(request)
}

fn parse_listing(args: &[String]) -> Result<(Option<SessionId>, bool)> {
    let mut session = None;
    let mut json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            other if session.is_none() => session = Some(SessionId::new(other)),
            other => bail!("unexpected argument '{}'", other),
        }
    }
    Ok((session, json))
}

fn number(value: Option<&String>, flag: &str) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{} needs a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{}'", flag, value))
}

/// Split on whitespace, keeping double-quoted runs together.
fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        bail!("unterminated quote");
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}
