//! The small command vocabulary kdeck speaks to the cluster tool.
//!
//! Command strings are built here and treated as trusted by every executor. The
//! `Display` form is canonical: `Command::parse(&cmd.to_string()) == Ok(cmd)`.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ExecError, LabelSelector, WorkloadKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `get <kind> <name>`
    Get { kind: String, name: String },
    /// `get <kind> -l=<selector>`; an empty selector lists everything in scope.
    List { kind: String, selector: String },
    /// `scale <kind> <name> --replicas=<n>`
    Scale { kind: String, name: String, replicas: u32 },
    /// `delete <kind> <name>`
    Delete { kind: String, name: String },
}

impl Command {
    pub fn get(kind: WorkloadKind, name: &str) -> Self {
        Command::Get { kind: kind.noun().to_string(), name: name.to_string() }
    }

    pub fn list_pods(selector: &LabelSelector) -> Self {
        Command::List { kind: "pods".to_string(), selector: selector.to_string() }
    }

    pub fn scale(kind: WorkloadKind, name: &str, replicas: u32) -> Self {
        Command::Scale { kind: kind.short().to_string(), name: name.to_string(), replicas }
    }

    pub fn delete(kind: WorkloadKind, name: &str) -> Self {
        Command::Delete { kind: kind.short().to_string(), name: name.to_string() }
    }

    pub fn kind(&self) -> &str {
        match self {
            Command::Get { kind, .. } | Command::List { kind, .. } | Command::Scale { kind, .. } | Command::Delete { kind, .. } => kind,
        }
    }

    /// Read commands are idempotent and safe to cache.
    pub fn is_read(&self) -> bool {
        matches!(self, Command::Get { .. } | Command::List { .. })
    }

    pub fn parse(input: &str) -> Result<Self, ExecError> {
        let mut tokens = input.split_whitespace();
        let verb = tokens.next().ok_or_else(|| ExecError::Parse("empty command".into()))?;
        let rest: Vec<&str> = tokens.collect();
        match verb {
            "get" => parse_get(&rest),
            "scale" => parse_scale(&rest),
            "delete" => {
                let (kind, name, extra) = kind_and_name(&rest)?;
                if let Some(t) = extra.first() {
                    return Err(ExecError::Parse(format!("delete: unexpected argument {}", t)));
                }
                Ok(Command::Delete { kind, name })
            }
            other => Err(ExecError::Unsupported(format!("verb {}", other))),
        }
    }
}

/// Split `kind name` or `kind/name` off the front of the argument list.
fn kind_and_name<'a>(args: &'a [&'a str]) -> Result<(String, String, &'a [&'a str]), ExecError> {
    let first = args.first().ok_or_else(|| ExecError::Parse("missing resource kind".into()))?;
    if let Some((kind, name)) = first.split_once('/') {
        if kind.is_empty() || name.is_empty() {
            return Err(ExecError::Parse(format!("malformed resource {}", first)));
        }
        return Ok((kind.to_string(), name.to_string(), &args[1..]));
    }
    match args.get(1) {
        Some(name) if !name.starts_with('-') => Ok((first.to_string(), name.to_string(), &args[2..])),
        _ => Err(ExecError::Parse(format!("missing name for {}", first))),
    }
}

/// Accepts `--flag=value` and `--flag value`; returns the value and how many tokens it used.
fn flag_value<'a>(args: &[&'a str], i: usize, names: &[&str]) -> Option<(&'a str, usize)> {
    let tok = args[i];
    for n in names {
        if tok == *n {
            return args.get(i + 1).map(|v| (*v, 2));
        }
        if let Some(v) = tok.strip_prefix(n).and_then(|r| r.strip_prefix('=')) {
            return Some((v, 1));
        }
    }
    None
}

fn parse_get(args: &[&str]) -> Result<Command, ExecError> {
    let kind = args.first().ok_or_else(|| ExecError::Parse("get: missing resource kind".into()))?;
    if let Some((k, n)) = kind.split_once('/') {
        if args.len() > 1 {
            return Err(ExecError::Parse(format!("get: unexpected argument {}", args[1])));
        }
        return Ok(Command::Get { kind: k.to_string(), name: n.to_string() });
    }
    let mut name: Option<&str> = None;
    let mut selector: Option<&str> = None;
    let mut i = 1;
    while i < args.len() {
        if let Some((v, used)) = flag_value(args, i, &["-l", "--selector"]) {
            selector = Some(v);
            i += used;
            continue;
        }
        let tok = args[i];
        if tok.starts_with('-') || name.is_some() {
            return Err(ExecError::Parse(format!("get: unexpected argument {}", tok)));
        }
        name = Some(tok);
        i += 1;
    }
    match (name, selector) {
        (Some(_), Some(_)) => Err(ExecError::Parse("get: name and selector are exclusive".into())),
        (Some(n), None) => Ok(Command::Get { kind: kind.to_string(), name: n.to_string() }),
        (None, sel) => Ok(Command::List { kind: kind.to_string(), selector: sel.unwrap_or("").to_string() }),
    }
}

fn parse_scale(args: &[&str]) -> Result<Command, ExecError> {
    let (kind, name, rest) = kind_and_name(args)?;
    let mut replicas: Option<u32> = None;
    let mut i = 0;
    while i < rest.len() {
        match flag_value(rest, i, &["--replicas"]) {
            Some((v, used)) => {
                let n = v.parse::<u32>().map_err(|_| ExecError::Parse(format!("scale: invalid replicas {:?}", v)))?;
                replicas = Some(n);
                i += used;
            }
            None => return Err(ExecError::Parse(format!("scale: unexpected argument {}", rest[i]))),
        }
    }
    let replicas = replicas.ok_or_else(|| ExecError::Parse("scale: --replicas is required".into()))?;
    Ok(Command::Scale { kind, name, replicas })
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Get { kind, name } => write!(f, "get {} {}", kind, name),
            Command::List { kind, selector } if selector.is_empty() => write!(f, "get {}", kind),
            Command::List { kind, selector } => write!(f, "get {} -l={}", kind, selector),
            Command::Scale { kind, name, replicas } => write!(f, "scale {} {} --replicas={}", kind, name, replicas),
            Command::Delete { kind, name } => write!(f, "delete {} {}", kind, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_match_cluster_tool_syntax() {
        let sel = LabelSelector::single("app", "web");
        assert_eq!(Command::get(WorkloadKind::Deployment, "web").to_string(), "get deployment web");
        assert_eq!(Command::list_pods(&sel).to_string(), "get pods -l=app=web");
        assert_eq!(Command::scale(WorkloadKind::Deployment, "web", 5).to_string(), "scale deploy web --replicas=5");
        assert_eq!(Command::delete(WorkloadKind::Deployment, "web").to_string(), "delete deploy web");
    }

    #[test]
    fn display_is_canonical_for_parse() {
        let cmds = [
            Command::get(WorkloadKind::StatefulSet, "db"),
            Command::list_pods(&LabelSelector::single("app", "db")),
            Command::List { kind: "pods".into(), selector: String::new() },
            Command::scale(WorkloadKind::ReplicaSet, "rs-1", 0),
            Command::delete(WorkloadKind::Deployment, "web"),
        ];
        for c in cmds {
            assert_eq!(Command::parse(&c.to_string()), Ok(c.clone()), "{}", c);
        }
    }

    #[test]
    fn parses_alternate_flag_spellings() {
        assert_eq!(
            Command::parse("get pods -l app=web").unwrap(),
            Command::List { kind: "pods".into(), selector: "app=web".into() }
        );
        assert_eq!(
            Command::parse("get pods --selector=app=web,tier=fe").unwrap(),
            Command::List { kind: "pods".into(), selector: "app=web,tier=fe".into() }
        );
        assert_eq!(
            Command::parse("scale deploy/web --replicas 2").unwrap(),
            Command::Scale { kind: "deploy".into(), name: "web".into(), replicas: 2 }
        );
        assert_eq!(
            Command::parse("get deploy/web").unwrap(),
            Command::Get { kind: "deploy".into(), name: "web".into() }
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(Command::parse(""), Err(ExecError::Parse(_))));
        assert!(matches!(Command::parse("apply -f x.yaml"), Err(ExecError::Unsupported(_))));
        assert!(matches!(Command::parse("scale deploy web"), Err(ExecError::Parse(_))));
        assert!(matches!(Command::parse("scale deploy web --replicas=-1"), Err(ExecError::Parse(_))));
        assert!(matches!(Command::parse("delete deploy"), Err(ExecError::Parse(_))));
        assert!(matches!(Command::parse("get pods web -l=app=web"), Err(ExecError::Parse(_))));
    }

    #[test]
    fn only_get_is_a_read() {
        assert!(Command::parse("get deployment web").unwrap().is_read());
        assert!(!Command::parse("delete deploy web").unwrap().is_read());
    }
}
