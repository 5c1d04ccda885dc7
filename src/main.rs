/*!
 * Permission Tree - Script Replay
 *
 * Reads JSON-lines operations from a file (or stdin), applies them to an
 * in-memory access control registry driven by a manual clock, and prints
 * one JSON result per operation:
 *
 * ```text
 * {"op":"grant","caller":"0x..01","resource":1,"owner":"0x..01","path":["g"],"principal":"0x..02","expiration":100}
 * {"op":"check","resource":1,"owner":"0x..01","path":["g","x"],"principal":"0x..02","at":50}
 * {"op":"embed","path":["g"],"fragment":"{\"k\":1}"}
 * ```
 */

use anyhow::Context;
use permission_tree::core::errors::{render_diagnostic, SerializableError};
use permission_tree::monitoring::span_operation;
use permission_tree::{
    init_tracing, AccessControl, AccessMode, Clock, DocumentBuilder, EngineConfig, ManualClock,
    Principal, ResourceId, Timestamp,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use tracing::{info, warn};

/// One replayable operation
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Operation {
    SetTime {
        now: Timestamp,
    },
    Advance {
        seconds: u64,
    },
    Grant {
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
        principal: Principal,
        expiration: Timestamp,
        #[serde(default)]
        mode: AccessMode,
    },
    Revoke {
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
        principal: Principal,
        #[serde(default)]
        mode: AccessMode,
    },
    Reset {
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
    },
    Expire {
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
    },
    Check {
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
        principal: Principal,
        /// Defaults to the replay clock
        at: Option<Timestamp>,
    },
    Entries {
        resource: ResourceId,
        owner: Principal,
        #[serde(default)]
        path: Vec<String>,
    },
    Embed {
        #[serde(default)]
        path: Vec<String>,
        fragment: String,
        #[serde(default)]
        strict: bool,
    },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::SetTime { .. } => "set_time",
            Operation::Advance { .. } => "advance",
            Operation::Grant { .. } => "grant",
            Operation::Revoke { .. } => "revoke",
            Operation::Reset { .. } => "reset",
            Operation::Expire { .. } => "expire",
            Operation::Check { .. } => "check",
            Operation::Entries { .. } => "entries",
            Operation::Embed { .. } => "embed",
        }
    }
}

struct Replay {
    acl: AccessControl<Arc<ManualClock>>,
    clock: Arc<ManualClock>,
    documents: DocumentBuilder,
}

impl Replay {
    fn new(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        Self {
            acl: AccessControl::with_clock_and_config(clock.clone(), config.clone()),
            clock,
            documents: DocumentBuilder::new(&config),
        }
    }

    fn execute(&self, operation: Operation) -> permission_tree::core::Result<Value> {
        let result = match operation {
            Operation::SetTime { now } => {
                self.clock.set(now);
                json!({ "now": now })
            }
            Operation::Advance { seconds } => json!({ "now": self.clock.advance(seconds) }),
            Operation::Grant {
                caller,
                resource,
                owner,
                path,
                principal,
                expiration,
                mode,
            } => {
                self.acl.grant(
                    caller,
                    resource,
                    owner,
                    &segments(&path),
                    principal,
                    expiration,
                    mode,
                )?;
                Value::Null
            }
            Operation::Revoke {
                caller,
                resource,
                owner,
                path,
                principal,
                mode,
            } => {
                self.acl
                    .revoke(caller, resource, owner, &segments(&path), principal, mode)?;
                Value::Null
            }
            Operation::Reset {
                caller,
                resource,
                owner,
                path,
            } => {
                self.acl
                    .reset_subtree(caller, resource, owner, &segments(&path))?;
                Value::Null
            }
            Operation::Expire {
                resource,
                owner,
                path,
            } => {
                let removed = self.acl.expire_subtree(resource, owner, &segments(&path))?;
                json!({ "removed": removed })
            }
            Operation::Check {
                resource,
                owner,
                path,
                principal,
                at,
            } => {
                let at = at.unwrap_or_else(|| self.clock.now());
                let allowed = self
                    .acl
                    .has_access(resource, owner, &segments(&path), principal, at)?;
                json!({ "allowed": allowed, "at": at })
            }
            Operation::Entries {
                resource,
                owner,
                path,
            } => {
                let path = segments(&path);
                json!({
                    "exists": self.acl.node_exists(resource, owner, &path),
                    "children": self.acl.child_keys(resource, owner, &path),
                    "full": self.acl.full_access_principals(resource, owner, &path),
                    "fallback": self.acl.fallback_access_principals(resource, owner, &path),
                })
            }
            Operation::Embed {
                path,
                fragment,
                strict,
            } => {
                let path = segments(&path);
                let document = if strict {
                    self.documents.at_path_strict(&path, &fragment)?
                } else {
                    self.documents.at_path(&path, &fragment)?
                };
                json!({ "document": document })
            }
        };
        Ok(result)
    }
}

fn segments(path: &[String]) -> Vec<&str> {
    path.iter().map(String::as_str).collect()
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", render_diagnostic(e));
            anyhow::bail!("Failed to load engine configuration");
        }
    };
    info!(?config, "Permission tree replay starting");

    let input: Box<dyn BufRead> = match std::env::args().nth(1) {
        Some(path) if path != "-" => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("Failed to open script {}", path))?,
        )),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let replay = Replay::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0u64;

    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read script")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_no = index as u64 + 1;

        let response = match serde_json::from_str::<Operation>(trimmed) {
            Ok(operation) => {
                let name = operation.name();
                let span = span_operation(name, line_no);
                let result = span.span().in_scope(|| replay.execute(operation));
                span.finish(result.is_ok());
                match result {
                    Ok(value) => json!({ "line": line_no, "op": name, "ok": true, "result": value }),
                    Err(e) => {
                        failures += 1;
                        json!({
                            "line": line_no,
                            "op": name,
                            "ok": false,
                            "error": SerializableError::from(e),
                        })
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(line = line_no, error = %e, "Unparseable operation");
                json!({
                    "line": line_no,
                    "ok": false,
                    "error": SerializableError::new("parse_error", e.to_string()),
                })
            }
        };
        writeln!(out, "{}", response)?;
    }

    let stats = replay.acl.audit().stats();
    info!(
        events = stats.total_recorded,
        denials = stats.total_denials,
        trees = replay.acl.tree_count(),
        failures,
        "Replay finished"
    );
    Ok(())
}
