//! Server configuration: defaults, overridden by environment variables, overridden
//! by command-line flags.

use std::path::PathBuf;

use crate::security::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB};

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const USAGE: &str = "coursegate\n\nUSAGE:\n  coursegate [--host ADDR] [--http-port N] [--data-dir PATH] [--hash-memory-kib N] [--hash-iterations N] [--seed-demo|--no-seed-demo]\n\nOPTIONS:\n  --host ADDR            Bind address (env: COURSEGATE_HOST, default 0.0.0.0)\n  --http-port N          HTTP API port (env: COURSEGATE_HTTP_PORT, default 5000)\n  --data-dir PATH        Persist accounts and courses as JSON under PATH (env: COURSEGATE_DATA_DIR; unset keeps data in memory)\n  --hash-memory-kib N    Argon2 memory cost for new password hashes (env: COURSEGATE_HASH_MEMORY_KIB, default 19456)\n  --hash-iterations N    Argon2 time cost for new password hashes (env: COURSEGATE_HASH_ITERATIONS, default 2)\n  --seed-demo            Create a demo account and courses when the store is empty (env: COURSEGATE_SEED_DEMO)\n  --no-seed-demo         Disable demo seeding explicitly.\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub data_dir: Option<PathBuf>,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            data_dir: None,
            hash_memory_kib: DEFAULT_MEMORY_KIB,
            hash_iterations: DEFAULT_ITERATIONS,
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    /// Read the process environment and arguments.
    pub fn from_env_and_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |name| std::env::var(name).ok())
    }

    pub fn from_sources<F>(args: &[String], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let host = arg_value(args, "--host")
            .or_else(|| env("COURSEGATE_HOST"))
            .unwrap_or(d.host);
        let http_port = arg_value(args, "--http-port").and_then(|v| v.parse().ok())
            .or_else(|| env("COURSEGATE_HTTP_PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(d.http_port);
        let data_dir = arg_value(args, "--data-dir")
            .or_else(|| env("COURSEGATE_DATA_DIR"))
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let hash_memory_kib = arg_value(args, "--hash-memory-kib").and_then(|v| v.parse().ok())
            .or_else(|| env("COURSEGATE_HASH_MEMORY_KIB").and_then(|v| v.parse().ok()))
            .unwrap_or(d.hash_memory_kib);
        let hash_iterations = arg_value(args, "--hash-iterations").and_then(|v| v.parse().ok())
            .or_else(|| env("COURSEGATE_HASH_ITERATIONS").and_then(|v| v.parse().ok()))
            .unwrap_or(d.hash_iterations);
        let seed_demo = parse_seed_arg(args)
            .or_else(|| env("COURSEGATE_SEED_DEMO").as_deref().and_then(parse_bool))
            .unwrap_or(d.seed_demo);
        Self { host, http_port, data_dir, hash_memory_kib, hash_iterations, seed_demo }
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.http_port) }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_seed_arg(args: &[String]) -> Option<bool> {
    if has_flag(args, "--no-seed-demo") { return Some(false); }
    if has_flag(args, "--seed-demo") { return Some(true); }
    None
}
