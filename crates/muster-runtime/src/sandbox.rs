//! Sandbox resource translation and the daemon seam.
//!
//! `SandboxOptions` holds the caller-facing knobs in call units
//! (megabytes, millicores); `SandboxSpec::build` translates them into
//! the shape the container daemon consumes. The daemon client itself
//! implements `Sandbox`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::error::DriverResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const CPU_PERIOD_USEC: u64 = 100_000;

/// Caller-facing sandbox configuration, in call units.
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    pub image: String,
    /// Memory limit in MB; 0 means unlimited.
    pub memory_mb: u64,
    /// CPU limit in millicores; 0 means unlimited.
    pub cpu_millis: u64,
    /// Size of the /tmp tmpfs in MB; 0 means no size cap.
    pub tmpfs_mb: u64,
    /// Inode cap for the tmpfs; 0 means no cap.
    pub max_tmpfs_inodes: u64,
    /// Root filesystem size limit in MB; 0 means unlimited.
    pub fs_size_mb: u64,
    pub read_only_rootfs: bool,
    pub env: BTreeMap<String, String>,
    /// Whitespace-separated command override.
    pub command: String,
    pub hostname: Option<String>,
    pub network_mode: Option<String>,
    /// (host dir, container dir) pairs.
    pub volumes: Vec<(String, String)>,
    pub workdir: Option<String>,
}

/// Daemon-facing sandbox description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxSpec {
    pub image: String,
    pub memory_bytes: Option<u64>,
    /// Equal to the memory limit, which disables swap.
    pub memory_swap_bytes: Option<u64>,
    pub kernel_memory_bytes: Option<u64>,
    /// CFS quota in usec per period.
    pub cpu_quota_usec: Option<u64>,
    pub cpu_period_usec: Option<u64>,
    /// Mount target to tmpfs option string.
    pub tmpfs: BTreeMap<String, String>,
    pub storage_opt: BTreeMap<String, String>,
    pub read_only_rootfs: bool,
    /// Flattened `name=value` pairs, sorted by name.
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub hostname: Option<String>,
    pub network_mode: Option<String>,
    /// `host:container` bind strings.
    pub binds: Vec<String>,
    pub workdir: Option<String>,
}

impl SandboxSpec {
    pub fn build(opts: &SandboxOptions) -> Self {
        let mut spec = SandboxSpec {
            image: opts.image.clone(),
            read_only_rootfs: opts.read_only_rootfs,
            network_mode: opts.network_mode.clone(),
            workdir: opts.workdir.clone(),
            ..SandboxSpec::default()
        };

        if opts.memory_mb != 0 {
            let mem = opts.memory_mb * 1024 * 1024;
            spec.memory_bytes = Some(mem);
            // Swap capped at the memory limit disables it outright.
            spec.memory_swap_bytes = Some(mem);
            spec.kernel_memory_bytes = Some(mem);
        }

        // Millicores to CFS quota: 8000 millicores means a quota of
        // 8 * 100000 usec in a 100000 usec period, roughly 8 CPUs.
        if opts.cpu_millis != 0 {
            spec.cpu_quota_usec = Some(opts.cpu_millis * 100);
            spec.cpu_period_usec = Some(CPU_PERIOD_USEC);
        }

        // A read-only rootfs still needs a writable /tmp even when no
        // size cap was asked for.
        if opts.tmpfs_mb != 0 || opts.read_only_rootfs {
            let option = if opts.tmpfs_mb == 0 {
                String::new()
            } else if opts.max_tmpfs_inodes != 0 {
                format!("size={}m,nr_inodes={}", opts.tmpfs_mb, opts.max_tmpfs_inodes)
            } else {
                format!("size={}m", opts.tmpfs_mb)
            };
            debug!(target_dir = "/tmp", options = %option, "setting tmpfs");
            spec.tmpfs.insert("/tmp".to_string(), option);
        }

        if opts.fs_size_mb != 0 {
            spec.storage_opt
                .insert("size".to_string(), format!("{}M", opts.fs_size_mb));
        }

        spec.env = opts
            .env
            .iter()
            .map(|(name, val)| format!("{name}={val}"))
            .collect();

        if !opts.command.is_empty() {
            spec.cmd = opts
                .command
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }

        // Hostname and container network mode are incompatible.
        if spec.network_mode.is_none() {
            spec.hostname = opts.hostname.clone();
        }

        for (host, container) in &opts.volumes {
            spec.binds.push(format!("{host}:{container}"));
        }

        spec
    }
}

/// One provisioned sandbox.
///
/// `close` must be idempotent: callers run it on every teardown path
/// and a second close of an already-gone sandbox is not an error.
pub trait Sandbox: Send + Sync {
    fn create<'a>(&'a self, spec: &'a SandboxSpec) -> BoxFuture<'a, DriverResult<()>>;
    fn run<'a>(&'a self) -> BoxFuture<'a, DriverResult<()>>;
    fn freeze<'a>(&'a self) -> BoxFuture<'a, DriverResult<()>>;
    fn unfreeze<'a>(&'a self) -> BoxFuture<'a, DriverResult<()>>;
    fn close<'a>(&'a self) -> BoxFuture<'a, DriverResult<()>>;
}
