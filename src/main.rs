//! ONTAP Reconciler
//!
//! Runs one module against an ONTAP controller and prints the result as a
//! single JSON document on stdout. Logs go to stderr.

use anyhow::Context;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ontap_reconciler::{
    AutosupportInvokeParams, AutosupportType, ConnectionConfig, IpspaceParams, ModuleOutput,
    ModuleParams, ModuleRunner, ObjectType, Result, RunReport, State, Task, TransportFactory,
    UseRest,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Idempotent management of NetApp ONTAP configuration objects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Report what would change without changing anything
    #[arg(long, env = "CHECK_MODE", global = true)]
    check_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Controller connection settings; each one overrides the task file
#[derive(ClapArgs, Debug)]
struct ConnectionArgs {
    /// Cluster management address
    #[arg(long, env = "NETAPP_HOSTNAME", global = true)]
    hostname: Option<String>,

    #[arg(long, env = "NETAPP_USERNAME", global = true)]
    username: Option<String>,

    #[arg(long, env = "NETAPP_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Connect over HTTPS
    #[arg(long, env = "NETAPP_HTTPS", global = true)]
    https: bool,

    /// Verify the controller certificate
    #[arg(long, env = "NETAPP_VALIDATE_CERTS", global = true, action = ArgAction::Set)]
    validate_certs: Option<bool>,

    #[arg(long, env = "NETAPP_HTTP_PORT", global = true)]
    http_port: Option<u16>,

    /// ZAPI minor version
    #[arg(long, env = "NETAPP_ONTAPI", global = true)]
    ontapi: Option<u32>,

    /// Backend selection
    #[arg(long, env = "NETAPP_USE_REST", global = true, value_enum)]
    use_rest: Option<UseRest>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "NETAPP_TIMEOUT", global = true)]
    timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    fn apply_to(&self, config: &mut ConnectionConfig) {
        if let Some(hostname) = &self.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if self.https {
            config.https = true;
        }
        if let Some(validate_certs) = self.validate_certs {
            config.validate_certs = validate_certs;
        }
        if self.http_port.is_some() {
            config.http_port = self.http_port;
        }
        if self.ontapi.is_some() {
            config.ontapi = self.ontapi;
        }
        if let Some(use_rest) = self.use_rest {
            config.use_rest = use_rest;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage an ipspace
    Ipspace {
        /// Name of the ipspace to manage
        #[arg(long)]
        name: String,

        /// Existing ipspace to rename to --name
        #[arg(long)]
        from_name: Option<String>,

        #[arg(long, value_enum, default_value_t = State::Present)]
        state: State,
    },

    /// Send an AutoSupport message
    AutosupportInvoke {
        /// Node to send from; all nodes when omitted
        #[arg(long)]
        name: Option<String>,

        /// Subject line of the message
        #[arg(long)]
        message: Option<String>,

        #[arg(long = "type", value_enum, default_value_t = AutosupportType::All)]
        kind: AutosupportType,

        /// Destination overriding the configured one
        #[arg(long)]
        uri: Option<String>,
    },

    /// Run a task file (YAML or JSON)
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the JSON schema of a module's arguments
    Schema {
        #[arg(value_enum)]
        module: ModuleName,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModuleName {
    Ipspace,
    AutosupportInvoke,
}

impl ModuleName {
    fn object_type(self) -> ObjectType {
        match self {
            ModuleName::Ipspace => ObjectType::Ipspace,
            ModuleName::AutosupportInvoke => ObjectType::AutosupportMessage,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    if let Command::Schema { module } = &args.command {
        let schema = ModuleParams::schema(module.object_type());
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let output = match build_task(&args) {
        Ok(task) => {
            info!(
                "Running {} against {} (check mode: {})",
                task.module.object_type().module_name(),
                task.connection.hostname,
                task.check_mode
            );
            ModuleOutput::from(execute(&task).await)
        }
        Err(e) => ModuleOutput::Failure {
            failed: true,
            msg: format!("{:#}", e),
            exception: None,
        },
    };

    println!("{}", serde_json::to_string(&output)?);
    if output.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

/// Merge the subcommand or task file with connection flags
fn build_task(args: &Args) -> anyhow::Result<Task> {
    let module = match &args.command {
        Command::Apply { file } => {
            let mut task = Task::from_file(file)
                .with_context(|| format!("failed to load task file {}", file.display()))?;
            args.connection.apply_to(&mut task.connection);
            task.check_mode |= args.check_mode;
            return Ok(task);
        }
        Command::Ipspace {
            name,
            from_name,
            state,
        } => ModuleParams::Ipspace(IpspaceParams {
            name: name.clone(),
            from_name: from_name.clone(),
            state: *state,
        }),
        Command::AutosupportInvoke {
            name,
            message,
            kind,
            uri,
        } => ModuleParams::AutosupportInvoke(AutosupportInvokeParams {
            name: name.clone(),
            message: message.clone(),
            kind: *kind,
            uri: uri.clone(),
        }),
        Command::Schema { .. } => anyhow::bail!("schema does not run a module"),
    };

    let mut connection = ConnectionConfig::default();
    args.connection.apply_to(&mut connection);
    Ok(Task {
        connection,
        check_mode: args.check_mode,
        module,
    })
}

/// Validate, connect and run
async fn execute(task: &Task) -> Result<RunReport> {
    let desired = task.module.desired_state()?;
    let connection = TransportFactory::connect(&task.connection).await?;
    ModuleRunner::new(connection, task.check_mode)
        .run(task.module.object_type(), &desired)
        .await
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
