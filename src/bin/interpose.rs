//! interpose: inspect settings and run a proxied call end to end
//!
//! Usage:
//!   interpose                        → print the effective settings as TOML
//!   interpose --dump-config          → print the default settings
//!   interpose demo --name world      → proxy a greeter and call it

use anyhow::Context;
use clap::{Parser, Subcommand};
use interpose::advice::Advice;
use interpose::proxy::{AopUtils, ProxyFactory};
use interpose::{builtin, ClosureObject, Settings, TypeBuilder, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "interpose",
    about = "Interception and dynamic dispatch",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file
    #[arg(short, long, global = true, default_value = Settings::FILE_NAME)]
    config: PathBuf,

    /// Print the default settings and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a proxy over a sample greeter and call it
    Demo {
        /// Name passed to greet
        #[arg(short, long, default_value = "world")]
        name: String,

        /// Number of calls
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "interpose=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if cli.dump_config {
        print!("{}", Settings::default().to_toml());
        return Ok(());
    }

    let settings = Settings::load(&cli.config);
    match cli.command {
        Some(Commands::Demo { name, repeat }) => demo(&settings, &name, repeat)?,
        None => print!("{}", settings.to_toml()),
    }
    Ok(())
}

fn demo(settings: &Settings, name: &str, repeat: usize) -> anyhow::Result<()> {
    let string = builtin::string();
    let greeter = TypeBuilder::interface("Greeter")
        .operation(interpose::Operation::new("greet").param(&string).returns(&string))
        .build();
    let impl_type = TypeBuilder::class("ConsoleGreeter").implements(&greeter).build();
    let target = ClosureObject::builder(&impl_type)
        .on("greet", |_, args| {
            let who = args.first().and_then(Value::as_str).unwrap_or("nobody");
            Ok(Value::str(format!("hello, {who}")))
        })
        .build();

    let factory = ProxyFactory::for_target(target);
    factory.add_advice(Advice::before(|op, args, _| {
        tracing::info!(operation = %op.name(), args = args.len(), "before");
        Ok(())
    }))?;
    settings.apply(&factory).context("applying settings")?;
    for line in settings.summary() {
        tracing::info!("{}", line);
    }

    let proxy = factory.get_proxy()?;
    let greet = proxy
        .type_ref()
        .find_operation("greet")
        .context("proxy does not expose greet")?;
    for _ in 0..repeat {
        let reply = proxy.clone().invoke(&greet, vec![Value::str(name)])?;
        println!("{}", reply.as_str().unwrap_or_default());
    }

    if let Some(config) = AopUtils::advised(&proxy) {
        println!("{}", config.describe());
    }
    Ok(())
}
