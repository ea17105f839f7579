use clap::Parser;
use oracle::cli::{
    connect, devices, handle_completions, handle_config_init, load_config, session, settings,
    watch, Cli, Commands, ConfigCommands, ConsoleContext, DevicesCommands, GlobalArgs,
    SettingsCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
        command => run_networked(&cli.global, command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Commands that talk to the oracle server.
async fn run_networked(
    global: &GlobalArgs,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    oracle::logging::init_tracing(&config.logging)?;
    if !global.config.exists() {
        tracing::debug!(path = %global.config.display(), "Config file not found, using defaults");
    }
    let ctx = connect(global, config)?;

    if let Commands::Watch(args) = command {
        return watch::run_watch(&args, ctx).await;
    }

    let ConsoleContext { client, .. } = ctx;
    let output = match command {
        Commands::Devices(cmd) => match cmd {
            DevicesCommands::List(args) => devices::handle_devices_list(&args, &client).await?,
            DevicesCommands::Add(args) => devices::handle_devices_add(&args, &client).await?,
            DevicesCommands::Remove(args) => devices::handle_devices_remove(&args, &client).await?,
        },
        Commands::Settings(cmd) => match cmd {
            SettingsCommands::Show(args) => settings::handle_settings_show(&args, &client).await?,
            SettingsCommands::Set(args) => settings::handle_settings_set(&args, &client).await?,
        },
        Commands::Login(args) => session::handle_login(&args, &client).await?,
        Commands::Logout => session::handle_logout(&client).await?,
        Commands::Watch(_) | Commands::Config(_) | Commands::Completions(_) => return Ok(()),
    };

    println!("{}", output);
    Ok(())
}
