//! lvdac CLI Client
//!
//! Command-line interface for the beamline command server.

use clap::{Parser, Subcommand, ValueEnum};
use lvdac::protocol::{Array2, ResponseData};
use lvdac::{Client, CommandName, Config, Param};
use tracing_subscriber::{fmt, EnvFilter};

/// lvdac CLI
#[derive(Parser, Debug)]
#[command(name = "lvdac-cli")]
#[command(about = "CLI for the LabVIEW beamline command server")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = lvdac::config::DEFAULT_PORT)]
    port: u16,

    /// Refuse commands that move or reconfigure hardware
    #[arg(long)]
    read_only: bool,

    /// Per-read timeout in milliseconds (0 = wait forever)
    #[arg(long, default_value = "30000")]
    read_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DeviceKind {
    Motors,
    Instruments,
    Ais,
    Dios,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List devices of one kind
    List {
        #[arg(value_enum)]
        kind: DeviceKind,
    },

    /// List every device
    Inventory,

    /// Read a motor position
    MotorPos {
        /// Motor name
        motor: String,
    },

    /// Move a motor to an absolute position
    MoveMotor {
        /// Motor name
        motor: String,

        /// Target position
        position: f64,
    },

    /// Stop a motor
    StopMotor {
        /// Motor name
        motor: String,
    },

    /// Read a motor's soft limits
    SoftLimits {
        /// Motor name
        motor: String,
    },

    /// Read an analog input
    Freerun {
        /// Analog input name
        input: String,
    },

    /// Fetch the last 2-D acquisition of an instrument
    Acquire {
        /// Instrument name
        instrument: String,
    },

    /// Send any command by name
    Raw {
        /// Command name, e.g. GetMotorPos
        name: String,

        /// Parameters
        params: Vec<String>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lvdac=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("lvdac CLI v{}", lvdac::VERSION);

    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .read_only(args.read_only)
        .read_timeout_ms(args.read_timeout_ms)
        .build();
    let client = Client::new(config);

    if let Err(e) = run(&client, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(client: &Client, command: Commands) -> lvdac::Result<()> {
    match command {
        Commands::List { kind } => {
            let names = match kind {
                DeviceKind::Motors => client.list_motors()?,
                DeviceKind::Instruments => client.list_instruments()?,
                DeviceKind::Ais => client.list_analog_inputs()?,
                DeviceKind::Dios => client.list_digital_io()?,
            };
            names.iter().for_each(|name| println!("{}", name));
        }
        Commands::Inventory => {
            let inventory = client.inventory()?;
            print_group("motors", &inventory.motors);
            print_group("instruments", &inventory.instruments);
            print_group("analog inputs", &inventory.analog_inputs);
            print_group("digital io", &inventory.digital_io);
        }
        Commands::MotorPos { motor } => println!("{}", client.get_motor_pos(&motor)?),
        Commands::MoveMotor { motor, position } => {
            println!("{}", client.move_motor(&motor, position)?)
        }
        Commands::StopMotor { motor } => println!("{}", client.stop_motor(&motor)?),
        Commands::SoftLimits { motor } => {
            let (low, high) = client.get_soft_limits(&motor)?;
            println!("{} {}", low, high);
        }
        Commands::Freerun { input } => println!("{}", client.get_freerun(&input)?),
        Commands::Acquire { instrument } => {
            print_array(&client.get_instrument_acquired_2d(&instrument)?)
        }
        Commands::Raw { name, params } => {
            let name: CommandName = name.parse()?;
            let params = params.iter().map(|p| Param::parse(p)).collect();
            let response = client.send_raw(name, params)?;
            print_data(response.data());
        }
    }
    Ok(())
}

fn print_group(title: &str, names: &[String]) {
    println!("{} ({}):", title, names.len());
    names.iter().for_each(|name| println!("  {}", name));
}

fn print_array(array: &Array2) {
    println!("{} x {}", array.rows(), array.cols());
    for row in array.to_nested() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", line.join("\t"));
    }
}

fn print_data(data: &ResponseData) {
    match data {
        ResponseData::Bool(b) => println!("{}", b),
        ResponseData::Number(n) => println!("{}", n),
        ResponseData::Numbers(values) => {
            let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("{}", line.join(" "));
        }
        ResponseData::List(items) => items.iter().for_each(|item| println!("{}", item)),
        ResponseData::Fields { value, rest } => println!("{} {}", value, rest.join(" ")),
        ResponseData::Array(array) => print_array(array),
        ResponseData::Text(s) => println!("{}", s),
        ResponseData::Raw(bytes) => println!("{:?}", bytes),
    }
}
