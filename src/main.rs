use std::{
    net::SocketAddr,
    time::Duration,
};

use chrono::Utc;
use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::Error;
use tokio::{
    net::UdpSocket,
    signal,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use windsock::{
    config::{
        Config,
        DEFAULT_MAX_PACKET_SIZE,
        DEFAULT_UDP_PORT,
        DecoderConfig,
    },
    event::EVENT_QUEUE_SIZE,
    frame::{
        self,
        Frame,
        modbus::{
            ChecksumKind,
            RegisterOrder,
        },
        zqwl,
    },
    server::UdpServer,
    tracker::{
        LivenessMonitor,
        Tracker,
        format_status_report,
    },
    types::RawRegisters,
    units::{
        Beaufort,
        WindMeasurement,
    },
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Serve(args) => serve(args).await?,
        Command::Decode(args) => decode(args)?,
        Command::Simulate(args) => simulate(args).await?,
    }

    Ok(())
}

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Receive sensor datagrams and log decoded events as JSON lines.
    Serve(ServeArgs),

    /// Decode one packet given as hex and print the result.
    Decode(DecodeArgs),

    /// Send synthetic sensor traffic to a running receiver.
    Simulate(SimulateArgs),
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// UDP port to listen on.
    #[clap(short, long, env = "WINDSOCK_PORT", default_value_t = DEFAULT_UDP_PORT)]
    port: u16,

    /// Silence after which a device is flipped offline.
    #[clap(long, default_value = "60s", value_parser = humantime::parse_duration)]
    offline_threshold: Duration,

    /// How often the liveness sweep runs.
    #[clap(long, default_value = "10s", value_parser = humantime::parse_duration)]
    sweep_interval: Duration,

    #[clap(flatten)]
    decoder: DecoderArgs,
}

#[derive(Debug, clap::Args)]
struct DecodeArgs {
    /// Packet bytes as hex.
    hex: String,

    #[clap(flatten)]
    decoder: DecoderArgs,
}

#[derive(Debug, clap::Args)]
struct SimulateArgs {
    /// Receiver to send to.
    #[clap(short, long, default_value = "127.0.0.1:8888")]
    address: SocketAddr,

    /// Number of report frames to send.
    #[clap(short, long, default_value_t = 10)]
    count: usize,

    /// Delay between frames.
    #[clap(long, default_value = "1s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Wrap every other report in the vendor frame.
    #[clap(long)]
    vendor: bool,

    #[clap(flatten)]
    decoder: DecoderArgs,
}

#[derive(Debug, clap::Args)]
struct DecoderArgs {
    /// Expected address byte of the binary report frame.
    #[clap(long, default_value = "0x80", value_parser = parse_byte)]
    device_address: u8,

    /// Checksum algorithm of the report frame trailer.
    #[clap(long, value_enum, default_value = "crc16-modbus")]
    checksum: ChecksumKind,

    /// Byte order of the register payload.
    #[clap(long, value_enum, default_value = "big")]
    register_order: RegisterOrder,

    /// Drop datagrams longer than this.
    #[clap(long, default_value_t = DEFAULT_MAX_PACKET_SIZE)]
    max_packet_size: usize,
}

impl From<DecoderArgs> for DecoderConfig {
    fn from(args: DecoderArgs) -> Self {
        Self {
            device_address: args.device_address,
            max_packet_size: args.max_packet_size,
            checksum: args.checksum,
            register_order: args.register_order,
        }
    }
}

fn parse_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    if let Some(hex_digits) = s.strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)
    }
    else {
        s.parse()
    }
}

async fn serve(args: ServeArgs) -> Result<(), Error> {
    let config = Config {
        udp_port: args.port,
        offline_threshold: args.offline_threshold,
        sweep_interval: args.sweep_interval,
        decoder: args.decoder.into(),
    };

    let tracker = Tracker::new();
    let (event_sender, mut event_receiver) = mpsc::channel(EVENT_QUEUE_SIZE);
    let shutdown = CancellationToken::new();

    let server = UdpServer::bind(config.clone(), tracker.clone(), event_sender.clone())
        .await?
        .with_shutdown(shutdown.clone());
    let monitor =
        LivenessMonitor::new(tracker.clone(), event_sender, &config).with_shutdown(shutdown.clone());

    let server_task = tokio::spawn(server.serve());
    let monitor_task = tokio::spawn(monitor.run());
    let event_task = tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(error) => tracing::error!(?error, "failed to serialize event"),
            }
        }
    });

    signal::ctrl_c().await?;
    tracing::info!("shutting down");
    shutdown.cancel();

    server_task.await??;
    monitor_task.await?;
    event_task.await?;

    println!("{}", format_status_report(&tracker.snapshot(), Utc::now()));

    Ok(())
}

fn decode(args: DecodeArgs) -> Result<(), Error> {
    let data = hex::decode(args.hex.trim())?;

    match frame::decode(&data, &args.decoder.into()) {
        Ok(Frame::WindReading { registers }) => {
            println!("{registers:#?}");
            println!("{:#?}", WindMeasurement::from_registers(&registers));
        }
        Ok(frame) => println!("{frame:#?}"),
        Err(error) => println!("decode failed: {error}"),
    }

    Ok(())
}

async fn simulate(args: SimulateArgs) -> Result<(), Error> {
    let decoder: DecoderConfig = args.decoder.into();
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    socket
        .send_to(b"device_info windsock-simulator", args.address)
        .await?;

    for i in 0..args.count {
        let speed = (i % 64) as u16 * 10;
        let registers = RawRegisters {
            speed,
            level: u16::from(Beaufort::from_speed_ms(f64::from(speed) / 10.0).level()),
            angle: (i % 16) as u16 * 225,
            code: (i % 16) as u16,
        };

        let datagram = if args.vendor && i % 2 == 1 {
            zqwl::encode(&registers, decoder.device_address, decoder.register_order)
        }
        else {
            frame::modbus::encode(&registers, &decoder)
        };

        socket.send_to(&datagram, args.address).await?;
        tracing::info!(
            speed_ms = f64::from(registers.speed) / 10.0,
            angle = f64::from(registers.angle) / 10.0,
            "sent report"
        );

        tokio::time::sleep(args.interval).await;
    }

    socket.send_to(b"heartbeat", args.address).await?;

    Ok(())
}
