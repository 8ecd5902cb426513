use mcstat::{Conf, RequestType, ServerStatus, StatErr};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
mcstat - Minecraft server status checker

USAGE:
  mcstat [OPTIONS] <host[:port]>

OPTIONS:
  -h, --help              Prints help information
  -p, --port <port>       Server port (default: 25565)
  -t, --timeout <secs>    Timeout of each probe in seconds (default: 5)
  --protocol <name>       beta, legacy, extended, json or bedrock (default: try all)
  --json                  Print the full status as JSON
  -v, --verbose           Log probe attempts to stderr
";

#[derive(Debug)]
struct AppArgs {
    addr: String,
    port: Option<u16>,
    timeout: Option<u64>,
    request_type: RequestType,
    json: bool,
    verbose: bool,
}

fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let args = AppArgs {
        port: pargs.opt_value_from_str(["-p", "--port"])?,
        timeout: pargs.opt_value_from_str(["-t", "--timeout"])?,
        request_type: pargs
            .opt_value_from_str("--protocol")?
            .unwrap_or_default(),
        json: pargs.contains("--json"),
        verbose: pargs.contains(["-v", "--verbose"]),
        addr: pargs.free_from_str()?,
    };

    let remaining = pargs.finish();

    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}", remaining);
    }

    Ok(args)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "mcstat=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_conf(args: &AppArgs) -> Result<Conf, StatErr> {
    let conf = match (args.addr.contains(':'), args.port) {
        (true, _) => Conf::create_from_str(&args.addr)?,
        (false, Some(port)) => Conf::create_with_port(&args.addr, port)?,
        (false, None) => Conf::create(&args.addr),
    };
    let conf = match args.timeout {
        Some(secs) => conf.timeout_secs(secs)?,
        None => conf,
    };

    Ok(conf.request_type(args.request_type))
}

fn print_summary(conf: &Conf, status: &ServerStatus) {
    println!("Server: {}", conf);
    println!("Status: {}", status.connection_status);

    if !status.online {
        return;
    }

    println!("Version: {}", status.version.as_deref().unwrap_or_default());
    println!("MOTD: {}", status.motd.as_deref().unwrap_or_default());
    println!(
        "Players: {}/{}",
        status.current_players.as_deref().unwrap_or_default(),
        status.max_players.as_deref().unwrap_or_default()
    );

    if let Some(latency) = status.latency {
        println!("Latency: {}ms", latency);
    }

    if let Some(request_type) = status.request_type {
        println!("Protocol: {:?}", request_type);
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("Error: {}.", err);
            eprint!("{}", HELP);
            return ExitCode::from(2);
        }
    };

    init_logging(args.verbose);

    let conf = match build_conf(&args) {
        Ok(conf) => conf,
        Err(err) => {
            eprintln!("Error: {}.", err);
            return ExitCode::from(2);
        }
    };
    let status = conf.query();

    if args.json {
        println!("{}", status);
    } else {
        print_summary(&conf, &status);
    }

    if status.online {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
