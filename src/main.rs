use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use geo_weather::config::{parse_flag, DEFAULT_CITY_DB, DEFAULT_COOKIE_NAME};
use geo_weather::{Config, Geo};
use std::{
    convert::Infallible,
    io::{self, BufRead},
    path::PathBuf,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "geo-weather")]
#[command(about = "IP geolocation and weather-code lookups")]
struct Args {
    #[arg(long, env = "GEO_CITY_DB", default_value = DEFAULT_CITY_DB)]
    city_db: PathBuf,

    #[arg(long, env = "GEO_COUNTRY_DB")]
    country_db: Option<PathBuf>,

    /// Use the default weather code instead of `--` markers
    #[arg(long, env = "GEO_USE_DEFAULT", default_value = "true", action = ArgAction::Set, value_parser = flag_value)]
    use_default: bool,

    #[arg(long, env = "GEO_COOKIE_NAME", default_value = DEFAULT_COOKIE_NAME)]
    cookie_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the weather code for each address
    Weather { ips: Vec<String> },
    /// Print the English city name
    City { ip: String },
    /// Print the English country name
    Country { ip: String },
    /// Print one field, e.g. `subdivisions.0.iso_code`
    Get { ip: String, path: String },
    /// Print the full record as JSON
    Record { ip: String },
    /// Print the weather code carried by a raw Cookie header
    Cookie { header: String },
    /// Append proxy/satellite/coordinate records for addresses (stdin if none given)
    Dump {
        #[arg(long)]
        output: PathBuf,
        ips: Vec<String>,
    },
}

fn flag_value(value: &str) -> Result<bool, Infallible> {
    Ok(parse_flag(value))
}

impl Args {
    fn config(&self) -> Config {
        Config {
            city_db: self.city_db.clone(),
            country_db: self.country_db.clone(),
            use_default: self.use_default,
            cookie_name: self.cookie_name.clone(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let geo = Geo::open(&args.config());

    match args.command {
        Command::Weather { ips } => {
            for ip in &ips {
                println!("{}", geo.weather(ip));
            }
        }
        Command::City { ip } => match geo.city(&ip) {
            Some(name) => println!("{}", name),
            None => bail!("no city found for {}", ip),
        },
        Command::Country { ip } => match geo.country(&ip) {
            Some(name) => println!("{}", name),
            None => bail!("no country found for {}", ip),
        },
        Command::Get { ip, path } => {
            let segments: Vec<&str> = path.split('.').collect();
            match geo.field(&ip, &segments) {
                Some(value) => println!("{}", value),
                None => bail!("no value at {} for {}", path, ip),
            }
        }
        Command::Record { ip } => {
            let record = geo
                .record(&ip)
                .with_context(|| format!("lookup of {} failed", ip))?;
            match record {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("no entry for {}", ip),
            }
        }
        Command::Cookie { header } => match geo.weather_from_cookie(&header) {
            Some(code) => println!("{}", code),
            None => bail!("no {} cookie in header", args.cookie_name),
        },
        Command::Dump { output, ips } => {
            let ips = if ips.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .collect::<io::Result<Vec<_>>>()
                    .context("reading addresses from stdin")?
            } else {
                ips
            };

            let mut written = 0usize;
            for ip in ips.iter().map(|ip| ip.trim()).filter(|ip| !ip.is_empty()) {
                if geo.dump(ip, &output) {
                    written += 1;
                }
            }
            info!("Wrote {} of {} lookups to {:?}", written, ips.len(), output);
        }
    }

    geo.close();
    Ok(())
}
