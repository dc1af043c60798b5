//! Command line and environment configuration.

use cardbridge_core::MacAddress;
use cardbridge_core::constants::DEFAULT_NAME_PREFIX;
use clap::Parser;

/// Build-time broker URL fallback.
///
/// Set with `CARDBRIDGE_DEFAULT_BROKER_URL=tcp://host:port cargo build`.
pub const BUILD_DEFAULT_BROKER_URL: Option<&str> = option_env!("CARDBRIDGE_DEFAULT_BROKER_URL");

#[derive(Debug, Parser)]
#[command(name = "cardbridge")]
#[command(about = "Relay an ACR1555U BLE card reader to a remote peer through a relay broker")]
#[command(version)]
pub struct Args {
    /// MAC address or BLE name of the reader. Leave empty to connect to the
    /// first reader whose name starts with ACR1555U, or pass * to only log
    /// what is advertised
    #[arg(long, default_value = "")]
    pub name: String,

    /// Connect to the SAM slot instead of the contactless (PICC) slot
    #[arg(long)]
    pub sam: bool,

    /// Relay broker URL, tcp://host:port
    #[arg(long, env = "BROKER_URL")]
    pub broker_url: Option<String>,

    /// Index of the host Bluetooth adapter to scan with
    #[arg(long, default_value_t = 0)]
    pub adapter: usize,

    /// Run against an emulated radio and reader instead of the host adapter
    #[arg(long)]
    pub emulate: bool,

    /// Advertised name of the emulated reader
    #[arg(long, env = "CARDBRIDGE_EMULATE_NAME", default_value = "ACR1555U-J1-EMULATED")]
    pub emulate_name: String,

    /// Address of the emulated reader
    #[arg(long, env = "CARDBRIDGE_EMULATE_ADDRESS", default_value = "D4:3A:2C:00:15:55")]
    pub emulate_address: MacAddress,

    /// Signal strength reported for the emulated reader, in dBm
    #[arg(long, default_value_t = -55, allow_hyphen_values = true)]
    pub emulate_rssi: i16,
}

/// First non-empty value of the flag (or `BROKER_URL`) and the build default.
///
/// An empty `BROKER_URL` reaches clap as `Some("")`, so it falls through here.
pub fn resolve_broker_url(configured: Option<&str>, build_default: Option<&str>) -> Option<String> {
    [configured, build_default]
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Hardware the bridge drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Host Bluetooth adapter at this index.
    Host { adapter_index: usize },
    /// Emulated radio advertising one reader, and an emulated reader.
    Emulated(Emulation),
}

impl Backend {
    pub fn from_args(args: &Args) -> Self {
        if args.emulate {
            Self::Emulated(Emulation::from_args(args))
        } else {
            Self::Host {
                adapter_index: args.adapter,
            }
        }
    }
}

/// Peripheral advertised by the emulated radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emulation {
    pub name: String,
    pub address: MacAddress,
    pub rssi: i16,
}

impl Emulation {
    pub fn from_args(args: &Args) -> Self {
        Self {
            name: args.emulate_name.clone(),
            address: args.emulate_address,
            rssi: args.emulate_rssi,
        }
    }

    /// Whether the emulated reader has the name a default scan looks for.
    pub fn has_default_name(&self) -> bool {
        self.name.starts_with(DEFAULT_NAME_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbridge_core::constants::BROKER_URL_ENV;
    use clap::CommandFactory;
    use rstest::rstest;
    use std::ffi::OsStr;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_broker_url_reads_env_through_clap() {
        let command = Args::command();
        let broker_url = command
            .get_arguments()
            .find(|arg| arg.get_id() == "broker_url")
            .unwrap();

        assert_eq!(broker_url.get_env(), Some(OsStr::new(BROKER_URL_ENV)));
    }

    #[rstest]
    #[case(Some("tcp://flag:1"), Some("tcp://build:1"), Some("tcp://flag:1"))]
    #[case(Some(""), Some("tcp://build:1"), Some("tcp://build:1"))]
    #[case(None, Some("tcp://build:1"), Some("tcp://build:1"))]
    #[case(Some(""), Some(""), None)]
    #[case(None, None, None)]
    fn test_broker_url_resolution(
        #[case] configured: Option<&str>,
        #[case] build: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(resolve_broker_url(configured, build).as_deref(), expected);
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["cardbridge"]);
        assert_eq!(args.name, "");
        assert!(!args.sam);
        assert_eq!(
            Backend::from_args(&args),
            Backend::Host { adapter_index: 0 }
        );

        let emulation = Emulation::from_args(&args);
        assert!(emulation.has_default_name());
        assert_eq!(emulation.rssi, -55);
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::parse_from([
            "cardbridge",
            "--name",
            "d4-3a-2c-00-15-55",
            "--sam",
            "--broker-url",
            "tcp://127.0.0.1:1883",
            "--emulate-rssi",
            "-70",
        ]);
        assert_eq!(args.name, "d4-3a-2c-00-15-55");
        assert!(args.sam);
        assert_eq!(args.broker_url.as_deref(), Some("tcp://127.0.0.1:1883"));
        assert_eq!(args.emulate_rssi, -70);
    }

    #[test]
    fn test_emulation_is_opt_in() {
        let args = Args::parse_from(["cardbridge", "--emulate", "--emulate-name", "ACR1555U-bench"]);

        match Backend::from_args(&args) {
            Backend::Emulated(emulation) => assert_eq!(emulation.name, "ACR1555U-bench"),
            other => panic!("expected emulation, got {other:?}"),
        }
    }

    #[test]
    fn test_adapter_index_selects_host_radio() {
        let args = Args::parse_from(["cardbridge", "--adapter", "1"]);
        assert_eq!(
            Backend::from_args(&args),
            Backend::Host { adapter_index: 1 }
        );
    }

    #[test]
    fn test_invalid_emulate_address_is_rejected() {
        let result = Args::try_parse_from(["cardbridge", "--emulate-address", "D4:3A"]);
        assert!(result.is_err());
    }
}
