//! Router configuration

use std::time::Duration;

use super::error::ConfigError;
use super::variant::Variant;

/// Usage line for the command-line front end
pub const USAGE: &str = "usage: daq-router <collector|proxy-collector|final-collector|final-collector-roi|output-adapter> \
--input ADDR --output ADDR [--roi ADDR] [--signals ADDR] [--lax] [--length-prefix] \
[--stop-wait-ms N] [--max-wait-ms N] [--drain-timeout-ms N] [--stats-interval-ms N] [--capacity N]";

/// Router configuration options
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Which router to run
    pub variant: Variant,

    /// Upstream endpoint (`tcp://*:PORT` binds, `tcp://HOST:PORT` connects)
    pub input_address: String,

    /// Downstream endpoint; the data sink for raw variants
    pub output_address: String,

    /// ROI sink, final-collector-roi only
    pub roi_address: Option<String>,

    /// Control-signal publisher
    pub signal_address: Option<String>,

    /// Drop events when no worker is ready instead of holding them
    pub lax: bool,

    /// Idle time after an end-of-run signal before the backlog is flushed
    pub stop_wait: Duration,

    /// Prefix every raw record with its length (u32, big endian)
    pub add_length_prefix: bool,

    /// Upper bound on a single input poll
    pub max_poll_wait: Duration,

    /// Upper bound on delivering held and queued output at shutdown
    pub drain_timeout: Duration,

    /// Stats log interval
    pub stats_interval: Duration,

    /// Queue depth between the router and each transport task
    pub link_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Collector,
            input_address: "tcp://*:5555".to_string(),
            output_address: "tcp://*:5556".to_string(),
            roi_address: None,
            signal_address: None,
            lax: false,
            stop_wait: Duration::from_millis(2000),
            add_length_prefix: false,
            max_poll_wait: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(5),
            stats_interval: Duration::from_secs(5),
            link_capacity: 1024,
        }
    }
}

impl RouterConfig {
    /// Create a config for a variant with default settings
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            ..Default::default()
        }
    }

    /// Set the input address
    pub fn input(mut self, address: impl Into<String>) -> Self {
        self.input_address = address.into();
        self
    }

    /// Set the output (data) address
    pub fn output(mut self, address: impl Into<String>) -> Self {
        self.output_address = address.into();
        self
    }

    /// Set the ROI sink address
    pub fn roi(mut self, address: impl Into<String>) -> Self {
        self.roi_address = Some(address.into());
        self
    }

    /// Set the control-signal address
    pub fn signals(mut self, address: impl Into<String>) -> Self {
        self.signal_address = Some(address.into());
        self
    }

    /// Enable or disable lax delivery
    pub fn lax(mut self, lax: bool) -> Self {
        self.lax = lax;
        self
    }

    /// Set the end-of-run idle wait
    pub fn stop_wait(mut self, wait: Duration) -> Self {
        self.stop_wait = wait;
        self
    }

    /// Enable or disable the raw length prefix
    pub fn length_prefix(mut self, enabled: bool) -> Self {
        self.add_length_prefix = enabled;
        self
    }

    /// Set the maximum input poll wait
    pub fn max_poll_wait(mut self, wait: Duration) -> Self {
        self.max_poll_wait = wait;
        self
    }

    /// Set the shutdown drain bound
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set the link queue depth
    pub fn link_capacity(mut self, capacity: usize) -> Self {
        self.link_capacity = capacity;
        self
    }

    /// Check option combinations against the variant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variant.has_roi_output() && self.roi_address.is_none() {
            return Err(ConfigError::MissingValue("--roi"));
        }
        if !self.variant.has_roi_output() && self.roi_address.is_some() {
            return Err(not_applicable("--roi", self.variant));
        }
        if self.lax && !self.variant.accepts_lax() {
            return Err(not_applicable("--lax", self.variant));
        }
        if self.add_length_prefix && !self.variant.has_raw_output() {
            return Err(not_applicable("--length-prefix", self.variant));
        }
        if self.link_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "--capacity",
                value: "0".to_string(),
            });
        }
        if self.max_poll_wait.is_zero() {
            return Err(ConfigError::InvalidValue {
                flag: "--max-wait-ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Parse command-line arguments (without the program name)
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::<String>::into);

        let variant: Variant = args.next().ok_or(ConfigError::MissingVariant)?.parse()?;
        let mut config = RouterConfig::new(variant);
        let mut input = None;
        let mut output = None;

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--input" => input = Some(value(&mut args, "--input")?),
                "--output" => output = Some(value(&mut args, "--output")?),
                "--roi" => config.roi_address = Some(value(&mut args, "--roi")?),
                "--signals" => config.signal_address = Some(value(&mut args, "--signals")?),
                "--lax" => config.lax = true,
                "--length-prefix" => config.add_length_prefix = true,
                "--stop-wait-ms" => {
                    config.stop_wait = Duration::from_millis(number(&mut args, "--stop-wait-ms")?)
                }
                "--max-wait-ms" => {
                    config.max_poll_wait = Duration::from_millis(number(&mut args, "--max-wait-ms")?)
                }
                "--drain-timeout-ms" => {
                    config.drain_timeout =
                        Duration::from_millis(number(&mut args, "--drain-timeout-ms")?)
                }
                "--stats-interval-ms" => {
                    config.stats_interval =
                        Duration::from_millis(number(&mut args, "--stats-interval-ms")?)
                }
                "--capacity" => config.link_capacity = number(&mut args, "--capacity")? as usize,
                _ => return Err(ConfigError::UnknownFlag(flag)),
            }
        }

        config.input_address = input.ok_or(ConfigError::MissingValue("--input"))?;
        config.output_address = output.ok_or(ConfigError::MissingValue("--output"))?;
        config.validate()?;
        Ok(config)
    }
}

fn not_applicable(flag: &'static str, variant: Variant) -> ConfigError {
    ConfigError::NotApplicable { flag, variant }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(flag))
}

fn number(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u64, ConfigError> {
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { flag, value: raw })
}
