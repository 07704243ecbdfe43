//! Build a router from configuration and run it

use crate::channel::{
    ConfirmedInput, ConfirmedOutput, InputChannel, LoadBalancedInput, LoadBalancedOutput,
    OutputChannel, RawOutput, RawWithSideChannel,
};
use crate::error::Result;
use crate::stats::RouterStats;
use crate::transport::{self, Address, Link, Writers};

use super::config::RouterConfig;
use super::error::ConfigError;
use super::reactor::Router;
use super::variant::Variant;

/// Readiness credits the output adapter keeps outstanding
pub const ADAPTER_CONCURRENCY: usize = 1;

/// Open every endpoint for the configured variant and run until Terminate
///
/// Fails only during startup: a bad address or an endpoint that cannot be
/// bound or reached. Once running, transport trouble is logged and counted.
///
/// Returns after the router stopped and every socket writer flushed what was
/// queued, or after `drain_timeout` if a peer stops reading.
pub async fn launch(config: RouterConfig) -> Result<RouterStats> {
    config.validate()?;

    let capacity = config.link_capacity;
    let flush_timeout = config.drain_timeout;
    let writers = Writers::new();
    let input_address: Address = config.input_address.parse()?;
    let output_address: Address = config.output_address.parse()?;
    let roi_address: Option<Address> = match &config.roi_address {
        Some(address) => Some(address.parse()?),
        None => None,
    };
    let signal_address: Option<Address> = match &config.signal_address {
        Some(address) => Some(address.parse()?),
        None => None,
    };

    tracing::info!(
        variant = %config.variant,
        input = %input_address,
        output = %output_address,
        "Starting router"
    );

    let signals = match &signal_address {
        Some(address) => Some(transport::open(address, capacity, &writers).await?),
        None => None,
    };

    let stats = match config.variant {
        Variant::Collector => {
            let input =
                ConfirmedInput::new(transport::open(&input_address, capacity, &writers).await?);
            let output = LoadBalancedOutput::new(
                transport::open(&output_address, capacity, &writers).await?,
                config.lax,
            );
            run(config, input, output, signals).await
        }
        Variant::ProxyCollector => {
            let input =
                ConfirmedInput::new(transport::open(&input_address, capacity, &writers).await?);
            let output =
                ConfirmedOutput::new(transport::open(&output_address, capacity, &writers).await?);
            run(config, input, output, signals).await
        }
        Variant::FinalCollector => {
            let input =
                ConfirmedInput::new(transport::open(&input_address, capacity, &writers).await?);
            let output = RawOutput::new(
                transport::open_raw(&output_address, capacity, &writers).await?,
                config.add_length_prefix,
            );
            run(config, input, output, signals).await
        }
        Variant::FinalCollectorWithRoi => {
            let roi_address = roi_address.ok_or(ConfigError::MissingValue("--roi"))?;
            let input =
                ConfirmedInput::new(transport::open(&input_address, capacity, &writers).await?);
            let output = RawWithSideChannel::new(
                transport::open_raw(&output_address, capacity, &writers).await?,
                transport::open_raw(&roi_address, capacity, &writers).await?,
                config.add_length_prefix,
            );
            run(config, input, output, signals).await
        }
        Variant::OutputAdapter => {
            let input = LoadBalancedInput::new(
                transport::open(&input_address, capacity, &writers).await?,
                ADAPTER_CONCURRENCY,
            );
            let output = RawOutput::new(
                transport::open_raw(&output_address, capacity, &writers).await?,
                config.add_length_prefix,
            );
            run(config, input, output, signals).await
        }
    };

    if !writers.finish(flush_timeout).await {
        tracing::warn!(
            timeout_ms = flush_timeout.as_millis() as u64,
            "Socket writers did not flush in time"
        );
    }

    Ok(stats)
}

async fn run<I, O>(config: RouterConfig, input: I, output: O, signals: Option<Link>) -> RouterStats
where
    I: InputChannel,
    O: OutputChannel,
{
    let router = Router::new(config, input, output);
    match signals {
        Some(signals) => router.with_signals(signals).run().await,
        None => router.run().await,
    }
}
