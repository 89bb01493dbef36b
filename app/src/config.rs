use std::time::Duration;

use anyhow::Result;

use crate::sync::ScaleCoupling;

pub const DEFAULT_SERVER: &str = "http://higlass.io/api/v1";
pub const DEFAULT_TEXT: &str = "chr4:190,998,876-191,000,255";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URLs queried for chrom-size and gene annotation sources.
    pub servers: Vec<String>,
    /// Assembly to activate once discovery finishes; the first available
    /// one otherwise.
    pub assembly: Option<String>,
    pub two_d: bool,
    /// Fraction of a gene's span added on each side when a lone gene
    /// name is expanded.
    pub margin: f64,
    pub coupling: ScaleCoupling,
    pub initial_text: String,
    /// Submitted once the first assembly is active.
    pub init_range: Option<String>,
    pub viewport_px: f64,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_SERVER.to_string()],
            assembly: None,
            two_d: false,
            margin: 0.0,
            coupling: ScaleCoupling::Shared,
            initial_text: DEFAULT_TEXT.to_string(),
            init_range: None,
            viewport_px: 1000.0,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_args(mut pargs: pico_args::Arguments) -> Result<Self> {
        let defaults = Config::default();

        let servers: Vec<String> = pargs.values_from_str("--server")?;
        let servers = if servers.is_empty() {
            defaults.servers
        } else {
            servers
        };

        let config = Config {
            servers,
            assembly: pargs.opt_value_from_str("--assembly")?,
            two_d: pargs.contains("--2d"),
            margin: pargs
                .opt_value_from_fn("--margin", parse_margin)?
                .unwrap_or(defaults.margin),
            coupling: pargs
                .opt_value_from_str("--coupling")?
                .unwrap_or(defaults.coupling),
            initial_text: defaults.initial_text,
            init_range: pargs.opt_value_from_str("--range")?,
            viewport_px: pargs
                .opt_value_from_fn("--width", parse_width)?
                .unwrap_or(defaults.viewport_px),
            timeout: pargs
                .opt_value_from_fn("--timeout", parse_timeout)?
                .unwrap_or(defaults.timeout),
        };

        let rest = pargs.finish();
        if !rest.is_empty() {
            anyhow::bail!("unexpected arguments: {rest:?}");
        }

        Ok(config)
    }
}

fn parse_margin(s: &str) -> Result<f64> {
    let margin = s.parse::<f64>()?;
    if !margin.is_finite() || margin < 0.0 {
        anyhow::bail!("margin must be a nonnegative number, got `{s}`");
    }
    Ok(margin)
}

fn parse_width(s: &str) -> Result<f64> {
    let width = s.parse::<u32>()?;
    if width == 0 {
        anyhow::bail!("viewport width must be positive");
    }
    Ok(width as f64)
}

fn parse_timeout(s: &str) -> Result<Duration> {
    Ok(Duration::from_millis(s.parse::<u64>()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::OsString;

    fn args(list: &[&str]) -> pico_args::Arguments {
        pico_args::Arguments::from_vec(
            list.iter().map(OsString::from).collect(),
        )
    }

    #[test]
    fn defaults() {
        let config = Config::from_args(args(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.servers, [DEFAULT_SERVER]);
        assert_eq!(config.initial_text, "chr4:190,998,876-191,000,255");
    }

    #[test]
    fn all_flags() {
        let config = Config::from_args(args(&[
            "--server",
            "http://a/api/v1",
            "--server",
            "http://b/api/v1",
            "--assembly",
            "hg38",
            "--2d",
            "--margin",
            "0.25",
            "--coupling",
            "independent",
            "--range",
            "BRCA2",
            "--timeout",
            "500",
        ]))
        .unwrap();

        assert_eq!(config.servers, ["http://a/api/v1", "http://b/api/v1"]);
        assert_eq!(config.assembly.as_deref(), Some("hg38"));
        assert!(config.two_d);
        assert_eq!(config.margin, 0.25);
        assert_eq!(config.coupling, ScaleCoupling::Independent);
        assert_eq!(config.init_range.as_deref(), Some("BRCA2"));
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_args(args(&["--margin", "-1"])).is_err());
        assert!(Config::from_args(args(&["--margin", "NaN"])).is_err());
        assert!(Config::from_args(args(&["--coupling", "loose"])).is_err());
        assert!(Config::from_args(args(&["--width", "0"])).is_err());
        assert!(Config::from_args(args(&["stray"])).is_err());
    }
}
