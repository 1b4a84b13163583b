use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::Layered, layer::SubscriberExt, reload,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

fn output_layer(format: LogFormat) -> OutputLayer {
    match format {
        LogFormat::Pretty => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    }
}

pub struct Logger {
    filter_handle: reload::Handle<EnvFilter, Registry>,
    output_handle: reload::Handle<OutputLayer, FilteredRegistry>,
}

impl Logger {
    /// Installs the global subscriber at `info`, human-readable, until the
    /// settings are known.
    pub fn new_bootstrap() -> Self {
        let (filter, filter_handle) = reload::Layer::new(EnvFilter::new("info"));
        let (output, output_handle) = reload::Layer::new(output_layer(LogFormat::Pretty));

        tracing_subscriber::registry()
            .with(filter)
            .with(output)
            .init();

        Self {
            filter_handle,
            output_handle,
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        self.filter_handle.reload(filter).map_err(|e| anyhow!(e))?;
        self.output_handle
            .reload(output_layer(config.format))
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
