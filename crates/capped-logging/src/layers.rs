//! Custom tracing layers
//!
//! [`PeerContextLayer`] copies the active [`PeerContextGuard`] into every new
//! span's extensions, so the peer a span was opened for can be recovered
//! even after the span moves to another thread.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{PeerContextData, PeerContextGuard};

/// Layer that attaches peer context to spans
#[derive(Debug, Default)]
pub struct PeerContextLayer;

impl PeerContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct PeerContextExtension {
    pub data: PeerContextData,
}

impl<S> Layer<S> for PeerContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        // Explicit guard first, then whatever the parent span carried
        let inherited = span
            .parent()
            .and_then(|parent| parent.extensions().get::<PeerContextExtension>().cloned());
        let extension = PeerContextGuard::current()
            .map(|data| PeerContextExtension { data })
            .or(inherited);

        if let Some(extension) = extension {
            span.extensions_mut().insert(extension);
        }
    }
}

/// Create a JSONL formatting layer for an arbitrary writer
pub fn jsonl_layer<S, W>(
    writer: W,
    config: &crate::config::JsonlConfig,
) -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::JsonFields,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Json>,
    W,
>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
}
