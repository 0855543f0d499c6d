pub mod cli;
pub mod runner;
pub mod source;

use clap::Parser;
use common::{TraceId, init_logger, root_span};
use tracing::{Instrument, info};

use cli::{Cli, Command};
use runner::Session;
use source::{FileQuoteSource, JsonLinesSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logger("tickaudit", cli.json_logs);

    let config = cli::load_config(&cli)?;

    let trace_id = TraceId::new();

    match cli.command {
        Command::Replay(args) => {
            let span = root_span("replay", &trace_id);
            span.record("instrument", args.session.instrument.as_str());

            async move {
                info!(input = %args.input.display(), "replaying quotes");

                let mut source = JsonLinesSource::open(&args.input).await?;
                let mut session = Session::new(&args.session.instrument, config, args.session.capital);

                runner::replay(&mut session, &mut source, args.step_ms).await?;
                anyhow::Ok(())
            }
            .instrument(span)
            .await
        }

        Command::Watch(args) => {
            let span = root_span("watch", &trace_id);
            span.record("instrument", args.session.instrument.as_str());

            async move {
                let mut source = FileQuoteSource::new(&args.input);
                let mut session = Session::new(&args.session.instrument, config, args.session.capital);

                runner::watch(
                    &mut session,
                    &mut source,
                    args.interval(),
                    args.timeout(),
                    args.max_cycles,
                )
                .await?;
                anyhow::Ok(())
            }
            .instrument(span)
            .await
        }
    }
}
