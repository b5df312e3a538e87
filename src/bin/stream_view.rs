use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use view_tail::common::cli::StreamArgs;
use view_tail::connectors::stream_printer::StreamPrinter;

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("can't listen for ctrl-c. err={:?}", err);
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = StreamArgs::parse();
    let mut printer = StreamPrinter::new(args.into(), std::io::stdout());

    let err = match printer.run_until(interrupted()).await {
        Ok(never) => match never {},
        Err(err) => err,
    };

    error!("{}", err);
    ExitCode::from(err.exit_code())
}
